//! Geographic track for the map view.
//!
//! The full sample series is stride-reduced to a fixed number of points; that reduced track is the
//! map index space. Selections against it are turned into highlight polyline pairs, thinned so a
//! large selection never produces more than a bounded number of segments.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::boundaries::{Category, Parameter, ParameterBoundaries};
use crate::downsample::uniform;
use crate::geo::haversine_distance;
use crate::records::Sample;

/// Meters per second to kilometers per hour.
const MPS_TO_KPH: f64 = 3.6;

/// Latitude/longitude extent of a track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl TrackBounds {
    /// Centre of the bounding box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Stride-reduced GPS track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapTrack {
    pub points: Vec<Sample>,
}

impl MapTrack {
    /// Reduce `samples` to at most `target_segments` points.
    pub fn from_samples(samples: &[Sample], target_segments: usize) -> Self {
        let points = uniform(samples, target_segments);
        debug!(
            "map track holds {} of {} points",
            points.len(),
            samples.len()
        );
        MapTrack { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Extent of the finite fixes; `None` when there is none.
    pub fn bounds(&self) -> Option<TrackBounds> {
        self.points
            .iter()
            .filter(|p| p.lat.is_finite() && p.lon.is_finite())
            .fold(None, |acc, p| {
                Some(match acc {
                    None => TrackBounds {
                        min_lat: p.lat,
                        max_lat: p.lat,
                        min_lon: p.lon,
                        max_lon: p.lon,
                    },
                    Some(b) => TrackBounds {
                        min_lat: b.min_lat.min(p.lat),
                        max_lat: b.max_lat.max(p.lat),
                        min_lon: b.min_lon.min(p.lon),
                        max_lon: b.max_lon.max(p.lon),
                    },
                })
            })
    }

    /// Index pairs `(from, to)` of the polylines highlighting `[start, end]`.
    ///
    /// The range is clamped to the track. When it spans more than `max_segments` segments the step
    /// grows to `ceil(span / max_segments)`; the last pair always ends on `end`. Pairs touching a
    /// fix without usable coordinates are skipped.
    pub fn highlight_pairs(
        &self,
        start: usize,
        end: usize,
        max_segments: usize,
    ) -> Vec<(usize, usize)> {
        if self.points.len() < 2 {
            return Vec::new();
        }
        let last = self.points.len() - 1;
        let (start, end) = (start.min(end).min(last), start.max(end).min(last));
        let span = end - start;
        let step = if max_segments > 0 && span > max_segments {
            span.div_ceil(max_segments)
        } else {
            1
        };
        (start..end)
            .step_by(step)
            .map(|i| (i, (i + step).min(end)))
            .filter(|&(a, b)| has_fix(&self.points[a]) && has_fix(&self.points[b]))
            .collect()
    }

    /// Statistics of the segment between track points `from` and `to`.
    pub fn segment_stats(
        &self,
        from: usize,
        to: usize,
        parameter: Parameter,
        boundaries: &ParameterBoundaries,
    ) -> Option<SegmentStats> {
        let a = self.points.get(from)?;
        let b = self.points.get(to)?;
        Some(SegmentStats::between(a, b, parameter, boundaries))
    }
}

fn has_fix(s: &Sample) -> bool {
    s.lat.is_finite() && s.lon.is_finite() && s.lat != 0.0 && s.lon != 0.0
}

fn zero_if_nan(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn mean(a: f64, b: f64) -> f64 {
    (zero_if_nan(a) + zero_if_nan(b)) / 2.0
}

/// Summary of the stretch between two adjacent track points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Great-circle distance (m)
    pub distance: f64,
    /// Elapsed time (s); zero when either timestamp is missing
    pub elapsed: f64,
    /// Ground speed (km/h); zero when no time elapsed
    pub speed: f64,
    pub altitude: f64,
    pub pressure: f64,
    pub temperature: f64,
    pub magnetometer: [f64; 3],
    pub accelerometer: [f64; 3],
    /// Bucket of the mean value of the colouring parameter
    pub category: Category,
}

impl SegmentStats {
    pub fn between(
        a: &Sample,
        b: &Sample,
        parameter: Parameter,
        boundaries: &ParameterBoundaries,
    ) -> Self {
        let distance = haversine_distance(a.lat, a.lon, b.lat, b.lon);
        let elapsed = match (a.timestamp, b.timestamp) {
            (Some(t1), Some(t2)) => (t2 - t1) as f64 / 1000.0,
            _ => 0.0,
        };
        let speed = if elapsed > 0.0 && distance.is_finite() {
            distance / elapsed * MPS_TO_KPH
        } else {
            0.0
        };
        let value = mean(parameter.value_of(a), parameter.value_of(b));
        SegmentStats {
            distance,
            elapsed,
            speed,
            altitude: mean(a.altitude, b.altitude),
            pressure: mean(a.pressure, b.pressure),
            temperature: mean(a.temperature, b.temperature),
            magnetometer: [mean(a.mx, b.mx), mean(a.my, b.my), mean(a.mz, b.mz)],
            accelerometer: [mean(a.ax, b.ax), mean(a.ay, b.ay), mean(a.az, b.az)],
            category: boundaries.category_of(parameter, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn track(n: usize) -> MapTrack {
        let points = (0..n)
            .map(|i| Sample {
                lat: 45.0 + i as f64 * 1e-4,
                lon: 7.0,
                timestamp: Some(i as i64 * 1000),
                ..Sample::default()
            })
            .collect();
        MapTrack { points }
    }

    #[test]
    fn track_is_reduced_to_target() {
        let samples = track(9000).points;
        let t = MapTrack::from_samples(&samples, 3000);
        assert_eq!(t.len(), 3000);
        assert_eq!(t.points[1], samples[3]);
        assert_eq!(MapTrack::from_samples(&samples[..10], 3000).len(), 10);
    }

    #[test]
    fn small_selection_uses_every_segment() {
        let t = track(100);
        assert_eq!(t.highlight_pairs(10, 13, 500), vec![(10, 11), (11, 12), (12, 13)]);
        assert_eq!(t.highlight_pairs(13, 10, 500).len(), 3);
        assert!(t.highlight_pairs(5, 5, 500).is_empty());
    }

    #[test]
    fn large_selection_is_thinned() {
        let t = track(3000);
        let pairs = t.highlight_pairs(0, 2999, 500);
        assert!(pairs.len() <= 500);
        assert_eq!(pairs[0], (0, 6));
        assert_eq!(pairs.last().unwrap().1, 2999);
        let clamped = t.highlight_pairs(2990, 10_000, 500);
        assert_eq!(clamped.last().unwrap().1, 2999);
    }

    #[test]
    fn pairs_without_fix_are_skipped() {
        let mut t = track(5);
        t.points[2].lat = f64::NAN;
        assert_eq!(t.highlight_pairs(0, 4, 500), vec![(0, 1), (3, 4)]);
        assert!(track(1).highlight_pairs(0, 0, 500).is_empty());
    }

    #[test]
    fn segment_speed_and_means() {
        let t = track(2);
        let boundaries = ParameterBoundaries::default();
        let stats = t
            .segment_stats(0, 1, Parameter::Altitude, &boundaries)
            .unwrap();
        assert_approx_eq!(stats.elapsed, 1.0);
        assert_approx_eq!(stats.distance, haversine_distance(45.0, 7.0, 45.0001, 7.0));
        assert_approx_eq!(stats.speed, stats.distance * 3.6);
        assert_eq!(stats.category, Category::Medium);
        assert!(t.segment_stats(0, 5, Parameter::Altitude, &boundaries).is_none());
    }

    #[test]
    fn missing_time_gives_zero_speed() {
        let mut t = track(2);
        t.points[1].timestamp = None;
        t.points[0].temperature = f64::NAN;
        t.points[1].temperature = 10.0;
        let stats = SegmentStats::between(
            &t.points[0],
            &t.points[1],
            Parameter::Temperature,
            &ParameterBoundaries::default(),
        );
        assert_eq!(stats.speed, 0.0);
        assert_eq!(stats.temperature, 5.0);
    }

    #[test]
    fn bounds_center() {
        let b = track(11).bounds().unwrap();
        let (lat, lon) = b.center();
        assert_approx_eq!(lat, 45.0005);
        assert_approx_eq!(lon, 7.0);
        assert!(MapTrack::default().bounds().is_none());
    }
}
