//! Segmentation of the 3D path.
//!
//! The path is cut into runs of `max(15, floor(n / 200))` positions. Neighbouring segments share
//! their boundary position so the rendered ribbon has no gaps. Each segment is coloured by the
//! mean of the active parameter over the raw samples it covers, found through [`map_index`].
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::boundaries::{Category, FALLBACK_COLOR, Parameter, ParameterBoundaries};
use crate::index::{IndexRange, map_index};
use crate::records::Sample;

/// Shortest allowed segment, in positions.
pub const MIN_SEGMENT_LENGTH: usize = 15;
/// Upper bound on the number of segments a long path is cut into.
pub const TARGET_SEGMENT_COUNT: usize = 200;

/// Positions per segment for a path of `positions` points.
pub fn segment_length(positions: usize) -> usize {
    (positions / TARGET_SEGMENT_COUNT).max(MIN_SEGMENT_LENGTH)
}

/// A run of path positions, both ends inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    /// Mean of the segment's positions
    pub midpoint: Vector3<f64>,
}

impl PathSegment {
    pub fn range(&self) -> IndexRange {
        IndexRange::new(self.start, self.end)
    }
}

/// Cut `positions` into segments.
pub fn path_segments(positions: &[Vector3<f64>]) -> Vec<PathSegment> {
    let n = positions.len();
    if n < 2 {
        return Vec::new();
    }
    let len = segment_length(n);
    (0..n - 1)
        .step_by(len)
        .map(|start| {
            let end = (start + len).min(n - 1);
            let run = &positions[start..=end];
            let midpoint = run.iter().sum::<Vector3<f64>>() / run.len() as f64;
            PathSegment {
                index: start / len,
                start,
                end,
                midpoint,
            }
        })
        .collect()
}

/// Indices of the segments touched by the path-space selection `[path_start, path_end]`.
///
/// `None` for a path too short to have segments.
pub fn segment_range_for(
    path_start: usize,
    path_end: usize,
    positions: usize,
) -> Option<IndexRange> {
    if positions < 2 {
        return None;
    }
    let len = segment_length(positions);
    let last = (positions - 2) / len;
    let range = IndexRange::new(path_start, path_end);
    Some(IndexRange::new(
        (range.start / len).min(last),
        (range.end / len).min(last),
    ))
}

fn finite_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Raw-sample range covered by a path-space range.
pub fn raw_range(range: IndexRange, positions: usize, samples: usize) -> IndexRange {
    IndexRange::new(
        map_index(range.start, positions, samples),
        map_index(range.end, positions, samples),
    )
}

/// Mean of `parameter` over the raw samples covered by `segment`; `None` when no value is finite.
pub fn segment_value(
    segment: &PathSegment,
    positions: usize,
    samples: &[Sample],
    parameter: Parameter,
) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let raw = raw_range(segment.range(), positions, samples.len());
    finite_mean(samples[raw.start..=raw.end].iter().map(|s| parameter.value_of(s)))
}

/// Display colour of every segment for `parameter`.
pub fn segment_colors(
    segments: &[PathSegment],
    positions: usize,
    samples: &[Sample],
    parameter: Parameter,
    boundaries: &ParameterBoundaries,
) -> Vec<&'static str> {
    segments
        .iter()
        .map(|seg| match segment_value(seg, positions, samples, parameter) {
            Some(v) => boundaries.color_of(parameter, v),
            None if boundaries.get(parameter).is_some() => {
                parameter.palette()[Category::Medium.ordinal()]
            }
            None => FALLBACK_COLOR,
        })
        .collect()
}

/// Averages of the raw channels under a path-space range, as shown when hovering the path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSummary {
    /// Mean height of the path positions in range (m)
    pub height: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    pub pressure: f64,
    pub temperature: f64,
    /// First timestamp among the covered samples
    pub first_timestamp: Option<i64>,
    /// Number of raw samples covered
    pub count: usize,
}

impl SensorSummary {
    /// Summarize the samples under the path positions `range`.
    ///
    /// Channels without any finite value in range average to NaN.
    pub fn over(samples: &[Sample], positions: &[Vector3<f64>], range: IndexRange) -> Option<Self> {
        if samples.is_empty() || positions.is_empty() {
            return None;
        }
        let path = IndexRange::new(
            range.start.min(positions.len() - 1),
            range.end.min(positions.len() - 1),
        );
        let raw = raw_range(path, positions.len(), samples.len());
        let covered = &samples[raw.start..=raw.end];
        let avg = |f: fn(&Sample) -> f64| finite_mean(covered.iter().map(f)).unwrap_or(f64::NAN);
        Some(SensorSummary {
            height: finite_mean(positions[path.start..=path.end].iter().map(|p| p.y))
                .unwrap_or(f64::NAN),
            ax: avg(|s| s.ax),
            ay: avg(|s| s.ay),
            az: avg(|s| s.az),
            mx: avg(|s| s.mx),
            my: avg(|s| s.my),
            mz: avg(|s| s.mz),
            pressure: avg(|s| s.pressure),
            temperature: avg(|s| s.temperature),
            first_timestamp: covered.iter().find_map(|s| s.timestamp),
            count: covered.len(),
        })
    }
}
