//! Time-indexed chart series.
//!
//! Only samples that carry a timestamp take part in the charts. The resulting series defines the
//! chart index space; it is stride-reduced to a maximum length when the recording is long, and
//! every channel is further decimated with LTTB for display when it exceeds a threshold.
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::downsample::{lttb_indices, uniform};
use crate::records::Sample;

/// Magnetometer axes of a chart series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MagnetometerSeries {
    pub mx: Vec<f64>,
    pub my: Vec<f64>,
    pub mz: Vec<f64>,
}

/// Accelerometer axes of a chart series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerSeries {
    pub ax: Vec<f64>,
    pub ay: Vec<f64>,
    pub az: Vec<f64>,
}

/// Column-oriented chart data; every vector has the same length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    /// Epoch milliseconds
    pub time_labels: Vec<i64>,
    pub magnetometer: MagnetometerSeries,
    pub accelerometer: AccelerometerSeries,
    pub altitude: Vec<f64>,
    pub pressure: Vec<f64>,
    pub temperature: Vec<f64>,
}

/// One plotted channel of a [`ChartSeries`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartChannel {
    Mx,
    My,
    Mz,
    Ax,
    Ay,
    Az,
    Altitude,
    Pressure,
    Temperature,
}

impl ChartChannel {
    pub const ALL: [ChartChannel; 9] = [
        ChartChannel::Mx,
        ChartChannel::My,
        ChartChannel::Mz,
        ChartChannel::Ax,
        ChartChannel::Ay,
        ChartChannel::Az,
        ChartChannel::Altitude,
        ChartChannel::Pressure,
        ChartChannel::Temperature,
    ];
}

impl fmt::Display for ChartChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartChannel::Mx => "mx",
            ChartChannel::My => "my",
            ChartChannel::Mz => "mz",
            ChartChannel::Ax => "ax",
            ChartChannel::Ay => "ay",
            ChartChannel::Az => "az",
            ChartChannel::Altitude => "altitude",
            ChartChannel::Pressure => "pressure",
            ChartChannel::Temperature => "temperature",
        };
        f.write_str(name)
    }
}

impl FromStr for ChartChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartChannel::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown chart channel '{}'", s.trim()))
    }
}

/// A decimated chart point; `index` is its position in the chart index space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub index: usize,
    pub time: i64,
    pub value: f64,
}

impl ChartSeries {
    /// Build the chart series from every timestamped sample, reduced by uniform stride to at most
    /// `max_points` entries.
    ///
    /// Altitudes are taken from the samples as they are, so they must already be derived against
    /// the full-series reference pressure.
    pub fn from_samples(samples: &[Sample], max_points: usize) -> Self {
        let timed: Vec<Sample> = samples
            .iter()
            .filter(|s| s.timestamp.is_some())
            .copied()
            .collect();
        let reduced = if timed.len() > max_points {
            uniform(&timed, max_points)
        } else {
            timed
        };
        debug!("chart series holds {} points", reduced.len());

        let mut series = ChartSeries::default();
        for s in &reduced {
            series.push(s);
        }
        series
    }

    fn push(&mut self, s: &Sample) {
        self.time_labels.push(s.timestamp.unwrap_or_default());
        self.magnetometer.mx.push(s.mx);
        self.magnetometer.my.push(s.my);
        self.magnetometer.mz.push(s.mz);
        self.accelerometer.ax.push(s.ax);
        self.accelerometer.ay.push(s.ay);
        self.accelerometer.az.push(s.az);
        self.altitude.push(s.altitude);
        self.pressure.push(s.pressure);
        self.temperature.push(s.temperature);
    }

    pub fn len(&self) -> usize {
        self.time_labels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time_labels.is_empty()
    }

    pub fn channel(&self, channel: ChartChannel) -> &[f64] {
        match channel {
            ChartChannel::Mx => &self.magnetometer.mx,
            ChartChannel::My => &self.magnetometer.my,
            ChartChannel::Mz => &self.magnetometer.mz,
            ChartChannel::Ax => &self.accelerometer.ax,
            ChartChannel::Ay => &self.accelerometer.ay,
            ChartChannel::Az => &self.accelerometer.az,
            ChartChannel::Altitude => &self.altitude,
            ChartChannel::Pressure => &self.pressure,
            ChartChannel::Temperature => &self.temperature,
        }
    }

    /// Points of `channel` to draw.
    ///
    /// Up to `threshold` points the channel is returned in full; above it LTTB over
    /// `(time, value)` keeps `samples` points.
    pub fn display_points(
        &self,
        channel: ChartChannel,
        samples: usize,
        threshold: usize,
    ) -> Vec<ChartPoint> {
        let values = self.channel(channel);
        let point = |index: usize| ChartPoint {
            index,
            time: self.time_labels[index],
            value: values[index],
        };
        if values.len() <= threshold {
            return (0..values.len()).map(point).collect();
        }
        let xy: Vec<(f64, f64)> = self
            .time_labels
            .iter()
            .zip(values)
            .map(|(t, v)| (*t as f64, *v))
            .collect();
        lttb_indices(&xy, samples).into_iter().map(point).collect()
    }

    /// Inclusive sub-range `[start, end]`, clamped to the series. Reversed bounds are swapped.
    pub fn slice(&self, start: usize, end: usize) -> ChartSeries {
        if self.is_empty() {
            return ChartSeries::default();
        }
        let last = self.len() - 1;
        let (a, b) = (start.min(end).min(last), start.max(end).min(last));
        let range = a..b + 1;
        ChartSeries {
            time_labels: self.time_labels[range.clone()].to_vec(),
            magnetometer: MagnetometerSeries {
                mx: self.magnetometer.mx[range.clone()].to_vec(),
                my: self.magnetometer.my[range.clone()].to_vec(),
                mz: self.magnetometer.mz[range.clone()].to_vec(),
            },
            accelerometer: AccelerometerSeries {
                ax: self.accelerometer.ax[range.clone()].to_vec(),
                ay: self.accelerometer.ay[range.clone()].to_vec(),
                az: self.accelerometer.az[range.clone()].to_vec(),
            },
            altitude: self.altitude[range.clone()].to_vec(),
            pressure: self.pressure[range.clone()].to_vec(),
            temperature: self.temperature[range].to_vec(),
        }
    }
}
