//! Colour bucket boundaries for the displayable parameters.
//!
//! Each parameter (altitude, pressure, temperature) is split into five equal-width buckets over
//! the `[min, max]` range of its finite values in the *full* sample series. Boundaries for all
//! three parameters are recomputed together whenever a dataset loads, independent of which
//! parameter is currently used for colouring.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::records::Sample;

/// Number of colour buckets per parameter.
pub const BUCKETS: usize = 5;
/// Colour used when a parameter has no boundaries.
pub const FALLBACK_COLOR: &str = "#FFAA00";

/// A parameter that can drive path colouring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    #[default]
    Altitude,
    Pressure,
    Temperature,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [
        Parameter::Altitude,
        Parameter::Pressure,
        Parameter::Temperature,
    ];

    pub fn value_of(&self, sample: &Sample) -> f64 {
        match self {
            Parameter::Altitude => sample.altitude,
            Parameter::Pressure => sample.pressure,
            Parameter::Temperature => sample.temperature,
        }
    }
    pub fn unit(&self) -> &'static str {
        match self {
            Parameter::Altitude => "m",
            Parameter::Pressure => " hPa",
            Parameter::Temperature => "°C",
        }
    }
    /// Colours from the lowest to the highest bucket.
    pub fn palette(&self) -> [&'static str; BUCKETS] {
        match self {
            Parameter::Altitude => ["#0066CC", "#00AA66", "#FFAA00", "#FF6600", "#CC0033"],
            Parameter::Pressure => ["#8e44ad", "#3498db", "#17a2b8", "#20c997", "#28a745"],
            Parameter::Temperature => ["#0066ff", "#00ccff", "#ffcc00", "#ff6600", "#ff0000"],
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::Altitude => "altitude",
            Parameter::Pressure => "pressure",
            Parameter::Temperature => "temperature",
        };
        f.write_str(name)
    }
}

impl FromStr for Parameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "altitude" => Ok(Parameter::Altitude),
            "pressure" => Ok(Parameter::Pressure),
            "temperature" => Ok(Parameter::Temperature),
            other => Err(format!("unknown parameter '{other}'")),
        }
    }
}

/// Bucket of a value relative to its parameter's boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl Category {
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Low => "Low",
            Category::MediumLow => "Medium-Low",
            Category::Medium => "Medium",
            Category::MediumHigh => "Medium-High",
            Category::High => "High",
        };
        f.write_str(name)
    }
}

/// Equal-width partition of one parameter's range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundaries {
    pub min: f64,
    pub low: f64,
    pub medium_low: f64,
    pub medium: f64,
    pub medium_high: f64,
    /// Equal to the maximum
    pub high: f64,
}

impl Boundaries {
    /// Boundaries over `[min, max]`.
    pub fn from_range(min: f64, max: f64) -> Self {
        let step = (max - min) / BUCKETS as f64;
        Boundaries {
            min,
            low: min + step,
            medium_low: min + step * 2.0,
            medium: min + step * 3.0,
            medium_high: min + step * 4.0,
            high: max,
        }
    }
    pub fn max(&self) -> f64 {
        self.high
    }
    /// Bucket of `value`, comparing with `<=` against the ascending cut points.
    pub fn category_of(&self, value: f64) -> Category {
        if value <= self.low {
            Category::Low
        } else if value <= self.medium_low {
            Category::MediumLow
        } else if value <= self.medium {
            Category::Medium
        } else if value <= self.medium_high {
            Category::MediumHigh
        } else {
            Category::High
        }
    }
}

/// Boundaries of `parameter` over the finite values in `samples`; `None` when there are none.
pub fn compute_boundaries(samples: &[Sample], parameter: Parameter) -> Option<Boundaries> {
    let (min, max) = samples
        .iter()
        .map(|s| parameter.value_of(s))
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })?;
    Some(Boundaries::from_range(min, max))
}

/// Boundaries of every parameter for one dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterBoundaries {
    pub altitude: Option<Boundaries>,
    pub pressure: Option<Boundaries>,
    pub temperature: Option<Boundaries>,
}

impl ParameterBoundaries {
    /// Compute all three parameters from the full series.
    pub fn compute(samples: &[Sample]) -> Self {
        ParameterBoundaries {
            altitude: compute_boundaries(samples, Parameter::Altitude),
            pressure: compute_boundaries(samples, Parameter::Pressure),
            temperature: compute_boundaries(samples, Parameter::Temperature),
        }
    }
    pub fn get(&self, parameter: Parameter) -> Option<&Boundaries> {
        match parameter {
            Parameter::Altitude => self.altitude.as_ref(),
            Parameter::Pressure => self.pressure.as_ref(),
            Parameter::Temperature => self.temperature.as_ref(),
        }
    }
    /// Category of `value`; `Medium` when the parameter has no boundaries.
    pub fn category_of(&self, parameter: Parameter, value: f64) -> Category {
        self.get(parameter)
            .map(|b| b.category_of(value))
            .unwrap_or(Category::Medium)
    }
    /// Display colour of `value`; [`FALLBACK_COLOR`] when the parameter has no boundaries.
    pub fn color_of(&self, parameter: Parameter, value: f64) -> &'static str {
        match self.get(parameter) {
            Some(b) => parameter.palette()[b.category_of(value).ordinal()],
            None => FALLBACK_COLOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn temps(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .map(|&temperature| Sample {
                temperature,
                ..Sample::default()
            })
            .collect()
    }

    #[test]
    fn equal_width_buckets() {
        let b = compute_boundaries(&temps(&[0.0, 10.0, 5.0]), Parameter::Temperature).unwrap();
        assert_eq!(b.min, 0.0);
        assert_approx_eq!(b.low, 2.0);
        assert_approx_eq!(b.medium_low, 4.0);
        assert_approx_eq!(b.medium, 6.0);
        assert_approx_eq!(b.medium_high, 8.0);
        assert_eq!(b.high, 10.0);
    }

    #[test]
    fn categories() {
        let b = Boundaries::from_range(0.0, 10.0);
        assert_eq!(b.category_of(0.0), Category::Low);
        assert_eq!(b.category_of(2.0), Category::Low);
        assert_eq!(b.category_of(3.0), Category::MediumLow);
        assert_eq!(b.category_of(5.0), Category::Medium);
        assert_eq!(b.category_of(7.5), Category::MediumHigh);
        assert_eq!(b.category_of(10.0), Category::High);
        assert_eq!(b.category_of(99.0), Category::High);
        assert_eq!(Category::MediumHigh.to_string(), "Medium-High");
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let samples = temps(&[f64::NAN, 3.0, f64::INFINITY, -1.0]);
        let b = compute_boundaries(&samples, Parameter::Temperature).unwrap();
        assert_eq!(b.min, -1.0);
        assert_eq!(b.high, 3.0);
        assert!(compute_boundaries(&temps(&[f64::NAN]), Parameter::Temperature).is_none());
        assert!(compute_boundaries(&[], Parameter::Altitude).is_none());
    }

    #[test]
    fn constant_series_collapses() {
        let b = compute_boundaries(&temps(&[4.0, 4.0]), Parameter::Temperature).unwrap();
        assert_eq!(b.low, 4.0);
        assert_eq!(b.category_of(4.0), Category::Low);
    }

    #[test]
    fn missing_boundaries_fall_back() {
        let all = ParameterBoundaries::compute(&[]);
        assert_eq!(all.category_of(Parameter::Pressure, 1000.0), Category::Medium);
        assert_eq!(all.color_of(Parameter::Pressure, 1000.0), FALLBACK_COLOR);
        let all = ParameterBoundaries::compute(&temps(&[0.0, 10.0]));
        assert_eq!(all.color_of(Parameter::Temperature, 10.0), "#ff0000");
        assert_eq!(all.color_of(Parameter::Temperature, 0.0), "#0066ff");
    }
}
