//! Barometric altitude.
//!
//! Altitude is derived with the truncated international barometric formula
//!
//! $$
//! h = 44330 \left( 1 - \left( \frac{p}{p_{ref}} \right)^{1/5.255} \right)
//! $$
//!
//! where $p_{ref}$ is the *reference pressure* of the dataset: the largest pressure observed in
//! the loaded series. This is a dataset-relative baseline, so the resulting altitudes are
//! relative to the lowest point of the recording rather than to mean sea level.
use serde::{Deserialize, Serialize};

use crate::records::Sample;

/// Scale height term of the barometric formula (m)
pub const BAROMETRIC_SCALE: f64 = 44330.0;
/// Exponent denominator of the barometric formula
pub const BAROMETRIC_EXPONENT: f64 = 5.255;

/// Altitude in meters of `pressure` relative to `reference_pressure`.
///
/// Returns `0.0` when either pressure is zero, negative or NaN.
pub fn altitude(pressure: f64, reference_pressure: f64) -> f64 {
    if !(pressure > 0.0) || !(reference_pressure > 0.0) {
        return 0.0;
    }
    BAROMETRIC_SCALE * (1.0 - (pressure / reference_pressure).powf(1.0 / BAROMETRIC_EXPONENT))
}

/// The dataset baseline pressure: the maximum positive pressure of a series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferencePressure(pub Option<f64>);

impl ReferencePressure {
    /// Maximum positive, non-NaN pressure across `samples`; empty when there is none.
    pub fn from_samples(samples: &[Sample]) -> Self {
        let max = samples
            .iter()
            .map(|s| s.pressure)
            .filter(|p| *p > 0.0)
            .fold(None, |acc: Option<f64>, p| match acc {
                Some(m) if m >= p => Some(m),
                _ => Some(p),
            });
        ReferencePressure(max)
    }
    pub fn value(&self) -> Option<f64> {
        self.0
    }
    /// Altitude of `pressure` against this reference; `0.0` when there is no reference.
    pub fn altitude_of(&self, pressure: f64) -> f64 {
        altitude(pressure, self.0.unwrap_or(0.0))
    }
}

/// Fill in `altitude` for every sample against one reference pressure.
pub fn apply_altitude(samples: &mut [Sample], reference: ReferencePressure) {
    for sample in samples.iter_mut() {
        sample.altitude = reference.altitude_of(sample.pressure);
    }
}
