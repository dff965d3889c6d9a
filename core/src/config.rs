//! Pipeline configuration.
//!
//! Every tunable of a pipeline run lives in [`PipelineConfig`]. All fields have defaults, so a
//! configuration file only needs to name what it changes. Files are read and written as JSON,
//! YAML or TOML, chosen by extension.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlightError, Result};
use crate::trajectory::{
    DEFAULT_BLEND_FACTOR, DEFAULT_HORIZONTAL_SCALE, DEFAULT_MAGNETOMETER_UP_WEIGHT,
    DEFAULT_SMOOTHING_FACTOR, StylizationParams, TrajectoryEstimator,
};

/// Longest accepted wait for the background worker, in seconds.
pub const MAX_WORKER_TIMEOUT_SECS: u64 = 30;

/// Tunables of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// LTTB budget of the 3D path
    pub target_3d_points: usize,
    /// Stride budget of the chart series
    pub chart_max_points: usize,
    /// Points kept per chart channel when display decimation applies
    pub chart_display_samples: usize,
    /// Chart length above which display decimation applies
    pub chart_display_threshold: usize,
    /// Stride budget of the map track
    pub map_target_segments: usize,
    /// Most highlight polylines drawn for one map selection
    pub map_highlight_max_segments: usize,
    /// GPS weight of the trajectory blend
    pub blend_factor: f64,
    pub smoothing_factor: f64,
    pub magnetometer_up_weight: f64,
    /// Scale of projected GPS offsets
    pub horizontal_scale: f64,
    /// Rows per processing chunk
    pub chunk_size: usize,
    /// Time budget of the background worker before falling back to synchronous processing
    pub worker_timeout_secs: u64,
    pub use_worker: bool,
    pub stylization: StylizationParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            target_3d_points: 15_000,
            chart_max_points: 10_000,
            chart_display_samples: 1_000,
            chart_display_threshold: 2_000,
            map_target_segments: 3_000,
            map_highlight_max_segments: 500,
            blend_factor: DEFAULT_BLEND_FACTOR,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            magnetometer_up_weight: DEFAULT_MAGNETOMETER_UP_WEIGHT,
            horizontal_scale: DEFAULT_HORIZONTAL_SCALE,
            chunk_size: 5_000,
            worker_timeout_secs: 30,
            use_worker: true,
            stylization: StylizationParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs.min(MAX_WORKER_TIMEOUT_SECS))
    }

    /// Trajectory estimator carrying this configuration's settings.
    pub fn estimator(&self) -> TrajectoryEstimator {
        TrajectoryEstimator {
            blend_factor: self.blend_factor,
            smoothing_factor: self.smoothing_factor,
            magnetometer_up_weight: self.magnetometer_up_weight,
            horizontal_scale: self.horizontal_scale,
            stylization: self.stylization.clone(),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FlightError::Config("chunk_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.blend_factor) {
            return Err(FlightError::Config(format!(
                "blend_factor must lie in [0, 1], got {}",
                self.blend_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(FlightError::Config(format!(
                "smoothing_factor must lie in [0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if self.worker_timeout_secs > MAX_WORKER_TIMEOUT_SECS {
            return Err(FlightError::Config(format!(
                "worker_timeout_secs must not exceed {MAX_WORKER_TIMEOUT_SECS}, got {}",
                self.worker_timeout_secs
            )));
        }
        Ok(())
    }

    /// Write the configuration as pretty JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(|e| FlightError::Config(e.to_string()))
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(|e| FlightError::Config(e.to_string()))?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(|e| FlightError::Config(e.to_string()))
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(|e| FlightError::Config(e.to_string()))?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(|e| FlightError::Config(e.to_string()))
    }
    /// Generic write: format chosen by extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(FlightError::UnsupportedConfigFormat(p.to_path_buf())),
        }
    }
    /// Generic read: format chosen by extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let config = match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(FlightError::UnsupportedConfigFormat(p.to_path_buf())),
        }?;
        config.validate()?;
        Ok(config)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn tuned() -> PipelineConfig {
        PipelineConfig {
            target_3d_points: 2_000,
            blend_factor: 0.5,
            use_worker: false,
            stylization: StylizationParams {
                seed: 7,
                ..StylizationParams::none()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.target_3d_points, 15_000);
        assert_eq!(cfg.chart_max_points, 10_000);
        assert_eq!(cfg.map_target_segments, 3_000);
        assert_eq!(cfg.worker_timeout(), Duration::from_secs(30));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("json");
        tuned().to_file(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), tuned());
    }

    #[test]
    fn yaml_roundtrip() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("yml");
        tuned().to_file(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), tuned());
    }

    #[test]
    fn toml_roundtrip() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("toml");
        tuned().to_file(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), tuned());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("json");
        std::fs::write(&path, r#"{ "chunk_size": 10 }"#).unwrap();
        let cfg = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.chunk_size, 10);
        assert_eq!(cfg.target_3d_points, 15_000);
        assert_eq!(cfg.stylization, StylizationParams::default());
    }

    #[test]
    fn unsupported_extension() {
        let err = PipelineConfig::default().to_file("settings.ini").unwrap_err();
        assert!(matches!(err, FlightError::UnsupportedConfigFormat(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("json");
        std::fs::write(&path, r#"{ "chunk_size": 0 }"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(FlightError::Config(_))
        ));
    }

    #[test]
    fn worker_timeout_is_bounded() {
        let mut cfg = PipelineConfig {
            worker_timeout_secs: MAX_WORKER_TIMEOUT_SECS,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.worker_timeout_secs = 0;
        assert!(cfg.validate().is_ok());
        cfg.worker_timeout_secs = u64::MAX;
        assert!(matches!(cfg.validate(), Err(FlightError::Config(_))));
        assert_eq!(
            cfg.worker_timeout(),
            Duration::from_secs(MAX_WORKER_TIMEOUT_SECS)
        );
    }
}
