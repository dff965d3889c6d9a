//! Shared helpers of the command-line front end.
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::LevelFilter;

/// Initialize the logger with the given level and optional file output.
///
/// Records carry a local timestamp, the level and the emitting module, so output of the core
/// library (`flightviz::pipeline`, `flightviz::worker`, ...) can be told apart from the front end.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace); unknown levels fall
///   back to `info` with a notice on stderr
/// * `log_file` - Optional log file, appended to and created along with its parent directories;
///   logs go to stderr when `None`
///
/// # Errors
/// Returns an error if the log file cannot be created or opened, or if a logger is already set.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let level = log_level.parse::<LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{log_level}', defaulting to 'info'");
        LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}: {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("failed to open log file '{}'", log_path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("a logger is already installed")?;
    Ok(())
}

/// Check that `input` is an existing CSV file.
///
/// # Errors
/// Returns an error if `input` is not a file or its extension is not `csv` (any case).
pub fn validate_input_path(input: &Path) -> Result<()> {
    if !input.is_file() {
        bail!("Input path '{}' is not an existing file.", input.display());
    }
    let is_csv = input
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        bail!("Input file '{}' is not a CSV file.", input.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_appends_to_file_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("flightviz.log");
        init_logger("bogus", Some(&path)).unwrap();
        log::info!(target: "flightviz::pipeline", "load 1: 3 rows");
        log::debug!("filtered out at info");
        log::logger().flush();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("INFO  flightviz::pipeline: load 1: 3 rows"));
        assert!(!written.contains("filtered out"));
        assert!(init_logger("info", None).is_err());
    }

    #[test]
    fn rejects_missing_and_non_csv_inputs() {
        assert!(validate_input_path(Path::new("does/not/exist.csv")).is_err());
        let dir = std::env::temp_dir();
        assert!(validate_input_path(&dir).is_err());
        let txt = dir.join(format!("flightviz-{}.txt", std::process::id()));
        std::fs::write(&txt, "x").unwrap();
        assert!(validate_input_path(&txt).is_err());
        let csv = txt.with_extension("CSV");
        std::fs::write(&csv, "x").unwrap();
        assert!(validate_input_path(&csv).is_ok());
        std::fs::remove_file(txt).unwrap();
        std::fs::remove_file(csv).unwrap();
    }
}
