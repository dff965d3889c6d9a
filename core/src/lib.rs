//! Flight-sensor recording pipeline
//!
//! This crate turns the rows of a flight-sensor recording (GPS fix, barometric pressure,
//! temperature, triaxial accelerometer and magnetometer, optional timestamp) into the data behind
//! three synchronized views: a 3D flight path coloured by a selectable parameter, a map track and
//! a pair of time-series charts. Rendering itself is not part of this crate; every output is plain
//! data meant to be handed to whatever draws it.
//!
//! The crate is built on a small set of dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): positions, orientations and triangle areas.
//! - [`csv`](https://crates.io/crates/csv) and [`chrono`](https://crates.io/crates/chrono): reading
//!   recordings and their timestamps.
//! - [`rayon`](https://crates.io/crates/rayon) and [`crossbeam`](https://crates.io/crates/crossbeam):
//!   chunked background processing.
//! - [`rand`](https://crates.io/crates/rand): seeded jitter of the cosmetic flight perturbations.
//!
//! ## Crate overview
//!
//! - [records]: raw rows, the presence filter and CSV ingestion.
//! - [altitude]: barometric altitude against the dataset reference pressure.
//! - [downsample]: uniform stride and Largest-Triangle-Three-Buckets decimation.
//! - [geo]: local equirectangular projection and haversine distance.
//! - [trajectory]: GPS projection, inertial integration, blending, smoothing and orientation.
//! - [index]: translation between the index spaces of the views.
//! - [segments]: cutting the 3D path into coloured segments and summarizing them.
//! - [boundaries]: equal-width colour buckets per parameter.
//! - [charts]: the time-indexed chart series.
//! - [map]: the map track, highlight polylines and segment statistics.
//! - [pipeline]: the end-to-end transform and the output bundle.
//! - [worker]: background processing with timeout and fallback.
//! - [session]: the loaded dataset, the active parameter and the selection bus.
//! - [config]: pipeline tunables and their file formats.
//!
//! ## Index spaces
//!
//! One recording lives in four arrays of different lengths: the full sample series, the chart
//! series (timestamped rows only, stride-reduced), the 3D path (LTTB-reduced) and the map track
//! (stride-reduced). A selection made in one view is translated into the others with
//! [`index::map_index`]:
//!
//! $$
//! i' = \min\left(\left\lfloor \frac{i}{L} M \right\rfloor, M - 1\right)
//! $$
//!
//! where $L$ and $M$ are the source and target lengths. The last source index always maps to the
//! last target index.
//!
//! ## Example
//!
//! ```
//! use flightviz::config::PipelineConfig;
//! use flightviz::pipeline::run_pipeline;
//! use flightviz::records::{RawRow, REQUIRED_COLUMNS};
//!
//! let rows: Vec<RawRow> = (0..100)
//!     .map(|i| {
//!         let mut row = RawRow::from_pairs(REQUIRED_COLUMNS.iter().map(|c| (*c, "0")));
//!         row.insert("lon", format!("{}", 7.0 + i as f64 * 1e-4));
//!         row.insert("lat", "45.0");
//!         row.insert("Pressure", format!("{}", 1000.0 - i as f64 * 0.1));
//!         row
//!     })
//!     .collect();
//! let bundle = run_pipeline(&rows, &PipelineConfig::default());
//! assert_eq!(bundle.positions.len(), 100);
//! ```
pub mod altitude;
pub mod boundaries;
pub mod charts;
pub mod config;
pub mod downsample;
pub mod error;
pub mod geo;
pub mod index;
pub mod map;
pub mod pipeline;
pub mod records;
pub mod segments;
pub mod session;
pub mod trajectory;
pub mod worker;

pub use error::{FlightError, Result};
