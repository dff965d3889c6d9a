//! End-to-end transform from raw rows to the render bundle.
//!
//! The heavy per-row stage ([`process_rows`]) only parses and filters; it is the part that may be
//! moved to a background worker (see [`crate::worker`]). Everything after it runs on the full
//! [`SampleSeries`] in [`build_bundle`]:
//!
//! 1. the reference pressure is taken once from the full series and altitudes are derived,
//! 2. colour boundaries are computed for every parameter,
//! 3. the chart series, map track and LTTB-reduced 3D path are built from the same samples,
//! 4. the 3D path is reconstructed and segmented.
//!
//! The resulting [`FlightBundle`] is plain data for the renderers and carries the lengths of every
//! index space so that selections can be translated with [`crate::index::IndexMapper`].
use log::{debug, info, warn};
use nalgebra::{UnitQuaternion, Vector3};
use rayon::prelude::*;
use serde::Serialize;

use crate::altitude::{ReferencePressure, apply_altitude};
use crate::boundaries::ParameterBoundaries;
use crate::charts::ChartSeries;
use crate::config::PipelineConfig;
use crate::downsample::lttb;
use crate::index::{IndexMapper, SpaceLengths};
use crate::map::MapTrack;
use crate::records::{ParseReport, RawRow, Sample, SampleSeries, parse_rows};
use crate::segments::{PathSegment, path_segments};

/// Counts describing one loaded dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStatistics {
    /// Samples that passed the presence filter
    pub total_records: usize,
    pub dropped_rows: usize,
    pub chart_points: usize,
    pub rendered_3d_points: usize,
    pub map_segments: usize,
}

/// Everything the renderers need for one dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightBundle {
    pub positions: Vec<Vector3<f64>>,
    pub orientations: Vec<UnitQuaternion<f64>>,
    /// Samples behind every position, in path order
    pub gps_data: Vec<Sample>,
    pub chart_series: ChartSeries,
    pub map_track: MapTrack,
    pub boundaries: ParameterBoundaries,
    pub segments: Vec<PathSegment>,
    pub reference_pressure: ReferencePressure,
    pub statistics: DatasetStatistics,
    pub lengths: SpaceLengths,
    /// The full sample series (raw index space)
    #[serde(skip)]
    pub samples: Vec<Sample>,
}

impl FlightBundle {
    pub fn mapper(&self) -> IndexMapper {
        IndexMapper::new(self.lengths)
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Parse `rows` chunk by chunk on the calling thread.
pub fn process_rows(rows: &[RawRow], chunk_size: usize) -> SampleSeries {
    concat(rows.chunks(chunk_size.max(1)).map(parse_rows))
}

/// Parse `rows` with chunks spread over the rayon pool; `on_chunk` is called once per finished
/// chunk with the number of chunks done so far.
///
/// Output is identical to [`process_rows`] for the same input and chunk size.
pub fn process_rows_parallel<F>(rows: &[RawRow], chunk_size: usize, on_chunk: F) -> SampleSeries
where
    F: Fn(usize, usize) + Sync,
{
    let chunk_size = chunk_size.max(1);
    let chunks = rows.len().div_ceil(chunk_size);
    let done = std::sync::atomic::AtomicUsize::new(0);
    let parsed: Vec<SampleSeries> = rows
        .par_chunks(chunk_size)
        .map(|chunk| {
            let series = parse_rows(chunk);
            let finished = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            on_chunk(finished, chunks);
            series
        })
        .collect();
    concat(parsed)
}

fn concat(parts: impl IntoIterator<Item = SampleSeries>) -> SampleSeries {
    parts
        .into_iter()
        .fold(SampleSeries::default(), |mut acc, mut part| {
            acc.samples.append(&mut part.samples);
            acc.report = acc.report.merge(part.report);
            acc
        })
}

/// Derive every view of a parsed series.
pub fn build_bundle(series: SampleSeries, config: &PipelineConfig) -> FlightBundle {
    let SampleSeries {
        mut samples,
        report,
    } = series;
    if report.dropped_rows > 0 {
        warn!(
            "dropped {} of {} rows with missing columns",
            report.dropped_rows, report.total_rows
        );
    }
    if samples.is_empty() {
        info!("no usable samples in {} rows", report.total_rows);
        return FlightBundle {
            statistics: statistics(&report, 0, 0, 0),
            ..FlightBundle::default()
        };
    }

    let reference = ReferencePressure::from_samples(&samples);
    apply_altitude(&mut samples, reference);
    let boundaries = ParameterBoundaries::compute(&samples);
    let chart_series = ChartSeries::from_samples(&samples, config.chart_max_points);
    let map_track = MapTrack::from_samples(&samples, config.map_target_segments);

    let gps_data = lttb(&samples, config.target_3d_points);
    debug!(
        "3D path reduced from {} to {} samples",
        samples.len(),
        gps_data.len()
    );
    let trajectory = config.estimator().estimate(&gps_data, reference);
    let segments = path_segments(&trajectory.positions);

    let lengths = SpaceLengths {
        raw: samples.len(),
        chart: chart_series.len(),
        path: trajectory.positions.len(),
        map: map_track.len(),
    };
    let statistics = statistics(
        &report,
        chart_series.len(),
        trajectory.positions.len(),
        map_track.len(),
    );
    info!(
        "dataset ready: {} samples, {} chart points, {} path points, {} map points",
        lengths.raw, lengths.chart, lengths.path, lengths.map
    );

    FlightBundle {
        positions: trajectory.positions,
        orientations: trajectory.orientations,
        gps_data,
        chart_series,
        map_track,
        boundaries,
        segments,
        reference_pressure: reference,
        statistics,
        lengths,
        samples,
    }
}

fn statistics(report: &ParseReport, chart: usize, path: usize, map: usize) -> DatasetStatistics {
    DatasetStatistics {
        total_records: report.kept_rows,
        dropped_rows: report.dropped_rows,
        chart_points: chart,
        rendered_3d_points: path,
        map_segments: map.saturating_sub(1),
    }
}

/// Synchronous pipeline run over `rows`.
pub fn run_pipeline(rows: &[RawRow], config: &PipelineConfig) -> FlightBundle {
    build_bundle(process_rows(rows, config.chunk_size), config)
}
