//! End-to-end scenarios of the flight pipeline.
//!
//! These tests drive the public API the way a viewer does: rows come in (from a CSV stream or
//! built in memory), the pipeline runs, and selections made in one view are resolved into the
//! others. Expected values are derived from the formulas the views share, so the tests double as
//! a description of the conventions every consumer relies on.
use std::io::Cursor;

use assert_approx_eq::assert_approx_eq;
use flightviz::altitude::altitude;
use flightviz::boundaries::{Category, Parameter};
use flightviz::config::PipelineConfig;
use flightviz::index::{IndexMapper, IndexRange, IndexSpace, SpaceLengths, map_index};
use flightviz::pipeline::run_pipeline;
use flightviz::records::{REQUIRED_COLUMNS, RawRow, read_raw_rows};
use flightviz::session::{FlightSession, Selection};

fn sync_config() -> PipelineConfig {
    PipelineConfig {
        use_worker: false,
        ..PipelineConfig::default()
    }
}

fn flight_rows(n: usize) -> Vec<RawRow> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let mut row = RawRow::new();
            row.insert("Ax", format!("{}", (t * 0.01).sin() * 0.2));
            row.insert("Ay", format!("{}", (t * 0.02).cos() * 0.1));
            row.insert("Az", "0.98");
            row.insert("Mx", format!("{}", 20.0 + (t * 0.001).sin()));
            row.insert("My", "-3.5");
            row.insert("Mz", "42.0");
            row.insert("lon", format!("{}", 9.0 + t * 2e-5));
            row.insert("lat", format!("{}", 45.5 + (t * 0.002).sin() * 0.01));
            row.insert("Pressure", format!("{}", 1013.0 - 50.0 * (t * 0.0005).sin().abs()));
            row.insert("Temperature", format!("{}", 20.0 - t * 1e-4));
            row.insert("datetime", format!("{}", 1_715_000_000_000i64 + i as i64 * 200));
            row
        })
        .collect()
}

#[test]
fn ten_rows_with_one_low_pressure_reading() {
    let rows: Vec<RawRow> = (0..10)
        .map(|i| {
            let mut row = RawRow::from_pairs(REQUIRED_COLUMNS.iter().map(|c| (*c, "1")));
            row.insert("Pressure", if i == 5 { "900" } else { "1000" });
            row
        })
        .collect();
    let bundle = run_pipeline(&rows, &sync_config());

    assert_eq!(bundle.reference_pressure.value(), Some(1000.0));
    assert_eq!(bundle.samples.len(), 10);
    let expected = 44330.0 * (1.0 - (900.0_f64 / 1000.0).powf(1.0 / 5.255));
    assert_approx_eq!(bundle.samples[5].altitude, expected);
    assert_approx_eq!(bundle.samples[5].altitude, 879.947, 1e-3);
    for (i, s) in bundle.samples.iter().enumerate() {
        if i != 5 {
            assert_eq!(s.altitude, 0.0);
        }
    }
    // no datetime column, so nothing is charted
    assert!(bundle.chart_series.is_empty());
    assert_eq!(bundle.positions.len(), 10);
}

#[test]
fn fifty_thousand_rows_reduce_to_path_budget() {
    let rows = flight_rows(50_000);
    let bundle = run_pipeline(&rows, &sync_config());
    assert_eq!(bundle.samples.len(), 50_000);
    assert_eq!(bundle.gps_data.len(), 15_000);
    assert_eq!(bundle.positions.len(), 15_000);
    assert_eq!(bundle.orientations.len(), 15_000);
    assert_eq!(bundle.gps_data[0], bundle.samples[0]);
    assert_eq!(bundle.gps_data[14_999], bundle.samples[49_999]);
    assert_eq!(bundle.chart_series.len(), 10_000);
    assert_eq!(bundle.map_track.len(), 3_000);
    assert_eq!(
        bundle.lengths,
        SpaceLengths {
            raw: 50_000,
            chart: 10_000,
            path: 15_000,
            map: 3_000,
        }
    );
    assert!(
        bundle
            .positions
            .iter()
            .all(|p| p.iter().all(|c| c.is_finite()))
    );
}

#[test]
fn chart_selection_maps_onto_gps_track() {
    assert_eq!(map_index(100, 1000, 5000), 500);
    assert_eq!(map_index(200, 1000, 5000), 1000);
    let mapper = IndexMapper::new(SpaceLengths {
        raw: 5000,
        chart: 1000,
        path: 5000,
        map: 5000,
    });
    assert_eq!(
        mapper.map_range(IndexRange::new(100, 200), IndexSpace::Chart, IndexSpace::Map),
        IndexRange::new(500, 1000)
    );
}

#[test]
fn csv_stream_to_bundle() {
    let csv = "\
datetime,Ax,Ay,Az,Mx,My,Mz,lon,lat,Pressure,Temperature
2024-06-01 12:00:00,0.1,0.0,0.98,20,-3,40,8.50000,46.00000,1000.0,21.5
2024-06-01 12:00:01,0.1,0.0,0.98,20,-3,40,8.50010,46.00010,999.5,21.4
2024-06-01 12:00:02,0.1,oops,0.98,20,-3,40,8.50020,46.00020,999.0,21.3
,0.1,0.0,0.98,20,-3,40,8.50030,46.00030,998.5,21.2
2024-06-01 12:00:04,0.1,0.0,0.98,20,-3,40,8.50040
";
    let rows = read_raw_rows(Cursor::new(csv)).unwrap();
    assert_eq!(rows.len(), 5);
    let bundle = run_pipeline(&rows, &sync_config());

    // the short last row lacks Pressure and Temperature
    assert_eq!(bundle.statistics.total_records, 4);
    assert_eq!(bundle.statistics.dropped_rows, 1);
    assert!(bundle.samples[2].ay.is_nan());
    // the row with an empty datetime stays on the path but leaves the charts
    assert_eq!(bundle.chart_series.len(), 3);
    assert_eq!(bundle.positions.len(), 4);
    assert_eq!(
        bundle.chart_series.time_labels[1] - bundle.chart_series.time_labels[0],
        1000
    );
    assert_approx_eq!(bundle.samples[3].altitude, altitude(998.5, 1000.0));

    let temperature = bundle.boundaries.temperature.unwrap();
    assert_approx_eq!(temperature.min, 21.2);
    assert_approx_eq!(temperature.high, 21.5);
    assert_eq!(
        bundle.boundaries.category_of(Parameter::Temperature, 21.5),
        Category::High
    );
}

#[test]
fn selection_round_trip_through_session() {
    let mut session = FlightSession::new(sync_config());
    session.load(flight_rows(20_000));
    let resolved = session
        .publish(Selection {
            start: 2_000,
            end: 4_000,
            source: IndexSpace::Chart,
        })
        .unwrap();
    // chart 10 000 -> raw 20 000 -> path 15 000 -> map 3 000
    assert_eq!(resolved.raw, IndexRange::new(4_000, 8_000));
    assert_eq!(resolved.path, Some(IndexRange::new(3_000, 6_000)));
    assert_eq!(resolved.map, Some(IndexRange::new(600, 1_200)));
    let segments = resolved.segments.unwrap();
    assert_eq!(segments, IndexRange::new(40, 80));

    let highlight = session.map_highlight();
    assert!(highlight.len() <= 500);
    assert_eq!(highlight.first().map(|p| p.0), Some(600));
    assert_eq!(highlight.last().map(|p| p.1), Some(1_200));
}

#[test]
fn worker_and_synchronous_paths_agree() {
    let rows = flight_rows(12_345);
    let sync = run_pipeline(&rows, &sync_config());
    let mut session = FlightSession::new(PipelineConfig {
        chunk_size: 1_000,
        ..PipelineConfig::default()
    });
    let threaded = session.load(rows).clone();
    assert_eq!(sync, threaded);
    assert!(session.notice().is_none());
}
