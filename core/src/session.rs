//! Loaded-dataset state and cross-view selection.
//!
//! A [`FlightSession`] owns everything derived from the current file: the [`FlightBundle`], the
//! parameter used for colouring, the load generation and the [`SelectionBus`]. Loading a new file
//! replaces the bundle as a whole and bumps the generation, so nothing computed for an earlier file
//! can leak into the new one.
//!
//! Views never talk to each other directly. A view reports a [`Selection`] in its own index
//! space; the session resolves it into every space and hands the same [`ResolvedSelection`] to all
//! subscribed listeners in subscription order.
use std::time::Instant;

use crossbeam::channel::unbounded;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boundaries::Parameter;
use crate::charts::ChartSeries;
use crate::config::PipelineConfig;
use crate::index::{IndexMapper, IndexRange, IndexSpace};
use crate::pipeline::{FlightBundle, build_bundle, process_rows};
use crate::records::{RawRow, SampleSeries};
use crate::segments::{SensorSummary, segment_colors, segment_range_for};
use crate::worker::{
    NoticeKind, ProcessingNotice, Progress, ProgressTracker, WorkerOutcome, await_worker,
    spawn_worker,
};

/// A range picked in one view, in that view's index space. Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub source: IndexSpace,
}

/// A selection expressed in every index space of the current dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedSelection {
    pub source: IndexSpace,
    pub raw: IndexRange,
    pub chart: Option<IndexRange>,
    pub path: Option<IndexRange>,
    pub map: Option<IndexRange>,
    /// Path segments touched by the selection
    pub segments: Option<IndexRange>,
}

impl ResolvedSelection {
    /// Resolve `selection` against `mapper`; `None` when its source space is empty.
    pub fn resolve(selection: Selection, mapper: &IndexMapper) -> Option<Self> {
        let lengths = mapper.lengths();
        if lengths.len(selection.source) == 0 {
            return None;
        }
        let source = IndexRange::new(selection.start, selection.end);
        let into = |space: IndexSpace| {
            (lengths.len(space) > 0).then(|| mapper.map_range(source, selection.source, space))
        };
        let raw = into(IndexSpace::Raw)?;
        let path = into(IndexSpace::Path);
        Some(ResolvedSelection {
            source: selection.source,
            raw,
            chart: into(IndexSpace::Chart),
            path,
            map: into(IndexSpace::Map),
            segments: path.and_then(|p| segment_range_for(p.start, p.end, lengths.path)),
        })
    }

    pub fn range(&self, space: IndexSpace) -> Option<IndexRange> {
        match space {
            IndexSpace::Raw => Some(self.raw),
            IndexSpace::Chart => self.chart,
            IndexSpace::Path => self.path,
            IndexSpace::Map => self.map,
        }
    }
}

/// Receives every selection change; `None` means the selection was cleared.
pub trait SelectionListener {
    fn selection_changed(&mut self, selection: Option<&ResolvedSelection>);
}

impl<F> SelectionListener for F
where
    F: FnMut(Option<&ResolvedSelection>),
{
    fn selection_changed(&mut self, selection: Option<&ResolvedSelection>) {
        self(selection)
    }
}

/// Synchronous observer list.
#[derive(Default)]
pub struct SelectionBus {
    listeners: Vec<Box<dyn SelectionListener>>,
}

impl SelectionBus {
    pub fn new() -> Self {
        SelectionBus::default()
    }
    /// Add a listener; returns its position in the notification order.
    pub fn subscribe(&mut self, listener: Box<dyn SelectionListener>) -> usize {
        self.listeners.push(listener);
        self.listeners.len() - 1
    }
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
    pub fn dispatch(&mut self, selection: Option<&ResolvedSelection>) {
        for listener in self.listeners.iter_mut() {
            listener.selection_changed(selection);
        }
    }
}

/// State of the currently loaded dataset.
pub struct FlightSession {
    config: PipelineConfig,
    generation: u64,
    bundle: Option<FlightBundle>,
    parameter: Parameter,
    selection: Option<ResolvedSelection>,
    notice: Option<ProcessingNotice>,
    bus: SelectionBus,
}

impl FlightSession {
    pub fn new(config: PipelineConfig) -> Self {
        FlightSession {
            config,
            generation: 0,
            bundle: None,
            parameter: Parameter::default(),
            selection: None,
            notice: None,
            bus: SelectionBus::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn bundle(&self) -> Option<&FlightBundle> {
        self.bundle.as_ref()
    }
    /// Notice left by the last load when it fell back to synchronous processing.
    pub fn notice(&self) -> Option<&ProcessingNotice> {
        self.notice.as_ref()
    }
    pub fn selection(&self) -> Option<&ResolvedSelection> {
        self.selection.as_ref()
    }
    pub fn parameter(&self) -> Parameter {
        self.parameter
    }
    /// Change the colouring parameter. Boundaries are not touched; they cover every parameter.
    pub fn set_parameter(&mut self, parameter: Parameter) {
        self.parameter = parameter;
    }
    pub fn subscribe(&mut self, listener: Box<dyn SelectionListener>) -> usize {
        self.bus.subscribe(listener)
    }

    /// Replace the current dataset with `rows`.
    pub fn load(&mut self, rows: Vec<RawRow>) -> &FlightBundle {
        self.load_with_progress(rows, |_| {})
    }

    /// Replace the current dataset with `rows`, reporting non-decreasing progress.
    pub fn load_with_progress<F>(&mut self, rows: Vec<RawRow>, mut on_progress: F) -> &FlightBundle
    where
        F: FnMut(&Progress),
    {
        self.generation += 1;
        let generation = self.generation;
        self.bundle = None;
        self.notice = None;
        if self.selection.take().is_some() {
            self.bus.dispatch(None);
        }
        info!("load {generation}: {} rows", rows.len());
        let started = Instant::now();

        let mut tracker = ProgressTracker::new();
        let series = if self.config.use_worker {
            self.process_in_worker(generation, rows, &mut tracker, &mut on_progress)
        } else {
            on_progress(&tracker.advance(Progress::new(10.0, "Processing rows")));
            process_rows(&rows, self.config.chunk_size)
        };
        on_progress(&tracker.advance(Progress::new(98.0, "Building views")));
        let bundle = build_bundle(series, &self.config);
        on_progress(&tracker.advance(Progress::new(100.0, "Complete")));
        info!("load {generation} finished in {:?}", started.elapsed());
        self.bundle.insert(bundle)
    }

    fn process_in_worker(
        &mut self,
        generation: u64,
        rows: Vec<RawRow>,
        tracker: &mut ProgressTracker,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> SampleSeries {
        // one channel per load; once it is dropped a late worker result has nowhere to go
        let (sender, receiver) = unbounded();
        let kind = match spawn_worker(generation, rows.clone(), self.config.chunk_size, sender) {
            Ok(_) => match await_worker(
                &receiver,
                generation,
                self.config.worker_timeout(),
                tracker,
                &mut *on_progress,
            ) {
                WorkerOutcome::Complete(series) => return series,
                WorkerOutcome::TimedOut => NoticeKind::TimedOut,
                WorkerOutcome::Failed(reason) => NoticeKind::Failed(reason),
                WorkerOutcome::Disconnected => NoticeKind::Disconnected,
            },
            Err(e) => NoticeKind::Unavailable(e.to_string()),
        };
        let notice = ProcessingNotice { generation, kind };
        warn!("load {generation}: {notice}");
        self.notice = Some(notice);
        process_rows(&rows, self.config.chunk_size)
    }

    /// Resolve `selection` and notify every listener. Ignored while no dataset is loaded.
    pub fn publish(&mut self, selection: Selection) -> Option<ResolvedSelection> {
        let mapper = self.bundle.as_ref()?.mapper();
        let resolved = ResolvedSelection::resolve(selection, &mapper)?;
        self.selection = Some(resolved);
        self.bus.dispatch(Some(&resolved));
        Some(resolved)
    }

    /// Clear the selection and notify every listener.
    pub fn reset_selection(&mut self) {
        self.selection = None;
        self.bus.dispatch(None);
    }

    /// Chart rows under the current selection, or the whole series without one.
    pub fn chart_view(&self) -> Option<ChartSeries> {
        let bundle = self.bundle.as_ref()?;
        Some(match self.selection.and_then(|s| s.chart) {
            Some(range) => bundle.chart_series.slice(range.start, range.end),
            None => bundle.chart_series.clone(),
        })
    }

    /// Map highlight polylines of the current selection.
    pub fn map_highlight(&self) -> Vec<(usize, usize)> {
        match (self.bundle.as_ref(), self.selection.and_then(|s| s.map)) {
            (Some(bundle), Some(range)) => bundle.map_track.highlight_pairs(
                range.start,
                range.end,
                self.config.map_highlight_max_segments,
            ),
            _ => Vec::new(),
        }
    }

    /// Colour of every path segment for the active parameter.
    pub fn segment_colors(&self) -> Vec<&'static str> {
        match self.bundle.as_ref() {
            Some(b) => segment_colors(
                &b.segments,
                b.positions.len(),
                &b.samples,
                self.parameter,
                &b.boundaries,
            ),
            None => Vec::new(),
        }
    }

    /// Sensor averages under a path-space range.
    pub fn summary(&self, path: IndexRange) -> Option<SensorSummary> {
        let bundle = self.bundle.as_ref()?;
        SensorSummary::over(&bundle.samples, &bundle.positions, path)
    }
}

impl Default for FlightSession {
    fn default() -> Self {
        FlightSession::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SpaceLengths;
    use crate::pipeline::run_pipeline;
    use crate::records::REQUIRED_COLUMNS;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rows(n: usize) -> Vec<RawRow> {
        (0..n)
            .map(|i| {
                let mut row = RawRow::from_pairs(REQUIRED_COLUMNS.iter().map(|c| (*c, "0.1")));
                row.insert("lon", format!("{}", 8.0 + i as f64 * 1e-4));
                row.insert("lat", format!("{}", 46.0 + i as f64 * 1e-4));
                row.insert("Pressure", format!("{}", 1000.0 - i as f64 * 0.01));
                row.insert("datetime", format!("{}", 1_700_000_000_000u64 + i as u64 * 100));
                row
            })
            .collect()
    }

    fn sync_config() -> PipelineConfig {
        PipelineConfig {
            use_worker: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn resolve_into_every_space() {
        let mapper = IndexMapper::new(SpaceLengths {
            raw: 10_000,
            chart: 1000,
            path: 2000,
            map: 5000,
        });
        let selection = Selection {
            start: 200,
            end: 100,
            source: IndexSpace::Chart,
        };
        let r = ResolvedSelection::resolve(selection, &mapper).unwrap();
        assert_eq!(r.chart, Some(IndexRange::new(100, 200)));
        assert_eq!(r.map, Some(IndexRange::new(500, 1000)));
        assert_eq!(r.raw, IndexRange::new(1000, 2000));
        assert_eq!(r.path, Some(IndexRange::new(200, 400)));
        assert_eq!(r.segments, Some(IndexRange::new(13, 26)));
    }

    #[test]
    fn empty_source_space_is_ignored() {
        let mapper = IndexMapper::new(SpaceLengths {
            raw: 10,
            chart: 0,
            path: 10,
            map: 10,
        });
        let chart = Selection {
            start: 0,
            end: 3,
            source: IndexSpace::Chart,
        };
        assert!(ResolvedSelection::resolve(chart, &mapper).is_none());
        let path = Selection {
            source: IndexSpace::Path,
            ..chart
        };
        let r = ResolvedSelection::resolve(path, &mapper).unwrap();
        assert_eq!(r.chart, None);
    }

    #[test]
    fn listeners_are_notified_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut session = FlightSession::new(sync_config());
        for name in ["charts", "path", "map"] {
            let log = Rc::clone(&log);
            session.subscribe(Box::new(move |s: Option<&ResolvedSelection>| {
                log.borrow_mut().push((name, s.map(|s| s.raw)))
            }));
        }
        let ignored = session.publish(Selection {
            start: 0,
            end: 5,
            source: IndexSpace::Raw,
        });
        assert!(ignored.is_none());
        assert!(log.borrow().is_empty());

        session.load(rows(50));
        session.publish(Selection {
            start: 5,
            end: 9,
            source: IndexSpace::Raw,
        });
        session.reset_selection();
        let log = log.borrow();
        assert_eq!(log.len(), 6);
        assert_eq!(log[0], ("charts", Some(IndexRange::new(5, 9))));
        assert_eq!(log[2].0, "map");
        assert_eq!(log[3], ("charts", None));
    }

    #[test]
    fn reload_discards_selection_and_bumps_generation() {
        let mut session = FlightSession::new(sync_config());
        session.load(rows(30));
        session.publish(Selection {
            start: 1,
            end: 2,
            source: IndexSpace::Path,
        });
        assert!(session.selection().is_some());
        assert_eq!(session.generation(), 1);
        let bundle = session.load(rows(12));
        assert_eq!(bundle.lengths.raw, 12);
        assert_eq!(session.generation(), 2);
        assert!(session.selection().is_none());
    }

    #[test]
    fn worker_and_synchronous_loads_agree() {
        let input = rows(3000);
        let mut sync = FlightSession::new(sync_config());
        let mut threaded = FlightSession::new(PipelineConfig {
            chunk_size: 256,
            ..PipelineConfig::default()
        });
        let mut progress = Vec::new();
        let a = sync.load(input.clone()).clone();
        let b = threaded
            .load_with_progress(input, |p| progress.push(p.percent))
            .clone();
        assert_eq!(a, b);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100.0));
        assert!(threaded.notice().is_none());
    }

    #[test]
    fn timed_out_worker_falls_back_to_synchronous_result() {
        let config = PipelineConfig {
            worker_timeout_secs: 0,
            ..PipelineConfig::default()
        };
        let input = rows(100_000);
        let expected = run_pipeline(&input, &config);
        let mut session = FlightSession::new(config.clone());
        let mut progress = Vec::new();
        let bundle = session
            .load_with_progress(input, |p| progress.push(p.percent))
            .clone();
        assert_eq!(bundle, expected);
        assert_eq!(bundle.lengths.raw, 100_000);
        let notice = session.notice().unwrap();
        assert_eq!(notice.generation, 1);
        assert_eq!(notice.kind, NoticeKind::TimedOut);
        assert!(notice.retryable());
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100.0));

        // the abandoned worker of load 1 may still finish; load 2 must only see its own rows
        let second = rows(300);
        let bundle = session.load(second.clone()).clone();
        assert_eq!(session.generation(), 2);
        assert_eq!(bundle, run_pipeline(&second, &config));
        assert_eq!(bundle.lengths.raw, 300);
        assert!(session.notice().is_none_or(|n| n.generation == 2));
    }

    #[test]
    fn selection_views() {
        let mut session = FlightSession::new(sync_config());
        session.load(rows(100));
        assert_eq!(session.chart_view().unwrap().len(), 100);
        session.publish(Selection {
            start: 10,
            end: 19,
            source: IndexSpace::Chart,
        });
        assert_eq!(session.chart_view().unwrap().len(), 10);
        assert_eq!(session.map_highlight().len(), 9);
        let colors = session.segment_colors();
        assert_eq!(colors.len(), session.bundle().unwrap().segments.len());
        session.set_parameter(Parameter::Pressure);
        assert_eq!(session.parameter(), Parameter::Pressure);
        let summary = session.summary(IndexRange::new(0, 9)).unwrap();
        assert_eq!(summary.count, 10);
        assert_eq!(summary.first_timestamp, Some(1_700_000_000_000));
    }
}
