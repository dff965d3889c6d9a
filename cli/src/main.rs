//! FLIGHTVIZ: command-line front end of the flight-sensor pipeline.
//!
//! - `process`: load a recording, run the pipeline and write the render bundle as JSON.
//! - `select`: resolve a selection made in one view into every other view.
//! - `config`: write the default pipeline configuration to a file.
//!
//! Pipeline tunables come from `--config` (TOML/JSON/YAML); without it the defaults apply.

mod common;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use common::{init_logger, validate_input_path};
use flightviz::boundaries::Parameter;
use flightviz::config::PipelineConfig;
use flightviz::index::{IndexRange, IndexSpace};
use flightviz::pipeline::FlightBundle;
use flightviz::records::read_raw_rows_from_path;
use flightviz::session::{FlightSession, Selection};
use flightviz::worker::Progress;
use log::{debug, info, warn};
use serde::Serialize;

const LONG_ABOUT: &str = "FLIGHTVIZ: turn flight-sensor recordings into 3D path, map and chart data.

Input is a CSV file with a header row and the columns Ax, Ay, Az, Mx, My, Mz, lon, lat,
Pressure and Temperature, plus an optional datetime column. Rows missing any of the
required columns are dropped; malformed numbers are kept as NaN.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Flight-sensor recording pipeline.", long_about = LONG_ABOUT)]
struct Cli {
    /// Pipeline configuration file (TOML/JSON/YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Process rows on the calling thread instead of a background worker
    #[arg(long, global = true)]
    no_worker: bool,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(name = "process", about = "Run the pipeline and write the render bundle")]
    Process(ProcessArgs),
    #[command(name = "select", about = "Resolve a selection into every index space")]
    Select(SelectArgs),
    #[command(name = "config", about = "Write the default configuration file")]
    Config(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct ProcessArgs {
    /// Input CSV file
    input: PathBuf,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parameter used to colour the path (altitude, pressure, temperature)
    #[arg(short, long, default_value = "altitude")]
    parameter: Parameter,
}

#[derive(Args, Clone, Debug)]
struct SelectArgs {
    /// Input CSV file
    input: PathBuf,

    /// First selected index (inclusive)
    #[arg(long)]
    start: usize,

    /// Last selected index (inclusive)
    #[arg(long)]
    end: usize,

    /// Index space of the selection (raw, chart, path, map)
    #[arg(long, default_value = "chart")]
    space: IndexSpace,
}

#[derive(Args, Clone, Debug)]
struct ConfigArgs {
    /// Destination file; the extension selects the format
    #[arg(short, long)]
    write: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessOutput<'a> {
    parameter: Parameter,
    segment_colors: Vec<&'static str>,
    #[serde(flatten)]
    bundle: &'a FlightBundle,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?,
        None => PipelineConfig::default(),
    };
    if cli.no_worker {
        config.use_worker = false;
    }
    Ok(config)
}

fn load_session(input: &Path, config: PipelineConfig) -> Result<FlightSession> {
    validate_input_path(input)?;
    let rows = read_raw_rows_from_path(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;
    let mut session = FlightSession::new(config);
    let bundle = session.load_with_progress(rows, |p: &Progress| {
        debug!("{:>5.1}% {}", p.percent, p.message);
    });
    let stats = bundle.statistics;
    info!(
        "{} records ({} dropped), {} chart points, {} path points, {} map segments",
        stats.total_records,
        stats.dropped_rows,
        stats.chart_points,
        stats.rendered_3d_points,
        stats.map_segments
    );
    if let Some(notice) = session.notice() {
        warn!("{notice}");
    }
    Ok(session)
}

fn run_process(args: &ProcessArgs, config: PipelineConfig) -> Result<()> {
    let mut session = load_session(&args.input, config)?;
    session.set_parameter(args.parameter);
    let segment_colors = session.segment_colors();
    let Some(bundle) = session.bundle() else {
        bail!("no dataset loaded from '{}'", args.input.display());
    };
    let output = ProcessOutput {
        parameter: args.parameter,
        segment_colors,
        bundle,
    };
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create '{}'", path.display()))?;
            serde_json::to_writer(BufWriter::new(file), &output)?;
            info!("bundle written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &output)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn describe(range: Option<IndexRange>) -> String {
    match range {
        Some(r) => format!("[{}, {}]", r.start, r.end),
        None => "-".to_string(),
    }
}

fn run_select(args: &SelectArgs, config: PipelineConfig) -> Result<()> {
    let mut session = load_session(&args.input, config)?;
    let selection = Selection {
        start: args.start,
        end: args.end,
        source: args.space,
    };
    let Some(resolved) = session.publish(selection) else {
        bail!("the {} space of '{}' is empty", args.space, args.input.display());
    };
    for space in IndexSpace::ALL {
        println!("{:<6} {}", space.to_string(), describe(resolved.range(space)));
    }
    println!("{:<6} {}", "segs", describe(resolved.segments));
    if let Some(summary) = resolved.path.and_then(|p| session.summary(p)) {
        println!(
            "mean   ax {:.2} ay {:.2} az {:.2} | mx {:.2} my {:.2} mz {:.2} | {:.2} hPa {:.2} °C",
            summary.ax,
            summary.ay,
            summary.az,
            summary.mx,
            summary.my,
            summary.mz,
            summary.pressure,
            summary.temperature
        );
    }
    Ok(())
}

fn run_config(args: &ConfigArgs) -> Result<()> {
    PipelineConfig::default()
        .to_file(&args.write)
        .with_context(|| format!("failed to write '{}'", args.write.display()))?;
    info!("default configuration written to {}", args.write.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match &cli.command {
        Command::Process(args) => run_process(args, load_config(&cli)?),
        Command::Select(args) => run_select(args, load_config(&cli)?),
        Command::Config(args) => run_config(args),
    }
}
