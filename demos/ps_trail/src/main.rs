use clap::Parser;
use log::{error, info};
use posestream::prelude::*;
use ps_trail::{ChainOptions, HelixTracker};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of ticks to run.
    #[arg(long, default_value_t = 200)]
    ticks: usize,

    /// Helix radius, meters.
    #[arg(long, default_value_t = 0.2)]
    radius: f32,

    /// Helix rise per turn, meters.
    #[arg(long, default_value_t = 0.05)]
    rise: f32,

    /// Angle travelled per tick, degrees.
    #[arg(long, default_value_t = 2.0)]
    step: f32,

    /// Tracking drops out after this many ticks (0 keeps tracking).
    #[arg(long, default_value_t = 0)]
    tracked: u64,

    /// Ticks without tracking after each tracked run.
    #[arg(long, default_value_t = 0)]
    gap: u64,

    /// Only pass poses within this distance of the origin, after 3 hits.
    #[arg(long)]
    gate_radius: Option<f32>,

    /// Re-express poses relative to a fixed reference (see --config delta=...).
    #[arg(long)]
    relative: bool,

    /// Deadzone radius, meters.
    #[arg(long)]
    deadzone: Option<f32>,

    /// Moving average radius, samples.
    #[arg(long)]
    average: Option<usize>,

    /// Path simplification distance, meters.
    #[arg(long)]
    simplify: Option<f32>,

    /// Catmull-Rom resampling density, samples per meter.
    #[arg(long)]
    resample: Option<f32>,

    /// Derive roll-less ribbon orientations.
    #[arg(long)]
    ribbon: bool,

    /// Warn instead of failing on protocol violations.
    #[arg(long)]
    lenient: bool,

    /// Per stage settings as `stage=RON map`, e.g. `average={"radius": 4}`.
    /// Repeatable. Stages: gate, delta, deadzone, average, simplify, resample, ribbon.
    #[arg(long = "config", value_name = "STAGE=RON")]
    configs: Vec<String>,

    /// Keep only the last N points of the trail.
    #[arg(long)]
    trail: Option<usize>,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn run(args: Args) -> PsResult<()> {
    let mut options = ChainOptions {
        gate_radius: args.gate_radius,
        relative: args.relative,
        deadzone: args.deadzone,
        average: args.average,
        simplify: args.simplify,
        resample: args.resample,
        ribbon: args.ribbon,
        lenient: args.lenient,
        ..Default::default()
    };
    for config in &args.configs {
        options.add_override(config)?;
    }

    let tracker = HelixTracker::new(args.radius, args.rise, degrees_to_radians(args.step))
        .with_gaps(args.tracked, args.gap);
    let collector = Rc::new(RefCell::new(PoseCollector::new()));
    let mut sinks: Vec<Box<dyn PoseSink>> = vec![Box::new(collector.clone())];
    let trail = match args.trail {
        Some(capacity) => {
            let trail = Rc::new(RefCell::new(PointBuffer::new(capacity)?));
            sinks.push(Box::new(trail.clone()));
            Some(trail)
        }
        None => None,
    };

    let chain = options.build()?.fan_out(sinks);
    let mut driver = TickDriver::new(tracker).with_sink(chain);
    let outcomes = driver.run(args.ticks)?;
    driver.shutdown()?;

    let sessions = outcomes
        .iter()
        .filter(|o| **o == TickOutcome::Opened)
        .count();
    let collector = collector.borrow();
    info!(
        "{} ticks, {} samples sent in {} sessions, {} poses out",
        driver.ticks(),
        driver.sent(),
        sessions,
        collector.len()
    );

    match trail {
        Some(trail) => {
            for point in trail.borrow().points() {
                println!("{:.5} {:.5} {:.5}", point.x, point.y, point.z);
            }
        }
        None => {
            for pose in collector.poses() {
                let p = pose.position;
                let q = pose.rotation;
                println!(
                    "{:.5} {:.5} {:.5} {:.5} {:.5} {:.5} {:.5}",
                    p.x, p.y, p.z, q.x, q.y, q.z, q.w
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("could not set up logging: {e}");
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
