use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use fldiag::config::{Config, Initialization};
use fldiag::interval::DoubleInterval;
use fldiag::outcome::Outcome;
use fldiag::path::ExecutionPath;
use fldiag::zonotope::DoubleZonotope;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Lower bound of the input.
    #[arg(value_name = "FLOAT", default_value = "0.0", allow_negative_numbers = true)]
    min: f64,

    /// Upper bound of the input.
    #[arg(value_name = "FLOAT", default_value = "1.0", allow_negative_numbers = true)]
    max: f64,

    /// Explore the loop iteration by iteration.
    #[clap(long)]
    unstable_loop: bool,

    /// Write the branches decided along the floating-point flow to this file.
    #[clap(long, value_name = "FILE")]
    record: Option<PathBuf>,

    /// Replay the branches recorded in this file.
    #[clap(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

/// `y = x < 0.5 ? 2x : 2x - 1`, the doubling map.
fn doubling(x: &mut DoubleZonotope, path: &ExecutionPath) -> color_eyre::Result<()> {
    let half = DoubleZonotope::from_f64(0.5, path);
    let one = DoubleZonotope::from_f64(1.0, path);
    let two = DoubleZonotope::from_f64(2.0, path);
    let mut state = (x.clone(),);
    let outcome = path.split_scope(&mut state, |path, (y,)| {
        let doubled = two.mul(y, path);
        *y = if y.lt(&half, path) { doubled } else { doubled.sub(&one, path) };
        Outcome::Value(())
    })?;
    if outcome.is_value() {
        *x = state.0;
    }
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let config = Config::default().with_unstable_in_loop(args.unstable_loop);
    let init = Initialization::start(config)?;
    let path = init.path();

    if let Some(file) = &args.replay {
        path.load_trace(BufReader::new(File::open(file)?))?;
        path.set_follow_flow();
    }

    // Split scope: both sides of the doubling map are merged.
    let mut x = DoubleZonotope::between(args.min, args.max, path)?;
    doubling(&mut x, path)?;
    println!("doubling(x) = {:?}", x);

    // Loop: add 1 while below 3.
    let one = DoubleInterval::from_f64(1.0);
    let three = DoubleInterval::from_f64(3.0);
    let mut state = (DoubleInterval::between(args.min, args.max)?,);
    let outcome = path.unstable_loop(&mut state, |path, (y,)| {
        if y.lt(&three, path) {
            *y = y.add(&one, path);
            Outcome::Value(true)
        } else {
            Outcome::Value(false)
        }
    })?;
    println!("loop outcome = {:?}, y = {:?}", outcome, state.0);

    // Outside of any scope, an ambiguous branch follows the floating-point flow.
    let y = DoubleInterval::between(args.min, args.max)?;
    let middle = DoubleInterval::from_f64((args.min + args.max) / 2.0);
    let taken = y.le(&middle, path);
    println!("y <= middle: {}", taken);
    if let Some(error) = path.take_error() {
        println!("replay failed: {}", error);
    }

    for finding in path.diagnostics().findings() {
        println!("{}", finding);
    }

    if let Some(file) = &args.record {
        let mut out = File::create(file)?;
        path.write_current_path(&mut out)?;
        println!("Recorded {} branches to {}", path.recorded_trace().len(), file.display());
    }

    init.finish()?;

    Ok(())
}
