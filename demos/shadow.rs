use clap::Parser;

use fldiag::config::{Config, Initialization};
use fldiag::shadow::{DoubleShadow, FloatShadow};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of terms of the harmonic series.
    #[arg(value_name = "INT", default_value = "1000")]
    n: i64,

    /// Report operations whose relative error is above this value.
    #[clap(long, value_name = "FLOAT")]
    threshold: Option<f64>,

    /// Report the rounding error of every operation.
    #[clap(long)]
    verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut config = Config::default().with_verbose(args.verbose);
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    let init = Initialization::start(config)?;
    let path = init.path();

    // Harmonic series in single precision.
    let one = FloatShadow::from_i64(1);
    let mut sum = FloatShadow::from_i64(0);
    for k in 1..=args.n {
        sum = sum.add(&one.div(&FloatShadow::from_i64(k), path), path);
    }
    println!("H({}) = {:?}", args.n, sum);
    println!("relative error = {:e}", sum.relative_error());

    // Catastrophic cancellation.
    let big = DoubleShadow::from_f64(1e16);
    let x = big.add(&DoubleShadow::from_f64(1.0), path).sub(&big, path);
    println!("(1e16 + 1) - 1e16 = {:?}", x);
    let half = DoubleShadow::from_f64(0.5);
    println!("(1e16 + 1) - 1e16 > 0.5: {}", x.gt(&half, path));

    // Overflow in single precision for a finite real result.
    let q = FloatShadow::from_f32(1e20).div(&FloatShadow::from_f32(1e-20), path);
    println!("1e20 / 1e-20 = {:?}", q);

    sum.persist("harmonic", path)?;
    x.persist("cancellation", path)?;

    let problems = path.diagnostics().count(|finding| finding.is_problem());
    println!("{} problems:", problems);
    for finding in path.diagnostics().findings() {
        if finding.is_problem() {
            println!("  {}", finding);
        }
    }
    if let Some((error, site)) = path.diagnostics().maximal_error() {
        println!("maximal relative error {:e} at {}", error, site);
    }

    init.finish()?;

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
