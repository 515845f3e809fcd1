use fldiag::config::{Config, Initialization};
use fldiag::interval::DoubleInterval;
use fldiag::zonotope::DoubleZonotope;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let init = Initialization::start(Config::default())?;
    let path = init.path();
    println!("path = {:?}", path);

    // Intervals forget that both operands of `x - x` are the same value.
    let x = DoubleInterval::between(0.0, 1.0)?;
    println!("x = {:?}", x);
    let d = x.sub(&x, path);
    println!("x - x = {:?}", d);
    let one = DoubleInterval::from_f64(1.0);
    let p = x.mul(&one.sub(&x, path), path);
    println!("x * (1 - x) = {:?}", p);

    // Zonotopes keep it.
    let z = DoubleZonotope::between(0.0, 1.0, path)?;
    println!("z = {:?}", z);
    let d = z.sub(&z, path);
    println!("z - z = {:?}", d);
    let one = DoubleZonotope::from_f64(1.0, path);
    let p = z.mul(&one.sub(&z, path), path);
    println!("z * (1 - z) = {:?}", p);

    // A literal which is not exact in binary is widened unless literals are atomic.
    let tenth = DoubleZonotope::from_literal(0.1, path);
    println!("0.1 = {:?}", tenth);
    let sum = (0..10).fold(DoubleZonotope::from_f64(0.0, path), |sum, _| sum.add(&tenth, path));
    println!("0.1 + ... + 0.1 = {:?}", sum);

    p.persist("z * (1 - z)", path)?;
    sum.persist("sum", path)?;

    println!("findings = {}", path.diagnostics().findings().len());
    init.finish()?;

    Ok(())
}
