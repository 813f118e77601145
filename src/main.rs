//! gatesim - CLI Entry Point
//!
//! Commands:
//! - `gatesim blinker` - Simulate the blinking counter and print its waveform
//! - `gatesim chain` - Simulate the gated PID chain against a stimulus
//! - `gatesim view <circuit>` - Interactive stepper (requires the `tui` feature)
//! - `gatesim test` - Built-in self-test

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gatesim::{Blinker, JsonLinesTrace, MemoryTrace, PidChain, RunConfig, Simulator, TraceSink, Transform};

#[derive(Parser)]
#[command(name = "gatesim")]
#[command(version = "0.1.0")]
#[command(about = "A two-phase digital logic simulator with a blinker and a gated PID chain")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the blinking counter
    Blinker {
        /// Counter period in cycles
        #[arg(short, long)]
        period: Option<u32>,
        /// Number of cycles to simulate
        #[arg(short, long)]
        cycles: Option<u64>,
        /// Append a JSON-lines trace to this file
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Run configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Simulate the gated PID chain
    Chain {
        /// Number of cycles to simulate
        #[arg(short, long)]
        cycles: Option<u64>,
        /// Set `pid_enable` before the first cycle
        #[arg(short, long)]
        enable: bool,
        /// Input value per cycle (last value is held)
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
        /// Append a JSON-lines trace to this file
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Run configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Step a circuit interactively
    View {
        circuit: Circuit,
        /// Run configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the built-in self-test
    Test,
}

#[derive(Clone, Copy, ValueEnum)]
enum Circuit {
    Blinker,
    Chain,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Blinker { period, cycles, trace, config }) => {
            let mut config = load_config(config);
            if let Some(p) = period {
                config.period = p;
            }
            if let Some(c) = cycles {
                config.cycles = c;
            }
            if trace.is_some() {
                config.trace = trace;
            }
            run_blinker(&config);
        }
        Some(Commands::Chain { cycles, enable, input, trace, config }) => {
            let mut config = load_config(config);
            if let Some(c) = cycles {
                config.cycles = c;
            }
            if enable {
                config.csr.insert("pid_enable".into(), 1);
            }
            if !input.is_empty() {
                config.stimulus = input;
            }
            if trace.is_some() {
                config.trace = trace;
            }
            run_chain(&config);
        }
        Some(Commands::View { circuit, config }) => {
            let config = load_config(config);
            view(circuit, &config);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("gatesim v0.1.0");
            println!("A two-phase digital logic simulator");
            println!();
            println!("Use --help for available commands");
            println!();
            run_blinker(&RunConfig::default());
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "gatesim=warn",
        1 => "gatesim=debug",
        _ => "gatesim=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> RunConfig {
    match path {
        Some(path) => match RunConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    }
}

fn open_trace(config: &RunConfig) -> Option<Box<dyn TraceSink>> {
    let path = config.trace.as_ref()?;
    match JsonLinesTrace::append_to(path) {
        Ok(sink) => {
            println!("📝 Tracing to {}", path.display());
            Some(Box::new(sink))
        }
        Err(e) => {
            eprintln!("❌ Failed to open trace {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn fail(what: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}: {}", what, e);
    std::process::exit(1);
}

fn run_blinker(config: &RunConfig) {
    let (design, b) = Blinker::design(config.period).unwrap_or_else(|e| fail("Failed to build blinker", e));
    let mut sim = Simulator::new(design).unwrap_or_else(|e| fail("Failed to elaborate", e));
    if let Err(e) = config.apply_csrs(&mut sim) {
        fail("Failed to write registers", e);
    }
    let mut sink = open_trace(config);

    println!("━━━ Blinker (period {}) ━━━", b.period);
    println!("{:>5}  {:>7}  {:>7}  {:>12}", "cycle", "counter", "blinker", "blinker_sync");

    for _ in 0..config.cycles {
        println!(
            "{:>5}  {:>7}  {:>7}  {:>12}",
            sim.cycle(),
            sim.peek(b.counter),
            sim.peek(b.blinker),
            sim.peek(b.blinker_sync),
        );
        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.record(&sim.snapshot()) {
                fail("Trace write failed", e);
            }
        }
        if let Err(e) = sim.step() {
            fail(&format!("Simulation error at cycle {}", sim.cycle()), e);
        }
    }

    if let Some(sink) = sink.as_mut() {
        if let Err(e) = sink.flush() {
            fail("Trace flush failed", e);
        }
    }
}

fn run_chain(config: &RunConfig) {
    let transform = config.transform.build();
    let (design, c) = PidChain::design(config.width, config.signal_width, transform.as_ref())
        .unwrap_or_else(|e| fail("Failed to build chain", e));
    let mut sim = Simulator::new(design).unwrap_or_else(|e| fail("Failed to elaborate", e));
    if let Err(e) = config.apply_csrs(&mut sim) {
        fail("Failed to write registers", e);
    }
    let mut sink = open_trace(config);

    println!(
        "━━━ PID chain ({} → {} bits, transform `{}`) ━━━",
        config.width,
        config.signal_width,
        transform.name()
    );
    println!("pid_enable = {}", sim.peek(c.enable));
    println!("{:>5}  {:>8}  {:>8}  {:>10}", "cycle", "input", "output", "pid_out");

    for _ in 0..config.cycles {
        if let Err(e) = config.apply_stimulus(&mut sim, c.input) {
            fail("Failed to drive input", e);
        }
        println!(
            "{:>5}  {:>8}  {:>8}  {:>10}",
            sim.cycle(),
            sim.peek(c.input),
            sim.peek(c.output),
            sim.peek(c.transform.output),
        );
        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.record(&sim.snapshot()) {
                fail("Trace write failed", e);
            }
        }
        if let Err(e) = sim.step() {
            fail(&format!("Simulation error at cycle {}", sim.cycle()), e);
        }
    }

    if let Some(sink) = sink.as_mut() {
        if let Err(e) = sink.flush() {
            fail("Trace flush failed", e);
        }
    }

    println!();
    println!("━━━ Registers ━━━");
    for entry in sim.csrs() {
        println!("{:<14} {:?}  {}", entry.name, entry.direction, entry.value);
    }
}

#[cfg(feature = "tui")]
fn view(circuit: Circuit, config: &RunConfig) {
    let built = match circuit {
        Circuit::Blinker => Blinker::design(config.period).map(|(d, _)| (d, None)),
        Circuit::Chain => {
            let transform = config.transform.build();
            PidChain::design(config.width, config.signal_width, transform.as_ref())
                .map(|(d, c)| (d, Some(c.input)))
        }
    };
    let (design, input) = built.unwrap_or_else(|e| fail("Failed to build circuit", e));
    let mut sim = Simulator::new(design).unwrap_or_else(|e| fail("Failed to elaborate", e));
    if let Err(e) = config.apply_csrs(&mut sim) {
        fail("Failed to write registers", e);
    }

    if let Err(e) = gatesim::run_viewer(sim, input) {
        fail("Viewer error", e);
    }
}

#[cfg(not(feature = "tui"))]
fn view(_circuit: Circuit, _config: &RunConfig) {
    eprintln!("❌ The viewer requires the `tui` feature");
    std::process::exit(1);
}

fn run_self_test() {
    use gatesim::{Design, Expr, Gain, Shape, SimError};
    use gatesim::circuits::GAIN_SHIFT;

    println!("━━━ gatesim Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Test 1: unsigned wrap
    let ok = Shape::unsigned(3).map(|s| s.wrap(13) == 5).unwrap_or(false);
    check("Unsigned wrap modulo 2^w", ok);

    // Test 2: signed wrap
    let ok = Shape::signed(4).map(|s| s.wrap(8) == -8 && s.wrap(-9) == 7).unwrap_or(false);
    check("Signed two's-complement wrap", ok);

    // Test 3: blinker waveform
    let ok = (|| -> Result<bool, SimError> {
        let (design, b) = Blinker::design(8)?;
        let mut sim = Simulator::new(design)?;
        let mut trace = MemoryTrace::new();
        sim.run(9, &mut trace)?;
        Ok(trace.values_of("blinker.blinker") == [0, 0, 0, 0, 1, 1, 1, 1, 0]
            && trace.values_of("blinker.blinker_sync") == [0, 0, 0, 0, 0, 1, 1, 1, 1]
            && sim.peek(b.counter) == 1)
    })()
    .unwrap_or(false);
    check("Blinker comb/sync timing", ok);

    // Test 4: simultaneous commit
    let ok = (|| -> Result<bool, SimError> {
        let (design, (a, b)) = Design::build("top", |m| {
            let shape = Shape::unsigned(4).ok_or_else(|| SimError::Parameter("shape".into()))?;
            let a = m.signal_with_reset("a", shape, 1)?;
            let b = m.signal_with_reset("b", shape, 2)?;
            m.sync(a, b);
            m.sync(b, a);
            Ok((a, b))
        })?;
        let mut sim = Simulator::new(design)?;
        sim.step()?;
        Ok(sim.peek(a) == 2 && sim.peek(b) == 1)
    })()
    .unwrap_or(false);
    check("Registered swap commits simultaneously", ok);

    // Test 5: loop detection
    let ok = (|| -> Result<bool, SimError> {
        let (design, _) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            m.comb(a, !Expr::sig(a));
            Ok(())
        })?;
        Ok(matches!(Simulator::new(design), Err(SimError::CombinationalLoop { .. })))
    })()
    .unwrap_or(false);
    check("Combinational loop rejected", ok);

    // Test 6: gated chain
    let ok = (|| -> Result<bool, SimError> {
        let (design, c) = PidChain::design(14, 25, &Gain::new(-(1 << GAIN_SHIFT)))?;
        let mut sim = Simulator::new(design)?;
        sim.poke(c.input, 1000)?;
        let bypass = sim.peek(c.output) == 1000;
        sim.csr_write("pid_enable", 1)?;
        Ok(bypass && sim.peek(c.output) == -1000)
    })()
    .unwrap_or(false);
    check("Gated chain bypass and enable", ok);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
