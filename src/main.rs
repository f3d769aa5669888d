#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

mod bytecode;
mod channel;
mod duet;
mod error;
mod machine;
mod monitor;
mod operand;
mod register;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bytecode::{parse_assembly, Instruction};
use crate::duet::Duet;
use crate::machine::{run_self_loop, Report};
use crate::monitor::MonitorOptions;

/// How often the monitor checks for a deadlock when detection is on.
const DEADLOCK_POLL: Duration = Duration::from_millis(10);

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Part {
  /// One machine listening to itself; prints the first recovered value.
  One,
  /// Two machines talking to each other; prints how many values machine 1 sent.
  Two,
  Both,
}

#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(about = "Run a snd/rcv register machine program alone and as a pair")]
struct Cli {
  /// Path to the assembly program
  program: PathBuf,

  /// Which scenario to run
  #[arg(long, value_enum, default_value = "both")]
  part: Part,

  /// Milliseconds between progress reports while the pair runs (0 disables them)
  #[arg(long, default_value = "1000")]
  report_interval_ms: u64,

  /// Let a deadlocked pair block forever instead of stopping it
  #[arg(long)]
  no_deadlock_detection: bool,

  /// Print each machine's final registers
  #[arg(long)]
  registers: bool,
}

/// Everything the pair run needs from the command line.
#[derive(Copy, Clone, Debug)]
struct RunOptions {
  report_interval   : Option<Duration>,
  detect_deadlock   : bool,
  print_registers   : bool,
}

impl RunOptions {

  fn from_cli(cli: &Cli) -> RunOptions {
    RunOptions {
      report_interval : match cli.report_interval_ms {
        0  => None,
        ms => Some(Duration::from_millis(ms))
      },
      detect_deadlock : !cli.no_deadlock_detection,
      print_registers : cli.registers,
    }
  }

  fn monitor_options(&self) -> MonitorOptions {
    MonitorOptions {
      report_interval : self.report_interval,
      deadlock_poll   : if self.detect_deadlock { Some(DEADLOCK_POLL) } else { None },
    }
  }

}

fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn load(path: &Path) -> Result<Vec<Instruction>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  let program = parse_assembly(&text)
    .with_context(|| format!("failed to load {}", path.display()))?;
  info!(path = %path.display(), instructions = program.len(), "program loaded");
  Ok(program)
}

fn part_one(program: &[Instruction]) -> Result<()> {
  match run_self_loop(program, 0).context("part 1 failed")? {
    Some(value) => println!("part 1: {}", value),
    None        => println!("part 1: the program finished without recovering a value"),
  }
  Ok(())
}

/// The heading and register table printed for `--registers`.
fn describe(id: usize, report: &Report) -> String {
  format!(
    "machine {} ({:?}, {} steps, sent {}, received {}):\n{}",
    id, report.halt, report.steps, report.sent, report.received, report.registers
  )
}

fn part_two(program: &[Instruction], options: RunOptions) -> Result<()> {
  let outcome = Duet::new(program).with_options(options.monitor_options()).run();

  if outcome.deadlocked() {
    info!("the machines deadlocked and were stopped");
  }

  for (id, result) in outcome.machines.iter().enumerate() {
    match result {
      Ok(report) => {
        if options.print_registers {
          println!("{}", describe(id, report));
        }
      }
      Err(failure) => error!(id, %failure, "machine failed"),
    }
  }

  println!("part 2: {}", outcome.sent_by(1));

  if let Some(Err(failure)) = outcome.machines.iter().find(|result| result.is_err()) {
    return Err(failure.clone()).context("part 2 failed");
  }
  Ok(())
}

fn run(cli: &Cli) -> Result<()> {
  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let program = load(&cli.program)?;
  let options = RunOptions::from_cli(cli);

  if cli.part != Part::Two {
    part_one(&program)?;
  }
  if cli.part != Part::One {
    part_two(&program, options)?;
  }
  Ok(())
}

fn main() {
  init_logging();
  let cli = Cli::parse();

  if let Err(failure) = run(&cli) {
    error!("{:#}", failure);
    process::exit(1);
  }
}
