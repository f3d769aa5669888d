/*!
  Runs two copies of one program against each other. Machine 0 sends on `channels[0]`, which
  machine 1 receives from, and machine 1 sends on `channels[1]`, which machine 0 receives from.
  Each machine runs on its own thread; a third thread runs the monitor and is cancelled once
  both machines have been joined.

  ```text
          ┌──── channels[0] ────┐
          │                     v
     machine 0             machine 1
          ^                     │
          └──── channels[1] ────┘
  ```
*/

use std::panic;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::bounded;
use tracing::{debug, info, warn};

use crate::bytecode::Instruction;
use crate::channel::Channel;
use crate::error::ExecutionError;
use crate::machine::{run_peer, Report};
use crate::monitor::{self, MonitorOptions, MonitorSummary};
use crate::operand::Value;

/// What each machine ended with.
pub type MachineResult = Result<Report, ExecutionError>;

#[derive(Debug)]
pub struct DuetOutcome {
  /// Indexed by machine id.
  pub machines : [MachineResult; 2],
  pub monitor  : MonitorSummary,
  /// Everything each machine sent, indexed by the sender's id.
  pub sent     : [Vec<Value>; 2],
}

impl DuetOutcome {

  /// How many values machine `id` sent, whether or not it later failed.
  pub fn sent_by(&self, id: usize) -> usize {
    self.sent[id].len()
  }

  pub fn deadlocked(&self) -> bool {
    self.monitor.deadlocked
  }

}

pub struct Duet<'p> {
  program : &'p [Instruction],
  options : MonitorOptions,
}

impl<'p> Duet<'p> {

  pub fn new(program: &'p [Instruction]) -> Duet<'p> {
    Duet {
      program,
      options: MonitorOptions::default()
    }
  }

  pub fn with_options(mut self, options: MonitorOptions) -> Duet<'p> {
    self.options = options;
    self
  }

  /**
    Runs both machines to completion. A machine that fails closes its output channel, so its
    peer is released and both results are always returned. Without deadlock detection a pair
    that waits on each other never returns.
  */
  pub fn run(&self) -> DuetOutcome {
    let channels: [Arc<Channel>; 2] = [Arc::new(Channel::new()), Arc::new(Channel::new())];
    let (stop, stopped) = bounded::<()>(0);
    let program = self.program;
    let options = self.options;

    let (machines, summary) = thread::scope(|scope| {
      let watched = &channels;
      let monitor = scope.spawn(move || monitor::watch(watched, options, stopped));

      let handles = [0usize, 1].map(|id| {
        let output = Arc::clone(&channels[id]);
        let input  = Arc::clone(&channels[1 - id]);
        scope.spawn(move || run_peer(program, id as Value, output, input))
      });

      let machines = handles.map(|handle| {
        let result = handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload));
        match &result {
          Ok(report) => {
            info!(id = report.id, sent = report.sent, steps = report.steps, halt = ?report.halt, "machine finished");
          }
          Err(error) => {
            warn!(%error, "machine failed");
          }
        }
        result
      });

      // Cancels the monitor.
      drop(stop);
      let summary = monitor.join().unwrap_or_else(|payload| panic::resume_unwind(payload));
      debug!(reports = summary.reports, deadlocked = summary.deadlocked, "monitor stopped");
      (machines, summary)
    });

    DuetOutcome {
      machines,
      monitor : summary,
      sent    : [channels[0].values(), channels[1].values()],
    }
  }

}
