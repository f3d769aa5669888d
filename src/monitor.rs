//! The observer that runs beside a pair of machines. It never touches a machine directly, only
//! the two channels between them: it logs how far the second machine has got, and, when asked
//! to, notices that both machines are waiting on each other and closes the channels so they
//! stop.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{never, select, tick, Receiver};
use tracing::{info, warn};

use crate::channel::Channel;

/// What the monitor should do. With both fields `None` it only waits to be cancelled.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MonitorOptions {
  /// How often to log the length of machine 1's output channel.
  pub report_interval : Option<Duration>,
  /// How often to check for a deadlock. `None` disables detection, so a deadlocked pair blocks
  /// forever.
  pub deadlock_poll   : Option<Duration>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MonitorSummary {
  /// Progress lines logged.
  pub reports    : usize,
  /// Whether the monitor found the machines deadlocked and closed their channels.
  pub deadlocked : bool,
}

/**
  Decides whether two machines wired `0 -> channels[0] -> 1` and `1 -> channels[1] -> 0` are
  deadlocked. Both readers must be parked on values that do not exist, and `channels[0]` must
  look exactly the same before and after `channels[1]` is inspected. An unchanged snapshot means
  machine 1 stayed parked the whole time and sent nothing, so machine 0, parked on machine 1's
  output, can never be woken either.
*/
pub fn is_deadlocked(channels: &[Arc<Channel>; 2]) -> bool {
  let before = channels[0].snapshot();
  if !before.is_starved() {
    return false;
  }
  if !channels[1].snapshot().is_starved() {
    return false;
  }
  channels[0].snapshot() == before
}

/// Runs until `stop` fires or is disconnected.
pub fn watch(channels: &[Arc<Channel>; 2], options: MonitorOptions, stop: Receiver<()>) -> MonitorSummary {
  let reports = match options.report_interval {
    Some(interval) => tick(interval),
    None           => never()
  };
  let polls = match options.deadlock_poll {
    Some(interval) => tick(interval),
    None           => never()
  };

  let mut summary = MonitorSummary::default();

  loop {
    select! {
      recv(stop) -> _ => break,

      recv(reports) -> _ => {
        info!(sent = channels[1].len(), "machine 1 progress");
        summary.reports += 1;
      }

      recv(polls) -> _ => {
        if !summary.deadlocked && is_deadlocked(channels) {
          warn!(
            sent_by_0 = channels[0].len(),
            sent_by_1 = channels[1].len(),
            "both machines are waiting on each other, closing channels"
          );
          for channel in channels.iter() {
            channel.close();
          }
          summary.deadlocked = true;
        }
      }
    }
  }

  summary
}
