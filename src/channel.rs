//! A one-directional, append-only message channel between two machines.
//!
//! Values are never removed: the producer appends, and the consumer reads by absolute index,
//! keeping its own count of how far it has read. A reader that asks for an index the channel does
//! not hold yet parks on a condition variable until the producer appends or the channel is
//! closed. Closing only promises that nothing more will be appended; values already in the
//! channel stay readable.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::operand::Value;

#[derive(Debug, Default)]
struct ChannelState {
  values      : Vec<Value>,
  closed      : bool,
  /// The index a parked reader is waiting for, if a reader is parked.
  waiting_for : Option<usize>,
}

/// A point-in-time view of a channel, used to decide whether its reader is stuck.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelSnapshot {
  pub len         : usize,
  pub closed      : bool,
  pub waiting_for : Option<usize>,
}

impl ChannelSnapshot {
  /// True if a reader is parked on an index the open channel does not hold.
  pub fn is_starved(&self) -> bool {
    match self.waiting_for {
      Some(index) => !self.closed && index >= self.len,
      None        => false
    }
  }
}

#[derive(Debug, Default)]
pub struct Channel {
  state    : Mutex<ChannelState>,
  /// Signalled on every append and on close.
  changed  : Condvar,
}

impl Channel {

  pub fn new() -> Channel {
    Channel::default()
  }

  // Values are only ever pushed, so a poisoned lock still guards a consistent `Vec`.
  fn lock(&self) -> MutexGuard<'_, ChannelState> {
    match self.state.lock() {
      Ok(guard)     => guard,
      Err(poisoned) => poisoned.into_inner()
    }
  }

  /// Appends a value and wakes the reader. Returns the index the value was stored at. Appending
  /// to a closed channel is ignored and returns `None`.
  pub fn send(&self, value: Value) -> Option<usize> {
    let mut state = self.lock();
    if state.closed {
      return None;
    }
    state.values.push(value);
    let index = state.values.len() - 1;
    drop(state);
    self.changed.notify_all();
    Some(index)
  }

  /**
    Blocks until the channel holds a value at `index` and returns it. Returns `None` once the
    channel is closed without ever reaching `index`. There is no timeout: if the producer never
    sends enough values and nobody closes the channel, this never returns.
  */
  pub fn receive(&self, index: usize) -> Option<Value> {
    let mut state = self.lock();
    loop {
      if let Some(value) = state.values.get(index) {
        let value = *value;
        state.waiting_for = None;
        return Some(value);
      }
      if state.closed {
        state.waiting_for = None;
        return None;
      }
      state.waiting_for = Some(index);
      state = match self.changed.wait(state) {
        Ok(guard)     => guard,
        Err(poisoned) => poisoned.into_inner()
      };
    }
  }

  /// Non-blocking read of the value at `index`.
  #[cfg(test)]
  pub fn get(&self, index: usize) -> Option<Value> {
    self.lock().values.get(index).copied()
  }

  /// The most recently appended value.
  pub fn last(&self) -> Option<Value> {
    self.lock().values.last().copied()
  }

  pub fn len(&self) -> usize {
    self.lock().values.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Marks the channel finished and wakes any parked reader. Closing twice is harmless.
  pub fn close(&self) {
    self.lock().closed = true;
    self.changed.notify_all();
  }

  #[cfg(test)]
  pub fn is_closed(&self) -> bool {
    self.lock().closed
  }

  pub fn snapshot(&self) -> ChannelSnapshot {
    let state = self.lock();
    ChannelSnapshot {
      len         : state.values.len(),
      closed      : state.closed,
      waiting_for : state.waiting_for,
    }
  }

  /// Copies out every value sent so far.
  pub fn values(&self) -> Vec<Value> {
    self.lock().values.clone()
  }

}
