//! The fetch-decode-execute loop of a single machine.
//!
//! A machine owns its register file, program counter and output channel, and borrows the
//! program. What `rcv` does depends on the `Mode` the machine was built with.

use std::convert::TryFrom;
#[cfg(feature = "trace_computation")]
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::debug;

use crate::bytecode::Instruction;
use crate::channel::Channel;
use crate::error::ExecutionError;
use crate::operand::Value;
use crate::register::RegisterFile;

/// How `rcv` behaves.
#[derive(Clone, Debug)]
pub enum Mode {
  /// The machine listens to itself. `rcv x` is a test: if `x` is nonzero the machine stops and
  /// recovers the last value it sent.
  SelfLoop,
  /// The machine listens to a peer. `rcv x` blocks until the peer has sent one more value than
  /// this machine has consumed, then stores it in `x`.
  Peer { input: Arc<Channel> },
}

/// Why a machine stopped. None of these are errors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Halt {
  /// The program counter left the program.
  OutOfRange,
  /// A self-looped `rcv` fired, recovering the last value sent.
  Recovered(Value),
  /// A peer-mode `rcv` waited on a channel that was closed before the value arrived.
  Disconnected,
}

impl Halt {
  /// The value recovered by a self-looped `rcv`, if that is how the machine stopped.
  pub fn recovered(&self) -> Option<Value> {
    match self {
      Halt::Recovered(value) => Some(*value),
      _                      => None
    }
  }
}

/// The result of one execution step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
  Continue,
  Halted(Halt),
}

/// Everything worth knowing about a machine after it stopped.
#[derive(Clone, Debug)]
pub struct Report {
  pub id        : Value,
  pub halt      : Halt,
  /// Values sent to the output channel.
  pub sent      : usize,
  /// Values consumed from the input channel. Always 0 in self-loop mode.
  pub received  : usize,
  /// Instructions executed.
  pub steps     : u64,
  pub registers : RegisterFile,
}

pub struct Machine<'p> {
  id        : Value,
  program   : &'p [Instruction],
  registers : RegisterFile,
  /// Signed so that backward jumps past the start are representable; they halt the machine.
  pc        : i64,
  mode      : Mode,
  output    : Arc<Channel>,
  sent      : usize,
  /// The consumption counter: the index of the next value to read from the input channel.
  consumed  : usize,
  steps     : u64,
}

impl<'p> Machine<'p> {

  /// Builds a machine whose register file holds only the id register.
  pub fn new(program: &'p [Instruction], id: Value, mode: Mode, output: Arc<Channel>) -> Machine<'p> {
    Machine {
      id,
      program,
      registers : RegisterFile::with_id(id),
      pc        : 0,
      mode,
      output,
      sent      : 0,
      consumed  : 0,
      steps     : 0,
    }
  }

  /// A machine that sends to a fresh channel of its own and treats `rcv` as a local test.
  pub fn self_looped(program: &'p [Instruction], id: Value) -> Machine<'p> {
    Machine::new(program, id, Mode::SelfLoop, Arc::new(Channel::new()))
  }

  /// A machine that sends on `output` and receives from `input`.
  pub fn peer(
    program : &'p [Instruction],
    id      : Value,
    output  : Arc<Channel>,
    input   : Arc<Channel>
  ) -> Machine<'p> {
    Machine::new(program, id, Mode::Peer { input }, output)
  }

  // region Accessors

  #[cfg(test)]
  pub fn id(&self) -> Value {
    self.id
  }

  #[cfg(test)]
  pub fn pc(&self) -> i64 {
    self.pc
  }

  #[cfg(test)]
  pub fn registers(&self) -> &RegisterFile {
    &self.registers
  }

  /// Mutable access for seeding registers before the machine runs.
  #[cfg(test)]
  pub fn registers_mut(&mut self) -> &mut RegisterFile {
    &mut self.registers
  }

  #[cfg(test)]
  pub fn sent(&self) -> usize {
    self.sent
  }

  // endregion

  /// The instruction at the program counter, or `None` if the counter is out of range.
  fn fetch(&self) -> Option<(usize, &'p Instruction)> {
    let program: &'p [Instruction] = self.program;
    let index = usize::try_from(self.pc).ok()?;
    program.get(index).map(|instruction| (index, instruction))
  }

  /**
    Executes the instruction at the program counter and advances the counter. A counter outside
    the program, including one pushed there by a jump, halts the machine with
    `Halt::OutOfRange`. In peer mode this blocks inside `rcv` until the peer sends.
  */
  pub fn step(&mut self) -> Result<Step, ExecutionError> {
    let (pc, instruction) =
      match self.fetch() {
        Some(fetched) => fetched,
        None          => return Ok(Step::Halted(Halt::OutOfRange))
      };

    // The distance to the next instruction.
    let mut offset: Value = 1;

    match instruction {

      Instruction::Send(src) => {
        let value = src.resolve(&self.registers);
        self.output.send(value);
        self.sent += 1;
      }

      Instruction::Set(dst, src) => {
        let value = src.resolve(&self.registers);
        self.registers.set(dst, value);
      }

      Instruction::Add(dst, src) => {
        let rhs  = src.resolve(&self.registers);
        let slot = self.registers.slot(dst);
        *slot = slot.wrapping_add(rhs);
      }

      Instruction::Multiply(dst, src) => {
        let rhs  = src.resolve(&self.registers);
        let slot = self.registers.slot(dst);
        *slot = slot.wrapping_mul(rhs);
      }

      Instruction::Modulo(dst, src) => {
        let rhs = src.resolve(&self.registers);
        if rhs == 0 {
          return Err(ExecutionError::ModuloByZero { pc, instruction: instruction.clone() });
        }
        // Truncated remainder: the sign follows the dividend.
        let slot = self.registers.slot(dst);
        *slot = slot.wrapping_rem(rhs);
      }

      Instruction::Receive(dst) => {
        match &self.mode {

          Mode::SelfLoop => {
            if self.registers.get(dst) != 0 {
              self.steps += 1;
              return match self.output.last() {
                Some(value) => Ok(Step::Halted(Halt::Recovered(value))),
                None        => Err(ExecutionError::NothingSent { pc, instruction: instruction.clone() })
              };
            }
          }

          Mode::Peer { input } => {
            match input.receive(self.consumed) {
              Some(value) => {
                self.consumed += 1;
                self.registers.set(dst, value);
              }
              None => {
                return Ok(Step::Halted(Halt::Disconnected));
              }
            }
          }

        } // end match mode
      }

      Instruction::JumpIfPositive(test, jump) => {
        if test.resolve(&self.registers) > 0 {
          offset = jump.resolve(&self.registers);
        }
      }

    } // end match instruction

    self.steps += 1;

    #[cfg(feature = "trace_computation")]
      println!("{:>5}: {}\n{}", pc, instruction, self);

    match self.pc.checked_add(offset) {
      Some(next) => {
        self.pc = next;
        Ok(Step::Continue)
      }
      // A counter that overflows is as far outside the program as a counter can be.
      None => Ok(Step::Halted(Halt::OutOfRange))
    }
  }

  /// Steps until the machine halts or fails.
  pub fn run(&mut self) -> Result<Halt, ExecutionError> {
    loop {
      match self.step() {

        Ok(Step::Continue) => {}

        Ok(Step::Halted(halt)) => {
          debug!(id = self.id, pc = self.pc, steps = self.steps, sent = self.sent, ?halt, "machine halted");
          return Ok(halt);
        }

        Err(error) => {
          debug!(id = self.id, pc = self.pc, %error, "machine failed");
          return Err(error);
        }

      }
    }
  }

  pub fn into_report(self, halt: Halt) -> Report {
    Report {
      id        : self.id,
      halt,
      sent      : self.sent,
      received  : self.consumed,
      steps     : self.steps,
      registers : self.registers,
    }
  }

}

#[cfg(feature = "trace_computation")]
impl Display for Machine<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let highlight = self.fetch().and_then(|(_, instruction)| instruction.destination());
    let registers = self.registers.make_table(highlight);
    write!(
      f,
      "Machine {}\tpc: {}\tsent: {}\treceived: {}\n{}",
      self.id, self.pc, self.sent, self.consumed, registers
    )
  }
}

/**
  Runs one machine in self-loop mode. Returns the value recovered by the first `rcv` that fires,
  or `None` if the program runs off its end first.
*/
pub fn run_self_loop(program: &[Instruction], id: Value) -> Result<Option<Value>, ExecutionError> {
  let mut machine = Machine::self_looped(program, id);
  let halt = machine.run()?;
  Ok(halt.recovered())
}

/**
  Runs one machine in peer mode until it stops, then closes `send` so that a peer waiting on it
  is released instead of blocking forever. The channel is closed on failure too.
*/
pub fn run_peer(
  program : &[Instruction],
  id      : Value,
  send    : Arc<Channel>,
  receive : Arc<Channel>
) -> Result<Report, ExecutionError> {
  let mut machine = Machine::peer(program, id, Arc::clone(&send), receive);
  let result = machine.run();
  send.close();
  result.map(|halt| machine.into_report(halt))
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;
  use crossbeam::channel as xchannel;

  use crate::bytecode::parse_assembly;
  use crate::operand::{Operand, RegisterName};

  fn load(text: &str) -> Vec<Instruction> {
    parse_assembly(text).unwrap()
  }

  fn reg(name: &str) -> RegisterName {
    RegisterName::from(name)
  }

  #[test]
  fn straight_line_runs_each_instruction_once() {
    let program = load("set a 7\nadd a 5\nmul a a\nmod a 10\nset b a\nadd b -1");
    let mut machine = Machine::self_looped(&program, 0);

    for expected_pc in 0..program.len() as i64 {
      assert_eq!(machine.pc(), expected_pc);
      assert_eq!(machine.step(), Ok(Step::Continue));
    }
    assert_eq!(machine.pc(), program.len() as i64);
    assert_eq!(machine.step(), Ok(Step::Halted(Halt::OutOfRange)));

    let report = machine.into_report(Halt::OutOfRange);
    assert_eq!(report.steps, program.len() as u64);
    assert_eq!(report.registers.get(&reg("a")), 4);
    assert_eq!(report.registers.get(&reg("b")), 3);
  }

  #[test]
  fn machine_is_seeded_with_id() {
    let program = load("set q p");
    let mut machine = Machine::self_looped(&program, 9);
    assert_eq!(machine.run(), Ok(Halt::OutOfRange));
    assert_eq!(machine.registers().get(&reg("q")), 9);
    assert_eq!(machine.id(), 9);
  }

  #[test]
  fn jump_not_taken_is_a_no_op() {
    let program = load("jgz a 5\njgz 0 5\njgz -3 5\nset b 1");
    let mut machine = Machine::self_looped(&program, 0);
    for expected_pc in 1..=3 {
      machine.step().unwrap();
      assert_eq!(machine.pc(), expected_pc);
    }
  }

  #[test]
  fn jump_taken_moves_by_offset() {
    // Counts `a` down from 3 with a backward jump.
    let program = load("set a 3\nadd b 1\nadd a -1\njgz a -2\nset c 1");
    let mut machine = Machine::self_looped(&program, 0);
    assert_eq!(machine.run(), Ok(Halt::OutOfRange));
    assert_eq!(machine.registers().get(&reg("b")), 3);
    assert_eq!(machine.registers().get(&reg("c")), 1);

    let program = load("set a 2\njgz a a\nset b 1\nset c 1");
    let mut machine = Machine::self_looped(&program, 0);
    machine.step().unwrap();
    machine.step().unwrap();
    assert_eq!(machine.pc(), 3);
  }

  #[test]
  fn jump_out_of_range_halts() {
    for text in &["jgz 1 -1", "jgz 1 2", "set a 1\njgz a -5"] {
      let program = load(text);
      let mut machine = Machine::self_looped(&program, 0);
      assert_eq!(machine.run(), Ok(Halt::OutOfRange), "program `{}`", text);
    }

    // Counter overflow is an ordinary halt too.
    let program = vec![
      Instruction::JumpIfPositive(Operand::Literal(1), Operand::Literal(1)),
      Instruction::JumpIfPositive(Operand::Literal(1), Operand::Literal(Value::max_value())),
    ];
    let mut machine = Machine::self_looped(&program, 0);
    assert_eq!(machine.step(), Ok(Step::Continue));
    assert_eq!(machine.step(), Ok(Step::Halted(Halt::OutOfRange)));
  }

  #[test]
  fn empty_program_halts_immediately() {
    let program: Vec<Instruction> = vec![];
    assert_eq!(run_self_loop(&program, 0), Ok(None));
  }

  #[test]
  fn arithmetic_wraps() {
    let program = load("set a 9223372036854775807\nadd a 1\nset b -9223372036854775808\nmod b -1");
    let mut machine = Machine::self_looped(&program, 0);
    assert_eq!(machine.run(), Ok(Halt::OutOfRange));
    assert_eq!(machine.registers().get(&reg("a")), Value::min_value());
    assert_eq!(machine.registers().get(&reg("b")), 0);
  }

  #[test]
  fn modulo_sign_follows_dividend() {
    let program = load("set a -7\nmod a 3\nset b 7\nmod b -3");
    let mut machine = Machine::self_looped(&program, 0);
    machine.run().unwrap();
    assert_eq!(machine.registers().get(&reg("a")), -1);
    assert_eq!(machine.registers().get(&reg("b")), 1);
  }

  #[test]
  fn modulo_by_zero_is_fatal() {
    let program = load("set a 5\nmod a b");
    let mut machine = Machine::self_looped(&program, 0);
    assert_eq!(
      machine.run(),
      Err(ExecutionError::ModuloByZero { pc: 1, instruction: program[1].clone() })
    );
  }

  #[test]
  fn self_loop_recovers_last_sent() {
    let program = load("snd 5\nrcv x");
    let mut machine = Machine::self_looped(&program, 0);
    machine.registers_mut().set(&reg("x"), 1);
    assert_eq!(machine.run(), Ok(Halt::Recovered(5)));
    assert_eq!(machine.sent(), 1);
  }

  #[test]
  fn self_loop_receive_on_zero_continues() {
    let program = load("snd 5\nrcv x\nset y 1");
    let mut machine = Machine::self_looped(&program, 0);
    assert_eq!(machine.run(), Ok(Halt::OutOfRange));
    assert_eq!(machine.registers().get(&reg("y")), 1);
    assert_eq!(machine.registers().get(&reg("x")), 0);
  }

  #[test]
  fn self_loop_recovers_most_recent() {
    let program = load("snd 1\nsnd 2\nsnd 3\nset x 1\nrcv x");
    assert_eq!(run_self_loop(&program, 0), Ok(Some(3)));
  }

  #[test]
  fn self_loop_receive_before_send_is_fatal() {
    let program = load("rcv p");
    assert_eq!(
      run_self_loop(&program, 1),
      Err(ExecutionError::NothingSent { pc: 0, instruction: program[0].clone() })
    );
    // With id 0 the same receive is a no-op.
    assert_eq!(run_self_loop(&program, 0), Ok(None));
  }

  #[test]
  fn canonical_self_loop_program() {
    let program = load(
      "set a 1
add a 2
mul a a
mod a 5
snd a
set a 0
rcv a
jgz a -1
set a 1
jgz a -2"
    );
    assert_eq!(run_self_loop(&program, 0), Ok(Some(4)));
  }

  #[test]
  fn peer_receive_reads_by_index() {
    let program = load("rcv a\nrcv b\nrcv c");
    let output = Arc::new(Channel::new());
    let input  = Arc::new(Channel::new());
    for value in &[4, 5, 6, 7] {
      input.send(*value);
    }

    let report = run_peer(&program, 0, Arc::clone(&output), Arc::clone(&input)).unwrap();
    assert_eq!(report.halt, Halt::OutOfRange);
    assert_eq!(report.received, 3);
    assert_eq!(report.registers.get(&reg("a")), 4);
    assert_eq!(report.registers.get(&reg("c")), 6);
    // Reading never removes values.
    assert_eq!(input.values(), vec![4, 5, 6, 7]);
    assert!(output.is_closed());
  }

  #[test]
  fn peer_receive_blocks_until_sent() {
    let program = load("rcv a\nsnd a");
    let output = Arc::new(Channel::new());
    let input  = Arc::new(Channel::new());
    let (done_tx, done_rx) = xchannel::bounded(1);

    let (out, inp) = (Arc::clone(&output), Arc::clone(&input));
    let handle = thread::spawn(move || {
      done_tx.send(run_peer(&program, 0, out, inp)).unwrap();
    });

    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    input.send(42);
    let report = done_rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    handle.join().unwrap();

    assert_eq!(report.halt, Halt::OutOfRange);
    assert_eq!(output.values(), vec![42]);
  }

  #[test]
  fn peer_disconnects_on_closed_input() {
    let program = load("rcv a\nrcv b\nset c 1");
    let output = Arc::new(Channel::new());
    let input  = Arc::new(Channel::new());
    input.send(1);
    input.close();

    let report = run_peer(&program, 1, output, input).unwrap();
    assert_eq!(report.halt, Halt::Disconnected);
    assert_eq!(report.received, 1);
    assert_eq!(report.registers.get(&reg("c")), 0);
  }

  #[test]
  fn failed_peer_closes_output() {
    let program = load("snd 1\nmod a 0");
    let output = Arc::new(Channel::new());
    let input  = Arc::new(Channel::new());
    assert!(matches!(
      run_peer(&program, 0, Arc::clone(&output), input),
      Err(ExecutionError::ModuloByZero { pc: 1, .. })
    ));
    assert!(output.is_closed());
    assert_eq!(output.values(), vec![1]);
  }
}
