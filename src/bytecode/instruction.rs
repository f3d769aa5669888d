use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use crate::operand::{Operand, RegisterName};

/**
  Opcodes of the machine. The `strum` serializations are the assembly mnemonics, so
  `Operation::from_str("jgz")` and `Operation::JumpIfPositive.to_string()` convert between the
  two forms.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter,
Clone,        Copy,          Eq, PartialEq,  Debug,  Hash
)]
pub enum Operation {
  #[strum(serialize = "snd")]
  Send,            // snd( src )
  #[strum(serialize = "set")]
  Set,             // set( dst, src )
  #[strum(serialize = "add")]
  Add,             // add( dst, src )
  #[strum(serialize = "mul")]
  Multiply,        // mul( dst, src )
  #[strum(serialize = "mod")]
  Modulo,          // mod( dst, src )
  #[strum(serialize = "rcv")]
  Receive,         // rcv( dst )
  #[strum(serialize = "jgz")]
  JumpIfPositive,  // jgz( test, offset )
}

impl Operation {

  /// The number of arguments the operation is written with.
  pub fn arity(&self) -> usize {
    match self {
      Operation::Send | Operation::Receive => 1,
      _                                    => 2
    }
  }

  /// Whether the first argument is written to, and so must name a register.
  pub fn has_destination(&self) -> bool {
    match self {
      Operation::Send | Operation::JumpIfPositive => false,
      _                                           => true
    }
  }

  pub fn mnemonic(&self) -> &'static str {
    (*self).into()
  }

}

/// A decoded instruction. Destinations are register names rather than operands, so an
/// instruction that writes to a literal cannot be represented.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  Send(Operand),
  Set(RegisterName, Operand),
  Add(RegisterName, Operand),
  Multiply(RegisterName, Operand),
  Modulo(RegisterName, Operand),
  Receive(RegisterName),
  JumpIfPositive(Operand, Operand),
}

impl Instruction {

  pub fn operation(&self) -> Operation {
    match self {
      Instruction::Send(_)              => Operation::Send,
      Instruction::Set(_, _)            => Operation::Set,
      Instruction::Add(_, _)            => Operation::Add,
      Instruction::Multiply(_, _)       => Operation::Multiply,
      Instruction::Modulo(_, _)         => Operation::Modulo,
      Instruction::Receive(_)           => Operation::Receive,
      Instruction::JumpIfPositive(_, _) => Operation::JumpIfPositive,
    }
  }

  /// The register this instruction writes, if any. Only the traced machine dump asks.
  #[allow(dead_code)]
  pub fn destination(&self) -> Option<&RegisterName> {
    match self {
      | Instruction::Set(dst, _)
      | Instruction::Add(dst, _)
      | Instruction::Multiply(dst, _)
      | Instruction::Modulo(dst, _)
      | Instruction::Receive(dst) => Some(dst),

      | Instruction::Send(_)
      | Instruction::JumpIfPositive(_, _) => None
    }
  }

}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let opcode = self.operation().mnemonic();
    match self {

      Instruction::Send(src) => {
        write!(f, "{} {}", opcode, src)
      }

      | Instruction::Set(dst, src)
      | Instruction::Add(dst, src)
      | Instruction::Multiply(dst, src)
      | Instruction::Modulo(dst, src) => {
        write!(f, "{} {} {}", opcode, dst, src)
      }

      Instruction::Receive(dst) => {
        write!(f, "{} {}", opcode, dst)
      }

      Instruction::JumpIfPositive(test, offset) => {
        write!(f, "{} {} {}", opcode, test, offset)
      }

    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;
  use strum::IntoEnumIterator;

  #[test]
  fn mnemonics_round_trip() {
    for operation in Operation::iter() {
      assert_eq!(Operation::from_str(operation.mnemonic()).ok(), Some(operation));
    }
    assert_eq!(Operation::JumpIfPositive.to_string(), "jgz");
  }

  #[test]
  fn unknown_mnemonic() {
    assert!(Operation::from_str("nop").is_err());
    assert!(Operation::from_str("SND").is_err());
  }

  #[test]
  fn arity_and_destination() {
    assert_eq!(Operation::Send.arity(), 1);
    assert_eq!(Operation::Receive.arity(), 1);
    assert_eq!(Operation::Modulo.arity(), 2);
    assert!(Operation::Set.has_destination());
    assert!(Operation::Receive.has_destination());
    assert!(!Operation::JumpIfPositive.has_destination());
  }

  #[test]
  fn display() {
    let a = RegisterName::from("a");
    assert_eq!(Instruction::Set(a.clone(), Operand::Literal(-4)).to_string(), "set a -4");
    assert_eq!(Instruction::Receive(a.clone()).to_string(), "rcv a");
    assert_eq!(
      Instruction::JumpIfPositive(Operand::register("a"), Operand::Literal(-2)).to_string(),
      "jgz a -2"
    );
  }

  #[test]
  fn destinations() {
    let a = RegisterName::from("a");
    assert_eq!(Instruction::Modulo(a.clone(), Operand::Literal(3)).destination(), Some(&a));
    assert_eq!(Instruction::Receive(a.clone()).destination(), Some(&a));
    assert_eq!(Instruction::Send(Operand::register("a")).destination(), None);
  }
}
