//! An `Either` type that holds a literal integer or the name of a register, decided once when the
//! program is loaded.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

use crate::register::RegisterFile;

/// Register names are interned, so clones are cheap and comparisons are pointer comparisons.
pub type RegisterName = DefaultAtom;

/// The type every register holds and every operand resolves to.
pub type Value = i64;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Operand {
  /// An integer written directly in the program text.
  Literal(Value),
  /// A reference to the current contents of a register.
  Register(RegisterName)
}

impl Operand {

  /// Resolves the operand against a register file. Registers that were never written read 0.
  pub fn resolve(&self, registers: &RegisterFile) -> Value {
    match self {
      Operand::Literal(value)  => *value,
      Operand::Register(name)  => registers.get(name)
    }
  }

  pub fn register<S: Into<RegisterName>>(name: S) -> Operand {
    Operand::Register(name.into())
  }

  /// The register name, if this operand names a register.
  pub fn as_register(&self) -> Option<&RegisterName> {
    match self {
      Operand::Register(name) => Some(name),
      _                       => None
    }
  }

}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operand::Literal(value) => {
        write!(f, "{}", value)
      },
      Operand::Register(name) => {
        write!(f, "{}", name)
      }
    }
  }
}

impl From<Value> for Operand {
  fn from(value: Value) -> Operand {
    Operand::Literal(value)
  }
}
