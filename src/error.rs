//! Errors raised while loading assembly and while running a machine. Halting is never an error;
//! see `machine::Halt` for the ways a machine stops normally.

use thiserror::Error;

use crate::bytecode::{Instruction, Operation};

/// Problems found while turning assembly text into a program. Every variant carries the
/// 1-based line number it was found on.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LoadError {
  #[error("line {line}: unknown instruction `{name}`")]
  UnknownOperation { line: usize, name: String },

  #[error("line {line}: {operation} takes {expected} arguments but was given {given}")]
  WrongArity {
    line      : usize,
    operation : Operation,
    expected  : usize,
    given     : usize
  },

  #[error("line {line}: {operation} needs a register as its first argument, found `{found}`")]
  ExpectedRegister {
    line      : usize,
    operation : Operation,
    found     : String
  },

  #[error("line {line}: `{text}` is neither an integer nor a register name")]
  BadOperand { line: usize, text: String },
}

/// Fatal conditions hit while executing. These abort the machine that raised them.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ExecutionError {
  #[error("modulo by zero at instruction {pc}: {instruction}")]
  ModuloByZero { pc: usize, instruction: Instruction },

  /// A self-looped `rcv` fired before the machine had sent anything to recover.
  #[error("nothing to recover at instruction {pc}: {instruction} fired before any snd")]
  NothingSent { pc: usize, instruction: Instruction },
}
