/*!
  The human readable textual form of a program is called assembly. Each line holds one
  instruction: a mnemonic followed by one or two whitespace separated arguments. An argument is
  either an integer literal, optionally signed, or an alphabetic register name. Blank lines and
  everything after a `#` are ignored.

  ```text
  set a 1      # a = 1
  add a 2
  snd a
  jgz a -1
  ```

  Mnemonics are looked up through the `strum` derives of `Operation`.
*/

use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::is_not,
  character::complete::{
    alpha1,
    char as one_char,
    digit1,
    one_of,
    space0,
    space1
  },
  combinator::{all_consuming, map, map_res, opt, recognize, rest},
  multi::many0,
  sequence::{pair, preceded, terminated, tuple},
  IResult
};

use crate::bytecode::{Instruction, Operation};
use crate::error::LoadError;
use crate::operand::{Operand, Value};

/// A mnemonic and its arguments, exactly as written.
type RawInstruction<'a> = (&'a str, Vec<&'a str>);

// region Parsers

/// A maximal run of characters that are neither blanks nor the comment marker.
fn word(input: &str) -> IResult<&str, &str> {
  is_not(" \t#")(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
  preceded(one_char('#'), rest)(input)
}

/// One line of assembly: nothing at all, or a mnemonic followed by its arguments. Either may be
/// followed by a comment.
fn line(input: &str) -> IResult<&str, Option<RawInstruction<'_>>> {
  all_consuming(
    terminated(
      opt(
        pair(
          preceded(space0, word),
          many0(preceded(space1, word))
        )
      ),
      tuple((space0, opt(comment)))
    )
  )(input)
}

fn literal(input: &str) -> IResult<&str, Operand> {
  map(
    map_res(
      recognize(pair(opt(one_of("+-")), digit1)),
      |text: &str| text.parse::<Value>()
    ),
    Operand::Literal
  )(input)
}

fn register(input: &str) -> IResult<&str, Operand> {
  map(alpha1, |name: &str| Operand::register(name))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
  all_consuming(alt((literal, register)))(input)
}

// endregion

/// Parses one argument, reporting it in full if it is neither a literal nor a register.
fn parse_operand(line_number: usize, text: &str) -> Result<Operand, LoadError> {
  match operand(text) {
    Ok((_rest, operand)) => Ok(operand),
    Err(_e)              => Err(LoadError::BadOperand { line: line_number, text: text.to_string() })
  }
}

/// Checks the shape of a raw instruction and builds the typed `Instruction`.
fn decode(line_number: usize, (name, args): RawInstruction<'_>) -> Result<Instruction, LoadError> {
  let operation = Operation::from_str(name).map_err(|_| {
    LoadError::UnknownOperation { line: line_number, name: name.to_string() }
  })?;

  let wrong_arity = LoadError::WrongArity {
    line      : line_number,
    operation,
    expected  : operation.arity(),
    given     : args.len()
  };
  if args.len() != operation.arity() {
    return Err(wrong_arity);
  }

  let operands = args
    .iter()
    .map(|text| parse_operand(line_number, text))
    .collect::<Result<Vec<Operand>, LoadError>>()?;

  // Destinations must be registers.
  let target =
    match operands.first() {
      Some(first) if operation.has_destination() => {
        let name = first.as_register().cloned().ok_or_else(|| {
          LoadError::ExpectedRegister {
            line  : line_number,
            operation,
            found : first.to_string()
          }
        })?;
        Some(name)
      }
      _ => None
    };

  let instruction =
    match (operation, target, operands.as_slice()) {
      (Operation::Send,           None,      [src])          => Instruction::Send(src.clone()),
      (Operation::Set,            Some(dst), [_, src])       => Instruction::Set(dst, src.clone()),
      (Operation::Add,            Some(dst), [_, src])       => Instruction::Add(dst, src.clone()),
      (Operation::Multiply,       Some(dst), [_, src])       => Instruction::Multiply(dst, src.clone()),
      (Operation::Modulo,         Some(dst), [_, src])       => Instruction::Modulo(dst, src.clone()),
      (Operation::Receive,        Some(dst), [_])            => Instruction::Receive(dst),
      (Operation::JumpIfPositive, None,      [test, offset]) => {
        Instruction::JumpIfPositive(test.clone(), offset.clone())
      }
      _ => return Err(wrong_arity)
    };

  Ok(instruction)
}

/**
  Loads a whole program. Line numbers in errors count from 1 and include blank and comment
  lines, so they match what an editor shows. Loading stops at the first error.
*/
pub fn parse_assembly(text: &str) -> Result<Vec<Instruction>, LoadError> {
  let mut program = Vec::new();

  for (index, source_line) in text.lines().enumerate() {
    let line_number = index + 1;

    match line(source_line) {

      Ok((_rest, Some(raw))) => {
        program.push(decode(line_number, raw)?);
      }

      Ok((_rest, None)) => {
        // Blank or comment only.
      }

      Err(_e) => {
        return Err(LoadError::BadOperand { line: line_number, text: source_line.to_string() });
      }

    }
  }

  Ok(program)
}
