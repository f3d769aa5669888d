//! The register file of a single machine. Registers spring into existence holding zero the first
//! time they are mentioned, so reads never fail.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use crate::operand::{RegisterName, Value};

/// The register every machine is seeded with, holding the machine's id.
pub const ID_REGISTER: &str = "p";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterFile {
  registers: HashMap<RegisterName, Value>
}

impl RegisterFile {

  pub fn new() -> RegisterFile {
    RegisterFile {
      registers: HashMap::new()
    }
  }

  /// A register file holding only the id register.
  pub fn with_id(id: Value) -> RegisterFile {
    let mut registers = RegisterFile::new();
    registers.set(&RegisterName::from(ID_REGISTER), id);
    registers
  }

  /// Returns the stored value, or 0 if the register has never been written.
  pub fn get(&self, name: &RegisterName) -> Value {
    self.registers.get(name).copied().unwrap_or(0)
  }

  pub fn set(&mut self, name: &RegisterName, value: Value) {
    self.registers.insert(name.clone(), value);
  }

  /// Gives a mutable slot for `name`, creating it with 0 if necessary.
  pub fn slot(&mut self, name: &RegisterName) -> &mut Value {
    self.registers.entry(name.clone()).or_insert(0)
  }

  /// Iterates over the registers that have been written, in name order.
  pub fn iter(&self) -> impl Iterator<Item = (&RegisterName, Value)> {
    let mut entries: Vec<(&RegisterName, Value)> =
      self.registers.iter().map(|(name, value)| (name, *value)).collect();
    entries.sort_by(|(a, _), (b, _)| str::cmp(a, b));
    entries.into_iter()
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.registers.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.registers.is_empty()
  }

  /// Builds a two column table of the written registers. If `highlight` names a register, its
  /// row is marked with an arrow.
  pub fn make_table(&self, highlight: Option<&RegisterName>) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for (name, value) in self.iter() {
      match Some(name) == highlight {

        true  => {
          table.add_row(row![r->format!("* --> {} =", name), value]);
        }

        false => {
          table.add_row(row![r->format!("{} =", name), value]);
        }

      } // end match on highlight
    } // end for
    table
  }

}

lazy_static! {
  pub static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for RegisterFile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.make_table(None))
  }
}
