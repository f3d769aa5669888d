/*!

  Instructions are kept decoded: a program is an immutable `Vec<Instruction>` shared read-only
  by every machine that runs it. The opcode enum `Operation` exists alongside `Instruction` so
  that mnemonics, arities and other per-opcode facts can be asked about without an instruction
  in hand, which is what the assembler needs while it is still validating arguments.

*/

mod assembly;
mod instruction;

pub use assembly::parse_assembly;
pub use instruction::{Instruction, Operation};
