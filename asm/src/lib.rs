mod block;
mod dump;
mod error;
mod object;
mod parser;
mod pass1;
mod pass2;

pub use block::{Block, ModRecord};
pub use dump::print_dump;
pub use error::Error;
pub use object::write;
pub use parser::{Instruction, Operand};
pub use pass1::{locate, Program};
pub use pass2::encode;

use arch::op::OpTable;

/// Assemble a full source text into object-program text.
pub fn assemble(source: &str, optab: &OpTable) -> Result<String, Error> {
    let mut instructions = vec![];
    for (idx, raw) in source.lines().enumerate() {
        if let Some(inst) = Instruction::parse(idx, raw, optab)? {
            instructions.push(inst);
        }
    }
    let mut prog = locate(instructions, optab)?;
    encode(&mut prog, optab)?;
    Ok(write(&prog))
}
