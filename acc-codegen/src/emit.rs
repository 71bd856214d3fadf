//! Listing emitter
//!
//! Joins rendered instructions with newlines. Instructions that render to
//! nothing (branches that can never be taken) leave no blank line behind.

use crate::asm::AsmInst;

pub fn emit_instructions(instructions: &[AsmInst]) -> String {
    instructions
        .iter()
        .map(|inst| inst.to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
