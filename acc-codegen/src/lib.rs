//! Assembly Construction Compiler - Target Instruction Set
//! 
//! This crate describes the final, fully resolved assembly the backend emits:
//! 
//! - The register file and instruction enum with their textual rendering
//! - Branch-condition algebra
//! - The listing emitter
//! - A reference interpreter used to check generated programs

pub mod asm;
pub mod emit;
pub mod machine;

pub use asm::{AsmInst, Condition, LogicalOp, Operand2, Reg};
pub use emit::emit_instructions;
pub use machine::{Machine, MachineError};
