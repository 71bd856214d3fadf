//! Assembly Construction Compiler - Backend
//!
//! Lowers high-level constructs (expressions, comparisons, if/else, loops,
//! subroutine calls) into the minimal target instruction set:
//!
//! - `ir`: operands and instructions
//! - `scope`: the scope arena and register allocator
//! - `subroutine`: the calling convention
//! - `expr`, `ops`, `control`: lowering of expressions, statements and
//!   control flow
//! - `finalize`: address resolution, flattening and peephole optimization
//!
//! Programs are built through [`build`], which hands a [`Builder`] to the
//! construction closure and finalizes whatever it built.

pub mod control;
pub mod expr;
pub mod finalize;
pub mod ir;
pub mod naming;
pub mod ops;
pub mod samples;
pub mod scope;
pub mod subroutine;

pub use acc_common::{AccError, LoweringOptions, Result};
pub use control::{ElseIfChain, IfChain, IfScope, LoopScope, Progression, Step};
pub use finalize::Program;
pub use ir::{
    Address, Calculation, Instruction, LabelId, RegOrConst, Register, ScopeId, Storage, Subroutine, Value, R0, R1,
    R10, R11, R12, R2, R3, R4, R5, R6, R7, R8, R9,
};
pub use scope::{Builder, RegisterSet};

/// Build and finalize a program.
pub fn build(options: LoweringOptions, f: impl FnOnce(&mut Builder) -> Result<()>) -> Result<Program> {
    let mut builder = Builder::new(options);
    f(&mut builder)?;
    builder.finalize()
}

#[cfg(test)]
mod tests;
