//! Control flow lowering
//!
//! Conditionals, `if`/`else` chains, loops and ranges, all built on top of
//! subroutines: a condition is a subroutine whose truth block is where the
//! guarded code goes.

mod conditional;
mod if_else;
mod loops;

pub use if_else::{ElseIfChain, IfChain, IfScope};
pub use loops::{LoopScope, Progression, Step};
