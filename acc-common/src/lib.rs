//! Assembly Construction Compiler - Common Types and Utilities
//! 
//! Shared error definitions, device constants and lowering options used by
//! every crate in the workspace.

pub mod error;
pub mod options;

pub use error::{AccError, Result};
pub use options::{LoweringOptions, MEMORY_CELLS, REGISTER_COUNT, REGISTER_THRESHOLD};
