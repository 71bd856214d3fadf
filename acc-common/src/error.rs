//! Error handling for the lowering engine
//! 
//! Every fault the builder can hit is fatal for the build: the caller gets the
//! error back synchronously and the partially built program is dropped.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccError {
    #[error("Label '{label}' is defined more than once")]
    LabelRedefined { label: String },

    #[error("No free memory address for {requested} temporaries (capacity {capacity})")]
    MemoryExhausted { requested: usize, capacity: u16 },

    #[error("Memory address {address} is outside the device (capacity {capacity})")]
    AddressOutOfRange { address: u16, capacity: u16 },

    #[error("No register available in scope '{scope}'")]
    RegistersExhausted { scope: String },

    #[error("Else-if chain '{name}' has no placeholder label to patch")]
    MalformedElseChain { name: String },

    #[error("Truth block of conditional '{name}' is already attached to an if")]
    TruthBlockReused { name: String },

    #[error("Cannot assign into {target}")]
    NotAssignable { target: String },

    #[error("Invalid lowering options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Internal error: operand {operand} could not be resolved")]
    UnresolvedOperand { operand: String },
}

impl AccError {
    pub fn registers_exhausted(scope: impl Into<String>) -> Self {
        AccError::RegistersExhausted { scope: scope.into() }
    }

    pub fn unresolved(operand: impl Into<String>) -> Self {
        AccError::UnresolvedOperand { operand: operand.into() }
    }
}
