//! Device constants and lowering options

use crate::error::{AccError, Result};
use serde::{Deserialize, Serialize};

/// Addressable memory cells on the target device.
pub const MEMORY_CELLS: u16 = 200;

/// General purpose registers R0..R12.
pub const REGISTER_COUNT: u8 = 13;

/// Temporaries go to a register only while more than this many are free.
pub const REGISTER_THRESHOLD: usize = 7;

/// Options for lowering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringOptions {
    pub memory_cells: u16,
    pub register_count: u8,
    pub register_threshold: usize,
    pub trace_optimizer: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            memory_cells: MEMORY_CELLS,
            register_count: REGISTER_COUNT,
            register_threshold: REGISTER_THRESHOLD,
            trace_optimizer: false,
        }
    }
}

impl LoweringOptions {
    /// Check options read from outside against the device.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(AccError::InvalidOptions { reason });
        if self.register_count == 0 || self.register_count > REGISTER_COUNT {
            return invalid(format!("register_count must be between 1 and {REGISTER_COUNT}, got {}", self.register_count));
        }
        if self.register_threshold >= self.register_count as usize {
            return invalid(format!(
                "register_threshold {} leaves no temporaries in registers with {} registers",
                self.register_threshold, self.register_count
            ));
        }
        if self.memory_cells == 0 || self.memory_cells > MEMORY_CELLS {
            return invalid(format!("memory_cells must be between 1 and {MEMORY_CELLS}, got {}", self.memory_cells));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_options_match_device() {
        let options = LoweringOptions::default();
        assert_eq!(options.memory_cells, 200);
        assert_eq!(options.register_count, 13);
        assert_eq!(options.register_threshold, 7);
        assert!(!options.trace_optimizer);
    }

    #[test]
    fn test_default_options_are_valid() {
        assert_eq!(LoweringOptions::default().validate(), Ok(()));
    }

    #[test]
    fn test_too_many_registers_rejected() {
        let options = LoweringOptions { register_count: 14, ..LoweringOptions::default() };
        assert!(matches!(options.validate(), Err(AccError::InvalidOptions { .. })));
    }

    #[test]
    fn test_threshold_must_stay_below_register_count() {
        let options = LoweringOptions { register_count: 7, register_threshold: 7, ..LoweringOptions::default() };
        assert_eq!(
            options.validate().err().map(|e| e.to_string()),
            Some("Invalid lowering options: register_threshold 7 leaves no temporaries in registers with 7 registers".to_string())
        );
        let options = LoweringOptions { register_count: 8, register_threshold: 7, ..LoweringOptions::default() };
        assert_eq!(options.validate(), Ok(()));
    }

    #[test]
    fn test_memory_beyond_device_rejected() {
        let options = LoweringOptions { memory_cells: 201, ..LoweringOptions::default() };
        assert!(matches!(options.validate(), Err(AccError::InvalidOptions { .. })));
    }
}
