//! Insertion-ordered register set
//!
//! Allocation order matters (the most recently freed end is handed out
//! first), so this is a small vector rather than a hash or tree set.

use crate::ir::Register;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet {
    registers: Vec<Register>,
}

impl RegisterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, register: Register) -> bool {
        self.registers.contains(&register)
    }

    /// Returns false if the register was already present.
    pub fn insert(&mut self, register: Register) -> bool {
        if self.contains(register) {
            return false;
        }
        self.registers.push(register);
        true
    }

    /// Returns false if the register was not present.
    pub fn remove(&mut self, register: Register) -> bool {
        match self.registers.iter().position(|r| *r == register) {
            Some(index) => {
                self.registers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn first(&self) -> Option<Register> {
        self.registers.first().copied()
    }

    pub fn last(&self) -> Option<Register> {
        self.registers.last().copied()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Register> + '_ {
        self.registers.iter().copied()
    }
}

impl FromIterator<Register> for RegisterSet {
    fn from_iter<I: IntoIterator<Item = Register>>(iter: I) -> Self {
        let mut set = RegisterSet::new();
        for register in iter {
            set.insert(register);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{R0, R1, R2};

    #[test]
    fn test_set_keeps_insertion_order() {
        let mut set: RegisterSet = [R2, R0, R1, R0].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.first(), Some(R2));
        assert_eq!(set.last(), Some(R1));

        assert!(set.remove(R0));
        assert!(!set.remove(R0));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![R2, R1]);
        assert!(!set.insert(R1));
    }
}
