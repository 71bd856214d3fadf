//! Intermediate Representation
//!
//! Operands and instructions the builder accumulates before finalization.
//! Labels, virtual registers, temporary addresses and scopes live in the
//! builder's arenas and are referred to here by handle, so renaming a label or
//! rebinding a virtual register is an update in one place.

use acc_codegen::{Condition, LogicalOp};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub(crate) usize);

/// A register operand.
///
/// `Virtual` registers indirect to another register and are bound late, when
/// the subroutine owning them is materialized at a call site. Anything that
/// resolves to `Discard` is dead and removed by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Physical(u8),
    Discard,
    Virtual(VirtualId),
}

pub const R0: Register = Register::Physical(0);
pub const R1: Register = Register::Physical(1);
pub const R2: Register = Register::Physical(2);
pub const R3: Register = Register::Physical(3);
pub const R4: Register = Register::Physical(4);
pub const R5: Register = Register::Physical(5);
pub const R6: Register = Register::Physical(6);
pub const R7: Register = Register::Physical(7);
pub const R8: Register = Register::Physical(8);
pub const R9: Register = Register::Physical(9);
pub const R10: Register = Register::Physical(10);
pub const R11: Register = Register::Physical(11);
pub const R12: Register = Register::Physical(12);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Physical(index) => write!(f, "R{}", index),
            Register::Discard => write!(f, "RNull"),
            Register::Virtual(id) => write!(f, "V{}", id.0),
        }
    }
}

/// A memory operand: a real address, or a temporary whose address is
/// assigned during finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Fixed(u16),
    Temporary(TempId),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Fixed(address) => write!(f, "{}", address),
            Address::Temporary(id) => write!(f, "T{}", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOrConst {
    Register(Register),
    Constant(i32),
}

impl From<Register> for RegOrConst {
    fn from(register: Register) -> Self {
        RegOrConst::Register(register)
    }
}

impl From<i32> for RegOrConst {
    fn from(value: i32) -> Self {
        RegOrConst::Constant(value)
    }
}

/// Handle to a subroutine template.
///
/// The template is built once; every call site materializes a fresh copy of
/// it bound to that call site's destination register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subroutine {
    pub(crate) scope: ScopeId,
    pub(crate) result: VirtualId,
}

impl Subroutine {
    /// The return slot. Writing it inside the body writes the destination
    /// register of whichever call site the copy is materialized at.
    pub fn result(&self) -> Register {
        Register::Virtual(self.result)
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

/// A value not yet placed in a register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calculation {
    Add(Register, RegOrConst),
    Subtract(Register, RegOrConst),
    Logical(LogicalOp, Register, RegOrConst),
    Not(RegOrConst),
    Subroutine(Subroutine),
}

/// Anything an expression can take as input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Register(Register),
    Constant(i32),
    Memory(Address),
    Calculation(Calculation),
}

impl Value {
    pub fn as_constant(&self) -> Option<i32> {
        match self {
            Value::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_reg_or_const(&self) -> Option<RegOrConst> {
        match self {
            Value::Register(register) => Some(RegOrConst::Register(*register)),
            Value::Constant(value) => Some(RegOrConst::Constant(*value)),
            _ => None,
        }
    }

    pub fn as_subroutine(&self) -> Option<Subroutine> {
        match self {
            Value::Calculation(Calculation::Subroutine(sub)) => Some(*sub),
            _ => None,
        }
    }
}

impl From<Register> for Value {
    fn from(register: Register) -> Self {
        Value::Register(register)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Constant(value)
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Memory(address)
    }
}

impl From<Calculation> for Value {
    fn from(calculation: Calculation) -> Self {
        Value::Calculation(calculation)
    }
}

impl From<Subroutine> for Value {
    fn from(sub: Subroutine) -> Self {
        Value::Calculation(Calculation::Subroutine(sub))
    }
}

impl From<RegOrConst> for Value {
    fn from(operand: RegOrConst) -> Self {
        match operand {
            RegOrConst::Register(register) => Value::Register(register),
            RegOrConst::Constant(value) => Value::Constant(value),
        }
    }
}

/// Something an assignment can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Register(Register),
    Memory(Address),
}

impl From<Register> for Storage {
    fn from(register: Register) -> Self {
        Storage::Register(register)
    }
}

impl From<Address> for Storage {
    fn from(address: Address) -> Self {
        Storage::Memory(address)
    }
}

impl From<Storage> for Value {
    fn from(storage: Storage) -> Self {
        match storage {
            Storage::Register(register) => Value::Register(register),
            Storage::Memory(address) => Value::Memory(address),
        }
    }
}

/// Operand view used for register, address and label discovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Register(Register),
    Constant(i32),
    Memory(Address),
    Label(LabelId),
}

impl From<RegOrConst> for Operand {
    fn from(operand: RegOrConst) -> Self {
        match operand {
            RegOrConst::Register(register) => Operand::Register(register),
            RegOrConst::Constant(value) => Operand::Constant(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Move { into: Register, from: RegOrConst, negate: bool },
    Load { into: Register, from: Address },
    Store { from: Register, into: Address },
    Add { into: Register, first: Register, second: RegOrConst },
    Subtract { into: Register, first: Register, second: RegOrConst },
    Logical { op: LogicalOp, into: Register, first: Register, second: RegOrConst },
    Compare { first: Register, second: RegOrConst },
    Branch { condition: Condition, label: LabelId },
    Label(LabelId),
    Halt,
    Block(ScopeId),
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Move { negate: false, .. } => "MOV",
            Instruction::Move { negate: true, .. } => "MVN",
            Instruction::Load { .. } => "LDR",
            Instruction::Store { .. } => "STR",
            Instruction::Add { .. } => "ADD",
            Instruction::Subtract { .. } => "SUB",
            Instruction::Logical { op, .. } => op.mnemonic(),
            Instruction::Compare { .. } => "CMP",
            Instruction::Branch { .. } => "B",
            Instruction::Label(_) => "LABEL",
            Instruction::Halt => "HALT",
            Instruction::Block(_) => "BLOCK",
        }
    }

    /// Operands in rendering order. Blocks have none; their content is
    /// reached through the scope arena.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Instruction::Move { into, from, .. } => vec![Operand::Register(*into), (*from).into()],
            Instruction::Load { into, from } => vec![Operand::Register(*into), Operand::Memory(*from)],
            Instruction::Store { from, into } => vec![Operand::Register(*from), Operand::Memory(*into)],
            Instruction::Add { into, first, second }
            | Instruction::Subtract { into, first, second }
            | Instruction::Logical { into, first, second, .. } => vec![
                Operand::Register(*into),
                Operand::Register(*first),
                (*second).into(),
            ],
            Instruction::Compare { first, second } => vec![Operand::Register(*first), (*second).into()],
            Instruction::Branch { label, .. } => vec![Operand::Label(*label)],
            Instruction::Label(label) => vec![Operand::Label(*label)],
            Instruction::Halt | Instruction::Block(_) => Vec::new(),
        }
    }

    pub fn registers(&self) -> Vec<Register> {
        self.operands()
            .into_iter()
            .filter_map(|operand| match operand {
                Operand::Register(register) => Some(register),
                _ => None,
            })
            .collect()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.operands()
            .into_iter()
            .filter_map(|operand| match operand {
                Operand::Memory(address) => Some(address),
                _ => None,
            })
            .collect()
    }

    /// Rebuild with every handle passed through the given maps.
    pub(crate) fn map(
        &self,
        register: impl Fn(Register) -> Register,
        address: impl Fn(Address) -> Address,
        label: impl Fn(LabelId) -> LabelId,
        scope: impl Fn(ScopeId) -> ScopeId,
    ) -> Instruction {
        let operand = |op: RegOrConst| match op {
            RegOrConst::Register(r) => RegOrConst::Register(register(r)),
            constant => constant,
        };
        match self {
            Instruction::Move { into, from, negate } => Instruction::Move {
                into: register(*into),
                from: operand(*from),
                negate: *negate,
            },
            Instruction::Load { into, from } => Instruction::Load { into: register(*into), from: address(*from) },
            Instruction::Store { from, into } => Instruction::Store { from: register(*from), into: address(*into) },
            Instruction::Add { into, first, second } => Instruction::Add {
                into: register(*into),
                first: register(*first),
                second: operand(*second),
            },
            Instruction::Subtract { into, first, second } => Instruction::Subtract {
                into: register(*into),
                first: register(*first),
                second: operand(*second),
            },
            Instruction::Logical { op, into, first, second } => Instruction::Logical {
                op: *op,
                into: register(*into),
                first: register(*first),
                second: operand(*second),
            },
            Instruction::Compare { first, second } => Instruction::Compare {
                first: register(*first),
                second: operand(*second),
            },
            Instruction::Branch { condition, label: target } => Instruction::Branch {
                condition: *condition,
                label: label(*target),
            },
            Instruction::Label(id) => Instruction::Label(label(*id)),
            Instruction::Halt => Instruction::Halt,
            Instruction::Block(child) => Instruction::Block(scope(*child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operand_discovery() {
        let add = Instruction::Add { into: R2, first: R0, second: RegOrConst::Register(R1) };
        assert_eq!(add.mnemonic(), "ADD");
        assert_eq!(add.registers(), vec![R2, R0, R1]);

        let store = Instruction::Store { from: R3, into: Address::Fixed(100) };
        assert_eq!(store.addresses(), vec![Address::Fixed(100)]);
        assert_eq!(store.registers(), vec![R3]);

        let complement = Instruction::Move { into: R1, from: RegOrConst::Constant(0), negate: true };
        assert_eq!(complement.mnemonic(), "MVN");
        assert!(Instruction::Block(ScopeId(3)).operands().is_empty());
    }

    #[test]
    fn test_map_rewrites_handles() {
        let branch = Instruction::Branch { condition: Condition::Lt, label: LabelId(1) };
        let mapped = branch.map(|r| r, |a| a, |_| LabelId(7), |s| s);
        assert_eq!(mapped, Instruction::Branch { condition: Condition::Lt, label: LabelId(7) });

        let virtual_reg = Register::Virtual(VirtualId(0));
        let sub = Instruction::Subtract { into: virtual_reg, first: virtual_reg, second: RegOrConst::Constant(1) };
        let mapped = sub.map(|_| R4, |a| a, |l| l, |s| s);
        assert_eq!(mapped, Instruction::Subtract { into: R4, first: R4, second: RegOrConst::Constant(1) });
    }

    #[test]
    fn test_register_display() {
        assert_eq!(R12.to_string(), "R12");
        assert_eq!(Register::Discard.to_string(), "RNull");
        assert_eq!(Register::Virtual(VirtualId(4)).to_string(), "V4");
    }
}
