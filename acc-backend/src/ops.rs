//! Assignments and statements
//!
//! Moving values between registers and memory, compound assignments, swap
//! and the direct compare. Anything that is not a single instruction goes
//! through a subroutine so the scratch register it needs is allocated and,
//! if necessary, spilled by the calling convention.

use crate::ir::{Calculation, Instruction, RegOrConst, Register, Storage, Value};
use crate::scope::Builder;
use acc_codegen::LogicalOp;
use acc_common::{AccError, Result};

impl TryFrom<Value> for Storage {
    type Error = AccError;

    fn try_from(value: Value) -> Result<Storage> {
        match value {
            Value::Register(register) => Ok(Storage::Register(register)),
            Value::Memory(address) => Ok(Storage::Memory(address)),
            Value::Constant(constant) => Err(AccError::NotAssignable { target: format!("constant #{constant}") }),
            Value::Calculation(_) => Err(AccError::NotAssignable { target: "a calculation".to_string() }),
        }
    }
}

impl Builder {
    /// Emit the instructions producing `calculation` in `into`.
    pub fn materialize(&mut self, calculation: Calculation, into: Register) -> Result<()> {
        match calculation {
            Calculation::Add(first, second) => self.emit(Instruction::Add { into, first, second }),
            Calculation::Subtract(first, second) => self.emit(Instruction::Subtract { into, first, second }),
            Calculation::Logical(op, first, second) => self.emit(Instruction::Logical { op, into, first, second }),
            Calculation::Not(from) => self.emit(Instruction::Move { into, from, negate: true }),
            Calculation::Subroutine(sub) => {
                self.store_into(sub, into)?;
            }
        }
        Ok(())
    }

    pub fn assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        match (target.into(), value.into()) {
            (Storage::Register(into), Value::Register(from)) => {
                self.emit(Instruction::Move { into, from: from.into(), negate: false });
            }
            (Storage::Register(into), Value::Constant(value)) => {
                self.emit(Instruction::Move { into, from: value.into(), negate: false });
            }
            (Storage::Register(into), Value::Memory(from)) => self.emit(Instruction::Load { into, from }),
            (Storage::Register(into), Value::Calculation(calculation)) => self.materialize(calculation, into)?,
            (Storage::Memory(into), Value::Register(from)) => self.emit(Instruction::Store { from, into }),
            (Storage::Memory(into), value) => {
                let sub = self.build_subroutine("setMemoryAddress", &[], |b, _, _| {
                    let from = b.register(Some(value))?;
                    b.emit(Instruction::Store { from, into });
                    Ok(())
                })?;
                self.call(sub)?;
            }
        }
        Ok(())
    }

    fn compound(
        &mut self,
        target: Storage,
        value: Value,
        combine: impl FnOnce(&mut Builder, Value, Value) -> Result<Value>,
    ) -> Result<()> {
        let combined = combine(self, target.into(), value)?;
        self.assign(target, combined)
    }

    pub fn add_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.add(x, y))
    }

    pub fn sub_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.sub(x, y))
    }

    pub fn and_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.logical(LogicalOp::And, x, y))
    }

    pub fn or_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.logical(LogicalOp::Or, x, y))
    }

    pub fn xor_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.logical(LogicalOp::Xor, x, y))
    }

    pub fn shl_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.logical(LogicalOp::ShiftLeft, x, y))
    }

    pub fn shr_assign(&mut self, target: impl Into<Storage>, value: impl Into<Value>) -> Result<()> {
        self.compound(target.into(), value.into(), |b, x, y| b.logical(LogicalOp::ShiftRight, x, y))
    }

    pub fn increment(&mut self, target: impl Into<Storage>) -> Result<()> {
        self.add_assign(target, 1)
    }

    pub fn decrement(&mut self, target: impl Into<Storage>) -> Result<()> {
        self.sub_assign(target, 1)
    }

    /// Exchange two storage locations through one scratch register.
    pub fn swap(&mut self, first: impl Into<Storage>, second: impl Into<Storage>) -> Result<()> {
        let (first, second) = (first.into(), second.into());
        let sub = self.build_subroutine("swap", &[], |b, _, _| {
            let temp = b.register(Some(first.into()))?;
            b.assign(first, Value::from(second))?;
            b.assign(second, temp)
        })?;
        self.call(sub)?;
        Ok(())
    }

    /// A single `CMP`.
    pub fn compare(&mut self, first: Register, second: impl Into<RegOrConst>) {
        self.emit(Instruction::Compare { first, second: second.into() });
    }
}
