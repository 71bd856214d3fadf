//! Expression lowering
//!
//! Binary and unary operators over any pair of operand kinds. Two constants
//! fold; a register with a register or constant is a single instruction;
//! every other pairing becomes a subroutine whose operand list makes the
//! calculation side evaluate first into a scratch register, so the
//! destination is never written while one of its inputs is still unread.

use crate::ir::{Calculation, Subroutine, Value};
use crate::scope::Builder;
use acc_codegen::LogicalOp;
use acc_common::Result;

impl Builder {
    fn subroutine_value(
        &mut self,
        name: &str,
        operands: &[Value],
        body: impl FnOnce(&mut Builder, Subroutine, &[Value]) -> Result<()>,
    ) -> Result<Value> {
        Ok(self.build_subroutine(name, operands, body)?.into())
    }

    pub fn add(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let (first, second) = (first.into(), second.into());
        match (first, second) {
            (Value::Constant(x), Value::Constant(y)) => Ok(Value::Constant(x.wrapping_add(y))),
            (Value::Register(r), Value::Register(s)) => Ok(Calculation::Add(r, s.into()).into()),
            (Value::Register(r), Value::Constant(c)) => Ok(Calculation::Add(r, c.into()).into()),
            (Value::Register(_), _) => self.subroutine_value("registerPlusCalc", &[first, second], |b, sub, l| {
                let sum = b.add(l[0], l[1])?;
                b.assign(sub.result(), sum)
            }),
            (Value::Constant(_), Value::Register(_)) => self.add(second, first),
            (Value::Constant(_), _) => self.subroutine_value("constantPlusCalc", &[], move |b, sub, _| {
                b.assign(sub.result(), second)?;
                b.add_assign(sub.result(), first)
            }),
            (Value::Memory(_), Value::Register(_) | Value::Constant(_)) => self.add(second, first),
            (Value::Memory(_), Value::Memory(_)) => self.subroutine_value("memoryPlusMemory", &[], move |b, sub, _| {
                b.assign(sub.result(), first)?;
                b.add_assign(sub.result(), second)
            }),
            (Value::Memory(_), Value::Calculation(_)) => {
                self.subroutine_value("memoryPlusCalc", &[second], move |b, sub, l| {
                    b.assign(sub.result(), first)?;
                    b.add_assign(sub.result(), l[0])
                })
            }
            (Value::Calculation(_), Value::Calculation(_)) => {
                self.subroutine_value("calcPlusCalc", &[first], move |b, sub, l| {
                    b.assign(sub.result(), second)?;
                    b.add_assign(sub.result(), l[0])
                })
            }
            (Value::Calculation(_), _) => self.add(second, first),
        }
    }

    pub fn sub(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let (first, second) = (first.into(), second.into());
        match (first, second) {
            (Value::Constant(x), Value::Constant(y)) => Ok(Value::Constant(x.wrapping_sub(y))),
            (Value::Register(r), Value::Register(s)) => Ok(Calculation::Subtract(r, s.into()).into()),
            (Value::Register(r), Value::Constant(c)) => Ok(Calculation::Subtract(r, c.into()).into()),
            (Value::Register(_), _) => self.subroutine_value("registerMinusCalc", &[first, second], |b, sub, l| {
                let difference = b.sub(l[0], l[1])?;
                b.assign(sub.result(), difference)
            }),
            // c - x == -(x - c)
            (Value::Constant(_), Value::Register(_)) => {
                let reversed = self.sub(second, first)?;
                self.negate(reversed)
            }
            (Value::Constant(_), _) => {
                let reversed = self.subroutine_value("constantMinusCalc", &[], move |b, sub, _| {
                    b.assign(sub.result(), second)?;
                    b.sub_assign(sub.result(), first)
                })?;
                self.negate(reversed)
            }
            (Value::Memory(_), Value::Constant(_)) => {
                self.subroutine_value("memoryMinusConstant", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    b.sub_assign(sub.result(), second)
                })
            }
            (Value::Memory(_), Value::Register(_)) => {
                self.subroutine_value("memoryMinusRegister", &[first, second], |b, sub, l| {
                    let difference = b.sub(l[0], l[1])?;
                    b.assign(sub.result(), difference)
                })
            }
            (Value::Memory(_), Value::Memory(_)) => {
                self.subroutine_value("memoryMinusMemory", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    b.sub_assign(sub.result(), second)
                })
            }
            (Value::Memory(_), Value::Calculation(_)) => {
                self.subroutine_value("memoryMinusCalc", &[second], move |b, sub, l| {
                    b.assign(sub.result(), first)?;
                    b.sub_assign(sub.result(), l[0])
                })
            }
            (Value::Calculation(_), Value::Constant(_)) => {
                self.subroutine_value("calcMinusConstant", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    b.sub_assign(sub.result(), second)
                })
            }
            (Value::Calculation(_), Value::Register(_)) => {
                self.subroutine_value("calcMinusRegister", &[first, second], |b, sub, l| {
                    let difference = b.sub(l[0], l[1])?;
                    b.assign(sub.result(), difference)
                })
            }
            (Value::Calculation(_), Value::Memory(_)) => {
                self.subroutine_value("calcMinusMemory", &[first], move |b, sub, l| {
                    b.assign(sub.result(), second)?;
                    let difference = b.sub(l[0], sub.result())?;
                    b.assign(sub.result(), difference)
                })
            }
            (Value::Calculation(_), Value::Calculation(_)) => {
                self.subroutine_value("calcMinusCalc", &[first], move |b, sub, l| {
                    b.assign(sub.result(), second)?;
                    let difference = b.sub(l[0], sub.result())?;
                    b.assign(sub.result(), difference)
                })
            }
        }
    }

    pub fn logical(&mut self, op: LogicalOp, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let (first, second) = (first.into(), second.into());
        let commutative = op.is_commutative();

        // result = result <op> operand
        let fold_into_result = move |b: &mut Builder, sub: Subroutine, operand: Value| -> Result<()> {
            let combined = b.logical(op, sub.result(), operand)?;
            b.assign(sub.result(), combined)
        };
        // result = operand <op> result
        let fold_result_into = move |b: &mut Builder, sub: Subroutine, operand: Value| -> Result<()> {
            let combined = b.logical(op, operand, sub.result())?;
            b.assign(sub.result(), combined)
        };

        match (first, second) {
            (Value::Constant(x), Value::Constant(y)) => Ok(Value::Constant(op.apply(x, y))),
            (Value::Register(r), Value::Register(s)) => Ok(Calculation::Logical(op, r, s.into()).into()),
            (Value::Register(r), Value::Constant(c)) => Ok(Calculation::Logical(op, r, c.into()).into()),
            (Value::Register(_), _) => self.subroutine_value("registerLogicalCalc", &[first, second], move |b, sub, l| {
                let combined = b.logical(op, l[0], l[1])?;
                b.assign(sub.result(), combined)
            }),

            (Value::Constant(_), Value::Register(_)) if commutative => self.logical(op, second, first),
            (Value::Constant(_), Value::Register(_)) => {
                self.subroutine_value("constantLogicalRegister", &[second], move |b, sub, l| {
                    let temp = b.register(Some(first))?;
                    let combined = b.logical(op, temp, l[0])?;
                    b.assign(sub.result(), combined)
                })
            }
            (Value::Constant(_), _) if commutative => {
                self.subroutine_value("constantLogicalCalc", &[], move |b, sub, _| {
                    b.assign(sub.result(), second)?;
                    fold_into_result(b, sub, first)
                })
            }
            (Value::Constant(_), _) => self.subroutine_value("constantLogicalCalc", &[second], move |b, sub, l| {
                b.assign(sub.result(), first)?;
                fold_into_result(b, sub, l[0])
            }),

            (Value::Memory(_), Value::Register(_) | Value::Constant(_)) if commutative => {
                self.logical(op, second, first)
            }
            (Value::Memory(_), Value::Constant(_)) => {
                self.subroutine_value("memoryLogicalConstant", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    fold_into_result(b, sub, second)
                })
            }
            (Value::Memory(_), Value::Register(_)) => {
                self.subroutine_value("memoryLogicalRegister", &[first, second], move |b, sub, l| {
                    let combined = b.logical(op, l[0], l[1])?;
                    b.assign(sub.result(), combined)
                })
            }
            (Value::Memory(_), Value::Memory(_)) => {
                self.subroutine_value("memoryLogicalMemory", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    fold_into_result(b, sub, second)
                })
            }
            (Value::Memory(_), Value::Calculation(_)) => {
                self.subroutine_value("memoryLogicalCalc", &[second], move |b, sub, l| {
                    b.assign(sub.result(), first)?;
                    fold_into_result(b, sub, l[0])
                })
            }

            (Value::Calculation(_), Value::Calculation(_)) => {
                self.subroutine_value("calcLogicalCalc", &[first], move |b, sub, l| {
                    b.assign(sub.result(), second)?;
                    fold_result_into(b, sub, l[0])
                })
            }
            (Value::Calculation(_), _) if commutative => self.logical(op, second, first),
            (Value::Calculation(_), Value::Constant(_)) => {
                self.subroutine_value("calcLogicalConstant", &[], move |b, sub, _| {
                    b.assign(sub.result(), first)?;
                    fold_into_result(b, sub, second)
                })
            }
            (Value::Calculation(_), Value::Register(_)) => {
                self.subroutine_value("calcLogicalRegister", &[first, second], move |b, sub, l| {
                    let combined = b.logical(op, l[0], l[1])?;
                    b.assign(sub.result(), combined)
                })
            }
            (Value::Calculation(_), Value::Memory(_)) => {
                self.subroutine_value("calcLogicalMemory", &[first], move |b, sub, l| {
                    b.assign(sub.result(), second)?;
                    fold_result_into(b, sub, l[0])
                })
            }
        }
    }

    /// Bitwise complement.
    pub fn invert(&mut self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        match value {
            Value::Constant(c) => Ok(Value::Constant(!c)),
            Value::Register(r) => Ok(Calculation::Not(r.into()).into()),
            _ => self.subroutine_value("notCalc", &[], move |b, sub, _| {
                b.assign(sub.result(), value)?;
                let inverted = b.invert(sub.result())?;
                b.assign(sub.result(), inverted)
            }),
        }
    }

    /// Two's complement negation, `~x + 1`.
    pub fn negate(&mut self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        match value {
            Value::Constant(c) => Ok(Value::Constant(c.wrapping_neg())),
            _ => self.subroutine_value("minusNonConstant", &[], move |b, sub, _| {
                let inverted = b.invert(value)?;
                b.assign(sub.result(), inverted)?;
                b.add_assign(sub.result(), 1)
            }),
        }
    }
}
