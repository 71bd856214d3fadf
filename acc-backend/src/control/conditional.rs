//! Conditionals and comparisons
//!
//! A conditional is a subroutine producing 1 or 0 that also owns a truth
//! block: code placed there runs only when the condition holds. Every
//! conditional is built together with its negated twin, so `not` is a lookup
//! and negating twice gives back the original.

use crate::ir::{Instruction, ScopeId, Subroutine, Value};
use crate::naming::Name;
use crate::scope::{Builder, ConditionalData, RegisterSet};
use acc_codegen::Condition;
use acc_common::{AccError, Result};
use log::debug;

impl Builder {
    fn begin_conditional(&mut self, name: Name, parameters: RegisterSet) -> Subroutine {
        let sub = self.begin_subroutine(name, parameters);
        let truth = self.new_scope(sub.scope, Name::Derived { owner: sub.scope, suffix: "_truth".to_string() });
        self.subroutine_data_mut(sub.scope).conditional = Some(ConditionalData {
            truth,
            negated: None,
            attached: false,
        });
        sub
    }

    fn link_twins(&mut self, original: Subroutine, negated: Subroutine) {
        if let Some(data) = self.subroutine_data_mut(original.scope).conditional.as_mut() {
            data.negated = Some(negated);
        }
        if let Some(data) = self.subroutine_data_mut(negated.scope).conditional.as_mut() {
            data.negated = Some(original);
        }
    }

    pub fn is_conditional(&self, sub: Subroutine) -> bool {
        self.scopes[sub.scope.0]
            .subroutine
            .as_ref()
            .is_some_and(|data| data.conditional.is_some())
    }

    fn conditional_data(&self, sub: Subroutine) -> Option<&ConditionalData> {
        self.scopes[sub.scope.0].subroutine.as_ref()?.conditional.as_ref()
    }

    /// The scope that runs when `sub` holds.
    pub fn truth_block(&self, sub: Subroutine) -> Option<ScopeId> {
        self.conditional_data(sub).map(|data| data.truth)
    }

    pub fn negated_twin(&self, sub: Subroutine) -> Option<Subroutine> {
        self.conditional_data(sub).and_then(|data| data.negated)
    }

    pub(crate) fn attach_truth_block(&mut self, sub: Subroutine) -> Option<ScopeId> {
        let data = self.subroutine_data_mut(sub.scope).conditional.as_mut()?;
        if data.attached {
            return None;
        }
        data.attached = true;
        Some(data.truth)
    }

    /// Place the truth block of the conditional being built here.
    pub fn mark_truthful(&mut self, sub: Subroutine) {
        if let Some(truth) = self.truth_block(sub) {
            self.add_instruction(self.current, Instruction::Block(truth));
        }
    }

    /// Build a conditional from a body that knows how to negate itself.
    /// The body runs twice, once per twin, with `negate` telling it which.
    pub fn build_negatable_conditional(
        &mut self,
        names: (&str, &str),
        operands: &[Value],
        body: impl Fn(&mut Builder, Subroutine, bool, &[Value]) -> Result<()>,
    ) -> Result<Subroutine> {
        let mut twins = Vec::with_capacity(2);
        for (name, negate) in [(names.0, false), (names.1, true)] {
            let parameters = self.collect_parameters(operands);
            let sub = self.begin_conditional(Name::Fixed(name.to_string()), parameters);
            self.within(sub.scope, |b| {
                let locals = b.localized(operands)?;
                body(b, sub, negate, &locals)
            })?;
            twins.push(sub);
        }
        self.link_twins(twins[0], twins[1]);
        Ok(twins[0])
    }

    /// Build a conditional from an arbitrary body that calls
    /// `mark_truthful` where the condition holds.
    ///
    /// The negated twin runs a fresh instance of the body whose truth block
    /// clears the result and skips ahead; falling through sets it.
    pub fn build_conditional(
        &mut self,
        name: &str,
        operands: &[Value],
        body: impl Fn(&mut Builder, Subroutine, &[Value]) -> Result<()>,
    ) -> Result<Subroutine> {
        let parameters = self.collect_parameters(operands);
        let original = self.begin_conditional(Name::Fixed(name.to_string()), parameters.clone());
        self.within(original.scope, |b| {
            let locals = b.localized(operands)?;
            body(b, original, &locals)
        })?;

        let negated = self.begin_conditional(Name::Fixed(format!("not_{name}")), parameters.clone());
        self.within(negated.scope, |b| {
            let skip = b.label_with_suffix(negated.scope, "_negated");
            let inner = b.begin_conditional(Name::Derived { owner: negated.scope, suffix: "_inner".to_string() }, parameters);
            b.within(inner.scope, |b| {
                let locals = b.localized(operands)?;
                body(b, inner, &locals)
            })?;
            if let Some(truth) = b.truth_block(inner) {
                b.within(truth, |b| {
                    b.assign(negated.result(), 0)?;
                    b.branch(skip, Condition::Always);
                    Ok(())
                })?;
            }
            b.call(inner)?;
            b.assign(negated.result(), 1)?;
            b.mark_truthful(negated);
            b.define_label(skip)
        })?;

        self.link_twins(original, negated);
        Ok(original)
    }

    fn collect_parameters(&self, operands: &[Value]) -> RegisterSet {
        operands
            .iter()
            .filter_map(|operand| match operand {
                Value::Register(register) => Some(*register),
                _ => None,
            })
            .collect()
    }

    /// Compare two arbitrary operands, leaving the result in the flags.
    pub fn compare_values(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<()> {
        let (first, second) = (first.into(), second.into());
        match (first, second) {
            (Value::Register(r), Value::Register(s)) => self.compare(r, s),
            (Value::Register(r), Value::Constant(c)) => self.compare(r, c),
            (Value::Register(_), _) => {
                let sub = self.build_subroutine("compareRegisterWithCalc", &[first], move |b, _, l| {
                    let other = b.register(Some(second))?;
                    b.compare_values(l[0], other)
                })?;
                self.call(sub)?;
            }
            _ => {
                let sub = self.build_subroutine("compareNonRegister", &[], move |b, _, _| {
                    let temp = b.register(Some(first))?;
                    b.compare_values(temp, second)
                })?;
                self.call(sub)?;
            }
        }
        Ok(())
    }

    /// `first <condition> second` as a conditional. A constant on the left
    /// is moved to the right and the condition flipped.
    fn compare_single(&mut self, first: Value, second: Value, condition: Condition, names: (&str, &str)) -> Result<Value> {
        let sub = self.build_negatable_conditional(names, &[], move |b, sub, negate, _| {
            let end = b.end_label(sub);
            b.set_label_suffix(end, "_false");
            // Flags survive the moves below; only CMP writes them.
            let skip = if first.as_constant().is_some() {
                b.compare_values(second, first)?;
                condition.negate_if(!negate).flipped()
            } else {
                b.compare_values(first, second)?;
                condition.negate_if(!negate)
            };
            b.assign(sub.result(), 0)?;
            b.branch(end, skip);
            b.assign(sub.result(), 1)?;
            b.mark_truthful(sub);
            Ok(())
        })?;
        debug!("Built comparison '{}' ({condition:?})", self.scope_name(sub.scope));
        Ok(sub.into())
    }

    pub fn less_than(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        self.compare_single(first.into(), second.into(), Condition::Lt, ("lessThan", "greaterThanOrEqual"))
    }

    pub fn less_or_equal(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        self.compare_single(first.into(), second.into(), Condition::Le, ("lessThanOrEqual", "greaterThan"))
    }

    pub fn equal(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        self.compare_single(first.into(), second.into(), Condition::Eq, ("areEqual", "areNotEqual"))
    }

    pub fn greater_than(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let condition = self.less_or_equal(first, second)?;
        self.not(condition)
    }

    pub fn greater_or_equal(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let condition = self.less_than(first, second)?;
        self.not(condition)
    }

    pub fn not_equal(&mut self, first: impl Into<Value>, second: impl Into<Value>) -> Result<Value> {
        let condition = self.equal(first, second)?;
        self.not(condition)
    }

    /// Logical negation.
    pub fn not(&mut self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        if let Value::Constant(c) = value {
            return Ok(Value::Constant(i32::from(c == 0)));
        }
        if let Some(twin) = value.as_subroutine().and_then(|sub| self.negated_twin(sub)) {
            return Ok(twin.into());
        }
        let truthy = self.truthy(value)?;
        self.not(truthy)
    }

    /// The value as a conditional: nonzero means true.
    pub fn truthy(&mut self, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        match value {
            Value::Constant(c) => Ok(Value::Constant(i32::from(c != 0))),
            _ if value.as_subroutine().is_some_and(|sub| self.is_conditional(sub)) => Ok(value),
            _ => self.not_equal(value, 0),
        }
    }

    /// Turn any operand into a conditional subroutine.
    pub(crate) fn as_conditional(&mut self, value: Value) -> Result<Subroutine> {
        if let Some(sub) = value.as_subroutine().filter(|sub| self.is_conditional(*sub)) {
            return Ok(sub);
        }
        let condition = self.not_equal(value, 0)?;
        condition
            .as_subroutine()
            .ok_or_else(|| AccError::unresolved(format!("{condition:?}")))
    }
}
