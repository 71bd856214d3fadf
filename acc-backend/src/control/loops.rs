//! Loops and ranges
//!
//! Every loop is a head label followed by an `if` whose body ends by jumping
//! back to the head. The `if`'s false label is the break target.

use crate::ir::{Instruction, LabelId, Storage, Value};
use crate::naming::Name;
use crate::scope::Builder;
use acc_codegen::Condition;
use acc_common::Result;

/// Handed to loop bodies.
#[derive(Debug, Clone, Copy)]
pub struct LoopScope {
    break_label: LabelId,
    continue_label: LabelId,
}

impl LoopScope {
    pub fn break_label(&self) -> LabelId {
        self.break_label
    }

    pub fn continue_label(&self) -> LabelId {
        self.continue_label
    }

    pub fn break_loop(&self, b: &mut Builder) {
        b.branch(self.break_label, Condition::Always);
    }

    pub fn continue_loop(&self, b: &mut Builder) {
        b.branch(self.continue_label, Condition::Always);
    }
}

/// How a range index advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    By(i32),
    ShiftLeft(i32),
    ShiftRight(i32),
}

/// An integer range for `for_each`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progression {
    start: Value,
    end: Value,
    descending: bool,
    inclusive: bool,
    step: Step,
}

impl Progression {
    fn new(start: impl Into<Value>, end: impl Into<Value>, descending: bool, inclusive: bool) -> Self {
        Progression { start: start.into(), end: end.into(), descending, inclusive, step: Step::By(1) }
    }

    /// `start..=end`, counting up.
    pub fn range_to(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(start, end, false, true)
    }

    /// `start..end`, counting up.
    pub fn until(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(start, end, false, false)
    }

    /// `start` down to and including `end`.
    pub fn down_to(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(start, end, true, true)
    }

    /// `start` down to but excluding `end`.
    pub fn down_until(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(start, end, true, false)
    }

    /// Advance by `amount` in the direction of the range.
    pub fn step(mut self, amount: i32) -> Self {
        self.step = Step::By(amount);
        self
    }

    pub fn shl(mut self, amount: i32) -> Self {
        self.step = Step::ShiftLeft(amount);
        self
    }

    pub fn shr(mut self, amount: i32) -> Self {
        self.step = Step::ShiftRight(amount);
        self
    }

    /// The condition under which the loop keeps going.
    fn keep_going(&self, b: &mut Builder, index: Value) -> Result<Value> {
        match (self.descending, self.inclusive) {
            (false, true) => b.less_or_equal(index, self.end),
            (false, false) => b.less_than(index, self.end),
            (true, true) => b.greater_or_equal(index, self.end),
            (true, false) => b.greater_than(index, self.end),
        }
    }

    fn advance(&self, b: &mut Builder, index: Storage) -> Result<()> {
        match self.step {
            Step::By(amount) if self.descending => b.sub_assign(index, amount),
            Step::By(amount) => b.add_assign(index, amount),
            Step::ShiftLeft(amount) => b.shl_assign(index, amount),
            Step::ShiftRight(amount) => b.shr_assign(index, amount),
        }
    }
}

impl Builder {
    /// A loop with its head label in place, built inside a fresh block.
    fn loop_wrapper(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Builder, LabelId) -> Result<()>,
    ) -> Result<()> {
        let parent = self.current;
        let wrapper = self.new_scope(parent, Name::Fixed(name.to_string()));
        self.within(wrapper, |b| {
            let head = b.label_with_suffix(wrapper, "");
            b.define_label(head)?;
            f(b, head)
        })?;
        self.add_instruction(parent, Instruction::Block(wrapper));
        Ok(())
    }

    pub fn while_(
        &mut self,
        condition: impl Into<Value>,
        name: &str,
        body: impl FnOnce(&mut Builder, &LoopScope) -> Result<()>,
    ) -> Result<()> {
        let condition = condition.into();
        self.loop_wrapper(name, |b, head| {
            b.guarded_block(condition, name, "_end", |b, scope| {
                body(b, &LoopScope { break_label: scope.else_label(), continue_label: head })?;
                b.branch(head, Condition::Always);
                Ok(())
            })?;
            Ok(())
        })
    }

    /// A `for` loop. The condition is built after the initializer has run so
    /// that it sees the registers the initializer claimed.
    pub fn for_(
        &mut self,
        name: &str,
        initializer: impl FnOnce(&mut Builder) -> Result<()>,
        condition: impl FnOnce(&mut Builder) -> Result<Value>,
        incrementer: impl FnOnce(&mut Builder) -> Result<()>,
        body: impl FnOnce(&mut Builder, &LoopScope) -> Result<()>,
    ) -> Result<()> {
        let parent = self.current;
        let wrapper = self.new_scope(parent, Name::Fixed(name.to_string()));
        self.within(wrapper, |b| {
            initializer(b)?;
            let head = b.label_with_suffix(wrapper, "");
            b.define_label(head)?;
            let condition = condition(b)?;
            b.guarded_block(condition, name, "_end", |b, scope| {
                let next = b.label_with_suffix(wrapper, "_incrementer");
                body(b, &LoopScope { break_label: scope.else_label(), continue_label: next })?;
                b.define_label(next)?;
                incrementer(b)?;
                b.branch(head, Condition::Always);
                Ok(())
            })?;
            Ok(())
        })?;
        self.add_instruction(parent, Instruction::Block(wrapper));
        Ok(())
    }

    /// An endless loop; only `break_loop` leaves it.
    pub fn loop_block(&mut self, name: &str, body: impl FnOnce(&mut Builder, &LoopScope) -> Result<()>) -> Result<()> {
        self.loop_wrapper(name, |b, head| {
            let wrapper = b.current_scope();
            let end = b.label_with_suffix(wrapper, "_end");
            body(b, &LoopScope { break_label: end, continue_label: head })?;
            b.branch(head, Condition::Always);
            b.define_label(end)
        })
    }

    /// Iterate `index` over `progression`.
    pub fn for_each(
        &mut self,
        index: impl Into<Storage>,
        progression: Progression,
        name: &str,
        body: impl FnOnce(&mut Builder, &LoopScope) -> Result<()>,
    ) -> Result<()> {
        let index = index.into();
        self.for_(
            name,
            |b| b.assign(index, progression.start),
            |b| progression.keep_going(b, index.into()),
            |b| progression.advance(b, index),
            body,
        )
    }
}
