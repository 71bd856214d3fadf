//! `if`, `else` and `else if`
//!
//! An `if` places its body in the truth block of a conditional and
//! materializes the conditional in a wrapper block. The false label of the
//! conditional then doubles as the else label: whatever the wrapper gets
//! after the conditional only runs when the condition failed, provided the
//! truth block ends by jumping past it. That jump lives in an initially empty
//! `end of truth` block which is filled in once an `else` shows up.

use crate::ir::{Instruction, LabelId, Register, ScopeId, Value};
use crate::naming::Name;
use crate::scope::Builder;
use acc_codegen::Condition;
use acc_common::{AccError, Result};
use log::debug;

/// Handed to the body of an `if`.
#[derive(Debug, Clone, Copy)]
pub struct IfScope {
    else_label: LabelId,
}

impl IfScope {
    /// Where control goes when the condition fails.
    pub fn else_label(&self) -> LabelId {
        self.else_label
    }

    pub fn branch_to_else(&self, b: &mut Builder) {
        b.branch(self.else_label, Condition::Always);
    }
}

/// An `if` that may still get an `else` or `else if`.
#[derive(Debug)]
pub struct IfChain {
    wrapper: ScopeId,
    end_of_truth: ScopeId,
}

impl IfChain {
    pub fn scope(&self) -> ScopeId {
        self.wrapper
    }

    fn skip_rest(&self, b: &mut Builder, end: LabelId) -> Result<()> {
        b.within(self.end_of_truth, |b| {
            b.branch(end, Condition::Always);
            Ok(())
        })
    }

    pub fn else_(self, b: &mut Builder, body: impl FnOnce(&mut Builder) -> Result<()>) -> Result<()> {
        let end = b.label_with_suffix(self.wrapper, "_end");
        self.skip_rest(b, end)?;
        b.within(self.wrapper, |b| {
            body(b)?;
            b.define_label(end)
        })
    }

    pub fn else_if(
        self,
        b: &mut Builder,
        condition: impl Into<Value>,
        name: &str,
        body: impl FnOnce(&mut Builder, &IfScope) -> Result<()>,
    ) -> Result<ElseIfChain> {
        let end = b.label_with_suffix(self.wrapper, "_end");
        self.skip_rest(b, end)?;
        let latest = b.within(self.wrapper, |b| b.if_(condition, name, body))?;

        let placeholder = b.new_scope(self.wrapper, Name::Derived { owner: self.wrapper, suffix: "_rest".to_string() });
        b.within(placeholder, |b| b.define_label(end))?;
        b.add_instruction(self.wrapper, Instruction::Block(placeholder));
        Ok(ElseIfChain { latest, placeholder, end })
    }
}

/// A chain of `else if` branches sharing one end label.
///
/// The end label sits alone in a placeholder block after the latest branch.
/// Extending the chain takes it out, puts the new branch in the placeholder
/// and the label after it again.
#[derive(Debug)]
pub struct ElseIfChain {
    latest: IfChain,
    pub(crate) placeholder: ScopeId,
    end: LabelId,
}

impl ElseIfChain {
    fn take_placeholder(&self, b: &mut Builder) -> Result<()> {
        let intact = matches!(
            b.scopes[self.placeholder.0].instructions.as_slice(),
            [Instruction::Label(label)] if *label == self.end
        );
        if !intact {
            return Err(AccError::MalformedElseChain { name: b.label_name(self.end) });
        }
        b.scopes[self.placeholder.0].instructions.clear();
        Ok(())
    }

    pub fn else_if(
        self,
        b: &mut Builder,
        condition: impl Into<Value>,
        name: &str,
        body: impl FnOnce(&mut Builder, &IfScope) -> Result<()>,
    ) -> Result<ElseIfChain> {
        self.take_placeholder(b)?;
        self.latest.skip_rest(b, self.end)?;
        let latest = b.within(self.placeholder, |b| b.if_(condition, name, body))?;

        let placeholder =
            b.new_scope(self.placeholder, Name::Derived { owner: self.placeholder, suffix: "_rest".to_string() });
        b.add_instruction(placeholder, Instruction::Label(self.end));
        b.add_instruction(self.placeholder, Instruction::Block(placeholder));
        Ok(ElseIfChain { latest, placeholder, end: self.end })
    }

    pub fn else_(self, b: &mut Builder, body: impl FnOnce(&mut Builder) -> Result<()>) -> Result<()> {
        self.take_placeholder(b)?;
        self.latest.skip_rest(b, self.end)?;
        b.within(self.placeholder, |b| {
            body(b)?;
            b.emit(Instruction::Label(self.end));
            Ok(())
        })
    }
}

impl Builder {
    /// Run `body` only when `condition` holds. Anything other than a
    /// conditional is tested against zero.
    pub fn if_(
        &mut self,
        condition: impl Into<Value>,
        name: &str,
        body: impl FnOnce(&mut Builder, &IfScope) -> Result<()>,
    ) -> Result<IfChain> {
        self.guarded_block(condition.into(), name, "_false", body)
    }

    /// Shared by `if` and the loops, which name the false label after the
    /// loop end instead.
    pub(crate) fn guarded_block(
        &mut self,
        condition: Value,
        name: &str,
        false_suffix: &str,
        body: impl FnOnce(&mut Builder, &IfScope) -> Result<()>,
    ) -> Result<IfChain> {
        let sub = self.as_conditional(condition)?;
        let truth = match self.attach_truth_block(sub) {
            Some(truth) => truth,
            None => return Err(AccError::TruthBlockReused { name: self.scope_name(sub.scope) }),
        };
        self.rename_scope(sub.scope, name);
        let else_label = self.end_label(sub);
        self.set_label_suffix(else_label, false_suffix);

        let scope = IfScope { else_label };
        self.within(truth, |b| body(b, &scope))?;
        let end_of_truth = self.new_scope(truth, Name::Derived { owner: sub.scope, suffix: "_endOfTruth".to_string() });
        self.add_instruction(truth, Instruction::Block(end_of_truth));

        let parent = self.current;
        let wrapper = self.new_scope(parent, Name::Fixed(name.to_string()));
        let (_, remap) = self.within(wrapper, |b| b.materialize_subroutine(sub, Register::Discard))?;
        self.add_instruction(parent, Instruction::Block(wrapper));
        debug!("Built if '{name}' in '{}'", self.scope_name(parent));

        Ok(IfChain { wrapper, end_of_truth: remap.scope(end_of_truth) })
    }
}
