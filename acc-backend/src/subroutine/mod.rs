//! Subroutine lowering and calling convention
//!
//! A subroutine is built in two phases:
//!
//! 1. The body runs once against a template scope whose registers are fresh
//!    virtual registers. Every register the body touches is marked, which is
//!    how parameters (registers the caller already claimed) and internal
//!    registers (the template's own virtual registers) are discovered.
//! 2. Each call site materializes a fresh copy of the template: parameters
//!    are claimed in the caller, the return slot is bound to the destination,
//!    internal registers are bound to the caller's free registers, and any
//!    that do not fit borrow an in-use caller register that is saved to a
//!    temporary cell before the body and restored on every way out of it:
//!    after the end label, and before any branch to a label outside the
//!    copy (see `finalize`).

use crate::ir::{
    Address, Calculation, Instruction, LabelId, RegOrConst, Register, ScopeId, Subroutine, TempId, Value,
    VirtualId,
};
use crate::naming::{LabelData, Name};
use crate::scope::{Builder, RegisterSet, ScopeData, SubroutineData};
use acc_common::{AccError, Result};
use acc_codegen::Condition;
use log::debug;
use std::collections::HashMap;

/// Handle translation from a template to one of its copies.
#[derive(Debug, Default)]
pub(crate) struct Remap {
    pub(crate) scopes: HashMap<ScopeId, ScopeId>,
    pub(crate) virtuals: HashMap<VirtualId, VirtualId>,
    pub(crate) labels: HashMap<LabelId, LabelId>,
    pub(crate) temps: HashMap<TempId, TempId>,
    /// Registers the template reads or writes that it does not own.
    pub(crate) external: Vec<Register>,
}

impl Remap {
    pub(crate) fn register(&self, register: Register) -> Register {
        match register {
            Register::Virtual(id) => Register::Virtual(self.virtual_id(id)),
            other => other,
        }
    }

    pub(crate) fn virtual_id(&self, id: VirtualId) -> VirtualId {
        self.virtuals.get(&id).copied().unwrap_or(id)
    }

    pub(crate) fn address(&self, address: Address) -> Address {
        match address {
            Address::Temporary(temp) => Address::Temporary(self.temps.get(&temp).copied().unwrap_or(temp)),
            fixed => fixed,
        }
    }

    pub(crate) fn label(&self, label: LabelId) -> LabelId {
        self.labels.get(&label).copied().unwrap_or(label)
    }

    pub(crate) fn scope(&self, scope: ScopeId) -> ScopeId {
        self.scopes.get(&scope).copied().unwrap_or(scope)
    }
}

impl Builder {
    /// Build a subroutine template in the current scope.
    ///
    /// `operands` are the inputs the body works on. Registers among them are
    /// declared parameters; memory operands and calculations are first
    /// localized into scratch registers (or memory when registers run low),
    /// in order, before `body` sees them.
    pub fn build_subroutine(
        &mut self,
        name: &str,
        operands: &[Value],
        body: impl FnOnce(&mut Builder, Subroutine, &[Value]) -> Result<()>,
    ) -> Result<Subroutine> {
        let parameters = self.collect_register_parameters(operands);
        let sub = self.begin_subroutine(Name::Fixed(name.to_string()), parameters);
        self.within(sub.scope, |b| {
            let locals = b.localized(operands)?;
            body(b, sub, &locals)
        })?;
        Ok(sub)
    }

    pub(crate) fn begin_subroutine(&mut self, name: Name, parameters: RegisterSet) -> Subroutine {
        let parent = self.current;
        let first_virtual = self.virtuals.len();
        let slots = (self.options.register_count as usize).saturating_sub(parameters.len());
        let available: RegisterSet = (0..slots).map(|_| Register::Virtual(self.new_virtual())).collect();
        let result = self.new_virtual();

        let scope = self.push_scope(ScopeData {
            parent: Some(parent),
            name,
            instructions: Vec::new(),
            available,
            used: RegisterSet::new(),
            temps: Vec::new(),
            children: Vec::new(),
            subroutine: None,
        });
        let end = self.label_with_suffix(scope, "_end");
        self.scopes[scope.0].subroutine = Some(SubroutineData {
            parameters,
            internal: RegisterSet::new(),
            result,
            end,
            first_virtual,
            conditional: None,
        });
        debug!("Began subroutine '{}' with {slots} register slots", self.scope_name(scope));
        Subroutine { scope, result }
    }

    /// Registers read by a calculation.
    pub fn calculation_parameters(&self, calculation: &Calculation) -> Vec<Register> {
        let mut registers = Vec::new();
        match calculation {
            Calculation::Add(first, second)
            | Calculation::Subtract(first, second)
            | Calculation::Logical(_, first, second) => {
                registers.push(*first);
                if let RegOrConst::Register(register) = second {
                    registers.push(*register);
                }
            }
            Calculation::Not(operand) => {
                if let RegOrConst::Register(register) = operand {
                    registers.push(*register);
                }
            }
            Calculation::Subroutine(sub) => {
                registers.extend(self.subroutine_data(sub.scope).parameters.iter());
            }
        }
        registers
    }

    /// Registers among the operands plus those read by every calculation
    /// after the first. The first calculation is evaluated before anything
    /// else in the body, so its reads are discovered while it runs.
    fn collect_register_parameters(&self, operands: &[Value]) -> RegisterSet {
        let mut parameters = RegisterSet::new();
        let mut seen_calculation = false;
        for operand in operands {
            match operand {
                Value::Register(register) => {
                    parameters.insert(*register);
                }
                Value::Calculation(calculation) => {
                    if seen_calculation {
                        for register in self.calculation_parameters(calculation) {
                            parameters.insert(register);
                        }
                    }
                    seen_calculation = true;
                }
                Value::Constant(_) | Value::Memory(_) => {}
            }
        }
        parameters
    }

    /// Bring operands into a form the body can use directly.
    pub fn localized(&mut self, operands: &[Value]) -> Result<Vec<Value>> {
        let mut locals = Vec::with_capacity(operands.len());
        for operand in operands {
            let local = match operand {
                Value::Register(_) | Value::Constant(_) => *operand,
                Value::Memory(_) if self.should_use_registers() => Value::Register(self.register(Some(*operand))?),
                Value::Memory(_) => *operand,
                Value::Calculation(_) => self.temporary(*operand)?,
            };
            locals.push(local);
        }
        Ok(locals)
    }

    pub fn end_label(&self, sub: Subroutine) -> LabelId {
        self.subroutine_data(sub.scope).end
    }

    pub fn parameters(&self, sub: Subroutine) -> &RegisterSet {
        &self.subroutine_data(sub.scope).parameters
    }

    pub fn internal_registers(&self, sub: Subroutine) -> &RegisterSet {
        &self.subroutine_data(sub.scope).internal
    }

    /// Set the return value (if any) and leave the subroutine.
    pub fn return_value(&mut self, sub: Subroutine, value: Option<Value>) -> Result<()> {
        if let Some(value) = value {
            self.assign(sub.result(), value)?;
        }
        let end = self.end_label(sub);
        self.branch(end, Condition::Always);
        Ok(())
    }

    /// Materialize a copy of `sub` in the current scope with its return slot
    /// bound to `into`. Returns the block holding the copy.
    pub fn store_into(&mut self, sub: Subroutine, into: Register) -> Result<ScopeId> {
        let (copy, _) = self.materialize_subroutine(sub, into)?;
        Ok(copy)
    }

    /// Materialize for side effects only; the result goes nowhere.
    pub fn call(&mut self, sub: Subroutine) -> Result<ScopeId> {
        self.store_into(sub, Register::Discard)
    }

    pub(crate) fn materialize_subroutine(&mut self, sub: Subroutine, into: Register) -> Result<(ScopeId, Remap)> {
        let caller = self.current;
        let (copy, remap) = self.instantiate(sub, caller);

        let data = self.subroutine_data(sub.scope);
        let mut parameters: Vec<Register> = data.parameters.iter().collect();
        for register in &remap.external {
            if !parameters.contains(register) {
                parameters.push(*register);
            }
        }
        let internal: Vec<VirtualId> = data
            .internal
            .iter()
            .filter_map(|register| match register {
                Register::Virtual(id) => Some(remap.virtual_id(id)),
                _ => None,
            })
            .collect();
        let end = remap.label(data.end);
        let result = remap.virtual_id(data.result);
        let name = self.scope_name(sub.scope);

        debug!(
            "Materializing '{name}' into {into} in '{}': {} parameters, {} internal registers",
            self.scope_name(caller),
            parameters.len(),
            internal.len()
        );

        // Parameters and the destination now belong to the caller.
        self.use_registers(caller, &parameters);
        if into != Register::Discard {
            self.use_register(caller, into);
        }
        self.bind(result, into);

        let free: Vec<Register> = self.scopes[caller.0]
            .available
            .iter()
            .filter(|register| *register != into && !parameters.contains(register))
            .collect();
        let mut pending = internal.into_iter();
        for host in free {
            let Some(id) = pending.next() else { break };
            self.bind(id, host);
            self.mark_register(caller, host);
        }

        let overflow: Vec<VirtualId> = pending.collect();
        let mut saves = Vec::new();
        let mut restores = Vec::new();
        if !overflow.is_empty() {
            let hosts: Vec<Register> = self
                .live_registers(caller)
                .into_iter()
                .filter(|register| *register != into && !parameters.contains(register))
                .collect();
            if hosts.len() < overflow.len() {
                return Err(AccError::registers_exhausted(name));
            }
            for (id, host) in overflow.into_iter().zip(hosts) {
                let temp = self.new_temp();
                self.scopes[copy.0].temps.push(temp);
                let address = Address::Temporary(temp);
                debug!("Spilling {host} around '{name}'");
                saves.push(Instruction::Store { from: host, into: address });
                restores.push(Instruction::Load { into: host, from: address });
                self.bind(id, host);
            }
        }

        let body = std::mem::take(&mut self.scopes[copy.0].instructions);
        let mut instructions = saves;
        instructions.extend(body);
        instructions.push(Instruction::Label(end));
        instructions.extend(restores.iter().cloned());
        self.scopes[copy.0].instructions = instructions;
        if !restores.is_empty() {
            self.spills.insert(copy, restores);
        }

        self.add_instruction(caller, Instruction::Block(copy));
        Ok((copy, remap))
    }

    /// Copy the template tree of `sub` under `parent`.
    ///
    /// Labels defined inside the template, temporaries it owns and virtual
    /// registers created since it began get fresh handles; everything else
    /// (caller registers, outer labels, fixed addresses) is shared.
    fn instantiate(&mut self, sub: Subroutine, parent: ScopeId) -> (ScopeId, Remap) {
        let data = self.subroutine_data(sub.scope);
        let first_virtual = data.first_virtual;
        let mut roots = vec![Register::Virtual(data.result)];
        roots.extend(data.internal.iter());
        let end = data.end;

        let tree = self.scope_tree(sub.scope);
        let mut remap = Remap::default();
        let mut virtuals = Vec::new();
        let mut labels = vec![end];
        let mut temps = Vec::new();

        let owned = |register: Register| match register {
            Register::Virtual(id) => id.0 >= first_virtual,
            _ => false,
        };
        let note_register = |register: Register, virtuals: &mut Vec<VirtualId>, builder: &Builder| {
            let mut current = register;
            while let Register::Virtual(id) = current {
                if id.0 < first_virtual || virtuals.contains(&id) {
                    break;
                }
                virtuals.push(id);
                current = builder.virtuals[id.0];
            }
        };

        for register in roots {
            note_register(register, &mut virtuals, self);
        }
        for scope in &tree {
            let data = &self.scopes[scope.0];
            temps.extend(data.temps.iter().copied());
            for instruction in &data.instructions {
                if let Instruction::Label(label) = instruction {
                    labels.push(*label);
                }
                for register in instruction.registers() {
                    if register == Register::Discard {
                        continue;
                    }
                    if !owned(register) && !remap.external.contains(&register) {
                        remap.external.push(register);
                    }
                    note_register(register, &mut virtuals, self);
                }
            }
        }

        for label in labels {
            if remap.labels.contains_key(&label) {
                continue;
            }
            let name = self.labels[label.0].name.clone();
            self.labels.push(LabelData { name, defined: true });
            remap.labels.insert(label, LabelId(self.labels.len() - 1));
        }
        for temp in temps {
            let fresh = self.new_temp();
            remap.temps.insert(temp, fresh);
        }
        for id in &virtuals {
            let fresh = self.new_virtual();
            remap.virtuals.insert(*id, fresh);
        }
        for id in &virtuals {
            let underlying = remap.register(self.virtuals[id.0]);
            self.virtuals[remap.virtual_id(*id).0] = underlying;
        }

        for scope in &tree {
            let name = self.scopes[scope.0].name.clone();
            let copy = self.push_scope(ScopeData {
                parent: None,
                name,
                instructions: Vec::new(),
                available: RegisterSet::new(),
                used: RegisterSet::new(),
                temps: Vec::new(),
                children: Vec::new(),
                subroutine: None,
            });
            remap.scopes.insert(*scope, copy);
        }

        for scope in &tree {
            let copy = remap.scope(*scope);
            let template = &self.scopes[scope.0];
            let instructions: Vec<Instruction> = template
                .instructions
                .iter()
                .map(|instruction| {
                    instruction.map(
                        |r| remap.register(r),
                        |a| remap.address(a),
                        |l| remap.label(l),
                        |s| remap.scope(s),
                    )
                })
                .collect();
            let temps: Vec<TempId> = template.temps.iter().map(|t| remap.temps[t]).collect();
            let parent_copy = match template.parent {
                Some(p) if *scope != sub.scope => remap.scope(p),
                _ => parent,
            };
            let children = instructions
                .iter()
                .filter_map(|instruction| match instruction {
                    Instruction::Block(child) => Some(*child),
                    _ => None,
                })
                .collect();

            let spilled: Option<Vec<Instruction>> = self.spills.get(scope).map(|restores| {
                restores
                    .iter()
                    .map(|instruction| {
                        instruction.map(
                            |r| remap.register(r),
                            |a| remap.address(a),
                            |l| remap.label(l),
                            |s| remap.scope(s),
                        )
                    })
                    .collect()
            });

            let target = &mut self.scopes[copy.0];
            target.parent = Some(parent_copy);
            target.instructions = instructions;
            target.temps = temps;
            target.children = children;
            if let Some(restores) = spilled {
                self.spills.insert(copy, restores);
            }
        }

        (remap.scope(sub.scope), remap)
    }

    /// Registers claimed by `scope` and the scopes enclosing it, up to the
    /// nearest subroutine. These may be borrowed as spill hosts.
    fn live_registers(&self, scope: ScopeId) -> Vec<Register> {
        let mut live: Vec<Register> = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = &self.scopes[id.0];
            for register in data.used.iter() {
                if !live.contains(&register) {
                    live.push(register);
                }
            }
            if data.subroutine.is_some() {
                break;
            }
            current = data.parent;
        }
        live
    }

    /// The scope and every block nested in it, parents before children.
    pub(crate) fn scope_tree(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut tree = Vec::new();
        let mut stack = vec![scope];
        while let Some(current) = stack.pop() {
            tree.push(current);
            let nested: Vec<ScopeId> = self.scopes[current.0]
                .instructions
                .iter()
                .filter_map(|instruction| match instruction {
                    Instruction::Block(child) => Some(*child),
                    _ => None,
                })
                .collect();
            stack.extend(nested.into_iter().rev());
        }
        tree
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
