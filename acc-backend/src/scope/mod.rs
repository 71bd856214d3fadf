//! Scope arena and register allocator
//!
//! A `Builder` owns every scope of the program being built together with the
//! arenas for virtual registers, labels and temporary addresses. Each scope
//! keeps an ordered instruction list and two register sets:
//!
//! - `available`: registers this scope may still hand out. A child starts
//!   with a copy of its parent's set; a subroutine starts with fresh virtual
//!   registers instead.
//! - `used`: registers this scope has claimed.
//!
//! Claiming a register marks it on the way up (so enclosing subroutines can
//! discover parameters and internal registers) and removes it from
//! `available` on the way down (so no descendant hands it out again).

mod set;

pub use set::RegisterSet;

use crate::ir::{Address, Instruction, LabelId, Register, ScopeId, Subroutine, TempId, Value, VirtualId};
use crate::naming::{LabelData, Name};
use acc_common::{AccError, LoweringOptions, Result};
use acc_codegen::Condition;
use log::{debug, trace};
use std::collections::HashMap;

pub(crate) struct ScopeData {
    pub(crate) parent: Option<ScopeId>,
    pub(crate) name: Name,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) available: RegisterSet,
    pub(crate) used: RegisterSet,
    pub(crate) temps: Vec<TempId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) subroutine: Option<SubroutineData>,
}

pub(crate) struct SubroutineData {
    pub(crate) parameters: RegisterSet,
    pub(crate) internal: RegisterSet,
    pub(crate) result: VirtualId,
    pub(crate) end: LabelId,
    /// First virtual register created for this template; everything from
    /// here on that shows up in its body belongs to it.
    pub(crate) first_virtual: usize,
    pub(crate) conditional: Option<ConditionalData>,
}

pub(crate) struct ConditionalData {
    pub(crate) truth: ScopeId,
    pub(crate) negated: Option<Subroutine>,
    pub(crate) attached: bool,
}

/// The program under construction.
///
/// Construction calls act on the current scope; `within` and `block` move the
/// cursor into nested scopes for the duration of a closure.
pub struct Builder {
    pub(crate) scopes: Vec<ScopeData>,
    pub(crate) virtuals: Vec<Register>,
    pub(crate) labels: Vec<LabelData>,
    pub(crate) temps: Vec<Option<u16>>,
    /// Reloads of the registers a subroutine copy spilled, keyed by the copy.
    /// Every way out of the copy runs them.
    pub(crate) spills: HashMap<ScopeId, Vec<Instruction>>,
    pub(crate) current: ScopeId,
    pub(crate) root: ScopeId,
    pub(crate) options: LoweringOptions,
}

impl Builder {
    pub fn new(options: LoweringOptions) -> Self {
        let available: RegisterSet = (0..options.register_count).map(Register::Physical).collect();
        let root = ScopeData {
            parent: None,
            name: Name::Fixed("main".to_string()),
            instructions: Vec::new(),
            available,
            used: RegisterSet::new(),
            temps: Vec::new(),
            children: Vec::new(),
            subroutine: None,
        };
        Builder {
            scopes: vec![root],
            virtuals: Vec::new(),
            labels: Vec::new(),
            temps: Vec::new(),
            spills: HashMap::new(),
            current: ScopeId(0),
            root: ScopeId(0),
            options,
        }
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn root_scope(&self) -> ScopeId {
        self.root
    }

    pub fn instructions(&self, scope: ScopeId) -> &[Instruction] {
        &self.scopes[scope.0].instructions
    }

    pub fn available_registers(&self, scope: ScopeId) -> &RegisterSet {
        &self.scopes[scope.0].available
    }

    pub fn used_registers(&self, scope: ScopeId) -> &RegisterSet {
        &self.scopes[scope.0].used
    }

    pub fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    // ===== Arenas =====

    pub(crate) fn push_scope(&mut self, data: ScopeData) -> ScopeId {
        self.scopes.push(data);
        ScopeId(self.scopes.len() - 1)
    }

    /// A plain child scope that inherits the parent's free registers.
    pub(crate) fn new_scope(&mut self, parent: ScopeId, name: Name) -> ScopeId {
        let available = self.scopes[parent.0].available.clone();
        let id = self.push_scope(ScopeData {
            parent: Some(parent),
            name,
            instructions: Vec::new(),
            available,
            used: RegisterSet::new(),
            temps: Vec::new(),
            children: Vec::new(),
            subroutine: None,
        });
        self.scopes[parent.0].children.push(id);
        id
    }

    pub(crate) fn new_virtual(&mut self) -> VirtualId {
        self.virtuals.push(Register::Discard);
        VirtualId(self.virtuals.len() - 1)
    }

    pub(crate) fn bind(&mut self, virtual_reg: VirtualId, underlying: Register) {
        trace!("Bound V{} to {}", virtual_reg.0, underlying);
        self.virtuals[virtual_reg.0] = underlying;
    }

    pub(crate) fn new_temp(&mut self) -> TempId {
        self.temps.push(None);
        TempId(self.temps.len() - 1)
    }

    /// Follow a virtual register chain to the register it finally denotes.
    pub fn resolve(&self, register: Register) -> Register {
        let mut current = register;
        // A chain can visit each virtual register at most once.
        for _ in 0..=self.virtuals.len() {
            match current {
                Register::Virtual(id) => current = self.virtuals[id.0],
                other => return other,
            }
        }
        debug!("Virtual register chain from {register} does not terminate");
        Register::Discard
    }

    /// Run `f` with `scope` as the current scope.
    pub fn within<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Builder) -> Result<T>) -> Result<T> {
        let previous = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = previous;
        result
    }

    /// Build a nested block in the current scope.
    pub fn block(&mut self, f: impl FnOnce(&mut Builder) -> Result<()>) -> Result<ScopeId> {
        let parent = self.current;
        let child = self.new_scope(parent, Name::Fixed("block".to_string()));
        self.within(child, f)?;
        self.add_instruction(parent, Instruction::Block(child));
        Ok(child)
    }

    // ===== Register bookkeeping =====

    pub(crate) fn add_instruction(&mut self, scope: ScopeId, instruction: Instruction) {
        let registers = instruction.registers();
        if let Instruction::Block(child) = instruction {
            if !self.scopes[scope.0].children.contains(&child) {
                self.scopes[scope.0].children.push(child);
            }
        }
        self.scopes[scope.0].instructions.push(instruction);
        self.use_registers(scope, &registers);
    }

    /// Append an instruction to the current scope.
    pub fn emit(&mut self, instruction: Instruction) {
        self.add_instruction(self.current, instruction);
    }

    pub(crate) fn use_registers(&mut self, scope: ScopeId, registers: &[Register]) {
        for register in registers.iter().filter(|r| **r != Register::Discard) {
            self.mark_register(scope, *register);
        }
        for register in registers.iter().filter(|r| **r != Register::Discard) {
            self.remove_register(scope, *register);
        }
    }

    pub(crate) fn use_register(&mut self, scope: ScopeId, register: Register) {
        self.use_registers(scope, &[register]);
    }

    /// Propagate a use upwards. Subroutines on the way record it as an
    /// internal register if it is one of their own, and as a parameter if
    /// their caller had already claimed it.
    pub(crate) fn mark_register(&mut self, scope: ScopeId, register: Register) {
        let parent = self.scopes[scope.0].parent;
        if let Some(parent) = parent {
            self.mark_register(parent, register);
        }

        if self.scopes[scope.0].subroutine.is_none() {
            return;
        }

        let owned = matches!(register, Register::Virtual(_)) && self.scopes[scope.0].available.contains(register);
        if owned {
            let inserted = self.subroutine_data_mut(scope).internal.insert(register);
            if inserted {
                debug!("Internal register {register} discovered in '{}'", self.scope_name(scope));
            }
        }

        if let Some(parent) = parent {
            if self.scopes[parent.0].used.contains(register) {
                self.add_parameter(scope, register);
            }
        }
    }

    /// A parameter occupies a register slot of the subroutine, so one of its
    /// own virtual registers is retired in exchange.
    pub(crate) fn add_parameter(&mut self, scope: ScopeId, register: Register) {
        if !self.subroutine_data_mut(scope).parameters.insert(register) {
            return;
        }
        debug!("Parameter {register} discovered in '{}'", self.scope_name(scope));
        if let Some(slot) = self.scopes[scope.0].available.first() {
            self.remove_register(scope, slot);
        }
    }

    /// Take a register out of circulation in this scope and every scope
    /// nested in it.
    pub(crate) fn remove_register(&mut self, scope: ScopeId, register: Register) {
        if !self.scopes[scope.0].available.remove(register) {
            return;
        }
        self.scopes[scope.0].used.insert(register);
        let children = self.scopes[scope.0].children.clone();
        for child in children {
            self.remove_register(child, register);
        }
    }

    pub(crate) fn subroutine_data(&self, scope: ScopeId) -> &SubroutineData {
        match &self.scopes[scope.0].subroutine {
            Some(data) => data,
            None => unreachable!("scope {} is not a subroutine", scope.0),
        }
    }

    pub(crate) fn subroutine_data_mut(&mut self, scope: ScopeId) -> &mut SubroutineData {
        match &mut self.scopes[scope.0].subroutine {
            Some(data) => data,
            None => unreachable!("scope {} is not a subroutine", scope.0),
        }
    }

    // ===== Allocation =====

    /// Claim registers referenced directly, e.g. a fixed `R3`.
    pub fn claim(&mut self, registers: &[Register]) {
        self.use_registers(self.current, registers);
    }

    /// Allocate a register in the current scope, optionally initialised.
    pub fn register(&mut self, initial: Option<Value>) -> Result<Register> {
        let scope = self.current;
        let register = self.scopes[scope.0]
            .available
            .last()
            .ok_or_else(|| AccError::registers_exhausted(self.scope_name(scope)))?;
        debug!("Allocated {register} in '{}'", self.scope_name(scope));
        self.use_register(scope, register);
        if let Some(value) = initial {
            self.assign(register, value)?;
        }
        Ok(register)
    }

    /// Allocate a temporary memory cell in the current scope. Its address is
    /// decided during finalization.
    pub fn memory(&mut self, initial: Option<Value>) -> Result<Address> {
        let temp = self.new_temp();
        let scope = self.current;
        self.scopes[scope.0].temps.push(temp);
        let address = Address::Temporary(temp);
        if let Some(value) = initial {
            self.assign(address, value)?;
        }
        Ok(address)
    }

    /// Whether a temporary should live in a register rather than memory.
    pub fn should_use_registers(&self) -> bool {
        self.scopes[self.current.0].available.len() > self.options.register_threshold
    }

    /// Place a value in a fresh register, or in memory once registers run low.
    pub fn temporary(&mut self, initial: Value) -> Result<Value> {
        if self.should_use_registers() {
            Ok(Value::Register(self.register(Some(initial))?))
        } else {
            Ok(Value::Memory(self.memory(Some(initial))?))
        }
    }

    // ===== Labels and simple instructions =====

    pub fn label(&mut self, name: impl Into<String>) -> LabelId {
        self.new_label(Name::Fixed(name.into()))
    }

    pub(crate) fn new_label(&mut self, name: Name) -> LabelId {
        self.labels.push(LabelData { name, defined: false });
        LabelId(self.labels.len() - 1)
    }

    /// Place a label marker at the current position.
    pub fn define_label(&mut self, label: LabelId) -> Result<()> {
        if self.labels[label.0].defined {
            return Err(AccError::LabelRedefined { label: self.label_name(label) });
        }
        self.labels[label.0].defined = true;
        self.emit(Instruction::Label(label));
        Ok(())
    }

    pub fn branch(&mut self, label: LabelId, condition: Condition) {
        self.emit(Instruction::Branch { condition, label });
    }

    pub fn halt(&mut self) {
        self.emit(Instruction::Halt);
    }
}
