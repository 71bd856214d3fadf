//! Finalization
//!
//! Turns the scope tree into a flat listing:
//!
//! 1. Temporary addresses are resolved, deepest scope first.
//! 2. Blocks are spliced into one instruction list with every virtual
//!    register chased to the register it denotes. A branch that leaves a
//!    subroutine copy which spilled registers reloads them first.
//! 3. The peephole passes in [`optimize`] clean up the result.
//!
//! The resulting [`Program`] renders to [`AsmInst`]s or listing text.

mod optimize;

use crate::ir::{Address, Instruction, LabelId, RegOrConst, Register, ScopeId};
use crate::scope::Builder;
use acc_codegen::{emit_instructions, AsmInst, Condition, Operand2, Reg};
use acc_common::{AccError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Serializable view of a finalized program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub lines: Vec<String>,
    pub labels: Vec<String>,
    /// Memory cells used for temporaries.
    pub temporaries: Vec<u16>,
}

/// A finalized program.
pub struct Program {
    builder: Builder,
    instructions: Vec<Instruction>,
    label_names: HashMap<LabelId, String>,
}

/// The spilled registers of a subroutine copy being flattened.
struct SpillFrame {
    /// Labels placed anywhere inside the copy.
    labels: HashSet<LabelId>,
    restores: Vec<Instruction>,
}

impl Builder {
    /// Resolve, flatten and optimize everything reachable from the root scope.
    pub fn finalize(mut self) -> Result<Program> {
        self.resolve_addresses()?;
        let mut instructions = Vec::new();
        let root = self.root;
        self.flatten(root, &mut Vec::new(), &mut instructions);
        let flattened = instructions.len();

        let mut program = Program { builder: self, instructions, label_names: HashMap::new() };
        program.optimize();
        info!(
            "Finalized program: {} instructions flattened, {} after optimization",
            flattened,
            program.instructions.len()
        );
        Ok(program)
    }

    fn resolve_addresses(&mut self) -> Result<()> {
        let capacity = self.options.memory_cells;
        let mut fixed = BTreeSet::new();
        for scope in self.scope_tree(self.root) {
            for instruction in &self.scopes[scope.0].instructions {
                for address in instruction.addresses() {
                    if let Address::Fixed(address) = address {
                        if address >= capacity {
                            return Err(AccError::AddressOutOfRange { address, capacity });
                        }
                        fixed.insert(address);
                    }
                }
            }
        }
        self.resolve_scope_addresses(self.root, &fixed)?;
        Ok(())
    }

    /// Resolve the temporaries of `scope` after those of its nested blocks.
    /// Returns every address taken in the subtree.
    fn resolve_scope_addresses(&mut self, scope: ScopeId, fixed: &BTreeSet<u16>) -> Result<BTreeSet<u16>> {
        let nested: Vec<ScopeId> = self.scopes[scope.0]
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Block(child) => Some(*child),
                _ => None,
            })
            .collect();

        let mut taken = BTreeSet::new();
        for child in nested {
            taken.extend(self.resolve_scope_addresses(child, fixed)?);
        }

        let capacity = self.options.memory_cells;
        let own = self.scopes[scope.0].temps.clone();
        let mut candidates = (0..capacity).rev().filter(|address| !fixed.contains(address) && !taken.contains(address));
        let mut assigned = Vec::with_capacity(own.len());
        for temp in &own {
            let address = candidates.next().ok_or(AccError::MemoryExhausted { requested: own.len(), capacity })?;
            assigned.push((*temp, address));
        }

        for (temp, address) in assigned {
            debug!("Temporary T{} of '{}' resolved to {address}", temp.0, self.scope_name(scope));
            self.temps[temp.0] = Some(address);
            taken.insert(address);
        }
        Ok(taken)
    }

    fn flatten(&mut self, scope: ScopeId, frames: &mut Vec<SpillFrame>, out: &mut Vec<Instruction>) {
        let framed = match self.spills.get(&scope) {
            Some(restores) => {
                let frame = SpillFrame { labels: self.defined_labels(scope), restores: restores.clone() };
                frames.push(frame);
                true
            }
            None => false,
        };

        let instructions = self.scopes[scope.0].instructions.clone();
        for instruction in instructions {
            match instruction {
                Instruction::Block(child) => self.flatten(child, frames, out),
                Instruction::Branch { condition, label } => {
                    // Innermost first; a label defined in a copy is defined in
                    // every copy enclosing it.
                    let restores: Vec<Instruction> = frames
                        .iter()
                        .rev()
                        .take_while(|frame| !frame.labels.contains(&label))
                        .flat_map(|frame| frame.restores.iter().cloned())
                        .collect();
                    self.flatten_branch(scope, condition, label, &restores, out);
                }
                other => out.push(self.resolved(&other)),
            }
        }

        if framed {
            frames.pop();
        }
    }

    /// Emit a branch, reloading the spilled registers of every copy it leaves
    /// on the way out. A conditional exit only reloads when it is taken.
    fn flatten_branch(
        &mut self,
        scope: ScopeId,
        condition: Condition,
        label: LabelId,
        restores: &[Instruction],
        out: &mut Vec<Instruction>,
    ) {
        if restores.is_empty() || condition == Condition::Never {
            out.push(Instruction::Branch { condition, label });
            return;
        }
        debug!("Reloading {} spilled registers before leaving for {}", restores.len(), self.label_name(label));

        let stay = if condition == Condition::Always {
            None
        } else {
            let stay = self.label_with_suffix(scope, "_stay");
            self.labels[stay.0].defined = true;
            out.push(Instruction::Branch { condition: condition.negated(), label: stay });
            Some(stay)
        };
        out.extend(restores.iter().map(|restore| self.resolved(restore)));
        out.push(Instruction::Branch { condition: Condition::Always, label });
        if let Some(stay) = stay {
            out.push(Instruction::Label(stay));
        }
    }

    fn resolved(&self, instruction: &Instruction) -> Instruction {
        instruction.map(
            |register| self.resolve(register),
            |address| self.resolve_address(address),
            |label| label,
            |scope| scope,
        )
    }

    /// Every label placed in `scope` or a block nested in it.
    fn defined_labels(&self, scope: ScopeId) -> HashSet<LabelId> {
        self.scope_tree(scope)
            .into_iter()
            .flat_map(|nested| {
                self.scopes[nested.0].instructions.iter().filter_map(|instruction| match instruction {
                    Instruction::Label(label) => Some(*label),
                    _ => None,
                })
            })
            .collect()
    }

    fn resolve_address(&self, address: Address) -> Address {
        match address {
            Address::Temporary(temp) => self.temps[temp.0].map_or(address, Address::Fixed),
            fixed => fixed,
        }
    }
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// The final, de-duplicated name of a label.
    pub fn label_name(&self, label: LabelId) -> String {
        self.label_names
            .get(&label)
            .cloned()
            .unwrap_or_else(|| self.builder.label_name(label))
    }

    fn register(&self, register: Register) -> Result<Reg> {
        match register {
            Register::Physical(index) => Reg::from_index(index).ok_or_else(|| AccError::unresolved(register.to_string())),
            other => Err(AccError::unresolved(other.to_string())),
        }
    }

    fn operand(&self, operand: RegOrConst) -> Result<Operand2> {
        match operand {
            RegOrConst::Register(register) => Ok(Operand2::Reg(self.register(register)?)),
            RegOrConst::Constant(value) => Ok(Operand2::Imm(value)),
        }
    }

    fn address(&self, address: Address) -> Result<u16> {
        match address {
            Address::Fixed(address) => Ok(address),
            temporary => Err(AccError::unresolved(temporary.to_string())),
        }
    }

    /// Lower to the target instruction set.
    pub fn to_asm(&self) -> Result<Vec<AsmInst>> {
        self.instructions
            .iter()
            .map(|instruction| {
                Ok(match *instruction {
                    Instruction::Move { into, from, negate: false } => AsmInst::Mov(self.register(into)?, self.operand(from)?),
                    Instruction::Move { into, from, negate: true } => AsmInst::Mvn(self.register(into)?, self.operand(from)?),
                    Instruction::Load { into, from } => AsmInst::Ldr(self.register(into)?, self.address(from)?),
                    Instruction::Store { from, into } => AsmInst::Str(self.register(from)?, self.address(into)?),
                    Instruction::Add { into, first, second } => {
                        AsmInst::Add(self.register(into)?, self.register(first)?, self.operand(second)?)
                    }
                    Instruction::Subtract { into, first, second } => {
                        AsmInst::Sub(self.register(into)?, self.register(first)?, self.operand(second)?)
                    }
                    Instruction::Logical { op, into, first, second } => {
                        AsmInst::logical(op, self.register(into)?, self.register(first)?, self.operand(second)?)
                    }
                    Instruction::Compare { first, second } => AsmInst::Cmp(self.register(first)?, self.operand(second)?),
                    Instruction::Branch { condition, label } => AsmInst::B(condition, self.label_name(label)),
                    Instruction::Label(label) => AsmInst::Label(self.label_name(label)),
                    Instruction::Halt => AsmInst::Halt,
                    Instruction::Block(scope) => return Err(AccError::unresolved(format!("block {}", scope.0))),
                })
            })
            .collect()
    }

    /// The listing text, one instruction per line.
    pub fn render(&self) -> Result<String> {
        Ok(emit_instructions(&self.to_asm()?))
    }

    pub fn listing(&self) -> Result<Listing> {
        let asm = self.to_asm()?;
        let labels = asm
            .iter()
            .filter_map(|instruction| match instruction {
                AsmInst::Label(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let temporaries: BTreeSet<u16> = self
            .instructions
            .iter()
            .flat_map(Instruction::addresses)
            .filter_map(|address| match address {
                Address::Fixed(cell) if self.builder.temps.contains(&Some(cell)) => Some(cell),
                _ => None,
            })
            .collect();
        Ok(Listing {
            lines: emit_instructions(&asm).lines().map(str::to_string).collect(),
            labels,
            temporaries: temporaries.into_iter().collect(),
        })
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
