//! Peephole passes over the flattened listing
//!
//! Removal passes run to a fixed point, since each can expose work for the
//! others (a dropped branch leaves its label unused, a dropped label puts a
//! branch next to its target). Label separation and renaming run once at the
//! end. Running `optimize` again on its own output changes nothing.

use super::Program;
use crate::ir::{Instruction, LabelId, RegOrConst, Register, R0};
use acc_codegen::Condition;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

impl Program {
    /// Run every pass. Returns the number of instructions removed.
    pub fn optimize(&mut self) -> usize {
        let before = self.instructions.len();
        loop {
            let removed = self.remove_dead() + self.remove_branches_to_next() + self.remove_unused_labels();
            if removed == 0 {
                break;
            }
        }
        self.separate_adjacent_labels();
        self.deduplicate_labels();
        before.saturating_sub(self.instructions.len())
    }

    fn log_removed(&self, pass: &str, instruction: &Instruction) {
        if self.builder.options().trace_optimizer {
            debug!("{pass}: removed {instruction:?}");
        } else {
            trace!("{pass}: removed {instruction:?}");
        }
    }

    fn retain(&mut self, pass: &str, keep: impl Fn(usize, &[Instruction]) -> bool) -> usize {
        let instructions = std::mem::take(&mut self.instructions);
        let mut kept = Vec::with_capacity(instructions.len());
        let mut removed = 0;
        for (index, instruction) in instructions.iter().enumerate() {
            if keep(index, &instructions) {
                kept.push(instruction.clone());
            } else {
                self.log_removed(pass, instruction);
                removed += 1;
            }
        }
        self.instructions = kept;
        removed
    }

    /// Drop instructions touching the discard register, plain self-moves and
    /// branches that never fire.
    fn remove_dead(&mut self) -> usize {
        self.retain("dead", |index, instructions| !is_dead(&instructions[index]))
    }

    /// Drop unconditional branches to a label that directly follows, possibly
    /// among other labels.
    fn remove_branches_to_next(&mut self) -> usize {
        self.retain("branch-to-next", |index, instructions| {
            let Instruction::Branch { condition: Condition::Always, label } = instructions[index] else {
                return true;
            };
            !instructions[index + 1..]
                .iter()
                .map_while(|next| match next {
                    Instruction::Label(following) => Some(*following),
                    _ => None,
                })
                .any(|following| following == label)
        })
    }

    fn remove_unused_labels(&mut self) -> usize {
        let referenced: HashSet<LabelId> = self
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Branch { label, .. } => Some(*label),
                _ => None,
            })
            .collect();
        self.retain("unused-label", |index, instructions| match instructions[index] {
            Instruction::Label(label) => referenced.contains(&label),
            _ => true,
        })
    }

    /// Two labels cannot share a position; put a no-op between them.
    fn separate_adjacent_labels(&mut self) {
        let instructions = std::mem::take(&mut self.instructions);
        let mut separated = Vec::with_capacity(instructions.len());
        let mut previous_was_label = false;
        for instruction in instructions {
            let is_label = matches!(instruction, Instruction::Label(_));
            if is_label && previous_was_label {
                separated.push(Instruction::Move { into: R0, from: RegOrConst::Register(R0), negate: false });
            }
            previous_was_label = is_label;
            separated.push(instruction);
        }
        self.instructions = separated;
    }

    /// Labels that render the same (one per instantiation of a subroutine)
    /// get an occurrence suffix; the first keeps its name.
    fn deduplicate_labels(&mut self) {
        let defined: Vec<LabelId> = self
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Label(label) => Some(*label),
                _ => None,
            })
            .collect();
        let bases: Vec<String> = defined.iter().map(|label| self.builder.label_name(*label)).collect();
        let all_bases: HashSet<&str> = bases.iter().map(String::as_str).collect();

        let mut names = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for (label, base) in defined.iter().zip(&bases) {
            let name = if taken.contains(base) {
                let count = occurrences.entry(base.as_str()).or_insert(0);
                loop {
                    *count += 1;
                    let candidate = format!("{base}_{count}");
                    if !taken.contains(&candidate) && !all_bases.contains(candidate.as_str()) {
                        break candidate;
                    }
                }
            } else {
                base.clone()
            };
            if name != *base {
                debug!("Label '{base}' renamed to '{name}'");
            }
            taken.insert(name.clone());
            names.insert(*label, name);
        }
        self.label_names = names;
    }
}

fn is_dead(instruction: &Instruction) -> bool {
    match instruction {
        Instruction::Move { into, from: RegOrConst::Register(from), negate: false } if into == from => true,
        Instruction::Branch { condition: Condition::Never, .. } => true,
        other => other.registers().contains(&Register::Discard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_instructions() {
        assert!(is_dead(&Instruction::Move { into: R0, from: RegOrConst::Register(R0), negate: false }));
        assert!(!is_dead(&Instruction::Move { into: R0, from: RegOrConst::Register(R0), negate: true }));
        assert!(is_dead(&Instruction::Move { into: Register::Discard, from: RegOrConst::Constant(1), negate: false }));
        assert!(is_dead(&Instruction::Branch { condition: Condition::Never, label: LabelId(0) }));
        assert!(!is_dead(&Instruction::Branch { condition: Condition::Eq, label: LabelId(0) }));
        assert!(!is_dead(&Instruction::Halt));
    }
}
