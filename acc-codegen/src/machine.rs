//! Reference machine
//!
//! A small interpreter for the canonical instruction set. It executes a
//! resolved listing until `HALT` or the end of the program and is what the
//! test suites use to check that generated code computes the right values.

use crate::asm::{AsmInst, Operand2, Reg};
use log::trace;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("Branch to unknown label '{0}'")]
    UnknownLabel(String),

    #[error("Memory address {address} is outside the machine ({size} cells)")]
    AddressOutOfRange { address: u16, size: usize },

    #[error("Program did not halt within {0} steps")]
    StepLimit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted,
}

pub struct Machine {
    pub registers: [i32; 13],
    pub memory: Vec<i32>,
    pub state: MachineState,
    flags: Ordering,
    steps: usize,
}

impl Machine {
    pub fn new(memory_cells: u16) -> Self {
        Machine {
            registers: [0; 13],
            memory: vec![0; memory_cells as usize],
            state: MachineState::Running,
            flags: Ordering::Equal,
            steps: 0,
        }
    }

    pub fn register(&self, reg: Reg) -> i32 {
        self.registers[reg.index()]
    }

    pub fn set_register(&mut self, reg: Reg, value: i32) {
        self.registers[reg.index()] = value;
    }

    /// Number of instructions executed by the last `run`.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn value(&self, op2: Operand2) -> i32 {
        match op2 {
            Operand2::Reg(reg) => self.register(reg),
            Operand2::Imm(value) => value,
        }
    }

    fn cell(&self, address: u16) -> Result<usize, MachineError> {
        let index = address as usize;
        if index < self.memory.len() {
            Ok(index)
        } else {
            Err(MachineError::AddressOutOfRange { address, size: self.memory.len() })
        }
    }

    pub fn run(&mut self, program: &[AsmInst], step_limit: usize) -> Result<(), MachineError> {
        let labels: HashMap<&str, usize> = program
            .iter()
            .enumerate()
            .filter_map(|(index, inst)| match inst {
                AsmInst::Label(name) => Some((name.as_str(), index)),
                _ => None,
            })
            .collect();

        let mut pc = 0;
        self.state = MachineState::Running;
        self.steps = 0;

        while pc < program.len() && self.state == MachineState::Running {
            if self.steps >= step_limit {
                return Err(MachineError::StepLimit(step_limit));
            }
            self.steps += 1;

            let inst = &program[pc];
            trace!("pc={pc} {inst}");
            pc += 1;

            match inst {
                AsmInst::Ldr(rd, addr) => {
                    let cell = self.cell(*addr)?;
                    self.set_register(*rd, self.memory[cell]);
                }
                AsmInst::Str(rd, addr) => {
                    let cell = self.cell(*addr)?;
                    self.memory[cell] = self.register(*rd);
                }
                AsmInst::Add(rd, rn, op2) => {
                    let result = self.register(*rn).wrapping_add(self.value(*op2));
                    self.set_register(*rd, result);
                }
                AsmInst::Sub(rd, rn, op2) => {
                    let result = self.register(*rn).wrapping_sub(self.value(*op2));
                    self.set_register(*rd, result);
                }
                AsmInst::Mov(rd, op2) => self.set_register(*rd, self.value(*op2)),
                AsmInst::Mvn(rd, op2) => self.set_register(*rd, !self.value(*op2)),
                AsmInst::And(rd, rn, op2) => self.set_register(*rd, self.register(*rn) & self.value(*op2)),
                AsmInst::Orr(rd, rn, op2) => self.set_register(*rd, self.register(*rn) | self.value(*op2)),
                AsmInst::Eor(rd, rn, op2) => self.set_register(*rd, self.register(*rn) ^ self.value(*op2)),
                AsmInst::Lsl(rd, rn, op2) => {
                    let result = self.register(*rn).wrapping_shl(self.value(*op2) as u32);
                    self.set_register(*rd, result);
                }
                AsmInst::Lsr(rd, rn, op2) => {
                    let result = (self.register(*rn) as u32).wrapping_shr(self.value(*op2) as u32);
                    self.set_register(*rd, result as i32);
                }
                AsmInst::Cmp(rn, op2) => {
                    self.flags = self.register(*rn).cmp(&self.value(*op2));
                }
                AsmInst::B(condition, label) => {
                    if condition.holds(self.flags) {
                        pc = *labels
                            .get(label.as_str())
                            .ok_or_else(|| MachineError::UnknownLabel(label.clone()))?;
                    }
                }
                AsmInst::Label(_) => {}
                AsmInst::Halt => self.state = MachineState::Halted,
            }
        }

        self.state = MachineState::Halted;
        Ok(())
    }
}
