//! Target Assembly Instruction Definitions
//!
//! This module defines the register file, the instruction set and the branch
//! condition algebra of the target machine: thirteen general purpose
//! registers, a flat memory addressed by bare integers and a single flag
//! register written by `CMP`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// General purpose registers R0..R12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reg {
    R0, R1, R2, R3, R4, R5, R6,
    R7, R8, R9, R10, R11, R12,
}

impl Reg {
    pub const ALL: [Reg; 13] = [
        Reg::R0, Reg::R1, Reg::R2, Reg::R3, Reg::R4, Reg::R5, Reg::R6,
        Reg::R7, Reg::R8, Reg::R9, Reg::R10, Reg::R11, Reg::R12,
    ];

    pub fn from_index(index: u8) -> Option<Reg> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

/// Flexible second operand: a register or an immediate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand2 {
    Reg(Reg),
    Imm(i32),
}

impl fmt::Display for Operand2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand2::Reg(reg) => write!(f, "{}", reg),
            Operand2::Imm(value) => write!(f, "#{}", value),
        }
    }
}

/// Branch condition
///
/// Each condition is the set of compare outcomes (less, equal, greater) it
/// accepts, so negation, operand swapping and combination are set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Never,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

const LESS: u8 = 0b001;
const EQUAL: u8 = 0b010;
const GREATER: u8 = 0b100;

impl Condition {
    fn mask(self) -> u8 {
        match self {
            Condition::Always => LESS | EQUAL | GREATER,
            Condition::Never => 0,
            Condition::Eq => EQUAL,
            Condition::Ne => LESS | GREATER,
            Condition::Gt => GREATER,
            Condition::Lt => LESS,
            Condition::Ge => GREATER | EQUAL,
            Condition::Le => LESS | EQUAL,
        }
    }

    fn from_mask(mask: u8) -> Condition {
        match mask & 0b111 {
            0 => Condition::Never,
            EQUAL => Condition::Eq,
            GREATER => Condition::Gt,
            LESS => Condition::Lt,
            m if m == LESS | GREATER => Condition::Ne,
            m if m == GREATER | EQUAL => Condition::Ge,
            m if m == LESS | EQUAL => Condition::Le,
            _ => Condition::Always,
        }
    }

    /// Mnemonic suffix appended to `B`
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Always | Condition::Never => "",
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Gt => "GT",
            Condition::Lt => "LT",
            Condition::Ge => "GE",
            Condition::Le => "LE",
        }
    }

    /// Primitive branches that together implement this condition.
    /// `>=` and `<=` become the strict comparison followed by `==`.
    pub fn decomposed(self) -> Vec<Condition> {
        match self {
            Condition::Ge => vec![Condition::Gt, Condition::Eq],
            Condition::Le => vec![Condition::Lt, Condition::Eq],
            Condition::Never => Vec::new(),
            other => vec![other],
        }
    }

    pub fn negated(self) -> Condition {
        Self::from_mask(!self.mask())
    }

    pub fn negate_if(self, negate: bool) -> Condition {
        if negate { self.negated() } else { self }
    }

    /// The condition that holds after swapping the compared operands.
    pub fn flipped(self) -> Condition {
        let mask = self.mask();
        let mut flipped = mask & EQUAL;
        if mask & LESS != 0 {
            flipped |= GREATER;
        }
        if mask & GREATER != 0 {
            flipped |= LESS;
        }
        Self::from_mask(flipped)
    }

    pub fn or(self, other: Condition) -> Condition {
        Self::from_mask(self.mask() | other.mask())
    }

    pub fn and(self, other: Condition) -> Condition {
        Self::from_mask(self.mask() & other.mask())
    }

    /// Whether a branch on this condition is taken for the given compare outcome.
    pub fn holds(self, ordering: Ordering) -> bool {
        let outcome = match ordering {
            Ordering::Less => LESS,
            Ordering::Equal => EQUAL,
            Ordering::Greater => GREATER,
        };
        self.mask() & outcome != 0
    }
}

/// Bitwise and shift operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
}

impl LogicalOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "ORR",
            LogicalOp::Xor => "EOR",
            LogicalOp::ShiftLeft => "LSL",
            LogicalOp::ShiftRight => "LSR",
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, LogicalOp::And | LogicalOp::Or | LogicalOp::Xor)
    }

    /// Evaluate on two concrete values, as the machine would.
    pub fn apply(self, first: i32, second: i32) -> i32 {
        match self {
            LogicalOp::And => first & second,
            LogicalOp::Or => first | second,
            LogicalOp::Xor => first ^ second,
            LogicalOp::ShiftLeft => first.wrapping_shl(second as u32),
            LogicalOp::ShiftRight => (first as u32).wrapping_shr(second as u32) as i32,
        }
    }
}

/// Target assembly instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AsmInst {
    // Memory
    Ldr(Reg, u16),                    // rd = memory[addr]
    Str(Reg, u16),                    // memory[addr] = rd

    // Arithmetic
    Add(Reg, Reg, Operand2),          // rd = rn + op2
    Sub(Reg, Reg, Operand2),          // rd = rn - op2

    // Moves
    Mov(Reg, Operand2),               // rd = op2
    Mvn(Reg, Operand2),               // rd = !op2

    // Logical
    And(Reg, Reg, Operand2),
    Orr(Reg, Reg, Operand2),
    Eor(Reg, Reg, Operand2),
    Lsl(Reg, Reg, Operand2),
    Lsr(Reg, Reg, Operand2),

    // Control flow
    Cmp(Reg, Operand2),
    B(Condition, String),
    Label(String),
    Halt,
}

impl AsmInst {
    pub fn logical(op: LogicalOp, rd: Reg, rn: Reg, op2: Operand2) -> AsmInst {
        match op {
            LogicalOp::And => AsmInst::And(rd, rn, op2),
            LogicalOp::Or => AsmInst::Orr(rd, rn, op2),
            LogicalOp::Xor => AsmInst::Eor(rd, rn, op2),
            LogicalOp::ShiftLeft => AsmInst::Lsl(rd, rn, op2),
            LogicalOp::ShiftRight => AsmInst::Lsr(rd, rn, op2),
        }
    }
}

impl fmt::Display for AsmInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmInst::Ldr(rd, addr) => write!(f, "LDR {}, {}", rd, addr),
            AsmInst::Str(rd, addr) => write!(f, "STR {}, {}", rd, addr),
            AsmInst::Add(rd, rn, op2) => write!(f, "ADD {}, {}, {}", rd, rn, op2),
            AsmInst::Sub(rd, rn, op2) => write!(f, "SUB {}, {}, {}", rd, rn, op2),
            AsmInst::Mov(rd, op2) => write!(f, "MOV {}, {}", rd, op2),
            AsmInst::Mvn(rd, op2) => write!(f, "MVN {}, {}", rd, op2),
            AsmInst::And(rd, rn, op2) => write!(f, "AND {}, {}, {}", rd, rn, op2),
            AsmInst::Orr(rd, rn, op2) => write!(f, "ORR {}, {}, {}", rd, rn, op2),
            AsmInst::Eor(rd, rn, op2) => write!(f, "EOR {}, {}, {}", rd, rn, op2),
            AsmInst::Lsl(rd, rn, op2) => write!(f, "LSL {}, {}, {}", rd, rn, op2),
            AsmInst::Lsr(rd, rn, op2) => write!(f, "LSR {}, {}, {}", rd, rn, op2),
            AsmInst::Cmp(rn, op2) => write!(f, "CMP {}, {}", rn, op2),
            AsmInst::B(condition, label) => {
                // One line per primitive condition; `Never` renders nothing.
                let lines: Vec<String> = condition
                    .decomposed()
                    .into_iter()
                    .map(|c| format!("B{} {}", c.suffix(), label))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            AsmInst::Label(label) => write!(f, "{}:", label),
            AsmInst::Halt => write!(f, "HALT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_display() {
        assert_eq!(format!("{}", Reg::R0), "R0");
        assert_eq!(format!("{}", Reg::R12), "R12");
        assert_eq!(Reg::from_index(7), Some(Reg::R7));
        assert_eq!(Reg::from_index(13), None);
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(format!("{}", AsmInst::Mov(Reg::R0, Operand2::Imm(5))), "MOV R0, #5");
        assert_eq!(
            format!("{}", AsmInst::Add(Reg::R2, Reg::R0, Operand2::Reg(Reg::R1))),
            "ADD R2, R0, R1"
        );
        assert_eq!(format!("{}", AsmInst::Ldr(Reg::R3, 100)), "LDR R3, 100");
        assert_eq!(
            format!("{}", AsmInst::logical(LogicalOp::Xor, Reg::R1, Reg::R1, Operand2::Imm(3))),
            "EOR R1, R1, #3"
        );
        assert_eq!(format!("{}", AsmInst::Label("loop".to_string())), "loop:");
        assert_eq!(format!("{}", AsmInst::B(Condition::Always, "loop".to_string())), "B loop");
    }

    #[test]
    fn test_compound_branch_renders_two_lines() {
        let branch = AsmInst::B(Condition::Le, "done".to_string());
        assert_eq!(format!("{}", branch), "BLT done\nBEQ done");

        let never = AsmInst::B(Condition::Never, "done".to_string());
        assert_eq!(format!("{}", never), "");
    }

    #[test]
    fn test_condition_negation() {
        assert_eq!(Condition::Gt.negated(), Condition::Le);
        assert_eq!(Condition::Lt.negated(), Condition::Ge);
        assert_eq!(Condition::Eq.negated(), Condition::Ne);
        assert_eq!(Condition::Always.negated(), Condition::Never);
        assert_eq!(Condition::Ge.negate_if(false), Condition::Ge);

        let all = [
            Condition::Always, Condition::Never, Condition::Eq, Condition::Ne,
            Condition::Gt, Condition::Lt, Condition::Ge, Condition::Le,
        ];
        for condition in all {
            assert_eq!(condition.negated().negated(), condition);
            assert_eq!(condition.flipped().flipped(), condition);
        }
    }

    #[test]
    fn test_condition_flip() {
        assert_eq!(Condition::Gt.flipped(), Condition::Lt);
        assert_eq!(Condition::Ge.flipped(), Condition::Le);
        assert_eq!(Condition::Eq.flipped(), Condition::Eq);
        assert_eq!(Condition::Ne.flipped(), Condition::Ne);
    }

    #[test]
    fn test_condition_combination() {
        assert_eq!(Condition::Gt.or(Condition::Eq), Condition::Ge);
        assert_eq!(Condition::Lt.or(Condition::Gt), Condition::Ne);
        assert_eq!(Condition::Ge.and(Condition::Le), Condition::Eq);
        assert_eq!(Condition::Gt.and(Condition::Lt), Condition::Never);
        assert_eq!(Condition::Lt.or(Condition::Lt.negated()), Condition::Always);
        assert_eq!(Condition::Ne.and(Condition::Ne.negated()), Condition::Never);
    }

    #[test]
    fn test_condition_holds() {
        assert!(Condition::Ge.holds(Ordering::Equal));
        assert!(Condition::Ge.holds(Ordering::Greater));
        assert!(!Condition::Ge.holds(Ordering::Less));
        assert!(!Condition::Never.holds(Ordering::Equal));
    }

    #[test]
    fn test_logical_fold() {
        assert_eq!(LogicalOp::And.apply(0b1100, 0b1010), 0b1000);
        assert_eq!(LogicalOp::Or.apply(0b1100, 0b1010), 0b1110);
        assert_eq!(LogicalOp::Xor.apply(0b1100, 0b1010), 0b0110);
        assert_eq!(LogicalOp::ShiftLeft.apply(3, 2), 12);
        assert_eq!(LogicalOp::ShiftRight.apply(-1, 28), 0xF);
        assert!(LogicalOp::Xor.is_commutative());
        assert!(!LogicalOp::ShiftLeft.is_commutative());
    }
}
