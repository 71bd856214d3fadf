use super::*;
use crate::ir::{R0, R1};
use acc_codegen::Condition;
use acc_common::LoweringOptions;
use pretty_assertions::assert_eq;

fn finalize(options: LoweringOptions, f: impl FnOnce(&mut Builder) -> Result<()>) -> Result<Program> {
    crate::build(options, |b| {
        b.claim(&[R0]);
        f(b)
    })
}

fn render(f: impl FnOnce(&mut Builder) -> Result<()>) -> String {
    finalize(LoweringOptions::default(), f).unwrap().render().unwrap()
}

fn spill_r0(b: &mut Builder) -> Result<()> {
    b.memory(Some(R0.into()))?;
    Ok(())
}

fn hand_built(builder: Builder, instructions: Vec<Instruction>) -> Program {
    Program { builder, instructions, label_names: HashMap::new() }
}

#[test]
fn test_sibling_blocks_share_addresses() {
    let listing = render(|b| {
        b.block(spill_r0)?;
        b.block(spill_r0)?;
        Ok(())
    });
    assert_eq!(listing, "STR R0, 199\nSTR R0, 199");
}

#[test]
fn test_nested_blocks_get_distinct_addresses() {
    let program = finalize(LoweringOptions::default(), |b| {
        b.block(|b| {
            spill_r0(b)?;
            b.block(spill_r0)?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(program.render().unwrap(), "STR R0, 198\nSTR R0, 199");
    assert_eq!(program.listing().unwrap().temporaries, vec![198, 199]);
}

#[test]
fn test_temporaries_avoid_fixed_addresses() {
    let listing = render(|b| {
        b.assign(Address::Fixed(199), R0)?;
        b.block(spill_r0)?;
        Ok(())
    });
    assert_eq!(listing, "STR R0, 199\nSTR R0, 198");
}

#[test]
fn test_memory_exhausted() {
    let options = LoweringOptions { memory_cells: 2, ..LoweringOptions::default() };
    let result = finalize(options, |b| {
        spill_r0(b)?;
        spill_r0(b)?;
        spill_r0(b)
    });
    assert_eq!(result.err(), Some(AccError::MemoryExhausted { requested: 3, capacity: 2 }));
}

#[test]
fn test_address_out_of_range() {
    let result = finalize(LoweringOptions::default(), |b| b.assign(Address::Fixed(250), R0));
    assert_eq!(result.err(), Some(AccError::AddressOutOfRange { address: 250, capacity: 200 }));
}

#[test]
fn test_virtual_registers_are_resolved() {
    let program = finalize(LoweringOptions::default(), |b| {
        let sub = b.build_subroutine("copy", &[], |b, sub, _| b.assign(sub.result(), R0))?;
        b.store_into(sub, R1)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(
        program.instructions().to_vec(),
        vec![Instruction::Move { into: R1, from: RegOrConst::Register(R0), negate: false }]
    );
}

#[test]
fn test_dead_code_removed() {
    let b = Builder::new(LoweringOptions::default());
    let label = LabelId(0);
    let mut program = hand_built(
        b,
        vec![
            Instruction::Move { into: R0, from: RegOrConst::Register(R0), negate: false },
            Instruction::Move { into: Register::Discard, from: RegOrConst::Constant(1), negate: false },
            Instruction::Add { into: R1, first: Register::Discard, second: RegOrConst::Constant(1) },
            Instruction::Branch { condition: Condition::Never, label },
            Instruction::Halt,
        ],
    );
    assert_eq!(program.optimize(), 4);
    assert_eq!(program.instructions().to_vec(), vec![Instruction::Halt]);
}

#[test]
fn test_branch_to_next_removed() {
    let mut b = Builder::new(LoweringOptions::default());
    let first = b.label("first");
    let second = b.label("second");
    let mut program = hand_built(
        b,
        vec![
            Instruction::Branch { condition: Condition::Always, label: second },
            Instruction::Label(first),
            Instruction::Label(second),
            Instruction::Branch { condition: Condition::Eq, label: first },
            Instruction::Halt,
        ],
    );
    program.optimize();
    assert_eq!(
        program.instructions().to_vec(),
        vec![
            Instruction::Label(first),
            Instruction::Branch { condition: Condition::Eq, label: first },
            Instruction::Halt,
        ]
    );
}

#[test]
fn test_conditional_branch_to_next_kept() {
    let mut b = Builder::new(LoweringOptions::default());
    let next = b.label("next");
    let instructions = vec![
        Instruction::Compare { first: R0, second: RegOrConst::Constant(0) },
        Instruction::Branch { condition: Condition::Eq, label: next },
        Instruction::Label(next),
    ];
    let mut program = hand_built(b, instructions.clone());
    assert_eq!(program.optimize(), 0);
    assert_eq!(program.instructions().to_vec(), instructions);
}

#[test]
fn test_adjacent_labels_separated() {
    let mut b = Builder::new(LoweringOptions::default());
    let outer = b.label("outer");
    let inner = b.label("inner");
    let mut program = hand_built(
        b,
        vec![
            Instruction::Label(outer),
            Instruction::Label(inner),
            Instruction::Compare { first: R0, second: RegOrConst::Constant(0) },
            Instruction::Branch { condition: Condition::Eq, label: outer },
            Instruction::Branch { condition: Condition::Always, label: inner },
        ],
    );
    program.optimize();
    assert_eq!(program.render().unwrap(), "outer:\nMOV R0, R0\ninner:\nCMP R0, #0\nBEQ outer\nB inner");
}

#[test]
fn test_duplicate_labels_renamed() {
    let mut b = Builder::new(LoweringOptions::default());
    let first = b.label("loop");
    let second = b.label("loop");
    let taken = b.label("loop_1");
    let mut program = hand_built(
        b,
        vec![
            Instruction::Label(first),
            Instruction::Halt,
            Instruction::Label(second),
            Instruction::Halt,
            Instruction::Label(taken),
            Instruction::Branch { condition: Condition::Eq, label: first },
            Instruction::Branch { condition: Condition::Eq, label: second },
            Instruction::Branch { condition: Condition::Eq, label: taken },
        ],
    );
    program.optimize();
    assert_eq!(program.label_name(first), "loop");
    assert_eq!(program.label_name(second), "loop_2");
    assert_eq!(program.label_name(taken), "loop_1");
    assert_eq!(program.listing().unwrap().labels, vec!["loop", "loop_2", "loop_1"]);
}

#[test]
fn test_optimize_is_idempotent() {
    let mut b = Builder::new(LoweringOptions::default());
    let head = b.label("head");
    let tail = b.label("tail");
    let mut program = hand_built(
        b,
        vec![
            Instruction::Label(head),
            Instruction::Label(tail),
            Instruction::Move { into: R1, from: RegOrConst::Register(R1), negate: false },
            Instruction::Branch { condition: Condition::Lt, label: head },
            Instruction::Branch { condition: Condition::Always, label: tail },
            Instruction::Halt,
        ],
    );
    program.optimize();
    let once = program.render().unwrap();
    program.optimize();
    assert_eq!(program.render().unwrap(), once);
}
