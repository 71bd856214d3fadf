use super::*;
use crate::ir::{R0, R1, R10, R2, R3, R4, R5, R6, R7, R8, R9};
use crate::tests::execute;
use acc_common::LoweringOptions;
use pretty_assertions::assert_eq;

fn builder() -> Builder {
    Builder::new(LoweringOptions::default())
}

#[test]
fn test_declared_parameters() {
    let mut b = builder();
    let sub = b
        .build_subroutine("declared", &[Value::Register(R3)], |b, sub, locals| {
            assert_eq!(locals.to_vec(), vec![Value::Register(R3)]);
            b.assign(sub.result(), locals[0])
        })
        .unwrap();

    assert!(b.parameters(sub).contains(R3));
    assert_eq!(b.available_registers(sub.scope()).len(), 12);
    assert_eq!(b.scope_name(sub.scope()), "declared");
    assert_eq!(b.label_name(b.end_label(sub)), "declared_end");
}

#[test]
fn test_each_call_gets_its_own_copy() {
    let mut b = builder();
    b.assign(R0, 4).unwrap();
    let sub = b
        .build_subroutine("plusOne", &[], |b, sub, _| {
            let sum = b.add(R0, 1)?;
            b.assign(sub.result(), sum)
        })
        .unwrap();
    let first = b.store_into(sub, R1).unwrap();
    let second = b.store_into(sub, R2).unwrap();

    assert_ne!(first, second);
    assert_ne!(first, sub.scope());
    let root = b.root_scope();
    assert_eq!(
        b.instructions(root)[1..].to_vec(),
        vec![Instruction::Block(first), Instruction::Block(second)]
    );

    let program = b.finalize().unwrap();
    assert_eq!(program.render().unwrap(), "MOV R0, #4\nADD R1, R0, #1\nADD R2, R0, #1");
}

#[test]
fn test_call_discards_result() {
    let mut b = builder();
    let sub = b
        .build_subroutine("sideEffect", &[], |b, sub, _| {
            b.assign(R1, 2)?;
            b.assign(sub.result(), 5)
        })
        .unwrap();
    b.call(sub).unwrap();

    // Registers a body touches on its own are claimed at the call site.
    assert!(b.used_registers(b.root_scope()).contains(R1));
    let program = b.finalize().unwrap();
    assert_eq!(program.render().unwrap(), "MOV R1, #2");
}

#[test]
fn test_return_value_jumps_to_end() {
    let program = crate::build(LoweringOptions::default(), |b| {
        let sub = b.build_subroutine("early", &[], |b, sub, _| {
            b.return_value(sub, Some(Value::Constant(1)))?;
            b.assign(sub.result(), 2)
        })?;
        b.store_into(sub, R0)?;
        b.halt();
        Ok(())
    })
    .unwrap();

    assert_eq!(
        program.render().unwrap(),
        "MOV R0, #1\nB early_end\nMOV R0, #2\nearly_end:\nHALT"
    );
    assert_eq!(execute(&program).registers[0], 1);
}

fn scratch_subroutine(b: &mut Builder, name: &str, count: i32) -> Result<Subroutine> {
    b.build_subroutine(name, &[], |b, sub, _| {
        let mut scratch = Vec::new();
        for value in 1..=count {
            scratch.push(b.register(Some(Value::Constant(value)))?);
        }
        b.assign(sub.result(), scratch[0])
    })
}

#[test]
fn test_overflowing_internals_are_spilled() {
    let mut b = builder();
    b.claim(&[R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10]);
    let sub = scratch_subroutine(&mut b, "fourScratch", 4).unwrap();
    assert_eq!(b.internal_registers(sub).len(), 4);
    b.store_into(sub, R0).unwrap();
    b.halt();

    let program = b.finalize().unwrap();
    assert_eq!(
        program.render().unwrap(),
        [
            "STR R1, 199",
            "STR R2, 198",
            "MOV R11, #1",
            "MOV R12, #2",
            "MOV R1, #3",
            "MOV R2, #4",
            "MOV R0, R11",
            "LDR R1, 199",
            "LDR R2, 198",
            "HALT",
        ]
        .join("\n")
    );

    let mut machine = acc_codegen::Machine::new(200);
    machine.registers[1] = 10;
    machine.registers[2] = 20;
    machine.run(&program.to_asm().unwrap(), 100).unwrap();
    assert_eq!(machine.registers[0], 1);
    assert_eq!(machine.registers[1], 10);
    assert_eq!(machine.registers[2], 20);
}

#[test]
fn test_branch_out_of_copy_reloads_spilled_registers() {
    let mut b = builder();
    b.claim(&[R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10]);
    let outer = b.label("outer");
    let sub = b
        .build_subroutine("leaves", &[], |b, sub, _| {
            let mut scratch = Vec::new();
            for value in 1..=4 {
                scratch.push(b.register(Some(Value::Constant(value)))?);
            }
            b.compare(scratch[0], 1);
            b.branch(outer, Condition::Eq);
            b.assign(sub.result(), scratch[3])
        })
        .unwrap();
    b.store_into(sub, R0).unwrap();
    b.define_label(outer).unwrap();
    b.halt();

    let program = b.finalize().unwrap();
    assert_eq!(
        program.render().unwrap(),
        [
            "STR R1, 199",
            "STR R2, 198",
            "MOV R11, #1",
            "MOV R12, #2",
            "MOV R1, #3",
            "MOV R2, #4",
            "CMP R11, #1",
            "BNE leaves_stay",
            "LDR R1, 199",
            "LDR R2, 198",
            "B outer",
            "leaves_stay:",
            "MOV R0, R2",
            "LDR R1, 199",
            "LDR R2, 198",
            "outer:",
            "HALT",
        ]
        .join("\n")
    );

    let mut machine = acc_codegen::Machine::new(200);
    machine.registers[1] = 10;
    machine.registers[2] = 20;
    machine.run(&program.to_asm().unwrap(), 100).unwrap();
    assert_eq!(machine.registers[0], 0);
    assert_eq!(machine.registers[1], 10);
    assert_eq!(machine.registers[2], 20);
}

#[test]
fn test_no_spill_host_left() {
    let options = LoweringOptions { register_count: 3, ..LoweringOptions::default() };
    let mut b = Builder::new(options);
    b.claim(&[R0, R1, R2]);
    let sub = scratch_subroutine(&mut b, "threeScratch", 3).unwrap();

    let err = b.store_into(sub, R0).unwrap_err();
    assert_eq!(err, AccError::registers_exhausted("threeScratch"));
}

#[test]
fn test_internals_prefer_free_registers() {
    let mut b = builder();
    b.claim(&[R0]);
    let sub = scratch_subroutine(&mut b, "twoScratch", 2).unwrap();
    b.store_into(sub, R0).unwrap();

    let program = b.finalize().unwrap();
    assert_eq!(program.render().unwrap(), "MOV R1, #1\nMOV R2, #2\nMOV R0, R1");
}
