//! End-to-end tests: sample listings and their behaviour on the reference
//! machine.

use crate::ir::{Address, Register, R0, R1, R10, R11, R2, R3, R4, R5, R6, R7, R8, R9};
use crate::samples::{self, SAMPLES};
use crate::{build, Builder, Progression, Program, Result};
use acc_codegen::{Machine, MachineError};
use acc_common::{AccError, LoweringOptions};
use pretty_assertions::assert_eq;

const STEP_LIMIT: usize = 10_000;

/// Run a finalized program from a zeroed machine.
pub(crate) fn execute(program: &Program) -> Machine {
    match try_execute(program) {
        Ok(machine) => machine,
        Err(err) => panic!("program failed to run: {err}"),
    }
}

fn try_execute(program: &Program) -> std::result::Result<Machine, MachineError> {
    let asm = program.to_asm().unwrap();
    let mut machine = Machine::new(program.builder().options().memory_cells);
    machine.run(&asm, STEP_LIMIT)?;
    Ok(machine)
}

fn sample(name: &str) -> Program {
    let Some(sample) = samples::find(name) else {
        panic!("no sample named {name}");
    };
    sample.build(LoweringOptions::default()).unwrap()
}

fn lines(listing: &[&str]) -> String {
    listing.join("\n")
}

#[test]
fn test_direct_addition() {
    let program = sample("arithmetic");
    assert_eq!(program.render().unwrap(), lines(&["MOV R0, #5", "MOV R1, #3", "ADD R2, R0, R1", "HALT"]));
    assert_eq!(execute(&program).registers[2], 8);
}

#[test]
fn test_swap_if_else() {
    let program = sample("swap");
    assert_eq!(
        program.render().unwrap(),
        lines(&[
            "MOV R0, #7",
            "MOV R1, #3",
            "CMP R0, R1",
            "BLT ifGreater_false",
            "BEQ ifGreater_false",
            "MOV R2, R0",
            "MOV R0, R1",
            "MOV R1, R2",
            "B ifGreater_end",
            "ifGreater_false:",
            "ADD R0, R0, #1",
            "ifGreater_end:",
            "HALT",
        ])
    );
    let machine = execute(&program);
    assert_eq!(machine.registers[0], 3);
    assert_eq!(machine.registers[1], 7);
}

#[test]
fn test_multiply_twice() {
    let program = sample("multiply");
    let listing = program.listing().unwrap();

    assert_eq!(listing.lines.iter().filter(|line| *line == "multiply_mainLoop:").count(), 1);
    assert!(listing.lines.iter().any(|line| line == "B multiply_mainLoop"));
    assert!(listing.lines.iter().any(|line| line == "B multiply_mainLoop_1"));
    for label in ["multiply_mainLoop_1", "multiply_skipAdd_1", "multiply_end_1"] {
        assert!(listing.labels.iter().any(|name| name == label), "missing {label}");
    }

    let machine = execute(&program);
    assert_eq!(machine.memory[102], 42);
    assert_eq!(machine.memory[103], 42);
}

#[test]
fn test_multiply_other_operands() {
    for (first, second) in [(0, 9), (1, 1), (12, 11), (255, 3)] {
        let program = build(LoweringOptions::default(), |b| {
            b.assign(Address::Fixed(10), first)?;
            b.assign(Address::Fixed(11), second)?;
            let product = samples::multiply_cells(b, Address::Fixed(10), Address::Fixed(11))?;
            b.assign(R5, product)?;
            b.halt();
            Ok(())
        })
        .unwrap();
        assert_eq!(execute(&program).registers[5], first * second, "{first} * {second}");
    }
}

#[test]
fn test_countdown_loop() {
    let program = sample("countdown");
    assert_eq!(
        program.render().unwrap(),
        lines(&[
            "MOV R0, #0",
            "MOV R1, #10",
            "countdown:",
            "CMP R1, #1",
            "BLT countdown_end",
            "ADD R0, R0, R1",
            "SUB R1, R1, #1",
            "B countdown",
            "countdown_end:",
            "HALT",
        ])
    );
    assert_eq!(execute(&program).registers[0], 55);
}

#[test]
fn test_sign_chain() {
    let program = sample("sign");
    assert_eq!(
        program.render().unwrap(),
        lines(&[
            "MOV R0, #-5",
            "CMP R0, #0",
            "BGT ifNegative_false",
            "BEQ ifNegative_false",
            "MOV R1, #-1",
            "B ifNegative_end",
            "ifNegative_false:",
            "CMP R0, #0",
            "BNE ifZero_false",
            "MOV R1, #0",
            "B ifNegative_end",
            "ifZero_false:",
            "MOV R1, #1",
            "ifNegative_end:",
            "HALT",
        ])
    );
    assert_eq!(execute(&program).registers[1], -1);
}

#[test]
fn test_maximum() {
    let machine = execute(&sample("maximum"));
    assert_eq!(machine.registers[3], 9);
}

#[test]
fn test_every_sample_halts() {
    for sample in SAMPLES {
        let program = sample.build(LoweringOptions::default()).unwrap();
        let result = try_execute(&program);
        assert!(result.is_ok(), "{}: {:?}", sample.name, result.err());
    }
}

#[test]
fn test_optimizing_again_changes_nothing() {
    for sample in SAMPLES {
        let mut program = sample.build(LoweringOptions::default()).unwrap();
        let before = program.render().unwrap();
        assert_eq!(program.optimize(), 0, "{}", sample.name);
        assert_eq!(program.render().unwrap(), before, "{}", sample.name);
    }
}

#[test]
fn test_claimed_registers_survive_pressure() {
    let claimed = [R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10];
    let program = build(LoweringOptions::default(), |b| {
        for (value, register) in (1..).zip(claimed) {
            b.assign(register, value)?;
        }
        b.assign(Address::Fixed(100), 20)?;
        b.assign(Address::Fixed(101), 7)?;
        let sum = b.add(Address::Fixed(100), Address::Fixed(101))?;
        let difference = b.sub(sum, Address::Fixed(101))?;
        b.assign(Address::Fixed(102), difference)?;
        let product = samples::multiply_cells(b, Address::Fixed(100), Address::Fixed(101))?;
        b.assign(Address::Fixed(103), product)?;
        b.halt();
        Ok(())
    })
    .unwrap();

    let machine = execute(&program);
    assert_eq!(machine.memory[102], 20);
    assert_eq!(machine.memory[103], 140);
    for (index, value) in (1..).enumerate().take(claimed.len()) {
        assert_eq!(machine.registers[index], value, "R{index}");
    }
}

/// Everything but R12 is claimed and holds its index plus one.
const CROWDED: [Register; 12] = [R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11];

/// Run `f` with only R12 free, then check every claimed register came back.
fn crowded(f: impl FnOnce(&mut Builder) -> Result<()>) -> Machine {
    let program = build(LoweringOptions::default(), |b| {
        b.claim(&CROWDED);
        for (value, register) in (1..).zip(CROWDED) {
            b.assign(register, value)?;
        }
        f(b)?;
        b.halt();
        Ok(())
    })
    .unwrap();

    let machine = execute(&program);
    for (index, value) in (1..).enumerate().take(CROWDED.len()) {
        assert_eq!(machine.registers[index], value, "R{index}");
    }
    machine
}

const X: Address = Address::Fixed(100);
const Y: Address = Address::Fixed(101);
const OUT: Address = Address::Fixed(102);

fn if_else_when_crowded(x: i32, y: i32) -> i32 {
    let machine = crowded(|b| {
        b.assign(X, x)?;
        b.assign(Y, y)?;
        let smaller = b.less_than(X, Y)?;
        b.if_(smaller, "crowdedIf", |b, _| b.assign(OUT, 1))?
            .else_(b, |b| b.assign(OUT, 2))
    });
    machine.memory[102]
}

#[test]
fn test_if_else_restores_spilled_registers() {
    assert_eq!(if_else_when_crowded(3, 8), 1);
    assert_eq!(if_else_when_crowded(8, 3), 2);
}

fn sign_when_crowded(x: i32) -> i32 {
    let machine = crowded(|b| {
        b.assign(X, x)?;
        let negative = b.less_than(X, 0)?;
        let zero = b.equal(X, 0)?;
        b.if_(negative, "negative", |b, _| b.assign(OUT, -1))?
            .else_if(b, zero, "zero", |b, _| b.assign(OUT, 0))?
            .else_(b, |b| b.assign(OUT, 1))
    });
    machine.memory[102]
}

#[test]
fn test_else_if_chain_restores_spilled_registers() {
    assert_eq!(sign_when_crowded(-4), -1);
    assert_eq!(sign_when_crowded(0), 0);
    assert_eq!(sign_when_crowded(9), 1);
}

#[test]
fn test_while_restores_spilled_registers() {
    let machine = crowded(|b| {
        b.assign(X, 0)?;
        b.assign(Y, 5)?;
        let below = b.less_than(X, Y)?;
        b.while_(below, "crowdedWhile", |b, _| b.increment(X))
    });
    assert_eq!(machine.memory[100], 5);
}

#[test]
fn test_continue_restores_spilled_registers() {
    let machine = crowded(|b| {
        b.assign(X, 0)?;
        b.assign(OUT, 0)?;
        let below = b.less_than(X, 6)?;
        b.while_(below, "skipOdd", |b, scope| {
            b.increment(X)?;
            let odd = b.logical(acc_codegen::LogicalOp::And, X, 1)?;
            b.if_(odd, "odd", |b, _| {
                scope.continue_loop(b);
                Ok(())
            })?;
            b.add_assign(OUT, X)
        })
    });
    assert_eq!(machine.memory[102], 12);
}

#[test]
fn test_for_each_restores_spilled_registers() {
    let machine = crowded(|b| {
        b.assign(OUT, 0)?;
        b.for_each(X, Progression::range_to(1, 4), "crowdedFor", |b, _| b.add_assign(OUT, X))
    });
    assert_eq!(machine.memory[102], 10);
}

#[test]
fn test_label_defined_twice() {
    let result = build(LoweringOptions::default(), |b| {
        let label = b.label("twice");
        b.define_label(label)?;
        b.define_label(label)
    });
    assert_eq!(result.err(), Some(AccError::LabelRedefined { label: "twice".to_string() }));
}

#[test]
fn test_listing_serializes() {
    let listing = sample("countdown").listing().unwrap();
    let json = serde_json::to_string(&listing).unwrap();
    assert!(json.contains("\"countdown_end\""));

    let parsed: crate::finalize::Listing = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, listing);
    assert!(parsed.temporaries.is_empty());
}
