//! Sample programs
//!
//! Small programs exercising each part of the lowering engine. The driver
//! builds them by name and the scenario tests check their listings and run
//! them on the reference machine.

use crate::control::Progression;
use crate::finalize::Program;
use crate::ir::{Address, Calculation, Value, R0, R1, R2, R3};
use crate::scope::Builder;
use acc_codegen::{Condition, LogicalOp};
use acc_common::{LoweringOptions, Result};

pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    construct: fn(&mut Builder) -> Result<()>,
}

impl Sample {
    pub fn build(&self, options: LoweringOptions) -> Result<Program> {
        crate::build(options, self.construct)
    }
}

pub const SAMPLES: &[Sample] = &[
    Sample { name: "arithmetic", description: "R2 = R0 + R1 with constant inputs", construct: arithmetic },
    Sample { name: "swap", description: "Swap R0 and R1 if R0 > R1, else increment R0", construct: swap },
    Sample { name: "multiply", description: "Shift-add multiplication of two memory cells, used twice", construct: multiply },
    Sample { name: "countdown", description: "Sum 10 down to 1 into R0", construct: countdown },
    Sample { name: "maximum", description: "Largest of R0, R1 and R2 into R3", construct: maximum },
    Sample { name: "sign", description: "Sign of R0 into R1 through an else-if chain", construct: sign },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|sample| sample.name == name)
}

pub fn names() -> Vec<&'static str> {
    SAMPLES.iter().map(|sample| sample.name).collect()
}

fn arithmetic(b: &mut Builder) -> Result<()> {
    b.assign(R0, 5)?;
    b.assign(R1, 3)?;
    let sum = b.add(R0, R1)?;
    b.assign(R2, sum)?;
    b.halt();
    Ok(())
}

fn swap(b: &mut Builder) -> Result<()> {
    b.assign(R0, 7)?;
    b.assign(R1, 3)?;
    let greater = b.greater_than(R0, R1)?;
    b.if_(greater, "ifGreater", |b, _| b.swap(R0, R1))?
        .else_(b, |b| b.increment(R0))?;
    b.halt();
    Ok(())
}

/// `first * second` for non-negative operands by repeated shift and add.
pub fn multiply_cells(b: &mut Builder, first: Address, second: Address) -> Result<Value> {
    let sub = b.build_subroutine("multiply", &[], move |b, sub, _| {
        let multiplicand = b.register(Some(first.into()))?;
        let multiplier = b.register(Some(second.into()))?;
        b.assign(sub.result(), 0)?;

        let main_loop = b.label_with_suffix(sub.scope(), "_mainLoop");
        let skip_add = b.label_with_suffix(sub.scope(), "_skipAdd");
        let end = b.end_label(sub);

        b.define_label(main_loop)?;
        b.compare(multiplier, 0);
        b.branch(end, Condition::Eq);
        let bit = b.register(Some(Calculation::Logical(LogicalOp::And, multiplier, 1.into()).into()))?;
        b.compare(bit, 0);
        b.branch(skip_add, Condition::Eq);
        b.add_assign(sub.result(), multiplicand)?;
        b.define_label(skip_add)?;
        b.shl_assign(multiplicand, 1)?;
        b.shr_assign(multiplier, 1)?;
        b.branch(main_loop, Condition::Always);
        Ok(())
    })?;
    Ok(sub.into())
}

fn multiply(b: &mut Builder) -> Result<()> {
    let (first, second) = (Address::Fixed(100), Address::Fixed(101));
    b.assign(first, 6)?;
    b.assign(second, 7)?;
    let product = multiply_cells(b, first, second)?;
    b.assign(Address::Fixed(102), product)?;
    b.assign(Address::Fixed(103), product)?;
    b.halt();
    Ok(())
}

fn countdown(b: &mut Builder) -> Result<()> {
    b.assign(R0, 0)?;
    b.for_each(R1, Progression::down_to(10, 1), "countdown", |b, _| b.add_assign(R0, R1))?;
    b.halt();
    Ok(())
}

fn maximum(b: &mut Builder) -> Result<()> {
    b.assign(R0, 4)?;
    b.assign(R1, 9)?;
    b.assign(R2, 2)?;
    b.assign(R3, R0)?;
    let second_larger = b.greater_than(R1, R3)?;
    b.if_(second_larger, "checkSecond", |b, _| b.assign(R3, R1))?;
    let third_larger = b.greater_than(R2, R3)?;
    b.if_(third_larger, "checkThird", |b, _| b.assign(R3, R2))?;
    b.halt();
    Ok(())
}

fn sign(b: &mut Builder) -> Result<()> {
    b.assign(R0, -5)?;
    b.claim(&[R1]);
    let negative = b.less_than(R0, 0)?;
    let zero = b.equal(R0, 0)?;
    b.if_(negative, "ifNegative", |b, _| b.assign(R1, -1))?
        .else_if(b, zero, "ifZero", |b, _| b.assign(R1, 0))?
        .else_(b, |b| b.assign(R1, 1))?;
    b.halt();
    Ok(())
}
