//! Small boolean circuit builders on top of a gate factory.
//!
//! Used by the arithmetic→boolean conversion (ripple-carry addition of the
//! two share summands) and by applications composing comparisons and
//! selections.

use duet_engine::{EngineError, GateFactory, Operation, Wire, WireVector};

fn single(wire: &Wire) -> WireVector {
    vec![wire.clone()]
}

fn check_equal_width(a: &[Wire], b: &[Wire]) -> Result<(), EngineError> {
    if a.len() != b.len() || a.is_empty() {
        return Err(EngineError::WireCountMismatch {
            expected: a.len().max(1),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Builds a ripple-carry adder over two boolean values of equal width
/// (LSB first). The final carry is discarded, i.e. addition is mod `2^k`.
pub fn ripple_carry_adder(
    factory: &dyn GateFactory,
    a: &[Wire],
    b: &[Wire],
) -> Result<WireVector, EngineError> {
    check_equal_width(a, b)?;
    let k = a.len();

    let mut sum = Vec::with_capacity(k);
    sum.extend(factory.make_binary_gate(Operation::Xor, &single(&a[0]), &single(&b[0]))?);
    if k == 1 {
        return Ok(sum);
    }

    let mut carry = factory.make_binary_gate(Operation::And, &single(&a[0]), &single(&b[0]))?;
    for j in 1..k {
        let a_j = single(&a[j]);
        let b_j = single(&b[j]);
        let a_xor_c = factory.make_binary_gate(Operation::Xor, &a_j, &carry)?;
        let s_j = factory.make_binary_gate(Operation::Xor, &a_xor_c, &b_j)?;
        sum.extend(s_j);
        if j + 1 < k {
            let b_xor_c = factory.make_binary_gate(Operation::Xor, &b_j, &carry)?;
            let both = factory.make_binary_gate(Operation::And, &a_xor_c, &b_xor_c)?;
            carry = factory.make_binary_gate(Operation::Xor, &both, &carry)?;
        }
    }
    Ok(sum)
}

/// Builds an unsigned greater-than comparator: one output wire carrying
/// `a > b`.
pub fn greater_than(
    factory: &dyn GateFactory,
    a: &[Wire],
    b: &[Wire],
) -> Result<WireVector, EngineError> {
    check_equal_width(a, b)?;
    let k = a.len();

    let not_b = factory.make_unary_gate(Operation::Inv, &single(&b[0]))?;
    let mut gt = factory.make_binary_gate(Operation::And, &single(&a[0]), &not_b)?;
    for j in 1..k {
        let a_j = single(&a[j]);
        let b_j = single(&b[j]);
        let not_b_j = factory.make_unary_gate(Operation::Inv, &b_j)?;
        let a_gt = factory.make_binary_gate(Operation::And, &a_j, &not_b_j)?;
        let diff = factory.make_binary_gate(Operation::Xor, &a_j, &b_j)?;
        let eq = factory.make_unary_gate(Operation::Inv, &diff)?;
        let keep = factory.make_binary_gate(Operation::And, &eq, &gt)?;
        gt = factory.make_binary_gate(Operation::Xor, &a_gt, &keep)?;
    }
    Ok(gt)
}

/// Builds a bitwise multiplexer: returns `on_true` where the selection bit
/// is set, `on_false` elsewhere.
pub fn multiplex(
    factory: &dyn GateFactory,
    selector: &[Wire],
    on_true: &[Wire],
    on_false: &[Wire],
) -> Result<WireVector, EngineError> {
    if selector.len() != 1 {
        return Err(EngineError::WireCountMismatch {
            expected: 1,
            actual: selector.len(),
        });
    }
    check_equal_width(on_true, on_false)?;

    let mut out = Vec::with_capacity(on_true.len());
    for (t, f) in on_true.iter().zip(on_false) {
        let diff = factory.make_binary_gate(Operation::Xor, &single(t), &single(f))?;
        let masked = factory.make_binary_gate(Operation::And, selector, &diff)?;
        out.extend(factory.make_binary_gate(Operation::Xor, &single(f), &masked)?);
    }
    Ok(out)
}
