//! One-bit serial arithmetic.
//!
//! The machine owns a single full adder.  Words meet it one bit at a
//! time, least significant first, with the carry latched between
//! cycles.  Exactly three paths use it: ADD (second input is the
//! operand bit), SUB (second input is the inverted operand bit with
//! the carry seeded to 1, the usual two's-complement trick) and the
//! program-counter increment in ADVANCE (second input 0, carry seeded
//! to 1).

/// Add two bits and a carry; returns `(sum, carry_out)`.
pub fn full_add(x: bool, y: bool, carry_in: bool) -> (bool, bool) {
    let sum = x ^ y ^ carry_in;
    let carry_out = (x & y) | (carry_in & (x ^ y));
    (sum, carry_out)
}
