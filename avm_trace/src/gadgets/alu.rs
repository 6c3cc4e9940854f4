//! Arithmetic, comparison, shift and cast gadget.
//!
//! Integral operations wrap modulo `2^bits` of the operand tag; field
//! operations use the native field. Each entry range-checks its integral
//! result so that the wrapped value is proven to fit its tag.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::memory::MemoryTag;
use crate::range_check::RangeCheckBuilder;
use crate::util::{biguint_to_ff, ff_bool, ff_lt, ff_to_biguint, ff_to_u128, ff_to_u32, FF};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Lte,
    Not,
    Shl,
    Shr,
    Cast,
}

#[derive(Clone, Copy, Debug)]
pub struct AluTraceEntry {
    pub clk: u32,
    pub op: AluOp,
    pub in_tag: MemoryTag,
    pub ia: FF,
    pub ib: FF,
    pub ic: FF,
    /// Carry of additions and multiplications, borrow of subtractions.
    pub cf: bool,
}

#[derive(Clone, Debug)]
pub struct AluTraceBuilder {
    entries: Vec<AluTraceEntry>,
    pub(crate) range_checks: RangeCheckBuilder,
    /// Multiplicities of the shift amounts (`[0]`) and their complements to
    /// the bit-width (`[1]`) against the powers-of-two table.
    pub(crate) pow_2_counts: [Vec<u32>; 2],
}

impl Default for AluTraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `full` into its value modulo `2^bits` and whether it overflowed.
fn wrap(full: BigUint, bits: u32) -> (FF, bool) {
    let modulus = BigUint::one() << bits;
    let overflow = full >= modulus;
    (biguint_to_ff(&(full % modulus)), overflow)
}

impl AluTraceBuilder {
    pub fn new() -> Self {
        Self {
            entries: vec![],
            range_checks: RangeCheckBuilder::new(),
            pow_2_counts: [vec![0; 256], vec![0; 256]],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AluTraceEntry] {
        &self.entries
    }

    fn push(&mut self, clk: u32, op: AluOp, in_tag: MemoryTag, ia: FF, ib: FF, ic: FF, cf: bool) {
        if in_tag.is_integral() {
            self.range_checks
                .assert_range(ff_to_u128(ic), in_tag.bits(), clk);
        }
        self.entries.push(AluTraceEntry {
            clk,
            op,
            in_tag,
            ia,
            ib,
            ic,
            cf,
        });
    }

    pub fn op_add(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let (c, cf) = if in_tag.is_integral() {
            wrap(ff_to_biguint(a) + ff_to_biguint(b), in_tag.bits())
        } else {
            (a + b, false)
        };
        self.push(clk, AluOp::Add, in_tag, a, b, c, cf);
        c
    }

    pub fn op_sub(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let (c, cf) = if in_tag.is_integral() {
            let modulus = BigUint::one() << in_tag.bits();
            let borrow = ff_lt(a, b);
            let b = ff_to_biguint(b) % &modulus;
            let (c, _) = wrap(ff_to_biguint(a) + modulus - b, in_tag.bits());
            (c, borrow)
        } else {
            (a - b, false)
        };
        self.push(clk, AluOp::Sub, in_tag, a, b, c, cf);
        c
    }

    pub fn op_mul(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let (c, cf) = if in_tag.is_integral() {
            wrap(ff_to_biguint(a) * ff_to_biguint(b), in_tag.bits())
        } else {
            (a * b, false)
        };
        self.push(clk, AluOp::Mul, in_tag, a, b, c, cf);
        c
    }

    /// Integer division, rounding toward zero. The divisor must be non-zero
    /// and the tag integral; the caller checks both.
    pub fn op_div(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let divisor = ff_to_biguint(b);
        let c = if divisor.is_zero() {
            FF::from(0u64)
        } else {
            biguint_to_ff(&(ff_to_biguint(a) / divisor))
        };
        self.push(clk, AluOp::Div, in_tag, a, b, c, false);
        c
    }

    pub fn op_eq(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let c = ff_bool(a == b);
        self.push(clk, AluOp::Eq, in_tag, a, b, c, false);
        c
    }

    pub fn op_lt(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let c = ff_bool(ff_lt(a, b));
        self.push(clk, AluOp::Lt, in_tag, a, b, c, false);
        c
    }

    pub fn op_lte(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let c = ff_bool(!ff_lt(b, a));
        self.push(clk, AluOp::Lte, in_tag, a, b, c, false);
        c
    }

    /// Bitwise complement within the width of an integral tag.
    pub fn op_not(&mut self, a: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let max = (BigUint::one() << in_tag.bits()) - BigUint::one();
        let c = biguint_to_ff(&(&max - (ff_to_biguint(a) & &max)));
        self.push(clk, AluOp::Not, in_tag, a, FF::from(0u64), c, false);
        c
    }

    fn count_shift(&mut self, shift: u32, bits: u32) {
        if shift < bits {
            self.pow_2_counts[0][shift as usize] += 1;
            self.pow_2_counts[1][(bits - shift) as usize] += 1;
        }
    }

    /// Left shift truncated to the tag width. Shifts of at least the
    /// bit-width produce 0.
    pub fn op_shl(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let bits = in_tag.bits();
        let shift = ff_to_u32(b);
        let c = if shift >= bits || !b.eq(&FF::from(shift)) {
            FF::from(0u64)
        } else {
            wrap(ff_to_biguint(a) << shift, bits).0
        };
        self.count_shift(shift, bits);
        self.push(clk, AluOp::Shl, in_tag, a, b, c, false);
        c
    }

    pub fn op_shr(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let bits = in_tag.bits();
        let shift = ff_to_u32(b);
        let c = if shift >= bits || !b.eq(&FF::from(shift)) {
            FF::from(0u64)
        } else {
            biguint_to_ff(&(ff_to_biguint(a) >> shift))
        };
        self.count_shift(shift, bits);
        self.push(clk, AluOp::Shr, in_tag, a, b, c, false);
        c
    }

    /// Truncates `a` to `dst_tag`.
    pub fn op_cast(&mut self, a: FF, dst_tag: MemoryTag, clk: u32) -> FF {
        let c = dst_tag.truncate(a);
        self.push(clk, AluOp::Cast, dst_tag, a, FF::from(0u64), c, false);
        c
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_addition_wraps() {
        let mut alu = AluTraceBuilder::new();
        let c = alu.op_add(FF::from(200u64), FF::from(100u64), MemoryTag::U8, 1);
        assert_eq!(c, FF::from(44u64));
        assert!(alu.entries()[0].cf);
        let c = alu.op_add(FF::from(u128::MAX), FF::from(1u64), MemoryTag::U128, 2);
        assert_eq!(c, FF::from(0u64));
    }

    #[test]
    fn field_arithmetic_does_not_wrap() {
        let mut alu = AluTraceBuilder::new();
        let c = alu.op_sub(FF::from(1u64), FF::from(2u64), MemoryTag::FF, 1);
        assert_eq!(c, -FF::from(1u64));
        let c = alu.op_mul(FF::from(1u64 << 40), FF::from(1u64 << 40), MemoryTag::FF, 2);
        assert_eq!(c, FF::from(1u128 << 80));
    }

    #[test]
    fn integral_subtraction_borrows() {
        let mut alu = AluTraceBuilder::new();
        let c = alu.op_sub(FF::from(1u64), FF::from(2u64), MemoryTag::U16, 1);
        assert_eq!(c, FF::from(0xffffu64));
        assert!(alu.entries()[0].cf);
    }

    #[test]
    fn division_and_comparisons() {
        let mut alu = AluTraceBuilder::new();
        assert_eq!(
            alu.op_div(FF::from(17u64), FF::from(5u64), MemoryTag::U32, 1),
            FF::from(3u64)
        );
        assert_eq!(
            alu.op_lt(FF::from(3u64), FF::from(5u64), MemoryTag::U32, 2),
            FF::from(1u64)
        );
        assert_eq!(
            alu.op_lte(FF::from(5u64), FF::from(5u64), MemoryTag::U32, 3),
            FF::from(1u64)
        );
        assert_eq!(
            alu.op_eq(FF::from(5u64), FF::from(6u64), MemoryTag::U32, 4),
            FF::from(0u64)
        );
    }

    #[test]
    fn not_and_shifts() {
        let mut alu = AluTraceBuilder::new();
        assert_eq!(alu.op_not(FF::from(0x0fu64), MemoryTag::U8, 1), FF::from(0xf0u64));
        assert_eq!(
            alu.op_shl(FF::from(0x81u64), FF::from(1u64), MemoryTag::U8, 2),
            FF::from(0x02u64)
        );
        assert_eq!(
            alu.op_shr(FF::from(0x80u64), FF::from(7u64), MemoryTag::U8, 3),
            FF::from(1u64)
        );
        assert_eq!(
            alu.op_shr(FF::from(0x80u64), FF::from(8u64), MemoryTag::U8, 4),
            FF::from(0u64)
        );
        assert_eq!(alu.pow_2_counts[0][1], 1);
        assert_eq!(alu.pow_2_counts[1][7], 1);
    }

    #[test]
    fn cast_truncates() {
        let mut alu = AluTraceBuilder::new();
        assert_eq!(
            alu.op_cast(FF::from(0x1_0203u64), MemoryTag::U8, 1),
            FF::from(3u64)
        );
        assert_eq!(alu.entries()[0].in_tag, MemoryTag::U8);
    }
}
