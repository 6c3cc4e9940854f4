//! Range checks by tabulated multiplicities.
//!
//! A value is proven to lie in `[0, 2^k)` by splitting it into 16-bit limbs,
//! counting each limb against the `u16` table, and counting the bit-width of
//! the top limb against the powers-of-two table.

use crate::util::{u16_limbs, FF};

/// Maximum number of 16-bit limbs of a checked value.
pub const NUM_U16_LIMBS: usize = 8;

/// Number of rows of the fixed powers-of-two table.
pub const POWERS_OF_2_TABLE_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RangeCheckEntry {
    pub clk: u32,
    pub value: u128,
    pub num_bits: u32,
    pub limbs: [u16; NUM_U16_LIMBS],
    /// Bits remaining for the top limb.
    pub dyn_bits: u32,
}

#[derive(Clone, Debug)]
pub struct RangeCheckBuilder {
    entries: Vec<RangeCheckEntry>,
    pub(crate) u16_counts: [Vec<u32>; NUM_U16_LIMBS],
    pub(crate) powers_of_2_counts: [u32; POWERS_OF_2_TABLE_SIZE],
}

impl Default for RangeCheckBuilder {
    fn default() -> Self {
        Self {
            entries: vec![],
            u16_counts: core::array::from_fn(|_| vec![0; 1 << 16]),
            powers_of_2_counts: [0; POWERS_OF_2_TABLE_SIZE],
        }
    }
}

impl RangeCheckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records that `value` must fit in `num_bits` bits (at most 128).
    /// Returns whether it does.
    pub fn assert_range(&mut self, value: u128, num_bits: u32, clk: u32) -> bool {
        let num_bits = num_bits.min(128);
        let fits = num_bits == 128 || value >> num_bits == 0;
        let limbs = u16_limbs::<NUM_U16_LIMBS>(value);
        let num_limbs = num_bits.div_ceil(16) as usize;
        for (i, limb) in limbs.iter().take(num_limbs).enumerate() {
            self.u16_counts[i][*limb as usize] += 1;
        }
        let dyn_bits = match num_bits % 16 {
            0 if num_bits > 0 => 16,
            rem => rem,
        };
        self.powers_of_2_counts[dyn_bits as usize] += 1;
        self.entries.push(RangeCheckEntry {
            clk,
            value,
            num_bits,
            limbs,
            dyn_bits,
        });
        fits
    }

    /// Folds the checks recorded by another builder into this one.
    pub fn combine(&mut self, other: &RangeCheckBuilder) {
        self.entries.extend_from_slice(&other.entries);
        for (mine, theirs) in self.u16_counts.iter_mut().zip(other.u16_counts.iter()) {
            for (a, b) in mine.iter_mut().zip(theirs.iter()) {
                *a += *b;
            }
        }
        for (a, b) in self
            .powers_of_2_counts
            .iter_mut()
            .zip(other.powers_of_2_counts.iter())
        {
            *a += *b;
        }
    }

    /// Entries ordered by clock.
    pub fn finalize(&self) -> Vec<RangeCheckEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.clk);
        entries
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// `2^i` for row `i` of the fixed powers-of-two table.
pub fn power_of_2(i: usize) -> FF {
    let mut p = FF::from(1u64);
    let two = FF::from(2u64);
    for _ in 0..i {
        p *= two;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limbs_are_counted() {
        let mut rc = RangeCheckBuilder::new();
        assert!(rc.assert_range(0x0001_0002, 32, 1));
        assert_eq!(rc.u16_counts[0][2], 1);
        assert_eq!(rc.u16_counts[1][1], 1);
        assert_eq!(rc.u16_counts[2][0], 0);
        assert_eq!(rc.powers_of_2_counts[16], 1);
    }

    #[test]
    fn out_of_range_is_reported() {
        let mut rc = RangeCheckBuilder::new();
        assert!(!rc.assert_range(256, 8, 1));
        assert!(rc.assert_range(255, 8, 1));
        assert_eq!(rc.powers_of_2_counts[8], 2);
    }

    #[test]
    fn combine_adds_counts() {
        let mut a = RangeCheckBuilder::new();
        let mut b = RangeCheckBuilder::new();
        a.assert_range(5, 8, 2);
        b.assert_range(5, 8, 1);
        a.combine(&b);
        assert_eq!(a.u16_counts[0][5], 2);
        assert_eq!(a.finalize().iter().map(|e| e.clk).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn powers() {
        assert_eq!(power_of_2(0), FF::from(1u64));
        assert_eq!(power_of_2(10), FF::from(1024u64));
    }
}
