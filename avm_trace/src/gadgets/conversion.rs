//! Radix decomposition of field elements.

use num_bigint::BigUint;

use crate::util::{ff_to_biguint, FF};

/// Largest supported radix.
pub const MAX_RADIX: u32 = 256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LimbOrder {
    LittleEndian,
    BigEndian,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversionTraceEntry {
    pub clk: u32,
    pub input: FF,
    pub radix: u32,
    pub num_limbs: u32,
    pub output_bits: bool,
    pub order: LimbOrder,
}

/// Returns true if `radix` can be used, alone or in bit mode. Bits are
/// written as U1, so bit mode only accepts radix 2.
pub const fn is_valid_radix(radix: u32, output_bits: bool) -> bool {
    radix >= 2 && radix <= MAX_RADIX && (!output_bits || radix == 2)
}

/// Decomposes `a` into `num_limbs` little-endian base-`radix` digits, which
/// represent `a mod radix^num_limbs`.
pub fn to_radix_le(a: FF, radix: u32, num_limbs: usize) -> Vec<u8> {
    let mut value = ff_to_biguint(a);
    let radix = BigUint::from(radix);
    let mut limbs = Vec::with_capacity(num_limbs);
    for _ in 0..num_limbs {
        let digit = &value % &radix;
        limbs.push(digit.to_u32_digits().first().copied().unwrap_or(0) as u8);
        value /= &radix;
    }
    limbs
}

/// Recomposes little-endian base-`radix` digits.
pub fn from_radix_le(limbs: &[u8], radix: u32) -> FF {
    let radix = FF::from(radix as u64);
    limbs
        .iter()
        .rev()
        .fold(FF::from(0u64), |acc, limb| acc * radix + FF::from(*limb as u64))
}

#[derive(Clone, Debug, Default)]
pub struct ConversionTraceBuilder {
    entries: Vec<ConversionTraceEntry>,
}

impl ConversionTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ConversionTraceEntry] {
        &self.entries
    }

    /// Decomposes `a` into `num_limbs` digits in the requested order. In bit
    /// mode every digit is 0 or 1. The radix must satisfy [`is_valid_radix`];
    /// the caller checks it.
    pub fn op_to_radix(
        &mut self,
        a: FF,
        radix: u32,
        num_limbs: u32,
        output_bits: bool,
        order: LimbOrder,
        clk: u32,
    ) -> Vec<u8> {
        let mut limbs = to_radix_le(a, radix, num_limbs as usize);
        if order == LimbOrder::BigEndian {
            limbs.reverse();
        }
        self.entries.push(ConversionTraceEntry {
            clk,
            input: a,
            radix,
            num_limbs,
            output_bits,
            order,
        });
        limbs
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
