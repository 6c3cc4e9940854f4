//! Field element helpers shared by the trace builders.

use ark_ff::{BigInteger, Field, PrimeField};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// The native field of the trace.
pub type FF = ark_bn254::Fr;

/// Returns the field element `1` if `b` is true, `0` otherwise.
pub fn ff_bool(b: bool) -> FF {
    FF::from(b)
}

/// Returns the low 128 bits of the canonical representative of `value`.
pub fn ff_to_u128(value: FF) -> u128 {
    let limbs = value.into_bigint().0;
    ((limbs[1] as u128) << 64) | limbs[0] as u128
}

/// Returns the low 64 bits of the canonical representative of `value`.
pub fn ff_to_u64(value: FF) -> u64 {
    value.into_bigint().0[0]
}

/// Returns the low 32 bits of the canonical representative of `value`.
pub fn ff_to_u32(value: FF) -> u32 {
    value.into_bigint().0[0] as u32
}

/// Returns true if the canonical representative of `value` is below `2^bits`.
pub fn ff_fits_in_bits(value: FF, bits: u32) -> bool {
    value.into_bigint().num_bits() <= bits
}

pub fn ff_to_biguint(value: FF) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

/// Reduces `value` modulo the field order.
pub fn biguint_to_ff(value: &BigUint) -> FF {
    FF::from_le_bytes_mod_order(&value.to_bytes_le())
}

/// Returns `value` reduced modulo `2^bits`.
pub fn truncate_to_bits(value: FF, bits: u32) -> FF {
    if bits >= FF::MODULUS_BIT_SIZE {
        return value;
    }
    let mask = (BigUint::one() << bits) - BigUint::one();
    biguint_to_ff(&(ff_to_biguint(value) & mask))
}

/// Inverse of `value`, or zero when `value` is zero.
pub fn ff_inverse_or_zero(value: FF) -> FF {
    value.inverse().unwrap_or_default()
}

/// Embeds a signed integer, mapping negatives to `p - abs`.
pub fn ff_from_i64(value: i64) -> FF {
    if value >= 0 {
        FF::from(value as u64)
    } else {
        -FF::from(value.unsigned_abs())
    }
}

/// Splits `value` into little-endian 16-bit limbs.
pub fn u16_limbs<const N: usize>(value: u128) -> [u16; N] {
    let mut limbs = [0u16; N];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let shift = 16 * i as u32;
        if shift < 128 {
            *limb = (value >> shift) as u16;
        }
    }
    limbs
}

/// Compares the canonical representatives of two field elements.
pub fn ff_lt(a: FF, b: FF) -> bool {
    a.into_bigint() < b.into_bigint()
}

/// Parses a field element from a `0x`-prefixed hex string or a decimal
/// string.
pub fn parse_ff(s: &str) -> Option<FF> {
    let s = s.trim();
    let big = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) if hex.is_empty() => Some(BigUint::zero()),
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(s.as_bytes(), 10),
    }?;
    Some(biguint_to_ff(&big))
}

/// (De)serializes a field element as a `0x`-prefixed hex string. Decimal
/// strings and plain integers are accepted on input.
pub mod ff_serde {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use super::{ff_to_biguint, parse_ff, FF};

    pub fn serialize<S: Serializer>(value: &FF, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", ff_to_biguint(*value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FF, D::Error> {
        deserializer.deserialize_any(FFVisitor)
    }

    struct FFVisitor;

    impl<'de> Visitor<'de> for FFVisitor {
        type Value = FF;

        fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
            f.write_str("a field element as a hex string, decimal string or integer")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<FF, E> {
            Ok(FF::from(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<FF, E> {
            parse_ff(v).ok_or_else(|| E::custom(format!("invalid field element `{v}`")))
        }
    }
}

/// (De)serializes a vector of field elements with [`ff_serde`].
pub mod ff_vec_serde {
    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FF;

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::ff_serde")] FF);

    pub fn serialize<S: Serializer>(values: &[FF], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&format!("0x{:x}", super::ff_to_biguint(*value)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FF>, D::Error> {
        deserializer.deserialize_seq(VecVisitor)
    }

    struct VecVisitor;

    impl<'de> Visitor<'de> for VecVisitor {
        type Value = Vec<FF>;

        fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
            f.write_str("a sequence of field elements")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<FF>, A::Error> {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(Wrapped(value)) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_bits_extraction() {
        let v = FF::from(u128::MAX) + FF::from(5u64);
        assert_eq!(ff_to_u128(FF::from(u128::MAX)), u128::MAX);
        assert_eq!(ff_to_u64(v), 4);
        assert_eq!(ff_to_u32(FF::from(0x1_0000_0007u64)), 7);
        assert!(ff_fits_in_bits(FF::from(255u64), 8));
        assert!(!ff_fits_in_bits(FF::from(256u64), 8));
    }

    #[test]
    fn truncation_and_limbs() {
        assert_eq!(truncate_to_bits(FF::from(0x1234u64), 8), FF::from(0x34u64));
        assert_eq!(truncate_to_bits(-FF::one(), 254), -FF::one());
        assert_eq!(u16_limbs::<3>(0x0001_0002_0003), [3, 2, 1]);
        assert_eq!(ff_from_i64(-3) + FF::from(3u64), FF::zero());
    }

    #[test]
    fn parse_hex_and_decimal() {
        assert_eq!(parse_ff("0x10"), Some(FF::from(16u64)));
        assert_eq!(parse_ff("42"), Some(FF::from(42u64)));
        assert_eq!(parse_ff("0x"), Some(FF::zero()));
        assert_eq!(parse_ff("zz"), None);
    }

    #[test]
    fn serde_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Holder {
            #[serde(with = "ff_serde")]
            one: FF,
            #[serde(with = "ff_vec_serde")]
            many: Vec<FF>,
        }
        let holder = Holder {
            one: FF::from(255u64),
            many: vec![FF::from(1u64), -FF::one()],
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert!(json.contains("\"0xff\""));
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holder);

        let from_ints: Holder = serde_json::from_str(r#"{"one": 7, "many": ["3", 4]}"#).unwrap();
        assert_eq!(from_ints.one, FF::from(7u64));
        assert_eq!(from_ints.many, vec![FF::from(3u64), FF::from(4u64)]);
    }
}
