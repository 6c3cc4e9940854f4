//! Arithmetic on the embedded curve `y^2 = x^3 - 17` over the native field.
//!
//! Points are affine with an explicit infinity flag, so that the point at
//! infinity does not depend on a sentinel coordinate.

use ark_ff::{AdditiveGroup, BigInteger, Field, PrimeField};
use num_traits::Zero;

use crate::util::{ff_from_i64, FF};

/// Constant term of the curve equation.
pub const CURVE_B: i64 = -17;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AffinePoint {
    pub x: FF,
    pub y: FF,
    pub is_infinity: bool,
}

impl AffinePoint {
    pub const fn new(x: FF, y: FF) -> Self {
        Self {
            x,
            y,
            is_infinity: false,
        }
    }

    pub fn infinity() -> Self {
        Self {
            x: FF::zero(),
            y: FF::zero(),
            is_infinity: true,
        }
    }

    pub fn is_on_curve(&self) -> bool {
        self.is_infinity || self.y.square() == self.x.square() * self.x + ff_from_i64(CURVE_B)
    }

    pub fn negate(&self) -> Self {
        Self {
            x: self.x,
            y: -self.y,
            is_infinity: self.is_infinity,
        }
    }

    pub fn double(&self) -> Self {
        if self.is_infinity || self.y.is_zero() {
            return Self::infinity();
        }
        // lambda = 3x^2 / 2y
        let Some(inv) = self.y.double().inverse() else {
            return Self::infinity();
        };
        let lambda = self.x.square() * FF::from(3u64) * inv;
        let x = lambda.square() - self.x.double();
        let y = lambda * (self.x - x) - self.y;
        Self::new(x, y)
    }

    pub fn add_point(&self, other: &Self) -> Self {
        if self.is_infinity {
            return *other;
        }
        if other.is_infinity {
            return *self;
        }
        if self.x == other.x {
            return if self.y == other.y {
                self.double()
            } else {
                Self::infinity()
            };
        }
        let Some(inv) = (other.x - self.x).inverse() else {
            return Self::infinity();
        };
        let lambda = (other.y - self.y) * inv;
        let x = lambda.square() - self.x - other.x;
        let y = lambda * (self.x - x) - self.y;
        Self::new(x, y)
    }

    /// Double-and-add multiplication by the integer representative of
    /// `scalar`.
    pub fn scalar_mul(&self, scalar: FF) -> Self {
        let bits = scalar.into_bigint().to_bits_be();
        bits.into_iter().fold(Self::infinity(), |acc, bit| {
            let acc = acc.double();
            if bit {
                acc.add_point(self)
            } else {
                acc
            }
        })
    }
}

/// Combines the low and high 128-bit halves of a scalar.
pub fn scalar_from_limbs(lo: FF, hi: FF) -> FF {
    lo + hi * FF::from(2u64).pow([128u64])
}

/// Sum of `scalars[i] * points[i]`.
pub fn msm(points: &[AffinePoint], scalars: &[FF]) -> AffinePoint {
    points
        .iter()
        .zip(scalars)
        .fold(AffinePoint::infinity(), |acc, (p, s)| acc.add_point(&p.scalar_mul(*s)))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EccOp {
    Add,
    Msm,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EccTraceEntry {
    pub clk: u32,
    pub op: EccOp,
    /// Operands of an addition. For a multi-scalar multiplication, the first
    /// point and the number of points in `msm_size`.
    pub p1: AffinePoint,
    pub p2: AffinePoint,
    pub result: AffinePoint,
    pub msm_size: u32,
}

#[derive(Clone, Debug, Default)]
pub struct EccTraceBuilder {
    entries: Vec<EccTraceEntry>,
}

impl EccTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EccTraceEntry] {
        &self.entries
    }

    pub fn embedded_curve_add(
        &mut self,
        p1: AffinePoint,
        p2: AffinePoint,
        clk: u32,
    ) -> AffinePoint {
        let result = p1.add_point(&p2);
        self.entries.push(EccTraceEntry {
            clk,
            op: EccOp::Add,
            p1,
            p2,
            result,
            msm_size: 0,
        });
        result
    }

    pub fn variable_msm(
        &mut self,
        points: &[AffinePoint],
        scalars: &[FF],
        clk: u32,
    ) -> AffinePoint {
        let result = msm(points, scalars);
        self.entries.push(EccTraceEntry {
            clk,
            op: EccOp::Msm,
            p1: points.first().copied().unwrap_or_else(AffinePoint::infinity),
            p2: AffinePoint::infinity(),
            result,
            msm_size: points.len() as u32,
        });
        result
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
