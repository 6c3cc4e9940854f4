//! Bitwise AND/OR/XOR gadget.
//!
//! An operation on an integral tag of `n` bytes is decomposed into `n`
//! entries, one per byte from the least significant one. Each entry carries
//! the running accumulators of the inputs and of the output, and each byte
//! triple is matched against the fixed byte-operation table.

use avm_common::BYTE_TABLE_OPERATION_SIZE;
use hashbrown::HashMap;

use crate::memory::MemoryTag;
use crate::util::{ff_to_u128, FF};

/// Bitwise operations, numbered as in the byte-operation table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum BinaryOp {
    And = 0,
    Or = 1,
    Xor = 2,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 3] = [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor];

    /// Returns the output of the operation on two bytes.
    pub const fn result(self, a: u8, b: u8) -> u8 {
        match self {
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
        }
    }

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(BinaryOp::And),
            1 => Some(BinaryOp::Or),
            2 => Some(BinaryOp::Xor),
            _ => None,
        }
    }
}

/// One byte of a bitwise operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BinaryTraceEntry {
    pub clk: u32,
    pub op: BinaryOp,
    pub in_tag: MemoryTag,
    /// Operands and result shifted right by `8 * i` for the `i`-th byte.
    pub acc_ia: u128,
    pub acc_ib: u128,
    pub acc_ic: u128,
    pub ia_byte: u8,
    pub ib_byte: u8,
    pub ic_byte: u8,
    /// Number of bytes left, including this one.
    pub mem_tag_ctr: u32,
    pub start: bool,
}

/// Index of `(op, a, b)` in the full byte-operation table.
pub const fn byte_table_index(op: BinaryOp, a: u8, b: u8) -> usize {
    op as usize * BYTE_TABLE_OPERATION_SIZE + ((a as usize) << 8) + b as usize
}

/// Inverse of [`byte_table_index`].
pub fn byte_table_row(index: usize) -> Option<(BinaryOp, u8, u8)> {
    let op = BinaryOp::from_id(u8::try_from(index / BYTE_TABLE_OPERATION_SIZE).ok()?)?;
    let rem = index % BYTE_TABLE_OPERATION_SIZE;
    Some((op, (rem >> 8) as u8, rem as u8))
}

#[derive(Clone, Debug, Default)]
pub struct BinaryTraceBuilder {
    entries: Vec<BinaryTraceEntry>,
    /// Multiplicity of each byte-table row, keyed by [`byte_table_index`].
    pub(crate) byte_operation_counter: HashMap<usize, u32>,
    /// Multiplicity of each tag in the byte-lengths table.
    pub(crate) byte_length_counter: HashMap<MemoryTag, u32>,
}

impl BinaryTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BinaryTraceEntry] {
        &self.entries
    }

    /// Applies `op` to two values of the integral tag `in_tag`.
    pub fn op(&mut self, op: BinaryOp, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        let a = ff_to_u128(in_tag.truncate(a));
        let b = ff_to_u128(in_tag.truncate(b));
        let num_bytes = in_tag.num_bytes().min(16);

        let mut c = 0u128;
        for i in 0..num_bytes {
            let shift = 8 * i as u32;
            let (a_byte, b_byte) = ((a >> shift) as u8, (b >> shift) as u8);
            c |= (op.result(a_byte, b_byte) as u128) << shift;
        }

        for i in 0..num_bytes {
            let shift = 8 * i as u32;
            let (ia_byte, ib_byte, ic_byte) =
                ((a >> shift) as u8, (b >> shift) as u8, (c >> shift) as u8);
            *self
                .byte_operation_counter
                .entry(byte_table_index(op, ia_byte, ib_byte))
                .or_default() += 1;
            self.entries.push(BinaryTraceEntry {
                clk,
                op,
                in_tag,
                acc_ia: a >> shift,
                acc_ib: b >> shift,
                acc_ic: c >> shift,
                ia_byte,
                ib_byte,
                ic_byte,
                mem_tag_ctr: (num_bytes - i) as u32,
                start: i == 0,
            });
        }
        *self.byte_length_counter.entry(in_tag).or_default() += 1;

        FF::from(c)
    }

    pub fn op_and(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        self.op(BinaryOp::And, a, b, in_tag, clk)
    }

    pub fn op_or(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        self.op(BinaryOp::Or, a, b, in_tag, clk)
    }

    pub fn op_xor(&mut self, a: FF, b: FF, in_tag: MemoryTag, clk: u32) -> FF {
        self.op(BinaryOp::Xor, a, b, in_tag, clk)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
