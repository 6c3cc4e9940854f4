//! Hash decomposition of the executed bytecode.
//!
//! The bytecode is packed big-endian into field elements of
//! [`BYTECODE_BYTES_PER_FIELD`] bytes each, which are absorbed one by one
//! into a Poseidon2 running hash.

use avm_common::BYTECODE_BYTES_PER_FIELD;
use ark_ff::PrimeField;

use crate::columns::Row;
use crate::gadgets::poseidon2::permutation;
use crate::util::{ff_bool, FF};

/// Packs `bytecode` into field elements. The last chunk is right-padded
/// with zero bytes.
pub fn encode_bytecode(bytecode: &[u8]) -> Vec<FF> {
    bytecode
        .chunks(BYTECODE_BYTES_PER_FIELD)
        .map(|chunk| {
            let mut bytes = [0u8; BYTECODE_BYTES_PER_FIELD];
            bytes[..chunk.len()].copy_from_slice(chunk);
            FF::from_be_bytes_mod_order(&bytes)
        })
        .collect()
}

/// Absorbs one packed field into the running hash.
fn absorb(running_hash: FF, packed: FF) -> FF {
    permutation([running_hash, packed, FF::from(0u64), FF::from(0u64)])[0]
}

/// Hash of a whole bytecode.
pub fn bytecode_hash(bytecode: &[u8]) -> FF {
    encode_bytecode(bytecode)
        .into_iter()
        .fold(FF::from(0u64), absorb)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BytecodeTraceEntry {
    pub packed: FF,
    /// Hash of the fields before this one.
    pub running_hash: FF,
    /// Number of fields from this one to the end.
    pub length_remaining: u32,
}

#[derive(Clone, Debug, Default)]
pub struct BytecodeTraceBuilder {
    bytecodes: Vec<Vec<u8>>,
    entries: Vec<BytecodeTraceEntry>,
}

impl BytecodeTraceBuilder {
    pub fn new(bytecodes: Vec<Vec<u8>>) -> Self {
        Self {
            bytecodes,
            entries: vec![],
        }
    }

    /// Adds the bytecode of one more contract.
    pub fn push_bytecode(&mut self, bytecode: Vec<u8>) {
        self.bytecodes.push(bytecode);
    }

    /// Number of rows the bytecode columns need.
    pub fn total_bytecode_length(&self) -> usize {
        self.bytecodes
            .iter()
            .map(|b| b.len().div_ceil(BYTECODE_BYTES_PER_FIELD))
            .sum()
    }

    pub fn entries(&self) -> &[BytecodeTraceEntry] {
        &self.entries
    }

    /// Builds the entries of every bytecode, one after the other.
    pub fn build_bytecode_columns(&mut self) {
        self.entries.clear();
        for bytecode in &self.bytecodes {
            let packed = encode_bytecode(bytecode);
            let mut running_hash = FF::from(0u64);
            for (i, field) in packed.iter().enumerate() {
                self.entries.push(BytecodeTraceEntry {
                    packed: *field,
                    running_hash,
                    length_remaining: (packed.len() - i) as u32,
                });
                running_hash = absorb(running_hash, *field);
            }
        }
    }

    pub fn finalize(&self, rows: &mut [Row<FF>]) {
        for (dest, entry) in rows.iter_mut().zip(&self.entries) {
            dest.bytecode_sel_bytecode = FF::from(1u64);
            dest.bytecode_packed = entry.packed;
            dest.bytecode_running_hash = entry.running_hash;
            dest.bytecode_length_remaining = FF::from(entry.length_remaining);
            dest.bytecode_end_latch = ff_bool(entry.length_remaining == 1);
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
