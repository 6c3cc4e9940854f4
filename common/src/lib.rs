//! Constants shared by the AVM trace generator and its consumers.
//!
//! The layout of the kernel public-input and public-output columns is fixed
//! here so that the trace builder and whatever checks the finalized table
//! agree on the meaning of every offset.

use static_assertions::const_assert;

/// Address space reserved for the internal call stack.
pub const INTERNAL_CALL_SPACE_ID: u8 = 255;

/// Memory address, in the current space, holding the base pointer used by
/// relative addressing.
pub const RELATIVE_BASE_ADDRESS: u32 = 0;

/// Program counter value marking a halted execution.
pub const HALTED_PC: u32 = u32::MAX;

/// Memory sub-clocks. Every memory access of one instruction happens at the
/// same clock; the sub-clock orders the accesses within it.
pub mod sub_clk {
    pub const IND_LOAD_A: u32 = 0;
    pub const IND_LOAD_B: u32 = 1;
    pub const IND_LOAD_C: u32 = 2;
    pub const IND_LOAD_D: u32 = 3;
    pub const LOAD_A: u32 = 4;
    pub const LOAD_B: u32 = 5;
    pub const LOAD_C: u32 = 6;
    pub const LOAD_D: u32 = 7;
    pub const STORE_A: u32 = 8;
    pub const STORE_B: u32 = 9;
    pub const STORE_C: u32 = 10;
    pub const STORE_D: u32 = 11;
    /// Number of sub-clocks per clock.
    pub const NUM_SUB_CLK: u32 = 12;
}

/// Offsets of the environment values inside the kernel public-input column.
pub mod kernel_inputs {
    pub const ADDRESS: usize = 0;
    pub const SENDER: usize = 1;
    pub const IS_STATIC_CALL: usize = 2;
    pub const CHAIN_ID: usize = 3;
    pub const VERSION: usize = 4;
    pub const BLOCK_NUMBER: usize = 5;
    pub const TIMESTAMP: usize = 6;
    pub const FEE_PER_DA_GAS: usize = 7;
    pub const FEE_PER_L2_GAS: usize = 8;
    pub const TRANSACTION_FEE: usize = 9;
    pub const DA_START_GAS: usize = 10;
    pub const L2_START_GAS: usize = 11;
    pub const DA_END_GAS: usize = 12;
    pub const L2_END_GAS: usize = 13;

    pub const KERNEL_INPUTS_LENGTH: usize = 14;
}

/// Per-kind limits of the kernel public-output column.
pub mod kernel_limits {
    pub const MAX_NOTE_HASH_READ_REQUESTS_PER_CALL: usize = 16;
    pub const MAX_NULLIFIER_READ_REQUESTS_PER_CALL: usize = 16;
    pub const MAX_NULLIFIER_NON_EXISTENT_READ_REQUESTS_PER_CALL: usize = 16;
    pub const MAX_L1_TO_L2_MSG_READ_REQUESTS_PER_CALL: usize = 16;
    pub const MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_CALL: usize = 32;
    pub const MAX_PUBLIC_DATA_READS_PER_CALL: usize = 32;
    pub const MAX_NOTE_HASHES_PER_CALL: usize = 16;
    pub const MAX_NULLIFIERS_PER_CALL: usize = 16;
    pub const MAX_L2_TO_L1_MSGS_PER_CALL: usize = 2;
    pub const MAX_UNENCRYPTED_LOGS_PER_CALL: usize = 4;
}

/// Start offsets of each kind inside the kernel public-output column. Each
/// kind owns the contiguous range `[START, START + MAX)`.
pub mod kernel_outputs {
    use super::kernel_limits::*;

    pub const START_NOTE_HASH_EXISTS_WRITE_OFFSET: usize = 0;
    pub const START_NULLIFIER_EXISTS_OFFSET: usize =
        START_NOTE_HASH_EXISTS_WRITE_OFFSET + MAX_NOTE_HASH_READ_REQUESTS_PER_CALL;
    pub const START_NULLIFIER_NON_EXISTS_OFFSET: usize =
        START_NULLIFIER_EXISTS_OFFSET + MAX_NULLIFIER_READ_REQUESTS_PER_CALL;
    pub const START_L1_TO_L2_MSG_EXISTS_WRITE_OFFSET: usize =
        START_NULLIFIER_NON_EXISTS_OFFSET + MAX_NULLIFIER_NON_EXISTENT_READ_REQUESTS_PER_CALL;
    pub const START_SSTORE_WRITE_OFFSET: usize =
        START_L1_TO_L2_MSG_EXISTS_WRITE_OFFSET + MAX_L1_TO_L2_MSG_READ_REQUESTS_PER_CALL;
    pub const START_SLOAD_WRITE_OFFSET: usize =
        START_SSTORE_WRITE_OFFSET + MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_CALL;
    pub const START_EMIT_NOTE_HASH_WRITE_OFFSET: usize =
        START_SLOAD_WRITE_OFFSET + MAX_PUBLIC_DATA_READS_PER_CALL;
    pub const START_EMIT_NULLIFIER_WRITE_OFFSET: usize =
        START_EMIT_NOTE_HASH_WRITE_OFFSET + MAX_NOTE_HASHES_PER_CALL;
    pub const START_EMIT_L2_TO_L1_MSG_WRITE_OFFSET: usize =
        START_EMIT_NULLIFIER_WRITE_OFFSET + MAX_NULLIFIERS_PER_CALL;
    pub const START_EMIT_UNENCRYPTED_LOG_WRITE_OFFSET: usize =
        START_EMIT_L2_TO_L1_MSG_WRITE_OFFSET + MAX_L2_TO_L1_MSGS_PER_CALL;

    pub const KERNEL_OUTPUTS_LENGTH: usize =
        START_EMIT_UNENCRYPTED_LOG_WRITE_OFFSET + MAX_UNENCRYPTED_LOGS_PER_CALL;
}

/// Number of `(a, b)` pairs in the byte-operation table, per operation.
pub const BYTE_TABLE_OPERATION_SIZE: usize = 1 << 16;

/// Number of byte lengths entries: one per integral memory tag.
pub const BYTE_LENGTHS_TABLE_SIZE: usize = 6;

/// Number of bytes packed into one field element of the bytecode column.
pub const BYTECODE_BYTES_PER_FIELD: usize = 31;

const_assert!(kernel_inputs::L2_END_GAS < kernel_inputs::KERNEL_INPUTS_LENGTH);
const_assert!(BYTECODE_BYTES_PER_FIELD * 8 < 254);

#[test]
fn test_kernel_output_ranges_are_disjoint() {
    use kernel_limits::*;
    use kernel_outputs::*;

    let ranges = [
        (START_NOTE_HASH_EXISTS_WRITE_OFFSET, MAX_NOTE_HASH_READ_REQUESTS_PER_CALL),
        (START_NULLIFIER_EXISTS_OFFSET, MAX_NULLIFIER_READ_REQUESTS_PER_CALL),
        (START_NULLIFIER_NON_EXISTS_OFFSET, MAX_NULLIFIER_NON_EXISTENT_READ_REQUESTS_PER_CALL),
        (START_L1_TO_L2_MSG_EXISTS_WRITE_OFFSET, MAX_L1_TO_L2_MSG_READ_REQUESTS_PER_CALL),
        (START_SSTORE_WRITE_OFFSET, MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_CALL),
        (START_SLOAD_WRITE_OFFSET, MAX_PUBLIC_DATA_READS_PER_CALL),
        (START_EMIT_NOTE_HASH_WRITE_OFFSET, MAX_NOTE_HASHES_PER_CALL),
        (START_EMIT_NULLIFIER_WRITE_OFFSET, MAX_NULLIFIERS_PER_CALL),
        (START_EMIT_L2_TO_L1_MSG_WRITE_OFFSET, MAX_L2_TO_L1_MSGS_PER_CALL),
        (START_EMIT_UNENCRYPTED_LOG_WRITE_OFFSET, MAX_UNENCRYPTED_LOGS_PER_CALL),
    ];
    for pair in ranges.windows(2) {
        let (start, len) = pair[0];
        assert_eq!(start + len, pair[1].0);
    }
    let (last_start, last_len) = ranges[ranges.len() - 1];
    assert_eq!(last_start + last_len, KERNEL_OUTPUTS_LENGTH);
}

#[test]
fn test_sub_clocks_are_ordered() {
    use sub_clk::*;

    let all = [
        IND_LOAD_A, IND_LOAD_B, IND_LOAD_C, IND_LOAD_D, LOAD_A, LOAD_B, LOAD_C, LOAD_D, STORE_A,
        STORE_B, STORE_C, STORE_D,
    ];
    for (i, clk) in all.iter().enumerate() {
        assert_eq!(*clk as usize, i);
    }
    assert_eq!(all.len() as u32, NUM_SUB_CLK);
}
