//! The canonical row of the finalized table.
//!
//! Every sub-trace shares the same rows: row `i` carries the `i`-th entry of
//! each sub-trace, and the execution columns of row `clk` describe the
//! instruction executed at that clock. Column names are the field names, in
//! declaration order.

use avm_proc_macro::Columns;
use static_assertions::const_assert_eq;

#[repr(C)]
#[derive(Columns, Clone, Copy, Debug, Eq, PartialEq)]
pub struct Row<T> {
    // Execution row bookkeeping.
    pub main_clk: T,
    pub main_sel_first: T,
    pub main_sel_start_exec: T,
    pub main_sel_execution_row: T,
    pub main_sel_execution_end: T,
    pub main_pc: T,
    pub main_call_ptr: T,
    pub main_space_id: T,
    pub main_internal_return_ptr: T,

    // Intermediate registers and their memory operations.
    pub main_ia: T,
    pub main_ib: T,
    pub main_ic: T,
    pub main_id: T,
    pub main_inv: T,
    pub main_id_zero: T,
    pub main_mem_addr_a: T,
    pub main_mem_addr_b: T,
    pub main_mem_addr_c: T,
    pub main_mem_addr_d: T,
    pub main_ind_addr_a: T,
    pub main_ind_addr_b: T,
    pub main_ind_addr_c: T,
    pub main_ind_addr_d: T,
    pub main_sel_mem_op_a: T,
    pub main_sel_mem_op_b: T,
    pub main_sel_mem_op_c: T,
    pub main_sel_mem_op_d: T,
    pub main_sel_resolve_ind_addr_a: T,
    pub main_sel_resolve_ind_addr_b: T,
    pub main_sel_resolve_ind_addr_c: T,
    pub main_sel_resolve_ind_addr_d: T,
    pub main_rwa: T,
    pub main_rwb: T,
    pub main_rwc: T,
    pub main_rwd: T,
    pub main_r_in_tag: T,
    pub main_w_in_tag: T,
    pub main_alu_in_tag: T,
    pub main_op_err: T,
    pub main_tag_err: T,
    pub main_sel_alu: T,
    pub main_sel_bin: T,
    pub main_bin_op_id: T,
    pub main_sel_mov_ia_to_ic: T,

    // Gas accounting.
    pub main_opcode_val: T,
    pub main_base_l2_gas_op_cost: T,
    pub main_base_da_gas_op_cost: T,
    pub main_dyn_l2_gas_op_cost: T,
    pub main_dyn_da_gas_op_cost: T,
    pub main_dyn_gas_multiplier: T,
    pub main_l2_gas_remaining: T,
    pub main_da_gas_remaining: T,
    pub main_is_gas_accounted: T,
    pub main_l2_out_of_gas: T,
    pub main_da_out_of_gas: T,
    pub main_abs_l2_rem_gas: T,
    pub main_abs_da_rem_gas: T,
    pub main_l2_gas_u16_r0: T,
    pub main_l2_gas_u16_r1: T,
    pub main_da_gas_u16_r0: T,
    pub main_da_gas_u16_r1: T,

    // Opcode selectors.
    pub main_sel_op_add: T,
    pub main_sel_op_sub: T,
    pub main_sel_op_mul: T,
    pub main_sel_op_div: T,
    pub main_sel_op_fdiv: T,
    pub main_sel_op_eq: T,
    pub main_sel_op_lt: T,
    pub main_sel_op_lte: T,
    pub main_sel_op_and: T,
    pub main_sel_op_or: T,
    pub main_sel_op_xor: T,
    pub main_sel_op_not: T,
    pub main_sel_op_shl: T,
    pub main_sel_op_shr: T,
    pub main_sel_op_cast: T,
    pub main_sel_op_address: T,
    pub main_sel_op_sender: T,
    pub main_sel_op_transaction_fee: T,
    pub main_sel_op_chain_id: T,
    pub main_sel_op_version: T,
    pub main_sel_op_block_number: T,
    pub main_sel_op_timestamp: T,
    pub main_sel_op_fee_per_l2_gas: T,
    pub main_sel_op_fee_per_da_gas: T,
    pub main_sel_op_is_static_call: T,
    pub main_sel_op_l2gasleft: T,
    pub main_sel_op_dagasleft: T,
    pub main_sel_op_calldata_copy: T,
    pub main_sel_op_returndata_size: T,
    pub main_sel_op_returndata_copy: T,
    pub main_sel_op_jump: T,
    pub main_sel_op_jumpi: T,
    pub main_sel_op_internal_call: T,
    pub main_sel_op_internal_return: T,
    pub main_sel_op_set: T,
    pub main_sel_op_mov: T,
    pub main_sel_op_sload: T,
    pub main_sel_op_sstore: T,
    pub main_sel_op_note_hash_exists: T,
    pub main_sel_op_emit_note_hash: T,
    pub main_sel_op_nullifier_exists: T,
    pub main_sel_op_emit_nullifier: T,
    pub main_sel_op_l1_to_l2_msg_exists: T,
    pub main_sel_op_get_contract_instance: T,
    pub main_sel_op_emit_unencrypted_log: T,
    pub main_sel_op_emit_l2_to_l1_msg: T,
    pub main_sel_op_external_call: T,
    pub main_sel_op_static_call: T,
    pub main_sel_op_external_return: T,
    pub main_sel_op_external_revert: T,
    pub main_sel_op_debug_log: T,
    pub main_sel_op_poseidon2: T,
    pub main_sel_op_sha256: T,
    pub main_sel_op_keccak: T,
    pub main_sel_op_ecadd: T,
    pub main_sel_op_msm: T,
    pub main_sel_op_radix_le: T,
    pub main_sel_op_radix_be: T,

    // Kernel lookups and public columns.
    pub main_sel_q_kernel_lookup: T,
    pub main_sel_q_kernel_output_lookup: T,
    pub main_kernel_in_offset: T,
    pub main_kernel_out_offset: T,
    pub main_side_effect_counter: T,
    pub main_kernel_inputs: T,
    pub main_sel_kernel_inputs: T,
    pub main_kernel_value_out: T,
    pub main_kernel_side_effect_out: T,
    pub main_kernel_metadata_out: T,
    pub main_sel_kernel_out: T,

    // Calldata, returndata and range-check table selectors.
    pub main_calldata: T,
    pub main_sel_calldata: T,
    pub main_returndata: T,
    pub main_sel_returndata: T,
    pub main_sel_rng_8: T,
    pub main_sel_rng_16: T,

    // Memory trace.
    pub mem_sel_mem: T,
    pub mem_clk: T,
    pub mem_tsp: T,
    pub mem_addr: T,
    pub mem_glob_addr: T,
    pub mem_space_id: T,
    pub mem_val: T,
    pub mem_tag: T,
    pub mem_r_in_tag: T,
    pub mem_w_in_tag: T,
    pub mem_rw: T,
    pub mem_tag_err: T,
    pub mem_tag_diff_inv: T,
    pub mem_sel_op_a: T,
    pub mem_sel_op_b: T,
    pub mem_sel_op_c: T,
    pub mem_sel_op_d: T,
    pub mem_sel_op_poseidon_read_a: T,
    pub mem_sel_op_poseidon_read_b: T,
    pub mem_sel_op_poseidon_read_c: T,
    pub mem_sel_op_poseidon_read_d: T,
    pub mem_sel_op_poseidon_write_a: T,
    pub mem_sel_op_poseidon_write_b: T,
    pub mem_sel_op_poseidon_write_c: T,
    pub mem_sel_op_poseidon_write_d: T,
    pub mem_sel_resolve_ind_addr_a: T,
    pub mem_sel_resolve_ind_addr_b: T,
    pub mem_sel_resolve_ind_addr_c: T,
    pub mem_sel_resolve_ind_addr_d: T,
    pub mem_sel_mov_ia_to_ic: T,
    pub mem_sel_op_slice: T,
    pub mem_last_access: T,
    pub mem_last: T,
    pub mem_sel_rng_chk: T,
    pub mem_diff: T,
    pub mem_u16_r0: T,
    pub mem_u16_r1: T,
    pub mem_u8_r0: T,

    // ALU trace.
    pub alu_clk: T,
    pub alu_sel_alu: T,
    pub alu_op_add: T,
    pub alu_op_sub: T,
    pub alu_op_mul: T,
    pub alu_op_div: T,
    pub alu_op_eq: T,
    pub alu_op_lt: T,
    pub alu_op_lte: T,
    pub alu_op_not: T,
    pub alu_op_shl: T,
    pub alu_op_shr: T,
    pub alu_op_cast: T,
    pub alu_ff_tag: T,
    pub alu_u1_tag: T,
    pub alu_u8_tag: T,
    pub alu_u16_tag: T,
    pub alu_u32_tag: T,
    pub alu_u64_tag: T,
    pub alu_u128_tag: T,
    pub alu_in_tag: T,
    pub alu_ia: T,
    pub alu_ib: T,
    pub alu_ic: T,
    pub alu_cf: T,

    // Binary trace and fixed byte tables.
    pub binary_clk: T,
    pub binary_sel_bin: T,
    pub binary_op_id: T,
    pub binary_in_tag: T,
    pub binary_acc_ia: T,
    pub binary_acc_ib: T,
    pub binary_acc_ic: T,
    pub binary_ia_bytes: T,
    pub binary_ib_bytes: T,
    pub binary_ic_bytes: T,
    pub binary_mem_tag_ctr: T,
    pub binary_mem_tag_ctr_inv: T,
    pub binary_start: T,
    pub byte_lookup_sel_bin: T,
    pub byte_lookup_table_op_id: T,
    pub byte_lookup_table_input_a: T,
    pub byte_lookup_table_input_b: T,
    pub byte_lookup_table_output: T,
    pub byte_lookup_table_in_tags: T,
    pub byte_lookup_table_byte_lengths: T,

    // Fixed powers-of-two table.
    pub powers_power_of_2: T,

    // Radix conversion trace.
    pub conversion_clk: T,
    pub conversion_sel_to_radix: T,
    pub conversion_input: T,
    pub conversion_radix: T,
    pub conversion_num_limbs: T,
    pub conversion_output_bits: T,
    pub conversion_big_endian: T,

    // SHA-256 compression trace.
    pub sha256_clk: T,
    pub sha256_sel_sha256_compression: T,
    pub sha256_state: T,
    pub sha256_input: T,
    pub sha256_output: T,

    // Poseidon2 permutation trace.
    pub poseidon2_clk: T,
    pub poseidon2_sel_poseidon_perm: T,
    pub poseidon2_input_addr: T,
    pub poseidon2_output_addr: T,
    pub poseidon2_a_0: T,
    pub poseidon2_a_1: T,
    pub poseidon2_a_2: T,
    pub poseidon2_a_3: T,
    pub poseidon2_b_0: T,
    pub poseidon2_b_1: T,
    pub poseidon2_b_2: T,
    pub poseidon2_b_3: T,

    // Keccak-f[1600] trace.
    pub keccakf1600_clk: T,
    pub keccakf1600_sel_keccakf1600: T,
    pub keccakf1600_input: T,
    pub keccakf1600_output: T,

    // Embedded curve trace.
    pub ecc_clk: T,
    pub ecc_sel_ecc_add: T,
    pub ecc_sel_msm: T,
    pub ecc_p1_x: T,
    pub ecc_p1_y: T,
    pub ecc_p1_is_inf: T,
    pub ecc_p2_x: T,
    pub ecc_p2_y: T,
    pub ecc_p2_is_inf: T,
    pub ecc_r_x: T,
    pub ecc_r_y: T,
    pub ecc_r_is_inf: T,
    pub ecc_msm_size: T,

    // Fixed gas-cost table, one row per opcode.
    pub gas_sel_gas_cost: T,
    pub gas_base_l2_gas_fixed_table: T,
    pub gas_base_da_gas_fixed_table: T,
    pub gas_dyn_l2_gas_fixed_table: T,
    pub gas_dyn_da_gas_fixed_table: T,

    // Range-check trace.
    pub range_check_sel_rng_chk: T,
    pub range_check_clk: T,
    pub range_check_value: T,
    pub range_check_rng_chk_bits: T,
    pub range_check_dyn_rng_chk_bits: T,
    pub range_check_u16_r0: T,
    pub range_check_u16_r1: T,
    pub range_check_u16_r2: T,
    pub range_check_u16_r3: T,
    pub range_check_u16_r4: T,
    pub range_check_u16_r5: T,
    pub range_check_u16_r6: T,
    pub range_check_u16_r7: T,

    // Bytecode hashing trace.
    pub bytecode_sel_bytecode: T,
    pub bytecode_packed: T,
    pub bytecode_running_hash: T,
    pub bytecode_length_remaining: T,
    pub bytecode_end_latch: T,

    // Lookup multiplicities.
    pub incl_main_tag_err_counts: T,
    pub incl_mem_tag_err_counts: T,
    pub lookup_cd_value_counts: T,
    pub lookup_ret_value_counts: T,
    pub lookup_byte_operations_counts: T,
    pub lookup_byte_lengths_counts: T,
    pub lookup_opcode_gas_counts: T,
    pub lookup_into_kernel_counts: T,
    pub kernel_output_lookup_counts: T,
    pub lookup_pow_2_0_counts: T,
    pub lookup_pow_2_1_counts: T,
    pub lookup_rng_chk_pow_2_counts: T,
    pub lookup_mem_rng_chk_0_counts: T,
    pub lookup_mem_rng_chk_1_counts: T,
    pub lookup_mem_rng_chk_2_counts: T,
    pub lookup_rng_chk_0_counts: T,
    pub lookup_rng_chk_1_counts: T,
    pub lookup_rng_chk_2_counts: T,
    pub lookup_rng_chk_3_counts: T,
    pub lookup_rng_chk_4_counts: T,
    pub lookup_rng_chk_5_counts: T,
    pub lookup_rng_chk_6_counts: T,
    pub lookup_rng_chk_7_counts: T,
    pub lookup_l2_gas_rng_chk_0_counts: T,
    pub lookup_l2_gas_rng_chk_1_counts: T,
    pub lookup_da_gas_rng_chk_0_counts: T,
    pub lookup_da_gas_rng_chk_1_counts: T,
}

/// Number of columns of the table.
pub const NUM_COLUMNS: usize = Row::<u8>::NUM_COLUMNS;

const_assert_eq!(NUM_COLUMNS, core::mem::size_of::<Row<u8>>());

impl<T> Row<T> {
    /// Position of the column called `name`.
    pub fn column_index(name: &str) -> Option<usize> {
        Self::COLUMN_NAMES.iter().position(|n| *n == name)
    }
}

#[cfg(test)]
mod tests {
    use core::borrow::Borrow;

    use super::*;
    use crate::util::FF;

    #[test]
    fn names_follow_declaration_order() {
        assert_eq!(Row::<FF>::COLUMN_NAMES[0], "main_clk");
        assert_eq!(Row::<FF>::column_index("main_pc"), Some(5));
        assert_eq!(Row::<FF>::column_index("no_such_column"), None);
    }

    #[test]
    fn array_view_aliases_fields() {
        let mut row = Row::<FF>::default();
        row.main_pc = FF::from(7u64);
        let view: &[FF; NUM_COLUMNS] = row.borrow();
        let index = Row::<FF>::column_index("main_pc").unwrap();
        assert_eq!(view[index], FF::from(7u64));
        assert_eq!(row[index], FF::from(7u64));
    }
}
