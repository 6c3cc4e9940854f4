//! Merges the sub-traces into the final table.
//!
//! Sub-trace entries are written by index into the rows of the execution
//! trace before the sentinel first row is inserted, so that they end up one
//! row below it like the execution rows. Fixed tables and lookup
//! multiplicities are written afterwards, starting at row 0.

use avm_common::kernel_inputs::KERNEL_INPUTS_LENGTH;
use avm_common::kernel_outputs::KERNEL_OUTPUTS_LENGTH;
use avm_common::{BYTE_TABLE_OPERATION_SIZE, INTERNAL_CALL_SPACE_ID};

use super::AvmTraceBuilder;
use crate::columns::Row;
use crate::gadgets::alu::{AluOp, AluTraceEntry};
use crate::gadgets::binary::{byte_table_row, BinaryOp};
use crate::gadgets::conversion::LimbOrder;
use crate::gadgets::ecc::EccOp;
use crate::gadgets::poseidon2;
use crate::memory::{MemoryTag, MemoryTraceEntry};
use crate::opcode::{OpCode, NUM_OPCODES};
use crate::range_check::{power_of_2, NUM_U16_LIMBS, POWERS_OF_2_TABLE_SIZE};
use crate::table::Table;
use crate::util::{ff_bool, ff_inverse_or_zero, ff_to_u64, FF};

const U8_TABLE_SIZE: usize = 1 << 8;
const U16_TABLE_SIZE: usize = 1 << 16;

fn one() -> FF {
    FF::from(1u64)
}

/// Sets the selector of the register and operation kind encoded by the
/// sub-clock of `entry`.
fn set_mem_op_selector(dest: &mut Row<FF>, entry: &MemoryTraceEntry) {
    let reg = entry.sub_clk % 4;
    let selector = match (entry.sub_clk / 4, entry.poseidon_mem_op, entry.sel_op_slice) {
        (0, _, _) => match reg {
            0 => &mut dest.mem_sel_resolve_ind_addr_a,
            1 => &mut dest.mem_sel_resolve_ind_addr_b,
            2 => &mut dest.mem_sel_resolve_ind_addr_c,
            _ => &mut dest.mem_sel_resolve_ind_addr_d,
        },
        (_, _, true) => &mut dest.mem_sel_op_slice,
        (1, true, _) => match reg {
            0 => &mut dest.mem_sel_op_poseidon_read_a,
            1 => &mut dest.mem_sel_op_poseidon_read_b,
            2 => &mut dest.mem_sel_op_poseidon_read_c,
            _ => &mut dest.mem_sel_op_poseidon_read_d,
        },
        (_, true, _) => match reg {
            0 => &mut dest.mem_sel_op_poseidon_write_a,
            1 => &mut dest.mem_sel_op_poseidon_write_b,
            2 => &mut dest.mem_sel_op_poseidon_write_c,
            _ => &mut dest.mem_sel_op_poseidon_write_d,
        },
        _ => match reg {
            0 => &mut dest.mem_sel_op_a,
            1 => &mut dest.mem_sel_op_b,
            2 => &mut dest.mem_sel_op_c,
            _ => &mut dest.mem_sel_op_d,
        },
    };
    *selector = one();
}

fn set_alu_row(dest: &mut Row<FF>, entry: &AluTraceEntry) {
    dest.alu_clk = FF::from(entry.clk);
    dest.alu_sel_alu = one();
    let op = match entry.op {
        AluOp::Add => &mut dest.alu_op_add,
        AluOp::Sub => &mut dest.alu_op_sub,
        AluOp::Mul => &mut dest.alu_op_mul,
        AluOp::Div => &mut dest.alu_op_div,
        AluOp::Eq => &mut dest.alu_op_eq,
        AluOp::Lt => &mut dest.alu_op_lt,
        AluOp::Lte => &mut dest.alu_op_lte,
        AluOp::Not => &mut dest.alu_op_not,
        AluOp::Shl => &mut dest.alu_op_shl,
        AluOp::Shr => &mut dest.alu_op_shr,
        AluOp::Cast => &mut dest.alu_op_cast,
    };
    *op = one();
    let tag = match entry.in_tag {
        MemoryTag::FF => &mut dest.alu_ff_tag,
        MemoryTag::U1 => &mut dest.alu_u1_tag,
        MemoryTag::U8 => &mut dest.alu_u8_tag,
        MemoryTag::U16 => &mut dest.alu_u16_tag,
        MemoryTag::U32 => &mut dest.alu_u32_tag,
        MemoryTag::U64 => &mut dest.alu_u64_tag,
        MemoryTag::U128 => &mut dest.alu_u128_tag,
    };
    *tag = one();
    dest.alu_in_tag = entry.in_tag.as_ff();
    dest.alu_ia = entry.ia;
    dest.alu_ib = entry.ib;
    dest.alu_ic = entry.ic;
    dest.alu_cf = ff_bool(entry.cf);
}

/// Commitment to a block of words, used for the wide SHA-256 and Keccak
/// columns.
fn pack_words<T: Copy + Into<u64>>(words: &[T]) -> FF {
    let fields: Vec<FF> = words.iter().map(|w| FF::from((*w).into())).collect();
    poseidon2::hash(&fields)
}

/// Largest key with a non-zero multiplicity.
fn largest_counted_key(counts: &[u32]) -> Option<usize> {
    counts.iter().rposition(|count| *count != 0)
}

impl AvmTraceBuilder {
    /// Merges every sub-trace into one padded table, fills the fixed tables
    /// and the lookup multiplicities, then resets the builder.
    pub fn finalize(&mut self) -> Table {
        let mut main_trace = core::mem::take(&mut self.main_trace);
        let mem_trace = self.mem.finalize();
        let alu_range_checks = self.alu.range_checks.clone();
        self.range_check.combine(&alu_range_checks);
        let range_check_trace = self.range_check.finalize();
        self.bytecode.build_bytecode_columns();

        let main_trace_size = main_trace.len() + 1;
        let range_check_size = if self.config.range_check_required {
            U16_TABLE_SIZE
        } else {
            0
        };
        let trace_size = [
            mem_trace.len(),
            main_trace_size,
            self.alu.len(),
            self.bin.len(),
            range_check_size,
            range_check_trace.len(),
            self.conversion.len(),
            self.sha256.len(),
            self.poseidon2.len(),
            self.keccak.len(),
            self.ecc.len(),
            self.gas.len() + 1,
            KERNEL_INPUTS_LENGTH,
            KERNEL_OUTPUTS_LENGTH,
            NUM_OPCODES,
            self.calldata.len(),
            self.returndata.len(),
            self.bytecode.entries().len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(main_trace_size);

        for row in main_trace.iter_mut() {
            row.main_sel_execution_row = one();
        }
        main_trace.push(Row {
            main_pc: FF::from(self.pc),
            main_sel_execution_end: one(),
            ..Default::default()
        });
        main_trace[0].main_sel_start_exec = one();
        main_trace.resize(trace_size, Row::default());

        // Memory trace, sorted by address then time.
        for (i, entry) in mem_trace.iter().enumerate() {
            let dest = &mut main_trace[i];
            dest.mem_sel_mem = one();
            dest.mem_clk = FF::from(entry.clk);
            dest.mem_tsp = FF::from(entry.tsp());
            dest.mem_addr = FF::from(entry.address.addr);
            dest.mem_glob_addr = FF::from(entry.address.global());
            dest.mem_space_id = FF::from(entry.address.space_id as u64);
            dest.mem_val = entry.val;
            dest.mem_tag = entry.tag.as_ff();
            dest.mem_r_in_tag = entry.r_in_tag.as_ff();
            dest.mem_w_in_tag = entry.w_in_tag.as_ff();
            dest.mem_rw = ff_bool(entry.is_write());
            dest.mem_tag_err = ff_bool(entry.tag_err);
            dest.mem_tag_diff_inv = entry.tag_diff_inv;
            dest.mem_sel_mov_ia_to_ic = ff_bool(entry.sel_mov_ia_to_ic);
            dest.incl_mem_tag_err_counts = ff_bool(entry.tag_err_count_relevant);
            set_mem_op_selector(dest, entry);

            match mem_trace.get(i + 1) {
                Some(next) => {
                    let same_address = next.address == entry.address;
                    let diff = if same_address {
                        next.tsp() - entry.tsp()
                    } else {
                        next.address.global() - entry.address.global()
                    };
                    let (r0, r1, r2) = self.mem.rng_chk_counts.add_diff(diff);
                    dest.mem_last_access = ff_bool(!same_address);
                    dest.mem_sel_rng_chk = one();
                    dest.mem_diff = FF::from(diff);
                    dest.mem_u16_r0 = FF::from(r0 as u64);
                    dest.mem_u16_r1 = FF::from(r1 as u64);
                    dest.mem_u8_r0 = FF::from(r2 as u64);
                }
                None => {
                    dest.mem_last_access = one();
                    dest.mem_last = one();
                }
            }
        }

        // Gadget traces, by index.
        for (dest, entry) in main_trace.iter_mut().zip(self.alu.entries()) {
            set_alu_row(dest, entry);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.bin.entries()) {
            dest.binary_clk = FF::from(entry.clk);
            dest.binary_sel_bin = one();
            dest.binary_op_id = FF::from(entry.op.id() as u64);
            dest.binary_in_tag = entry.in_tag.as_ff();
            dest.binary_acc_ia = FF::from(entry.acc_ia);
            dest.binary_acc_ib = FF::from(entry.acc_ib);
            dest.binary_acc_ic = FF::from(entry.acc_ic);
            dest.binary_ia_bytes = FF::from(entry.ia_byte as u64);
            dest.binary_ib_bytes = FF::from(entry.ib_byte as u64);
            dest.binary_ic_bytes = FF::from(entry.ic_byte as u64);
            dest.binary_mem_tag_ctr = FF::from(entry.mem_tag_ctr);
            dest.binary_mem_tag_ctr_inv = ff_inverse_or_zero(FF::from(entry.mem_tag_ctr));
            dest.binary_start = ff_bool(entry.start);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.conversion.entries()) {
            dest.conversion_clk = FF::from(entry.clk);
            dest.conversion_sel_to_radix = one();
            dest.conversion_input = entry.input;
            dest.conversion_radix = FF::from(entry.radix);
            dest.conversion_num_limbs = FF::from(entry.num_limbs);
            dest.conversion_output_bits = ff_bool(entry.output_bits);
            dest.conversion_big_endian = ff_bool(entry.order == LimbOrder::BigEndian);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.sha256.entries()) {
            dest.sha256_clk = FF::from(entry.clk);
            dest.sha256_sel_sha256_compression = one();
            dest.sha256_state = pack_words(&entry.state);
            dest.sha256_input = pack_words(&entry.input);
            dest.sha256_output = pack_words(&entry.output);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.poseidon2.entries()) {
            dest.poseidon2_clk = FF::from(entry.clk);
            dest.poseidon2_sel_poseidon_perm = one();
            dest.poseidon2_input_addr = FF::from(entry.input_addr);
            dest.poseidon2_output_addr = FF::from(entry.output_addr);
            let [a_0, a_1, a_2, a_3] = entry.input;
            let [b_0, b_1, b_2, b_3] = entry.output;
            (dest.poseidon2_a_0, dest.poseidon2_a_1) = (a_0, a_1);
            (dest.poseidon2_a_2, dest.poseidon2_a_3) = (a_2, a_3);
            (dest.poseidon2_b_0, dest.poseidon2_b_1) = (b_0, b_1);
            (dest.poseidon2_b_2, dest.poseidon2_b_3) = (b_2, b_3);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.keccak.entries()) {
            dest.keccakf1600_clk = FF::from(entry.clk);
            dest.keccakf1600_sel_keccakf1600 = one();
            dest.keccakf1600_input = pack_words(&entry.input);
            dest.keccakf1600_output = pack_words(&entry.output);
        }

        for (dest, entry) in main_trace.iter_mut().zip(self.ecc.entries()) {
            dest.ecc_clk = FF::from(entry.clk);
            match entry.op {
                EccOp::Add => dest.ecc_sel_ecc_add = one(),
                EccOp::Msm => dest.ecc_sel_msm = one(),
            }
            dest.ecc_p1_x = entry.p1.x;
            dest.ecc_p1_y = entry.p1.y;
            dest.ecc_p1_is_inf = ff_bool(entry.p1.is_infinity);
            dest.ecc_p2_x = entry.p2.x;
            dest.ecc_p2_y = entry.p2.y;
            dest.ecc_p2_is_inf = ff_bool(entry.p2.is_infinity);
            dest.ecc_r_x = entry.result.x;
            dest.ecc_r_y = entry.result.y;
            dest.ecc_r_is_inf = ff_bool(entry.result.is_infinity);
            dest.ecc_msm_size = FF::from(entry.msm_size);
        }

        for (dest, entry) in main_trace.iter_mut().zip(&range_check_trace) {
            dest.range_check_sel_rng_chk = one();
            dest.range_check_clk = FF::from(entry.clk);
            dest.range_check_value = FF::from(entry.value);
            dest.range_check_rng_chk_bits = FF::from(entry.num_bits);
            dest.range_check_dyn_rng_chk_bits = FF::from(entry.dyn_bits);
            [
                dest.range_check_u16_r0,
                dest.range_check_u16_r1,
                dest.range_check_u16_r2,
                dest.range_check_u16_r3,
                dest.range_check_u16_r4,
                dest.range_check_u16_r5,
                dest.range_check_u16_r6,
                dest.range_check_u16_r7,
            ] = entry.limbs.map(|limb| FF::from(limb as u64));
        }

        self.bytecode.finalize(&mut main_trace);
        self.gas.finalize(&mut main_trace);
        self.kernel.finalize(&mut main_trace);

        // Row 0 of every trace is the sentinel row.
        let (l2_gas, da_gas) = self.gas.initial_gas();
        main_trace.insert(
            0,
            Row {
                main_sel_first: one(),
                mem_last_access: one(),
                main_l2_gas_remaining: FF::from(l2_gas),
                main_da_gas_remaining: FF::from(da_gas),
                ..Default::default()
            },
        );

        if !self.bin.is_empty() || self.config.full_precomputed_tables {
            self.fill_byte_tables(&mut main_trace);
        }

        if !self.config.range_check_required {
            let u16_keys = [
                largest_counted_key(&self.mem.rng_chk_counts.u16_r0),
                largest_counted_key(&self.mem.rng_chk_counts.u16_r1),
            ]
            .into_iter()
            .chain(self.range_check.u16_counts.iter().map(|c| largest_counted_key(c)))
            .chain(
                self.gas
                    .rem_gas_rng_check_counts
                    .iter()
                    .map(|counts| counts.keys().max().map(|k| *k as usize)),
            );
            let u8_keys = [
                largest_counted_key(&self.mem.rng_chk_counts.u8_r0),
                largest_counted_key(&self.range_check.powers_of_2_counts),
                largest_counted_key(&self.alu.pow_2_counts[0]),
                largest_counted_key(&self.alu.pow_2_counts[1]),
            ];
            let required = u16_keys
                .chain(u8_keys)
                .flatten()
                .max()
                .map_or(0, |key| key + 1);
            if required > main_trace.len() {
                main_trace.resize(required, Row::default());
            }
        }

        for (clk, count) in &self.mem.tag_err_lookup_counts {
            if let Some(dest) = main_trace.get_mut(*clk as usize) {
                dest.main_tag_err = one();
                dest.incl_main_tag_err_counts = FF::from(*count);
            }
        }

        let zero = FF::from(0u64);
        for (i, dest) in main_trace.iter_mut().enumerate() {
            if dest.main_tag_err == one() {
                dest.main_op_err = one();
            }
            if dest.main_sel_execution_row == one() {
                let opcode = OpCode::ALL.get(ff_to_u64(dest.main_opcode_val) as usize);
                if dest.main_op_err == zero && opcode.is_some_and(|op| op.is_alu()) {
                    dest.main_sel_alu = one();
                }
                dest.main_space_id = if dest.main_sel_op_internal_call == one()
                    || dest.main_sel_op_internal_return == one()
                {
                    FF::from(INTERNAL_CALL_SPACE_ID as u64)
                } else {
                    dest.main_call_ptr
                };
            }
            dest.main_clk = FF::from(i as u64);

            if i < U8_TABLE_SIZE {
                dest.main_sel_rng_8 = one();
                dest.lookup_mem_rng_chk_2_counts = FF::from(self.mem.rng_chk_counts.u8_r0[i]);
                dest.lookup_pow_2_0_counts = FF::from(self.alu.pow_2_counts[0][i]);
                dest.lookup_pow_2_1_counts = FF::from(self.alu.pow_2_counts[1][i]);
            }
            if i < POWERS_OF_2_TABLE_SIZE {
                dest.powers_power_of_2 = power_of_2(i);
                dest.lookup_rng_chk_pow_2_counts = FF::from(self.range_check.powers_of_2_counts[i]);
            }
            if i < U16_TABLE_SIZE {
                let key = i as u16;
                let gas_count = |k: usize| {
                    FF::from(
                        self.gas.rem_gas_rng_check_counts[k]
                            .get(&key)
                            .copied()
                            .unwrap_or(0),
                    )
                };
                dest.main_sel_rng_16 = one();
                dest.lookup_mem_rng_chk_0_counts = FF::from(self.mem.rng_chk_counts.u16_r0[i]);
                dest.lookup_mem_rng_chk_1_counts = FF::from(self.mem.rng_chk_counts.u16_r1[i]);
                dest.lookup_l2_gas_rng_chk_0_counts = gas_count(0);
                dest.lookup_l2_gas_rng_chk_1_counts = gas_count(1);
                dest.lookup_da_gas_rng_chk_0_counts = gas_count(2);
                dest.lookup_da_gas_rng_chk_1_counts = gas_count(3);
                let counts = &self.range_check.u16_counts;
                [
                    dest.lookup_rng_chk_0_counts,
                    dest.lookup_rng_chk_1_counts,
                    dest.lookup_rng_chk_2_counts,
                    dest.lookup_rng_chk_3_counts,
                    dest.lookup_rng_chk_4_counts,
                    dest.lookup_rng_chk_5_counts,
                    dest.lookup_rng_chk_6_counts,
                    dest.lookup_rng_chk_7_counts,
                ] = core::array::from_fn::<FF, NUM_U16_LIMBS, _>(|k| FF::from(counts[k][i]));
            }
        }

        for (i, (dest, value)) in main_trace.iter_mut().zip(&self.calldata).enumerate() {
            dest.main_calldata = *value;
            dest.main_sel_calldata = one();
            dest.lookup_cd_value_counts =
                FF::from(self.calldata_lookup_counts.get(&i).copied().unwrap_or(0));
        }
        for (i, (dest, value)) in main_trace.iter_mut().zip(&self.returndata).enumerate() {
            dest.main_returndata = *value;
            dest.main_sel_returndata = one();
            dest.lookup_ret_value_counts =
                FF::from(self.returndata_lookup_counts.get(&i).copied().unwrap_or(0));
        }

        self.kernel.finalize_columns(&mut main_trace);
        self.gas.finalize_lookups(&mut main_trace);

        log::info!(
            "finalized trace: {} rows (execution {}, memory {}, alu {}, binary {}, gas {}, \
             range checks {})",
            main_trace.len(),
            main_trace_size,
            mem_trace.len(),
            self.alu.len(),
            self.bin.len(),
            self.gas.len(),
            range_check_trace.len(),
        );

        self.reset();
        Table::new(main_trace)
    }

    /// Byte-operation table, sized to the largest used row unless the full
    /// table is requested, and the byte-lengths table.
    fn fill_byte_tables(&self, main_trace: &mut Vec<Row<FF>>) {
        let size = if self.config.full_precomputed_tables {
            BinaryOp::ALL.len() * BYTE_TABLE_OPERATION_SIZE
        } else {
            self.bin
                .byte_operation_counter
                .keys()
                .max()
                .map_or(0, |index| index + 1)
        };
        if size > main_trace.len() {
            main_trace.resize(size, Row::default());
        }

        for (i, dest) in main_trace.iter_mut().enumerate().take(size) {
            let Some((op, a, b)) = byte_table_row(i) else {
                continue;
            };
            dest.byte_lookup_sel_bin = one();
            dest.byte_lookup_table_op_id = FF::from(op.id() as u64);
            dest.byte_lookup_table_input_a = FF::from(a as u64);
            dest.byte_lookup_table_input_b = FF::from(b as u64);
            dest.byte_lookup_table_output = FF::from(op.result(a, b) as u64);
            dest.lookup_byte_operations_counts = FF::from(
                self.bin
                    .byte_operation_counter
                    .get(&i)
                    .copied()
                    .unwrap_or(0),
            );
        }

        let integral_tags = MemoryTag::ALL.into_iter().filter(|tag| tag.is_integral());
        for (dest, tag) in main_trace.iter_mut().zip(integral_tags) {
            dest.byte_lookup_table_in_tags = tag.as_ff();
            dest.byte_lookup_table_byte_lengths = FF::from(tag.num_bytes() as u64);
            dest.lookup_byte_lengths_counts = FF::from(
                self.bin
                    .byte_length_counter
                    .get(&tag)
                    .copied()
                    .unwrap_or(0),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use avm_common::sub_clk::NUM_SUB_CLK;

    use super::*;
    use crate::config::TraceConfig;
    use crate::hints::ExecutionHints;
    use crate::instruction::{ArithmeticOp, BitwiseOp, Instruction};
    use crate::testing_utils::{test_public_inputs, TEST_GAS_LIMIT};

    fn builder(config: TraceConfig) -> AvmTraceBuilder {
        let _ = pretty_env_logger::try_init();
        AvmTraceBuilder::new(test_public_inputs(), vec![], ExecutionHints::default(), config)
    }

    #[test]
    fn sentinel_and_end_rows() {
        let mut trace = builder(TraceConfig::testing());
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(3u64), 1))
            .unwrap();
        let table = trace.finalize();
        let rows = table.rows();

        assert_eq!(rows[0].main_sel_first, one());
        assert_eq!(rows[0].mem_last_access, one());
        assert_eq!(rows[1].main_sel_start_exec, one());
        assert_eq!(rows[1].main_sel_execution_row, one());
        assert_eq!(rows[1].main_clk, one());
        assert_eq!(rows[2].main_sel_execution_end, one());
        assert!(rows.len() >= KERNEL_OUTPUTS_LENGTH.max(NUM_OPCODES) + 1);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.main_clk, FF::from(i as u64));
        }
    }

    #[test]
    fn memory_rows_are_sorted_with_deltas() {
        let mut trace = builder(TraceConfig::testing());
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(3u64), 5))
            .unwrap();
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(4u64), 2))
            .unwrap();
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(9u64), 5))
            .unwrap();
        let table = trace.finalize();
        let mem: Vec<&Row<FF>> = table
            .rows()
            .iter()
            .filter(|row| row.mem_sel_mem == one())
            .collect();

        assert_eq!(mem.len(), 3);
        assert_eq!(mem[0].mem_addr, FF::from(2u64));
        assert_eq!(mem[0].mem_last_access, one());
        assert_eq!(mem[0].mem_diff, FF::from(3u64));
        // Both writes to address 5, one instruction apart.
        assert_eq!(mem[1].mem_last_access, FF::from(0u64));
        assert_eq!(mem[1].mem_diff, FF::from(2 * NUM_SUB_CLK as u64));
        assert_eq!(mem[2].mem_last, one());
        assert_eq!(mem[2].mem_sel_op_c, one());
    }

    #[test]
    fn without_range_checks_the_table_covers_counted_keys() {
        let mut trace = builder(TraceConfig::testing());
        let table = trace.finalize();
        assert!(table.len() < U16_TABLE_SIZE);
        assert_eq!(table.len(), KERNEL_OUTPUTS_LENGTH.max(NUM_OPCODES) + 1);

        // Remaining gas below 2^16 is counted in the u16 table at its own
        // value, so the table must reach it.
        let mut trace = builder(TraceConfig::testing());
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(1u64), 0))
            .unwrap();
        let table = trace.finalize();
        let l2_gas = TEST_GAS_LIMIT - OpCode::Set.gas_cost().base_l2;
        let low_limb = (l2_gas & 0xffff) as usize;
        assert!(table.len() > low_limb);
        assert_eq!(table.rows()[low_limb].lookup_l2_gas_rng_chk_0_counts, one());
    }

    #[test]
    fn byte_tables_only_when_used() {
        let mut trace = builder(TraceConfig::testing());
        let table = trace.finalize();
        assert!(table.rows().iter().all(|row| row.byte_lookup_sel_bin == FF::from(0u64)));

        let mut trace = builder(TraceConfig::testing());
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(0xf0u64), 0))
            .unwrap();
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(0x0fu64), 1))
            .unwrap();
        trace
            .execute(&Instruction::bitwise(BitwiseOp::And, 0, 1, 2))
            .unwrap();
        let table = trace.finalize();
        let index = crate::gadgets::binary::byte_table_index(BinaryOp::And, 0xf0, 0x0f);
        assert_eq!(table.rows()[index].lookup_byte_operations_counts, one());
        assert_eq!(table.rows()[index].byte_lookup_table_output, FF::from(0u64));
    }

    #[test]
    fn tag_errors_raise_op_err() {
        let mut trace = builder(TraceConfig::testing());
        trace
            .execute(&Instruction::set(MemoryTag::U8, FF::from(1u64), 0))
            .unwrap();
        trace
            .execute(&Instruction::set(MemoryTag::U16, FF::from(1u64), 1))
            .unwrap();
        trace
            .execute(&Instruction::arithmetic(ArithmeticOp::Add, 0, 1, 2))
            .unwrap();
        let table = trace.finalize();
        let add = &table.rows()[3];
        assert_eq!(add.main_sel_op_add, one());
        assert_eq!(add.main_tag_err, one());
        assert_eq!(add.main_op_err, one());
        assert_eq!(add.main_sel_alu, FF::from(0u64));
    }
}
