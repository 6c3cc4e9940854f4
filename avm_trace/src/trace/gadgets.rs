//! Handlers of the hash, curve and conversion gadgets.
//!
//! Operand tags are checked before any logged access. On a tag error the
//! gadget is skipped and its output range is filled with zeros of the output
//! tag.

use super::{set_register, AvmTraceBuilder};
use crate::errors::{AvmError, ExecutionError};
use crate::gadgets::conversion::{is_valid_radix, LimbOrder};
use crate::gadgets::ecc::{scalar_from_limbs, AffinePoint};
use crate::gadgets::keccak::KECCAK_STATE_SIZE;
use crate::gadgets::poseidon2::WIDTH as POSEIDON2_WIDTH;
use crate::memory::{IntermRegister, MemoryTag};
use crate::opcode::OpCode;
use crate::util::{ff_to_u32, ff_to_u64, FF};

const SHA256_STATE_SIZE: u32 = 8;
const SHA256_INPUT_SIZE: u32 = 16;

impl AvmTraceBuilder {
    /// Values of `len` consecutive cells, through logged slice reads.
    fn read_values(&mut self, clk: u32, addr: u32, len: u32) -> Vec<FF> {
        self.mem
            .read_slice(self.call_ptr, clk, addr, len)
            .into_iter()
            .map(|read| read.val)
            .collect()
    }

    /// True if an `(x, y, is_infinity)` triple with the expected tags starts
    /// at `addr`.
    fn is_point_at(&self, addr: u32) -> bool {
        self.check_tag_range(addr, 2, MemoryTag::FF)
            && self.check_tag(addr.wrapping_add(2), MemoryTag::U1)
    }

    fn write_point(&mut self, clk: u32, addr: u32, point: AffinePoint) {
        self.mem
            .write_slice(self.call_ptr, clk, addr, MemoryTag::FF, &[point.x, point.y]);
        self.mem.write_slice(
            self.call_ptr,
            clk,
            addr.wrapping_add(2),
            MemoryTag::U1,
            &[FF::from(point.is_infinity as u64)],
        );
    }

    pub(super) fn op_poseidon2_permutation(
        &mut self,
        indirect: u8,
        input_offset: u32,
        output_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Poseidon2Perm);

        let ([input_addr, output_addr], mut error) =
            self.resolve(indirect.into(), [input_offset, output_offset], clk);
        let width = POSEIDON2_WIDTH as u32;
        if error.is_ok() && !self.check_tag_range(input_addr.direct, width, MemoryTag::FF) {
            error = AvmError::TagError;
        }

        if error.is_ok() {
            let mut input = [FF::from(0u64); POSEIDON2_WIDTH];
            for (i, value) in input.iter_mut().enumerate() {
                let reg = IntermRegister::from_index(i).unwrap_or(IntermRegister::Ia);
                let addr = input_addr.direct.wrapping_add(i as u32);
                *value = self.mem.poseidon_read(self.call_ptr, clk, reg, addr).val;
            }
            let output = self.poseidon2.poseidon2_permutation(
                input,
                input_addr.direct,
                output_addr.direct,
                clk,
            );
            for (i, value) in output.iter().enumerate() {
                let reg = IntermRegister::from_index(i).unwrap_or(IntermRegister::Ia);
                let addr = output_addr.direct.wrapping_add(i as u32);
                self.mem.poseidon_write(self.call_ptr, clk, reg, addr, *value);
            }
        } else {
            self.write_zeros(clk, output_addr.direct, MemoryTag::FF, POSEIDON2_WIDTH as u32);
        }

        row.main_mem_addr_a = FF::from(input_addr.direct);
        row.main_mem_addr_b = FF::from(output_addr.direct);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, OpCode::Poseidon2Perm, error, 0)
    }

    pub(super) fn op_sha256_compression(
        &mut self,
        indirect: u8,
        output_offset: u32,
        state_offset: u32,
        input_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Sha256Compression);

        let ([output_addr, state_addr, input_addr], mut error) =
            self.resolve(indirect.into(), [output_offset, state_offset, input_offset], clk);
        if error.is_ok()
            && !(self.check_tag_range(state_addr.direct, SHA256_STATE_SIZE, MemoryTag::U32)
                && self.check_tag_range(input_addr.direct, SHA256_INPUT_SIZE, MemoryTag::U32))
        {
            error = AvmError::TagError;
        }

        if error.is_ok() {
            let mut state = [0u32; SHA256_STATE_SIZE as usize];
            for (word, value) in state
                .iter_mut()
                .zip(self.read_values(clk, state_addr.direct, SHA256_STATE_SIZE))
            {
                *word = ff_to_u32(value);
            }
            let mut input = [0u32; SHA256_INPUT_SIZE as usize];
            for (word, value) in input
                .iter_mut()
                .zip(self.read_values(clk, input_addr.direct, SHA256_INPUT_SIZE))
            {
                *word = ff_to_u32(value);
            }
            let output = self.sha256.sha256_compression(state, input, clk);
            let output: Vec<FF> = output.iter().map(|word| FF::from(*word)).collect();
            self.mem
                .write_slice(self.call_ptr, clk, output_addr.direct, MemoryTag::U32, &output);
        } else {
            self.write_zeros(clk, output_addr.direct, MemoryTag::U32, SHA256_STATE_SIZE);
        }

        row.main_mem_addr_a = FF::from(output_addr.direct);
        row.main_mem_addr_b = FF::from(state_addr.direct);
        row.main_mem_addr_c = FF::from(input_addr.direct);
        row.main_r_in_tag = MemoryTag::U32.as_ff();
        row.main_w_in_tag = MemoryTag::U32.as_ff();

        self.finish(row, OpCode::Sha256Compression, error, 0)
    }

    pub(super) fn op_keccakf1600(
        &mut self,
        indirect: u8,
        output_offset: u32,
        input_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::KeccakF1600);
        let size = KECCAK_STATE_SIZE as u32;

        let ([output_addr, input_addr], mut error) =
            self.resolve(indirect.into(), [output_offset, input_offset], clk);
        if error.is_ok() && !self.check_tag_range(input_addr.direct, size, MemoryTag::U64) {
            error = AvmError::TagError;
        }

        if error.is_ok() {
            let mut input = [0u64; KECCAK_STATE_SIZE];
            for (lane, value) in input
                .iter_mut()
                .zip(self.read_values(clk, input_addr.direct, size))
            {
                *lane = ff_to_u64(value);
            }
            let output = self.keccak.keccakf1600(input, clk);
            let output: Vec<FF> = output.iter().map(|lane| FF::from(*lane)).collect();
            self.mem
                .write_slice(self.call_ptr, clk, output_addr.direct, MemoryTag::U64, &output);
        } else {
            self.write_zeros(clk, output_addr.direct, MemoryTag::U64, size);
        }

        row.main_mem_addr_a = FF::from(output_addr.direct);
        row.main_mem_addr_b = FF::from(input_addr.direct);
        row.main_r_in_tag = MemoryTag::U64.as_ff();
        row.main_w_in_tag = MemoryTag::U64.as_ff();

        self.finish(row, OpCode::KeccakF1600, error, 0)
    }

    /// Adds two points given as separate `x`, `y` and `is_infinity`
    /// operands. The sum is written as a triple at `output`.
    pub(super) fn op_ec_add(&mut self, indirect: u16, offsets: [u32; 7]) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::EcAdd);

        let (addrs, mut error) = self.resolve(indirect, offsets, clk);
        let [p1_x, p1_y, p1_inf, p2_x, p2_y, p2_inf, output] = addrs.map(|a| a.direct);
        let tags_ok = [p1_x, p1_y, p2_x, p2_y]
            .into_iter()
            .all(|addr| self.check_tag(addr, MemoryTag::FF))
            && [p1_inf, p2_inf]
                .into_iter()
                .all(|addr| self.check_tag(addr, MemoryTag::U1));
        if error.is_ok() && !tags_ok {
            error = AvmError::TagError;
        }

        let result = if error.is_ok() {
            let mut read = |addr: u32| self.read_values(clk, addr, 1)[0];
            let p1 = AffinePoint {
                x: read(p1_x),
                y: read(p1_y),
                is_infinity: read(p1_inf) != FF::from(0u64),
            };
            let p2 = AffinePoint {
                x: read(p2_x),
                y: read(p2_y),
                is_infinity: read(p2_inf) != FF::from(0u64),
            };
            row.main_ia = p1.x;
            row.main_ib = p2.x;
            self.ecc.embedded_curve_add(p1, p2, clk)
        } else {
            AffinePoint {
                x: FF::from(0u64),
                y: FF::from(0u64),
                is_infinity: false,
            }
        };
        self.write_point(clk, output, result);

        row.main_mem_addr_c = FF::from(output);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, OpCode::EcAdd, error, 0)
    }

    /// Multi-scalar multiplication. `points` holds `point_length / 3`
    /// triples, `scalars` one `(lo, hi)` pair per point.
    pub(super) fn op_variable_msm(
        &mut self,
        indirect: u8,
        points_offset: u32,
        scalars_offset: u32,
        output_offset: u32,
        point_length_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Msm);

        let ([points_addr, scalars_addr, output_addr, length_addr], mut error) = self.resolve(
            indirect.into(),
            [points_offset, scalars_offset, output_offset, point_length_offset],
            clk,
        );
        let length = self.constrained_read(
            clk,
            IntermRegister::Id,
            length_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !length.tag_match {
            error = error.or(AvmError::TagError);
        }
        let num_points = ff_to_u32(length.val) / 3;

        let mut dyn_gas = 0;
        let mut affordable = true;
        if error.is_ok() {
            dyn_gas = num_points;
            affordable = self.check_slice(OpCode::Msm, num_points, 3 * num_points)?;
        }
        if error.is_ok() && affordable {
            let points_ok = (0..num_points)
                .all(|i| self.is_point_at(points_addr.direct.wrapping_add(3 * i)));
            let scalars_ok =
                self.check_tag_range(scalars_addr.direct, 2 * num_points, MemoryTag::FF);
            if !(points_ok && scalars_ok) {
                error = AvmError::TagError;
            }
        }

        if !affordable {
            log::debug!("MSM of {num_points} points skipped");
        } else if error.is_ok() {
            let coordinates = self.read_values(clk, points_addr.direct, 3 * num_points);
            let points: Vec<AffinePoint> = coordinates
                .chunks_exact(3)
                .map(|c| AffinePoint {
                    x: c[0],
                    y: c[1],
                    is_infinity: c[2] != FF::from(0u64),
                })
                .collect();
            let limbs = self.read_values(clk, scalars_addr.direct, 2 * num_points);
            let scalars: Vec<FF> = limbs
                .chunks_exact(2)
                .map(|l| scalar_from_limbs(l[0], l[1]))
                .collect();
            let result = self.ecc.variable_msm(&points, &scalars, clk);
            self.write_point(clk, output_addr.direct, result);
        } else {
            self.write_point(
                clk,
                output_addr.direct,
                AffinePoint {
                    x: FF::from(0u64),
                    y: FF::from(0u64),
                    is_infinity: false,
                },
            );
        }

        set_register(&mut row, IntermRegister::Id, &length);
        row.main_mem_addr_a = FF::from(points_addr.direct);
        row.main_mem_addr_b = FF::from(scalars_addr.direct);
        row.main_mem_addr_c = FF::from(output_addr.direct);
        row.main_r_in_tag = MemoryTag::U32.as_ff();

        Ok(self.finish(row, OpCode::Msm, error, dyn_gas))
    }

    /// Decomposes the field element at `src` into `num_limbs` digits in base
    /// `radix` (read from memory as a U32). Bits are written as U1, other
    /// digits as U8.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn op_to_radix(
        &mut self,
        order: LimbOrder,
        indirect: u8,
        src_offset: u32,
        dst_offset: u32,
        radix_offset: u32,
        num_limbs: u32,
        output_bits: bool,
    ) -> Result<AvmError, ExecutionError> {
        let opcode = match order {
            LimbOrder::LittleEndian => OpCode::ToRadixLe,
            LimbOrder::BigEndian => OpCode::ToRadixBe,
        };
        let clk = self.next_clk();
        let mut row = self.new_row(clk, opcode);

        let ([src_addr, dst_addr, radix_addr], mut error) =
            self.resolve(indirect.into(), [src_offset, dst_offset, radix_offset], clk);
        let input =
            self.constrained_read(clk, IntermRegister::Ia, src_addr, MemoryTag::FF, MemoryTag::FF);
        let radix = self.constrained_read(
            clk,
            IntermRegister::Ib,
            radix_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !(input.tag_match && radix.tag_match) {
            error = error.or(AvmError::TagError);
        }
        let radix_value = ff_to_u32(radix.val);
        if error.is_ok() && !is_valid_radix(radix_value, output_bits) {
            error = AvmError::RadixOutOfBounds;
        }

        let out_tag = if output_bits {
            MemoryTag::U1
        } else {
            MemoryTag::U8
        };
        if !self.check_slice(opcode, num_limbs, num_limbs)? {
            log::debug!("{opcode} of {num_limbs} limbs skipped");
        } else if error.is_ok() {
            let limbs: Vec<FF> = self
                .conversion
                .op_to_radix(input.val, radix_value, num_limbs, output_bits, order, clk)
                .into_iter()
                .map(|limb| FF::from(limb as u64))
                .collect();
            self.mem
                .write_slice(self.call_ptr, clk, dst_addr.direct, out_tag, &limbs);
        } else {
            self.write_zeros(clk, dst_addr.direct, out_tag, num_limbs);
        }

        set_register(&mut row, IntermRegister::Ia, &input);
        set_register(&mut row, IntermRegister::Ib, &radix);
        row.main_mem_addr_c = FF::from(dst_addr.direct);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = out_tag.as_ff();

        Ok(self.finish(row, opcode, error, num_limbs))
    }
}
