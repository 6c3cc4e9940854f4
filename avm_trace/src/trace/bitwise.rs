use super::{set_register, AvmTraceBuilder};
use crate::errors::AvmError;
use crate::gadgets::binary::BinaryOp;
use crate::instruction::BitwiseOp;
use crate::memory::IntermRegister;
use crate::opcode::OpCode;
use crate::util::FF;

impl AvmTraceBuilder {
    /// AND, OR and XOR go through the byte-wise binary gadget; SHL and SHR
    /// through the ALU. All of them need an integral tag.
    pub(super) fn op_bitwise(
        &mut self,
        op: BitwiseOp,
        indirect: u8,
        a_offset: u32,
        b_offset: u32,
        dst_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let opcode = op.opcode();
        let mut row = self.new_row(clk, opcode);

        let ([a_addr, b_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [a_offset, b_offset, dst_offset], clk);

        let in_tag = self.mem.unconstrained_read(self.call_ptr, a_addr.direct).tag;
        let a = self.constrained_read(clk, IntermRegister::Ia, a_addr, in_tag, in_tag);
        let b = self.constrained_read(clk, IntermRegister::Ib, b_addr, in_tag, in_tag);
        if !(a.tag_match && b.tag_match) || !in_tag.is_integral() {
            error = error.or(AvmError::TagError);
        }

        let binary_op = match op {
            BitwiseOp::And => Some(BinaryOp::And),
            BitwiseOp::Or => Some(BinaryOp::Or),
            BitwiseOp::Xor => Some(BinaryOp::Xor),
            BitwiseOp::Shl | BitwiseOp::Shr => None,
        };

        let c = if error.is_ok() {
            match (op, binary_op) {
                (_, Some(binary_op)) => {
                    row.main_sel_bin = FF::from(1u64);
                    row.main_bin_op_id = FF::from(binary_op.id() as u64);
                    self.bin.op(binary_op, a.val, b.val, in_tag, clk)
                }
                (BitwiseOp::Shl, None) => self.alu.op_shl(a.val, b.val, in_tag, clk),
                (_, None) => self.alu.op_shr(a.val, b.val, in_tag, clk),
            }
        } else {
            FF::from(0u64)
        };

        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, c, in_tag, in_tag);

        set_register(&mut row, IntermRegister::Ia, &a);
        set_register(&mut row, IntermRegister::Ib, &b);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = in_tag.as_ff();
        row.main_w_in_tag = in_tag.as_ff();
        if opcode.is_alu() {
            row.main_alu_in_tag = in_tag.as_ff();
        }

        self.finish(row, opcode, error, 0)
    }

    pub(super) fn op_not(&mut self, indirect: u8, src_offset: u32, dst_offset: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Not);

        let ([src_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [src_offset, dst_offset], clk);

        let in_tag = self.mem.unconstrained_read(self.call_ptr, src_addr.direct).tag;
        let a = self.constrained_read(clk, IntermRegister::Ia, src_addr, in_tag, in_tag);
        if !in_tag.is_integral() {
            error = error.or(AvmError::TagError);
        }

        let c = if error.is_ok() {
            self.alu.op_not(a.val, in_tag, clk)
        } else {
            FF::from(0u64)
        };
        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, c, in_tag, in_tag);

        set_register(&mut row, IntermRegister::Ia, &a);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = in_tag.as_ff();
        row.main_w_in_tag = in_tag.as_ff();
        row.main_alu_in_tag = in_tag.as_ff();

        self.finish(row, OpCode::Not, error, 0)
    }
}
