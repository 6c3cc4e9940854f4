use super::{set_register, AvmTraceBuilder, MemOp};
use crate::addressing::ResolvedAddress;
use crate::errors::AvmError;
use crate::memory::{IntermRegister, MemRead, MemoryTag};
use crate::opcode::OpCode;
use crate::util::FF;

fn untagged(read: MemRead, address: ResolvedAddress) -> MemOp {
    MemOp {
        val: read.val,
        tag: read.tag,
        tag_match: true,
        address,
        is_write: false,
    }
}

impl AvmTraceBuilder {
    /// Converts the source value to `dst_tag`, truncating it. The source tag
    /// is not checked.
    pub(super) fn op_cast(
        &mut self,
        indirect: u8,
        src_offset: u32,
        dst_offset: u32,
        dst_tag: MemoryTag,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Cast);

        let ([src_addr, dst_addr], error) =
            self.resolve(indirect.into(), [src_offset, dst_offset], clk);

        let read = self.mem.read_and_load_untagged(
            self.call_ptr,
            clk,
            IntermRegister::Ia,
            src_addr.direct,
            dst_tag,
        );
        let a = untagged(read, src_addr);

        let c = if error.is_ok() {
            self.alu.op_cast(a.val, dst_tag, clk)
        } else {
            FF::from(0u64)
        };
        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, c, a.tag, dst_tag);

        set_register(&mut row, IntermRegister::Ia, &a);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = a.tag.as_ff();
        row.main_w_in_tag = dst_tag.as_ff();
        row.main_alu_in_tag = dst_tag.as_ff();

        self.finish(row, OpCode::Cast, error, 0)
    }

    /// Writes an immediate, truncated to `tag`.
    pub(super) fn op_set(
        &mut self,
        indirect: u8,
        value: FF,
        dst_offset: u32,
        tag: MemoryTag,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Set);

        let ([dst_addr], error) = self.resolve(indirect.into(), [dst_offset], clk);
        let value = if error.is_ok() {
            tag.truncate(value)
        } else {
            FF::from(0u64)
        };
        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, value, tag, tag);

        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_w_in_tag = tag.as_ff();

        self.finish(row, OpCode::Set, error, 0)
    }

    /// Copies value and tag.
    pub(super) fn op_mov(&mut self, indirect: u8, src_offset: u32, dst_offset: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Mov);

        let ([src_addr, dst_addr], error) =
            self.resolve(indirect.into(), [src_offset, dst_offset], clk);

        let read = self
            .mem
            .read_and_load_mov_opcode(self.call_ptr, clk, src_addr.direct);
        let a = untagged(read, src_addr);
        let (val, tag) = if error.is_ok() {
            (a.val, a.tag)
        } else {
            (FF::from(0u64), MemoryTag::FF)
        };
        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, val, tag, tag);

        set_register(&mut row, IntermRegister::Ia, &a);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_sel_mov_ia_to_ic = FF::from(1u64);
        row.main_r_in_tag = tag.as_ff();
        row.main_w_in_tag = tag.as_ff();

        self.finish(row, OpCode::Mov, error, 0)
    }
}
