//! Jumps and the internal call stack.
//!
//! Return addresses live in the reserved address space
//! [`INTERNAL_CALL_SPACE_ID`], one U32 cell per frame at
//! `internal_return_ptr`, so that calls and returns are covered by the
//! memory-consistency argument like any other access.

use avm_common::INTERNAL_CALL_SPACE_ID;

use super::{set_register, AvmTraceBuilder, MemOp};
use crate::addressing::ResolvedAddress;
use crate::errors::{AvmError, ExecutionError};
use crate::memory::{IntermRegister, MemoryTag};
use crate::opcode::OpCode;
use crate::util::{ff_bool, ff_inverse_or_zero, ff_to_u32, FF};

impl AvmTraceBuilder {
    pub(super) fn op_jump(&mut self, loc: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::Jump);
        row.main_ia = FF::from(loc);

        let error = self.commit_row(row, OpCode::Jump, AvmError::NoError, 0);
        self.pc = loc;
        error
    }

    /// Jumps to `loc` if the value at `cond` is non-zero. The condition is
    /// read without tag check.
    pub(super) fn op_jumpi(&mut self, indirect: u8, loc: u32, cond_offset: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::JumpI);

        let ([cond_addr], error) = self.resolve(indirect.into(), [cond_offset], clk);
        let stored_tag = self.mem.unconstrained_read(self.call_ptr, cond_addr.direct).tag;
        let read = self.mem.read_and_load_untagged(
            self.call_ptr,
            clk,
            IntermRegister::Id,
            cond_addr.direct,
            stored_tag,
        );
        let cond = MemOp {
            val: read.val,
            tag: read.tag,
            tag_match: true,
            address: cond_addr,
            is_write: false,
        };

        let zero = FF::from(0u64);
        let taken = error.is_ok() && cond.val != zero;

        set_register(&mut row, IntermRegister::Id, &cond);
        row.main_ia = FF::from(loc);
        row.main_id_zero = ff_bool(cond.val == zero);
        row.main_inv = ff_inverse_or_zero(cond.val);
        row.main_r_in_tag = cond.tag.as_ff();

        let error = self.commit_row(row, OpCode::JumpI, error, 0);
        if taken {
            self.pc = loc;
        } else {
            self.advance_pc(OpCode::JumpI);
        }
        error
    }

    /// Pushes the return address on the internal call stack and jumps to
    /// `loc`.
    pub(super) fn op_internal_call(&mut self, loc: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::InternalCall);

        let return_pc = self.pc.wrapping_add(OpCode::InternalCall.encoded_width());
        self.mem.write_into_memory(
            INTERNAL_CALL_SPACE_ID,
            clk,
            IntermRegister::Ib,
            self.internal_return_ptr,
            FF::from(return_pc),
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let ret = MemOp {
            val: FF::from(return_pc),
            tag: MemoryTag::U32,
            tag_match: true,
            address: ResolvedAddress::direct(self.internal_return_ptr),
            is_write: true,
        };

        set_register(&mut row, IntermRegister::Ib, &ret);
        row.main_ia = FF::from(loc);
        row.main_w_in_tag = MemoryTag::U32.as_ff();

        let error = self.commit_row(row, OpCode::InternalCall, AvmError::NoError, 0);
        self.internal_return_ptr += 1;
        self.pc = loc;
        error
    }

    /// Pops the return address. Returning with an empty stack records an
    /// error row and stops the current call.
    pub(super) fn op_internal_return(&mut self) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::InternalReturn);

        // Internal calls of a caller are not visible to its nested calls.
        if self.internal_return_ptr <= self.internal_call_base {
            let pc = self.pc;
            log::debug!("INTERNALRETURN at pc {pc} with an empty internal call stack");
            let error = AvmError::InternalCallStackUnderflow;
            self.commit_row(row, OpCode::InternalReturn, error, 0);
            self.exceptional_halt();
            return Err(ExecutionError::InternalCallStackUnderflow { pc });
        }
        let slot = self.internal_return_ptr - 1;

        let read = self.mem.read_and_load_from_memory(
            INTERNAL_CALL_SPACE_ID,
            clk,
            IntermRegister::Ia,
            slot,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let ret = MemOp {
            val: read.val,
            tag: read.tag,
            tag_match: read.tag_match,
            address: ResolvedAddress::direct(slot),
            is_write: false,
        };

        set_register(&mut row, IntermRegister::Ia, &ret);
        row.main_r_in_tag = MemoryTag::U32.as_ff();

        let error = self.commit_row(row, OpCode::InternalReturn, AvmError::NoError, 0);
        self.internal_return_ptr = slot;
        self.pc = ff_to_u32(ret.val);
        Ok(error)
    }
}
