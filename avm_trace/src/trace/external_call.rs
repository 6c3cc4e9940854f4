//! Nested calls, termination and debug output.
//!
//! A call to a contract registered with
//! [`AvmTraceBuilder::register_contract`] runs in the trace: the callee
//! gets a fresh memory space, its own calldata and the gas given to it, and
//! RETURN or REVERT hand control back to the caller. A call to any other
//! contract is resolved from the next external-call hint, which tells
//! whether the callee succeeded, what it returned and how much gas it used.

use itertools::Itertools;

use super::{set_register, AvmTraceBuilder};
use crate::errors::{AvmError, ExecutionError};
use crate::instruction::CallKind;
use crate::memory::{IntermRegister, MemoryTag};
use crate::opcode::OpCode;
use crate::util::{ff_bool, ff_to_u32, ff_to_u64, FF};

impl AvmTraceBuilder {
    /// CALL and STATICCALL. `gas` points to the L2 and DA gas given to the
    /// callee, `success` receives a U1.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn op_call(
        &mut self,
        kind: CallKind,
        indirect: u16,
        gas_offset: u32,
        address_offset: u32,
        args_offset: u32,
        args_size_offset: u32,
        success_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let opcode = match kind {
            CallKind::Call => OpCode::Call,
            CallKind::StaticCall => OpCode::StaticCall,
        };
        let clk = self.next_clk();
        let mut row = self.new_row(clk, opcode);

        let offsets = [gas_offset, address_offset, args_offset, args_size_offset, success_offset];
        let ([gas_addr, address_addr, args_addr, args_size_addr, success_addr], mut error) =
            self.resolve(indirect, offsets, clk);

        let l2_gas = self.constrained_read(
            clk,
            IntermRegister::Ia,
            gas_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let mut da_gas_addr = gas_addr;
        da_gas_addr.direct = gas_addr.direct.wrapping_add(1);
        let da_gas = self.constrained_read(
            clk,
            IntermRegister::Ib,
            da_gas_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let address = self.constrained_read(
            clk,
            IntermRegister::Ic,
            address_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        let args_size = self.constrained_read(
            clk,
            IntermRegister::Id,
            args_size_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !(l2_gas.tag_match && da_gas.tag_match && address.tag_match && args_size.tag_match) {
            error = error.or(AvmError::TagError);
        }

        set_register(&mut row, IntermRegister::Ia, &l2_gas);
        set_register(&mut row, IntermRegister::Ib, &da_gas);
        set_register(&mut row, IntermRegister::Ic, &address);
        set_register(&mut row, IntermRegister::Id, &args_size);
        row.main_r_in_tag = MemoryTag::U32.as_ff();
        row.main_w_in_tag = MemoryTag::U1.as_ff();

        if !error.is_ok() {
            self.nested_returndata.clear();
            self.write_success(clk, success_addr.direct, false);
            return Ok(self.finish(row, opcode, error, 0));
        }

        let len = ff_to_u32(args_size.val);
        if !self.check_slice(opcode, len, len)? {
            return Ok(self.finish(row, opcode, error, len));
        }
        let args: Vec<FF> = self
            .mem
            .read_slice(self.call_ptr, clk, args_addr.direct, len)
            .into_iter()
            .map(|read| read.val)
            .collect();

        if self.in_trace_contracts.contains(&address.val) {
            log::debug!("{opcode} to {} with {} args runs in the trace", address.val, args.len());
            let error = self.finish(row, opcode, error, len);
            if !self.gas.is_out_of_gas() {
                let gas = (ff_to_u32(l2_gas.val), ff_to_u32(da_gas.val));
                let is_static = kind == CallKind::StaticCall;
                self.enter_call(address.val, is_static, args, success_addr.direct, gas)?;
            }
            return Ok(error);
        }

        let hint = self.hints.external_call(self.external_call_counter)?.clone();
        log::debug!(
            "{} to {} with {} args: success {}, l2 gas used {}",
            opcode,
            address.val,
            args.len(),
            hint.success,
            hint.l2_gas_used
        );
        self.external_call_counter += 1;
        self.nested_returndata = hint.return_data;
        if kind == CallKind::Call {
            self.side_effect_counter = self.side_effect_counter.max(hint.end_side_effect_counter);
        }
        self.write_success(clk, success_addr.direct, hint.success);

        // The callee's consumption comes on top of the cost of the call.
        let cost = opcode.gas_cost();
        let forced_l2 = cost
            .base_l2
            .saturating_add(cost.dyn_l2.saturating_mul(len))
            .saturating_add(hint.l2_gas_used);
        let forced_da = cost
            .base_da
            .saturating_add(cost.dyn_da.saturating_mul(len))
            .saturating_add(hint.da_gas_used);
        self.gas
            .constrain_gas_with(clk, opcode, len, Some(forced_l2), Some(forced_da));
        let error = self.push_row(row, error);
        self.advance_pc(opcode);
        Ok(error)
    }

    fn write_success(&mut self, clk: u32, addr: u32, success: bool) {
        self.mem
            .write_slice(self.call_ptr, clk, addr, MemoryTag::U1, &[ff_bool(success)]);
    }

    /// Shared by RETURN and REVERT: copies the U32 number of values stored at
    /// `size_offset`, starting at `offset`, to the return data. The top-level
    /// call halts; a nested call resumes its caller.
    fn op_terminate(
        &mut self,
        opcode: OpCode,
        indirect: u8,
        offset: u32,
        size_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, opcode);

        let ([addr, size_addr], mut error) =
            self.resolve(indirect.into(), [offset, size_offset], clk);
        let size = self.constrained_read(
            clk,
            IntermRegister::Ib,
            size_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !size.tag_match {
            error = error.or(AvmError::TagError);
        }

        let mut returndata = vec![];
        let mut dyn_gas = 0;
        let mut affordable = true;
        if error.is_ok() {
            let len = ff_to_u32(size.val);
            dyn_gas = len;
            affordable = self.check_slice(opcode, len, len)?;
            if affordable {
                returndata = self
                    .mem
                    .read_slice(self.call_ptr, clk, addr.direct, len)
                    .into_iter()
                    .map(|read| read.val)
                    .collect();
            }
        }

        set_register(&mut row, IntermRegister::Ib, &size);
        row.main_mem_addr_c = FF::from(addr.direct);
        row.main_r_in_tag = MemoryTag::U32.as_ff();

        let success = error.is_ok() && opcode == OpCode::Return;
        let error = if opcode == OpCode::Revert {
            error.or(AvmError::RevertOpcode)
        } else {
            error
        };
        let error = self.commit_row(row, opcode, error, dyn_gas);
        if !affordable {
            // Out of gas: the call ends exceptionally instead.
            return Ok(error);
        }

        if self.nested_calls.is_empty() {
            for i in 0..returndata.len() {
                *self.returndata_lookup_counts.entry(i).or_default() += 1;
            }
            self.returndata = returndata;
            self.halt();
        } else {
            self.return_to_caller(success, returndata, false);
        }
        Ok(error)
    }

    pub(super) fn op_return(
        &mut self,
        indirect: u8,
        offset: u32,
        size_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        self.op_terminate(OpCode::Return, indirect, offset, size_offset)
    }

    pub(super) fn op_revert(
        &mut self,
        indirect: u8,
        offset: u32,
        size_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        self.op_terminate(OpCode::Revert, indirect, offset, size_offset)
    }

    /// Logs a U8 message and FF fields. No effect on the execution besides
    /// the tag checks.
    pub(super) fn op_debug_log(
        &mut self,
        indirect: u8,
        message_offset: u32,
        fields_offset: u32,
        fields_size_offset: u32,
        message_size: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::DebugLog);

        let ([message_addr, fields_addr, fields_size_addr], mut error) = self.resolve(
            indirect.into(),
            [message_offset, fields_offset, fields_size_offset],
            clk,
        );
        let fields_size = self.constrained_read(
            clk,
            IntermRegister::Ia,
            fields_size_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !fields_size.tag_match {
            error = error.or(AvmError::TagError);
        }

        let mut dyn_gas = 0;
        if error.is_ok() {
            let num_fields = ff_to_u32(fields_size.val);
            dyn_gas = message_size.saturating_add(num_fields);
            if self.check_slice(OpCode::DebugLog, dyn_gas, dyn_gas)? {
                if self.check_tag_range(message_addr.direct, message_size, MemoryTag::U8)
                    && self.check_tag_range(fields_addr.direct, num_fields, MemoryTag::FF)
                {
                    let message: Vec<u8> = (0..message_size)
                        .map(|i| message_addr.direct.wrapping_add(i))
                        .map(|addr| ff_to_u64(self.unconstrained_read(addr)) as u8)
                        .collect();
                    let fields = (0..num_fields)
                        .map(|i| self.unconstrained_read(fields_addr.direct.wrapping_add(i)))
                        .join(", ");
                    log::debug!("DEBUGLOG {}: [{}]", String::from_utf8_lossy(&message), fields);
                } else {
                    error = AvmError::TagError;
                }
            }
        }

        set_register(&mut row, IntermRegister::Ia, &fields_size);
        row.main_r_in_tag = MemoryTag::U32.as_ff();

        Ok(self.finish(row, OpCode::DebugLog, error, dyn_gas))
    }
}
