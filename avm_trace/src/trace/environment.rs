use super::{set_register, AvmTraceBuilder};
use crate::errors::{AvmError, ExecutionError};
use crate::instruction::EnvironmentVariable;
use crate::kernel::KernelInput;
use crate::memory::{IntermRegister, MemoryTag};
use crate::opcode::OpCode;
use crate::util::{ff_bool, ff_to_u32, FF};

/// Where the value of an environment variable comes from.
enum EnvSource {
    Kernel(KernelInput),
    L2GasLeft,
    DaGasLeft,
}

impl EnvironmentVariable {
    fn source(self) -> EnvSource {
        match self {
            EnvironmentVariable::Address => EnvSource::Kernel(KernelInput::Address),
            EnvironmentVariable::Sender => EnvSource::Kernel(KernelInput::Sender),
            EnvironmentVariable::TransactionFee => EnvSource::Kernel(KernelInput::TransactionFee),
            EnvironmentVariable::ChainId => EnvSource::Kernel(KernelInput::ChainId),
            EnvironmentVariable::Version => EnvSource::Kernel(KernelInput::Version),
            EnvironmentVariable::BlockNumber => EnvSource::Kernel(KernelInput::BlockNumber),
            EnvironmentVariable::Timestamp => EnvSource::Kernel(KernelInput::Timestamp),
            EnvironmentVariable::FeePerL2Gas => EnvSource::Kernel(KernelInput::FeePerL2Gas),
            EnvironmentVariable::FeePerDaGas => EnvSource::Kernel(KernelInput::FeePerDaGas),
            EnvironmentVariable::IsStaticCall => EnvSource::Kernel(KernelInput::IsStaticCall),
            EnvironmentVariable::L2GasLeft => EnvSource::L2GasLeft,
            EnvironmentVariable::DaGasLeft => EnvSource::DaGasLeft,
        }
    }

    fn tag(self) -> MemoryTag {
        match self {
            EnvironmentVariable::IsStaticCall => MemoryTag::U1,
            EnvironmentVariable::L2GasLeft | EnvironmentVariable::DaGasLeft => MemoryTag::U32,
            _ => MemoryTag::FF,
        }
    }
}

impl AvmTraceBuilder {
    pub(super) fn op_get_env_var(&mut self, indirect: u8, dst_offset: u32, var: u8) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::GetEnvVar);

        let Some(var) = EnvironmentVariable::from_u8(var) else {
            return self.finish(row, OpCode::GetEnvVar, AvmError::EnvironmentVariableUnknown, 0);
        };
        let one = FF::from(1u64);
        *match var {
            EnvironmentVariable::Address => &mut row.main_sel_op_address,
            EnvironmentVariable::Sender => &mut row.main_sel_op_sender,
            EnvironmentVariable::TransactionFee => &mut row.main_sel_op_transaction_fee,
            EnvironmentVariable::ChainId => &mut row.main_sel_op_chain_id,
            EnvironmentVariable::Version => &mut row.main_sel_op_version,
            EnvironmentVariable::BlockNumber => &mut row.main_sel_op_block_number,
            EnvironmentVariable::Timestamp => &mut row.main_sel_op_timestamp,
            EnvironmentVariable::FeePerL2Gas => &mut row.main_sel_op_fee_per_l2_gas,
            EnvironmentVariable::FeePerDaGas => &mut row.main_sel_op_fee_per_da_gas,
            EnvironmentVariable::IsStaticCall => &mut row.main_sel_op_is_static_call,
            EnvironmentVariable::L2GasLeft => &mut row.main_sel_op_l2gasleft,
            EnvironmentVariable::DaGasLeft => &mut row.main_sel_op_dagasleft,
        } = one;

        let ([dst_addr], error) = self.resolve(indirect.into(), [dst_offset], clk);
        let tag = var.tag();

        // Gas left is observed after this instruction paid for itself. In a
        // nested call the context variables come from the call itself, not
        // from the kernel inputs.
        let nested_sender = self.nested_calls.last().map(|call| call.sender);
        let value = match var.source() {
            EnvSource::Kernel(_) if !error.is_ok() => FF::from(0u64),
            EnvSource::Kernel(input) => match (input, nested_sender) {
                (KernelInput::Address, Some(_)) => self.contract_address(),
                (KernelInput::Sender, Some(sender)) => sender,
                (KernelInput::IsStaticCall, Some(_)) => ff_bool(self.is_static_context()),
                _ => self.kernel.op_input(clk, input),
            },
            EnvSource::L2GasLeft | EnvSource::DaGasLeft => {
                self.gas.constrain_gas(clk, OpCode::GetEnvVar, 0);
                match var.source() {
                    EnvSource::L2GasLeft if error.is_ok() => FF::from(self.gas.l2_gas_left()),
                    EnvSource::DaGasLeft if error.is_ok() => FF::from(self.gas.da_gas_left()),
                    _ => FF::from(0u64),
                }
            }
        };

        let a =
            self.constrained_write(clk, IntermRegister::Ia, dst_addr, value, MemoryTag::FF, tag);
        set_register(&mut row, IntermRegister::Ia, &a);
        row.main_w_in_tag = tag.as_ff();

        let error = match var.source() {
            EnvSource::Kernel(_) => self.commit_row(row, OpCode::GetEnvVar, error, 0),
            EnvSource::L2GasLeft | EnvSource::DaGasLeft => self.push_row(row, error),
        };
        self.advance_pc(OpCode::GetEnvVar);
        error
    }

    /// Copies `copy_size` calldata values starting at `cd_offset` to `dst`.
    /// Values past the end of the calldata read as zero.
    pub(super) fn op_calldata_copy(
        &mut self,
        indirect: u8,
        cd_offset: u32,
        copy_size: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::CalldataCopy);

        let ([offset_addr, size_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [cd_offset, copy_size, dst_offset], clk);

        let offset = self.constrained_read(
            clk,
            IntermRegister::Ia,
            offset_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let size = self.constrained_read(
            clk,
            IntermRegister::Ib,
            size_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !(offset.tag_match && size.tag_match) {
            error = error.or(AvmError::TagError);
        }

        let mut dyn_gas = 0;
        if error.is_ok() {
            let (start, len) = (ff_to_u32(offset.val) as usize, ff_to_u32(size.val));
            dyn_gas = len;
            if self.check_slice(OpCode::CalldataCopy, len, len)? {
                let calldata = self.current_calldata();
                let end = start.saturating_add(len as usize);
                let values: Vec<FF> = (start..end)
                    .map(|i| calldata.get(i).copied().unwrap_or_else(|| FF::from(0u64)))
                    .collect();
                // Only the calldata of the top-level call has a column.
                if self.nested_calls.is_empty() {
                    for i in start..end.min(self.calldata.len()) {
                        *self.calldata_lookup_counts.entry(i).or_default() += 1;
                    }
                }
                self.mem
                    .write_slice(self.call_ptr, clk, dst_addr.direct, MemoryTag::FF, &values);
            }
        }

        set_register(&mut row, IntermRegister::Ia, &offset);
        set_register(&mut row, IntermRegister::Ib, &size);
        row.main_mem_addr_c = FF::from(dst_addr.direct);
        row.main_r_in_tag = MemoryTag::U32.as_ff();
        row.main_w_in_tag = MemoryTag::FF.as_ff();

        Ok(self.finish(row, OpCode::CalldataCopy, error, dyn_gas))
    }

    /// Size of the return data of the last nested call.
    pub(super) fn op_returndata_size(&mut self, indirect: u8, dst_offset: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::ReturndataSize);

        let ([dst_addr], error) = self.resolve(indirect.into(), [dst_offset], clk);
        let size = if error.is_ok() {
            FF::from(self.nested_returndata.len() as u64)
        } else {
            FF::from(0u64)
        };
        let a = self.constrained_write(
            clk,
            IntermRegister::Ia,
            dst_addr,
            size,
            MemoryTag::U32,
            MemoryTag::U32,
        );

        set_register(&mut row, IntermRegister::Ia, &a);
        row.main_w_in_tag = MemoryTag::U32.as_ff();

        self.finish(row, OpCode::ReturndataSize, error, 0)
    }

    /// Copies a window of the return data of the last nested call.
    pub(super) fn op_returndata_copy(
        &mut self,
        indirect: u8,
        rd_offset: u32,
        copy_size: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::ReturndataCopy);

        let ([offset_addr, size_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [rd_offset, copy_size, dst_offset], clk);

        let offset = self.constrained_read(
            clk,
            IntermRegister::Ia,
            offset_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        let size = self.constrained_read(
            clk,
            IntermRegister::Ib,
            size_addr,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        if !(offset.tag_match && size.tag_match) {
            error = error.or(AvmError::TagError);
        }

        let mut dyn_gas = 0;
        if error.is_ok() {
            let (start, len) = (ff_to_u32(offset.val) as usize, ff_to_u32(size.val));
            dyn_gas = len;
            if self.check_slice(OpCode::ReturndataCopy, len, len)? {
                let values: Vec<FF> = (start..start.saturating_add(len as usize))
                    .map(|i| {
                        self.nested_returndata
                            .get(i)
                            .copied()
                            .unwrap_or_else(|| FF::from(0u64))
                    })
                    .collect();
                self.mem
                    .write_slice(self.call_ptr, clk, dst_addr.direct, MemoryTag::FF, &values);
            }
        }

        set_register(&mut row, IntermRegister::Ia, &offset);
        set_register(&mut row, IntermRegister::Ib, &size);
        row.main_mem_addr_c = FF::from(dst_addr.direct);
        row.main_r_in_tag = MemoryTag::U32.as_ff();
        row.main_w_in_tag = MemoryTag::FF.as_ff();

        Ok(self.finish(row, OpCode::ReturndataCopy, error, dyn_gas))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TraceConfig;
    use crate::errors::AvmError;
    use crate::hints::ExecutionHints;
    use crate::instruction::{EnvironmentVariable, Instruction};
    use crate::memory::MemoryTag;
    use crate::opcode::OpCode;
    use crate::testing_utils::{test_public_inputs, TEST_GAS_LIMIT};
    use crate::trace::AvmTraceBuilder;
    use crate::util::FF;

    fn builder(calldata: Vec<FF>) -> AvmTraceBuilder {
        let mut public_inputs = test_public_inputs();
        public_inputs.sender = FF::from(42u64);
        public_inputs.is_static_call = true;
        AvmTraceBuilder::new(
            public_inputs,
            calldata,
            ExecutionHints::default(),
            TraceConfig::testing(),
        )
    }

    fn get_env_var(trace: &mut AvmTraceBuilder, var: u8, dst: u32) -> AvmError {
        trace
            .execute(&Instruction::GetEnvVar {
                indirect: 0,
                var,
                dst,
            })
            .unwrap()
    }

    #[test]
    fn kernel_inputs_are_read() {
        let mut trace = builder(vec![]);
        assert!(get_env_var(&mut trace, EnvironmentVariable::Sender as u8, 0).is_ok());
        assert!(get_env_var(&mut trace, EnvironmentVariable::IsStaticCall as u8, 1).is_ok());
        let sender = trace.memory().unconstrained_read(0, 0);
        assert_eq!((sender.val, sender.tag), (FF::from(42u64), MemoryTag::FF));
        let is_static = trace.memory().unconstrained_read(0, 1);
        assert_eq!((is_static.val, is_static.tag), (FF::from(1u64), MemoryTag::U1));
        assert_eq!(trace.kernel().len(), 2);
    }

    #[test]
    fn gas_left_includes_own_cost() {
        let mut trace = builder(vec![]);
        assert!(get_env_var(&mut trace, EnvironmentVariable::L2GasLeft as u8, 0).is_ok());
        let cost = OpCode::GetEnvVar.gas_cost().base_l2;
        let cell = trace.memory().unconstrained_read(0, 0);
        assert_eq!(cell.val, FF::from(TEST_GAS_LIMIT - cost));
        assert_eq!(cell.tag, MemoryTag::U32);
        // Charged once.
        assert_eq!(trace.gas.len(), 1);
    }

    #[test]
    fn unknown_variable() {
        let mut trace = builder(vec![]);
        assert_eq!(get_env_var(&mut trace, 12, 0), AvmError::EnvironmentVariableUnknown);
        assert_eq!(trace.main_trace_len(), 1);
        assert_eq!(trace.pc(), OpCode::GetEnvVar.encoded_width());
    }

    #[test]
    fn calldata_copy_zero_fills() {
        let mut trace = builder(vec![FF::from(5u64), FF::from(6u64)]);
        trace.execute(&Instruction::set(MemoryTag::U32, FF::from(1u64), 0)).unwrap();
        trace.execute(&Instruction::set(MemoryTag::U32, FF::from(3u64), 1)).unwrap();
        let error = trace
            .execute(&Instruction::CalldataCopy {
                indirect: 0,
                cd_offset: 0,
                copy_size: 1,
                dst: 10,
            })
            .unwrap();
        assert!(error.is_ok());
        let values: Vec<FF> = (10..13)
            .map(|addr| trace.memory().unconstrained_read(0, addr).val)
            .collect();
        assert_eq!(values, vec![FF::from(6u64), FF::from(0u64), FF::from(0u64)]);
        assert_eq!(trace.calldata_lookup_counts.get(&1), Some(&1));
    }

    #[test]
    fn calldata_copy_needs_u32_size() {
        let mut trace = builder(vec![FF::from(5u64)]);
        trace.execute(&Instruction::set(MemoryTag::U32, FF::from(0u64), 0)).unwrap();
        trace.execute(&Instruction::set(MemoryTag::U64, FF::from(1u64), 1)).unwrap();
        let error = trace
            .execute(&Instruction::CalldataCopy {
                indirect: 0,
                cd_offset: 0,
                copy_size: 1,
                dst: 10,
            })
            .unwrap();
        assert_eq!(error, AvmError::TagError);
        assert!(trace.calldata_lookup_counts.is_empty());
    }
}
