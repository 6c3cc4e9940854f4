//! Storage, existence checks and emitted side effects.
//!
//! Every successful side effect takes the current side-effect counter and
//! increments it. A failing instruction (tag error, static context, full
//! output range) leaves the counter untouched.

use super::{set_register, AvmTraceBuilder};
use crate::errors::{AvmError, ExecutionError};
use crate::gadgets::poseidon2;
use crate::instruction::ContractInstanceMember;
use crate::kernel::KernelOutput;
use crate::memory::{IntermRegister, MemoryTag};
use crate::opcode::OpCode;
use crate::util::{ff_bool, ff_to_u32, FF};

impl AvmTraceBuilder {
    /// Error of a side effect of `kind` emitted by `opcode` in the current
    /// context, before any operand is looked at.
    fn side_effect_error(&self, opcode: OpCode, kind: KernelOutput) -> AvmError {
        if self.is_static_context() && opcode.is_state_mutating() {
            AvmError::StaticCallAlteration
        } else if !self.kernel.has_capacity(kind) {
            AvmError::SideEffectLimitReached
        } else {
            AvmError::NoError
        }
    }

    fn next_side_effect(&mut self) -> u32 {
        let counter = self.side_effect_counter;
        self.side_effect_counter += 1;
        counter
    }

    pub(super) fn op_sload(
        &mut self,
        indirect: u8,
        slot_offset: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::SLoad);

        let ([slot_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [slot_offset, dst_offset], clk);
        let slot =
            self.constrained_read(clk, IntermRegister::Ia, slot_addr, MemoryTag::FF, MemoryTag::FF);
        if !slot.tag_match {
            error = error.or(AvmError::TagError);
        }
        error = error.or(self.side_effect_error(OpCode::SLoad, KernelOutput::SLoad));

        let value = if error.is_ok() {
            let value = self.hints.side_effect(self.side_effect_counter)?;
            let counter = self.next_side_effect();
            self.kernel.op_sload(clk, counter, slot.val, value);
            value
        } else {
            FF::from(0u64)
        };
        let b = self.constrained_write(
            clk,
            IntermRegister::Ib,
            dst_addr,
            value,
            MemoryTag::FF,
            MemoryTag::FF,
        );

        set_register(&mut row, IntermRegister::Ia, &slot);
        set_register(&mut row, IntermRegister::Ib, &b);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = MemoryTag::FF.as_ff();

        Ok(self.finish(row, OpCode::SLoad, error, 0))
    }

    pub(super) fn op_sstore(
        &mut self,
        indirect: u8,
        src_offset: u32,
        slot_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::SStore);

        let ([src_addr, slot_addr], mut error) =
            self.resolve(indirect.into(), [src_offset, slot_offset], clk);
        let value =
            self.constrained_read(clk, IntermRegister::Ia, src_addr, MemoryTag::FF, MemoryTag::FF);
        let slot =
            self.constrained_read(clk, IntermRegister::Ib, slot_addr, MemoryTag::FF, MemoryTag::FF);
        if !(value.tag_match && slot.tag_match) {
            error = error.or(AvmError::TagError);
        }
        error = error.or(self.side_effect_error(OpCode::SStore, KernelOutput::SStore));

        if error.is_ok() {
            let counter = self.next_side_effect();
            self.kernel.op_sstore(clk, counter, slot.val, value.val);
        }

        set_register(&mut row, IntermRegister::Ia, &value);
        set_register(&mut row, IntermRegister::Ib, &slot);
        row.main_r_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, OpCode::SStore, error, 0)
    }

    /// Shared shape of NOTEHASHEXISTS and L1TOL2MSGEXISTS: the existence of
    /// the leaf comes from the leaf-index hints.
    fn op_leaf_exists(
        &mut self,
        opcode: OpCode,
        indirect: u8,
        offsets: [u32; 3],
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, opcode);
        let kind = match opcode {
            OpCode::NoteHashExists => KernelOutput::NoteHashExists,
            _ => KernelOutput::L1ToL2MsgExists,
        };

        let ([leaf_addr, index_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), offsets, clk);
        let leaf =
            self.constrained_read(clk, IntermRegister::Ia, leaf_addr, MemoryTag::FF, MemoryTag::FF);
        let index = self.constrained_read(
            clk,
            IntermRegister::Ib,
            index_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        if !(leaf.tag_match && index.tag_match) {
            error = error.or(AvmError::TagError);
        }
        error = error.or(self.side_effect_error(opcode, kind));

        let exists = if error.is_ok() {
            let exists = self.hints.leaf_index(index.val)?;
            let counter = self.next_side_effect();
            match kind {
                KernelOutput::NoteHashExists => {
                    self.kernel.op_note_hash_exists(clk, counter, leaf.val, exists)
                }
                _ => self.kernel.op_l1_to_l2_msg_exists(clk, counter, leaf.val, exists),
            }
            exists
        } else {
            false
        };
        let c = self.constrained_write(
            clk,
            IntermRegister::Ic,
            dst_addr,
            ff_bool(exists),
            MemoryTag::FF,
            MemoryTag::U1,
        );

        set_register(&mut row, IntermRegister::Ia, &leaf);
        set_register(&mut row, IntermRegister::Ib, &index);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = MemoryTag::U1.as_ff();

        Ok(self.finish(row, opcode, error, 0))
    }

    pub(super) fn op_note_hash_exists(
        &mut self,
        indirect: u8,
        note_hash_offset: u32,
        leaf_index_offset: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        self.op_leaf_exists(
            OpCode::NoteHashExists,
            indirect,
            [note_hash_offset, leaf_index_offset, dst_offset],
        )
    }

    pub(super) fn op_l1_to_l2_msg_exists(
        &mut self,
        indirect: u8,
        msg_hash_offset: u32,
        leaf_index_offset: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        self.op_leaf_exists(
            OpCode::L1ToL2MsgExists,
            indirect,
            [msg_hash_offset, leaf_index_offset, dst_offset],
        )
    }

    /// Shared shape of EMITNOTEHASH and EMITNULLIFIER.
    fn op_emit_value(&mut self, opcode: OpCode, indirect: u8, offset: u32) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, opcode);
        let kind = match opcode {
            OpCode::EmitNoteHash => KernelOutput::EmitNoteHash,
            _ => KernelOutput::EmitNullifier,
        };

        let ([addr], mut error) = self.resolve(indirect.into(), [offset], clk);
        let value =
            self.constrained_read(clk, IntermRegister::Ia, addr, MemoryTag::FF, MemoryTag::FF);
        if !value.tag_match {
            error = error.or(AvmError::TagError);
        }
        error = error.or(self.side_effect_error(opcode, kind));

        if error.is_ok() {
            let counter = self.next_side_effect();
            match kind {
                KernelOutput::EmitNoteHash => {
                    self.kernel.op_emit_note_hash(clk, counter, value.val)
                }
                _ => self.kernel.op_emit_nullifier(clk, counter, value.val),
            }
        }

        set_register(&mut row, IntermRegister::Ia, &value);
        row.main_r_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, opcode, error, 0)
    }

    pub(super) fn op_emit_note_hash(&mut self, indirect: u8, note_hash_offset: u32) -> AvmError {
        self.op_emit_value(OpCode::EmitNoteHash, indirect, note_hash_offset)
    }

    pub(super) fn op_emit_nullifier(&mut self, indirect: u8, nullifier_offset: u32) -> AvmError {
        self.op_emit_value(OpCode::EmitNullifier, indirect, nullifier_offset)
    }

    /// Whether a nullifier exists is given by the side-effect hint of the
    /// current counter, non-zero meaning it exists. Existing and
    /// non-existing nullifiers are reported in separate output ranges.
    pub(super) fn op_nullifier_exists(
        &mut self,
        indirect: u8,
        nullifier_offset: u32,
        address_offset: u32,
        dst_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::NullifierExists);

        let ([nullifier_addr, address_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [nullifier_offset, address_offset, dst_offset], clk);
        let nullifier = self.constrained_read(
            clk,
            IntermRegister::Ia,
            nullifier_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        let address = self.constrained_read(
            clk,
            IntermRegister::Ib,
            address_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        if !(nullifier.tag_match && address.tag_match) {
            error = error.or(AvmError::TagError);
        }

        let exists = if error.is_ok() {
            let exists = self.hints.side_effect(self.side_effect_counter)? != FF::from(0u64);
            let kind = if exists {
                KernelOutput::NullifierExists
            } else {
                KernelOutput::NullifierNonExists
            };
            error = self.side_effect_error(OpCode::NullifierExists, kind);
            if error.is_ok() {
                let counter = self.next_side_effect();
                self.kernel.op_nullifier_exists(clk, counter, nullifier.val, exists);
            }
            exists && error.is_ok()
        } else {
            false
        };
        let c = self.constrained_write(
            clk,
            IntermRegister::Ic,
            dst_addr,
            ff_bool(exists),
            MemoryTag::FF,
            MemoryTag::U1,
        );

        set_register(&mut row, IntermRegister::Ia, &nullifier);
        set_register(&mut row, IntermRegister::Ib, &address);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = MemoryTag::FF.as_ff();
        row.main_w_in_tag = MemoryTag::U1.as_ff();

        Ok(self.finish(row, OpCode::NullifierExists, error, 0))
    }

    /// Writes one member of the instance deployed at the given address to
    /// `dst` and whether it exists to `exists`. Undeployed addresses give
    /// zero members.
    pub(super) fn op_get_contract_instance(
        &mut self,
        indirect: u8,
        address_offset: u32,
        dst_offset: u32,
        exists_offset: u32,
        member: u8,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::GetContractInstance);

        let ([address_addr, dst_addr, exists_addr], mut error) =
            self.resolve(indirect.into(), [address_offset, dst_offset, exists_offset], clk);
        let member = ContractInstanceMember::from_u8(member);
        if member.is_none() {
            error = error.or(AvmError::ContractInstanceMemberUnknown);
        }
        let address = self.constrained_read(
            clk,
            IntermRegister::Ia,
            address_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        if !address.tag_match {
            error = error.or(AvmError::TagError);
        }

        let (value, exists) = match member {
            Some(member) if error.is_ok() => {
                let instance = self.hints.contract_instance(address.val);
                let value = match member {
                    ContractInstanceMember::Deployer => instance.deployer_addr,
                    ContractInstanceMember::ClassId => instance.contract_class_id,
                    ContractInstanceMember::InitHash => instance.initialisation_hash,
                };
                (value, instance.exists)
            }
            _ => (FF::from(0u64), false),
        };
        let b = self.constrained_write(
            clk,
            IntermRegister::Ib,
            dst_addr,
            value,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        let c = self.constrained_write(
            clk,
            IntermRegister::Ic,
            exists_addr,
            ff_bool(exists),
            MemoryTag::FF,
            MemoryTag::U1,
        );

        set_register(&mut row, IntermRegister::Ia, &address);
        set_register(&mut row, IntermRegister::Ib, &b);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, OpCode::GetContractInstance, error, 0)
    }

    /// Emits the Poseidon2 hash of `log_size` field elements starting at
    /// `log`.
    pub(super) fn op_emit_unencrypted_log(
        &mut self,
        indirect: u8,
        log_offset: u32,
        log_size_offset: u32,
    ) -> Result<AvmError, ExecutionError> {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::EmitUnencryptedLog);

        let ([log_addr, size_addr], mut error) =
            self.resolve(indirect.into(), [log_offset, log_size_offset], clk);
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
        error = error.or(
            self.side_effect_error(OpCode::EmitUnencryptedLog, KernelOutput::EmitUnencryptedLog),
        );

        let mut dyn_gas = 0;
        if error.is_ok() {
            let len = ff_to_u32(size.val);
            dyn_gas = len;
            if self.check_slice(OpCode::EmitUnencryptedLog, len, len)? {
                let log: Vec<FF> = self
                    .mem
                    .read_slice(self.call_ptr, clk, log_addr.direct, len)
                    .into_iter()
                    .map(|read| read.val)
                    .collect();
                let log_hash = poseidon2::hash(&log);
                let counter = self.next_side_effect();
                self.kernel.op_emit_unencrypted_log(clk, counter, log_hash, size.val);
                row.main_ia = log_hash;
            }
        }

        set_register(&mut row, IntermRegister::Ib, &size);
        row.main_r_in_tag = MemoryTag::U32.as_ff();

        Ok(self.finish(row, OpCode::EmitUnencryptedLog, error, dyn_gas))
    }

    pub(super) fn op_emit_l2_to_l1_msg(
        &mut self,
        indirect: u8,
        recipient_offset: u32,
        content_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let mut row = self.new_row(clk, OpCode::SendL2ToL1Msg);

        let ([recipient_addr, content_addr], mut error) =
            self.resolve(indirect.into(), [recipient_offset, content_offset], clk);
        let recipient = self.constrained_read(
            clk,
            IntermRegister::Ia,
            recipient_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        let content = self.constrained_read(
            clk,
            IntermRegister::Ib,
            content_addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        if !(recipient.tag_match && content.tag_match) {
            error = error.or(AvmError::TagError);
        }
        error = error.or(
            self.side_effect_error(OpCode::SendL2ToL1Msg, KernelOutput::EmitL2ToL1Msg),
        );

        if error.is_ok() {
            let counter = self.next_side_effect();
            self.kernel
                .op_emit_l2_to_l1_msg(clk, counter, content.val, recipient.val);
        }

        set_register(&mut row, IntermRegister::Ia, &recipient);
        set_register(&mut row, IntermRegister::Ib, &content);
        row.main_r_in_tag = MemoryTag::FF.as_ff();

        self.finish(row, OpCode::SendL2ToL1Msg, error, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TraceConfig;
    use crate::errors::{AvmError, ExecutionError};
    use crate::hints::{ContractInstanceHint, ExecutionHints};
    use crate::instruction::Instruction;
    use crate::kernel::PublicInputs;
    use crate::memory::MemoryTag;
    use crate::testing_utils::test_public_inputs;
    use crate::trace::AvmTraceBuilder;
    use crate::util::FF;

    fn builder(public_inputs: PublicInputs, hints: ExecutionHints) -> AvmTraceBuilder {
        let _ = pretty_env_logger::try_init();
        AvmTraceBuilder::new(public_inputs, vec![], hints, TraceConfig::testing())
    }

    fn set_ff(trace: &mut AvmTraceBuilder, value: u64, dst: u32) {
        trace
            .execute(&Instruction::set(MemoryTag::FF, FF::from(value), dst))
            .unwrap();
    }

    #[test]
    fn sstore_then_sload() {
        let hints = ExecutionHints::default().with_side_effect_hints([(1, FF::from(99u64))]);
        let mut trace = builder(test_public_inputs(), hints);
        set_ff(&mut trace, 5, 0);
        set_ff(&mut trace, 7, 1);
        let error = trace
            .execute(&Instruction::SStore {
                indirect: 0,
                src: 0,
                slot: 1,
            })
            .unwrap();
        assert!(error.is_ok());
        assert_eq!(trace.side_effect_counter(), 1);

        let error = trace
            .execute(&Instruction::SLoad {
                indirect: 0,
                slot: 1,
                dst: 2,
            })
            .unwrap();
        assert!(error.is_ok());
        assert_eq!(trace.memory().unconstrained_read(0, 2).val, FF::from(99u64));
        assert_eq!(trace.side_effect_counter(), 2);
    }

    #[test]
    fn missing_sload_hint_is_fatal() {
        let mut trace = builder(test_public_inputs(), ExecutionHints::default());
        set_ff(&mut trace, 1, 0);
        let err = trace
            .execute(&Instruction::SLoad {
                indirect: 0,
                slot: 0,
                dst: 1,
            })
            .unwrap_err();
        assert!(matches!(err, ExecutionError::MissingHint { .. }));
    }

    #[test]
    fn static_context_rejects_mutations() {
        let public_inputs = PublicInputs {
            is_static_call: true,
            ..test_public_inputs()
        };
        let mut trace = builder(public_inputs, ExecutionHints::default());
        set_ff(&mut trace, 1, 0);
        let error = trace
            .execute(&Instruction::EmitNullifier {
                indirect: 0,
                nullifier: 0,
            })
            .unwrap();
        assert_eq!(error, AvmError::StaticCallAlteration);
        assert_eq!(trace.side_effect_counter(), 0);
        assert!(trace.kernel().is_empty());
    }

    #[test]
    fn l2_to_l1_messages_are_limited() {
        let mut trace = builder(test_public_inputs(), ExecutionHints::default());
        set_ff(&mut trace, 1, 0);
        set_ff(&mut trace, 2, 1);
        let send = Instruction::SendL2ToL1Msg {
            indirect: 0,
            recipient: 0,
            content: 1,
        };
        assert!(trace.execute(&send).unwrap().is_ok());
        assert!(trace.execute(&send).unwrap().is_ok());
        assert_eq!(trace.execute(&send).unwrap(), AvmError::SideEffectLimitReached);
        assert_eq!(trace.side_effect_counter(), 2);
    }

    #[test]
    fn existence_checks_write_u1() {
        let hints = ExecutionHints::default()
            .with_leaf_index_hints([(FF::from(3u64), true)])
            .with_side_effect_hints([(1, FF::from(0u64))]);
        let mut trace = builder(test_public_inputs(), hints);
        set_ff(&mut trace, 11, 0);
        set_ff(&mut trace, 3, 1);
        trace
            .execute(&Instruction::NoteHashExists {
                indirect: 0,
                note_hash: 0,
                leaf_index: 1,
                dst: 2,
            })
            .unwrap();
        let cell = trace.memory().unconstrained_read(0, 2);
        assert_eq!((cell.val, cell.tag), (FF::from(1u64), MemoryTag::U1));

        trace
            .execute(&Instruction::NullifierExists {
                indirect: 0,
                nullifier: 0,
                address: 1,
                dst: 3,
            })
            .unwrap();
        let cell = trace.memory().unconstrained_read(0, 3);
        assert_eq!((cell.val, cell.tag), (FF::from(0u64), MemoryTag::U1));
        assert_eq!(trace.side_effect_counter(), 2);
    }

    #[test]
    fn contract_instance_members() {
        let hints = ExecutionHints::default().with_contract_instance_hints([ContractInstanceHint {
            address: FF::from(8u64),
            exists: true,
            deployer_addr: FF::from(1u64),
            contract_class_id: FF::from(2u64),
            initialisation_hash: FF::from(3u64),
        }]);
        let mut trace = builder(test_public_inputs(), hints);
        set_ff(&mut trace, 8, 0);
        let get = |member| Instruction::GetContractInstance {
            indirect: 0,
            address: 0,
            dst: 1,
            exists: 2,
            member,
        };
        assert!(trace.execute(&get(1)).unwrap().is_ok());
        assert_eq!(trace.memory().unconstrained_read(0, 1).val, FF::from(2u64));
        assert_eq!(trace.memory().unconstrained_read(0, 2).val, FF::from(1u64));
        assert_eq!(
            trace.execute(&get(3)).unwrap(),
            AvmError::ContractInstanceMemberUnknown
        );
        assert_eq!(trace.memory().unconstrained_read(0, 2).val, FF::from(0u64));
    }

    #[test]
    fn unencrypted_log_hashes_its_fields() {
        let mut trace = builder(test_public_inputs(), ExecutionHints::default());
        set_ff(&mut trace, 4, 10);
        set_ff(&mut trace, 5, 11);
        trace
            .execute(&Instruction::set(MemoryTag::U32, FF::from(2u64), 0))
            .unwrap();
        let error = trace
            .execute(&Instruction::EmitUnencryptedLog {
                indirect: 0,
                log: 10,
                log_size: 0,
            })
            .unwrap();
        assert!(error.is_ok());
        let (values, _, lengths) = trace.kernel().kernel_outputs();
        let offset = crate::kernel::KernelOutput::EmitUnencryptedLog.start();
        assert_eq!(
            values[offset],
            crate::gadgets::poseidon2::hash(&[FF::from(4u64), FF::from(5u64)])
        );
        assert_eq!(lengths[offset], FF::from(2u64));
    }
}
