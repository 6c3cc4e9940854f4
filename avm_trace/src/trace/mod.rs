//! The main trace assembler.
//!
//! [`AvmTraceBuilder`] owns every sub-trace builder. Each opcode handler
//! resolves its operands, performs its memory reads, delegates to a gadget
//! when the reads are valid, writes its results, charges gas and appends
//! exactly one row to the main trace. Errors are recorded in the row; the
//! handlers only fail for conditions that halt the execution.

mod arithmetic;
mod bitwise;
mod control_flow;
mod environment;
mod external_call;
mod finalize;
mod gadgets;
mod memory_ops;
mod world_state;

use avm_common::{HALTED_PC, INTERNAL_CALL_SPACE_ID};
use hashbrown::{HashMap, HashSet};

use crate::addressing::{Addressing, ResolvedAddress};
use crate::bytecode::BytecodeTraceBuilder;
use crate::columns::Row;
use crate::config::TraceConfig;
use crate::errors::{AvmError, ExecutionError};
use crate::gadgets::alu::AluTraceBuilder;
use crate::gadgets::binary::BinaryTraceBuilder;
use crate::gadgets::conversion::ConversionTraceBuilder;
use crate::gadgets::ecc::EccTraceBuilder;
use crate::gadgets::keccak::KeccakTraceBuilder;
use crate::gadgets::poseidon2::Poseidon2TraceBuilder;
use crate::gadgets::sha256::Sha256TraceBuilder;
use crate::gas::{GasTraceBuilder, ReservedGas};
use crate::hints::{ExecutionHints, HintIndex};
use crate::instruction::Instruction;
use crate::kernel::{KernelTraceBuilder, PublicInputs};
use crate::memory::{IntermRegister, MemTraceBuilder, MemoryTag};
use crate::opcode::OpCode;
use crate::range_check::RangeCheckBuilder;
use crate::util::{ff_bool, FF};

/// One memory access of a handler, as seen by the main trace.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MemOp {
    pub val: FF,
    /// Tag of the cell after the access.
    pub tag: MemoryTag,
    pub tag_match: bool,
    pub address: ResolvedAddress,
    pub is_write: bool,
}

/// Copies a register access into the register columns of `row`.
pub(crate) fn set_register(row: &mut Row<FF>, reg: IntermRegister, op: &MemOp) {
    let one = FF::from(1u64);
    let direct = FF::from(op.address.direct);
    let indirect = FF::from(op.address.indirect.unwrap_or(0));
    let resolve = ff_bool(op.address.is_indirect());
    let rw = ff_bool(op.is_write);
    match reg {
        IntermRegister::Ia => {
            row.main_ia = op.val;
            row.main_mem_addr_a = direct;
            row.main_ind_addr_a = indirect;
            row.main_sel_mem_op_a = one;
            row.main_sel_resolve_ind_addr_a = resolve;
            row.main_rwa = rw;
        }
        IntermRegister::Ib => {
            row.main_ib = op.val;
            row.main_mem_addr_b = direct;
            row.main_ind_addr_b = indirect;
            row.main_sel_mem_op_b = one;
            row.main_sel_resolve_ind_addr_b = resolve;
            row.main_rwb = rw;
        }
        IntermRegister::Ic => {
            row.main_ic = op.val;
            row.main_mem_addr_c = direct;
            row.main_ind_addr_c = indirect;
            row.main_sel_mem_op_c = one;
            row.main_sel_resolve_ind_addr_c = resolve;
            row.main_rwc = rw;
        }
        IntermRegister::Id => {
            row.main_id = op.val;
            row.main_mem_addr_d = direct;
            row.main_ind_addr_d = indirect;
            row.main_sel_mem_op_d = one;
            row.main_sel_resolve_ind_addr_d = resolve;
            row.main_rwd = rw;
        }
    }
}

/// Sets the selector of `opcode`. GETENVVAR selects by variable and is
/// handled by its handler.
pub(crate) fn set_opcode_selector(row: &mut Row<FF>, opcode: OpCode) {
    let one = FF::from(1u64);
    let sel = match opcode {
        OpCode::Add => &mut row.main_sel_op_add,
        OpCode::Sub => &mut row.main_sel_op_sub,
        OpCode::Mul => &mut row.main_sel_op_mul,
        OpCode::Div => &mut row.main_sel_op_div,
        OpCode::FDiv => &mut row.main_sel_op_fdiv,
        OpCode::Eq => &mut row.main_sel_op_eq,
        OpCode::Lt => &mut row.main_sel_op_lt,
        OpCode::Lte => &mut row.main_sel_op_lte,
        OpCode::And => &mut row.main_sel_op_and,
        OpCode::Or => &mut row.main_sel_op_or,
        OpCode::Xor => &mut row.main_sel_op_xor,
        OpCode::Not => &mut row.main_sel_op_not,
        OpCode::Shl => &mut row.main_sel_op_shl,
        OpCode::Shr => &mut row.main_sel_op_shr,
        OpCode::Cast => &mut row.main_sel_op_cast,
        OpCode::GetEnvVar => return,
        OpCode::CalldataCopy => &mut row.main_sel_op_calldata_copy,
        OpCode::ReturndataSize => &mut row.main_sel_op_returndata_size,
        OpCode::ReturndataCopy => &mut row.main_sel_op_returndata_copy,
        OpCode::Jump => &mut row.main_sel_op_jump,
        OpCode::JumpI => &mut row.main_sel_op_jumpi,
        OpCode::InternalCall => &mut row.main_sel_op_internal_call,
        OpCode::InternalReturn => &mut row.main_sel_op_internal_return,
        OpCode::Set => &mut row.main_sel_op_set,
        OpCode::Mov => &mut row.main_sel_op_mov,
        OpCode::SLoad => &mut row.main_sel_op_sload,
        OpCode::SStore => &mut row.main_sel_op_sstore,
        OpCode::NoteHashExists => &mut row.main_sel_op_note_hash_exists,
        OpCode::EmitNoteHash => &mut row.main_sel_op_emit_note_hash,
        OpCode::NullifierExists => &mut row.main_sel_op_nullifier_exists,
        OpCode::EmitNullifier => &mut row.main_sel_op_emit_nullifier,
        OpCode::L1ToL2MsgExists => &mut row.main_sel_op_l1_to_l2_msg_exists,
        OpCode::GetContractInstance => &mut row.main_sel_op_get_contract_instance,
        OpCode::EmitUnencryptedLog => &mut row.main_sel_op_emit_unencrypted_log,
        OpCode::SendL2ToL1Msg => &mut row.main_sel_op_emit_l2_to_l1_msg,
        OpCode::Call => &mut row.main_sel_op_external_call,
        OpCode::StaticCall => &mut row.main_sel_op_static_call,
        OpCode::Return => &mut row.main_sel_op_external_return,
        OpCode::Revert => &mut row.main_sel_op_external_revert,
        OpCode::DebugLog => &mut row.main_sel_op_debug_log,
        OpCode::Poseidon2Perm => &mut row.main_sel_op_poseidon2,
        OpCode::Sha256Compression => &mut row.main_sel_op_sha256,
        OpCode::KeccakF1600 => &mut row.main_sel_op_keccak,
        OpCode::EcAdd => &mut row.main_sel_op_ecadd,
        OpCode::Msm => &mut row.main_sel_op_msm,
        OpCode::ToRadixLe => &mut row.main_sel_op_radix_le,
        OpCode::ToRadixBe => &mut row.main_sel_op_radix_be,
    };
    *sel = one;
}

/// A CALL or STATICCALL executing in the trace, with the state its caller
/// resumes from.
#[derive(Clone, Debug)]
pub(crate) struct NestedCall {
    pub contract_address: FF,
    pub sender: FF,
    pub is_static: bool,
    pub calldata: Vec<FF>,
    caller_call_ptr: u8,
    resume_pc: u32,
    /// Caller cell receiving the U1 success flag.
    success_addr: u32,
    caller_internal_return_ptr: u32,
    caller_internal_call_base: u32,
    reserved_gas: ReservedGas,
}

#[derive(Debug)]
pub struct AvmTraceBuilder {
    config: TraceConfig,
    main_trace: Vec<Row<FF>>,

    pc: u32,
    internal_return_ptr: u32,
    /// Internal call stack slot of the first frame of the current call.
    internal_call_base: u32,
    call_ptr: u8,
    side_effect_counter: u32,
    external_call_counter: u32,
    /// Nested calls in progress, innermost last.
    nested_calls: Vec<NestedCall>,
    next_context_id: u8,
    /// Contracts whose code runs in the trace when called. Calls to any
    /// other contract are resolved from their hint.
    in_trace_contracts: HashSet<FF>,

    public_inputs: PublicInputs,
    hints: HintIndex,
    calldata: Vec<FF>,
    /// Output of RETURN or REVERT.
    returndata: Vec<FF>,
    /// Return data of the last nested call.
    nested_returndata: Vec<FF>,
    calldata_lookup_counts: HashMap<usize, u32>,
    returndata_lookup_counts: HashMap<usize, u32>,

    mem: MemTraceBuilder,
    alu: AluTraceBuilder,
    bin: BinaryTraceBuilder,
    gas: GasTraceBuilder,
    kernel: KernelTraceBuilder,
    conversion: ConversionTraceBuilder,
    sha256: Sha256TraceBuilder,
    poseidon2: Poseidon2TraceBuilder,
    keccak: KeccakTraceBuilder,
    ecc: EccTraceBuilder,
    range_check: RangeCheckBuilder,
    bytecode: BytecodeTraceBuilder,
}

impl AvmTraceBuilder {
    pub fn new(
        public_inputs: PublicInputs,
        calldata: Vec<FF>,
        hints: ExecutionHints,
        config: TraceConfig,
    ) -> Self {
        let mut gas = GasTraceBuilder::new();
        gas.set_initial_gas(public_inputs.l2_gas_limit, public_inputs.da_gas_limit);
        Self {
            config,
            main_trace: vec![],
            pc: 0,
            internal_return_ptr: 0,
            internal_call_base: 0,
            call_ptr: 0,
            side_effect_counter: public_inputs.start_side_effect_counter,
            external_call_counter: 0,
            nested_calls: vec![],
            next_context_id: 1,
            in_trace_contracts: HashSet::new(),
            kernel: KernelTraceBuilder::new(public_inputs.kernel_inputs()),
            public_inputs,
            hints: HintIndex::from(hints),
            calldata,
            returndata: vec![],
            nested_returndata: vec![],
            calldata_lookup_counts: HashMap::new(),
            returndata_lookup_counts: HashMap::new(),
            mem: MemTraceBuilder::new(),
            alu: AluTraceBuilder::new(),
            bin: BinaryTraceBuilder::new(),
            gas,
            conversion: ConversionTraceBuilder::new(),
            sha256: Sha256TraceBuilder::new(),
            poseidon2: Poseidon2TraceBuilder::new(),
            keccak: KeccakTraceBuilder::new(),
            ecc: EccTraceBuilder::new(),
            range_check: RangeCheckBuilder::new(),
            bytecode: BytecodeTraceBuilder::default(),
        }
    }

    /// Registers the bytecode whose hash decomposition goes into the trace.
    pub fn with_bytecode(mut self, bytecodes: Vec<Vec<u8>>) -> Self {
        self.bytecode = BytecodeTraceBuilder::new(bytecodes);
        self
    }

    /// Makes calls to `address` run in the trace instead of being resolved
    /// from a hint. `bytecode` joins the bytecode columns when given.
    pub fn register_contract(&mut self, address: FF, bytecode: Option<Vec<u8>>) {
        self.in_trace_contracts.insert(address);
        if let Some(bytecode) = bytecode {
            self.bytecode.push_bytecode(bytecode);
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Number of nested calls in progress.
    pub fn call_depth(&self) -> usize {
        self.nested_calls.len()
    }

    /// Address of the contract whose code is executing.
    pub fn contract_address(&self) -> FF {
        self.nested_calls
            .last()
            .map_or(self.public_inputs.address, |call| call.contract_address)
    }

    pub(crate) fn is_static_context(&self) -> bool {
        self.nested_calls
            .last()
            .map_or(self.public_inputs.is_static_call, |call| call.is_static)
    }

    pub(crate) fn current_calldata(&self) -> &[FF] {
        self.nested_calls
            .last()
            .map_or(&self.calldata, |call| &call.calldata)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn is_halted(&self) -> bool {
        self.pc == HALTED_PC
    }

    pub fn side_effect_counter(&self) -> u32 {
        self.side_effect_counter
    }

    pub fn internal_return_ptr(&self) -> u32 {
        self.internal_return_ptr
    }

    pub fn returndata(&self) -> &[FF] {
        &self.returndata
    }

    pub fn main_trace_len(&self) -> usize {
        self.main_trace.len()
    }

    /// Remaining `(l2, da)` gas.
    pub fn gas_left(&self) -> (u32, u32) {
        (self.gas.l2_gas_left(), self.gas.da_gas_left())
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.gas.is_out_of_gas()
    }

    pub fn memory(&self) -> &MemTraceBuilder {
        &self.mem
    }

    pub fn kernel(&self) -> &KernelTraceBuilder {
        &self.kernel
    }

    /// Executes one instruction.
    pub fn execute(&mut self, instruction: &Instruction) -> Result<AvmError, ExecutionError> {
        let error = match *instruction {
            Instruction::Arithmetic {
                op,
                indirect,
                a,
                b,
                dst,
            } => self.op_arithmetic(op, indirect, a, b, dst),
            Instruction::Bitwise {
                op,
                indirect,
                a,
                b,
                dst,
            } => self.op_bitwise(op, indirect, a, b, dst),
            Instruction::Not { indirect, src, dst } => self.op_not(indirect, src, dst),
            Instruction::Cast {
                indirect,
                src,
                dst,
                dst_tag,
            } => self.op_cast(indirect, src, dst, dst_tag),
            Instruction::Set {
                indirect,
                tag,
                value,
                dst,
            } => self.op_set(indirect, value, dst, tag),
            Instruction::Mov { indirect, src, dst } => self.op_mov(indirect, src, dst),
            Instruction::GetEnvVar { indirect, var, dst } => {
                self.op_get_env_var(indirect, dst, var)
            }
            Instruction::CalldataCopy {
                indirect,
                cd_offset,
                copy_size,
                dst,
            } => self.op_calldata_copy(indirect, cd_offset, copy_size, dst)?,
            Instruction::ReturndataSize { indirect, dst } => {
                self.op_returndata_size(indirect, dst)
            }
            Instruction::ReturndataCopy {
                indirect,
                rd_offset,
                copy_size,
                dst,
            } => self.op_returndata_copy(indirect, rd_offset, copy_size, dst)?,
            Instruction::Jump { loc } => self.op_jump(loc),
            Instruction::JumpI {
                indirect,
                loc,
                cond,
            } => self.op_jumpi(indirect, loc, cond),
            Instruction::InternalCall { loc } => self.op_internal_call(loc),
            Instruction::InternalReturn => self.op_internal_return()?,
            Instruction::SLoad {
                indirect,
                slot,
                dst,
            } => self.op_sload(indirect, slot, dst)?,
            Instruction::SStore {
                indirect,
                src,
                slot,
            } => self.op_sstore(indirect, src, slot),
            Instruction::NoteHashExists {
                indirect,
                note_hash,
                leaf_index,
                dst,
            } => self.op_note_hash_exists(indirect, note_hash, leaf_index, dst)?,
            Instruction::EmitNoteHash {
                indirect,
                note_hash,
            } => self.op_emit_note_hash(indirect, note_hash),
            Instruction::NullifierExists {
                indirect,
                nullifier,
                address,
                dst,
            } => self.op_nullifier_exists(indirect, nullifier, address, dst)?,
            Instruction::EmitNullifier {
                indirect,
                nullifier,
            } => self.op_emit_nullifier(indirect, nullifier),
            Instruction::L1ToL2MsgExists {
                indirect,
                msg_hash,
                leaf_index,
                dst,
            } => self.op_l1_to_l2_msg_exists(indirect, msg_hash, leaf_index, dst)?,
            Instruction::GetContractInstance {
                indirect,
                address,
                dst,
                exists,
                member,
            } => self.op_get_contract_instance(indirect, address, dst, exists, member),
            Instruction::EmitUnencryptedLog {
                indirect,
                log,
                log_size,
            } => self.op_emit_unencrypted_log(indirect, log, log_size)?,
            Instruction::SendL2ToL1Msg {
                indirect,
                recipient,
                content,
            } => self.op_emit_l2_to_l1_msg(indirect, recipient, content),
            Instruction::ExternalCall {
                kind,
                indirect,
                gas,
                address,
                args,
                args_size,
                success,
            } => self.op_call(kind, indirect, gas, address, args, args_size, success)?,
            Instruction::Return {
                indirect,
                offset,
                size_offset,
            } => self.op_return(indirect, offset, size_offset)?,
            Instruction::Revert {
                indirect,
                offset,
                size_offset,
            } => self.op_revert(indirect, offset, size_offset)?,
            Instruction::DebugLog {
                indirect,
                message,
                fields,
                fields_size,
                message_size,
            } => self.op_debug_log(indirect, message, fields, fields_size, message_size)?,
            Instruction::Poseidon2Perm {
                indirect,
                input,
                output,
            } => self.op_poseidon2_permutation(indirect, input, output),
            Instruction::Sha256Compression {
                indirect,
                output,
                state,
                input,
            } => self.op_sha256_compression(indirect, output, state, input),
            Instruction::KeccakF1600 {
                indirect,
                output,
                input,
            } => self.op_keccakf1600(indirect, output, input),
            Instruction::EcAdd {
                indirect,
                p1_x,
                p1_y,
                p1_inf,
                p2_x,
                p2_y,
                p2_inf,
                output,
            } => {
                let operands = [p1_x, p1_y, p1_inf, p2_x, p2_y, p2_inf, output];
                self.op_ec_add(indirect, operands)
            }
            Instruction::Msm {
                indirect,
                points,
                scalars,
                output,
                point_length,
            } => self.op_variable_msm(indirect, points, scalars, output, point_length)?,
            Instruction::ToRadix {
                order,
                indirect,
                src,
                dst,
                radix,
                num_limbs,
                output_bits,
            } => {
                self.op_to_radix(order, indirect, src, dst, radix, num_limbs, output_bits)?
            }
        };
        Ok(error)
    }

    // Helpers shared by the handlers.

    /// Clock of the next row. Clock 0 is the sentinel first row inserted at
    /// finalization.
    pub(crate) fn next_clk(&self) -> u32 {
        self.main_trace.len() as u32 + 1
    }

    /// A row with the context columns of the current state and the selector
    /// of `opcode`.
    pub(crate) fn new_row(&self, clk: u32, opcode: OpCode) -> Row<FF> {
        let mut row = Row::<FF> {
            main_clk: FF::from(clk),
            main_pc: FF::from(self.pc),
            main_call_ptr: FF::from(self.call_ptr as u64),
            main_internal_return_ptr: FF::from(self.internal_return_ptr),
            main_side_effect_counter: FF::from(self.side_effect_counter),
            ..Default::default()
        };
        set_opcode_selector(&mut row, opcode);
        row
    }

    pub(crate) fn resolve<const N: usize>(
        &mut self,
        indirect: u16,
        offsets: [u32; N],
        clk: u32,
    ) -> ([ResolvedAddress; N], AvmError) {
        Addressing::<N>::from_wire(indirect, self.call_ptr).resolve(offsets, clk, &mut self.mem)
    }

    pub(crate) fn constrained_read(
        &mut self,
        clk: u32,
        reg: IntermRegister,
        address: ResolvedAddress,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) -> MemOp {
        let read = self.mem.read_and_load_from_memory(
            self.call_ptr,
            clk,
            reg,
            address.direct,
            r_in_tag,
            w_in_tag,
        );
        MemOp {
            val: read.val,
            tag: read.tag,
            tag_match: read.tag_match,
            address,
            is_write: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn constrained_write(
        &mut self,
        clk: u32,
        reg: IntermRegister,
        address: ResolvedAddress,
        val: FF,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) -> MemOp {
        self.mem.write_into_memory(
            self.call_ptr,
            clk,
            reg,
            address.direct,
            val,
            r_in_tag,
            w_in_tag,
        );
        MemOp {
            val,
            tag: w_in_tag,
            tag_match: true,
            address,
            is_write: true,
        }
    }

    /// Value of a cell, without logging an access.
    pub(crate) fn unconstrained_read(&self, addr: u32) -> FF {
        self.mem.unconstrained_read(self.call_ptr, addr).val
    }

    pub(crate) fn check_tag(&self, addr: u32, tag: MemoryTag) -> bool {
        self.mem.check_tag(self.call_ptr, addr, tag)
    }

    pub(crate) fn check_tag_range(&self, addr: u32, len: u32, tag: MemoryTag) -> bool {
        self.mem.check_tag_range(self.call_ptr, addr, len, tag)
    }

    /// Writes `len` zeros tagged `tag`: the output of a skipped gadget.
    /// `len` must have passed [`Self::check_slice`].
    pub(crate) fn write_zeros(&mut self, clk: u32, addr: u32, tag: MemoryTag, len: u32) {
        let zeros = vec![FF::from(0u64); len as usize];
        self.mem.write_slice(self.call_ptr, clk, addr, tag, &zeros);
    }

    /// Decides whether an instruction accessing `len` memory cells, charged
    /// with `dyn_gas_multiplier`, performs its accesses. Returns false if it
    /// cannot pay for them: the caller then skips every slice access and
    /// only charges the gas, which runs out. An affordable range longer than
    /// [`TraceConfig::max_slice_len`] stops the execution.
    pub(crate) fn check_slice(
        &self,
        opcode: OpCode,
        dyn_gas_multiplier: u32,
        len: u32,
    ) -> Result<bool, ExecutionError> {
        if !self.gas.can_afford(opcode, dyn_gas_multiplier) {
            log::debug!("{opcode} cannot pay for {len} memory cells");
            return Ok(false);
        }
        let max = self.config.max_slice_len;
        if len > max {
            return Err(ExecutionError::SliceTooLarge { opcode, len, max });
        }
        Ok(true)
    }

    /// Appends `row` with its error flag and charges the gas of `opcode`,
    /// without touching the program counter.
    pub(crate) fn commit_row(
        &mut self,
        row: Row<FF>,
        opcode: OpCode,
        error: AvmError,
        dyn_gas_multiplier: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        self.gas.constrain_gas(clk, opcode, dyn_gas_multiplier);
        self.push_row(row, error)
    }

    /// Appends `row` for handlers that already charged their gas.
    pub(crate) fn push_row(&mut self, mut row: Row<FF>, error: AvmError) -> AvmError {
        row.main_op_err = ff_bool(!error.is_ok());
        self.main_trace.push(row);
        error
    }

    /// [`Self::commit_row`], then advances the program counter past the
    /// instruction.
    pub(crate) fn finish(
        &mut self,
        row: Row<FF>,
        opcode: OpCode,
        error: AvmError,
        dyn_gas_multiplier: u32,
    ) -> AvmError {
        let error = self.commit_row(row, opcode, error, dyn_gas_multiplier);
        self.advance_pc(opcode);
        error
    }

    pub(crate) fn advance_pc(&mut self, opcode: OpCode) {
        self.pc = self.pc.wrapping_add(opcode.encoded_width());
    }

    /// Marks the execution as halted.
    pub(crate) fn halt(&mut self) {
        self.pc = HALTED_PC;
    }

    /// Enters a nested call of `contract_address`. The caller resumes at the
    /// current program counter.
    pub(crate) fn enter_call(
        &mut self,
        contract_address: FF,
        is_static: bool,
        calldata: Vec<FF>,
        success_addr: u32,
        gas: (u32, u32),
    ) -> Result<(), ExecutionError> {
        if self.next_context_id == INTERNAL_CALL_SPACE_ID {
            return Err(ExecutionError::CallContextsExhausted);
        }
        let reserved_gas = self.gas.allocate_for_call(gas.0, gas.1);
        self.nested_calls.push(NestedCall {
            contract_address,
            sender: self.contract_address(),
            is_static: is_static || self.is_static_context(),
            calldata,
            caller_call_ptr: self.call_ptr,
            resume_pc: self.pc,
            success_addr,
            caller_internal_return_ptr: self.internal_return_ptr,
            caller_internal_call_base: self.internal_call_base,
            reserved_gas,
        });
        self.call_ptr = self.next_context_id;
        self.next_context_id += 1;
        self.internal_call_base = self.internal_return_ptr;
        self.nested_returndata.clear();
        self.pc = 0;
        Ok(())
    }

    /// Leaves the current nested call and resumes its caller, which sees
    /// `success` in its success cell and `returndata` as the return data of
    /// its last call. Halts instead when no nested call is in progress.
    pub(crate) fn return_to_caller(
        &mut self,
        success: bool,
        returndata: Vec<FF>,
        exceptional: bool,
    ) {
        let Some(call) = self.nested_calls.pop() else {
            self.halt();
            return;
        };
        log::debug!(
            "leaving call of {} at depth {}: success {success}",
            call.contract_address,
            self.nested_calls.len() + 1
        );
        self.gas.return_from_call(call.reserved_gas, exceptional);
        self.call_ptr = call.caller_call_ptr;
        self.internal_return_ptr = call.caller_internal_return_ptr;
        self.internal_call_base = call.caller_internal_call_base;
        self.pc = call.resume_pc;
        self.nested_returndata = returndata;
        let clk = self.main_trace.len() as u32;
        let success = [ff_bool(success)];
        self.mem
            .write_slice(self.call_ptr, clk, call.success_addr, MemoryTag::U1, &success);
    }

    /// Stops the current call after a condition it cannot recover from. A
    /// nested call returns to its caller as failed, with nothing left of
    /// its gas. The top-level call halts.
    pub fn exceptional_halt(&mut self) {
        self.return_to_caller(false, vec![], true);
    }

    /// Clears every sub-trace and the execution state so that the builder
    /// can run another execution with the same inputs.
    pub fn reset(&mut self) {
        self.main_trace.clear();
        self.pc = 0;
        self.internal_return_ptr = 0;
        self.internal_call_base = 0;
        self.call_ptr = 0;
        self.side_effect_counter = self.public_inputs.start_side_effect_counter;
        self.external_call_counter = 0;
        self.nested_calls.clear();
        self.next_context_id = 1;
        self.returndata.clear();
        self.nested_returndata.clear();
        self.calldata_lookup_counts.clear();
        self.returndata_lookup_counts.clear();

        self.mem.reset();
        self.alu.reset();
        self.bin.reset();
        self.gas.reset();
        self.gas
            .set_initial_gas(self.public_inputs.l2_gas_limit, self.public_inputs.da_gas_limit);
        self.kernel.reset();
        self.conversion.reset();
        self.sha256.reset();
        self.poseidon2.reset();
        self.keccak.reset();
        self.ecc.reset();
        self.range_check.reset();
        self.bytecode.reset();
    }
}
