//! Public inputs and the kernel lookups of the main trace.
//!
//! Environment reads look values up in the fixed public-input column.
//! World-state operations write `(value, side effect counter, metadata)` to
//! the public-output columns, each kind of operation into its own contiguous
//! range of offsets.

use avm_common::kernel_inputs::{self, KERNEL_INPUTS_LENGTH};
use avm_common::kernel_limits::*;
use avm_common::kernel_outputs::*;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::columns::Row;
use crate::util::{ff_bool, ff_serde, FF};

/// Public inputs of one execution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicInputs {
    #[serde(with = "ff_serde")]
    pub address: FF,
    #[serde(with = "ff_serde")]
    pub sender: FF,
    pub is_static_call: bool,
    #[serde(with = "ff_serde")]
    pub chain_id: FF,
    #[serde(with = "ff_serde")]
    pub version: FF,
    #[serde(with = "ff_serde")]
    pub block_number: FF,
    #[serde(with = "ff_serde")]
    pub timestamp: FF,
    #[serde(with = "ff_serde")]
    pub fee_per_da_gas: FF,
    #[serde(with = "ff_serde")]
    pub fee_per_l2_gas: FF,
    #[serde(with = "ff_serde")]
    pub transaction_fee: FF,
    pub l2_gas_limit: u32,
    pub da_gas_limit: u32,
    /// Gas the execution is expected to leave, when known.
    pub l2_end_gas: u32,
    pub da_end_gas: u32,
    pub start_side_effect_counter: u32,
}

impl PublicInputs {
    /// The kernel public-input column.
    pub fn kernel_inputs(&self) -> [FF; KERNEL_INPUTS_LENGTH] {
        let mut inputs = [FF::from(0u64); KERNEL_INPUTS_LENGTH];
        inputs[kernel_inputs::ADDRESS] = self.address;
        inputs[kernel_inputs::SENDER] = self.sender;
        inputs[kernel_inputs::IS_STATIC_CALL] = ff_bool(self.is_static_call);
        inputs[kernel_inputs::CHAIN_ID] = self.chain_id;
        inputs[kernel_inputs::VERSION] = self.version;
        inputs[kernel_inputs::BLOCK_NUMBER] = self.block_number;
        inputs[kernel_inputs::TIMESTAMP] = self.timestamp;
        inputs[kernel_inputs::FEE_PER_DA_GAS] = self.fee_per_da_gas;
        inputs[kernel_inputs::FEE_PER_L2_GAS] = self.fee_per_l2_gas;
        inputs[kernel_inputs::TRANSACTION_FEE] = self.transaction_fee;
        inputs[kernel_inputs::DA_START_GAS] = FF::from(self.da_gas_limit);
        inputs[kernel_inputs::L2_START_GAS] = FF::from(self.l2_gas_limit);
        inputs[kernel_inputs::DA_END_GAS] = FF::from(self.da_end_gas);
        inputs[kernel_inputs::L2_END_GAS] = FF::from(self.l2_end_gas);
        inputs
    }
}

/// Environment values read from the kernel public inputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KernelInput {
    Address,
    Sender,
    TransactionFee,
    ChainId,
    Version,
    BlockNumber,
    Timestamp,
    FeePerL2Gas,
    FeePerDaGas,
    IsStaticCall,
}

impl KernelInput {
    pub const fn offset(self) -> usize {
        match self {
            KernelInput::Address => kernel_inputs::ADDRESS,
            KernelInput::Sender => kernel_inputs::SENDER,
            KernelInput::TransactionFee => kernel_inputs::TRANSACTION_FEE,
            KernelInput::ChainId => kernel_inputs::CHAIN_ID,
            KernelInput::Version => kernel_inputs::VERSION,
            KernelInput::BlockNumber => kernel_inputs::BLOCK_NUMBER,
            KernelInput::Timestamp => kernel_inputs::TIMESTAMP,
            KernelInput::FeePerL2Gas => kernel_inputs::FEE_PER_L2_GAS,
            KernelInput::FeePerDaGas => kernel_inputs::FEE_PER_DA_GAS,
            KernelInput::IsStaticCall => kernel_inputs::IS_STATIC_CALL,
        }
    }
}

/// Kinds of kernel outputs, each owning a range of output offsets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum KernelOutput {
    NoteHashExists,
    NullifierExists,
    NullifierNonExists,
    L1ToL2MsgExists,
    SStore,
    SLoad,
    EmitNoteHash,
    EmitNullifier,
    EmitL2ToL1Msg,
    EmitUnencryptedLog,
}

impl KernelOutput {
    pub const ALL: [KernelOutput; 10] = [
        KernelOutput::NoteHashExists,
        KernelOutput::NullifierExists,
        KernelOutput::NullifierNonExists,
        KernelOutput::L1ToL2MsgExists,
        KernelOutput::SStore,
        KernelOutput::SLoad,
        KernelOutput::EmitNoteHash,
        KernelOutput::EmitNullifier,
        KernelOutput::EmitL2ToL1Msg,
        KernelOutput::EmitUnencryptedLog,
    ];

    pub const fn start(self) -> usize {
        match self {
            KernelOutput::NoteHashExists => START_NOTE_HASH_EXISTS_WRITE_OFFSET,
            KernelOutput::NullifierExists => START_NULLIFIER_EXISTS_OFFSET,
            KernelOutput::NullifierNonExists => START_NULLIFIER_NON_EXISTS_OFFSET,
            KernelOutput::L1ToL2MsgExists => START_L1_TO_L2_MSG_EXISTS_WRITE_OFFSET,
            KernelOutput::SStore => START_SSTORE_WRITE_OFFSET,
            KernelOutput::SLoad => START_SLOAD_WRITE_OFFSET,
            KernelOutput::EmitNoteHash => START_EMIT_NOTE_HASH_WRITE_OFFSET,
            KernelOutput::EmitNullifier => START_EMIT_NULLIFIER_WRITE_OFFSET,
            KernelOutput::EmitL2ToL1Msg => START_EMIT_L2_TO_L1_MSG_WRITE_OFFSET,
            KernelOutput::EmitUnencryptedLog => START_EMIT_UNENCRYPTED_LOG_WRITE_OFFSET,
        }
    }

    /// Maximum number of outputs of this kind per call.
    pub const fn limit(self) -> usize {
        match self {
            KernelOutput::NoteHashExists => MAX_NOTE_HASH_READ_REQUESTS_PER_CALL,
            KernelOutput::NullifierExists => MAX_NULLIFIER_READ_REQUESTS_PER_CALL,
            KernelOutput::NullifierNonExists => MAX_NULLIFIER_NON_EXISTENT_READ_REQUESTS_PER_CALL,
            KernelOutput::L1ToL2MsgExists => MAX_L1_TO_L2_MSG_READ_REQUESTS_PER_CALL,
            KernelOutput::SStore => MAX_PUBLIC_DATA_UPDATE_REQUESTS_PER_CALL,
            KernelOutput::SLoad => MAX_PUBLIC_DATA_READS_PER_CALL,
            KernelOutput::EmitNoteHash => MAX_NOTE_HASHES_PER_CALL,
            KernelOutput::EmitNullifier => MAX_NULLIFIERS_PER_CALL,
            KernelOutput::EmitL2ToL1Msg => MAX_L2_TO_L1_MSGS_PER_CALL,
            KernelOutput::EmitUnencryptedLog => MAX_UNENCRYPTED_LOGS_PER_CALL,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KernelTraceOp {
    Input(KernelInput),
    Output(KernelOutput),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KernelTraceEntry {
    pub clk: u32,
    pub kernel_in_offset: usize,
    pub kernel_out_offset: usize,
    pub operation: KernelTraceOp,
}

#[derive(Clone, Debug)]
pub struct KernelTraceBuilder {
    entries: Vec<KernelTraceEntry>,
    inputs: [FF; KERNEL_INPUTS_LENGTH],
    value_out: Vec<FF>,
    side_effect_out: Vec<FF>,
    metadata_out: Vec<FF>,
    /// Number of outputs written so far, per kind.
    write_counts: HashMap<KernelOutput, usize>,
    pub(crate) kernel_input_selector_counter: HashMap<usize, u32>,
    pub(crate) kernel_output_selector_counter: HashMap<usize, u32>,
}

impl Default for KernelTraceBuilder {
    fn default() -> Self {
        Self::new([FF::from(0u64); KERNEL_INPUTS_LENGTH])
    }
}

impl KernelTraceBuilder {
    pub fn new(inputs: [FF; KERNEL_INPUTS_LENGTH]) -> Self {
        Self {
            entries: vec![],
            inputs,
            value_out: vec![FF::from(0u64); KERNEL_OUTPUTS_LENGTH],
            side_effect_out: vec![FF::from(0u64); KERNEL_OUTPUTS_LENGTH],
            metadata_out: vec![FF::from(0u64); KERNEL_OUTPUTS_LENGTH],
            write_counts: HashMap::new(),
            kernel_input_selector_counter: HashMap::new(),
            kernel_output_selector_counter: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KernelTraceEntry] {
        &self.entries
    }

    pub fn kernel_inputs(&self) -> &[FF; KERNEL_INPUTS_LENGTH] {
        &self.inputs
    }

    /// The public-output columns: values, side effect counters and metadata.
    pub fn kernel_outputs(&self) -> (&[FF], &[FF], &[FF]) {
        (&self.value_out, &self.side_effect_out, &self.metadata_out)
    }

    /// Number of outputs of `kind` written so far.
    pub fn write_count(&self, kind: KernelOutput) -> usize {
        self.write_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Returns true if one more output of `kind` fits in its range.
    pub fn has_capacity(&self, kind: KernelOutput) -> bool {
        self.write_count(kind) < kind.limit()
    }

    /// Reads an environment value from the public inputs.
    pub fn op_input(&mut self, clk: u32, input: KernelInput) -> FF {
        let offset = input.offset();
        *self.kernel_input_selector_counter.entry(offset).or_default() += 1;
        self.entries.push(KernelTraceEntry {
            clk,
            kernel_in_offset: offset,
            kernel_out_offset: 0,
            operation: KernelTraceOp::Input(input),
        });
        self.inputs[offset]
    }

    /// Appends an output of `kind`. The caller checks [`Self::has_capacity`]
    /// first; an output beyond the range of its kind is not recorded.
    ///
    /// When `value` is `None` the value column is left untouched: the public
    /// inputs already carry the value a failed existence check reports.
    fn op_output(
        &mut self,
        clk: u32,
        kind: KernelOutput,
        side_effect_counter: u32,
        value: Option<FF>,
        metadata: FF,
    ) -> Option<usize> {
        if !self.has_capacity(kind) {
            return None;
        }
        let offset = kind.start() + self.write_count(kind);
        if let Some(value) = value {
            self.value_out[offset] = value;
        }
        self.side_effect_out[offset] = FF::from(side_effect_counter);
        self.metadata_out[offset] = metadata;
        *self.kernel_output_selector_counter.entry(offset).or_default() += 1;
        *self.write_counts.entry(kind).or_default() += 1;
        self.entries.push(KernelTraceEntry {
            clk,
            kernel_in_offset: 0,
            kernel_out_offset: offset,
            operation: KernelTraceOp::Output(kind),
        });
        Some(offset)
    }

    pub fn op_note_hash_exists(
        &mut self,
        clk: u32,
        side_effect_counter: u32,
        note_hash: FF,
        exists: bool,
    ) {
        let value = exists.then_some(note_hash);
        self.op_output(
            clk,
            KernelOutput::NoteHashExists,
            side_effect_counter,
            value,
            ff_bool(exists),
        );
    }

    pub fn op_emit_note_hash(&mut self, clk: u32, side_effect_counter: u32, note_hash: FF) {
        self.op_output(
            clk,
            KernelOutput::EmitNoteHash,
            side_effect_counter,
            Some(note_hash),
            FF::from(0u64),
        );
    }

    pub fn op_nullifier_exists(
        &mut self,
        clk: u32,
        side_effect_counter: u32,
        nullifier: FF,
        exists: bool,
    ) {
        let kind = if exists {
            KernelOutput::NullifierExists
        } else {
            KernelOutput::NullifierNonExists
        };
        self.op_output(clk, kind, side_effect_counter, Some(nullifier), ff_bool(exists));
    }

    pub fn op_emit_nullifier(&mut self, clk: u32, side_effect_counter: u32, nullifier: FF) {
        self.op_output(
            clk,
            KernelOutput::EmitNullifier,
            side_effect_counter,
            Some(nullifier),
            FF::from(0u64),
        );
    }

    pub fn op_l1_to_l2_msg_exists(
        &mut self,
        clk: u32,
        side_effect_counter: u32,
        message: FF,
        exists: bool,
    ) {
        let value = exists.then_some(message);
        self.op_output(
            clk,
            KernelOutput::L1ToL2MsgExists,
            side_effect_counter,
            value,
            ff_bool(exists),
        );
    }

    pub fn op_emit_unencrypted_log(
        &mut self,
        clk: u32,
        side_effect_counter: u32,
        log_hash: FF,
        log_length: FF,
    ) {
        self.op_output(
            clk,
            KernelOutput::EmitUnencryptedLog,
            side_effect_counter,
            Some(log_hash),
            log_length,
        );
    }

    pub fn op_emit_l2_to_l1_msg(
        &mut self,
        clk: u32,
        side_effect_counter: u32,
        message: FF,
        recipient: FF,
    ) {
        self.op_output(
            clk,
            KernelOutput::EmitL2ToL1Msg,
            side_effect_counter,
            Some(message),
            recipient,
        );
    }

    pub fn op_sload(&mut self, clk: u32, side_effect_counter: u32, slot: FF, value: FF) {
        self.op_output(clk, KernelOutput::SLoad, side_effect_counter, Some(value), slot);
    }

    pub fn op_sstore(&mut self, clk: u32, side_effect_counter: u32, slot: FF, value: FF) {
        self.op_output(clk, KernelOutput::SStore, side_effect_counter, Some(value), slot);
    }

    /// Writes the lookup selectors of the execution rows. Row `clk - 1` holds
    /// the instruction of clock `clk` until the first row is inserted.
    pub fn finalize(&self, rows: &mut [Row<FF>]) {
        for entry in &self.entries {
            let Some(dest) = (entry.clk as usize)
                .checked_sub(1)
                .and_then(|i| rows.get_mut(i))
            else {
                continue;
            };
            match entry.operation {
                KernelTraceOp::Input(_) => {
                    dest.main_kernel_in_offset = FF::from(entry.kernel_in_offset as u64);
                    dest.main_sel_q_kernel_lookup = FF::from(1u64);
                }
                KernelTraceOp::Output(_) => {
                    dest.main_kernel_out_offset = FF::from(entry.kernel_out_offset as u64);
                    dest.main_sel_q_kernel_output_lookup = FF::from(1u64);
                }
            }
        }
    }

    /// Writes the public columns and their lookup counts. The table must have
    /// at least `KERNEL_OUTPUTS_LENGTH` rows.
    pub fn finalize_columns(&self, rows: &mut [Row<FF>]) {
        for (dest, input) in rows.iter_mut().zip(self.inputs.iter()) {
            dest.main_kernel_inputs = *input;
            dest.main_sel_kernel_inputs = FF::from(1u64);
        }
        for (i, dest) in rows.iter_mut().take(KERNEL_OUTPUTS_LENGTH).enumerate() {
            dest.main_kernel_value_out = self.value_out[i];
            dest.main_kernel_side_effect_out = self.side_effect_out[i];
            dest.main_kernel_metadata_out = self.metadata_out[i];
            dest.main_sel_kernel_out = FF::from(1u64);
        }
        for (offset, count) in &self.kernel_input_selector_counter {
            if let Some(dest) = rows.get_mut(*offset) {
                dest.lookup_into_kernel_counts = FF::from(*count);
            }
        }
        for (offset, count) in &self.kernel_output_selector_counter {
            if let Some(dest) = rows.get_mut(*offset) {
                dest.kernel_output_lookup_counts = FF::from(*count);
            }
        }
    }

    /// Clears the trace and the outputs, keeping the public inputs.
    pub fn reset(&mut self) {
        *self = Self::new(self.inputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_inputs() -> PublicInputs {
        PublicInputs {
            address: FF::from(0xaau64),
            sender: FF::from(0xbbu64),
            chain_id: FF::from(1u64),
            l2_gas_limit: 1_000,
            ..Default::default()
        }
    }

    #[test]
    fn inputs_are_looked_up_and_counted() {
        let mut kernel = KernelTraceBuilder::new(public_inputs().kernel_inputs());
        assert_eq!(kernel.op_input(1, KernelInput::Sender), FF::from(0xbbu64));
        assert_eq!(kernel.op_input(2, KernelInput::Sender), FF::from(0xbbu64));
        assert_eq!(kernel.kernel_input_selector_counter[&kernel_inputs::SENDER], 2);
        assert_eq!(kernel.kernel_inputs()[kernel_inputs::L2_START_GAS], FF::from(1_000u64));
    }

    #[test]
    fn outputs_fill_their_ranges_in_order() {
        let mut kernel = KernelTraceBuilder::default();
        kernel.op_sstore(1, 0, FF::from(1u64), FF::from(10u64));
        kernel.op_sstore(2, 1, FF::from(2u64), FF::from(20u64));
        let (values, counters, metadata) = kernel.kernel_outputs();
        assert_eq!(values[START_SSTORE_WRITE_OFFSET + 1], FF::from(20u64));
        assert_eq!(counters[START_SSTORE_WRITE_OFFSET + 1], FF::from(1u64));
        assert_eq!(metadata[START_SSTORE_WRITE_OFFSET], FF::from(1u64));
        assert_eq!(kernel.write_count(KernelOutput::SStore), 2);
    }

    #[test]
    fn nullifier_checks_split_by_result() {
        let mut kernel = KernelTraceBuilder::default();
        kernel.op_nullifier_exists(1, 0, FF::from(5u64), true);
        kernel.op_nullifier_exists(2, 1, FF::from(6u64), false);
        let offsets: Vec<_> = kernel.entries().iter().map(|e| e.kernel_out_offset).collect();
        assert_eq!(offsets, vec![START_NULLIFIER_EXISTS_OFFSET, START_NULLIFIER_NON_EXISTS_OFFSET]);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut kernel = KernelTraceBuilder::default();
        for i in 0..MAX_L2_TO_L1_MSGS_PER_CALL {
            assert!(kernel.has_capacity(KernelOutput::EmitL2ToL1Msg));
            kernel.op_emit_l2_to_l1_msg(i as u32 + 1, i as u32, FF::from(1u64), FF::from(2u64));
        }
        assert!(!kernel.has_capacity(KernelOutput::EmitL2ToL1Msg));
    }

    #[test]
    fn finalize_columns_writes_counts() {
        let mut kernel = KernelTraceBuilder::new(public_inputs().kernel_inputs());
        kernel.op_input(1, KernelInput::Address);
        kernel.op_emit_nullifier(2, 0, FF::from(3u64));
        let mut rows = vec![Row::<FF>::default(); KERNEL_OUTPUTS_LENGTH];
        kernel.finalize(&mut rows);
        assert_eq!(rows[0].main_sel_q_kernel_lookup, FF::from(1u64));
        assert_eq!(
            rows[1].main_kernel_out_offset,
            FF::from(START_EMIT_NULLIFIER_WRITE_OFFSET as u64)
        );
        kernel.finalize_columns(&mut rows);
        assert_eq!(rows[kernel_inputs::ADDRESS].lookup_into_kernel_counts, FF::from(1u64));
        assert_eq!(
            rows[START_EMIT_NULLIFIER_WRITE_OFFSET].kernel_output_lookup_counts,
            FF::from(1u64)
        );
        assert_eq!(rows[0].main_kernel_inputs, FF::from(0xaau64));
    }
}
