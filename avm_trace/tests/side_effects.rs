use anyhow::Result;
use avm_common::kernel_inputs;
use avm_common::kernel_limits::MAX_NOTE_HASHES_PER_CALL;
use avm_common::kernel_outputs::{
    START_EMIT_NOTE_HASH_WRITE_OFFSET, START_SLOAD_WRITE_OFFSET, START_SSTORE_WRITE_OFFSET,
};
use avm_trace::config::TraceConfig;
use avm_trace::errors::AvmError;
use avm_trace::hints::ExecutionHints;
use avm_trace::instruction::{EnvironmentVariable, Instruction};
use avm_trace::kernel::{KernelOutput, PublicInputs};
use avm_trace::memory::MemoryTag;
use avm_trace::testing_utils::{init_logger, run_program_with, test_public_inputs};
use avm_trace::trace::AvmTraceBuilder;
use avm_trace::util::FF;

fn ff(value: u64) -> FF {
    FF::from(value)
}

fn builder(public_inputs: PublicInputs) -> AvmTraceBuilder {
    init_logger();
    AvmTraceBuilder::new(
        public_inputs,
        vec![],
        ExecutionHints::default(),
        TraceConfig::testing(),
    )
}

#[test]
fn outputs_carry_side_effect_counters() -> Result<()> {
    let public_inputs = PublicInputs {
        start_side_effect_counter: 5,
        ..test_public_inputs()
    };
    let hints = ExecutionHints::default().with_side_effect_hints([(7, ff(999))]);
    let outcome = run_program_with(
        vec![
            Instruction::set(MemoryTag::FF, ff(100), 0),
            Instruction::set(MemoryTag::FF, ff(1), 1),
            Instruction::SStore {
                indirect: 0,
                src: 0,
                slot: 1,
            },
            Instruction::EmitNoteHash {
                indirect: 0,
                note_hash: 0,
            },
            Instruction::SLoad {
                indirect: 0,
                slot: 1,
                dst: 2,
            },
            Instruction::set(MemoryTag::U32, ff(1), 3),
            Instruction::Return {
                indirect: 0,
                offset: 2,
                size_offset: 3,
            },
        ],
        vec![],
        public_inputs,
        hints,
    );
    assert!(outcome.is_success());
    assert_eq!(outcome.returndata, vec![ff(999)]);

    let rows = outcome.table.rows();
    let sstore = &rows[START_SSTORE_WRITE_OFFSET];
    assert_eq!(sstore.main_kernel_side_effect_out, ff(5));
    assert_eq!(sstore.main_kernel_value_out, ff(100));
    assert_eq!(sstore.main_kernel_metadata_out, ff(1));
    assert_eq!(sstore.kernel_output_lookup_counts, ff(1));

    let note_hash = &rows[START_EMIT_NOTE_HASH_WRITE_OFFSET];
    assert_eq!(note_hash.main_kernel_side_effect_out, ff(6));
    assert_eq!(note_hash.main_kernel_value_out, ff(100));

    let sload = &rows[START_SLOAD_WRITE_OFFSET];
    assert_eq!(sload.main_kernel_side_effect_out, ff(7));
    assert_eq!(sload.main_kernel_value_out, ff(999));
    assert_eq!(sload.main_kernel_metadata_out, ff(1));

    // Execution rows 3 to 5 look up their output slot.
    let offsets = [
        START_SSTORE_WRITE_OFFSET,
        START_EMIT_NOTE_HASH_WRITE_OFFSET,
        START_SLOAD_WRITE_OFFSET,
    ];
    for (clk, offset) in (3..=5).zip(offsets) {
        assert_eq!(rows[clk].main_sel_q_kernel_output_lookup, ff(1));
        assert_eq!(rows[clk].main_kernel_out_offset, ff(offset as u64));
        assert_eq!(rows[clk].main_side_effect_counter, ff(clk as u64 + 2));
    }
    Ok(())
}

#[test]
fn static_calls_cannot_alter_state() -> Result<()> {
    let mut trace = builder(PublicInputs {
        is_static_call: true,
        ..test_public_inputs()
    });
    trace.execute(&Instruction::set(MemoryTag::FF, ff(1), 0))?;

    let mutating = [
        Instruction::SStore {
            indirect: 0,
            src: 0,
            slot: 0,
        },
        Instruction::EmitNoteHash {
            indirect: 0,
            note_hash: 0,
        },
        Instruction::EmitNullifier {
            indirect: 0,
            nullifier: 0,
        },
    ];
    for instruction in &mutating {
        assert_eq!(trace.execute(instruction)?, AvmError::StaticCallAlteration);
    }
    assert_eq!(trace.side_effect_counter(), 0);
    assert!(trace.kernel().entries().is_empty());

    let error = trace.execute(&Instruction::GetEnvVar {
        indirect: 0,
        var: EnvironmentVariable::IsStaticCall as u8,
        dst: 1,
    })?;
    assert_eq!(error, AvmError::NoError);
    let cell = trace.memory().unconstrained_read(0, 1);
    assert_eq!((cell.val, cell.tag), (ff(1), MemoryTag::U1));
    Ok(())
}

#[test]
fn note_hashes_are_capped_per_call() -> Result<()> {
    let mut trace = builder(test_public_inputs());
    trace.execute(&Instruction::set(MemoryTag::FF, ff(3), 0))?;
    let emit = Instruction::EmitNoteHash {
        indirect: 0,
        note_hash: 0,
    };
    for _ in 0..MAX_NOTE_HASHES_PER_CALL {
        assert_eq!(trace.execute(&emit)?, AvmError::NoError);
    }
    assert_eq!(trace.execute(&emit)?, AvmError::SideEffectLimitReached);
    assert_eq!(
        trace.kernel().write_count(KernelOutput::EmitNoteHash),
        MAX_NOTE_HASHES_PER_CALL
    );
    assert_eq!(trace.side_effect_counter(), MAX_NOTE_HASHES_PER_CALL as u32);
    Ok(())
}

#[test]
fn environment_variables_come_from_public_inputs() -> Result<()> {
    let public_inputs = PublicInputs {
        sender: ff(0xabc),
        chain_id: ff(31337),
        ..test_public_inputs()
    };
    let mut trace = builder(public_inputs);
    let vars = [
        (EnvironmentVariable::Sender, 0),
        (EnvironmentVariable::ChainId, 1),
        (EnvironmentVariable::L2GasLeft, 2),
    ];
    for (var, dst) in vars {
        let error = trace.execute(&Instruction::GetEnvVar {
            indirect: 0,
            var: var as u8,
            dst,
        })?;
        assert_eq!(error, AvmError::NoError);
    }

    let memory = trace.memory();
    assert_eq!(memory.unconstrained_read(0, 0).val, ff(0xabc));
    assert_eq!(memory.unconstrained_read(0, 1).val, ff(31337));
    let gas_left = memory.unconstrained_read(0, 2);
    assert_eq!(gas_left.tag, MemoryTag::U32);
    assert_eq!(gas_left.val, ff(trace.gas_left().0 as u64));

    let inputs = trace.kernel().kernel_inputs();
    assert_eq!(inputs[kernel_inputs::SENDER], ff(0xabc));

    let error = trace.execute(&Instruction::GetEnvVar {
        indirect: 0,
        var: 200,
        dst: 3,
    })?;
    assert_eq!(error, AvmError::EnvironmentVariableUnknown);
    Ok(())
}
