use anyhow::Result;
use avm_trace::config::TraceConfig;
use avm_trace::hints::ExecutionHints;
use avm_trace::instruction::{ArithmeticOp, BitwiseOp, Instruction};
use avm_trace::memory::MemoryTag;
use avm_trace::testing_utils::{init_logger, test_public_inputs};
use avm_trace::trace::AvmTraceBuilder;
use avm_trace::util::FF;

fn builder() -> AvmTraceBuilder {
    AvmTraceBuilder::new(
        test_public_inputs(),
        vec![FF::from(5u64)],
        ExecutionHints::default(),
        TraceConfig::testing(),
    )
}

fn run(trace: &mut AvmTraceBuilder) -> Result<()> {
    let program = [
        Instruction::set(MemoryTag::U8, FF::from(12u64), 0),
        Instruction::set(MemoryTag::U8, FF::from(10u64), 1),
        Instruction::arithmetic(ArithmeticOp::Add, 0, 1, 2),
        Instruction::bitwise(BitwiseOp::And, 0, 1, 3),
        Instruction::set(MemoryTag::U32, FF::from(0u64), 4),
        Instruction::set(MemoryTag::U32, FF::from(1u64), 5),
        Instruction::CalldataCopy {
            indirect: 0,
            cd_offset: 4,
            copy_size: 5,
            dst: 6,
        },
        Instruction::EmitNoteHash {
            indirect: 0,
            note_hash: 6,
        },
        Instruction::set(MemoryTag::U32, FF::from(2u64), 7),
        Instruction::Return {
            indirect: 0,
            offset: 2,
            size_offset: 7,
        },
    ];
    for instruction in &program {
        trace.execute(instruction)?;
    }
    Ok(())
}

/// Finalizing resets the builder: a second finalization yields the table of
/// an empty execution.
#[test]
fn finalize_leaves_an_empty_builder() -> Result<()> {
    init_logger();
    let mut trace = builder();
    run(&mut trace)?;
    assert_eq!(trace.returndata(), &[FF::from(22u64), FF::from(8u64)]);

    let table = trace.finalize();
    assert!(table.rows().iter().any(|row| row.binary_sel_bin == FF::from(1u64)));

    assert!(trace.memory().is_empty());
    assert!(trace.kernel().is_empty());
    assert_eq!(trace.pc(), 0);
    assert!(!trace.is_halted());
    assert_eq!(trace.finalize(), builder().finalize());
    Ok(())
}

/// Running the same program after a reset reproduces the same table.
#[test]
fn traces_are_deterministic() -> Result<()> {
    init_logger();
    let mut trace = builder();
    run(&mut trace)?;
    let first = trace.finalize();

    run(&mut trace)?;
    let second = trace.finalize();
    assert_eq!(first, second);

    let mut other = builder();
    run(&mut other)?;
    assert_eq!(first, other.finalize());
    Ok(())
}
