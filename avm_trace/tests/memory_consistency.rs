use anyhow::Result;
use avm_trace::config::TraceConfig;
use avm_trace::hints::ExecutionHints;
use avm_trace::instruction::{ArithmeticOp, Instruction};
use avm_trace::memory::MemoryTag;
use avm_trace::testing_utils::{init_logger, test_public_inputs};
use avm_trace::trace::AvmTraceBuilder;
use avm_trace::util::FF;
use rand::Rng;

const NUM_ADDRESSES: u32 = 8;

fn addr(rng: &mut impl Rng) -> u32 {
    rng.gen_range(0..NUM_ADDRESSES)
}

fn random_instruction(rng: &mut impl Rng) -> Instruction {
    match rng.gen_range(0..3) {
        0 => {
            let tag = if rng.gen_bool(0.8) {
                MemoryTag::U8
            } else {
                MemoryTag::U16
            };
            Instruction::set(tag, FF::from(rng.gen::<u8>() as u64), addr(rng))
        }
        1 => Instruction::Mov {
            indirect: 0,
            src: addr(rng),
            dst: addr(rng),
        },
        _ => Instruction::arithmetic(ArithmeticOp::Add, addr(rng), addr(rng), addr(rng)),
    }
}

/// Random programs over a handful of addresses: every read in the sorted
/// memory trace observes the content left by the previous access.
#[test]
fn reads_observe_previous_access() -> Result<()> {
    init_logger();
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let mut trace = AvmTraceBuilder::new(
            test_public_inputs(),
            vec![],
            ExecutionHints::default(),
            TraceConfig::testing(),
        );
        for _ in 0..50 {
            trace.execute(&random_instruction(&mut rng))?;
        }

        let memory = trace.memory();
        assert!(memory.consistency_violations().is_empty());

        let sorted = memory.finalize();
        assert_eq!(sorted.len(), memory.len());
        for pair in sorted.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.address != next.address {
                assert!(prev.address < next.address);
                continue;
            }
            assert!(prev.tsp() < next.tsp());
            if !next.is_write() {
                assert_eq!(next.val, prev.val);
                assert_eq!(next.tag, prev.tag);
            }
        }
        // A first access that is a read sees an empty cell.
        for (i, entry) in sorted.iter().enumerate() {
            let first = i == 0 || sorted[i - 1].address != entry.address;
            if first && !entry.is_write() {
                assert_eq!(entry.val, FF::from(0u64));
            }
        }
    }
    Ok(())
}

/// In the finalized table, `mem_last_access` marks the last row of each
/// address and `mem_diff` is the timestamp delta otherwise.
#[test]
fn table_memory_rows_carry_deltas() -> Result<()> {
    init_logger();
    let mut trace = AvmTraceBuilder::new(
        test_public_inputs(),
        vec![],
        ExecutionHints::default(),
        TraceConfig::testing(),
    );
    trace.execute(&Instruction::set(MemoryTag::U8, FF::from(4u64), 0))?;
    trace.execute(&Instruction::set(MemoryTag::U8, FF::from(5u64), 1))?;
    trace.execute(&Instruction::arithmetic(ArithmeticOp::Add, 0, 1, 0))?;
    let entries = trace.memory().finalize();
    let table = trace.finalize();

    let mem_rows: Vec<_> = table
        .rows()
        .iter()
        .filter(|row| row.mem_sel_mem == FF::from(1u64))
        .collect();
    assert_eq!(mem_rows.len(), entries.len());

    for (i, (row, entry)) in mem_rows.iter().zip(&entries).enumerate() {
        assert_eq!(row.mem_tsp, FF::from(entry.tsp()));
        assert_eq!(row.mem_val, entry.val);
        let last = entries
            .get(i + 1)
            .map_or(true, |next| next.address != entry.address);
        assert_eq!(row.mem_last_access, FF::from(last as u64));
        if !last {
            assert_eq!(row.mem_diff, FF::from(entries[i + 1].tsp() - entry.tsp()));
        }
    }
    Ok(())
}
