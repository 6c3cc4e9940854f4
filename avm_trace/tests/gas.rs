use anyhow::Result;
use avm_trace::instruction::{ArithmeticOp, Instruction};
use avm_trace::memory::MemoryTag;
use avm_trace::opcode::OpCode;
use avm_trace::testing_utils::{run_program, TEST_GAS_LIMIT};
use avm_trace::util::{ff_to_u64, FF};

fn ff(value: u64) -> FF {
    FF::from(value)
}

fn program() -> Vec<Instruction> {
    vec![
        Instruction::set(MemoryTag::U32, ff(0), 0),
        Instruction::set(MemoryTag::U32, ff(2), 1),
        Instruction::CalldataCopy {
            indirect: 0,
            cd_offset: 0,
            copy_size: 1,
            dst: 10,
        },
        Instruction::SStore {
            indirect: 0,
            src: 10,
            slot: 11,
        },
        Instruction::arithmetic(ArithmeticOp::Add, 0, 1, 2),
        Instruction::Return {
            indirect: 0,
            offset: 10,
            size_offset: 1,
        },
    ]
}

#[test]
fn remaining_gas_follows_costs() -> Result<()> {
    let outcome = run_program(program(), vec![ff(7), ff(8)]);
    assert!(outcome.is_success());

    let table = &outcome.table;
    let rows = table.rows();
    assert_eq!(rows[0].main_l2_gas_remaining, ff(TEST_GAS_LIMIT as u64));
    assert_eq!(rows[0].main_da_gas_remaining, ff(TEST_GAS_LIMIT as u64));

    // Costs in execution order, with the CALLDATACOPY and RETURN multipliers
    // of 2.
    let expected = [
        (OpCode::Set, 9, 0),
        (OpCode::Set, 9, 0),
        (OpCode::CalldataCopy, 27 + 3 * 2, 0),
        (OpCode::SStore, 1657, 512),
        (OpCode::Add, 10, 0),
        (OpCode::Return, 28 + 3 * 2, 0),
    ];
    let (mut l2, mut da) = (TEST_GAS_LIMIT as u64, TEST_GAS_LIMIT as u64);
    for (clk, (opcode, l2_cost, da_cost)) in expected.into_iter().enumerate() {
        let row = &rows[clk + 1];
        l2 -= l2_cost;
        da -= da_cost;
        assert_eq!(row.main_opcode_val, ff(opcode.index() as u64));
        assert_eq!(row.main_is_gas_accounted, ff(1));
        assert_eq!(row.main_l2_gas_remaining, ff(l2));
        assert_eq!(row.main_da_gas_remaining, ff(da));
        assert_eq!(row.main_l2_out_of_gas, ff(0));
        assert_eq!(
            row.main_l2_gas_u16_r0 + row.main_l2_gas_u16_r1 * ff(1 << 16),
            ff(l2)
        );
        assert_eq!(
            row.main_da_gas_u16_r0 + row.main_da_gas_u16_r1 * ff(1 << 16),
            ff(da)
        );
    }
    assert_eq!(rows[3].main_dyn_gas_multiplier, ff(2));
    Ok(())
}

/// The fixed cost table sits in the first rows, one row per opcode, and its
/// lookup counts match the number of executed instructions per opcode.
#[test]
fn opcode_cost_table_lookups() -> Result<()> {
    let outcome = run_program(program(), vec![ff(7), ff(8)]);
    let rows = outcome.table.rows();

    let set = &rows[OpCode::Set.index()];
    assert_eq!(set.gas_sel_gas_cost, ff(1));
    assert_eq!(set.gas_base_l2_gas_fixed_table, ff(9));
    assert_eq!(set.lookup_opcode_gas_counts, ff(2));

    let sstore = &rows[OpCode::SStore.index()];
    assert_eq!(sstore.gas_base_da_gas_fixed_table, ff(512));
    assert_eq!(sstore.lookup_opcode_gas_counts, ff(1));

    let msm = &rows[OpCode::Msm.index()];
    assert_eq!(msm.gas_dyn_l2_gas_fixed_table, ff(50));
    assert_eq!(msm.lookup_opcode_gas_counts, ff(0));

    let counted: FF = rows.iter().map(|row| row.lookup_opcode_gas_counts).sum();
    assert_eq!(counted, ff(6));
    Ok(())
}

/// Remaining gas never increases from one accounted row to the next.
#[test]
fn remaining_gas_is_non_increasing() -> Result<()> {
    let outcome = run_program(program(), vec![ff(7), ff(8)]);
    let remaining: Vec<(u64, u64)> = outcome
        .table
        .find_rows(|row| row.main_is_gas_accounted == ff(1))
        .map(|(_, row)| {
            (
                ff_to_u64(row.main_l2_gas_remaining),
                ff_to_u64(row.main_da_gas_remaining),
            )
        })
        .collect();
    assert_eq!(remaining.len(), program().len());
    for pair in remaining.windows(2) {
        assert!(pair[1].0 <= pair[0].0);
        assert!(pair[1].1 <= pair[0].1);
    }
    Ok(())
}
