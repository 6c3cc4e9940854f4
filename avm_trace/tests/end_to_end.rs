use anyhow::Result;
use avm_trace::instruction::{ArithmeticOp, BitwiseOp, Instruction};
use avm_trace::memory::MemoryTag;
use avm_trace::testing_utils::run_program;
use avm_trace::util::FF;

fn ff(value: u64) -> FF {
    FF::from(value)
}

/// SET, SET, ADD, SET, RETURN: one addition row and one write of the sum.
#[test]
fn add_and_return() -> Result<()> {
    let outcome = run_program(
        vec![
            Instruction::set(MemoryTag::U8, ff(1), 1),
            Instruction::set(MemoryTag::U8, ff(1), 2),
            Instruction::arithmetic(ArithmeticOp::Add, 1, 2, 3),
            Instruction::set(MemoryTag::U32, ff(1), 4),
            Instruction::Return {
                indirect: 0,
                offset: 3,
                size_offset: 4,
            },
        ],
        vec![],
    );
    assert!(outcome.is_success());
    assert_eq!(outcome.returndata, vec![ff(2)]);
    assert_eq!(outcome.error_count, 0);

    let table = &outcome.table;
    let adds: Vec<_> = table
        .find_rows(|row| row.main_sel_op_add == ff(1))
        .collect();
    assert_eq!(adds.len(), 1);
    let (_, add) = adds[0];
    assert_eq!((add.main_ia, add.main_ib, add.main_ic), (ff(1), ff(1), ff(2)));

    let writes: Vec<_> = table
        .find_rows(|row| {
            row.mem_sel_mem == ff(1) && row.mem_addr == ff(3) && row.mem_rw == ff(1)
        })
        .collect();
    assert_eq!(writes.len(), 1);
    let (_, write) = writes[0];
    assert_eq!(write.mem_val, ff(2));
    assert_eq!(write.mem_tag, MemoryTag::U8.as_ff());

    assert!(table.rows().iter().all(|row| row.main_op_err == ff(0)));
    assert!(table.rows().iter().all(|row| row.mem_tag_err == ff(0)));
    Ok(())
}

/// AND on field elements is a tag error: the row is kept, the result is zero
/// and the byte gadget is not used.
#[test]
fn bitwise_on_field_elements_is_a_tag_error() -> Result<()> {
    let outcome = run_program(
        vec![
            Instruction::set(MemoryTag::FF, ff(6), 0),
            Instruction::set(MemoryTag::FF, ff(3), 1),
            Instruction::bitwise(BitwiseOp::And, 0, 1, 2),
            Instruction::set(MemoryTag::U32, ff(1), 5),
            Instruction::Return {
                indirect: 0,
                offset: 2,
                size_offset: 5,
            },
        ],
        vec![],
    );
    assert_eq!(outcome.error_count, 1);
    assert_eq!(outcome.returndata, vec![ff(0)]);

    let table = &outcome.table;
    let (_, and) = table
        .find_rows(|row| row.main_sel_op_and == ff(1))
        .next()
        .expect("AND row");
    assert_eq!(and.main_op_err, ff(1));
    assert_eq!(and.main_sel_bin, ff(0));
    assert!(table.rows().iter().all(|row| row.binary_sel_bin == ff(0)));
    assert!(table.rows().iter().all(|row| row.byte_lookup_sel_bin == ff(0)));
    Ok(())
}

#[test]
fn calldata_is_copied_and_returned() -> Result<()> {
    let calldata = vec![ff(10), ff(20), ff(30)];
    let outcome = run_program(
        vec![
            Instruction::set(MemoryTag::U32, ff(1), 0),
            Instruction::set(MemoryTag::U32, ff(2), 1),
            Instruction::CalldataCopy {
                indirect: 0,
                cd_offset: 0,
                copy_size: 1,
                dst: 100,
            },
            Instruction::Return {
                indirect: 0,
                offset: 100,
                size_offset: 1,
            },
        ],
        calldata.clone(),
    );
    assert!(outcome.is_success());
    assert_eq!(outcome.returndata, vec![ff(20), ff(30)]);

    let table = &outcome.table;
    let rows = table.rows();
    for (i, value) in calldata.iter().enumerate() {
        assert_eq!(rows[i].main_calldata, *value);
        assert_eq!(rows[i].main_sel_calldata, ff(1));
    }
    assert_eq!(rows[0].lookup_cd_value_counts, ff(0));
    assert_eq!(rows[1].lookup_cd_value_counts, ff(1));
    assert_eq!(rows[2].lookup_cd_value_counts, ff(1));
    assert_eq!(rows[0].main_returndata, ff(20));
    assert_eq!(rows[1].lookup_ret_value_counts, ff(1));
    Ok(())
}

#[test]
fn revert_is_reported() -> Result<()> {
    let outcome = run_program(
        vec![
            Instruction::set(MemoryTag::FF, ff(42), 0),
            Instruction::set(MemoryTag::U32, ff(1), 1),
            Instruction::Revert {
                indirect: 0,
                offset: 0,
                size_offset: 1,
            },
            Instruction::set(MemoryTag::FF, ff(1), 0),
        ],
        vec![],
    );
    assert!(outcome.reverted);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.returndata, vec![ff(42)]);
    assert_eq!(outcome.error_count, 1);
    // The instruction after REVERT never runs.
    let sets = outcome
        .table
        .find_rows(|row| row.main_sel_op_set == ff(1))
        .count();
    assert_eq!(sets, 2);
    Ok(())
}

/// Indirect operands go through a U32 pointer; a pointer with another tag is
/// an addressing error.
#[test]
fn indirect_addressing() -> Result<()> {
    let outcome = run_program(
        vec![
            Instruction::set(MemoryTag::U32, ff(50), 0),
            Instruction::set(MemoryTag::U16, ff(7), 50),
            Instruction::Mov {
                indirect: 0b01,
                src: 0,
                dst: 1,
            },
            Instruction::set(MemoryTag::FF, ff(50), 2),
            Instruction::Mov {
                indirect: 0b01,
                src: 2,
                dst: 3,
            },
            Instruction::set(MemoryTag::U32, ff(1), 10),
            Instruction::Return {
                indirect: 0,
                offset: 1,
                size_offset: 10,
            },
        ],
        vec![],
    );
    assert_eq!(outcome.returndata, vec![ff(7)]);
    assert_eq!(outcome.error_count, 1);

    let movs: Vec<_> = outcome
        .table
        .find_rows(|row| row.main_sel_op_mov == ff(1))
        .map(|(_, row)| *row)
        .collect();
    assert_eq!(movs.len(), 2);
    assert_eq!(movs[0].main_op_err, ff(0));
    assert_eq!(movs[0].main_sel_resolve_ind_addr_a, ff(1));
    assert_eq!(movs[0].main_ind_addr_a, ff(0));
    assert_eq!(movs[0].main_mem_addr_a, ff(50));
    assert_eq!(movs[1].main_op_err, ff(1));
    Ok(())
}
