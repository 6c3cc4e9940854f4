use core::borrow::{Borrow, BorrowMut};
use core::ops::{Index, IndexMut};

use super::*;

const NUM_COLUMNS: usize = core::mem::size_of::<OpRow<u8>>();

#[allow(unused)]
trait TestColumns<T, I>:
    Borrow<[T; NUM_COLUMNS]>
    + BorrowMut<[T; NUM_COLUMNS]>
    + From<[T; NUM_COLUMNS]>
    + Index<I, Output = <[T] as Index<I>>::Output>
    + IndexMut<I>
    + Default
where
    [T]: Index<I> + IndexMut<I>,
    [T; NUM_COLUMNS]: Borrow<Self>,
    [T; NUM_COLUMNS]: BorrowMut<Self>,
    [T; NUM_COLUMNS]: From<Self>,
{
}
impl<T, I> TestColumns<T, I> for OpRow<T>
where
    T: Copy + Default,
    [T]: Index<I> + IndexMut<I>,
{
}

#[test]
fn column_names_follow_declaration_order() {
    assert_eq!(OpRow::<u8>::NUM_COLUMNS, NUM_COLUMNS);
    assert_eq!(
        OpRow::<u8>::COLUMN_NAMES,
        ["clk", "sel_op_a", "sel_op_b", "ia"]
    );
}

#[test]
fn array_view_matches_fields() {
    let row = OpRow::<u32> {
        clk: 7,
        sel_op_a: 1,
        sel_op_b: 0,
        ia: 42,
    };
    let arr: [u32; NUM_COLUMNS] = row.into();
    assert_eq!(arr, [7, 1, 0, 42]);

    let mut back = OpRow::<u32>::from(arr);
    back[3usize] = 43;
    assert_eq!(back.ia, 43);
    assert_eq!(back[0usize], 7);

    let empty = OpRow::<u32>::default();
    assert_eq!(empty.clk, 0);
    assert_eq!(empty.ia, 0);
}
