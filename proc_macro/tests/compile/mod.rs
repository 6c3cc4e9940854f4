mod test_impls;

use avm_proc_macro::Columns;

#[repr(C)]
#[derive(Columns, Clone, Copy, Debug)]
pub struct OpRow<T> {
    clk: T,
    sel_op_a: T,
    sel_op_b: T,
    ia: T,
}
