#[repr(C)]
#[derive(avm_proc_macro::Columns, Clone, Copy)]
pub struct GasRow<T> {
    l2_gas_remaining: T,
    da_gas_remaining: T,
}

fn main() {
    let row = GasRow::<u64> {
        l2_gas_remaining: 10,
        da_gas_remaining: 20,
    };
    assert_eq!(GasRow::<u64>::COLUMN_NAMES[1], "da_gas_remaining");
    assert_eq!(row[0usize] + row[1usize], 30);
}
