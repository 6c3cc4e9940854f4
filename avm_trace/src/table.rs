//! The finalized trace.
//!
//! [`Table`] is the row-major output of the trace builder. [`ColumnStore`]
//! is a column-major copy with one lock per column, for consumers that fill
//! or read columns from several threads.

use core::borrow::Borrow;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::columns::{Row, NUM_COLUMNS};
use crate::util::FF;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Row<FF>>,
}

impl Table {
    pub fn new(rows: Vec<Row<FF>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row<FF>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row<FF>> {
        self.rows
    }

    pub fn column_names() -> &'static [&'static str; NUM_COLUMNS] {
        &Row::<FF>::COLUMN_NAMES
    }

    /// Value of column `name` at `row`.
    pub fn get(&self, row: usize, name: &str) -> Option<FF> {
        let column = Row::<FF>::column_index(name)?;
        self.rows.get(row).map(|r| r[column])
    }

    /// Copy of the column called `name`.
    pub fn column(&self, name: &str) -> Option<Vec<FF>> {
        let column = Row::<FF>::column_index(name)?;
        Some(self.rows.iter().map(|r| r[column]).collect())
    }

    /// Rows selected by `f`, with their index.
    pub fn find_rows<'a>(
        &'a self,
        f: impl Fn(&Row<FF>) -> bool + 'a,
    ) -> impl Iterator<Item = (usize, &'a Row<FF>)> + 'a {
        self.rows.iter().enumerate().filter(move |(_, r)| f(*r))
    }

    pub fn to_column_store(&self) -> ColumnStore {
        ColumnStore::from_rows(&self.rows)
    }
}

/// Column-major storage with one reader/writer lock per column.
#[derive(Debug)]
pub struct ColumnStore {
    num_rows: usize,
    columns: Vec<RwLock<Vec<FF>>>,
}

impl ColumnStore {
    /// A store of `num_rows` zero rows.
    pub fn new(num_rows: usize) -> Self {
        Self {
            num_rows,
            columns: (0..NUM_COLUMNS)
                .map(|_| RwLock::new(vec![FF::from(0u64); num_rows]))
                .collect(),
        }
    }

    pub fn from_rows(rows: &[Row<FF>]) -> Self {
        let mut columns = vec![Vec::with_capacity(rows.len()); NUM_COLUMNS];
        for row in rows {
            let values = Borrow::<[FF; NUM_COLUMNS]>::borrow(row);
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(*value);
            }
        }
        Self {
            num_rows: rows.len(),
            columns: columns.into_iter().map(RwLock::new).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Shared access to the column called `name`.
    pub fn column(&self, name: &str) -> Option<RwLockReadGuard<'_, Vec<FF>>> {
        let index = Row::<FF>::column_index(name)?;
        Some(self.columns[index].read())
    }

    /// Sets one cell. Returns false if the column or row does not exist.
    pub fn set(&self, name: &str, row: usize, value: FF) -> bool {
        let Some(index) = Row::<FF>::column_index(name) else {
            return false;
        };
        let mut column = self.columns[index].write();
        match column.get_mut(row) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Overwrites the column called `name` with `values`, which must have
    /// one value per row.
    pub fn set_column(&self, name: &str, values: &[FF]) -> bool {
        let Some(index) = Row::<FF>::column_index(name) else {
            return false;
        };
        if values.len() != self.num_rows {
            return false;
        }
        self.columns[index].write().copy_from_slice(values);
        true
    }

    pub fn to_table(&self) -> Table {
        let mut rows = vec![Row::<FF>::default(); self.num_rows];
        for (index, column) in self.columns.iter().enumerate() {
            for (row, value) in rows.iter_mut().zip(column.read().iter()) {
                row[index] = *value;
            }
        }
        Table::new(rows)
    }
}
