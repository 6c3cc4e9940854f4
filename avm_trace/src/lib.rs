//! Witness generation for the AVM.
//!
//! [`AvmTraceBuilder`][trace::AvmTraceBuilder] executes decoded
//! instructions one at a time, appending one execution row per instruction
//! and entries to the memory, gadget, gas and kernel sub-traces. Once the
//! program halts, [`finalize`][trace::AvmTraceBuilder::finalize] merges them
//! into a single [`Table`][table::Table] whose rows are laid out as
//! [`Row`][columns::Row].
//!
//! Instructions never fail the builder: invalid operands are recorded as an
//! [`AvmError`][errors::AvmError] on the row of the instruction. Conditions
//! that stop the execution altogether are
//! [`ExecutionError`][errors::ExecutionError]s, handled by the
//! [`execution`] driver.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod addressing;
pub mod bytecode;
pub mod columns;
pub mod config;
pub mod errors;
pub mod execution;
pub mod gadgets;
pub mod gas;
pub mod hints;
pub mod instruction;
pub mod kernel;
pub mod memory;
pub mod opcode;
pub mod range_check;
pub mod table;
pub mod testing_utils;
pub mod trace;
pub mod util;
