//! Sub-trace builders for the computations delegated by the main trace.
//!
//! Gadgets never touch memory. They compute their result, append an entry to
//! their own sub-trace and return the result to the caller, which performs
//! all memory accesses around the call.

pub mod alu;
pub mod binary;
pub mod conversion;
pub mod ecc;
pub mod keccak;
pub mod poseidon2;
pub mod sha256;
