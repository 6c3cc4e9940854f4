//! Keccak-f[1600] permutation gadget.

use tiny_keccak::keccakf;

/// Number of 64-bit lanes of the Keccak state.
pub const KECCAK_STATE_SIZE: usize = 25;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeccakTraceEntry {
    pub clk: u32,
    pub input: [u64; KECCAK_STATE_SIZE],
    pub output: [u64; KECCAK_STATE_SIZE],
}

#[derive(Clone, Debug, Default)]
pub struct KeccakTraceBuilder {
    entries: Vec<KeccakTraceEntry>,
}

impl KeccakTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KeccakTraceEntry] {
        &self.entries
    }

    pub fn keccakf1600(
        &mut self,
        input: [u64; KECCAK_STATE_SIZE],
        clk: u32,
    ) -> [u64; KECCAK_STATE_SIZE] {
        let mut output = input;
        keccakf(&mut output);
        self.entries.push(KeccakTraceEntry { clk, input, output });
        output
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
