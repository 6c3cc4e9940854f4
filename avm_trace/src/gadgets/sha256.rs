//! SHA-256 compression gadget.

use generic_array::typenum::U64;
use generic_array::GenericArray;
use sha2::compress256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Sha256TraceEntry {
    pub clk: u32,
    pub state: [u32; 8],
    pub input: [u32; 16],
    pub output: [u32; 8],
}

/// Serializes the sixteen message words into a big-endian block.
fn words_to_block(input: &[u32; 16]) -> GenericArray<u8, U64> {
    let mut block = [0u8; 64];
    for (chunk, word) in block.chunks_exact_mut(4).zip(input) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    GenericArray::<u8, U64>::clone_from_slice(&block)
}

/// One application of the compression function, including the final
/// addition of the input state.
pub fn sha256_compression(state: &[u32; 8], input: &[u32; 16]) -> [u32; 8] {
    let mut output = *state;
    compress256(&mut output, &[words_to_block(input)]);
    output
}

#[derive(Clone, Debug, Default)]
pub struct Sha256TraceBuilder {
    entries: Vec<Sha256TraceEntry>,
}

impl Sha256TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Sha256TraceEntry] {
        &self.entries
    }

    pub fn sha256_compression(&mut self, state: [u32; 8], input: [u32; 16], clk: u32) -> [u32; 8] {
        let output = sha256_compression(&state, &input);
        self.entries.push(Sha256TraceEntry {
            clk,
            state,
            input,
            output,
        });
        output
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IV: [u32; 8] = [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
        0x5be0cd19,
    ];

    #[test]
    fn digest_of_abc() {
        // "abc" padded to a single block.
        let mut input = [0u32; 16];
        input[0] = 0x61626380;
        input[15] = 24;
        let mut sha = Sha256TraceBuilder::new();
        let output = sha.sha256_compression(IV, input, 3);
        assert_eq!(
            output,
            [
                0xba7816bf, 0x8f01cfea, 0x414140de, 0x5dae2223, 0xb00361a3, 0x96177a9c, 0xb410ff61,
                0xf20015ad
            ]
        );
        assert_eq!(sha.entries()[0].clk, 3);
    }
}
