//! Tagged memory and the memory-consistency trace.
//!
//! Every constrained access appends a [`MemoryTraceEntry`] to an append-only
//! log. Entries refer to the write that produced the value they observed by
//! index into that log, never by reference, so the log can be sorted by
//! `(space, address, clk, sub_clk)` once at finalization without
//! invalidating anything the builder still uses.

pub mod tag;

use avm_common::sub_clk::{self, NUM_SUB_CLK};
use hashbrown::HashMap;
use itertools::Itertools;

pub use self::tag::MemoryTag;
use crate::util::{ff_inverse_or_zero, FF};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MemoryAddress {
    pub space_id: u8,
    pub addr: u32,
}

impl MemoryAddress {
    pub const fn new(space_id: u8, addr: u32) -> Self {
        Self { space_id, addr }
    }

    /// Global address: the address with the space id in the bits above 32.
    pub const fn global(&self) -> u64 {
        self.addr as u64 + ((self.space_id as u64) << 32)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryOpKind {
    Read,
    Write,
}

/// Current content of a memory cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryCell {
    pub val: FF,
    pub tag: MemoryTag,
    /// Index in the access log of the write that stored this content. `None`
    /// for cells never written through a logged access.
    pub last_write: Option<usize>,
}

/// One logged memory access.
#[derive(Clone, Copy, Debug)]
pub struct MemoryTraceEntry {
    pub clk: u32,
    pub sub_clk: u32,
    pub address: MemoryAddress,
    pub val: FF,
    /// Tag of the cell after the access.
    pub tag: MemoryTag,
    /// Tag expected by the reader.
    pub r_in_tag: MemoryTag,
    /// Tag used by the writer.
    pub w_in_tag: MemoryTag,
    pub kind: MemoryOpKind,
    pub tag_err: bool,
    /// Inverse of `tag - r_in_tag`, zero when the tags match.
    pub tag_diff_inv: FF,
    pub sel_mov_ia_to_ic: bool,
    pub sel_op_slice: bool,
    pub poseidon_mem_op: bool,
    /// Whether the tag error must be matched against the main trace.
    pub tag_err_count_relevant: bool,
    /// Index of the write this access observed, for reads. For writes, the
    /// write it overwrote.
    pub prev_write: Option<usize>,
}

impl MemoryTraceEntry {
    /// Timestamp combining the clock and the sub-clock.
    pub const fn tsp(&self) -> u64 {
        NUM_SUB_CLK as u64 * self.clk as u64 + self.sub_clk as u64
    }

    pub const fn sorting_key(&self) -> (u8, u32, u32, u32) {
        (self.address.space_id, self.address.addr, self.clk, self.sub_clk)
    }

    pub const fn is_write(&self) -> bool {
        matches!(self.kind, MemoryOpKind::Write)
    }
}

/// Result of a logged read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRead {
    pub val: FF,
    pub tag: MemoryTag,
    pub tag_match: bool,
}

/// Register of the main trace an access is attached to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntermRegister {
    Ia,
    Ib,
    Ic,
    Id,
}

impl IntermRegister {
    pub const fn index(self) -> u32 {
        match self {
            IntermRegister::Ia => 0,
            IntermRegister::Ib => 1,
            IntermRegister::Ic => 2,
            IntermRegister::Id => 3,
        }
    }

    pub const fn load_sub_clk(self) -> u32 {
        sub_clk::LOAD_A + self.index()
    }

    pub const fn store_sub_clk(self) -> u32 {
        sub_clk::STORE_A + self.index()
    }

    pub const fn ind_load_sub_clk(self) -> u32 {
        sub_clk::IND_LOAD_A + self.index()
    }

    pub const fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(IntermRegister::Ia),
            1 => Some(IntermRegister::Ib),
            2 => Some(IntermRegister::Ic),
            3 => Some(IntermRegister::Id),
            _ => None,
        }
    }
}

/// Zero-initialized memory, keyed by space id and address.
#[derive(Clone, Debug, Default)]
pub struct TaggedMemory {
    cells: HashMap<MemoryAddress, MemoryCell>,
}

impl TaggedMemory {
    pub fn get(&self, address: MemoryAddress) -> MemoryCell {
        self.cells.get(&address).copied().unwrap_or_default()
    }

    pub fn set(&mut self, address: MemoryAddress, cell: MemoryCell) {
        self.cells.insert(address, cell);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Multiplicities of the limbs of the memory timestamp and address deltas.
#[derive(Clone, Debug)]
pub struct MemRangeCheckCounts {
    pub u16_r0: Vec<u32>,
    pub u16_r1: Vec<u32>,
    pub u8_r0: Vec<u32>,
}

impl Default for MemRangeCheckCounts {
    fn default() -> Self {
        Self {
            u16_r0: vec![0; 1 << 16],
            u16_r1: vec![0; 1 << 16],
            u8_r0: vec![0; 1 << 8],
        }
    }
}

impl MemRangeCheckCounts {
    /// Decomposes a 40-bit delta into `(u16_r0, u16_r1, u8_r0)` and counts
    /// every limb.
    pub fn add_diff(&mut self, diff: u64) -> (u16, u16, u8) {
        let r0 = diff as u16;
        let r1 = (diff >> 16) as u16;
        let r2 = (diff >> 32) as u8;
        self.u16_r0[r0 as usize] += 1;
        self.u16_r1[r1 as usize] += 1;
        self.u8_r0[r2 as usize] += 1;
        (r0, r1, r2)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemTraceBuilder {
    memory: TaggedMemory,
    log: Vec<MemoryTraceEntry>,
    /// Number of tag errors raised at each clock.
    pub(crate) tag_err_lookup_counts: HashMap<u32, u32>,
    pub(crate) rng_chk_counts: MemRangeCheckCounts,
}

impl MemTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// The access log, in append order.
    pub fn entries(&self) -> &[MemoryTraceEntry] {
        &self.log
    }

    fn append_read(
        &mut self,
        clk: u32,
        sub_clk: u32,
        address: MemoryAddress,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) -> (MemoryCell, bool) {
        let cell = self.memory.get(address);
        let tag_match = cell.tag == r_in_tag;
        let tag_diff_inv = if tag_match {
            FF::from(0u64)
        } else {
            ff_inverse_or_zero(cell.tag.as_ff() - r_in_tag.as_ff())
        };
        self.log.push(MemoryTraceEntry {
            clk,
            sub_clk,
            address,
            val: cell.val,
            tag: cell.tag,
            r_in_tag,
            w_in_tag,
            kind: MemoryOpKind::Read,
            tag_err: !tag_match,
            tag_diff_inv,
            sel_mov_ia_to_ic: false,
            sel_op_slice: false,
            poseidon_mem_op: false,
            tag_err_count_relevant: false,
            prev_write: cell.last_write,
        });
        (cell, tag_match)
    }

    fn append_write(
        &mut self,
        clk: u32,
        sub_clk: u32,
        address: MemoryAddress,
        val: FF,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) -> usize {
        let prev = self.memory.get(address);
        let index = self.log.len();
        self.log.push(MemoryTraceEntry {
            clk,
            sub_clk,
            address,
            val,
            tag: w_in_tag,
            r_in_tag,
            w_in_tag,
            kind: MemoryOpKind::Write,
            tag_err: false,
            tag_diff_inv: FF::from(0u64),
            sel_mov_ia_to_ic: false,
            sel_op_slice: false,
            poseidon_mem_op: false,
            tag_err_count_relevant: false,
            prev_write: prev.last_write,
        });
        self.memory.set(
            address,
            MemoryCell {
                val,
                tag: w_in_tag,
                last_write: Some(index),
            },
        );
        index
    }

    fn last_entry_mut(&mut self) -> Option<&mut MemoryTraceEntry> {
        self.log.last_mut()
    }

    /// Logged read of a register operand. A tag mismatch does not prevent the
    /// read: the stored value and tag are returned and `tag_match` is false.
    pub fn read_and_load_from_memory(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) -> MemRead {
        let address = MemoryAddress::new(space_id, addr);
        let (cell, tag_match) =
            self.append_read(clk, reg.load_sub_clk(), address, r_in_tag, w_in_tag);
        if !tag_match {
            if let Some(entry) = self.last_entry_mut() {
                entry.tag_err_count_relevant = true;
            }
            *self.tag_err_lookup_counts.entry(clk).or_default() += 1;
        }
        MemRead {
            val: cell.val,
            tag: cell.tag,
            tag_match,
        }
    }

    /// Same as [`Self::read_and_load_from_memory`] but for the Poseidon2
    /// gadget, whose accesses are matched by a dedicated permutation.
    pub fn poseidon_read(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
    ) -> MemRead {
        let read = self.read_and_load_from_memory(
            space_id,
            clk,
            reg,
            addr,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        if let Some(entry) = self.last_entry_mut() {
            entry.poseidon_mem_op = true;
        }
        read
    }

    pub fn poseidon_write(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
        val: FF,
    ) {
        self.write_into_memory(space_id, clk, reg, addr, val, MemoryTag::FF, MemoryTag::FF);
        if let Some(entry) = self.last_entry_mut() {
            entry.poseidon_mem_op = true;
        }
    }

    /// Logged read used to resolve an indirect operand. The pointer must be
    /// tagged U32.
    pub fn indirect_load(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
    ) -> MemRead {
        let address = MemoryAddress::new(space_id, addr);
        let (cell, tag_match) = self.append_read(
            clk,
            reg.ind_load_sub_clk(),
            address,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        MemRead {
            val: cell.val,
            tag: cell.tag,
            tag_match,
        }
    }

    /// Logged read of the relative base pointer, which must be tagged U32. It
    /// shares the sub-clock of the first indirect load.
    pub fn relative_base_load(&mut self, space_id: u8, clk: u32, addr: u32) -> MemRead {
        let address = MemoryAddress::new(space_id, addr);
        let (cell, tag_match) = self.append_read(
            clk,
            sub_clk::IND_LOAD_A,
            address,
            MemoryTag::U32,
            MemoryTag::U32,
        );
        MemRead {
            val: cell.val,
            tag: cell.tag,
            tag_match,
        }
    }

    /// Logged read without any tag expectation: the expected tag is the stored
    /// one. Used by MOV, CAST and JUMPI.
    pub fn read_and_load_untagged(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
        w_in_tag: MemoryTag,
    ) -> MemRead {
        let address = MemoryAddress::new(space_id, addr);
        let stored_tag = self.memory.get(address).tag;
        let (cell, _) = self.append_read(clk, reg.load_sub_clk(), address, stored_tag, w_in_tag);
        MemRead {
            val: cell.val,
            tag: cell.tag,
            tag_match: true,
        }
    }

    /// Logged read for MOV: the value is copied to the destination with its
    /// tag.
    pub fn read_and_load_mov_opcode(&mut self, space_id: u8, clk: u32, addr: u32) -> MemRead {
        let address = MemoryAddress::new(space_id, addr);
        let stored_tag = self.memory.get(address).tag;
        let read =
            self.read_and_load_untagged(space_id, clk, IntermRegister::Ia, addr, stored_tag);
        if let Some(entry) = self.last_entry_mut() {
            entry.sel_mov_ia_to_ic = true;
        }
        read
    }

    /// Logged write. Always succeeds, overwriting value and tag.
    #[allow(clippy::too_many_arguments)]
    pub fn write_into_memory(
        &mut self,
        space_id: u8,
        clk: u32,
        reg: IntermRegister,
        addr: u32,
        val: FF,
        r_in_tag: MemoryTag,
        w_in_tag: MemoryTag,
    ) {
        let address = MemoryAddress::new(space_id, addr);
        self.append_write(clk, reg.store_sub_clk(), address, val, r_in_tag, w_in_tag);
    }

    /// Logged read of a contiguous range, checked by the slice lookups rather
    /// than by register tags.
    pub fn read_slice(&mut self, space_id: u8, clk: u32, addr: u32, len: u32) -> Vec<MemRead> {
        (0..len)
            .map(|i| {
                let address = MemoryAddress::new(space_id, addr.wrapping_add(i));
                let stored_tag = self.memory.get(address).tag;
                let (cell, _) =
                    self.append_read(clk, sub_clk::LOAD_A, address, stored_tag, stored_tag);
                if let Some(entry) = self.last_entry_mut() {
                    entry.sel_op_slice = true;
                }
                MemRead {
                    val: cell.val,
                    tag: cell.tag,
                    tag_match: true,
                }
            })
            .collect()
    }

    /// Logged write of a contiguous range with a single tag.
    pub fn write_slice(
        &mut self,
        space_id: u8,
        clk: u32,
        addr: u32,
        tag: MemoryTag,
        values: &[FF],
    ) {
        for (i, val) in values.iter().enumerate() {
            let address = MemoryAddress::new(space_id, addr.wrapping_add(i as u32));
            self.append_write(clk, sub_clk::STORE_A, address, *val, tag, tag);
            if let Some(entry) = self.last_entry_mut() {
                entry.sel_op_slice = true;
            }
        }
    }

    /// Reads a cell without logging.
    pub fn unconstrained_read(&self, space_id: u8, addr: u32) -> MemoryCell {
        self.memory.get(MemoryAddress::new(space_id, addr))
    }

    /// Writes a cell without logging.
    pub fn unconstrained_write(&mut self, space_id: u8, addr: u32, val: FF, tag: MemoryTag) {
        let address = MemoryAddress::new(space_id, addr);
        let last_write = self.memory.get(address).last_write;
        self.memory.set(
            address,
            MemoryCell {
                val,
                tag,
                last_write,
            },
        );
    }

    /// Returns true if the cell at `addr` carries `tag`.
    pub fn check_tag(&self, space_id: u8, addr: u32, tag: MemoryTag) -> bool {
        self.unconstrained_read(space_id, addr).tag == tag
    }

    /// Returns true if every cell of `[addr, addr + len)` carries `tag`.
    pub fn check_tag_range(&self, space_id: u8, addr: u32, len: u32, tag: MemoryTag) -> bool {
        (0..len).all(|i| self.check_tag(space_id, addr.wrapping_add(i), tag))
    }

    /// Indices of logged reads that returned something other than the content
    /// stored by the write they refer to. Empty for any trace produced by this
    /// builder.
    pub fn consistency_violations(&self) -> Vec<usize> {
        self.log
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_write())
            .filter_map(|(i, entry)| {
                let write = &self.log[entry.prev_write?];
                let consistent = write.address == entry.address
                    && write.val == entry.val
                    && write.tag == entry.tag
                    && write.sorting_key() < entry.sorting_key();
                (!consistent).then_some(i)
            })
            .collect()
    }

    /// Returns the access log sorted by `(space, address, clk, sub_clk)`.
    pub fn finalize(&self) -> Vec<MemoryTraceEntry> {
        self.log
            .iter()
            .copied()
            .sorted_by_key(MemoryTraceEntry::sorting_key)
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_observes_last_write() {
        let mut mem = MemTraceBuilder::new();
        mem.write_into_memory(
            0,
            1,
            IntermRegister::Ic,
            5,
            FF::from(9u64),
            MemoryTag::U8,
            MemoryTag::U8,
        );
        let read = mem.read_and_load_from_memory(
            0,
            2,
            IntermRegister::Ia,
            5,
            MemoryTag::U8,
            MemoryTag::U8,
        );
        assert_eq!(read.val, FF::from(9u64));
        assert!(read.tag_match);
        assert_eq!(mem.entries()[1].prev_write, Some(0));
        assert!(mem.consistency_violations().is_empty());
    }

    #[test]
    fn tag_mismatch_is_flagged_not_blocked() {
        let mut mem = MemTraceBuilder::new();
        mem.write_into_memory(
            0,
            1,
            IntermRegister::Ic,
            5,
            FF::from(9u64),
            MemoryTag::FF,
            MemoryTag::FF,
        );
        let read = mem.read_and_load_from_memory(
            0,
            2,
            IntermRegister::Ia,
            5,
            MemoryTag::U8,
            MemoryTag::U8,
        );
        assert!(!read.tag_match);
        assert_eq!(read.val, FF::from(9u64));
        assert_eq!(read.tag, MemoryTag::FF);
        assert!(mem.entries()[1].tag_err);
        assert_eq!(mem.tag_err_lookup_counts.get(&2), Some(&1));
    }

    #[test]
    fn absent_cells_read_as_zero_field() {
        let mut mem = MemTraceBuilder::new();
        let read = mem.read_and_load_from_memory(
            3,
            1,
            IntermRegister::Ib,
            77,
            MemoryTag::FF,
            MemoryTag::FF,
        );
        assert_eq!(read.val, FF::from(0u64));
        assert!(read.tag_match);
        assert_eq!(mem.entries()[0].prev_write, None);
    }

    #[test]
    fn spaces_are_isolated() {
        let mut mem = MemTraceBuilder::new();
        mem.write_into_memory(
            1,
            1,
            IntermRegister::Ic,
            5,
            FF::from(1u64),
            MemoryTag::U32,
            MemoryTag::U32,
        );
        mem.write_into_memory(
            2,
            1,
            IntermRegister::Id,
            5,
            FF::from(2u64),
            MemoryTag::U32,
            MemoryTag::U32,
        );
        assert_eq!(mem.unconstrained_read(1, 5).val, FF::from(1u64));
        assert_eq!(mem.unconstrained_read(2, 5).val, FF::from(2u64));
    }

    #[test]
    fn finalize_sorts_by_space_address_and_time() {
        let mut mem = MemTraceBuilder::new();
        mem.write_into_memory(
            0,
            2,
            IntermRegister::Ic,
            9,
            FF::from(1u64),
            MemoryTag::U8,
            MemoryTag::U8,
        );
        mem.write_into_memory(
            0,
            1,
            IntermRegister::Ic,
            3,
            FF::from(1u64),
            MemoryTag::U8,
            MemoryTag::U8,
        );
        mem.read_and_load_from_memory(0, 3, IntermRegister::Ia, 3, MemoryTag::U8, MemoryTag::U8);
        let sorted = mem.finalize();
        let keys = sorted.iter().map(MemoryTraceEntry::sorting_key).collect_vec();
        assert_eq!(
            keys,
            vec![
                (0, 3, 1, sub_clk::STORE_C),
                (0, 3, 3, sub_clk::LOAD_A),
                (0, 9, 2, sub_clk::STORE_C)
            ]
        );
    }

    #[test]
    fn range_check_limbs() {
        let mut counts = MemRangeCheckCounts::default();
        let (r0, r1, r2) = counts.add_diff(0x12_3456_789a);
        assert_eq!((r0, r1, r2), (0x789a, 0x3456, 0x12));
        assert_eq!(counts.u16_r0[0x789a], 1);
        assert_eq!(counts.u8_r0[0x12], 1);
    }
}
