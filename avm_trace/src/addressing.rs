//! Resolution of encoded operands into direct memory addresses.
//!
//! The `indirect` wire value of an instruction with `N` memory operands
//! carries two bits per operand: bit `i` marks operand `i` as indirect, bit
//! `N + i` marks it as relative to the base pointer stored at
//! [`RELATIVE_BASE_ADDRESS`]. Relative adjustment happens first, then the
//! indirection.

use avm_common::RELATIVE_BASE_ADDRESS;

use crate::errors::AvmError;
use crate::memory::{IntermRegister, MemTraceBuilder, MemoryTag};
use crate::util::ff_to_u32;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AddressingMode {
    #[default]
    Direct,
    Indirect,
    Relative,
    IndirectRelative,
}

impl AddressingMode {
    pub const fn new(indirect: bool, relative: bool) -> Self {
        match (indirect, relative) {
            (false, false) => AddressingMode::Direct,
            (true, false) => AddressingMode::Indirect,
            (false, true) => AddressingMode::Relative,
            (true, true) => AddressingMode::IndirectRelative,
        }
    }

    pub const fn is_indirect(self) -> bool {
        matches!(
            self,
            AddressingMode::Indirect | AddressingMode::IndirectRelative
        )
    }

    pub const fn is_relative(self) -> bool {
        matches!(
            self,
            AddressingMode::Relative | AddressingMode::IndirectRelative
        )
    }
}

/// An unresolved operand.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AddressWithMode {
    pub mode: AddressingMode,
    pub offset: u32,
}

impl AddressWithMode {
    pub const fn direct(offset: u32) -> Self {
        Self {
            mode: AddressingMode::Direct,
            offset,
        }
    }

    pub const fn indirect(offset: u32) -> Self {
        Self {
            mode: AddressingMode::Indirect,
            offset,
        }
    }
}

/// A resolved operand.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResolvedAddress {
    /// The final direct address.
    pub direct: u32,
    /// For indirect operands, the address the pointer was loaded from.
    pub indirect: Option<u32>,
}

impl ResolvedAddress {
    pub const fn direct(addr: u32) -> Self {
        Self {
            direct: addr,
            indirect: None,
        }
    }

    pub const fn is_indirect(&self) -> bool {
        self.indirect.is_some()
    }
}

/// Addressing modes of the `N` memory operands of one instruction.
#[derive(Clone, Copy, Debug)]
pub struct Addressing<const N: usize> {
    modes: [AddressingMode; N],
    space_id: u8,
}

impl<const N: usize> Addressing<N> {
    pub fn from_wire(wire: u16, space_id: u8) -> Self {
        let mut modes = [AddressingMode::Direct; N];
        for (i, mode) in modes.iter_mut().enumerate() {
            let indirect = i < 16 && (wire >> i) & 1 == 1;
            let relative = N + i < 16 && (wire >> (N + i)) & 1 == 1;
            *mode = AddressingMode::new(indirect, relative);
        }
        Self { modes, space_id }
    }

    pub fn modes(&self) -> [AddressingMode; N] {
        self.modes
    }

    /// Pairs each offset with the mode of its operand.
    pub fn operands(&self, offsets: [u32; N]) -> [AddressWithMode; N] {
        let mut operands = [AddressWithMode::default(); N];
        for (operand, (mode, offset)) in operands.iter_mut().zip(self.modes.iter().zip(offsets)) {
            *operand = AddressWithMode {
                mode: *mode,
                offset,
            };
        }
        operands
    }

    /// Resolves `offsets` at clock `clk`.
    ///
    /// Indirect pointers of the first four operands are loaded through logged
    /// reads, attached to registers `a` to `d`; later operands are resolved
    /// with unconstrained reads. The first failure is reported, but resolution
    /// continues for every operand so that the caller can still emit its row.
    pub fn resolve(
        &self,
        offsets: [u32; N],
        clk: u32,
        mem: &mut MemTraceBuilder,
    ) -> ([ResolvedAddress; N], AvmError) {
        let mut error = AvmError::NoError;
        let mut resolved = [ResolvedAddress::default(); N];

        let base = if self.modes.iter().any(|m| m.is_relative()) {
            let read = mem.relative_base_load(self.space_id, clk, RELATIVE_BASE_ADDRESS);
            log::trace!("relative base {} at clk {clk}", read.val);
            if read.tag_match {
                ff_to_u32(read.val)
            } else {
                error = error.or(AvmError::AddressingError);
                0
            }
        } else {
            0
        };

        let operands = self.operands(offsets);
        for (i, AddressWithMode { mode, offset }) in operands.into_iter().enumerate() {
            let mut addr = offset;
            if mode.is_relative() {
                addr = match offset.checked_add(base) {
                    Some(addr) => addr,
                    None => {
                        error = error.or(AvmError::AddressingError);
                        offset
                    }
                };
            }

            if !mode.is_indirect() {
                resolved[i] = ResolvedAddress::direct(addr);
                continue;
            }

            let (pointer, tag_match) = match IntermRegister::from_index(i) {
                Some(reg) => {
                    let read = mem.indirect_load(self.space_id, clk, reg, addr);
                    (read.val, read.tag_match)
                }
                None => {
                    let cell = mem.unconstrained_read(self.space_id, addr);
                    (cell.val, cell.tag == MemoryTag::U32)
                }
            };
            if !tag_match {
                error = error.or(AvmError::AddressingError);
            }
            resolved[i] = ResolvedAddress {
                direct: ff_to_u32(pointer),
                indirect: Some(addr),
            };
        }

        (resolved, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryOpKind;
    use crate::util::FF;

    #[test]
    fn wire_decoding() {
        let addressing = Addressing::<3>::from_wire(0b000_010, 0);
        assert_eq!(
            addressing.modes(),
            [
                AddressingMode::Direct,
                AddressingMode::Indirect,
                AddressingMode::Direct
            ]
        );
        let addressing = Addressing::<2>::from_wire(0b0101, 0);
        assert_eq!(
            addressing.modes(),
            [AddressingMode::IndirectRelative, AddressingMode::Direct]
        );
    }

    #[test]
    fn direct_operands_are_untouched() {
        let mut mem = MemTraceBuilder::new();
        let (resolved, error) = Addressing::<2>::from_wire(0, 0).resolve([4, 9], 1, &mut mem);
        assert_eq!(error, AvmError::NoError);
        assert_eq!(resolved.map(|r| r.direct), [4, 9]);
        assert!(mem.is_empty());
    }

    #[test]
    fn indirect_operand_is_logged() {
        let mut mem = MemTraceBuilder::new();
        mem.unconstrained_write(0, 10, FF::from(100u64), MemoryTag::U32);
        let (resolved, error) = Addressing::<2>::from_wire(0b10, 0).resolve([1, 10], 1, &mut mem);
        assert_eq!(error, AvmError::NoError);
        assert_eq!(resolved[1].direct, 100);
        assert_eq!(resolved[1].indirect, Some(10));
        assert_eq!(mem.len(), 1);
        let entry = mem.entries()[0];
        assert_eq!(entry.kind, MemoryOpKind::Read);
        assert_eq!(entry.sub_clk, avm_common::sub_clk::IND_LOAD_B);
    }

    #[test]
    fn relative_operand_adds_base() {
        let mut mem = MemTraceBuilder::new();
        mem.unconstrained_write(0, RELATIVE_BASE_ADDRESS, FF::from(50u64), MemoryTag::U32);
        mem.unconstrained_write(0, 52, FF::from(7u64), MemoryTag::U32);
        // Operand 0 relative, operand 1 indirect-relative.
        let (resolved, error) =
            Addressing::<2>::from_wire(0b1110, 0).resolve([3, 2], 1, &mut mem);
        assert_eq!(error, AvmError::NoError);
        assert_eq!(resolved[0].direct, 53);
        assert_eq!(resolved[1].direct, 7);

        // The base read comes first, then the pointer of operand 1.
        let entries = mem.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address.addr, RELATIVE_BASE_ADDRESS);
        assert_eq!(entries[0].kind, MemoryOpKind::Read);
        assert_eq!(entries[0].val, FF::from(50u64));
        assert_eq!(entries[1].address.addr, 52);
    }

    #[test]
    fn relative_base_must_be_u32() {
        let mut mem = MemTraceBuilder::new();
        mem.unconstrained_write(0, RELATIVE_BASE_ADDRESS, FF::from(50u64), MemoryTag::FF);
        let (resolved, error) = Addressing::<1>::from_wire(0b10, 0).resolve([3], 1, &mut mem);
        assert_eq!(error, AvmError::AddressingError);
        assert_eq!(resolved[0].direct, 3);
        assert!(mem.entries()[0].tag_err);
    }

    #[test]
    fn bad_pointer_tag_is_flagged() {
        let mut mem = MemTraceBuilder::new();
        mem.unconstrained_write(0, 10, FF::from(100u64), MemoryTag::U8);
        let (resolved, error) = Addressing::<1>::from_wire(1, 0).resolve([10], 1, &mut mem);
        assert_eq!(error, AvmError::AddressingError);
        assert_eq!(resolved[0].direct, 100);
    }
}
