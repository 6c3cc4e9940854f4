//! Gas metering.
//!
//! Every instruction is charged a fixed base cost per gas kind plus a
//! per-unit dynamic cost times an instruction-specific multiplier. The
//! remaining gas after each instruction is recorded and later range-checked
//! through two 16-bit limbs of its absolute value.

use hashbrown::HashMap;

use crate::columns::Row;
use crate::opcode::{OpCode, NUM_OPCODES};
use crate::util::{ff_bool, ff_from_i64, FF};

/// Costs of one opcode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasCost {
    pub base_l2: u32,
    pub base_da: u32,
    pub dyn_l2: u32,
    pub dyn_da: u32,
}

const fn cost(base_l2: u32, base_da: u32, dyn_l2: u32, dyn_da: u32) -> GasCost {
    GasCost {
        base_l2,
        base_da,
        dyn_l2,
        dyn_da,
    }
}

impl OpCode {
    pub const fn gas_cost(self) -> GasCost {
        match self {
            OpCode::Add | OpCode::Sub | OpCode::Eq | OpCode::Lt | OpCode::Lte => cost(10, 0, 0, 0),
            OpCode::Mul | OpCode::Div | OpCode::FDiv => cost(27, 0, 0, 0),
            OpCode::And | OpCode::Or | OpCode::Xor | OpCode::Not => cost(12, 0, 0, 0),
            OpCode::Shl | OpCode::Shr => cost(12, 0, 0, 0),
            OpCode::Cast => cost(9, 0, 0, 0),
            OpCode::GetEnvVar => cost(9, 0, 0, 0),
            OpCode::CalldataCopy | OpCode::ReturndataCopy => cost(27, 0, 3, 0),
            OpCode::ReturndataSize => cost(9, 0, 0, 0),
            OpCode::Jump | OpCode::InternalCall | OpCode::InternalReturn => cost(9, 0, 0, 0),
            OpCode::JumpI => cost(9, 0, 0, 0),
            OpCode::Set | OpCode::Mov => cost(9, 0, 0, 0),
            OpCode::SLoad => cost(1455, 0, 0, 0),
            OpCode::SStore => cost(1657, 512, 0, 0),
            OpCode::NoteHashExists => cost(1476, 0, 0, 0),
            OpCode::EmitNoteHash => cost(1285, 512, 0, 0),
            OpCode::NullifierExists => cost(1482, 0, 0, 0),
            OpCode::EmitNullifier => cost(1540, 512, 0, 0),
            OpCode::L1ToL2MsgExists => cost(1478, 0, 0, 0),
            OpCode::GetContractInstance => cost(1527, 0, 0, 0),
            OpCode::EmitUnencryptedLog => cost(18, 0, 3, 512),
            OpCode::SendL2ToL1Msg => cost(209, 512, 0, 0),
            OpCode::Call | OpCode::StaticCall => cost(45, 0, 4, 0),
            OpCode::Return | OpCode::Revert => cost(28, 0, 3, 0),
            OpCode::DebugLog => cost(9, 0, 3, 0),
            OpCode::Poseidon2Perm => cost(78, 0, 0, 0),
            OpCode::Sha256Compression => cost(261, 0, 0, 0),
            OpCode::KeccakF1600 => cost(300, 0, 0, 0),
            OpCode::EcAdd => cost(62, 0, 0, 0),
            OpCode::Msm => cost(1000, 0, 50, 0),
            OpCode::ToRadixLe | OpCode::ToRadixBe => cost(18, 0, 3, 0),
        }
    }
}

/// The fixed gas-cost table, indexed by [`OpCode::index`].
pub fn fixed_gas_table() -> [GasCost; NUM_OPCODES] {
    OpCode::ALL.map(OpCode::gas_cost)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GasTraceEntry {
    pub clk: u32,
    pub opcode: OpCode,
    pub base_l2_gas_cost: u32,
    pub base_da_gas_cost: u32,
    pub dyn_l2_gas_cost: u32,
    pub dyn_da_gas_cost: u32,
    pub dyn_gas_multiplier: u32,
    /// Gas left after the instruction. Negative once gas is exhausted.
    pub remaining_l2_gas: i64,
    pub remaining_da_gas: i64,
}

/// Lowest remaining gas that is recorded. A larger deficit is recorded as
/// this one, so that its absolute value still fits the two limbs.
const MIN_REMAINING_GAS: i64 = -(u32::MAX as i64);

/// Splits the absolute value of a remaining gas amount into two 16-bit limbs.
fn rem_gas_limbs(remaining: i64) -> (u16, u16) {
    let abs = remaining.unsigned_abs();
    debug_assert!(abs <= u32::MAX as u64, "remaining gas {remaining} does not fit 32 bits");
    (abs as u16, (abs >> 16) as u16)
}

/// Gas of a caller set aside while one of its nested calls runs on the
/// gas allocated to it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReservedGas {
    pub l2: i64,
    pub da: i64,
}

#[derive(Clone, Debug, Default)]
pub struct GasTraceBuilder {
    entries: Vec<GasTraceEntry>,
    initial_l2_gas: u32,
    initial_da_gas: u32,
    remaining_l2_gas: i64,
    remaining_da_gas: i64,
    /// Number of times each opcode row of the fixed gas table is looked up.
    pub(crate) gas_opcode_lookup_counter: HashMap<usize, u32>,
    /// Multiplicities of the remaining gas limbs: L2 low, L2 high, DA low,
    /// DA high.
    pub(crate) rem_gas_rng_check_counts: [HashMap<u16, u32>; 4],
}

impl GasTraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[GasTraceEntry] {
        &self.entries
    }

    pub fn set_initial_gas(&mut self, l2_gas: u32, da_gas: u32) {
        self.initial_l2_gas = l2_gas;
        self.initial_da_gas = da_gas;
        self.remaining_l2_gas = l2_gas as i64;
        self.remaining_da_gas = da_gas as i64;
    }

    pub fn initial_gas(&self) -> (u32, u32) {
        (self.initial_l2_gas, self.initial_da_gas)
    }

    pub fn l2_gas_left(&self) -> u32 {
        self.remaining_l2_gas.max(0) as u32
    }

    pub fn da_gas_left(&self) -> u32 {
        self.remaining_da_gas.max(0) as u32
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.remaining_l2_gas < 0 || self.remaining_da_gas < 0
    }

    /// Total `(l2, da)` cost of `opcode` with the given dynamic multiplier.
    fn cost_of(opcode: OpCode, dyn_gas_multiplier: u32) -> (i64, i64) {
        let cost = opcode.gas_cost();
        (
            cost.base_l2 as i64 + cost.dyn_l2 as i64 * dyn_gas_multiplier as i64,
            cost.base_da as i64 + cost.dyn_da as i64 * dyn_gas_multiplier as i64,
        )
    }

    /// True if `opcode` with the given dynamic multiplier can be paid for
    /// with the gas left. Nothing is charged.
    pub fn can_afford(&self, opcode: OpCode, dyn_gas_multiplier: u32) -> bool {
        let (l2, da) = Self::cost_of(opcode, dyn_gas_multiplier);
        l2 <= self.remaining_l2_gas && da <= self.remaining_da_gas
    }

    /// Restricts the gas left to at most `l2` and `da` for a nested call and
    /// returns the part kept by the caller.
    pub fn allocate_for_call(&mut self, l2: u32, da: u32) -> ReservedGas {
        let l2 = self.remaining_l2_gas.clamp(0, l2 as i64);
        let da = self.remaining_da_gas.clamp(0, da as i64);
        let reserved = ReservedGas {
            l2: self.remaining_l2_gas - l2,
            da: self.remaining_da_gas - da,
        };
        self.remaining_l2_gas = l2;
        self.remaining_da_gas = da;
        reserved
    }

    /// Gives the caller its reserved gas back once a nested call ended.
    /// After an exceptional halt the callee keeps nothing of its
    /// allocation.
    pub fn return_from_call(&mut self, reserved: ReservedGas, exceptional: bool) {
        let (l2_left, da_left) = if exceptional {
            (0, 0)
        } else {
            (self.remaining_l2_gas.max(0), self.remaining_da_gas.max(0))
        };
        self.remaining_l2_gas = reserved.l2 + l2_left;
        self.remaining_da_gas = reserved.da + da_left;
    }

    /// Charges `opcode` with the given dynamic multiplier. Returns false if
    /// either gas kind is exhausted afterwards.
    pub fn constrain_gas(&mut self, clk: u32, opcode: OpCode, dyn_gas_multiplier: u32) -> bool {
        self.constrain_gas_with(clk, opcode, dyn_gas_multiplier, None, None)
    }

    /// Like [`Self::constrain_gas`], but with the total costs replaced by
    /// `forced_l2` and `forced_da` when they are given. Used by nested calls,
    /// whose consumption is only known from their hint.
    pub fn constrain_gas_with(
        &mut self,
        clk: u32,
        opcode: OpCode,
        dyn_gas_multiplier: u32,
        forced_l2: Option<u32>,
        forced_da: Option<u32>,
    ) -> bool {
        let cost = opcode.gas_cost();
        let (l2, da) = Self::cost_of(opcode, dyn_gas_multiplier);
        let l2 = forced_l2.map_or(l2, i64::from);
        let da = forced_da.map_or(da, i64::from);
        self.remaining_l2_gas = (self.remaining_l2_gas - l2).max(MIN_REMAINING_GAS);
        self.remaining_da_gas = (self.remaining_da_gas - da).max(MIN_REMAINING_GAS);

        let (l2_r0, l2_r1) = rem_gas_limbs(self.remaining_l2_gas);
        let (da_r0, da_r1) = rem_gas_limbs(self.remaining_da_gas);
        for (counts, limb) in self
            .rem_gas_rng_check_counts
            .iter_mut()
            .zip([l2_r0, l2_r1, da_r0, da_r1])
        {
            *counts.entry(limb).or_default() += 1;
        }
        *self
            .gas_opcode_lookup_counter
            .entry(opcode.index())
            .or_default() += 1;

        self.entries.push(GasTraceEntry {
            clk,
            opcode,
            base_l2_gas_cost: cost.base_l2,
            base_da_gas_cost: cost.base_da,
            dyn_l2_gas_cost: cost.dyn_l2,
            dyn_da_gas_cost: cost.dyn_da,
            dyn_gas_multiplier,
            remaining_l2_gas: self.remaining_l2_gas,
            remaining_da_gas: self.remaining_da_gas,
        });

        !self.is_out_of_gas()
    }

    /// Writes the gas columns of the execution rows. Row `clk - 1` holds the
    /// instruction of clock `clk` until the first row is inserted.
    pub fn finalize(&self, rows: &mut [Row<FF>]) {
        for entry in &self.entries {
            let Some(dest) = (entry.clk as usize)
                .checked_sub(1)
                .and_then(|i| rows.get_mut(i))
            else {
                continue;
            };
            let (l2_r0, l2_r1) = rem_gas_limbs(entry.remaining_l2_gas);
            let (da_r0, da_r1) = rem_gas_limbs(entry.remaining_da_gas);

            dest.main_is_gas_accounted = FF::from(1u64);
            dest.main_opcode_val = FF::from(entry.opcode.index() as u64);
            dest.main_base_l2_gas_op_cost = FF::from(entry.base_l2_gas_cost);
            dest.main_base_da_gas_op_cost = FF::from(entry.base_da_gas_cost);
            dest.main_dyn_l2_gas_op_cost = FF::from(entry.dyn_l2_gas_cost);
            dest.main_dyn_da_gas_op_cost = FF::from(entry.dyn_da_gas_cost);
            dest.main_dyn_gas_multiplier = FF::from(entry.dyn_gas_multiplier);
            dest.main_l2_gas_remaining = ff_from_i64(entry.remaining_l2_gas);
            dest.main_da_gas_remaining = ff_from_i64(entry.remaining_da_gas);
            dest.main_l2_out_of_gas = ff_bool(entry.remaining_l2_gas < 0);
            dest.main_da_out_of_gas = ff_bool(entry.remaining_da_gas < 0);
            dest.main_abs_l2_rem_gas = FF::from(entry.remaining_l2_gas.unsigned_abs());
            dest.main_abs_da_rem_gas = FF::from(entry.remaining_da_gas.unsigned_abs());
            dest.main_l2_gas_u16_r0 = FF::from(l2_r0 as u64);
            dest.main_l2_gas_u16_r1 = FF::from(l2_r1 as u64);
            dest.main_da_gas_u16_r0 = FF::from(da_r0 as u64);
            dest.main_da_gas_u16_r1 = FF::from(da_r1 as u64);
        }
    }

    /// Writes the fixed gas-cost table and its lookup counts. Rows `0` to
    /// `NUM_OPCODES - 1` must exist.
    pub fn finalize_lookups(&self, rows: &mut [Row<FF>]) {
        for (dest, cost) in rows.iter_mut().zip(fixed_gas_table()) {
            dest.gas_sel_gas_cost = FF::from(1u64);
            dest.gas_base_l2_gas_fixed_table = FF::from(cost.base_l2);
            dest.gas_base_da_gas_fixed_table = FF::from(cost.base_da);
            dest.gas_dyn_l2_gas_fixed_table = FF::from(cost.dyn_l2);
            dest.gas_dyn_da_gas_fixed_table = FF::from(cost.dyn_da);
        }
        for (opcode, count) in &self.gas_opcode_lookup_counter {
            if let Some(dest) = rows.get_mut(*opcode) {
                dest.lookup_opcode_gas_counts = FF::from(*count);
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
