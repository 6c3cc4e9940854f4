//! Decoded instructions, one variant per opcode family.

use crate::gadgets::conversion::LimbOrder;
use crate::memory::MemoryTag;
use crate::opcode::OpCode;
use crate::util::FF;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    FDiv,
    Eq,
    Lt,
    Lte,
}

impl ArithmeticOp {
    pub const fn opcode(self) -> OpCode {
        match self {
            ArithmeticOp::Add => OpCode::Add,
            ArithmeticOp::Sub => OpCode::Sub,
            ArithmeticOp::Mul => OpCode::Mul,
            ArithmeticOp::Div => OpCode::Div,
            ArithmeticOp::FDiv => OpCode::FDiv,
            ArithmeticOp::Eq => OpCode::Eq,
            ArithmeticOp::Lt => OpCode::Lt,
            ArithmeticOp::Lte => OpCode::Lte,
        }
    }

    /// Comparisons write a U1 result.
    pub const fn is_comparison(self) -> bool {
        matches!(self, ArithmeticOp::Eq | ArithmeticOp::Lt | ArithmeticOp::Lte)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BitwiseOp {
    pub const fn opcode(self) -> OpCode {
        match self {
            BitwiseOp::And => OpCode::And,
            BitwiseOp::Or => OpCode::Or,
            BitwiseOp::Xor => OpCode::Xor,
            BitwiseOp::Shl => OpCode::Shl,
            BitwiseOp::Shr => OpCode::Shr,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    Call,
    StaticCall,
}

/// Environment variables readable with GETENVVAR.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum EnvironmentVariable {
    Address = 0,
    Sender,
    TransactionFee,
    ChainId,
    Version,
    BlockNumber,
    Timestamp,
    FeePerL2Gas,
    FeePerDaGas,
    IsStaticCall,
    L2GasLeft,
    DaGasLeft,
}

impl EnvironmentVariable {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => EnvironmentVariable::Address,
            1 => EnvironmentVariable::Sender,
            2 => EnvironmentVariable::TransactionFee,
            3 => EnvironmentVariable::ChainId,
            4 => EnvironmentVariable::Version,
            5 => EnvironmentVariable::BlockNumber,
            6 => EnvironmentVariable::Timestamp,
            7 => EnvironmentVariable::FeePerL2Gas,
            8 => EnvironmentVariable::FeePerDaGas,
            9 => EnvironmentVariable::IsStaticCall,
            10 => EnvironmentVariable::L2GasLeft,
            11 => EnvironmentVariable::DaGasLeft,
            _ => return None,
        })
    }
}

/// Members of a contract instance readable with GETCONTRACTINSTANCE.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ContractInstanceMember {
    Deployer = 0,
    ClassId,
    InitHash,
}

impl ContractInstanceMember {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ContractInstanceMember::Deployer),
            1 => Some(ContractInstanceMember::ClassId),
            2 => Some(ContractInstanceMember::InitHash),
            _ => None,
        }
    }
}

/// A decoded instruction. Offsets are memory offsets resolved through the
/// `indirect` addressing bits; fields documented as immediates are not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Arithmetic {
        op: ArithmeticOp,
        indirect: u8,
        a: u32,
        b: u32,
        dst: u32,
    },
    Bitwise {
        op: BitwiseOp,
        indirect: u8,
        a: u32,
        b: u32,
        dst: u32,
    },
    Not {
        indirect: u8,
        src: u32,
        dst: u32,
    },
    Cast {
        indirect: u8,
        src: u32,
        dst: u32,
        dst_tag: MemoryTag,
    },
    /// Writes the immediate `value`, truncated to `tag`.
    Set {
        indirect: u8,
        tag: MemoryTag,
        value: FF,
        dst: u32,
    },
    Mov {
        indirect: u8,
        src: u32,
        dst: u32,
    },
    /// `var` is the raw enum byte; unknown values are an execution error.
    GetEnvVar {
        indirect: u8,
        var: u8,
        dst: u32,
    },
    CalldataCopy {
        indirect: u8,
        cd_offset: u32,
        copy_size: u32,
        dst: u32,
    },
    ReturndataSize {
        indirect: u8,
        dst: u32,
    },
    ReturndataCopy {
        indirect: u8,
        rd_offset: u32,
        copy_size: u32,
        dst: u32,
    },
    /// `loc` is an immediate program counter.
    Jump {
        loc: u32,
    },
    JumpI {
        indirect: u8,
        loc: u32,
        cond: u32,
    },
    InternalCall {
        loc: u32,
    },
    InternalReturn,
    SLoad {
        indirect: u8,
        slot: u32,
        dst: u32,
    },
    SStore {
        indirect: u8,
        src: u32,
        slot: u32,
    },
    NoteHashExists {
        indirect: u8,
        note_hash: u32,
        leaf_index: u32,
        dst: u32,
    },
    EmitNoteHash {
        indirect: u8,
        note_hash: u32,
    },
    NullifierExists {
        indirect: u8,
        nullifier: u32,
        address: u32,
        dst: u32,
    },
    EmitNullifier {
        indirect: u8,
        nullifier: u32,
    },
    L1ToL2MsgExists {
        indirect: u8,
        msg_hash: u32,
        leaf_index: u32,
        dst: u32,
    },
    GetContractInstance {
        indirect: u8,
        address: u32,
        dst: u32,
        exists: u32,
        member: u8,
    },
    /// `log_size` is the offset of the U32 length of the log.
    EmitUnencryptedLog {
        indirect: u8,
        log: u32,
        log_size: u32,
    },
    SendL2ToL1Msg {
        indirect: u8,
        recipient: u32,
        content: u32,
    },
    /// `gas` points at the pair `(l2_gas, da_gas)`.
    ExternalCall {
        kind: CallKind,
        indirect: u16,
        gas: u32,
        address: u32,
        args: u32,
        args_size: u32,
        success: u32,
    },
    /// `size_offset` is the offset of the U32 length of the returned data.
    Return {
        indirect: u8,
        offset: u32,
        size_offset: u32,
    },
    Revert {
        indirect: u8,
        offset: u32,
        size_offset: u32,
    },
    /// `message_size` is an immediate.
    DebugLog {
        indirect: u8,
        message: u32,
        fields: u32,
        fields_size: u32,
        message_size: u32,
    },
    Poseidon2Perm {
        indirect: u8,
        input: u32,
        output: u32,
    },
    Sha256Compression {
        indirect: u8,
        output: u32,
        state: u32,
        input: u32,
    },
    KeccakF1600 {
        indirect: u8,
        output: u32,
        input: u32,
    },
    EcAdd {
        indirect: u16,
        p1_x: u32,
        p1_y: u32,
        p1_inf: u32,
        p2_x: u32,
        p2_y: u32,
        p2_inf: u32,
        output: u32,
    },
    /// Points are stored as `(x, y, is_infinity)` triples, scalars as
    /// `(lo, hi)` pairs. `point_length` holds the U32 number of field
    /// elements of the points.
    Msm {
        indirect: u8,
        points: u32,
        scalars: u32,
        output: u32,
        point_length: u32,
    },
    /// `radix` is the offset of a U32 radix; `num_limbs` and `output_bits`
    /// are immediates.
    ToRadix {
        order: LimbOrder,
        indirect: u8,
        src: u32,
        dst: u32,
        radix: u32,
        num_limbs: u32,
        output_bits: bool,
    },
}

impl Instruction {
    pub const fn opcode(&self) -> OpCode {
        match self {
            Instruction::Arithmetic { op, .. } => op.opcode(),
            Instruction::Bitwise { op, .. } => op.opcode(),
            Instruction::Not { .. } => OpCode::Not,
            Instruction::Cast { .. } => OpCode::Cast,
            Instruction::Set { .. } => OpCode::Set,
            Instruction::Mov { .. } => OpCode::Mov,
            Instruction::GetEnvVar { .. } => OpCode::GetEnvVar,
            Instruction::CalldataCopy { .. } => OpCode::CalldataCopy,
            Instruction::ReturndataSize { .. } => OpCode::ReturndataSize,
            Instruction::ReturndataCopy { .. } => OpCode::ReturndataCopy,
            Instruction::Jump { .. } => OpCode::Jump,
            Instruction::JumpI { .. } => OpCode::JumpI,
            Instruction::InternalCall { .. } => OpCode::InternalCall,
            Instruction::InternalReturn => OpCode::InternalReturn,
            Instruction::SLoad { .. } => OpCode::SLoad,
            Instruction::SStore { .. } => OpCode::SStore,
            Instruction::NoteHashExists { .. } => OpCode::NoteHashExists,
            Instruction::EmitNoteHash { .. } => OpCode::EmitNoteHash,
            Instruction::NullifierExists { .. } => OpCode::NullifierExists,
            Instruction::EmitNullifier { .. } => OpCode::EmitNullifier,
            Instruction::L1ToL2MsgExists { .. } => OpCode::L1ToL2MsgExists,
            Instruction::GetContractInstance { .. } => OpCode::GetContractInstance,
            Instruction::EmitUnencryptedLog { .. } => OpCode::EmitUnencryptedLog,
            Instruction::SendL2ToL1Msg { .. } => OpCode::SendL2ToL1Msg,
            Instruction::ExternalCall {
                kind: CallKind::Call,
                ..
            } => OpCode::Call,
            Instruction::ExternalCall {
                kind: CallKind::StaticCall,
                ..
            } => OpCode::StaticCall,
            Instruction::Return { .. } => OpCode::Return,
            Instruction::Revert { .. } => OpCode::Revert,
            Instruction::DebugLog { .. } => OpCode::DebugLog,
            Instruction::Poseidon2Perm { .. } => OpCode::Poseidon2Perm,
            Instruction::Sha256Compression { .. } => OpCode::Sha256Compression,
            Instruction::KeccakF1600 { .. } => OpCode::KeccakF1600,
            Instruction::EcAdd { .. } => OpCode::EcAdd,
            Instruction::Msm { .. } => OpCode::Msm,
            Instruction::ToRadix {
                order: LimbOrder::LittleEndian,
                ..
            } => OpCode::ToRadixLe,
            Instruction::ToRadix {
                order: LimbOrder::BigEndian,
                ..
            } => OpCode::ToRadixBe,
        }
    }

    /// Program counter increment of the instruction.
    pub const fn encoded_width(&self) -> u32 {
        self.opcode().encoded_width()
    }

    /// Shorthand for a direct SET.
    pub const fn set(tag: MemoryTag, value: FF, dst: u32) -> Self {
        Instruction::Set {
            indirect: 0,
            tag,
            value,
            dst,
        }
    }

    /// Shorthand for a direct arithmetic instruction.
    pub const fn arithmetic(op: ArithmeticOp, a: u32, b: u32, dst: u32) -> Self {
        Instruction::Arithmetic {
            op,
            indirect: 0,
            a,
            b,
            dst,
        }
    }

    /// Shorthand for a direct bitwise instruction.
    pub const fn bitwise(op: BitwiseOp, a: u32, b: u32, dst: u32) -> Self {
        Instruction::Bitwise {
            op,
            indirect: 0,
            a,
            b,
            dst,
        }
    }
}

/// Program counter of the instruction following `instructions`.
pub fn pc_after(instructions: &[Instruction]) -> u32 {
    instructions.iter().map(Instruction::encoded_width).sum()
}
