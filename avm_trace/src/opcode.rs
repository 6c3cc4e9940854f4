use serde::{Deserialize, Serialize};

/// Opcodes of the instruction set. The discriminant is the row of the
/// opcode in the fixed gas table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Compute
    Add,
    Sub,
    Mul,
    Div,
    FDiv,
    Eq,
    Lt,
    Lte,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Cast,
    // Execution environment
    GetEnvVar,
    CalldataCopy,
    ReturndataSize,
    ReturndataCopy,
    // Control flow
    Jump,
    JumpI,
    InternalCall,
    InternalReturn,
    // Memory
    Set,
    Mov,
    // World state
    SLoad,
    SStore,
    NoteHashExists,
    EmitNoteHash,
    NullifierExists,
    EmitNullifier,
    L1ToL2MsgExists,
    GetContractInstance,
    // Accrued substate
    EmitUnencryptedLog,
    SendL2ToL1Msg,
    // External calls
    Call,
    StaticCall,
    Return,
    Revert,
    // Misc
    DebugLog,
    // Gadgets
    Poseidon2Perm,
    Sha256Compression,
    KeccakF1600,
    EcAdd,
    Msm,
    ToRadixLe,
    ToRadixBe,
}

/// Number of opcodes.
pub const NUM_OPCODES: usize = OpCode::ALL.len();

// Sizes of the encoded operand kinds, in bytes.
const OPCODE: u32 = 1;
const INDIRECT: u32 = 1;
const INDIRECT_WIDE: u32 = 2;
const OFFSET: u32 = 4;
const TAG: u32 = 1;
const BYTE: u32 = 1;
const FIELD: u32 = 32;
const U32_IMM: u32 = 4;

impl OpCode {
    pub const ALL: [OpCode; 47] = [
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::FDiv,
        OpCode::Eq,
        OpCode::Lt,
        OpCode::Lte,
        OpCode::And,
        OpCode::Or,
        OpCode::Xor,
        OpCode::Not,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Cast,
        OpCode::GetEnvVar,
        OpCode::CalldataCopy,
        OpCode::ReturndataSize,
        OpCode::ReturndataCopy,
        OpCode::Jump,
        OpCode::JumpI,
        OpCode::InternalCall,
        OpCode::InternalReturn,
        OpCode::Set,
        OpCode::Mov,
        OpCode::SLoad,
        OpCode::SStore,
        OpCode::NoteHashExists,
        OpCode::EmitNoteHash,
        OpCode::NullifierExists,
        OpCode::EmitNullifier,
        OpCode::L1ToL2MsgExists,
        OpCode::GetContractInstance,
        OpCode::EmitUnencryptedLog,
        OpCode::SendL2ToL1Msg,
        OpCode::Call,
        OpCode::StaticCall,
        OpCode::Return,
        OpCode::Revert,
        OpCode::DebugLog,
        OpCode::Poseidon2Perm,
        OpCode::Sha256Compression,
        OpCode::KeccakF1600,
        OpCode::EcAdd,
        OpCode::Msm,
        OpCode::ToRadixLe,
        OpCode::ToRadixBe,
    ];

    pub const fn index(self) -> usize {
        self as u8 as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        OpCode::ALL
            .get(index)
            .copied()
            .filter(|op| op.index() == index)
    }

    /// Mnemonic of the opcode.
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::FDiv => "FDIV",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Lte => "LTE",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Xor => "XOR",
            OpCode::Not => "NOT",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Cast => "CAST",
            OpCode::GetEnvVar => "GETENVVAR",
            OpCode::CalldataCopy => "CALLDATACOPY",
            OpCode::ReturndataSize => "RETURNDATASIZE",
            OpCode::ReturndataCopy => "RETURNDATACOPY",
            OpCode::Jump => "JUMP",
            OpCode::JumpI => "JUMPI",
            OpCode::InternalCall => "INTERNALCALL",
            OpCode::InternalReturn => "INTERNALRETURN",
            OpCode::Set => "SET",
            OpCode::Mov => "MOV",
            OpCode::SLoad => "SLOAD",
            OpCode::SStore => "SSTORE",
            OpCode::NoteHashExists => "NOTEHASHEXISTS",
            OpCode::EmitNoteHash => "EMITNOTEHASH",
            OpCode::NullifierExists => "NULLIFIEREXISTS",
            OpCode::EmitNullifier => "EMITNULLIFIER",
            OpCode::L1ToL2MsgExists => "L1TOL2MSGEXISTS",
            OpCode::GetContractInstance => "GETCONTRACTINSTANCE",
            OpCode::EmitUnencryptedLog => "EMITUNENCRYPTEDLOG",
            OpCode::SendL2ToL1Msg => "SENDL2TOL1MSG",
            OpCode::Call => "CALL",
            OpCode::StaticCall => "STATICCALL",
            OpCode::Return => "RETURN",
            OpCode::Revert => "REVERT",
            OpCode::DebugLog => "DEBUGLOG",
            OpCode::Poseidon2Perm => "POSEIDON2PERM",
            OpCode::Sha256Compression => "SHA256COMPRESSION",
            OpCode::KeccakF1600 => "KECCAKF1600",
            OpCode::EcAdd => "ECADD",
            OpCode::Msm => "MSM",
            OpCode::ToRadixLe => "TORADIXLE",
            OpCode::ToRadixBe => "TORADIXBE",
        }
    }

    /// Size of the encoded instruction in bytes; the program counter
    /// advances by this amount.
    pub const fn encoded_width(self) -> u32 {
        match self {
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::FDiv
            | OpCode::Eq
            | OpCode::Lt
            | OpCode::Lte
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor
            | OpCode::Shl
            | OpCode::Shr => OPCODE + INDIRECT + 3 * OFFSET,
            OpCode::Not | OpCode::Mov => OPCODE + INDIRECT + 2 * OFFSET,
            OpCode::Cast => OPCODE + INDIRECT + 2 * OFFSET + TAG,
            OpCode::GetEnvVar => OPCODE + INDIRECT + BYTE + OFFSET,
            OpCode::CalldataCopy | OpCode::ReturndataCopy => OPCODE + INDIRECT + 3 * OFFSET,
            OpCode::ReturndataSize => OPCODE + INDIRECT + OFFSET,
            OpCode::Jump | OpCode::InternalCall => OPCODE + U32_IMM,
            OpCode::JumpI => OPCODE + INDIRECT + U32_IMM + OFFSET,
            OpCode::InternalReturn => OPCODE,
            OpCode::Set => OPCODE + INDIRECT + TAG + FIELD + OFFSET,
            OpCode::SLoad | OpCode::SStore => OPCODE + INDIRECT + 2 * OFFSET,
            OpCode::NoteHashExists | OpCode::NullifierExists | OpCode::L1ToL2MsgExists => {
                OPCODE + INDIRECT + 3 * OFFSET
            }
            OpCode::EmitNoteHash | OpCode::EmitNullifier => OPCODE + INDIRECT + OFFSET,
            OpCode::GetContractInstance => OPCODE + INDIRECT + 3 * OFFSET + BYTE,
            OpCode::EmitUnencryptedLog | OpCode::SendL2ToL1Msg => OPCODE + INDIRECT + 2 * OFFSET,
            OpCode::Call | OpCode::StaticCall => OPCODE + INDIRECT_WIDE + 5 * OFFSET,
            OpCode::Return | OpCode::Revert => OPCODE + INDIRECT + OFFSET + U32_IMM,
            OpCode::DebugLog => OPCODE + INDIRECT + 3 * OFFSET + U32_IMM,
            OpCode::Poseidon2Perm | OpCode::KeccakF1600 => OPCODE + INDIRECT + 2 * OFFSET,
            OpCode::Sha256Compression => OPCODE + INDIRECT + 3 * OFFSET,
            OpCode::EcAdd => OPCODE + INDIRECT_WIDE + 7 * OFFSET,
            OpCode::Msm => OPCODE + INDIRECT + 4 * OFFSET,
            OpCode::ToRadixLe | OpCode::ToRadixBe => {
                OPCODE + INDIRECT + 3 * OFFSET + U32_IMM + BYTE
            }
        }
    }

    /// Opcodes whose row is checked by the ALU sub-trace.
    pub const fn is_alu(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Eq
                | OpCode::Lt
                | OpCode::Lte
                | OpCode::Not
                | OpCode::Shl
                | OpCode::Shr
                | OpCode::Cast
        )
    }

    /// Opcodes that emit a side effect into the kernel outputs.
    pub const fn is_state_mutating(self) -> bool {
        matches!(
            self,
            OpCode::SStore
                | OpCode::EmitNoteHash
                | OpCode::EmitNullifier
                | OpCode::EmitUnencryptedLog
                | OpCode::SendL2ToL1Msg
        )
    }
}

impl core::fmt::Display for OpCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
