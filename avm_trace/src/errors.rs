use thiserror::Error;

use crate::opcode::OpCode;

/// Outcome classification of one executed instruction.
///
/// Every variant except `NoError` sets `op_err` on the row of the instruction.
/// These are data conditions recorded in the trace, not failures of the
/// builder: the row is emitted either way.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Error)]
pub enum AvmError {
    #[default]
    #[error("no error")]
    NoError,
    #[error("operand tag does not match the tag required by the opcode")]
    TagError,
    #[error("relative base or indirect pointer is not a valid u32 address")]
    AddressingError,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown environment variable")]
    EnvironmentVariableUnknown,
    #[error("unknown contract instance member")]
    ContractInstanceMemberUnknown,
    #[error("radix is outside of [2, 256] or incompatible with bit output")]
    RadixOutOfBounds,
    #[error("maximum number of side effects of this kind reached")]
    SideEffectLimitReached,
    #[error("state-altering opcode in a static call")]
    StaticCallAlteration,
    #[error("execution reverted")]
    RevertOpcode,
    #[error("internal return with an empty internal call stack")]
    InternalCallStackUnderflow,
}

impl AvmError {
    pub const fn is_ok(self) -> bool {
        matches!(self, AvmError::NoError)
    }

    /// Keeps the first error: returns `self` unless it is `NoError`.
    pub const fn or(self, other: AvmError) -> AvmError {
        if self.is_ok() {
            other
        } else {
            self
        }
    }
}

/// Fatal conditions that halt an execution.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ExecutionError {
    #[error("no instruction at pc {pc}")]
    InvalidProgramCounter { pc: u32 },
    #[error("internal return with an empty internal call stack at pc {pc}")]
    InternalCallStackUnderflow { pc: u32 },
    #[error("{opcode} ran out of gas at pc {pc}")]
    OutOfGas { pc: u32, opcode: OpCode },
    #[error("missing {kind} hint for {key}")]
    MissingHint { kind: &'static str, key: String },
    #[error("execution exceeded {limit} steps")]
    StepLimitExceeded { limit: usize },
    #[error("{opcode} accesses {len} memory cells, more than the limit of {max}")]
    SliceTooLarge { opcode: OpCode, len: u32, max: u32 },
    #[error("no memory space left for another nested call")]
    CallContextsExhausted,
}

impl ExecutionError {
    /// True for the conditions that only end the current call. A nested call
    /// stopped by one of them returns to its caller as a failed call.
    pub const fn is_exceptional_halt(&self) -> bool {
        matches!(
            self,
            ExecutionError::InvalidProgramCounter { .. }
                | ExecutionError::InternalCallStackUnderflow { .. }
                | ExecutionError::OutOfGas { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_wins() {
        assert_eq!(AvmError::NoError.or(AvmError::TagError), AvmError::TagError);
        assert_eq!(
            AvmError::DivisionByZero.or(AvmError::TagError),
            AvmError::DivisionByZero
        );
        assert!(AvmError::default().is_ok());
    }

    #[test]
    fn exceptional_halts() {
        let out_of_gas = ExecutionError::OutOfGas {
            pc: 0,
            opcode: OpCode::Add,
        };
        assert!(out_of_gas.is_exceptional_halt());
        assert!(ExecutionError::InternalCallStackUnderflow { pc: 3 }.is_exceptional_halt());
        assert!(!ExecutionError::StepLimitExceeded { limit: 1 }.is_exceptional_halt());
        assert!(!ExecutionError::CallContextsExhausted.is_exceptional_halt());
    }
}
