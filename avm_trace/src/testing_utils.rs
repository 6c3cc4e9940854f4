//! Helpers shared by the unit and integration tests of `avm_trace`.

use env_logger::{try_init_from_env, Env, DEFAULT_FILTER_ENV};

use crate::config::TraceConfig;
use crate::execution::{Execution, ExecutionOutcome, Program};
use crate::hints::ExecutionHints;
use crate::instruction::Instruction;
use crate::kernel::PublicInputs;
use crate::util::FF;

/// Gas given to test executions, per gas kind. The low 16 bits are kept
/// small so that tables finalized without range-check padding stay short.
pub const TEST_GAS_LIMIT: u32 = 0x10_2000;

pub fn init_logger() {
    let _ = try_init_from_env(Env::default().filter_or(DEFAULT_FILTER_ENV, "info"));
}

/// Public inputs with [`TEST_GAS_LIMIT`] of both gas kinds.
pub fn test_public_inputs() -> PublicInputs {
    PublicInputs {
        l2_gas_limit: TEST_GAS_LIMIT,
        da_gas_limit: TEST_GAS_LIMIT,
        ..Default::default()
    }
}

/// Runs `instructions` with the testing configuration, the given calldata,
/// and no hints.
pub fn run_program(instructions: Vec<Instruction>, calldata: Vec<FF>) -> ExecutionOutcome {
    run_program_with(instructions, calldata, test_public_inputs(), ExecutionHints::default())
}

pub fn run_program_with(
    instructions: Vec<Instruction>,
    calldata: Vec<FF>,
    public_inputs: PublicInputs,
    hints: ExecutionHints,
) -> ExecutionOutcome {
    init_logger();
    Execution::new(
        Program::new(instructions),
        public_inputs,
        calldata,
        hints,
        TraceConfig::testing(),
    )
    .run()
}
