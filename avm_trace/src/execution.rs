//! Drives an [`AvmTraceBuilder`] over a decoded program.
//!
//! The driver fetches the instruction at the current program counter, runs
//! it, and stops when the builder halts (RETURN or REVERT) or when a fatal
//! [`ExecutionError`] occurs. The trace is finalized in both cases.
//!
//! Running out of gas, jumping outside of the program and returning from an
//! empty internal call stack only end the current call. Inside a nested
//! call the caller resumes with a failed call; at the top level the
//! execution stops with the error.

use hashbrown::HashMap;

use crate::config::TraceConfig;
use crate::errors::{AvmError, ExecutionError};
use crate::hints::ExecutionHints;
use crate::instruction::Instruction;
use crate::kernel::PublicInputs;
use crate::table::Table;
use crate::trace::AvmTraceBuilder;
use crate::util::FF;

/// Number of instructions after which an execution is aborted.
pub const DEFAULT_MAX_STEPS: usize = 1 << 22;

/// A decoded program, addressable by program counter.
#[derive(Clone, Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    /// Index of the instruction starting at each program counter.
    pc_to_index: HashMap<u32, usize>,
    bytecode: Option<Vec<u8>>,
}

impl Program {
    /// Lays out `instructions` contiguously from program counter 0, each one
    /// taking its encoded width.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let mut pc_to_index = HashMap::with_capacity(instructions.len());
        let mut pc = 0u32;
        for (i, instruction) in instructions.iter().enumerate() {
            pc_to_index.insert(pc, i);
            pc = pc.wrapping_add(instruction.encoded_width());
        }
        Self {
            instructions,
            pc_to_index,
            bytecode: None,
        }
    }

    /// Attaches the raw bytecode, which is then hashed into the bytecode
    /// columns of the trace.
    pub fn with_bytecode(mut self, bytecode: Vec<u8>) -> Self {
        self.bytecode = Some(bytecode);
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_at(&self, pc: u32) -> Option<&Instruction> {
        self.pc_to_index
            .get(&pc)
            .and_then(|i| self.instructions.get(*i))
    }

    /// Program counter of the `index`-th instruction.
    pub fn pc_of(&self, index: usize) -> Option<u32> {
        if index > self.instructions.len() {
            return None;
        }
        Some(
            self.instructions[..index]
                .iter()
                .map(Instruction::encoded_width)
                .sum(),
        )
    }
}

/// Result of a complete execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub table: Table,
    pub returndata: Vec<FF>,
    /// Whether the execution ended with REVERT.
    pub reverted: bool,
    /// Number of rows with `op_err` set.
    pub error_count: usize,
    /// Fatal condition that stopped the execution before it halted.
    pub error: Option<ExecutionError>,
}

impl ExecutionOutcome {
    /// True if the execution halted on RETURN without any error.
    pub fn is_success(&self) -> bool {
        !self.reverted && self.error.is_none()
    }
}

#[derive(Debug)]
pub struct Execution {
    program: Program,
    /// Programs of the contracts whose calls run in the trace.
    contracts: HashMap<FF, Program>,
    builder: AvmTraceBuilder,
    max_steps: usize,
}

impl Execution {
    pub fn new(
        program: Program,
        public_inputs: PublicInputs,
        calldata: Vec<FF>,
        hints: ExecutionHints,
        config: TraceConfig,
    ) -> Self {
        let mut builder = AvmTraceBuilder::new(public_inputs, calldata, hints, config);
        if let Some(bytecode) = &program.bytecode {
            builder = builder.with_bytecode(vec![bytecode.clone()]);
        }
        Self {
            program,
            contracts: HashMap::new(),
            builder,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Runs calls to `address` on `program` in the trace instead of
    /// resolving them from external-call hints.
    pub fn with_contract(mut self, address: FF, program: Program) -> Self {
        self.builder.register_contract(address, program.bytecode.clone());
        self.contracts.insert(address, program);
        self
    }

    /// Program of the call in progress.
    fn current_program(&self) -> Option<&Program> {
        if self.builder.call_depth() == 0 {
            Some(&self.program)
        } else {
            self.contracts.get(&self.builder.contract_address())
        }
    }

    /// Runs the program to completion and finalizes the trace.
    pub fn run(mut self) -> ExecutionOutcome {
        log::info!(
            "executing {} instructions with {:?}",
            self.program.len(),
            self.builder.config()
        );

        let mut reverted = false;
        let mut error = None;
        let mut steps = 0;

        while !self.builder.is_halted() {
            if steps == self.max_steps {
                self.builder.halt();
                error = Some(ExecutionError::StepLimitExceeded {
                    limit: self.max_steps,
                });
                break;
            }
            let pc = self.builder.pc();
            let instruction = self
                .current_program()
                .and_then(|program| program.instruction_at(pc))
                .cloned();
            let Some(instruction) = instruction else {
                self.builder.exceptional_halt();
                if self.builder.is_halted() {
                    error = Some(ExecutionError::InvalidProgramCounter { pc });
                    break;
                }
                log::debug!("nested call left its program at pc {pc}");
                continue;
            };
            log::debug!("pc {pc}: {instruction:?}");

            match self.builder.execute(&instruction) {
                Ok(AvmError::NoError) => {}
                Ok(op_error) => {
                    log::debug!("{} at pc {pc}: {op_error}", instruction.opcode());
                    reverted |= op_error == AvmError::RevertOpcode && self.builder.is_halted();
                }
                // The handler already left the failing call.
                Err(fatal) if fatal.is_exceptional_halt() => {
                    if self.builder.is_halted() {
                        error = Some(fatal);
                        break;
                    }
                    log::debug!("nested call failed: {fatal}");
                }
                Err(fatal) => {
                    self.builder.halt();
                    error = Some(fatal);
                    break;
                }
            }
            steps += 1;

            if self.builder.is_out_of_gas() {
                let fatal = ExecutionError::OutOfGas {
                    pc,
                    opcode: instruction.opcode(),
                };
                self.builder.exceptional_halt();
                if self.builder.is_halted() {
                    error = Some(fatal);
                    break;
                }
                log::debug!("nested call failed: {fatal}");
            }
        }

        if let Some(fatal) = &error {
            log::warn!("execution stopped after {steps} steps: {fatal}");
        }

        let returndata = self.builder.returndata().to_vec();
        let table = self.builder.finalize();
        let error_count = table
            .rows()
            .iter()
            .filter(|row| row.main_op_err == FF::from(1u64))
            .count();
        ExecutionOutcome {
            table,
            returndata,
            reverted,
            error_count,
            error,
        }
    }
}
