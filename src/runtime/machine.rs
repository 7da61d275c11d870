//! Counter-machine interpreter
//!
//! | Instruction    | Effect                                   |
//! |----------------|------------------------------------------|
//! | `INC r`        | `r += 1`, next line                      |
//! | `DEC r`        | `r -= 1`, next line; fault if `r == 0`   |
//! | `JMP a`        | go to line `a`                           |
//! | `TST r, t, f`  | go to `t` if `r != 0`, else to `f`       |
//! | `HLT`          | stop                                     |

use thiserror::Error;
use tracing::trace;

use crate::compiler::ir::{Instruction, Program, Register};

/// Steps the machine executes before giving up
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Execution faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// `DEC` on a zero register; compiled programs never do this
    #[error("DEC of zero register {register} at line {address}")]
    DecrementOfZero {
        /// Decremented register
        register: Register,
        /// Line of the faulting instruction
        address: usize,
    },

    /// Program did not halt in time
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded {
        /// Configured limit
        limit: u64,
    },

    /// Control reached a line outside the program
    #[error("Jump to line {address} outside the program")]
    BadAddress {
        /// Offending line
        address: usize,
    },

    /// Register outside the register file
    #[error("Register {register} outside the register file at line {address}")]
    BadRegister {
        /// Offending register
        register: Register,
        /// Line of the instruction
        address: usize,
    },

    /// Override names a variable the program does not declare
    #[error("Unknown variable: {name}")]
    UnknownVariable {
        /// Variable name
        name: String,
    },
}

/// Final machine state
#[derive(Debug, Clone)]
pub struct Execution<'p> {
    program: &'p Program,
    registers: Vec<u64>,
    steps: u64,
}

impl Execution<'_> {
    /// Final register file, indexed by [`Register::index`]
    pub fn registers(&self) -> &[u64] {
        &self.registers
    }

    /// Final value of one register
    pub fn register(&self, reg: Register) -> Option<u64> {
        self.registers.get(reg.index()).copied()
    }

    /// Final value of a declared variable
    pub fn value(&self, name: &str) -> Option<u64> {
        self.program
            .register_of(name)
            .and_then(|reg| self.register(reg))
    }

    /// Instructions executed, including the final HLT
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Values of the registers not bound to any variable
    pub fn scratch_values(&self) -> Vec<u64> {
        let named = self.program.symbols().len();
        self.registers.iter().skip(named).copied().collect()
    }
}

/// Reference interpreter
#[derive(Debug, Clone, Copy)]
pub struct Machine {
    step_limit: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Machine with [`DEFAULT_STEP_LIMIT`]
    pub fn new() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Set custom step limit
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run from the program's declared initial values
    pub fn run<'p>(&self, program: &'p Program) -> Result<Execution<'p>, MachineError> {
        self.execute(program, program.registers().to_vec())
    }

    /// Run with some declared variables started at other values
    pub fn run_with<'p>(
        &self,
        program: &'p Program,
        overrides: &[(&str, u64)],
    ) -> Result<Execution<'p>, MachineError> {
        let mut registers = program.registers().to_vec();
        for (name, value) in overrides {
            let reg = program
                .register_of(name)
                .ok_or_else(|| MachineError::UnknownVariable {
                    name: name.to_string(),
                })?;
            if let Some(slot) = registers.get_mut(reg.index()) {
                *slot = *value;
            }
        }
        self.execute(program, registers)
    }

    fn execute<'p>(
        &self,
        program: &'p Program,
        mut registers: Vec<u64>,
    ) -> Result<Execution<'p>, MachineError> {
        let mut pc = program.address_base().first();
        let mut steps = 0u64;

        loop {
            if steps >= self.step_limit {
                return Err(MachineError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }
            steps += 1;

            let idx = program
                .index_of(pc)
                .ok_or(MachineError::BadAddress { address: pc })?;
            let instr = program.instructions()[idx];

            let slot = match instr.register() {
                Some(register) => {
                    let slot = register
                        .id()
                        .checked_sub(1)
                        .map(|i| i as usize)
                        .filter(|i| *i < registers.len())
                        .ok_or(MachineError::BadRegister {
                            register,
                            address: pc,
                        })?;
                    Some(slot)
                }
                None => None,
            };

            pc = match (instr, slot) {
                (Instruction::Inc(_), Some(i)) => {
                    registers[i] += 1;
                    pc + 1
                }
                (Instruction::Dec(register), Some(i)) => {
                    if registers[i] == 0 {
                        return Err(MachineError::DecrementOfZero {
                            register,
                            address: pc,
                        });
                    }
                    registers[i] -= 1;
                    pc + 1
                }
                (
                    Instruction::Tst {
                        if_nonzero,
                        if_zero,
                        ..
                    },
                    Some(i),
                ) => {
                    if registers[i] != 0 {
                        if_nonzero
                    } else {
                        if_zero
                    }
                }
                (Instruction::Jmp(target), _) => target,
                (Instruction::Hlt, _) => break,
                // register() is Some for every register instruction
                (_, None) => return Err(MachineError::BadAddress { address: pc }),
            };
        }

        trace!(steps, "machine halted");
        Ok(Execution {
            program,
            registers,
            steps,
        })
    }
}
