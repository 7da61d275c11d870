//! # Bonsai Program Verifier
//!
//! Validates linked programs before they are handed to a writer.
//! Ensures every emitted listing is well formed for the counter machine.

use super::ir::{Instruction, Program};
use crate::{Error, Result};

/// Verification result with warnings
#[derive(Debug)]
pub struct VerifyResult {
    /// Program is well formed
    pub valid: bool,
    /// Errors that make the program unusable
    pub errors: Vec<VerifyError>,
    /// Warnings (non-fatal)
    pub warnings: Vec<String>,
    /// Statistics
    pub stats: ProgramStats,
}

/// Program statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgramStats {
    /// Total instruction count
    pub instruction_count: usize,
    /// Register file size
    pub register_count: usize,
    /// Number of `JMP` instructions
    pub jump_count: usize,
    /// Number of `TST` instructions
    pub test_count: usize,
    /// Instructions no path from the entry reaches
    pub unreachable_count: usize,
}

/// Verification error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Program exceeds instruction limit.
    TooManyInstructions {
        /// Actual instruction count in the program
        count: usize,
        /// Maximum allowed instructions
        limit: usize,
    },

    /// Jump target outside the listing.
    JumpOutOfBounds {
        /// Address of the jumping instruction
        address: usize,
        /// Offending target
        target: usize,
    },

    /// Register outside the register file.
    InvalidRegister {
        /// Address of the instruction
        address: usize,
        /// Offending register id
        register: u32,
    },

    /// Last instruction is not `HLT`.
    ///
    /// Every Bonsai program ends with exactly one halt.
    NoTrailingHalt,

    /// `HLT` somewhere other than the last line.
    StrayHalt {
        /// Address of the extra halt
        address: usize,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::TooManyInstructions { count, limit } => {
                write!(f, "Too many instructions: {} (limit: {})", count, limit)
            }
            VerifyError::JumpOutOfBounds { address, target } => {
                write!(
                    f,
                    "Jump at address {} targets out of bounds: {}",
                    address, target
                )
            }
            VerifyError::InvalidRegister { address, register } => {
                write!(f, "Invalid register {} at address {}", register, address)
            }
            VerifyError::NoTrailingHalt => write!(f, "Program does not end with HLT"),
            VerifyError::StrayHalt { address } => {
                write!(f, "HLT before the end of the program at address {}", address)
            }
        }
    }
}

/// Bonsai program verifier
#[derive(Debug, Clone)]
pub struct Verifier {
    /// Maximum allowed instructions
    max_instructions: Option<usize>,
    /// Strict mode (treat warnings as errors)
    strict: bool,
}

impl Verifier {
    /// Creates a verifier with no instruction limit
    pub fn new() -> Self {
        Self {
            max_instructions: None,
            strict: false,
        }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set custom instruction limit
    pub fn max_instructions(mut self, limit: Option<usize>) -> Self {
        self.max_instructions = limit;
        self
    }

    /// Verify a program
    pub fn verify(&self, program: &Program) -> VerifyResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let instructions = program.instructions();

        let mut stats = ProgramStats {
            instruction_count: instructions.len(),
            register_count: program.register_count(),
            ..ProgramStats::default()
        };

        if let Some(limit) = self.max_instructions {
            if stats.instruction_count > limit {
                errors.push(VerifyError::TooManyInstructions {
                    count: stats.instruction_count,
                    limit,
                });
            }
        }

        if instructions.last() != Some(&Instruction::Hlt) {
            errors.push(VerifyError::NoTrailingHalt);
        }

        let last = instructions.len().saturating_sub(1);
        for (idx, instr) in instructions.iter().enumerate() {
            let address = program.address_of(idx);

            match instr {
                Instruction::Hlt if idx != last => {
                    errors.push(VerifyError::StrayHalt { address });
                }
                Instruction::Jmp(_) => stats.jump_count += 1,
                Instruction::Tst { .. } => stats.test_count += 1,
                _ => {}
            }

            if let Some(reg) = instr.register() {
                if reg.id() == 0 || reg.index() >= program.register_count() {
                    errors.push(VerifyError::InvalidRegister {
                        address,
                        register: reg.id(),
                    });
                }
            }

            for target in instr.targets() {
                if program.index_of(target).is_none() {
                    errors.push(VerifyError::JumpOutOfBounds { address, target });
                }
            }
        }

        if errors.is_empty() {
            stats.unreachable_count = count_unreachable(program);
            if stats.unreachable_count > 0 {
                warnings.push(format!(
                    "{} unreachable instruction(s)",
                    stats.unreachable_count
                ));
            }
        }

        let valid = errors.is_empty() && (!self.strict || warnings.is_empty());

        VerifyResult {
            valid,
            errors,
            warnings,
            stats,
        }
    }

    /// Verify and convert failures into a compilation error
    pub fn check(&self, program: &Program) -> Result<VerifyResult> {
        let result = self.verify(program);
        if result.valid {
            return Ok(result);
        }

        let mut reasons: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        reasons.extend(result.warnings);
        Err(Error::VerificationFailed(reasons.join("; ")))
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Instructions not reachable from the first line; targets must be in range
fn count_unreachable(program: &Program) -> usize {
    let instructions = program.instructions();
    let mut seen = vec![false; instructions.len()];
    let mut work = vec![0usize];

    while let Some(idx) = work.pop() {
        if idx >= instructions.len() || seen[idx] {
            continue;
        }
        seen[idx] = true;
        match &instructions[idx] {
            Instruction::Inc(_) | Instruction::Dec(_) => work.push(idx + 1),
            Instruction::Hlt => {}
            instr => work.extend(instr.targets().into_iter().filter_map(|t| program.index_of(t))),
        }
    }

    seen.iter().filter(|s| !**s).count()
}
