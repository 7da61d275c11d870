//! Counter-machine instruction definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine register, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Register(pub u32);

impl Register {
    /// Creates a register with the given 1-based id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// 1-based register id as written in the listing
    pub fn id(self) -> u32 {
        self.0
    }

    /// 0-based index into a register file
    pub fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Counter-machine instruction
///
/// Inside a [`Fragment`](super::Fragment) the address operands of `Jmp` and
/// `Tst` are placeholders; the linker overwrites them with absolute
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Increment register by one
    Inc(Register),
    /// Decrement a non-zero register by one
    Dec(Register),
    /// Unconditional jump to an absolute address
    Jmp(usize),
    /// Zero test: continue at `if_nonzero` when the register holds a
    /// non-zero count, at `if_zero` otherwise
    Tst {
        /// Register under test
        register: Register,
        /// Target when the register is non-zero
        if_nonzero: usize,
        /// Target when the register is zero
        if_zero: usize,
    },
    /// Stop execution
    Hlt,
}

impl Instruction {
    /// Register operand, if any
    pub fn register(&self) -> Option<Register> {
        match self {
            Instruction::Inc(r) | Instruction::Dec(r) => Some(*r),
            Instruction::Tst { register, .. } => Some(*register),
            Instruction::Jmp(_) | Instruction::Hlt => None,
        }
    }

    /// Jump targets of this instruction (empty for non-branching ones)
    pub fn targets(&self) -> Vec<usize> {
        match self {
            Instruction::Jmp(target) => vec![*target],
            Instruction::Tst {
                if_nonzero,
                if_zero,
                ..
            } => vec![*if_nonzero, *if_zero],
            _ => Vec::new(),
        }
    }

    /// Mnemonic used in the listing
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Inc(_) => "INC",
            Instruction::Dec(_) => "DEC",
            Instruction::Jmp(_) => "JMP",
            Instruction::Tst { .. } => "TST",
            Instruction::Hlt => "HLT",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Inc(r) | Instruction::Dec(r) => {
                write!(f, "{} {}", self.mnemonic(), r.id())
            }
            Instruction::Jmp(target) => write!(f, "JMP {}", target),
            Instruction::Tst {
                register,
                if_nonzero,
                if_zero,
            } => write!(f, "TST {}, {}, {}", register.id(), if_nonzero, if_zero),
            Instruction::Hlt => write!(f, "HLT"),
        }
    }
}
