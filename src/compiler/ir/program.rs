//! Linked counter-machine program

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::instruction::{Instruction, Register};

/// Numbering of instruction lines in the emitted listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressBase {
    /// First instruction is line 0
    Zero,
    /// First instruction is line 1 (Bonsai listing convention)
    #[default]
    One,
}

impl AddressBase {
    /// Address of the first instruction
    pub fn first(self) -> usize {
        match self {
            AddressBase::Zero => 0,
            AddressBase::One => 1,
        }
    }
}

/// Final program: absolute targets, one trailing HLT, initial register file
///
/// Only the linker constructs programs; once emitted they are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    instructions: Vec<Instruction>,
    registers: Vec<u64>,
    symbols: BTreeMap<String, Register>,
    address_base: AddressBase,
}

impl Program {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        registers: Vec<u64>,
        symbols: BTreeMap<String, Register>,
        address_base: AddressBase,
    ) -> Self {
        Self {
            instructions,
            registers,
            symbols,
            address_base,
        }
    }

    /// Instructions in line order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions, including the trailing HLT
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the program holds no instructions (never true for linked output)
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Initial register file, indexed by [`Register::index`]
    pub fn registers(&self) -> &[u64] {
        &self.registers
    }

    /// Number of registers the program uses (named and scratch)
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Register bound to a declared variable
    pub fn register_of(&self, name: &str) -> Option<Register> {
        self.symbols.get(name).copied()
    }

    /// All variable bindings
    pub fn symbols(&self) -> &BTreeMap<String, Register> {
        &self.symbols
    }

    /// Line numbering used by jump targets
    pub fn address_base(&self) -> AddressBase {
        self.address_base
    }

    /// Instruction index for an absolute address, if in range
    pub fn index_of(&self, address: usize) -> Option<usize> {
        address
            .checked_sub(self.address_base.first())
            .filter(|idx| *idx < self.instructions.len())
    }

    /// Absolute address of an instruction index
    pub fn address_of(&self, index: usize) -> usize {
        index + self.address_base.first()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for instr in &self.instructions {
            writeln!(f, "{}", instr)?;
        }
        Ok(())
    }
}
