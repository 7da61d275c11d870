//! Symbol table: declared variables and their registers

use std::collections::BTreeMap;
use tracing::debug;

use super::ir::Register;
use super::regalloc::RegisterAllocator;
use crate::ast::Declaration;
use crate::{Error, Result};

/// A declared variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Dedicated register
    pub register: Register,
    /// Declared initial value
    pub initial: u64,
}

/// Variable name to register binding, fixed after construction
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    /// Build the table from the declaration block, allocating one named
    /// register per variable in declaration order
    pub fn build(declarations: &[Declaration], alloc: &mut RegisterAllocator) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for decl in declarations {
            if entries.contains_key(&decl.name) {
                return Err(Error::DuplicateVariable {
                    name: decl.name.clone(),
                    line: decl.line,
                });
            }
            let register = alloc
                .allocate_named(&decl.name)
                .map_err(|e| e.at_line(decl.line))?;
            entries.insert(
                decl.name.clone(),
                Symbol {
                    register,
                    initial: decl.value,
                },
            );
        }

        debug!(variables = entries.len(), "symbol table built");
        Ok(Self { entries })
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    /// True if `name` was declared
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Register of a variable referenced at `line`
    pub fn resolve(&self, name: &str, line: usize) -> Result<Register> {
        self.entries
            .get(name)
            .map(|s| s.register)
            .ok_or_else(|| Error::UnknownVariable {
                name: name.to_string(),
                line,
            })
    }

    /// Number of declared variables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name to register bindings
    pub fn bindings(&self) -> BTreeMap<String, Register> {
        self.entries
            .iter()
            .map(|(name, sym)| (name.clone(), sym.register))
            .collect()
    }

    /// Initial register file of `size` registers: declared values for named
    /// registers, zero for scratch
    pub fn initial_registers(&self, size: usize) -> Vec<u64> {
        let mut registers = vec![0; size];
        for sym in self.entries.values() {
            if let Some(slot) = registers.get_mut(sym.register.index()) {
                *slot = sym.initial;
            }
        }
        registers
    }
}
