//! # AST Lowering
//!
//! Walks the AST once, depth-first, turning each statement into a
//! [`Fragment`]. Fragments are concatenated in program order; their holes are
//! resolved later by the linker.
//!
//! ## Module Structure
//!
//! ```text
//! lower/
//! ├── mod.rs      # This file - CodegenState, Lowerer, statement dispatch
//! ├── expr.rs     # Transfer-loop primitives and assignment lowering
//! └── control.rs  # If/else and counted-loop lowering
//! ```

mod control;
mod expr;

pub use expr::{add_literal, clear, copy_into, move_into, saturating_sub, sub_literal};

use tracing::trace;

use super::ir::{Fragment, Label, LabelGen, LabelKind, Register};
use super::regalloc::RegisterAllocator;
use super::symbols::SymbolTable;
use crate::ast::{Statement, StatementKind};
use crate::{Error, Result};

/// Register pool and label supply shared by every lowering call
#[derive(Debug)]
pub struct CodegenState {
    regs: RegisterAllocator,
    labels: LabelGen,
}

impl CodegenState {
    /// Wrap an allocator whose named registers are already assigned
    pub fn new(regs: RegisterAllocator) -> Self {
        Self {
            regs,
            labels: LabelGen::new(),
        }
    }

    /// Borrow a zeroed scratch register
    pub fn scratch(&mut self) -> Result<Register> {
        self.regs.allocate_scratch()
    }

    /// Return a scratch register; it must be zero again
    pub fn release(&mut self, reg: Register) -> Result<()> {
        self.regs.release(reg)
    }

    /// Fresh label
    pub fn label(&mut self, kind: LabelKind) -> Label {
        self.labels.fresh(kind)
    }

    /// Underlying allocator
    pub fn allocator(&self) -> &RegisterAllocator {
        &self.regs
    }

    /// Give back the allocator once lowering is finished
    pub fn into_allocator(self) -> RegisterAllocator {
        self.regs
    }
}

/// Statement lowerer
pub struct Lowerer<'a> {
    state: CodegenState,
    symbols: &'a SymbolTable,
    /// Bindings of the loops enclosing the statement being lowered
    loop_bindings: Vec<String>,
    /// Instruction limit for the linked listing, HLT included
    limit: Option<usize>,
    /// Instructions produced by the statements lowered so far
    emitted: usize,
}

impl<'a> Lowerer<'a> {
    /// Create a lowerer over a built symbol table
    pub fn new(symbols: &'a SymbolTable, state: CodegenState) -> Self {
        Self {
            state,
            symbols,
            loop_bindings: Vec::new(),
            limit: None,
            emitted: 0,
        }
    }

    /// Fail with [`Error::ProgramTooLarge`] as soon as the lowered code
    /// cannot fit in `limit` instructions
    pub fn with_instruction_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Instructions lowered so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Room left for statement code; one slot is kept for the final HLT
    pub(super) fn remaining(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(1))
            .saturating_sub(self.emitted)
    }

    pub(super) fn too_large(&self, line: usize) -> Error {
        Error::ProgramTooLarge {
            limit: self.limit.unwrap_or(usize::MAX),
            line,
        }
    }

    /// Lower a statement list in order
    pub fn lower_block(&mut self, statements: &[Statement]) -> Result<Fragment> {
        let mut fragment = Fragment::new();
        for stmt in statements {
            fragment.append(self.lower_statement(stmt)?);
        }
        Ok(fragment)
    }

    /// Lower one statement
    pub fn lower_statement(&mut self, stmt: &Statement) -> Result<Fragment> {
        let before = self.emitted;
        let fragment = self
            .lower_kind(stmt)
            .map_err(|e| e.at_line(stmt.line))?;

        // nested statements advanced the counter; recount this one whole
        self.emitted = before;
        if fragment.len() > self.remaining() {
            return Err(self.too_large(stmt.line));
        }
        self.emitted += fragment.len();

        trace!(
            line = stmt.line,
            instructions = fragment.len(),
            emitted = self.emitted,
            live_scratch = self.state.allocator().live_scratch().len(),
            "lowered statement"
        );
        Ok(fragment)
    }

    fn lower_kind(&mut self, stmt: &Statement) -> Result<Fragment> {
        Ok(match &stmt.kind {
            StatementKind::Assign { target, value } => {
                self.lower_assign(target, value, stmt.line)?
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(condition, then_branch, else_branch, stmt.line)?,
            StatementKind::For {
                variable,
                bound,
                body,
            } => self.lower_for(variable, bound, body, stmt.line)?,
        })
    }

    /// Finish lowering and hand back the register state
    pub fn into_state(self) -> CodegenState {
        self.state
    }
}
