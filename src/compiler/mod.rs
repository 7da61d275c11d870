//! # Bonsai Compiler - AST to Counter-Machine Code
//!
//! This module lowers a validated AST of the tiny imperative subset into a
//! program for the Bonsai register machine (`INC`, `DEC`, `JMP`, `TST`, `HLT`).
//!
//! ## Architecture
//!
//! ```text
//! AST → Symbols → Lower (fragments with holes) → Optimize → Link → Verify
//! ```
//!
//! ## Usage
//!
//! ```
//! use bonsai::ast::{Declaration, Expression, Operand, Program, Statement};
//! use bonsai::compiler::{CompileOptions, Compiler};
//!
//! let ast = Program::new(
//!     vec![Declaration::new("a", 3), Declaration::new("b", 2), Declaration::new("c", 0)],
//!     vec![Statement::assign("c", Expression::sub(Operand::var("a"), Operand::var("b")))],
//! );
//! let compiler = Compiler::new(CompileOptions::default());
//! let program = compiler.compile(&ast)?;
//! assert_eq!(program.instructions().last().map(|i| i.mnemonic()), Some("HLT"));
//! # Ok::<(), bonsai::Error>(())
//! ```

pub mod ir;
pub mod linker;
pub mod lower;
pub mod optimizer;
pub mod regalloc;
pub mod symbols;
pub mod verifier;

pub use ir::{AddressBase, Instruction, Program, Register};
pub use linker::Linker;
pub use lower::{CodegenState, Lowerer};
pub use optimizer::Optimizer;
pub use regalloc::RegisterAllocator;
pub use symbols::{Symbol, SymbolTable};
pub use verifier::{ProgramStats, Verifier, VerifyError, VerifyResult};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ast, Error, Result};

/// Highest supported optimization level
pub const MAX_OPT_LEVEL: u8 = 1;

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Registers available on the target machine
    pub register_pool: usize,
    /// Optimization level (0-1)
    pub opt_level: u8,
    /// Line numbering of jump targets
    pub address_base: AddressBase,
    /// Listing size limit; also bounds literal expansion. `None` disables it.
    pub max_instructions: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            register_pool: 256,
            opt_level: 1,
            address_base: AddressBase::One,
            max_instructions: Some(1 << 20),
        }
    }
}

impl CompileOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidOptions(format!("unparsable options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject settings no program could compile under
    pub fn validate(&self) -> Result<()> {
        if self.register_pool == 0 {
            return Err(Error::InvalidOptions(
                "register_pool must hold at least one register".into(),
            ));
        }
        if self.opt_level > MAX_OPT_LEVEL {
            return Err(Error::InvalidOptions(format!(
                "unknown optimization level {} (max {})",
                self.opt_level, MAX_OPT_LEVEL
            )));
        }
        if self.max_instructions == Some(0) {
            return Err(Error::InvalidOptions(
                "max_instructions must allow at least the final HLT".into(),
            ));
        }
        Ok(())
    }
}

/// Compilation result with metadata
#[derive(Debug)]
pub struct CompileResult {
    /// Linked program
    pub program: Program,
    /// Instructions produced by lowering, before optimization
    pub lowered_instruction_count: usize,
    /// Instructions removed by the optimizer
    pub optimized_away: usize,
    /// Verifier statistics for the final program
    pub stats: ProgramStats,
    /// Non-fatal verifier findings
    pub warnings: Vec<String>,
}

/// AST to Bonsai compiler
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile an AST into a linked program
    pub fn compile(&self, program: &ast::Program) -> Result<Program> {
        self.compile_with_stats(program).map(|r| r.program)
    }

    /// Compile an AST serialized as JSON
    pub fn compile_json(&self, json: &str) -> Result<Program> {
        self.compile(&ast::Program::from_json(json)?)
    }

    /// Compile and report what each phase did
    pub fn compile_with_stats(&self, program: &ast::Program) -> Result<CompileResult> {
        self.options.validate()?;

        // Phase 1: Symbols (named registers R1..Rn)
        let mut allocator = RegisterAllocator::new(self.options.register_pool);
        let symbols = SymbolTable::build(&program.declarations, &mut allocator)?;

        // Phase 2: Lower
        let mut lowerer = Lowerer::new(&symbols, CodegenState::new(allocator))
            .with_instruction_limit(self.options.max_instructions);
        let fragment = lowerer.lower_block(&program.body)?;
        let register_count = lowerer.into_state().into_allocator().finish()?;
        let lowered_instruction_count = fragment.len();
        debug!(
            instructions = lowered_instruction_count,
            registers = register_count,
            named = symbols.len(),
            "lowering complete"
        );

        // Phase 3: Optimize
        let fragment = Optimizer::new(self.options.opt_level).optimize(fragment);
        let optimized_away = lowered_instruction_count - fragment.len();

        // Phase 4: Link
        let linked = Linker::new(self.options.address_base).link(
            [fragment],
            symbols.initial_registers(register_count),
            symbols.bindings(),
        )?;

        // Phase 5: Verify
        let verification = Verifier::new()
            .max_instructions(self.options.max_instructions)
            .check(&linked)?;

        Ok(CompileResult {
            program: linked,
            lowered_instruction_count,
            optimized_away,
            stats: verification.stats,
            warnings: verification.warnings,
        })
    }
}

/// Compile with default options
pub fn compile(program: &ast::Program) -> Result<Program> {
    Compiler::default().compile(program)
}
