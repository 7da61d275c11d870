#![warn(missing_docs)]
//! # Bonsai - Compiler Backend for a Counter Machine
//!
//! Lowers a tiny imperative language (unsigned variables, `+` and `-`,
//! single-condition `if`/`else`, `for i in range(n)`) into programs for the
//! Bonsai register machine, which knows only five instructions:
//!
//! ```text
//! INC r        r += 1
//! DEC r        r -= 1          (r must be non-zero)
//! JMP a        go to line a
//! TST r, t, f  go to t if r != 0, else to f
//! HLT          stop
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bonsai::ast::{Declaration, Expression, Operand, Program, Statement};
//! use bonsai::{Compiler, CompileOptions, Machine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // n = 4; s = 0
//! // for i in range(n):
//! //     s = s + 1
//! let ast = Program::new(
//!     vec![Declaration::new("n", 4), Declaration::new("s", 0)],
//!     vec![Statement::for_range(
//!         "i",
//!         Operand::var("n"),
//!         vec![Statement::assign("s", Expression::add(Operand::var("s"), Operand::lit(1)))],
//!     )],
//! );
//!
//! let program = Compiler::new(CompileOptions::default()).compile(&ast)?;
//! println!("{}", program);
//!
//! let exec = Machine::new().run(&program)?;
//! assert_eq!(exec.value("s"), Some(4));
//! assert_eq!(exec.value("n"), Some(4));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ast`] - Input tree handed over by the parser
//! - [`compiler`] - Register allocation, lowering, optimization, linking, verification
//! - [`runtime`] - Reference interpreter used to check emitted programs
//! - [`error`] - Compilation errors
//!
//! ## Error Handling
//!
//! Every failure aborts compilation and no partial program is returned.
//! [`Error::classify`] separates mistakes in the source program from
//! compiler defects and bad configuration:
//!
//! ```rust
//! use bonsai::ast::{Declaration, Operand, Program, Statement};
//! use bonsai::{compile, ErrorOrigin};
//!
//! let ast = Program::new(
//!     vec![Declaration::new("x", 0)],
//!     vec![Statement::assign("x", Operand::var("y").into()).at_line(3)],
//! );
//! let err = compile(&ast).unwrap_err();
//! assert_eq!(err.classify(), ErrorOrigin::Source);
//! assert_eq!(err.line(), Some(3));
//! ```
//!
//! ## License
//!
//! Licensed under the [MIT License](https://opensource.org/licenses/MIT).

/// Version of the Bonsai compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod ast;
pub mod compiler;
pub mod error;
pub mod runtime;

pub use compiler::{compile, CompileOptions, CompileResult, Compiler};
pub use error::{Error, ErrorOrigin, Result};
pub use runtime::{Execution, Machine, MachineError};
