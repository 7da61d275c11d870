//! # Intermediate Representation for Bonsai Compilation
//!
//! Lowering produces [`Fragment`]s of counter-machine instructions whose jump
//! operands are still symbolic. The linker resolves them into a [`Program`].
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # Register, Instruction (INC, DEC, JMP, TST, HLT)
//! ├── fragment.rs     # Label, LabelGen, Hole, Fragment
//! └── program.rs      # AddressBase, Program (linked output)
//! ```
//!
//! ## Key Types
//!
//! - [`Register`] - Machine register, numbered from 1
//! - [`Instruction`] - One of the five machine instructions
//! - [`Hole`] - Tagged placeholder: a `JMP` target or both `TST` targets
//! - [`Fragment`] - Instructions plus holes plus label definitions
//! - [`Program`] - Flat listing with absolute targets and a trailing `HLT`

mod fragment;
mod instruction;
mod program;

pub use fragment::{Fragment, Hole, Label, LabelGen, LabelKind};
pub use instruction::{Instruction, Register};
pub use program::{AddressBase, Program};
