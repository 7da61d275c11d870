//! Reference execution of Bonsai programs on the counter machine

mod machine;

pub use machine::{Execution, Machine, MachineError, DEFAULT_STEP_LIMIT};
