//! Error types for the Bonsai compiler backend

use thiserror::Error;

use crate::compiler::ir::Register;

/// Compilation errors
///
/// Every variant aborts compilation. Nothing is retried and no partial
/// program is ever returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Resource errors
    /// Register pool is too small for the program
    ///
    /// **Triggered by:** declaring more variables than the configured pool,
    /// or a lowering that needs more scratch registers than remain
    /// **Prevention:** raise `CompileOptions::register_pool`
    #[error("Register pool exhausted: {requested} registers requested, pool holds {pool}")]
    AllocationExhausted {
        /// Number of registers the program needs at the failing allocation
        requested: usize,
        /// Configured pool size
        pool: usize,
        /// Declaration or statement that needed the register, once known
        line: Option<usize>,
    },

    /// Listing would exceed `CompileOptions::max_instructions`
    ///
    /// **Triggered by:** many statements, nested loops, or large literals
    /// (each literal unit costs one instruction)
    /// **Prevention:** raise `max_instructions` or set it to `None`
    #[error("Program too large at line {line}: more than {limit} instructions")]
    ProgramTooLarge {
        /// Configured instruction limit, including the final HLT
        limit: usize,
        /// Statement whose lowering crossed the limit
        line: usize,
    },

    /// Scratch register discipline was violated
    ///
    /// This is a compiler defect, not a user error.
    #[error("Register conflict on {register}: {reason}")]
    RegisterConflict {
        /// Register involved in the conflict
        register: Register,
        /// What went wrong
        reason: String,
    },

    // Source errors
    /// Construct outside the supported source subset
    ///
    /// **Example:** `if a < b:`, `for i in range(3):`
    #[error("Unsupported construct at line {line}: {construct}")]
    UnsupportedConstruct {
        /// Description of the rejected construct
        construct: String,
        /// Source line of the offending statement
        line: usize,
    },

    /// Reference to a variable that was never declared
    #[error("Unknown variable '{name}' at line {line}")]
    UnknownVariable {
        /// Variable name
        name: String,
        /// Source line of the offending statement
        line: usize,
    },

    /// Variable declared more than once
    #[error("Variable '{name}' declared twice (second declaration at line {line})")]
    DuplicateVariable {
        /// Variable name
        name: String,
        /// Source line of the repeated declaration
        line: usize,
    },

    // Internal defects
    /// A jump hole could not be resolved during fixup
    ///
    /// This is a compiler defect, not a user error.
    #[error("Unresolved label {label}: {reason}")]
    UnresolvedLabel {
        /// Label that failed to resolve
        label: String,
        /// Why resolution failed
        reason: String,
    },

    /// Linked program failed verification
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    // Boundary errors
    /// Invalid compiler configuration
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// AST handed over by the parser could not be decoded
    #[error("Invalid AST: {0}")]
    InvalidAst(String),
}

/// Where an error originates, so the caller can tell user mistakes from
/// compiler defects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// The source program is outside what the backend accepts
    Source,
    /// Invariant violation inside the backend
    Internal,
    /// Options or boundary data are malformed
    Configuration,
}

impl Error {
    /// Create an unsupported-construct error
    pub fn unsupported(construct: impl Into<String>, line: usize) -> Self {
        Error::UnsupportedConstruct {
            construct: construct.into(),
            line,
        }
    }

    /// Create a register conflict error
    pub fn conflict(register: Register, reason: impl Into<String>) -> Self {
        Error::RegisterConflict {
            register,
            reason: reason.into(),
        }
    }

    /// Attach a source line to an error that was raised without one
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Error::AllocationExhausted {
                requested,
                pool,
                line: None,
            } => Error::AllocationExhausted {
                requested,
                pool,
                line: Some(line),
            },
            other => other,
        }
    }

    /// Classify error origin
    pub fn classify(&self) -> ErrorOrigin {
        match self {
            Error::AllocationExhausted { .. }
            | Error::ProgramTooLarge { .. }
            | Error::UnsupportedConstruct { .. }
            | Error::UnknownVariable { .. }
            | Error::DuplicateVariable { .. } => ErrorOrigin::Source,

            Error::RegisterConflict { .. }
            | Error::UnresolvedLabel { .. }
            | Error::VerificationFailed(_) => ErrorOrigin::Internal,

            Error::InvalidOptions(_) | Error::InvalidAst(_) => ErrorOrigin::Configuration,
        }
    }

    /// Source line of the offending AST node, when the error has one
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::UnsupportedConstruct { line, .. }
            | Error::UnknownVariable { line, .. }
            | Error::DuplicateVariable { line, .. }
            | Error::ProgramTooLarge { line, .. } => Some(*line),
            Error::AllocationExhausted { line, .. } => *line,
            _ => None,
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            Error::unsupported("while loop", 3).classify(),
            ErrorOrigin::Source
        );
        assert_eq!(
            Error::conflict(Register::new(4), "double release").classify(),
            ErrorOrigin::Internal
        );
        assert_eq!(
            Error::InvalidOptions("register_pool must be positive".into()).classify(),
            ErrorOrigin::Configuration
        );
    }

    #[test]
    fn test_line_and_message() {
        let err = Error::UnknownVariable {
            name: "q".into(),
            line: 7,
        };
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.to_string(), "Unknown variable 'q' at line 7");
        assert_eq!(Error::VerificationFailed("x".into()).line(), None);
    }

    #[test]
    fn test_at_line_fills_missing_location_only() {
        let err = Error::AllocationExhausted {
            requested: 5,
            pool: 4,
            line: None,
        };
        let located = err.at_line(9);
        assert_eq!(located.line(), Some(9));
        assert_eq!(located.clone().at_line(2).line(), Some(9));

        let other = Error::unsupported("while loop", 3).at_line(7);
        assert_eq!(other.line(), Some(3));
    }

    #[test]
    fn test_program_too_large_is_a_source_error() {
        let err = Error::ProgramTooLarge {
            limit: 1000,
            line: 12,
        };
        assert_eq!(err.classify(), ErrorOrigin::Source);
        assert_eq!(err.line(), Some(12));
        assert_eq!(
            err.to_string(),
            "Program too large at line 12: more than 1000 instructions"
        );
    }
}
