//! Input AST handed to the backend by the parsing collaborator
//!
//! The tree is already validated syntactically. Name resolution and the
//! supported-subset checks happen during lowering.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Complete source program: a declaration block followed by a body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Program {
    /// Variables with their initial values, in declaration order
    pub declarations: Vec<Declaration>,
    /// Top-level statements
    pub body: Vec<Statement>,
}

impl Program {
    /// Create a program from declarations and body
    pub fn new(declarations: Vec<Declaration>, body: Vec<Statement>) -> Self {
        Self { declarations, body }
    }

    /// Decode a program serialized as JSON by the parser
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidAst(e.to_string()))
    }
}

/// Variable declaration: `name = value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Variable name
    pub name: String,
    /// Initial value (non-negative)
    pub value: u64,
    /// Source line
    #[serde(default)]
    pub line: usize,
}

impl Declaration {
    /// Declare `name` with an initial value
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
            line: 0,
        }
    }

    /// Attach a source line
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// Statement with its source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// What the statement does
    pub kind: StatementKind,
    /// Source line
    #[serde(default)]
    pub line: usize,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    /// Assignment: `target = value`
    Assign {
        /// Variable being assigned
        target: String,
        /// Right-hand side
        value: Expression,
    },

    /// If statement with a single comparison
    If {
        /// Branch condition
        condition: Condition,
        /// Statements executed when the condition holds
        then_branch: Vec<Statement>,
        /// Statements executed otherwise (may be empty)
        else_branch: Vec<Statement>,
    },

    /// Counted loop: `for variable in range(bound)`
    For {
        /// Loop binding
        variable: String,
        /// Trip count source
        bound: Operand,
        /// Loop body
        body: Vec<Statement>,
    },
}

impl Statement {
    /// `target = value`
    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        StatementKind::Assign {
            target: target.into(),
            value,
        }
        .into()
    }

    /// `if condition: then_branch else: else_branch`
    pub fn if_else(
        condition: Condition,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    ) -> Self {
        StatementKind::If {
            condition,
            then_branch,
            else_branch,
        }
        .into()
    }

    /// `for variable in range(bound): body`
    pub fn for_range(variable: impl Into<String>, bound: Operand, body: Vec<Statement>) -> Self {
        StatementKind::For {
            variable: variable.into(),
            bound,
            body,
        }
        .into()
    }

    /// Attach a source line
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl From<StatementKind> for Statement {
    fn from(kind: StatementKind) -> Self {
        Self { kind, line: 0 }
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// Plain operand: `x` or `5`
    Operand(Operand),
    /// Binary operation on two operands
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
}

impl Expression {
    /// `lhs + rhs`
    pub fn add(lhs: Operand, rhs: Operand) -> Self {
        Expression::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        }
    }

    /// `lhs - rhs`
    pub fn sub(lhs: Operand, rhs: Operand) -> Self {
        Expression::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        }
    }
}

impl From<Operand> for Expression {
    fn from(operand: Operand) -> Self {
        Expression::Operand(operand)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Saturating subtraction
    Sub,
}

/// Operand: variable reference or literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Declared variable
    Variable(String),
    /// Non-negative integer literal
    Literal(u64),
}

impl Operand {
    /// Variable operand
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Variable(name.into())
    }

    /// Literal operand
    pub fn lit(value: u64) -> Self {
        Operand::Literal(value)
    }

    /// Variable name, if this is a variable
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Operand::Variable(name) => Some(name),
            Operand::Literal(_) => None,
        }
    }
}

/// Single comparison used as an if condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Left side
    pub lhs: Operand,
    /// Comparison operator
    pub op: CompareOp,
    /// Right side
    pub rhs: Operand,
}

impl Condition {
    /// Build a comparison
    pub fn new(lhs: Operand, op: CompareOp, rhs: Operand) -> Self {
        Self { lhs, op, rhs }
    }

    /// `name == 0`
    pub fn is_zero(name: impl Into<String>) -> Self {
        Self::new(Operand::var(name), CompareOp::Eq, Operand::lit(0))
    }

    /// `name != 0`
    pub fn is_nonzero(name: impl Into<String>) -> Self {
        Self::new(Operand::var(name), CompareOp::Ne, Operand::lit(0))
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Operator with its operands swapped: `a op b` ⇔ `b op.mirrored() a`
    pub fn mirrored(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Variable(name) => write!(f, "{}", name),
            Operand::Literal(value) => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}
