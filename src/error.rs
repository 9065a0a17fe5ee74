//! Error taxonomy of the interpreter.
//!
//! Construction-time faults ([`SyntaxError`]) are fatal to the tree being
//! built. Evaluation-time faults ([`EvalError`]) are recovered by
//! [`Expr::evaluate`](crate::ast::Expr::evaluate) and recorded into the
//! evaluation context.

use thiserror::Error;

use crate::lexer::Position;
use crate::types::ValueType;

/// Fault raised while building an expression node.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {position}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub position: Position,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, position: Position) -> Self {
        SyntaxError { kind, position }
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxErrorKind {
    /// A unary or binary node was built without one of its operands.
    #[error("missing {side} operand for '{op}'")]
    MissingOperand { op: String, side: &'static str },

    #[error("incompatible types {left} and {right} for '{op}'")]
    IncompatibleTypes {
        op: String,
        left: ValueType,
        right: ValueType,
    },

    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperation { op: String, operand: ValueType },

    #[error("{0} is not indexable")]
    NonIndexableType(ValueType),

    #[error("{indexable} cannot be indexed with {index}")]
    IncompatibleIndexType {
        indexable: ValueType,
        index: ValueType,
    },

    #[error("invalid argument '{parameter}' for function '{function}': {message}")]
    InvalidArgument {
        function: String,
        parameter: String,
        message: String,
    },
}

/// Fault raised while evaluating a node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A function body failed. Carries the position of the call site.
    #[error("In call to function '{function}' at {position} an exception was thrown: {cause}")]
    Function {
        function: String,
        position: Position,
        cause: Box<EvalError>,
    },

    /// A fault that already knows the node it originated from.
    #[error("At {position} an exception was thrown: {cause}")]
    Located {
        position: Position,
        cause: Box<EvalError>,
    },

    #[error("{0}")]
    IllegalArgument(String),

    #[error("missing required argument '{parameter}' for function '{function}'")]
    MissingArgument { function: String, parameter: String },

    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("{0}")]
    Arithmetic(String),

    #[error("{0}")]
    Runtime(String),
}

impl EvalError {
    pub fn located(position: Position, cause: EvalError) -> Self {
        EvalError::Located {
            position,
            cause: Box::new(cause),
        }
    }

    pub fn type_mismatch(expected: ValueType, actual: ValueType) -> Self {
        EvalError::TypeMismatch { expected, actual }
    }

    /// Position and originating function name, for location-aware faults.
    pub fn location(&self) -> Option<(Position, Option<&str>)> {
        match self {
            EvalError::Function {
                function, position, ..
            } => Some((*position, Some(function.as_str()))),
            EvalError::Located { position, .. } => Some((*position, None)),
            _ => None,
        }
    }

    /// Innermost fault of a wrapped chain.
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::Function { cause, .. } | EvalError::Located { cause, .. } => {
                cause.root_cause()
            }
            other => other,
        }
    }
}

/// Failure to read a named property from an object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("{0} does not expose properties")]
    Unsupported(String),

    #[error("failed to read property '{name}': {message}")]
    Access { name: String, message: String },
}
