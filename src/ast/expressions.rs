use indexmap::IndexMap;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::function::FunctionCall;
use crate::lexer::Position;
use crate::types::{self, ValueType};

/// A node of a parsed rule expression.
///
/// Nodes are immutable once built: the static type is resolved by the
/// constructors, so a finished tree can be evaluated from several threads
/// at once, each with its own [`EvaluationContext`](crate::EvaluationContext).
#[derive(Debug, Clone)]
pub struct Expr {
    kind: ExprKind,
    ty: ValueType,
    position: Position,
}

/// The closed set of node kinds.
#[derive(Debug, Clone)]
pub enum ExprKind {
    // Constants
    /// Boolean literal
    Boolean(bool),

    /// Integer literal
    Long(i64),

    /// Floating point literal
    Double(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// ```
    String(String),

    // Operators
    /// Arithmetic, comparison, equality, logical and concatenation nodes
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Sign, negation and boolean function wrapper nodes
    Unary { op: UnaryOp, operand: Box<Expr> },

    // References
    /// Property lookup on an evaluated object
    ///
    /// # Example
    /// ```text
    /// regex("(\\d+)", $message.path).matches
    /// ```
    FieldAccess { object: Box<Expr>, field: Box<Expr> },

    /// Field name written as a bare identifier, evaluates to the name itself
    FieldRef(String),

    /// Variable bound by a `let` statement
    VarRef(String),

    /// The current message (`$message`) or one of its fields (`$message.source`)
    MessageRef(Option<Box<Expr>>),

    // Composite literals
    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, $message.port]
    /// ```
    ArrayLiteral(Vec<Expr>),

    /// Map literal, keys kept in source order
    ///
    /// # Example
    /// ```text
    /// {level: 3, "source": "fw-01"}
    /// ```
    MapLiteral(IndexMap<String, Expr>),

    /// Position or key lookup (`list[1]`, `map["key"]`)
    IndexedAccess {
        indexable: Box<Expr>,
        index: Box<Expr>,
    },

    /// Call of a registered function with bound arguments
    Function(FunctionCall),
}

fn require(operand: Option<Expr>, op: &str, side: &'static str, position: Position) -> Result<Expr, SyntaxError> {
    operand.ok_or_else(|| {
        SyntaxError::new(
            SyntaxErrorKind::MissingOperand {
                op: op.to_string(),
                side,
            },
            position,
        )
    })
}

impl Expr {
    fn new(kind: ExprKind, ty: ValueType, position: Position) -> Self {
        Expr { kind, ty, position }
    }

    pub fn boolean(value: bool, position: Position) -> Self {
        Expr::new(ExprKind::Boolean(value), ValueType::Boolean, position)
    }

    pub fn long(value: i64, position: Position) -> Self {
        Expr::new(ExprKind::Long(value), ValueType::Long, position)
    }

    pub fn double(value: f64, position: Position) -> Self {
        Expr::new(ExprKind::Double(value), ValueType::Double, position)
    }

    pub fn string(value: impl Into<String>, position: Position) -> Self {
        Expr::new(ExprKind::String(value.into()), ValueType::String, position)
    }

    /// Builds a binary node, resolving its result type from the operands.
    ///
    /// Fails when an operand is missing or the operand types cannot be combined.
    pub fn binary(
        op: BinaryOp,
        left: Option<Expr>,
        right: Option<Expr>,
        position: Position,
    ) -> Result<Self, SyntaxError> {
        let left = require(left, op.symbol(), "left", position)?;
        let right = require(right, op.symbol(), "right", position)?;

        if op == BinaryOp::Concat {
            for operand in [&left, &right] {
                if !operand.is_literal_string() {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::InvalidOperation {
                            op: op.symbol().to_string(),
                            operand: operand.ty,
                        },
                        operand.position,
                    ));
                }
            }
        }

        let ty = types::binary_result_type(op, left.ty, right.ty)
            .map_err(|kind| SyntaxError::new(kind, position))?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
            position,
        ))
    }

    /// Builds a unary node. `BooleanFunction` only wraps function calls.
    pub fn unary(op: UnaryOp, operand: Option<Expr>, position: Position) -> Result<Self, SyntaxError> {
        let operand = require(operand, op.symbol(), "right", position)?;
        if op == UnaryOp::BooleanFunction && !matches!(operand.kind, ExprKind::Function(_)) {
            return Err(SyntaxError::new(
                SyntaxErrorKind::InvalidOperation {
                    op: op.symbol().to_string(),
                    operand: operand.ty,
                },
                position,
            ));
        }
        let ty = types::unary_result_type(op, operand.ty)
            .map_err(|kind| SyntaxError::new(kind, position))?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            position,
        ))
    }

    pub fn field_access(object: Expr, field: Expr, position: Position) -> Self {
        Expr::new(
            ExprKind::FieldAccess {
                object: Box::new(object),
                field: Box::new(field),
            },
            ValueType::Any,
            position,
        )
    }

    pub fn field_ref(name: impl Into<String>, position: Position) -> Self {
        Expr::new(ExprKind::FieldRef(name.into()), ValueType::String, position)
    }

    /// Reference to a variable declared with type `ty`.
    pub fn var_ref(name: impl Into<String>, ty: ValueType, position: Position) -> Self {
        Expr::new(ExprKind::VarRef(name.into()), ty, position)
    }

    pub fn message_ref(field: Option<Expr>, position: Position) -> Self {
        let ty = if field.is_some() {
            ValueType::Any
        } else {
            ValueType::Map
        };
        Expr::new(ExprKind::MessageRef(field.map(Box::new)), ty, position)
    }

    pub fn array(elements: Vec<Expr>, position: Position) -> Self {
        Expr::new(ExprKind::ArrayLiteral(elements), ValueType::List, position)
    }

    pub fn map(entries: IndexMap<String, Expr>, position: Position) -> Self {
        Expr::new(ExprKind::MapLiteral(entries), ValueType::Map, position)
    }

    pub fn indexed(indexable: Expr, index: Expr, position: Position) -> Result<Self, SyntaxError> {
        types::check_index(indexable.ty, index.ty).map_err(|kind| SyntaxError::new(kind, position))?;
        Ok(Expr::new(
            ExprKind::IndexedAccess {
                indexable: Box::new(indexable),
                index: Box::new(index),
            },
            ValueType::Any,
            position,
        ))
    }

    pub fn function(call: FunctionCall, position: Position) -> Self {
        let ty = call.descriptor().return_type;
        Expr::new(ExprKind::Function(call), ty, position)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Static result type.
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }

    /// Whether the node can be evaluated once, without a message.
    ///
    /// Function calls, field access and message references always depend on
    /// runtime state; variable references depend on the bindings of a run.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Boolean(_)
            | ExprKind::Long(_)
            | ExprKind::Double(_)
            | ExprKind::String(_)
            | ExprKind::FieldRef(_) => true,
            ExprKind::VarRef(_)
            | ExprKind::FieldAccess { .. }
            | ExprKind::MessageRef(_)
            | ExprKind::Function(_) => false,
            _ => self.children().iter().all(|child| child.is_constant()),
        }
    }

    /// Direct child nodes, in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Boolean(_)
            | ExprKind::Long(_)
            | ExprKind::Double(_)
            | ExprKind::String(_)
            | ExprKind::FieldRef(_)
            | ExprKind::VarRef(_)
            | ExprKind::MessageRef(None) => vec![],
            ExprKind::MessageRef(Some(field)) => vec![field],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::FieldAccess { object, field } => vec![object, field],
            ExprKind::ArrayLiteral(elements) => elements.iter().collect(),
            ExprKind::MapLiteral(entries) => entries.values().collect(),
            ExprKind::IndexedAccess { indexable, index } => vec![indexable, index],
            ExprKind::Function(call) => call.args().expressions().collect(),
        }
    }

    /// Whether the node renders to a fixed string without evaluation.
    pub fn is_literal_string(&self) -> bool {
        match &self.kind {
            ExprKind::Boolean(_)
            | ExprKind::Long(_)
            | ExprKind::Double(_)
            | ExprKind::String(_)
            | ExprKind::FieldRef(_) => true,
            ExprKind::Binary {
                op: BinaryOp::Concat,
                ..
            } => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Boolean(b) => write!(f, "{}", b),
            ExprKind::Long(n) => write!(f, "{}", n),
            ExprKind::Double(n) => write!(f, "{:?}", n),
            ExprKind::String(s) => write!(f, "{:?}", s),
            ExprKind::Binary {
                op: BinaryOp::Concat,
                left,
                right,
            } => write!(f, "{} {}", left, right),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            ExprKind::Unary {
                op: UnaryOp::BooleanFunction,
                operand,
            } => write!(f, "{}", operand),
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            ExprKind::FieldAccess { object, field } => write!(f, "{}.{}", object, field),
            ExprKind::FieldRef(name) => write!(f, "{}", name),
            ExprKind::VarRef(name) => write!(f, "{}", name),
            ExprKind::MessageRef(None) => write!(f, "$message"),
            ExprKind::MessageRef(Some(field)) => match field.kind() {
                ExprKind::FieldRef(name) => write!(f, "$message.{}", name),
                _ => write!(f, "$message[{}]", field),
            },
            ExprKind::ArrayLiteral(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            ExprKind::MapLiteral(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            ExprKind::IndexedAccess { indexable, index } => write!(f, "{}[{}]", indexable, index),
            ExprKind::Function(call) => write!(f, "{}", call),
        }
    }
}
