//! Static types and the rules that resolve them while nodes are built.
//!
//! Every expression node carries its result type from the moment it is
//! constructed, so a tree never needs a second, mutating resolution pass
//! before it can be shared between evaluator threads.

use std::fmt;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::SyntaxErrorKind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Unknown until runtime (message fields, untyped function results)
    Any,
    /// Result of functions called only for their side effects
    Void,
    Boolean,
    Long,
    Double,
    String,
    DateTime,
    Period,
    Duration,
    List,
    Map,
    Object,
}

impl ValueType {
    /// Runtime type of a value. `Null` reports `Any`.
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Null => ValueType::Any,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Period(_) => ValueType::Period,
            Value::Duration(_) => ValueType::Duration,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Whether a runtime value can be treated as this type. `Null` fits everywhere.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Void => value.is_null(),
            ty => value.is_null() || ValueType::of(value) == *ty,
        }
    }

    /// Whether an expression of type `other` may be passed where `self` is expected.
    pub fn is_assignable_from(&self, other: ValueType) -> bool {
        *self == ValueType::Any || other == ValueType::Any || *self == other
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Long | ValueType::Double)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Void => "void",
            ValueType::Boolean => "boolean",
            ValueType::Long => "long",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::DateTime => "datetime",
            ValueType::Period => "period",
            ValueType::Duration => "duration",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Object => "object",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn incompatible(op: BinaryOp, left: ValueType, right: ValueType) -> SyntaxErrorKind {
    SyntaxErrorKind::IncompatibleTypes {
        op: op.symbol().to_string(),
        left,
        right,
    }
}

fn numeric_result(left: ValueType, right: ValueType) -> Option<ValueType> {
    match (left, right) {
        (ValueType::Long, ValueType::Long) => Some(ValueType::Long),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(ValueType::Double),
        _ => None,
    }
}

fn is_boolean_like(ty: ValueType) -> bool {
    matches!(ty, ValueType::Boolean | ValueType::Any)
}

/// Result type of a binary node, or the reason the operands cannot be combined.
pub fn binary_result_type(
    op: BinaryOp,
    left: ValueType,
    right: ValueType,
) -> Result<ValueType, SyntaxErrorKind> {
    use ValueType::*;

    match op {
        BinaryOp::Add | BinaryOp::Subtract => match (left, right) {
            (DateTime, Period) | (Period, DateTime) => Ok(DateTime),
            (Period, Period) => Ok(Period),
            (DateTime, DateTime) if op == BinaryOp::Subtract => Ok(Duration),
            (DateTime, DateTime) => Err(SyntaxErrorKind::InvalidOperation {
                op: op.symbol().to_string(),
                operand: DateTime,
            }),
            (String, String) => Ok(String),
            (l, r) => numeric_result(l, r).ok_or_else(|| incompatible(op, l, r)),
        },
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
            numeric_result(left, right).ok_or_else(|| incompatible(op, left, right))
        }
        BinaryOp::Greater | BinaryOp::GreaterEqual | BinaryOp::Less | BinaryOp::LessEqual => {
            match (left, right) {
                (l, r) if l.is_numeric() && r.is_numeric() => Ok(Boolean),
                (DateTime, DateTime) => Ok(Boolean),
                (Any, r) if r.is_numeric() || r == DateTime || r == Any => Ok(Boolean),
                (l, Any) if l.is_numeric() || l == DateTime => Ok(Boolean),
                (l, r) => Err(incompatible(op, l, r)),
            }
        }
        BinaryOp::Equal | BinaryOp::NotEqual => Ok(Boolean),
        BinaryOp::And | BinaryOp::Or => {
            if is_boolean_like(left) && is_boolean_like(right) {
                Ok(Boolean)
            } else {
                Err(incompatible(op, left, right))
            }
        }
        BinaryOp::Concat => Ok(String),
    }
}

/// Result type of a unary node.
pub fn unary_result_type(op: UnaryOp, operand: ValueType) -> Result<ValueType, SyntaxErrorKind> {
    let invalid = || SyntaxErrorKind::InvalidOperation {
        op: op.symbol().to_string(),
        operand,
    };
    match op {
        UnaryOp::Plus | UnaryOp::Minus => match operand {
            ValueType::Long | ValueType::Double | ValueType::Any => Ok(operand),
            _ => Err(invalid()),
        },
        UnaryOp::Not | UnaryOp::BooleanFunction => {
            if is_boolean_like(operand) {
                Ok(ValueType::Boolean)
            } else {
                Err(invalid())
            }
        }
    }
}

/// Checks an `indexable[index]` pair.
pub fn check_index(indexable: ValueType, index: ValueType) -> Result<(), SyntaxErrorKind> {
    match (indexable, index) {
        (ValueType::List, ValueType::Long | ValueType::Double | ValueType::Any)
        | (ValueType::Map, ValueType::String | ValueType::Any)
        | (ValueType::Any, _) => Ok(()),
        (ValueType::List | ValueType::Map, index) => Err(SyntaxErrorKind::IncompatibleIndexType {
            indexable,
            index,
        }),
        (other, _) => Err(SyntaxErrorKind::NonIndexableType(other)),
    }
}
