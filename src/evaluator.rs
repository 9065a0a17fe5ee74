//! Evaluation of expression trees.
//!
//! [`Expr::evaluate`] is the only entry point that never fails: faults raised
//! anywhere below it are recorded into the context and the node yields
//! `Value::Null`. Parent nodes evaluate their children with
//! [`Expr::evaluate_unsafe`] so a fault travels up to the nearest safe call.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::context::EvaluationContext;
use crate::error::{EvalError, PropertyError};
use crate::types::ValueType;
use crate::value::Value;

impl Expr {
    /// Evaluates the node, recording any fault into `ctx` and returning null in its place.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> Value {
        match self.evaluate_unsafe(ctx) {
            Ok(value) => value,
            Err(err) => {
                self.record_error(ctx, &err);
                Value::Null
            }
        }
    }

    /// Evaluates a constant node outside of any message.
    pub fn evaluate_constant(&self) -> Result<Value, EvalError> {
        self.evaluate_unsafe(&mut EvaluationContext::empty())
    }

    /// Boolean view of the node; faults are recorded and read as `false`.
    pub fn evaluate_bool(&self, ctx: &mut EvaluationContext) -> bool {
        match self.evaluate_bool_unsafe(ctx) {
            Ok(b) => b,
            Err(err) => {
                self.record_error(ctx, &err);
                false
            }
        }
    }

    /// Boolean view of the node. Null reads as `false`.
    pub fn evaluate_bool_unsafe(&self, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        match self.evaluate_unsafe(ctx)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::type_mismatch(ValueType::Boolean, other.value_type())),
        }
    }

    /// String form of a literal node, used by concatenation.
    pub fn evaluate_literal_string(&self, ctx: &mut EvaluationContext) -> Result<String, EvalError> {
        match self.kind() {
            ExprKind::String(s) => Ok(s.clone()),
            ExprKind::FieldRef(name) => Ok(name.clone()),
            _ if self.is_literal_string() => Ok(self.evaluate_unsafe(ctx)?.to_string()),
            _ => Err(EvalError::IllegalArgument(format!(
                "{} cannot be evaluated as a literal string",
                self
            ))),
        }
    }

    pub fn evaluate_unsafe(&self, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        match self.kind() {
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Long(n) => Ok(Value::Long(*n)),
            ExprKind::Double(n) => Ok(Value::Double(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, ctx),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, ctx),
            ExprKind::FieldAccess { object, field } => eval_field_access(object, field, ctx),
            ExprKind::FieldRef(name) => Ok(Value::String(name.clone())),
            ExprKind::VarRef(name) => match ctx.get(name) {
                Some(bound) => Ok(bound.value.clone()),
                None => {
                    debug!(variable = %name, "unbound variable evaluates to null");
                    Ok(Value::Null)
                }
            },
            ExprKind::MessageRef(None) => Ok(ctx.current_message().to_value()),
            ExprKind::MessageRef(Some(field)) => {
                let name = field.evaluate_unsafe(ctx)?;
                if name.is_null() {
                    return Ok(Value::Null);
                }
                let name = name.to_string();
                Ok(ctx
                    .current_message()
                    .get_field(&name)
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            ExprKind::ArrayLiteral(elements) => elements
                .iter()
                .map(|element| element.evaluate_unsafe(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ExprKind::MapLiteral(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, expr) in entries {
                    map.insert(key.clone(), expr.evaluate_unsafe(ctx)?);
                }
                Ok(Value::Map(map))
            }
            ExprKind::IndexedAccess { indexable, index } => self.eval_indexed(indexable, index, ctx),
            ExprKind::Function(call) => call.invoke(self.position(), ctx),
        }
    }

    fn record_error(&self, ctx: &mut EvaluationContext, err: &EvalError) {
        let (position, function) = err.location().unwrap_or((self.position(), None));
        let cause = err.root_cause().to_string();
        trace!(%position, ?function, %cause, "recording evaluation error");
        ctx.add_evaluation_error(position.line, position.column, function, cause);
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &mut EvaluationContext,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOp::And => Ok(Value::Boolean(
                left.evaluate_bool_unsafe(ctx)? && right.evaluate_bool_unsafe(ctx)?,
            )),
            BinaryOp::Or => Ok(Value::Boolean(
                left.evaluate_bool_unsafe(ctx)? || right.evaluate_bool_unsafe(ctx)?,
            )),
            BinaryOp::Concat => {
                let mut joined = left.evaluate_literal_string(ctx)?;
                joined.push_str(&right.evaluate_literal_string(ctx)?);
                Ok(Value::String(joined))
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let l = left.evaluate_unsafe(ctx)?;
                let r = right.evaluate_unsafe(ctx)?;
                if l.is_null() {
                    debug!(expression = %self, "left side of equality is null");
                    return Ok(Value::Boolean(false));
                }
                let equal = l == r;
                Ok(Value::Boolean(if op == BinaryOp::Equal { equal } else { !equal }))
            }
            BinaryOp::Greater | BinaryOp::GreaterEqual | BinaryOp::Less | BinaryOp::LessEqual => {
                let l = left.evaluate_unsafe(ctx)?;
                let r = right.evaluate_unsafe(ctx)?;
                compare(op, &l, &r).map(Value::Boolean)
            }
            BinaryOp::Add | BinaryOp::Subtract => {
                let l = left.evaluate_unsafe(ctx)?;
                let r = right.evaluate_unsafe(ctx)?;
                self.additive(op, l, r)
            }
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                let l = left.evaluate_unsafe(ctx)?;
                let r = right.evaluate_unsafe(ctx)?;
                self.multiplicative(op, &l, &r)
            }
        }
    }

    fn is_integral(&self) -> bool {
        self.ty() == ValueType::Long
    }

    fn additive(&self, op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
        let plus = op == BinaryOp::Add;
        let out_of_range = || EvalError::Arithmetic(format!("{} {} {} is out of range", l, op.symbol(), r));

        match (&l, &r) {
            (Value::DateTime(date), Value::Period(period))
            | (Value::Period(period), Value::DateTime(date)) => {
                let shifted = if plus {
                    period.add_to(*date)
                } else {
                    period.subtract_from(*date)
                };
                shifted.map(Value::DateTime).ok_or_else(out_of_range)
            }
            (Value::Period(a), Value::Period(b)) => {
                let combined = if plus { a.checked_plus(b) } else { a.checked_minus(b) };
                combined.map(Value::Period).ok_or_else(out_of_range)
            }
            (Value::DateTime(a), Value::DateTime(b)) => {
                if plus {
                    return Ok(Value::Null);
                }
                let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
                Ok(Value::Duration(later.signed_duration_since(*earlier)))
            }
            _ if self.ty() == ValueType::String => {
                if !plus {
                    return Ok(Value::Null);
                }
                match (&l, &r) {
                    (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                    (Value::String(_), other) | (other, _) => Err(EvalError::type_mismatch(
                        ValueType::String,
                        other.value_type(),
                    )),
                }
            }
            _ if self.is_integral() => {
                let (a, b) = integral_operands(&l, &r)?;
                Ok(Value::Long(if plus { a.wrapping_add(b) } else { a.wrapping_sub(b) }))
            }
            _ => {
                let (a, b) = floating_operands(&l, &r)?;
                Ok(Value::Double(if plus { a + b } else { a - b }))
            }
        }
    }

    fn multiplicative(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        if self.is_integral() {
            let (a, b) = integral_operands(l, r)?;
            let result = match op {
                BinaryOp::Multiply => a.wrapping_mul(b),
                _ if b == 0 => return Err(EvalError::Arithmetic("/ by zero".to_string())),
                BinaryOp::Divide => a.wrapping_div(b),
                _ => a.wrapping_rem(b),
            };
            Ok(Value::Long(result))
        } else {
            let (a, b) = floating_operands(l, r)?;
            let result = match op {
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            };
            Ok(Value::Double(result))
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Not => Ok(Value::Boolean(!operand.evaluate_bool_unsafe(ctx)?)),
            UnaryOp::BooleanFunction => Ok(Value::Boolean(operand.evaluate_bool_unsafe(ctx)?)),
            UnaryOp::Plus | UnaryOp::Minus => {
                let negate = op == UnaryOp::Minus;
                match operand.evaluate_unsafe(ctx)? {
                    Value::Long(n) => Ok(Value::Long(if negate { n.wrapping_neg() } else { n })),
                    Value::Double(n) => Ok(Value::Double(if negate { -n } else { n })),
                    other => Err(EvalError::located(
                        self.position(),
                        EvalError::IllegalArgument(format!(
                            "unary '{}' is not supported for {}",
                            op.symbol(),
                            other.value_type()
                        )),
                    )),
                }
            }
        }
    }

    fn eval_indexed(&self, indexable: &Expr, index: &Expr, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        let indexable = indexable.evaluate_unsafe(ctx)?;
        let index = index.evaluate_unsafe(ctx)?;
        if indexable.is_null() || index.is_null() {
            return Ok(Value::Null);
        }

        let fault = |message: String| EvalError::located(self.position(), EvalError::IllegalArgument(message));
        match (&indexable, &index) {
            (Value::List(items), Value::Long(_) | Value::Double(_)) => {
                let position = saturating_index(&index);
                usize::try_from(position)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        fault(format!(
                            "index {} out of bounds for length {}",
                            position,
                            items.len()
                        ))
                    })
            }
            // Missing keys read as null, like any other absent value
            (Value::Map(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            _ => Err(fault(format!(
                "{} cannot be indexed with {}",
                indexable.value_type(),
                index.value_type()
            ))),
        }
    }
}

/// Numeric index narrowed to `i32`, clamping at the bounds.
fn saturating_index(index: &Value) -> i32 {
    let wide = match index {
        Value::Long(n) => *n,
        Value::Double(n) => *n as i64,
        _ => 0,
    };
    wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn integral_operands(l: &Value, r: &Value) -> Result<(i64, i64), EvalError> {
    match (l.as_long(), r.as_long()) {
        (Some(a), Some(b)) => Ok((a, b)),
        (None, _) => Err(EvalError::type_mismatch(ValueType::Long, l.value_type())),
        (_, None) => Err(EvalError::type_mismatch(ValueType::Long, r.value_type())),
    }
}

fn floating_operands(l: &Value, r: &Value) -> Result<(f64, f64), EvalError> {
    match (l.as_double(), r.as_double()) {
        (Some(a), Some(b)) => Ok((a, b)),
        (None, _) => Err(EvalError::type_mismatch(ValueType::Double, l.value_type())),
        (_, None) => Err(EvalError::type_mismatch(ValueType::Double, r.value_type())),
    }
}

fn ordered<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> bool {
    match op {
        BinaryOp::Greater => a > b,
        BinaryOp::GreaterEqual => a >= b,
        BinaryOp::Less => a < b,
        BinaryOp::LessEqual => a <= b,
        _ => false,
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    match (l, r) {
        (Value::DateTime(a), Value::DateTime(b)) => Ok(ordered(op, a, b)),
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let (a, b) = floating_operands(l, r)?;
            Ok(ordered(op, a, b))
        }
        _ => {
            let (a, b) = integral_operands(l, r)?;
            Ok(ordered(op, a, b))
        }
    }
}

fn eval_field_access(object: &Expr, field: &Expr, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let object = object.evaluate_unsafe(ctx)?;
    let field = field.evaluate_unsafe(ctx)?;
    if object.is_null() || field.is_null() {
        return Ok(Value::Null);
    }

    let name = field.to_string();
    if let Some(value) = read_property(&object, &name) {
        return Ok(value);
    }
    let camel = lower_camel(&name);
    if camel != name
        && let Some(value) = read_property(&object, &camel)
    {
        return Ok(value);
    }
    Ok(Value::Null)
}

fn read_property(object: &Value, name: &str) -> Option<Value> {
    let result = match object {
        Value::Map(map) => Ok(map.get(name).cloned()),
        Value::Object(object) => object.property(name),
        other => Err(PropertyError::Unsupported(other.value_type().to_string())),
    };
    result.unwrap_or_else(|err| {
        debug!(property = name, error = %err, "unable to read property");
        None
    })
}

/// `lower_snake_case` to `lowerCamelCase`.
pub(crate) fn lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name.split('_').enumerate() {
        let word = word.to_lowercase();
        if i == 0 {
            out.push_str(&word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_camel() {
        assert_eq!(lower_camel("geo_location"), "geoLocation");
        assert_eq!(lower_camel("source_ip_address"), "sourceIpAddress");
        assert_eq!(lower_camel("plain"), "plain");
        assert_eq!(lower_camel("GEO_LOCATION"), "geoLocation");
    }

    #[test]
    fn test_saturating_index() {
        assert_eq!(saturating_index(&Value::Long(i64::MAX)), i32::MAX);
        assert_eq!(saturating_index(&Value::Long(-5_000_000_000)), i32::MIN);
        assert_eq!(saturating_index(&Value::Double(1.9)), 1);
    }
}
