use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::{FunctionRegistry, NativeFunction};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::types::ValueType;
use crate::value::Value;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("to_string", ValueType::String)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .param(ParameterDescriptor::optional("default", ValueType::String).default_value(""))
            .pure()
            .describe("Converts a value to its string representation")
            .rule_builder("Convert to string", "conversion"),
        to_string,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("to_long", ValueType::Long)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .param(ParameterDescriptor::optional("default", ValueType::Long).default_value(0i64))
            .pure()
            .describe("Converts a value to a long, truncating fractions")
            .rule_builder("Convert to long", "conversion"),
        to_long,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("to_double", ValueType::Double)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .param(ParameterDescriptor::optional("default", ValueType::Double).default_value(0.0))
            .pure()
            .describe("Converts a value to a double")
            .rule_builder("Convert to double", "conversion"),
        to_double,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("to_bool", ValueType::Boolean)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .pure()
            .describe("Converts a value to a boolean; only true and \"true\" are true")
            .rule_builder("Convert to boolean", "conversion"),
        to_bool,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("is_null", ValueType::Boolean)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .pure()
            .describe("Checks whether a value is null"),
        is_null,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("is_not_null", ValueType::Boolean)
            .param(ParameterDescriptor::required("value", ValueType::Any))
            .pure()
            .describe("Checks whether a value is not null"),
        is_not_null,
    ));
}

fn to_string(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    match args.value("value", ctx)? {
        Some(Value::String(s)) => Ok(Value::String(s)),
        Some(value) => Ok(Value::String(value.to_string())),
        None => args.optional("default", ctx),
    }
}

/// Parses a decimal string and truncates it toward zero.
fn parse_long(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    Decimal::from_str(text).ok()?.trunc().to_i64()
}

fn to_long(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let converted = match args.value("value", ctx)? {
        Some(Value::Long(n)) => Some(n),
        Some(Value::Double(n)) if n.is_finite() => Some(n as i64),
        Some(Value::String(s)) => parse_long(&s),
        Some(Value::DateTime(dt)) => Some(dt.timestamp_millis()),
        _ => None,
    };
    match converted {
        Some(n) => Ok(Value::Long(n)),
        None => args.optional("default", ctx),
    }
}

fn to_double(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let converted = match args.value("value", ctx)? {
        Some(Value::Double(n)) => Some(n),
        Some(Value::Long(n)) => Some(n as f64),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match converted {
        Some(n) => Ok(Value::Double(n)),
        None => args.optional("default", ctx),
    }
}

fn to_bool(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let b = match args.value("value", ctx)? {
        Some(Value::Boolean(b)) => b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };
    Ok(Value::Boolean(b))
}

fn is_null(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    Ok(Value::Boolean(args.value("value", ctx)?.is_none()))
}

fn is_not_null(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    Ok(Value::Boolean(args.value("value", ctx)?.is_some()))
}
