use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

use super::{FunctionRegistry, NativeFunction};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::types::ValueType;
use crate::value::{Period, Value};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("now", ValueType::DateTime)
            .param(ParameterDescriptor::optional("timezone", ValueType::String).transform(parse_offset))
            .describe("Current time, in UTC unless an offset such as \"+02:00\" is given")
            .rule_builder("Current time", "date"),
        now,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("parse_date", ValueType::DateTime)
            .param(ParameterDescriptor::required("value", ValueType::String))
            .param(ParameterDescriptor::required("pattern", ValueType::String))
            .param(ParameterDescriptor::optional("timezone", ValueType::String).transform(parse_offset))
            .pure()
            .describe("Parses a date with a strftime pattern; patterns without an offset use the timezone")
            .rule_builder("Parse date", "date"),
        parse_date,
    ));

    for name in ["years", "months", "weeks", "days", "hours", "minutes", "seconds", "millis"] {
        registry.register(NativeFunction::new(
            FunctionDescriptor::new(name, ValueType::Period)
                .param(ParameterDescriptor::required("value", ValueType::Long))
                .pure()
                .describe(format!("Period of the given number of {}", name))
                .rule_builder(format!("Period in {}", name), "date"),
            period,
        ));
    }
}

/// Rejects malformed offsets when the argument is bound.
fn parse_offset(value: Value) -> Result<Value, EvalError> {
    match &value {
        Value::String(s) => offset(s).map(|_| value.clone()),
        _ => Ok(value),
    }
}

fn offset(text: &str) -> Result<FixedOffset, EvalError> {
    match text {
        "UTC" | "utc" | "Z" => Ok(utc()),
        other => other
            .parse::<FixedOffset>()
            .map_err(|err| EvalError::IllegalArgument(format!("invalid timezone '{}': {}", other, err))),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn timezone(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<FixedOffset, EvalError> {
    match args.optional("timezone", ctx)? {
        Value::String(s) => offset(&s),
        _ => Ok(utc()),
    }
}

fn now(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let tz = timezone(args, ctx)?;
    Ok(Value::DateTime(Utc::now().with_timezone(&tz)))
}

fn parse_date(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let value = args.required_str("value", ctx)?;
    let pattern = args.required_str("pattern", ctx)?;
    let tz = timezone(args, ctx)?;

    if let Ok(dt) = DateTime::parse_from_str(&value, &pattern) {
        return Ok(Value::DateTime(dt));
    }
    let naive = NaiveDateTime::parse_from_str(&value, &pattern)
        .or_else(|_| NaiveDate::parse_from_str(&value, &pattern).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|err| {
            EvalError::IllegalArgument(format!(
                "cannot parse '{}' with pattern '{}': {}",
                value, pattern, err
            ))
        })?;
    naive
        .and_local_timezone(tz)
        .single()
        .map(Value::DateTime)
        .ok_or_else(|| EvalError::IllegalArgument(format!("'{}' is not a valid local time", value)))
}

fn period(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let unit = args.descriptor().name.as_str();
    let amount = match args.required("value", ctx)? {
        Value::Long(n) => n,
        other => return Err(EvalError::type_mismatch(ValueType::Long, other.value_type())),
    };
    let amount = i32::try_from(amount)
        .map_err(|_| EvalError::IllegalArgument(format!("{} {} is out of range", amount, unit)))?;
    let period = match unit {
        "years" => Period::years(amount),
        "months" => Period::months(amount),
        "weeks" => Period::weeks(amount),
        "days" => Period::days(amount),
        "hours" => Period::hours(amount),
        "minutes" => Period::minutes(amount),
        "seconds" => Period::seconds(amount),
        _ => Period::millis(amount),
    };
    Ok(Value::Period(period))
}
