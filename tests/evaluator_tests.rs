// tests/evaluator_tests.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use pipeline_rules::ast::{BinaryOp, Expr};
use pipeline_rules::lexer::{Lexer, Position};
use pipeline_rules::{
    DeprecationLog, EvalError, EvalErrorRecord, EvaluationContext, FunctionDescriptor, FunctionRegistry,
    Message, NativeFunction, Parser, Period, PropertyAccess, PropertyError, Rule, RuleInterpreter,
    SyntaxErrorKind, Value, ValueType,
};

const DATE: &str = r#"parse_date("2021-01-31 10:00:00", "%Y-%m-%d %H:%M:%S")"#;

fn registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::with_builtins();
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("explode", ValueType::Long),
        |_, _| Err(EvalError::Runtime("boom".to_string())),
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("liar", ValueType::Long),
        |_, _| Ok(Value::from("not a number")),
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("old_check", ValueType::Boolean).deprecated(),
        |_, _| Ok(Value::Boolean(true)),
    ));
    registry
}

fn parse(source: &str) -> Expr {
    pipeline_rules::parse_expression(source, &registry()).unwrap()
}

fn eval_in(source: &str, message: Message) -> (Value, EvaluationContext) {
    let expr = parse(source);
    let mut ctx = EvaluationContext::new(message);
    let value = expr.evaluate(&mut ctx);
    (value, ctx)
}

fn eval(source: &str) -> Value {
    let (value, ctx) = eval_in(source, Message::new());
    assert!(
        !ctx.has_evaluation_errors(),
        "Unexpected errors for {}: {:?}",
        source,
        ctx.evaluation_errors()
    );
    value
}

/// Evaluates an expression that must fail with exactly one recorded error.
fn eval_err(source: &str) -> EvalErrorRecord {
    let (value, ctx) = eval_in(source, Message::new());
    assert_eq!(value, Value::Null, "Failed for input: {}", source);
    assert_eq!(ctx.evaluation_errors().len(), 1, "Failed for input: {}", source);
    ctx.evaluation_errors()[0].clone()
}

fn eval_with_vars(source: &str, vars: Vec<(&str, ValueType, Value)>) -> (Value, EvaluationContext) {
    let registry = registry();
    let mut parser = Parser::new(Lexer::new(source), &registry).unwrap();
    for (name, ty, _) in &vars {
        parser.declare(*name, *ty);
    }
    let expr = parser.parse().unwrap();

    let mut ctx = EvaluationContext::empty();
    for (name, ty, value) in vars {
        ctx.define(name, ty, value);
    }
    let value = expr.evaluate(&mut ctx);
    (value, ctx)
}

fn utc(y: i32, m: u32, d: u32, h: u32) -> Value {
    Value::DateTime(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().fixed_offset())
}

fn record(line: usize, column: usize, function: Option<&str>, cause: &str) -> EvalErrorRecord {
    EvalErrorRecord {
        line,
        column,
        function: function.map(str::to_string),
        cause: cause.to_string(),
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_integral_arithmetic() {
    let test_cases = vec![
        ("2 + 3 * 4", 14),
        ("(2 + 3) * 4", 20),
        ("10 - 4 - 3", 3),
        ("7 / 2", 3),
        ("7 % 2", 1),
        ("-7 / 2", -3),
        ("-7 % 2", -1),
        ("7 % -2", 1),
        ("+5", 5),
        ("-(5)", -5),
        ("--5", 5),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Value::Long(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_long_arithmetic_wraps() {
    assert_eq!(eval("9223372036854775807 + 1"), Value::Long(i64::MIN));
    assert_eq!(eval("-9223372036854775807 - 2"), Value::Long(i64::MAX));
}

#[test]
fn test_floating_arithmetic() {
    let test_cases = vec![
        ("7.0 / 2", 3.5),
        ("7 / 2.0", 3.5),
        ("1.5 + 1", 2.5),
        ("5.5 % 2", 1.5),
        ("-2.5", -2.5),
        ("0.1 * 10", 1.0),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Value::Double(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_floating_division_by_zero_is_ieee() {
    assert_eq!(eval("1.0 / 0"), Value::Double(f64::INFINITY));
    assert_eq!(eval("-1.0 / 0"), Value::Double(f64::NEG_INFINITY));
    assert_eq!(eval("0.0 / 0"), Value::Double(f64::NAN));
}

#[test]
fn test_long_division_by_zero_faults() {
    assert_eq!(eval_err("1 / 0"), record(1, 0, None, "/ by zero"));
    assert_eq!(eval_err("5 + 1 % 0"), record(1, 0, None, "/ by zero"));
}

#[test]
fn test_string_addition() {
    assert_eq!(eval(r#""log" + "line""#), Value::from("logline"));
    assert_eq!(eval(r#""a" - "b""#), Value::Null);
}

// ============================================================================
// Comparison and Equality
// ============================================================================

#[test]
fn test_comparisons() {
    let test_cases = vec![
        ("3 > 2", true),
        ("2 > 3", false),
        ("1 < 1", false),
        ("1 <= 1", true),
        ("2.5 >= 2", true),
        ("2 < 2.5", true),
        ("-1 < 0", true),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Value::Boolean(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_equality() {
    let test_cases = vec![
        ("1 == 1", true),
        ("1 != 2", true),
        ("1 == 1.0", false),
        (r#""a" == "a""#, true),
        (r#""a" != "a""#, false),
        ("[1, 2] == [1, 2]", true),
        ("{a: 1} == {a: 1}", true),
        ("true == false", false),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Value::Boolean(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_null_left_operand_is_never_equal() {
    let message = Message::with_fields([("a", Value::Long(2))]);
    let test_cases = vec![
        ("$message.missing == 1", false),
        ("$message.missing != 1", false),
        ("$message.missing == $message.other", false),
        ("$message.a != $message.missing", true),
        ("$message.a == 2", true),
    ];

    for (input, expected) in test_cases {
        let (value, ctx) = eval_in(input, message.clone());
        assert_eq!(value, Value::Boolean(expected), "Failed for input: {}", input);
        assert!(!ctx.has_evaluation_errors());
    }
}

#[test]
fn test_comparison_with_mismatched_runtime_types_faults() {
    let message = Message::with_fields([("n", Value::from("x"))]);
    let (value, ctx) = eval_in("$message.n > 1", message);
    assert_eq!(value, Value::Null);
    assert_eq!(
        ctx.evaluation_errors(),
        &[record(1, 0, None, "expected long, got string")]
    );
}

// ============================================================================
// Logical Operators
// ============================================================================

#[test]
fn test_logical_operators() {
    let test_cases = vec![
        ("true && true", true),
        ("true and false", false),
        ("false || true", true),
        ("false OR false", false),
        ("!true", false),
        ("not (1 > 2)", true),
        ("!$message.flag", true),
        ("$message.flag || true", true),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input), Value::Boolean(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_short_circuit() {
    let vars = || vec![("n", ValueType::Any, Value::from("x"))];

    let (value, ctx) = eval_with_vars("false && n > 1", vars());
    assert_eq!(value, Value::Boolean(false));
    assert!(!ctx.has_evaluation_errors());

    let (value, ctx) = eval_with_vars("true || n > 1", vars());
    assert_eq!(value, Value::Boolean(true));
    assert!(!ctx.has_evaluation_errors());

    let (value, ctx) = eval_with_vars("true && n > 1", vars());
    assert_eq!(value, Value::Null);
    assert_eq!(ctx.evaluation_errors().len(), 1);
}

#[test]
fn test_not_on_non_boolean_runtime_value() {
    let (value, ctx) = eval_with_vars("!n", vec![("n", ValueType::Any, Value::Long(1))]);
    assert_eq!(value, Value::Null);
    assert_eq!(
        ctx.evaluation_errors(),
        &[record(1, 0, None, "expected boolean, got long")]
    );
}

#[test]
fn test_sign_on_non_numeric_runtime_value() {
    let (value, ctx) = eval_with_vars("[-v]", vec![("v", ValueType::Any, Value::from("x"))]);
    assert_eq!(value, Value::Null);
    assert_eq!(
        ctx.evaluation_errors(),
        &[record(1, 1, None, "unary '-' is not supported for string")]
    );
}

// ============================================================================
// String Concatenation
// ============================================================================

#[test]
fn test_literal_concatenation() {
    assert_eq!(eval(r#""a" "b" 'c'"#), Value::from("abc"));
}

#[test]
fn test_concat_requires_literal_operands() {
    let position = Position::new(1, 0);
    let err = Expr::binary(
        BinaryOp::Concat,
        Some(Expr::string("a", position)),
        Some(Expr::var_ref("x", ValueType::String, position)),
        position,
    )
    .unwrap_err();
    assert!(matches!(err.kind, SyntaxErrorKind::InvalidOperation { .. }));
}

#[test]
fn test_missing_operand() {
    let position = Position::new(3, 7);
    let err = Expr::binary(BinaryOp::Add, None, Some(Expr::long(1, position)), position).unwrap_err();
    assert_eq!(
        err.kind,
        SyntaxErrorKind::MissingOperand {
            op: "+".to_string(),
            side: "left",
        }
    );
    assert_eq!((err.line(), err.column()), (3, 7));
}

// ============================================================================
// Dates and Periods
// ============================================================================

#[test]
fn test_date_plus_period_respects_month_length() {
    assert_eq!(eval(&format!("{} + months(1)", DATE)), utc(2021, 2, 28, 10));
}

#[test]
fn test_date_period_addition_commutes() {
    for period in ["days(1)", "months(1)", "hours(-30)", "years(1) + weeks(2)"] {
        let left = eval(&format!("{} + ({})", DATE, period));
        let right = eval(&format!("({}) + {}", period, DATE));
        assert_eq!(left, right, "Failed for period: {}", period);
    }
}

#[test]
fn test_date_minus_period() {
    assert_eq!(
        eval(r#"parse_date("2021-03-01", "%Y-%m-%d") - days(1)"#),
        utc(2021, 2, 28, 0)
    );
}

#[test]
fn test_date_difference_is_non_negative() {
    let earlier = r#"parse_date("2021-01-30 09:00:00", "%Y-%m-%d %H:%M:%S")"#;
    let forward = eval(&format!("{} - {}", DATE, earlier));
    let backward = eval(&format!("{} - {}", earlier, DATE));

    assert_eq!(forward, Value::Duration(TimeDelta::hours(25)));
    assert_eq!(forward, backward);
    assert_eq!(forward.to_string(), "PT90000S");
}

#[test]
fn test_adding_two_dates_is_null() {
    let date = utc(2021, 1, 1, 0);
    let (value, ctx) = eval_with_vars(
        "a + b",
        vec![
            ("a", ValueType::DateTime, date.clone()),
            ("b", ValueType::Period, date),
        ],
    );
    assert_eq!(value, Value::Null);
    assert!(!ctx.has_evaluation_errors());
}

#[test]
fn test_period_arithmetic() {
    let sum = eval("days(1) + hours(2)");
    assert_eq!(
        sum,
        Value::Period(Period {
            days: 1,
            hours: 2,
            ..Default::default()
        })
    );
    assert_eq!(sum.to_string(), "P1DT2H");
    assert_eq!(eval("weeks(2) - weeks(2)").to_string(), "PT0S");
}

#[test]
fn test_date_comparison() {
    assert_eq!(
        eval(&format!(r#"{} < parse_date("2022-01-01", "%Y-%m-%d")"#, DATE)),
        Value::Boolean(true)
    );
    assert_eq!(eval(&format!("{} >= {}", DATE, DATE)), Value::Boolean(true));
}

// ============================================================================
// Indexed Access
// ============================================================================

#[test]
fn test_list_index() {
    assert_eq!(eval("[10, 20, 30][1]"), Value::Long(20));
    assert_eq!(eval("[10, 20, 30][0]"), Value::Long(10));
    assert_eq!(eval("[10, 20, 30][1.7]"), Value::Long(20));
}

#[test]
fn test_list_index_out_of_range_faults() {
    assert_eq!(
        eval_err("[10, 20, 30][99]"),
        record(1, 0, None, "index 99 out of bounds for length 3")
    );
    assert_eq!(
        eval_err("[10][-1]"),
        record(1, 0, None, "index -1 out of bounds for length 1")
    );
    assert_eq!(
        eval_err("[10][9999999999]"),
        record(1, 0, None, "index 2147483647 out of bounds for length 1")
    );
}

#[test]
fn test_map_index() {
    assert_eq!(eval(r#"{x: 1}["x"]"#), Value::Long(1));
    assert_eq!(eval(r#"{x: 1}["y"]"#), Value::Null);
}

#[test]
fn test_null_indexable_or_index() {
    assert_eq!(eval("$message.missing[0]"), Value::Null);
    assert_eq!(eval("[1, 2][$message.missing]"), Value::Null);
}

#[test]
fn test_map_indexed_with_long_faults() {
    let mut map = IndexMap::new();
    map.insert("a".to_string(), Value::Long(1));
    let (value, ctx) = eval_with_vars("m[1]", vec![("m", ValueType::Any, Value::Map(map))]);
    assert_eq!(value, Value::Null);
    assert_eq!(
        ctx.evaluation_errors(),
        &[record(1, 0, None, "map cannot be indexed with long")]
    );
}

// ============================================================================
// Field Access
// ============================================================================

#[derive(Debug)]
struct Location;

impl PropertyAccess for Location {
    fn property(&self, name: &str) -> Result<Option<Value>, PropertyError> {
        match name {
            "geoLocation" => Ok(Some(Value::from("berlin"))),
            "broken" => Err(PropertyError::Access {
                name: name.to_string(),
                message: "getter failed".to_string(),
            }),
            _ => Ok(None),
        }
    }
}

fn geo_message() -> Message {
    let mut geo = IndexMap::new();
    geo.insert("geo_location".to_string(), Value::from("paris"));
    Message::with_fields([
        ("geo", Value::Map(geo)),
        ("location", Value::Object(Arc::new(Location))),
        ("count", Value::Long(3)),
    ])
}

#[test]
fn test_field_access() {
    let test_cases = vec![
        ("$message.geo.geo_location", Value::from("paris")),
        ("$message.location.geo_location", Value::from("berlin")),
        ("$message.location.geoLocation", Value::from("berlin")),
        ("$message.location.unknown", Value::Null),
        ("$message.location.broken", Value::Null),
        ("$message.count.anything", Value::Null),
        ("$message.missing.anything", Value::Null),
    ];

    for (input, expected) in test_cases {
        let (value, ctx) = eval_in(input, geo_message());
        assert_eq!(value, expected, "Failed for input: {}", input);
        assert!(!ctx.has_evaluation_errors(), "Failed for input: {}", input);
    }
}

#[test]
fn test_message_reference() {
    let message = Message::with_fields([("source", "fw-01"), ("with space", "x")]);
    let (value, _) = eval_in("$message", message.clone());
    assert_eq!(value, message.to_value());

    let (value, _) = eval_in(r#"$message["with space"]"#, message.clone());
    assert_eq!(value, Value::from("x"));

    let (value, _) = eval_in(r#"$message["sour" "ce"]"#, message);
    assert_eq!(value, Value::from("fw-01"));
}

#[test]
fn test_unbound_variable_is_null() {
    let registry = registry();
    let mut parser = Parser::new(Lexer::new("x"), &registry).unwrap();
    parser.declare("x", ValueType::Long);
    let expr = parser.parse().unwrap();

    let mut ctx = EvaluationContext::empty();
    assert_eq!(expr.evaluate(&mut ctx), Value::Null);
    assert!(!ctx.has_evaluation_errors());
}

#[test]
fn test_composite_literals() {
    assert_eq!(
        eval(r#"[1, "a", [true]]"#),
        Value::List(vec![
            Value::Long(1),
            Value::from("a"),
            Value::List(vec![Value::Boolean(true)])
        ])
    );
    let mut expected = IndexMap::new();
    expected.insert("b".to_string(), Value::Long(2));
    expected.insert("a".to_string(), Value::Long(3));
    assert_eq!(eval("{b: 1 + 1, a: 3}"), Value::Map(expected));
}

// ============================================================================
// Constant Expressions
// ============================================================================

#[test]
fn test_constness() {
    let test_cases = vec![
        ("1 + 2", true),
        ("\"a\" \"b\"", true),
        ("[1, {a: \"b\"}]", true),
        ("{a: 1}[\"a\"]", true),
        ("-(4 % 3)", true),
        ("$message", false),
        ("$message.a", false),
        ("to_long(\"1\")", false),
        ("1 + to_long(\"1\")", false),
        ("[1, $message.a]", false),
        ("{a: 1}.a", false),
    ];

    for (input, expected) in test_cases {
        assert_eq!(parse(input).is_constant(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_variable_reference_is_not_constant() {
    assert!(!Expr::var_ref("x", ValueType::Long, Position::default()).is_constant());
}

#[test]
fn test_constant_evaluation_matches_normal_evaluation() {
    let sources = [
        "1 + 2 * 3",
        "7 / 2",
        "\"a\" \"b\"",
        "[1, 2.5, true]",
        "{a: [1], b: \"c\"}",
        "{a: 1}[\"a\"]",
        "-(4 % 3)",
        "1 < 2 && !false",
    ];

    for source in sources {
        let expr = parse(source);
        assert!(expr.is_constant(), "Failed for input: {}", source);
        let folded = expr.evaluate_constant().unwrap();
        let evaluated = expr.evaluate_unsafe(&mut EvaluationContext::empty()).unwrap();
        assert_eq!(folded, evaluated, "Failed for input: {}", source);
    }
}

// ============================================================================
// Function Faults
// ============================================================================

#[test]
fn test_function_fault_is_recorded_once() {
    let message = Message::with_fields([("a", "b")]);
    let (value, ctx) = eval_in("explode()", message.clone());

    assert_eq!(value, Value::Null);
    assert_eq!(ctx.evaluation_errors(), &[record(1, 0, Some("explode"), "boom")]);
    assert_eq!(ctx.current_message(), &message);
}

#[test]
fn test_function_fault_keeps_call_site_position() {
    assert_eq!(eval_err("1 + explode()"), record(1, 4, Some("explode"), "boom"));
}

#[test]
fn test_nested_function_fault_is_not_wrapped_again() {
    assert_eq!(eval_err("to_string(explode())"), record(1, 10, Some("explode"), "boom"));
}

#[test]
fn test_return_type_is_checked() {
    assert_eq!(
        eval_err("liar()"),
        record(1, 0, Some("liar"), "expected long, got string")
    );
}

#[test]
fn test_error_record_display() {
    assert_eq!(
        record(1, 4, Some("explode"), "boom").to_string(),
        "In call to function 'explode' at 1:4 an exception was thrown: boom"
    );
    assert_eq!(
        eval_err("1 / 0").to_string(),
        "At 1:0 an exception was thrown: / by zero"
    );
}

#[test]
fn test_evaluate_unsafe_returns_located_fault() {
    let expr = parse("1 + explode()");
    let err = expr.evaluate_unsafe(&mut EvaluationContext::empty()).unwrap_err();
    assert_eq!(err.location(), Some((Position::new(1, 4), Some("explode"))));
    assert_eq!(err.root_cause(), &EvalError::Runtime("boom".to_string()));
}

#[test]
fn test_deprecated_function_warns_once_per_interval() {
    let log = Arc::new(DeprecationLog::new(Duration::from_secs(3600)));
    let expr = parse("old_check()");

    for _ in 0..3 {
        let mut ctx = EvaluationContext::empty().with_deprecation_log(Arc::clone(&log));
        assert_eq!(expr.evaluate(&mut ctx), Value::Boolean(true));
    }
    // already reported by the first evaluation
    assert!(!log.warn("old_check", None));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_trees_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Expr>();
    assert_send_sync::<Rule>();
    assert_send_sync::<RuleInterpreter>();
    assert_send_sync::<FunctionRegistry>();
}

#[test]
fn test_concurrent_evaluation() {
    let expr = parse(r#"to_long($message.n) * 2 + to_long([0, 1][to_long($message.n) % 2])"#);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8i64)
            .map(|n| {
                let expr = &expr;
                scope.spawn(move || {
                    let mut ctx = EvaluationContext::new(Message::with_fields([("n", Value::Long(n))]));
                    let value = expr.evaluate(&mut ctx);
                    (value, ctx.has_evaluation_errors())
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            let n = n as i64;
            let (value, failed) = handle.join().unwrap();
            assert!(!failed);
            assert_eq!(value, Value::Long(n * 2 + n % 2));
        }
    });
}
