// tests/integration_tests.rs

use std::time::Duration;

use pretty_assertions::assert_eq;

use pipeline_rules::{
    FunctionRegistry, InterpreterConfig, Message, Rule, RuleError, RuleInterpreter, Value,
};

fn rule(source: &str) -> Rule {
    pipeline_rules::parse_rule(source, &FunctionRegistry::with_builtins()).unwrap()
}

fn rules(source: &str) -> Vec<Rule> {
    pipeline_rules::parse_rules(source, &FunctionRegistry::with_builtins()).unwrap()
}

// ============================================================================
// Conditions
// ============================================================================

#[test]
fn test_matching_rule_runs_actions() {
    let rule = rule(
        r#"
        rule "mark slow"
        when
            to_long($message.took_ms) > 500
        then
            set_field("slow", true);
            set_field("took_s", to_double($message.took_ms) / 1000);
        end
        "#,
    );

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("took_ms", "750")]));

    assert!(execution.matched());
    assert!(execution.is_success());
    assert_eq!(execution.matched_rules, vec!["mark slow".to_string()]);
    assert_eq!(execution.message.get_field("slow"), Some(&Value::Boolean(true)));
    assert_eq!(execution.message.get_field("took_s"), Some(&Value::Double(0.75)));
}

#[test]
fn test_non_matching_rule_leaves_message_untouched() {
    let rule = rule(r#"rule "never" when has_field("absent") then drop_message(); end"#);
    let message = Message::with_fields([("present", "yes")]);

    let execution = RuleInterpreter::default().execute(&rule, message.clone());

    assert!(!execution.matched());
    assert!(execution.is_success());
    assert_eq!(execution.message, message);
}

#[test]
fn test_null_condition_does_not_match() {
    let rule = rule(r#"rule "flag" when $message.enabled then set_field("ran", true); end"#);

    let execution = RuleInterpreter::default().execute(&rule, Message::new());
    assert!(!execution.matched());
    assert!(!execution.message.has_field("ran"));

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("enabled", true)]));
    assert!(execution.matched());
}

#[test]
fn test_condition_fault_skips_actions() {
    let rule = rule(r#"rule "r" when to_long("1") / 0 > 1 then set_field("x", 1); end"#);

    let execution = RuleInterpreter::default().execute(&rule, Message::new());

    assert!(!execution.matched());
    assert!(!execution.message.has_field("x"));
    assert_eq!(execution.errors.len(), 1);
    assert_eq!(
        execution.message.get_field("gl2_processing_error"),
        Some(&Value::from(
            "For rule 'r': At 1:14 an exception was thrown: / by zero"
        ))
    );
}

#[test]
fn test_condition_type_fault_is_recorded_even_though_rule_does_not_match() {
    let rule = rule(r#"rule "numeric" when $message.s > 1 then set_field("x", 1); end"#);

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("s", "abc")]));

    assert!(!execution.matched());
    assert!(!execution.message.has_field("x"));
    assert_eq!(execution.errors.len(), 1);
    assert_eq!(execution.errors[0].error.cause, "expected long, got string");
    let field = execution.message.get_field("gl2_processing_error").unwrap().to_string();
    assert!(field.starts_with("For rule 'numeric': At 1:19 "), "{}", field);
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn test_variables_flow_between_statements() {
    let rule = rule(
        r#"
        rule "ports"
        when true
        then
            let port = to_long($message.port);
            let next = port + 1;
            set_field("next_port", next);
            set_field("label", concat("port-", to_string(next)));
        end
        "#,
    );

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("port", "8080")]));

    assert!(execution.is_success());
    assert_eq!(execution.message.get_field("next_port"), Some(&Value::Long(8081)));
    assert_eq!(execution.message.get_field("label"), Some(&Value::from("port-8081")));
}

#[test]
fn test_action_fault_stops_remaining_actions() {
    let rule = rule(
        r#"
        rule "partial"
        when true
        then
            set_field("a", 1);
            set_field("b", to_long("1") / 0);
            set_field("c", 3);
        end
        "#,
    );

    let execution = RuleInterpreter::default().execute(&rule, Message::new());

    assert!(execution.matched());
    assert!(!execution.is_success());
    assert_eq!(execution.message.get_field("a"), Some(&Value::Long(1)));
    assert!(!execution.message.has_field("b"));
    assert!(!execution.message.has_field("c"));

    let RuleError { rule, error } = &execution.errors[0];
    assert_eq!(rule, "partial");
    assert_eq!(error.function.as_deref(), Some("set_field"));
    assert_eq!(error.cause, "/ by zero");
    assert_eq!((error.line, error.column), (6, 12));
}

#[test]
fn test_processing_errors_are_appended() {
    let rule = rule(r#"rule "bad" when true then set_field("x", to_long("1") / 0); end"#);
    let message = Message::with_fields([("gl2_processing_error", "earlier failure")]);

    let execution = RuleInterpreter::default().execute(&rule, message);

    let field = execution.message.get_field("gl2_processing_error").unwrap().to_string();
    assert!(field.starts_with("earlier failure,For rule 'bad': "), "{}", field);
    assert!(field.ends_with("/ by zero"), "{}", field);
}

#[test]
fn test_processing_errors_join_without_space() {
    let rules = rules(
        r#"
        rule "first" when true then set_field("x", to_long("1") / 0); end
        rule "second" when true then set_field("y", to_long("1") % 0); end
        "#,
    );

    let execution = RuleInterpreter::default().execute_all(&rules, Message::new());

    let field = execution.message.get_field("gl2_processing_error").unwrap().to_string();
    let parts: Vec<&str> = field.split(",For rule ").collect();
    assert_eq!(parts.len(), 2, "{}", field);
    assert!(parts[0].starts_with("For rule 'first': "), "{}", field);
    assert!(parts[1].starts_with("'second': "), "{}", field);
}

#[test]
fn test_processing_error_recording_can_be_disabled() {
    let config = InterpreterConfig {
        record_processing_errors: false,
        ..Default::default()
    };
    let rule = rule(r#"rule "bad" when true then set_field("x", to_long("1") / 0); end"#);

    let execution = RuleInterpreter::new(config).execute(&rule, Message::new());

    assert_eq!(execution.errors.len(), 1);
    assert_eq!(execution.message.field_count(), 0);
}

#[test]
fn test_custom_processing_error_field() {
    let config = InterpreterConfig {
        processing_error_field: "rule_errors".to_string(),
        ..Default::default()
    };
    let rule = rule(r#"rule "bad" when 1 / 0 == 1 then end"#);

    let execution = RuleInterpreter::new(config).execute(&rule, Message::new());

    assert!(execution.message.has_field("rule_errors"));
    assert!(!execution.message.has_field("gl2_processing_error"));
}

#[test]
fn test_message_actions() {
    let rule = rule(
        r#"
        rule "route"
        when has_field("level") && to_long($message.level) <= 3
        then
            route_to_stream("alerts");
            remove_from_stream("default");
            remove_field("debug");
            create_message("escalated", $message.source);
        end
        "#,
    );
    let mut message = Message::with_fields([("level", "2"), ("debug", "x"), ("source", "fw-01")]);
    message.add_stream("default");

    let execution = RuleInterpreter::default().execute(&rule, message);

    assert!(execution.is_success());
    assert!(execution.message.in_stream("alerts"));
    assert!(!execution.message.in_stream("default"));
    assert!(!execution.message.has_field("debug"));
    assert_eq!(execution.created_messages.len(), 1);
    assert_eq!(
        execution.created_messages[0].get_field("source"),
        Some(&Value::from("fw-01"))
    );
}

#[test]
fn test_drop_message() {
    let rule = rule(r#"rule "drop noise" when $message.level == "debug" then drop_message(); end"#);

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("level", "debug")]));
    assert!(execution.message.filter_out());

    let execution = RuleInterpreter::default().execute(&rule, Message::with_fields([("level", "info")]));
    assert!(!execution.message.filter_out());
}

// ============================================================================
// Multiple Rules
// ============================================================================

#[test]
fn test_rules_run_in_order_over_the_same_message() {
    let rules = rules(
        r#"
        rule "parse" when has_field("raw") then set_field("n", to_long($message.raw)); end
        rule "double" when has_field("n") then set_field("n2", to_long($message.n) * 2); end
        rule "skip" when false then set_field("never", true); end
        "#,
    );

    let execution = RuleInterpreter::default().execute_all(&rules, Message::with_fields([("raw", "21")]));

    assert_eq!(
        execution.matched_rules,
        vec!["parse".to_string(), "double".to_string()]
    );
    assert_eq!(execution.message.get_field("n2"), Some(&Value::Long(42)));
    assert!(!execution.message.has_field("never"));
}

#[test]
fn test_failing_rule_does_not_stop_later_rules() {
    let rules = rules(
        r#"
        rule "broken" when true then set_field("x", to_long("1") % 0); end
        rule "fine" when true then set_field("y", 2); end
        "#,
    );

    let execution = RuleInterpreter::default().execute_all(&rules, Message::new());

    assert_eq!(execution.errors.len(), 1);
    assert_eq!(execution.errors[0].rule, "broken");
    assert_eq!(execution.message.get_field("y"), Some(&Value::Long(2)));
}

#[test]
fn test_interpreter_config_from_json() {
    let config = InterpreterConfig::from_str(
        r#"{"deprecation_warning_interval": 1500, "processing_error_field": "errs"}"#,
    )
    .unwrap();
    assert_eq!(config.deprecation_warning_interval, Duration::from_millis(1500));

    let interpreter = RuleInterpreter::new(config);
    let rule = rule(r#"rule "bad" when true then set_field("x", to_long("1") / 0); end"#);
    let execution = interpreter.execute(&rule, Message::new());
    assert!(execution.message.has_field("errs"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_interpreter_shared_between_threads() {
    let rule = rule(r#"rule "tag" when to_long($message.n) % 2 == 0 then set_field("even", true); end"#);
    let interpreter = RuleInterpreter::default();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16i64)
            .map(|n| {
                let (rule, interpreter) = (&rule, &interpreter);
                scope.spawn(move || interpreter.execute(rule, Message::with_fields([("n", Value::Long(n))])))
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            let execution = handle.join().unwrap();
            assert_eq!(execution.matched(), n % 2 == 0);
            assert_eq!(execution.message.has_field("even"), n % 2 == 0);
        }
    });
}
