//! Run rules or single expressions against a JSON message

use serde_json::json;

use super::{json_to_message, message_to_json, value_to_json, CliError};
use crate::{
    EvaluationContext, FunctionRegistry, InterpreterConfig, Lexer, Parser, RuleInterpreter,
};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Rule source, or a single expression
    pub source: String,
    /// JSON message
    pub input: Option<String>,
    /// Interpreter settings; defaults when absent
    pub config: Option<InterpreterConfig>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Execution finished; evaluation errors are part of the output
    Success(serde_json::Value),
}

/// Whether the source holds rule blocks rather than a bare expression
fn is_rule_source(source: &str) -> bool {
    let trimmed = source.trim_start();
    trimmed.starts_with("rule ") || trimmed.starts_with("rule\"") || trimmed.starts_with("rule\n")
}

/// Execute a check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let registry = FunctionRegistry::with_builtins();
    let source = &options.source;
    let is_rules = is_rule_source(source);

    let mut parser = Parser::new(Lexer::new(source), &registry)?;

    if options.syntax_only {
        if is_rules {
            parser.parse_rules()?;
        } else {
            parser.parse()?;
        }
        return Ok(CheckResult::SyntaxValid);
    }

    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let message = json_to_message(serde_json::from_str(json_str)?)?;
    let config = options.config.clone().unwrap_or_default();

    let output = if is_rules {
        let rules = parser.parse_rules()?;
        let execution = RuleInterpreter::new(config).execute_all(&rules, message);
        json!({
            "matched": execution.matched_rules,
            "message": message_to_json(&execution.message),
            "streams": execution.message.streams().collect::<Vec<_>>(),
            "dropped": execution.message.filter_out(),
            "errors": execution.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "created_messages": execution.created_messages.iter().map(message_to_json).collect::<Vec<_>>(),
        })
    } else {
        let expr = parser.parse()?;
        let mut ctx = EvaluationContext::new(message);
        let value = expr.evaluate(&mut ctx);
        json!({
            "value": value_to_json(value),
            "errors": ctx.evaluation_errors().iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    };

    Ok(CheckResult::Success(output))
}
