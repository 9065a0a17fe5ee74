//! Interpreter for log processing rules.
//!
//! ```
//! use pipeline_rules::{FunctionRegistry, Message, RuleInterpreter, Value};
//!
//! let registry = FunctionRegistry::with_builtins();
//! let rule = pipeline_rules::parse_rule(
//!     r#"rule "mark slow" when to_long($message.took_ms) > 500 then set_field("slow", true); end"#,
//!     &registry,
//! )
//! .unwrap();
//!
//! let message = Message::with_fields([("took_ms", Value::from("750"))]);
//! let execution = RuleInterpreter::default().execute(&rule, message);
//!
//! assert!(execution.matched());
//! assert_eq!(execution.message.get_field("slow"), Some(&Value::Boolean(true)));
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod deprecation;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod message;
pub mod parser;
pub mod types;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinaryOp, Expr, ExprKind, Rule, Statement, Token, UnaryOp};
pub use config::{ConfigError, InterpreterConfig};
pub use context::{EvalErrorRecord, EvaluationContext};
pub use deprecation::DeprecationLog;
pub use error::{EvalError, PropertyError, SyntaxError, SyntaxErrorKind};
pub use function::{Function, FunctionArgs, FunctionCall, FunctionDescriptor, ParameterDescriptor};
pub use functions::{FunctionRegistry, NativeFunction};
pub use interpreter::{RuleError, RuleExecution, RuleInterpreter};
pub use lexer::{LexError, Lexer, Position};
pub use message::Message;
pub use parser::{ParseError, Parser};
pub use types::ValueType;
pub use value::{Period, PropertyAccess, TypedValue, Value};

/// Parses a single rule.
pub fn parse_rule(source: &str, functions: &FunctionRegistry) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(Lexer::new(source), functions)?;
    let rule = parser.parse_rule()?;
    parser.finish()?;
    Ok(rule)
}

/// Parses every rule in `source`.
pub fn parse_rules(source: &str, functions: &FunctionRegistry) -> Result<Vec<Rule>, ParseError> {
    Parser::new(Lexer::new(source), functions)?.parse_rules()
}

/// Parses a standalone expression.
pub fn parse_expression(source: &str, functions: &FunctionRegistry) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(source), functions)?.parse()
}
