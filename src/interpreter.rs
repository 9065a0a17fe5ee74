//! Rule execution over a single message.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{Rule, Statement};
use crate::config::InterpreterConfig;
use crate::context::{EvalErrorRecord, EvaluationContext};
use crate::deprecation::DeprecationLog;
use crate::message::Message;
use crate::value::Value;

impl Statement {
    /// Executes the statement. Faults are recorded into `ctx`.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> Value {
        match self {
            Statement::VarAssign { name, value } => {
                let result = value.evaluate(ctx);
                ctx.define(name.clone(), value.ty(), result);
                Value::Null
            }
            Statement::Function(call) => call.evaluate(ctx),
        }
    }
}

/// Failure of one rule, as reported to callers and on the message.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub rule: String,
    pub error: EvalErrorRecord,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "For rule '{}': {}", self.rule, self.error)
    }
}

/// Outcome of running rules over a message.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleExecution {
    /// The message after all actions ran
    pub message: Message,
    /// Names of the rules whose condition held, in execution order
    pub matched_rules: Vec<String>,
    pub errors: Vec<RuleError>,
    /// Messages created by `create_message`, to be fed back into processing
    pub created_messages: Vec<Message>,
}

impl RuleExecution {
    fn new(message: Message) -> Self {
        RuleExecution {
            message,
            matched_rules: Vec::new(),
            errors: Vec::new(),
            created_messages: Vec::new(),
        }
    }

    pub fn matched(&self) -> bool {
        !self.matched_rules.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs parsed rules against messages.
///
/// The interpreter holds no per-message state and can be shared between
/// worker threads; every run gets its own [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct RuleInterpreter {
    config: InterpreterConfig,
    deprecations: Arc<DeprecationLog>,
}

impl Default for RuleInterpreter {
    fn default() -> Self {
        RuleInterpreter::new(InterpreterConfig::default())
    }
}

impl RuleInterpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let deprecations = Arc::new(DeprecationLog::new(config.deprecation_warning_interval));
        RuleInterpreter { config, deprecations }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Evaluates the rule's condition and, when it holds, its actions in order.
    ///
    /// A fault in the condition skips the actions. A fault in an action stops
    /// the remaining actions; changes made by earlier actions are kept.
    pub fn execute(&self, rule: &Rule, message: Message) -> RuleExecution {
        let mut execution = RuleExecution::new(message);
        self.run(rule, &mut execution);
        execution
    }

    /// Runs `rules` one after the other over the same message.
    pub fn execute_all(&self, rules: &[Rule], message: Message) -> RuleExecution {
        let mut execution = RuleExecution::new(message);
        for rule in rules {
            self.run(rule, &mut execution);
        }
        execution
    }

    #[tracing::instrument(skip_all, fields(rule = %rule.name))]
    fn run(&self, rule: &Rule, execution: &mut RuleExecution) {
        let message = std::mem::take(&mut execution.message);
        let mut ctx = EvaluationContext::new(message)
            .with_rule(rule.name.clone())
            .with_deprecation_log(Arc::clone(&self.deprecations));

        let matched = rule.when.evaluate_bool(&mut ctx);
        if ctx.has_evaluation_errors() {
            debug!("condition failed to evaluate, skipping actions");
            self.fail(rule, &mut ctx, execution);
        } else if matched {
            debug!("rule matched");
            execution.matched_rules.push(rule.name.clone());
            for statement in &rule.then {
                statement.evaluate(&mut ctx);
                if ctx.has_evaluation_errors() {
                    debug!("action failed, skipping remaining actions");
                    self.fail(rule, &mut ctx, execution);
                    break;
                }
            }
        } else {
            debug!("rule did not match");
        }

        execution.created_messages.extend(ctx.take_created_messages());
        execution.message = ctx.into_message();
    }

    fn fail(&self, rule: &Rule, ctx: &mut EvaluationContext, execution: &mut RuleExecution) {
        let Some(last) = ctx.take_evaluation_errors().pop() else {
            return;
        };
        let error = RuleError {
            rule: rule.name.clone(),
            error: last,
        };
        if self.config.record_processing_errors {
            append_processing_error(ctx.current_message_mut(), &self.config.processing_error_field, &error);
        }
        execution.errors.push(error);
    }
}

fn append_processing_error(message: &mut Message, field: &str, error: &RuleError) {
    let text = match message.get_field(field) {
        Some(Value::String(existing)) if !existing.is_empty() => format!("{},{}", existing, error),
        _ => error.to_string(),
    };
    message.add_field(field, text);
}
