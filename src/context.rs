use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::deprecation::DeprecationLog;
use crate::message::Message;
use crate::types::ValueType;
use crate::value::{TypedValue, Value};

/// Evaluation fault recorded during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalErrorRecord {
    pub line: usize,
    pub column: usize,
    /// Name of the function the fault originated in
    pub function: Option<String>,
    pub cause: String,
}

impl fmt::Display for EvalErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(
                f,
                "In call to function '{}' at {}:{} an exception was thrown: {}",
                function, self.line, self.column, self.cause
            ),
            None => write!(
                f,
                "At {}:{} an exception was thrown: {}",
                self.line, self.column, self.cause
            ),
        }
    }
}

/// Mutable state of one evaluation pass: one message, one rule.
///
/// Contexts are never shared between threads; the expression tree is.
#[derive(Debug)]
pub struct EvaluationContext {
    message: Message,
    rule: Option<String>,
    variables: HashMap<String, TypedValue>,
    errors: Vec<EvalErrorRecord>,
    created_messages: Vec<Message>,
    deprecations: Arc<DeprecationLog>,
}

impl EvaluationContext {
    pub fn new(message: Message) -> Self {
        EvaluationContext {
            message,
            rule: None,
            variables: HashMap::new(),
            errors: Vec::new(),
            created_messages: Vec::new(),
            deprecations: DeprecationLog::global(),
        }
    }

    /// Context without a message, used to fold constant expressions.
    pub fn empty() -> Self {
        EvaluationContext::new(Message::new())
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_deprecation_log(mut self, deprecations: Arc<DeprecationLog>) -> Self {
        self.deprecations = deprecations;
        self
    }

    pub fn current_message(&self) -> &Message {
        &self.message
    }

    pub fn current_message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    /// Binds a variable, replacing any earlier binding of the same name.
    pub fn define(&mut self, name: impl Into<String>, ty: ValueType, value: Value) {
        self.variables.insert(name.into(), TypedValue::new(ty, value));
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.variables.get(name)
    }

    pub fn add_evaluation_error(
        &mut self,
        line: usize,
        column: usize,
        function: Option<&str>,
        cause: impl Into<String>,
    ) {
        self.errors.push(EvalErrorRecord {
            line,
            column,
            function: function.map(str::to_string),
            cause: cause.into(),
        });
    }

    pub fn has_evaluation_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn evaluation_errors(&self) -> &[EvalErrorRecord] {
        &self.errors
    }

    pub fn last_evaluation_error(&self) -> Option<&EvalErrorRecord> {
        self.errors.last()
    }

    pub fn take_evaluation_errors(&mut self) -> Vec<EvalErrorRecord> {
        std::mem::take(&mut self.errors)
    }

    /// Queues a message to be injected back into the pipeline by the caller.
    pub fn add_created_message(&mut self, message: Message) {
        self.created_messages.push(message);
    }

    pub fn created_messages(&self) -> &[Message] {
        &self.created_messages
    }

    pub fn take_created_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.created_messages)
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn deprecations(&self) -> &DeprecationLog {
        &self.deprecations
    }
}
