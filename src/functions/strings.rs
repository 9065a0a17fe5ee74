use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use super::{FunctionRegistry, NativeFunction};
use crate::context::EvaluationContext;
use crate::error::{EvalError, PropertyError, SyntaxErrorKind};
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::types::ValueType;
use crate::value::{PropertyAccess, Value};

pub(super) fn register(registry: &mut FunctionRegistry) {
    for (name, body) in [("lowercase", lowercase as super::FunctionBody), ("uppercase", uppercase)] {
        registry.register(NativeFunction::new(
            FunctionDescriptor::new(name, ValueType::String)
                .param(ParameterDescriptor::required("value", ValueType::String))
                .pure()
                .rule_builder(format!("Convert to {}", name), "string"),
            body,
        ));
    }
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("concat", ValueType::String)
            .param(ParameterDescriptor::optional("first", ValueType::String).default_value(""))
            .param(ParameterDescriptor::optional("second", ValueType::String).default_value(""))
            .pure()
            .describe("Concatenates two strings, treating null as empty")
            .rule_builder("Concatenate", "string"),
        concat,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("contains", ValueType::Boolean)
            .param(ParameterDescriptor::required("value", ValueType::String))
            .param(ParameterDescriptor::required("search", ValueType::String))
            .param(ParameterDescriptor::optional("ignore_case", ValueType::Boolean).default_value(false))
            .pure()
            .describe("Checks whether a string contains another string")
            .rule_builder("Contains", "string"),
        contains,
    ));
    registry.register(RegexFunction::new());
}

fn lowercase(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    Ok(Value::String(args.required_str("value", ctx)?.to_lowercase()))
}

fn uppercase(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    Ok(Value::String(args.required_str("value", ctx)?.to_uppercase()))
}

fn concat(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let first = args.optional("first", ctx)?;
    let second = args.optional("second", ctx)?;
    Ok(Value::String(format!(
        "{}{}",
        first.as_str().unwrap_or_default(),
        second.as_str().unwrap_or_default()
    )))
}

fn contains(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let value = args.required_str("value", ctx)?;
    let search = args.required_str("search", ctx)?;
    let ignore_case = args.optional("ignore_case", ctx)?.as_bool().unwrap_or(false);
    let found = if ignore_case {
        value.to_lowercase().contains(&search.to_lowercase())
    } else {
        value.contains(&search)
    };
    Ok(Value::Boolean(found))
}

/// `regex(pattern, value, group_names)`: matches `value` against `pattern`.
///
/// Returns a [`RegexMatch`]; rules read `.matches` and the captured groups
/// from it through field access. A constant pattern is compiled once per call
/// site; a pattern computed at runtime is compiled on every call.
struct RegexFunction {
    descriptor: FunctionDescriptor,
}

impl RegexFunction {
    fn new() -> Self {
        RegexFunction {
            descriptor: FunctionDescriptor::new("regex", ValueType::Object)
                .param(ParameterDescriptor::required("pattern", ValueType::String))
                .param(ParameterDescriptor::required("value", ValueType::String))
                .param(ParameterDescriptor::optional("group_names", ValueType::List))
                .pure()
                .describe("Matches a string against a regular expression")
                .rule_builder("Regular expression", "string"),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|err| EvalError::IllegalArgument(err.to_string()))
}

impl Function for RegexFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn preprocess_args(&self, args: &mut FunctionArgs) -> Result<(), SyntaxErrorKind> {
        args.precompute_constants()?;
        if let Some(Value::String(pattern)) = args.precomputed("pattern") {
            let regex = compile(pattern).map_err(|err| SyntaxErrorKind::InvalidArgument {
                function: self.descriptor.name.clone(),
                parameter: "pattern".to_string(),
                message: err.to_string(),
            })?;
            args.set_state(regex);
        }
        Ok(())
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        let compiled;
        let regex = match args.state::<Regex>() {
            Some(regex) => regex,
            None => {
                compiled = compile(&args.required_str("pattern", ctx)?)?;
                &compiled
            }
        };
        let value = args.required_str("value", ctx)?;
        let names: Vec<String> = match args.optional("group_names", ctx)? {
            Value::List(names) => names.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        };

        let result = match regex.captures(&value) {
            None => RegexMatch {
                matches: false,
                groups: IndexMap::new(),
            },
            Some(captures) => {
                let mut groups = IndexMap::new();
                for (i, group) in captures.iter().enumerate().skip(1) {
                    let Some(group) = group else { continue };
                    let name = regex
                        .capture_names()
                        .nth(i)
                        .flatten()
                        .map(str::to_string)
                        .or_else(|| names.get(i - 1).cloned())
                        .unwrap_or_else(|| (i - 1).to_string());
                    groups.insert(name, Value::String(group.as_str().to_string()));
                }
                RegexMatch {
                    matches: true,
                    groups,
                }
            }
        };
        Ok(Value::Object(Arc::new(result)))
    }
}

/// Result of the `regex` function.
///
/// Exposes `matches`, `groups`, `groupCount` and every captured group by name.
/// Unnamed groups are named by their zero-based position unless `group_names`
/// supplied a name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexMatch {
    pub matches: bool,
    pub groups: IndexMap<String, Value>,
}

impl PropertyAccess for RegexMatch {
    fn property(&self, name: &str) -> Result<Option<Value>, PropertyError> {
        Ok(match name {
            "matches" => Some(Value::Boolean(self.matches)),
            "groups" => Some(Value::Map(self.groups.clone())),
            "groupCount" => Some(Value::Long(self.groups.len() as i64)),
            group => self.groups.get(group).cloned(),
        })
    }
}
