//! Function binding framework.
//!
//! A [`FunctionCall`] ties a call site to a registered [`Function`] and the
//! argument expressions bound to its declared parameters. Constant arguments
//! are computed once when the call is built, before the tree is shared.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::Expr;
use crate::context::EvaluationContext;
use crate::error::{EvalError, SyntaxError, SyntaxErrorKind};
use crate::lexer::Position;
use crate::types::ValueType;
use crate::value::Value;

/// Conversion applied to an argument after it has been evaluated and type checked.
pub type ArgTransform = fn(Value) -> Result<Value, EvalError>;

/// A callable exposed to rules.
pub trait Function: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Runs once per call site while the call is being built.
    ///
    /// The default computes every constant argument up front.
    fn preprocess_args(&self, args: &mut FunctionArgs) -> Result<(), SyntaxErrorKind> {
        args.precompute_constants()
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError>;
}

/// Declared parameter of a function.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: ValueType,
    pub optional: bool,
    pub default: Option<Value>,
    pub transform: Option<ArgTransform>,
    pub description: Option<String>,
}

impl ParameterDescriptor {
    pub fn required(name: impl Into<String>, ty: ValueType) -> Self {
        ParameterDescriptor {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            transform: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ValueType) -> Self {
        ParameterDescriptor {
            optional: true,
            ..ParameterDescriptor::required(name, ty)
        }
    }

    /// Value used when an optional argument is absent or null.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn transform(mut self, transform: ArgTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Type checks a non-null argument value and applies the transform.
    fn convert(&self, value: Value) -> Result<Value, EvalError> {
        if !self.ty.accepts(&value) {
            return Err(EvalError::type_mismatch(self.ty, value.value_type()));
        }
        match self.transform {
            Some(transform) => transform(value),
            None => Ok(value),
        }
    }
}

/// Static metadata of a function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub return_type: ValueType,
    pub params: Vec<ParameterDescriptor>,
    /// Same arguments always produce the same result
    pub pure: bool,
    pub deprecated: bool,
    pub description: Option<String>,
    /// Title and group shown by rule editors
    pub rule_builder: Option<(String, String)>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, return_type: ValueType) -> Self {
        FunctionDescriptor {
            name: name.into(),
            return_type,
            params: Vec::new(),
            pure: false,
            deprecated: false,
            description: None,
            rule_builder: None,
        }
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn rule_builder(mut self, title: impl Into<String>, group: impl Into<String>) -> Self {
        self.rule_builder = Some((title.into(), group.into()));
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Argument expressions bound to the parameters of one call site.
#[derive(Debug, Clone)]
pub struct FunctionArgs {
    descriptor: FunctionDescriptor,
    expressions: IndexMap<String, Expr>,
    precomputed: HashMap<String, Value>,
    /// Call-site data prepared by `Function::preprocess_args`
    state: Option<Arc<dyn Any + Send + Sync>>,
}

impl FunctionArgs {
    pub fn new(descriptor: FunctionDescriptor, expressions: IndexMap<String, Expr>) -> Self {
        FunctionArgs {
            descriptor,
            expressions,
            precomputed: HashMap::new(),
            state: None,
        }
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn expression(&self, name: &str) -> Option<&Expr> {
        self.expressions.get(name)
    }

    /// Bound argument expressions, in call order.
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.expressions.values()
    }

    pub fn bound(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.expressions.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.expressions.get(name).is_some_and(Expr::is_constant)
    }

    pub fn precomputed(&self, name: &str) -> Option<&Value> {
        self.precomputed.get(name)
    }

    pub fn set_precomputed(&mut self, name: impl Into<String>, value: Value) {
        self.precomputed.insert(name.into(), value);
    }

    /// Attaches data derived from constant arguments, such as a compiled pattern.
    pub fn set_state<T: Any + Send + Sync>(&mut self, state: T) {
        self.state = Some(Arc::new(state));
    }

    pub fn state<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state.as_deref().and_then(|state| state.downcast_ref::<T>())
    }

    /// Evaluates every constant argument once and caches the converted value.
    pub fn precompute_constants(&mut self) -> Result<(), SyntaxErrorKind> {
        let mut computed = Vec::new();
        for (name, expr) in &self.expressions {
            if !expr.is_constant() {
                continue;
            }
            let value = expr.evaluate_constant().and_then(|value| match self.descriptor.parameter(name) {
                Some(param) if !value.is_null() => param.convert(value),
                _ => Ok(value),
            });
            match value {
                Ok(value) => computed.push((name.clone(), value)),
                Err(err) => {
                    return Err(SyntaxErrorKind::InvalidArgument {
                        function: self.descriptor.name.clone(),
                        parameter: name.clone(),
                        message: err.root_cause().to_string(),
                    });
                }
            }
        }
        self.precomputed.extend(computed);
        Ok(())
    }

    /// Evaluated, type checked and transformed argument; `None` when absent or null.
    pub fn value(&self, name: &str, ctx: &mut EvaluationContext) -> Result<Option<Value>, EvalError> {
        let param = self.descriptor.parameter(name).ok_or_else(|| {
            EvalError::IllegalArgument(format!(
                "function '{}' has no parameter '{}'",
                self.descriptor.name, name
            ))
        })?;
        if let Some(value) = self.precomputed.get(name) {
            return Ok((!value.is_null()).then(|| value.clone()));
        }
        let Some(expr) = self.expressions.get(name) else {
            return Ok(None);
        };
        match expr.evaluate_unsafe(ctx)? {
            Value::Null => Ok(None),
            value => param.convert(value).map(Some),
        }
    }

    /// Argument that must be present and non-null.
    pub fn required(&self, name: &str, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        self.value(name, ctx)?.ok_or_else(|| EvalError::MissingArgument {
            function: self.descriptor.name.clone(),
            parameter: name.to_string(),
        })
    }

    /// Argument falling back to the declared default, then to null.
    pub fn optional(&self, name: &str, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        match self.value(name, ctx)? {
            Some(value) => Ok(value),
            None => Ok(self
                .descriptor
                .parameter(name)
                .and_then(|p| p.default.clone())
                .unwrap_or(Value::Null)),
        }
    }

    pub fn required_str(&self, name: &str, ctx: &mut EvaluationContext) -> Result<String, EvalError> {
        match self.required(name, ctx)? {
            Value::String(s) => Ok(s),
            other => Err(EvalError::type_mismatch(ValueType::String, other.value_type())),
        }
    }
}

/// A resolved function bound to its arguments.
#[derive(Clone)]
pub struct FunctionCall {
    function: Arc<dyn Function>,
    args: FunctionArgs,
}

impl FunctionCall {
    /// Binds `expressions` to `function` and pre-processes the arguments.
    pub fn new(
        function: Arc<dyn Function>,
        expressions: IndexMap<String, Expr>,
        position: Position,
    ) -> Result<Self, SyntaxError> {
        let mut args = FunctionArgs::new(function.descriptor().clone(), expressions);
        function
            .preprocess_args(&mut args)
            .map_err(|kind| SyntaxError::new(kind, position))?;
        Ok(FunctionCall { function, args })
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        self.function.descriptor()
    }

    pub fn args(&self) -> &FunctionArgs {
        &self.args
    }

    /// Runs the function body on behalf of the call site at `position`.
    ///
    /// Faults that already carry a location are returned as they are;
    /// everything else is wrapped with the function name and `position`.
    pub fn invoke(&self, position: Position, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        let descriptor = self.function.descriptor();
        if descriptor.deprecated {
            ctx.deprecations().warn(&descriptor.name, ctx.rule_name());
        }

        let result = self.function.evaluate(&self.args, ctx).and_then(|value| {
            if descriptor.return_type.accepts(&value) {
                Ok(value)
            } else {
                Err(EvalError::type_mismatch(descriptor.return_type, value.value_type()))
            }
        });

        result.map_err(|err| {
            if err.location().is_some() {
                err
            } else {
                EvalError::Function {
                    function: descriptor.name.clone(),
                    position,
                    cause: Box::new(err),
                }
            }
        })
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function", &self.descriptor().name)
            .field("args", &self.args.expressions)
            .finish()
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.descriptor().name)?;
        for (i, (name, expr)) in self.args.bound().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, expr)?;
        }
        write!(f, ")")
    }
}
