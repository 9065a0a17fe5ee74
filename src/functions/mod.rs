//! Function registry and builtin functions.

mod conversion;
mod dates;
mod messages;
mod strings;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor};
use crate::value::Value;

pub use strings::RegexMatch;

/// Body of a function that needs no state of its own.
pub type FunctionBody = fn(&FunctionArgs, &mut EvaluationContext) -> Result<Value, EvalError>;

/// Function backed by a plain `fn`.
pub struct NativeFunction {
    descriptor: FunctionDescriptor,
    body: FunctionBody,
}

impl NativeFunction {
    pub fn new(descriptor: FunctionDescriptor, body: FunctionBody) -> Self {
        NativeFunction { descriptor, body }
    }
}

impl Function for NativeFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        (self.body)(args, ctx)
    }
}

/// Functions callable from rules, looked up by name while parsing.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Registry without any functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every builtin function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        conversion::register(&mut registry);
        strings::register(&mut registry);
        messages::register(&mut registry);
        dates::register(&mut registry);
        registry
    }

    /// Adds a function, replacing any function registered under the same name.
    pub fn register(&mut self, function: impl Function + 'static) {
        self.register_shared(Arc::new(function));
    }

    pub fn register_shared(&mut self, function: Arc<dyn Function>) {
        let name = function.descriptor().name.clone();
        self.functions.insert(name, function);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Descriptors sorted by function name.
    pub fn descriptors(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values().map(|f| f.descriptor())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
