use chrono::Utc;

use super::{FunctionRegistry, NativeFunction};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::message::Message;
use crate::types::ValueType;
use crate::value::Value;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("has_field", ValueType::Boolean)
            .param(ParameterDescriptor::required("field", ValueType::String))
            .describe("Checks whether the current message has a field")
            .rule_builder("Has field", "message"),
        has_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("set_field", ValueType::Void)
            .param(ParameterDescriptor::required("field", ValueType::String))
            .param(ParameterDescriptor::optional("value", ValueType::Any))
            .describe("Sets a field of the current message; a null value leaves it unchanged")
            .rule_builder("Set field", "message"),
        set_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("remove_field", ValueType::Void)
            .param(ParameterDescriptor::required("field", ValueType::String))
            .describe("Removes a field from the current message")
            .rule_builder("Remove field", "message"),
        remove_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("drop_message", ValueType::Void)
            .describe("Marks the current message to be dropped")
            .rule_builder("Drop message", "message"),
        drop_message,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("create_message", ValueType::Map)
            .param(ParameterDescriptor::optional("message", ValueType::String))
            .param(ParameterDescriptor::optional("source", ValueType::String))
            .param(ParameterDescriptor::optional("timestamp", ValueType::DateTime))
            .describe("Creates a new message that is handed back to the pipeline")
            .rule_builder("Create message", "message"),
        create_message,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("route_to_stream", ValueType::Void)
            .param(ParameterDescriptor::required("name", ValueType::String))
            .describe("Adds the current message to a stream")
            .rule_builder("Route to stream", "message"),
        route_to_stream,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::new("remove_from_stream", ValueType::Void)
            .param(ParameterDescriptor::required("name", ValueType::String))
            .describe("Removes the current message from a stream")
            .rule_builder("Remove from stream", "message"),
        remove_from_stream,
    ));
}

fn has_field(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let field = args.required_str("field", ctx)?;
    Ok(Value::Boolean(ctx.current_message().has_field(&field)))
}

fn set_field(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let field = args.required_str("field", ctx)?;
    let value = args.optional("value", ctx)?;
    ctx.current_message_mut().add_field(field, value);
    Ok(Value::Null)
}

fn remove_field(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let field = args.required_str("field", ctx)?;
    ctx.current_message_mut().remove_field(&field);
    Ok(Value::Null)
}

fn drop_message(_args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    ctx.current_message_mut().set_filter_out(true);
    Ok(Value::Null)
}

fn create_message(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let timestamp = match args.optional("timestamp", ctx)? {
        Value::DateTime(dt) => dt,
        _ => Utc::now().fixed_offset(),
    };
    let mut message = Message::new();
    message.add_field("message", args.optional("message", ctx)?);
    message.add_field("source", args.optional("source", ctx)?);
    message.add_field("timestamp", timestamp);

    let snapshot = message.to_value();
    ctx.add_created_message(message);
    Ok(snapshot)
}

fn route_to_stream(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let name = args.required_str("name", ctx)?;
    ctx.current_message_mut().add_stream(name);
    Ok(Value::Null)
}

fn remove_from_stream(args: &FunctionArgs, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
    let name = args.required_str("name", ctx)?;
    ctx.current_message_mut().remove_stream(&name);
    Ok(Value::Null)
}
