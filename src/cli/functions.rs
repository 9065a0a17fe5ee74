//! Human readable listing of the registered functions

use std::fmt::Write;

use crate::{FunctionDescriptor, FunctionRegistry, Value};

fn signature(descriptor: &FunctionDescriptor) -> String {
    let params: Vec<String> = descriptor
        .params
        .iter()
        .map(|p| match (&p.default, p.optional) {
            (Some(Value::String(default)), _) => format!("{}: {} = {:?}", p.name, p.ty, default),
            (Some(default), _) => format!("{}: {} = {}", p.name, p.ty, default),
            (None, true) => format!("{}?: {}", p.name, p.ty),
            (None, false) => format!("{}: {}", p.name, p.ty),
        })
        .collect();
    format!("{}({}) -> {}", descriptor.name, params.join(", "), descriptor.return_type)
}

/// One entry per function, sorted by name.
pub fn list_functions(registry: &FunctionRegistry) -> String {
    let mut out = String::new();
    for descriptor in registry.descriptors() {
        let _ = write!(out, "{}", signature(descriptor));
        if descriptor.deprecated {
            out.push_str("  [deprecated]");
        }
        out.push('\n');
        if let Some(description) = &descriptor.description {
            let _ = writeln!(out, "    {}", description);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_contains_signatures() {
        let listing = list_functions(&FunctionRegistry::with_builtins());
        assert!(listing.contains("to_long(value: any, default: long = 0) -> long"));
        assert!(listing.contains("set_field(field: string, value?: any) -> void"));
        assert!(listing.contains("drop_message() -> void"));
        assert!(listing.contains("to_string(value: any, default: string = \"\") -> string"));
    }
}
