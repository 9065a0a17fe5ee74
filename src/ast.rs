//! # Pipeline Rules - Abstract Syntax Tree
//!
//! This module defines the tree a processing rule is parsed into.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, operators, references, calls)
//! - **[operators]** - Binary and unary operators
//! - **[statements]** - Actions of a rule's `then` block
//! - **[rule]** - Complete rule with its condition and actions
//!
//! ## Quick Start
//!
//! ```text
//! rule "tag firewall drops"
//! when
//!     has_field("action") && $message.action == "drop"
//! then
//!     let port = to_long($message.dst_port);
//!     set_field("privileged_port", port < 1024);
//! end
//! ```
//!
//! ## Core Concepts
//!
//! ### Typed Nodes
//!
//! Every node carries its static result type from construction on. Arithmetic
//! on two longs is integral, any double operand makes it floating point, and
//! `+` on two strings concatenates. Operand combinations that cannot be typed
//! are rejected while the tree is built, with the source position attached.
//!
//! ### Safe Evaluation
//!
//! A node that fails at runtime evaluates to `null`; the failure is recorded
//! in the evaluation context with its line, column and, for function calls,
//! the function name. The rule interpreter then skips the remaining actions.
//!
//! ### Dates
//!
//! Datetimes can be shifted by periods (`now() - days(1)`), and subtracting
//! two datetimes yields the non-negative duration between them.
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod statements;
pub mod rule;

pub use tokens::Token;
pub use expressions::{Expr, ExprKind};
pub use operators::{BinaryOp, UnaryOp};
pub use statements::Statement;
pub use rule::Rule;
