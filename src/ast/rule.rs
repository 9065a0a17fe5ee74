use crate::ast::{Expr, Statement};

/// A parsed processing rule.
///
/// ```text
/// rule "tag slow requests"
/// when
///     to_long($message.took_ms) > 500
/// then
///     set_field("slow", true);
/// end
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,

    /// Condition deciding whether the actions run
    pub when: Expr,

    /// Actions, executed in order
    pub then: Vec<Statement>,
}
