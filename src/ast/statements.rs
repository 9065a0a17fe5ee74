use crate::ast::Expr;

/// Action executed in the `then` block of a rule.
#[derive(Debug, Clone)]
pub enum Statement {
    /// Variable binding
    ///
    /// # Example
    /// ```text
    /// let port = to_long($message.port);
    /// ```
    VarAssign { name: String, value: Expr },

    /// Function call evaluated for its side effects
    ///
    /// # Example
    /// ```text
    /// set_field("port", port + 1);
    /// ```
    Function(Expr),
}
