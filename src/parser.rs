use std::collections::HashMap;
use std::mem;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Rule, Statement, Token, UnaryOp},
    error::{SyntaxError, SyntaxErrorKind},
    function::FunctionCall,
    functions::FunctionRegistry,
    lexer::{LexError, Lexer, Position},
    types::ValueType,
};

/// Errors raised while turning rule source into a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("undeclared variable '{name}' at {position}")]
    UndeclaredVariable { name: String, position: Position },

    #[error("unknown function '{name}' at {position}")]
    UndeclaredFunction { name: String, position: Position },

    #[error("missing required argument '{parameter}' in call to '{function}' at {position}")]
    MissingRequiredArgument {
        function: String,
        parameter: String,
        position: Position,
    },

    #[error("function '{function}' has no parameter '{parameter}' at {position}")]
    UnknownArgument {
        function: String,
        parameter: String,
        position: Position,
    },

    #[error("argument '{parameter}' given twice in call to '{function}' at {position}")]
    DuplicateArgument {
        function: String,
        parameter: String,
        position: Position,
    },

    #[error("argument '{parameter}' of '{function}' expects {expected}, got {actual} at {position}")]
    IncompatibleArgumentType {
        function: String,
        parameter: String,
        expected: ValueType,
        actual: ValueType,
        position: Position,
    },

    #[error("expected {expected}, found '{found}' at {position}")]
    Unexpected {
        found: String,
        expected: String,
        position: Position,
    },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lex(err) => match err {
                LexError::UnexpectedChar { position, .. }
                | LexError::InvalidEscape { position, .. }
                | LexError::UnterminatedString { position }
                | LexError::UnterminatedComment { position }
                | LexError::InvalidNumber { position, .. }
                | LexError::Incomplete { position, .. } => *position,
            },
            ParseError::Syntax(err) => err.position,
            ParseError::UndeclaredVariable { position, .. }
            | ParseError::UndeclaredFunction { position, .. }
            | ParseError::MissingRequiredArgument { position, .. }
            | ParseError::UnknownArgument { position, .. }
            | ParseError::DuplicateArgument { position, .. }
            | ParseError::IncompatibleArgumentType { position, .. }
            | ParseError::Unexpected { position, .. } => *position,
        }
    }
}

/// Recursive descent parser for rules and rule expressions.
///
/// Function names are resolved against the registry while parsing, and every
/// node is typed as it is built, so a successful parse yields a tree that is
/// ready to evaluate.
pub struct Parser<'r> {
    lexer: Lexer,
    current_token: Token,
    position: Position,
    peeked: Option<(Token, Position)>,
    functions: &'r FunctionRegistry,
    variables: HashMap<String, ValueType>,
}

impl<'r> Parser<'r> {
    pub fn new(mut lexer: Lexer, functions: &'r FunctionRegistry) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        let position = lexer.token_start();
        Ok(Parser {
            lexer,
            current_token,
            position,
            peeked: None,
            functions,
            variables: HashMap::new(),
        })
    }

    /// Makes a variable known to expressions parsed afterwards.
    pub fn declare(&mut self, name: impl Into<String>, ty: ValueType) {
        self.variables.insert(name.into(), ty);
    }

    fn read(&mut self) -> Result<(Token, Position), ParseError> {
        let token = self.lexer.next_token()?;
        Ok((token, self.lexer.token_start()))
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let (token, position) = match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.read()?,
        };
        self.current_token = token;
        self.position = position;
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        let peeked = match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.read()?,
        };
        Ok(&self.peeked.insert(peeked).0)
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::Unexpected {
            found: self.current_token.to_string(),
            expected: expected.into(),
            position: self.position,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(format!("'{}'", expected)));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    /// Identifier, also accepting keywords, as used for field names after `.`.
    fn expect_name(&mut self) -> Result<String, ParseError> {
        let name = match &self.current_token {
            Token::Identifier(name) => name.clone(),
            Token::Rule | Token::When | Token::Then | Token::End | Token::Let => {
                self.current_token.to_string()
            }
            _ => return Err(self.unexpected("identifier")),
        };
        self.advance()?;
        Ok(name)
    }

    /// Parse primary expressions: literals, references, calls, groups
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position;
        match mem::replace(&mut self.current_token, Token::Eof) {
            // Literals
            Token::Long(n) => {
                self.advance()?;
                Ok(Expr::long(n, position))
            }
            Token::Double(n) => {
                self.advance()?;
                Ok(Expr::double(n, position))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::boolean(b, position))
            }
            Token::String(s) => {
                self.advance()?;
                let mut expr = Expr::string(s, position);
                // "a" "b" is a single concatenated literal
                while let Token::String(next) = &self.current_token {
                    let right = Expr::string(next.clone(), self.position);
                    self.advance()?;
                    expr = Expr::binary(BinaryOp::Concat, Some(expr), Some(right), position)?;
                }
                Ok(expr)
            }

            // References
            Token::MessageRef => {
                self.advance()?;
                if self.check(&Token::Dot) {
                    self.advance()?;
                    let field_position = self.position;
                    let name = self.expect_name()?;
                    Ok(Expr::message_ref(Some(Expr::field_ref(name, field_position)), position))
                } else if self.check(&Token::LBracket) {
                    self.advance()?;
                    let field = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    Ok(Expr::message_ref(Some(field), position))
                } else {
                    Ok(Expr::message_ref(None, position))
                }
            }
            Token::Identifier(name) => {
                if self.peek()? == &Token::LParen {
                    self.advance()?;
                    return self.parse_call(name, position);
                }
                self.advance()?;
                match self.variables.get(&name) {
                    Some(ty) => Ok(Expr::var_ref(name, *ty, position)),
                    None => Err(ParseError::UndeclaredVariable { name, position }),
                }
            }

            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            // Composite literals
            Token::LBrace => {
                self.advance()?;
                self.parse_map_literal(position)
            }
            Token::LBracket => {
                self.advance()?;
                self.parse_array_literal(position)
            }

            token => {
                self.current_token = token;
                Err(self.unexpected("expression"))
            }
        }
    }

    fn parse_map_literal(&mut self, position: Position) -> Result<Expr, ParseError> {
        let mut entries = IndexMap::new();

        while !self.check(&Token::RBrace) {
            let key = match &self.current_token {
                Token::String(s) => s.clone(),
                Token::Identifier(s) => s.clone(),
                _ => return Err(self.unexpected("string or identifier as map key")),
            };
            self.advance()?;
            self.expect(Token::Colon)?;

            let value = self.parse_expression()?;
            entries.insert(key, value);

            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expr::map(entries, position))
    }

    fn parse_array_literal(&mut self, position: Position) -> Result<Expr, ParseError> {
        let mut elements = vec![];

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Expr::array(elements, position))
    }

    /// Parses the argument list of a call; the current token is `(`.
    fn parse_call(&mut self, name: String, position: Position) -> Result<Expr, ParseError> {
        let function = self
            .functions
            .resolve(&name)
            .ok_or_else(|| ParseError::UndeclaredFunction {
                name: name.clone(),
                position,
            })?;
        let descriptor = function.descriptor().clone();
        self.expect(Token::LParen)?;

        let mut args: IndexMap<String, Expr> = IndexMap::new();
        let named = matches!(self.current_token, Token::Identifier(_)) && self.peek()? == &Token::Colon;
        let mut index = 0;

        while !self.check(&Token::RParen) {
            let arg_position = self.position;
            let param = if named {
                let param = self.expect_name()?;
                self.expect(Token::Colon)?;
                param
            } else {
                match descriptor.params.get(index) {
                    Some(param) => param.name.clone(),
                    None => {
                        return Err(ParseError::UnknownArgument {
                            function: name,
                            parameter: format!("#{}", index + 1),
                            position: arg_position,
                        });
                    }
                }
            };
            index += 1;

            let Some(declared) = descriptor.parameter(&param) else {
                return Err(ParseError::UnknownArgument {
                    function: name,
                    parameter: param,
                    position: arg_position,
                });
            };
            if args.contains_key(&param) {
                return Err(ParseError::DuplicateArgument {
                    function: name,
                    parameter: param,
                    position: arg_position,
                });
            }
            let value = self.parse_expression()?;
            if !declared.ty.is_assignable_from(value.ty()) {
                return Err(ParseError::IncompatibleArgumentType {
                    function: name,
                    parameter: param,
                    expected: declared.ty,
                    actual: value.ty(),
                    position: value.position(),
                });
            }
            args.insert(param, value);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RParen)?;

        if let Some(missing) = descriptor
            .params
            .iter()
            .find(|p| !p.optional && !args.contains_key(&p.name))
        {
            return Err(ParseError::MissingRequiredArgument {
                function: name,
                parameter: missing.name.clone(),
                position,
            });
        }

        let call = FunctionCall::new(function, args, position)?;
        Ok(Expr::function(call, position))
    }

    /// Parse postfix access: `.field` and `[index]`
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&Token::Dot) {
                self.advance()?;
                let field_position = self.position;
                let name = self.expect_name()?;
                let start = expr.position();
                expr = Expr::field_access(expr, Expr::field_ref(name, field_position), start);
            } else if self.check(&Token::LBracket) {
                self.advance()?;
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                let start = expr.position();
                expr = Expr::indexed(expr, index, start)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_sign(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_token {
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        let position = self.position;
        self.advance()?;
        let operand = self.parse_sign()?;
        Ok(Expr::unary(op, Some(operand), position)?)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_sign()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_sign()?;
            let position = left.position();
            left = Expr::binary(op, Some(left), Some(right), position)?;
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };

            self.advance()?;
            let right = self.parse_multiplicative()?;
            let position = left.position();
            left = Expr::binary(op, Some(left), Some(right), position)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let op = match &self.current_token {
            Token::Lt => BinaryOp::Less,
            Token::Gt => BinaryOp::Greater,
            Token::LtEq => BinaryOp::LessEqual,
            Token::GtEq => BinaryOp::GreaterEqual,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_additive()?;
        let position = left.position();
        Ok(Expr::binary(op, Some(left), Some(right), position)?)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_comparison()?;

        let op = match &self.current_token {
            Token::EqEq => BinaryOp::Equal,
            Token::NotEq => BinaryOp::NotEqual,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_comparison()?;
        let position = left.position();
        Ok(Expr::binary(op, Some(left), Some(right), position)?)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if !self.check(&Token::Not) {
            return self.parse_equality();
        }
        let position = self.position;
        self.advance()?;
        let operand = boolean_operand(self.parse_not()?)?;
        Ok(Expr::unary(UnaryOp::Not, Some(operand), position)?)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;

        while self.check(&Token::And) {
            self.advance()?;
            let right = boolean_operand(self.parse_not()?)?;
            let position = left.position();
            left = Expr::binary(BinaryOp::And, Some(boolean_operand(left)?), Some(right), position)?;
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::Or) {
            self.advance()?;
            let right = boolean_operand(self.parse_and()?)?;
            let position = left.position();
            left = Expr::binary(BinaryOp::Or, Some(boolean_operand(left)?), Some(right), position)?;
        }
        Ok(left)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    /// Parses a single expression spanning the whole input.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.finish()?;
        Ok(expr)
    }

    /// Fails unless the whole input has been consumed.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        if self.check(&Token::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }
}

impl Parser<'_> {
    /// Parses one `rule "name" when <condition> then <statements> end` block.
    ///
    /// Variables declared by an earlier rule are not visible in this one.
    pub fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.variables.clear();
        self.expect(Token::Rule)?;

        let name = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::String(name) => name,
            token => {
                self.current_token = token;
                return Err(self.unexpected("rule name"));
            }
        };
        self.advance()?;

        self.expect(Token::When)?;
        let when = boolean_operand(self.parse_expression()?)?;
        if !matches!(when.ty(), ValueType::Boolean | ValueType::Any) {
            return Err(SyntaxError::new(
                SyntaxErrorKind::InvalidOperation {
                    op: "when".to_string(),
                    operand: when.ty(),
                },
                when.position(),
            )
            .into());
        }

        self.expect(Token::Then)?;
        let mut then = Vec::new();
        while !self.check(&Token::End) {
            then.push(self.parse_statement()?);
        }
        self.expect(Token::End)?;

        Ok(Rule { name, when, then })
    }

    /// Parses every rule up to the end of input.
    pub fn parse_rules(&mut self) -> Result<Vec<Rule>, ParseError> {
        let mut rules = Vec::new();
        while !self.check(&Token::Eof) {
            rules.push(self.parse_rule()?);
        }
        Ok(rules)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let statement = if self.check(&Token::Let) {
            self.parse_var_assign()?
        } else {
            let expr = self.parse_expression()?;
            if !matches!(expr.kind(), ExprKind::Function(_)) {
                return Err(ParseError::Unexpected {
                    found: expr.to_string(),
                    expected: "function call or 'let'".to_string(),
                    position: expr.position(),
                });
            }
            Statement::Function(expr)
        };
        self.expect(Token::Semicolon)?;
        Ok(statement)
    }

    fn parse_var_assign(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::Let)?;
        let name = match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => name,
            token => {
                self.current_token = token;
                return Err(self.unexpected("variable name"));
            }
        };
        self.advance()?;
        self.expect(Token::Assign)?;

        let value = self.parse_expression()?;
        self.variables.insert(name.clone(), value.ty());
        Ok(Statement::VarAssign { name, value })
    }
}

/// Wraps a function call used as a boolean operand.
fn boolean_operand(expr: Expr) -> Result<Expr, ParseError> {
    if matches!(expr.kind(), ExprKind::Function(_)) {
        let position = expr.position();
        Ok(Expr::unary(UnaryOp::BooleanFunction, Some(expr), position)?)
    } else {
        Ok(expr)
    }
}
