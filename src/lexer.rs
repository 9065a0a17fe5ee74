use thiserror::Error;

use crate::ast::Token;

/// Source location of a token or expression node.
///
/// Lines start at 1, columns at 0 (offset of the first character in the line).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while tokenizing rule source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("invalid escape sequence '\\{ch}' at {position}")]
    InvalidEscape { ch: char, position: Position },

    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: Position },

    #[error("unterminated comment starting at {position}")]
    UnterminatedComment { position: Position },

    #[error("invalid number literal '{literal}' at {position}")]
    InvalidNumber { literal: String, position: Position },

    #[error("unexpected '{found}' at {position} (did you mean '{expected}'?)")]
    Incomplete {
        found: char,
        expected: &'static str,
        position: Position,
    },
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    token_start: Position,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 0,
            token_start: Position::new(1, 0),
        }
    }

    /// Position of the first character of the most recently returned token.
    pub fn token_start(&self) -> Position {
        self.token_start
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
    }

    /// Skips whitespace as well as `//` and `/* */` comments.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.current_char(), self.peek_char(1)) {
                (Some(ch), _) if ch.is_whitespace() => self.advance(),
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.here();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.current_char(), self.peek_char(1)) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => return Err(LexError::UnterminatedComment { position: start }),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.here();
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    let escape_at = self.here();
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(LexError::InvalidEscape {
                                ch,
                                position: escape_at,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        let mut number = String::new();
        let mut is_double = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_double
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_double = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let invalid = || LexError::InvalidNumber {
            literal: number.clone(),
            position: start,
        };
        if is_double {
            number.parse::<f64>().map(Token::Double).map_err(|_| invalid())
        } else {
            number.parse::<i64>().map(Token::Long).map_err(|_| invalid())
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn pair(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        self.token_start = self.here();

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('$') => {
                self.advance();
                let name = self.read_identifier();
                if name == "message" {
                    Ok(Token::MessageRef)
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: '$',
                        position: self.token_start,
                    })
                }
            }
            Some('+') => self.single(Token::Plus),
            Some('-') => self.single(Token::Minus),
            Some('*') => self.single(Token::Star),
            Some('/') => self.single(Token::Slash),
            Some('%') => self.single(Token::Percent),
            Some('.') => self.single(Token::Dot),
            Some(',') => self.single(Token::Comma),
            Some(':') => self.single(Token::Colon),
            Some(';') => self.single(Token::Semicolon),
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('[') => self.single(Token::LBracket),
            Some(']') => self.single(Token::RBracket),
            Some('{') => self.single(Token::LBrace),
            Some('}') => self.single(Token::RBrace),
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::EqEq)
                } else {
                    self.single(Token::Assign)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::NotEq)
                } else {
                    self.single(Token::Not)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::GtEq)
                } else {
                    self.single(Token::Gt)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::LtEq)
                } else {
                    self.single(Token::Lt)
                }
            }
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.pair(Token::And)
                } else {
                    Err(LexError::Incomplete {
                        found: '&',
                        expected: "&&",
                        position: self.token_start,
                    })
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.pair(Token::Or)
                } else {
                    Err(LexError::Incomplete {
                        found: '|',
                        expected: "||",
                        position: self.token_start,
                    })
                }
            }
            Some('"') => self.read_string('"').map(Token::String),
            Some('\'') => self.read_string('\'').map(Token::String),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                Ok(match ident.as_str() {
                    "rule" => Token::Rule,
                    "when" => Token::When,
                    "then" => Token::Then,
                    "end" => Token::End,
                    "let" => Token::Let,
                    "and" | "AND" => Token::And,
                    "or" | "OR" => Token::Or,
                    "not" | "NOT" => Token::Not,
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    _ => Token::Identifier(ident),
                })
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(LexError::UnexpectedChar {
                ch,
                position: self.token_start,
            }),
        }
    }

    /// Tokenizes the remaining input, including the trailing `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<(Token, Position)>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, self.token_start));
            if done {
                return Ok(tokens);
            }
        }
    }
}
