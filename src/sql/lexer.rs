//! SQL lexer for default-value and CHECK expressions.

use std::iter::Peekable;
use std::str::Chars;

use super::ExprError;

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Not,
    And,
    Or,
    Is,
    Null,
    True,
    False,

    // Identifiers and literals
    Ident(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Concat, // ||
    Eq,     // = or ==
    Ne,     // <> or !=
    Lt,
    Le,
    Gt,
    Ge,

    // End of input
    Eof,
}

/// SQL lexer.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self { chars, current_char }
    }

    fn advance(&mut self) {
        self.current_char = self.chars.next();
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char {
            self.advance();
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ExprError> {
        self.advance(); // skip *
        while let Some(c) = self.current_char {
            self.advance();
            if c == '*' && self.current_char == Some('/') {
                self.advance();
                return Ok(());
            }
        }
        Err(ExprError::UnterminatedComment)
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    /// Read a quoted identifier or string literal; a doubled quote is an
    /// escaped quote.
    fn read_quoted(&mut self, quote: char) -> Result<String, ExprError> {
        self.advance(); // skip opening quote
        let mut s = String::new();
        while let Some(c) = self.current_char {
            if c == quote {
                if self.peek() == Some(&quote) {
                    s.push(c);
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // skip closing quote
                    return Ok(s);
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        Err(ExprError::UnterminatedString)
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;

        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num
    }

    fn keyword_or_ident(s: String) -> Token {
        match s.to_uppercase().as_str() {
            "NOT" => Token::Not,
            "AND" => Token::And,
            "OR" => Token::Or,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => Token::Ident(s),
        }
    }

    /// Consume `c` and yield `double` if the next char is `second`, else `single`.
    fn one_or_two(&mut self, second: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.current_char == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ExprError> {
        loop {
            self.skip_whitespace();

            let c = match self.current_char {
                None => return Ok(Token::Eof),
                Some(c) => c,
            };

            let tok = match c {
                '-' if self.peek() == Some(&'-') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.peek() == Some(&'*') => {
                    self.advance();
                    self.skip_block_comment()?;
                    continue;
                }
                '(' | ')' | ',' | '+' | '-' | '*' | '/' | '%' => {
                    self.advance();
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '*' => Token::Star,
                        '/' => Token::Slash,
                        _ => Token::Percent,
                    }
                }
                '|' => {
                    self.advance();
                    if self.current_char != Some('|') {
                        return Err(ExprError::UnexpectedChar('|'));
                    }
                    self.advance();
                    Token::Concat
                }
                '=' => self.one_or_two('=', Token::Eq, Token::Eq),
                '!' => {
                    self.advance();
                    if self.current_char != Some('=') {
                        return Err(ExprError::UnexpectedChar('!'));
                    }
                    self.advance();
                    Token::Ne
                }
                '<' => {
                    self.advance();
                    match self.current_char {
                        Some('=') => {
                            self.advance();
                            Token::Le
                        }
                        Some('>') => {
                            self.advance();
                            Token::Ne
                        }
                        _ => Token::Lt,
                    }
                }
                '>' => self.one_or_two('=', Token::Ge, Token::Gt),
                '"' => Token::Ident(self.read_quoted('"')?),
                '`' => Token::Ident(self.read_quoted('`')?),
                '\'' => Token::Str(self.read_quoted('\'')?),
                c if c.is_ascii_digit() => Token::Num(self.read_number()),
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => Token::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' => Self::keyword_or_ident(self.read_identifier()),
                c => return Err(ExprError::UnexpectedChar(c)),
            };
            return Ok(tok);
        }
    }

    /// Collect all tokens.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}
