//! Precedence-climbing parser for SQL scalar expressions.

use super::expr::{BinaryOp, Expr, UnaryOp};
use super::lexer::{Lexer, Token};
use super::ExprError;

/// Deepest expression tree the compiler accepts.
pub const MAX_EXPR_DEPTH: usize = 200;

/// Parse a complete expression; trailing tokens are an error.
pub fn parse_expr(input: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    if parser.current() == &Token::Eof {
        return Err(ExprError::Empty);
    }
    let expr = parser.parse_or()?;
    if parser.current() != &Token::Eof {
        return Err(ExprError::Syntax(format!("{:?}", parser.current())));
    }
    if expr.height() > MAX_EXPR_DEPTH {
        return Err(ExprError::TooDeep);
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(ExprError::Syntax(format!("{tok:?}, expected {expected:?}")))
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Height of a node built over children of height `child`. Checked as
    /// the tree grows so that flat operator chains stay shallow.
    fn grow(child: usize) -> Result<usize, ExprError> {
        let height = child + 1;
        if height > MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(height)
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let mut lhs = self.parse_and()?;
        let mut height = lhs.height();
        while self.current() == &Token::Or {
            self.advance();
            let rhs = self.parse_and()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(BinaryOp::Or, lhs, rhs);
        }
        self.leave();
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        let mut height = lhs.height();
        while self.current() == &Token::And {
            self.advance();
            let rhs = self.parse_not()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.current() == &Token::Not {
            self.advance();
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            Self::grow(operand.height())?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_comparison()?;
        let mut height = lhs.height();
        loop {
            let op = match self.current() {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                Token::Is => {
                    // IS [NOT] NULL
                    self.advance();
                    let negated = self.current() == &Token::Not;
                    if negated {
                        self.advance();
                    }
                    self.expect(Token::Null)?;
                    height = Self::grow(height)?;
                    lhs = Expr::IsNull {
                        operand: Box::new(lhs),
                        negated,
                    };
                    continue;
                }
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_additive()?;
        let mut height = lhs.height();
        loop {
            let op = match self.current() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        let mut height = lhs.height();
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_concat()?;
        let mut height = lhs.height();
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_concat()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_concat(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        let mut height = lhs.height();
        while self.current() == &Token::Concat {
            self.advance();
            let rhs = self.parse_unary()?;
            height = Self::grow(height.max(rhs.height()))?;
            lhs = Self::binary(BinaryOp::Concat, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.current() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Self::grow(operand.height())?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Token::Null => Ok(Expr::Null),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Num(n) => parse_number(&n),
            Token::Ident(name) => {
                if self.current() != &Token::LParen {
                    return Ok(Expr::Column(name));
                }
                self.advance(); // consume (
                let mut args = Vec::new();
                if self.current() != &Token::RParen {
                    loop {
                        args.push(self.parse_or()?);
                        if self.current() == &Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call { name, args })
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            tok => Err(ExprError::Syntax(format!("{tok:?}"))),
        }
    }
}

fn parse_number(text: &str) -> Result<Expr, ExprError> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(Expr::Float)
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))
    } else {
        text.parse::<i64>()
            .map(Expr::Integer)
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))
    }
}
