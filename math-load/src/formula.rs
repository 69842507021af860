//! Integer arithmetic over the request index.
//!
//! A formula is parsed once into an expression tree and then evaluated for
//! every request index. The accepted language is deliberately small: integer
//! literals, the index variable `i`, `+ - * /`, unary minus and parentheses.
//! Anything else is rejected while parsing, so a formula can never do more
//! than compute a number.
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := ('-' | '+') unary | atom
//! atom  := INT | 'i' | '(' expr ')'
//! ```
use std::fmt;
use std::str::FromStr;

use math_api_util::AddQuery;

use crate::error::FormulaError;

const MAX_DEPTH: usize = 64;

/// Parses `formula` and evaluates it at `index`.
pub fn evaluate(formula: &str, index: i64) -> Result<i64, FormulaError> {
    formula.parse::<Formula>()?.evaluate(index)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            next: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(token.unexpected());
        }
        Ok(Self {
            source: source.to_owned(),
            expr,
        })
    }

    /// Division truncates toward zero. Overflow and division by zero are errors.
    pub fn evaluate(&self, index: i64) -> Result<i64, FormulaError> {
        self.expr.eval(index)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// The formulas for `a` and `b`, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaPair {
    pub a: Formula,
    pub b: Formula,
}

impl FormulaPair {
    #[must_use]
    pub fn new(a: Formula, b: Formula) -> Self {
        Self { a, b }
    }

    pub fn params(&self, index: u64) -> Result<AddQuery, FormulaError> {
        let i = i64::try_from(index).map_err(|_| FormulaError::Overflow)?;
        Ok(AddQuery::new(self.a.evaluate(i)?, self.b.evaluate(i)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(i64),
    Index,
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn eval(&self, index: i64) -> Result<i64, FormulaError> {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Index => Ok(index),
            Expr::Neg(inner) => inner
                .eval(index)?
                .checked_neg()
                .ok_or(FormulaError::Overflow),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(index)?;
                let rhs = rhs.eval(index)?;
                match op {
                    BinOp::Add => lhs.checked_add(rhs).ok_or(FormulaError::Overflow),
                    BinOp::Sub => lhs.checked_sub(rhs).ok_or(FormulaError::Overflow),
                    BinOp::Mul => lhs.checked_mul(rhs).ok_or(FormulaError::Overflow),
                    BinOp::Div if rhs == 0 => Err(FormulaError::DivisionByZero),
                    BinOp::Div => lhs.checked_div(rhs).ok_or(FormulaError::Overflow),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Int(i64),
    Index,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

impl Token {
    fn unexpected(&self) -> FormulaError {
        let found = match self.kind {
            TokenKind::Int(v) => v.to_string(),
            TokenKind::Index => "i".to_owned(),
            TokenKind::Plus => "+".to_owned(),
            TokenKind::Minus => "-".to_owned(),
            TokenKind::Star => "*".to_owned(),
            TokenKind::Slash => "/".to_owned(),
            TokenKind::LParen => "(".to_owned(),
            TokenKind::RParen => ")".to_owned(),
        };
        FormulaError::UnexpectedToken {
            found,
            pos: self.pos,
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(pos, ch)) = chars.peek() {
        let kind = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            c if c.is_ascii_digit() => {
                let literal = take_while(source, &mut chars, |c| c.is_ascii_digit());
                let value = literal
                    .parse()
                    .map_err(|_| FormulaError::LiteralOutOfRange {
                        literal: literal.to_owned(),
                        pos,
                    })?;
                tokens.push(Token {
                    kind: TokenKind::Int(value),
                    pos,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = take_while(source, &mut chars, |c| c.is_alphanumeric() || c == '_');
                if name != "i" {
                    return Err(FormulaError::UnknownIdentifier {
                        name: name.to_owned(),
                        pos,
                    });
                }
                tokens.push(Token {
                    kind: TokenKind::Index,
                    pos,
                });
                continue;
            }
            ch => return Err(FormulaError::UnexpectedChar { ch, pos }),
        };
        chars.next();
        tokens.push(Token { kind, pos });
    }
    Ok(tokens)
}

fn take_while<'a>(
    source: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    pred: impl Fn(char) -> bool,
) -> &'a str {
    let start = chars.peek().map_or(source.len(), |&(pos, _)| pos);
    let mut end = start;
    while let Some(&(pos, ch)) = chars.peek() {
        if !pred(ch) {
            break;
        }
        end = pos + ch.len_utf8();
        chars.next();
    }
    &source[start..end]
}

struct Parser<'a> {
    tokens: &'a [Token],
    next: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.next)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.next);
        self.next += 1;
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.next += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinOp::Mul
            } else if self.eat(&TokenKind::Slash) {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        let expr = if self.eat(&TokenKind::Minus) {
            self.unary().map(|inner| Expr::Neg(Box::new(inner)))
        } else if self.eat(&TokenKind::Plus) {
            self.unary()
        } else {
            self.atom()
        };
        self.depth -= 1;
        expr
    }

    fn atom(&mut self) -> Result<Expr, FormulaError> {
        let token = self.bump().ok_or(FormulaError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Int(v) => Ok(Expr::Literal(v)),
            TokenKind::Index => Ok(Expr::Index),
            TokenKind::LParen => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(other.unexpected()),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            _ => Err(token.unexpected()),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
