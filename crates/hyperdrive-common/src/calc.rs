//! Arithmetic expressions over a single variable
//!
//! Sequence values are reported through a caller-chosen expression of the
//! drawn counter `x`, such as `x`, `x-1`, `8000 + x` or `2 * (x - 1)`.
//!
//! Grammar (whitespace is insignificant):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor ('*' factor)*
//! factor := integer | 'x' | '(' expr ')'
//! ```
//!
//! Operators are left associative and `*` binds tighter than `+` and `-`.
//! Expressions are parsed on every evaluation; nothing is cached.

use thiserror::Error;

/// Expression syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i64),
    /// The free variable `x`
    Variable,
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
}

/// Malformed expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expected {expected} at position {position}")]
    Expected {
        expected: &'static str,
        position: usize,
    },

    #[error("integer literal at position {position} is out of range")]
    IntegerOverflow { position: usize },
}

/// Failure of [`evaluate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("could not parse expression '{expression}'")]
    Parse {
        expression: String,
        #[source]
        source: ParseError,
    },

    #[error("expression '{expression}' overflows for x = {x}")]
    Overflow { expression: String, x: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Int(i64),
    X,
    Plus,
    Minus,
    Star,
    Open,
    Close,
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '(' => Token::Open,
            ')' => Token::Close,
            'x' => Token::X,
            c if c.is_ascii_digit() => {
                let mut value = i64::from(c as u8 - b'0');
                while let Some(digit) = chars.peek().and_then(|&(_, d)| d.to_digit(10)) {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(digit)))
                        .ok_or(ParseError::IntegerOverflow { position })?;
                    chars.next();
                }
                Token::Int(value)
            }
            found => return Err(ParseError::UnexpectedChar { found, position }),
        };
        tokens.push((token, position));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.index).map(|&(token, _)| token)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.index).copied();
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .map_or(self.end, |&(_, position)| position)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.index += 1;
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Some(Token::Minus) => {
                    self.index += 1;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.factor()?;
        while self.peek() == Some(Token::Star) {
            self.index += 1;
            lhs = Expr::Mul(Box::new(lhs), Box::new(self.factor()?));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some((Token::Int(value), _)) => Ok(Expr::Literal(value)),
            Some((Token::X, _)) => Ok(Expr::Variable),
            Some((Token::Open, _)) => {
                let inner = self.expr()?;
                match self.next() {
                    Some((Token::Close, _)) => Ok(inner),
                    Some((_, position)) => Err(ParseError::Expected {
                        expected: "')'",
                        position,
                    }),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            Some((_, position)) => Err(ParseError::Expected {
                expected: "a number, 'x' or '('",
                position,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

impl Expr {
    /// Parse an expression
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parser = Parser {
            tokens,
            index: 0,
            end: source.len(),
        };
        let expr = parser.expr()?;

        if parser.index < parser.tokens.len() {
            return Err(ParseError::Expected {
                expected: "an operator",
                position: parser.position(),
            });
        }
        Ok(expr)
    }

    /// Evaluate with `x` bound to the given value.
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn eval(&self, x: i64) -> Option<i64> {
        match self {
            Expr::Literal(value) => Some(*value),
            Expr::Variable => Some(x),
            Expr::Add(lhs, rhs) => lhs.eval(x)?.checked_add(rhs.eval(x)?),
            Expr::Sub(lhs, rhs) => lhs.eval(x)?.checked_sub(rhs.eval(x)?),
            Expr::Mul(lhs, rhs) => lhs.eval(x)?.checked_mul(rhs.eval(x)?),
        }
    }
}

/// Parse `source` and evaluate it for `x`
pub fn evaluate(source: &str, x: i64) -> Result<i64, EvalError> {
    let expr = Expr::parse(source).map_err(|source_err| EvalError::Parse {
        expression: source.to_string(),
        source: source_err,
    })?;
    expr.eval(x).ok_or_else(|| EvalError::Overflow {
        expression: source.to_string(),
        x,
    })
}
