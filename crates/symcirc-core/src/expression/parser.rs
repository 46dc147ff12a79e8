//! Tokenizer and precedence parser for parameter expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := signed (('*' | '/') signed)*
//! signed  := ('-' | '+') signed | power
//! power   := atom (('^' | '**') exponent)?
//! exponent:= ('-' | '+') exponent | power
//! atom    := number | name | name '(' args ')' | '(' sum ')'
//! ```

use symcirc_algebra::{BigRational, units};

use super::ast::{BinaryOp, Expr};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(BigRational),
    Name(String),
    Op(char),
    Open,
    Close,
    Comma,
}

/// Parse a parameter expression such as `2*R1 + 1k`.
pub fn parse_expression(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, next: 0 };
    let expr = parser.sum()?;
    match parser.tokens.get(parser.next) {
        None => Ok(expr),
        Some(tok) => Err(format!("trailing input starting at {:?}", tok)),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();
    while let Some(c) = rest.chars().next() {
        let used = match c {
            '0'..='9' | '.' => {
                let (value, used) = lex_number(rest)?;
                tokens.push(Token::Number(value));
                used
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let used = rest
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(rest.len());
                tokens.push(Token::Name(rest[..used].to_string()));
                used
            }
            '*' if rest.starts_with("**") => {
                tokens.push(Token::Op('^'));
                2
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                1
            }
            '(' => {
                tokens.push(Token::Open);
                1
            }
            ')' => {
                tokens.push(Token::Close);
                1
            }
            ',' => {
                tokens.push(Token::Comma);
                1
            }
            other => return Err(format!("unexpected character '{}'", other)),
        };
        rest = rest[used..].trim_start();
    }
    Ok(tokens)
}

/// Mantissa plus an optional alphabetic SPICE suffix.
fn lex_number(s: &str) -> Result<(BigRational, usize), String> {
    let digits = units::numeric_prefix_len(s);
    if digits == 0 {
        return Err(format!("bad number at '{}'", s));
    }
    let suffix_len = s[digits..]
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len() - digits);
    let (mantissa, suffix) = (&s[..digits], &s[digits..digits + suffix_len]);

    let value = units::parse_decimal(mantissa).ok_or_else(|| format!("bad number '{}'", mantissa))?;
    let scale = units::suffix_multiplier(suffix)
        .ok_or_else(|| format!("unknown suffix '{}' on {}", suffix, mantissa))?;
    Ok((value * scale, digits + suffix_len))
}

struct Parser {
    tokens: Vec<Token>,
    next: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.next).cloned();
        self.next += 1;
        tok
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => {
                let c = *c;
                self.next += 1;
                Some(c)
            }
            _ => None,
        }
    }

    fn sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.product()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.product()?;
            let op = if op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, String> {
        let mut lhs = self.signed()?;
        while let Some(op) = self.eat_op(&['*', '/']) {
            let rhs = self.signed()?;
            let op = if op == '*' { BinaryOp::Mul } else { BinaryOp::Div };
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn signed(&mut self) -> Result<Expr, String> {
        match self.eat_op(&['-', '+']) {
            Some('-') => Ok(Expr::Neg(Box::new(self.signed()?))),
            Some(_) => self.signed(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, String> {
        let base = self.atom()?;
        if self.eat_op(&['^']).is_none() {
            return Ok(base);
        }
        let exponent = self.exponent()?;
        Ok(Expr::binary(BinaryOp::Pow, base, exponent))
    }

    fn exponent(&mut self) -> Result<Expr, String> {
        match self.eat_op(&['-', '+']) {
            Some('-') => Ok(Expr::Neg(Box::new(self.exponent()?))),
            Some(_) => self.exponent(),
            None => self.power(),
        }
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Name(name)) => {
                if self.peek() != Some(&Token::Open) {
                    return Ok(Expr::Param(name));
                }
                self.next += 1;
                let args = self.call_args()?;
                Ok(Expr::Call { name, args })
            }
            Some(Token::Open) => {
                let inner = self.sum()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(tok) => Err(format!("unexpected {:?}", tok)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.next += 1;
            return Ok(args);
        }
        loop {
            args.push(self.sum()?);
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::Close) => return Ok(args),
                _ => return Err("expected ',' or ')' in call".to_string()),
            }
        }
    }
}
