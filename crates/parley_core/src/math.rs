//! Arithmetic detection and evaluation.
//!
//! Expressions are parsed into a small tree restricted to + - * / // % **
//! and unary signs, then evaluated directly. Anything else (names, calls,
//! juxtaposition) is rejected. Integer arithmetic stays integral until an
//! operation needs a float, matching the usual calculator conventions:
//! `/` always yields a float, `//` and `%` floor toward negative infinity.

/// Phrases stripped before looking for an expression.
const TRIGGERS: &[&str] = &["solve ", "what is ", "how much is ", "whats "];

/// Pull an expression out of "what is 10 * 5" style text.
///
/// Returns `None` unless a trigger phrase was present and the remainder is
/// itself an expression.
pub fn extract(text: &str) -> Option<String> {
    let trimmed = text.trim();
    for trigger in TRIGGERS {
        let has_prefix = trimmed
            .get(..trigger.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(trigger))
            .unwrap_or(false);
        if !has_prefix {
            continue;
        }

        let remainder = trimmed[trigger.len()..].trim().trim_end_matches('?').trim();
        if is_expression(remainder) {
            return Some(remainder.to_string());
        }
        return None;
    }
    None
}

/// Does the text look like arithmetic?
///
/// Requires only digits, whitespace and `+-*/().^%` after symbol
/// normalization, plus at least one digit and one operator.
pub fn is_expression(text: &str) -> bool {
    let cleaned = canonical_symbols(text.trim());
    if cleaned.is_empty() {
        return false;
    }

    let allowed = |c: char| c.is_ascii_digit() || c.is_whitespace() || "+-*/().^%".contains(c);
    if !cleaned.chars().all(allowed) {
        return false;
    }

    let has_digit = cleaned.chars().any(|c| c.is_ascii_digit());
    let has_operator = cleaned.chars().any(|c| "+-*/%".contains(c));
    has_digit && has_operator
}

/// Evaluate an expression. `None` for anything that cannot be computed:
/// syntax errors, division by zero, non-finite results.
pub fn evaluate(expr: &str) -> Option<(f64, String)> {
    let cleaned = canonical_symbols(expr.trim());
    let tokens = lex(&cleaned)?;
    let mut parser = Parser { tokens, pos: 0 };
    let tree = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }

    match eval(&tree)? {
        Num::Int(i) => Some((i as f64, i.to_string())),
        Num::Float(f) if f.is_finite() => Some((f, format_float(f))),
        Num::Float(_) => None,
    }
}

fn canonical_symbols(text: &str) -> String {
    text.replace('^', "**")
        .replace('x', "*")
        .replace('×', "*")
        .replace('÷', "/")
}

/// Up to six decimals, trailing zeros and point trimmed.
fn format_float(value: f64) -> String {
    let fixed = format!("{:.6}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    LParen,
    RParen,
}

fn lex(text: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                if literal.contains('.') {
                    if literal == "." || literal.matches('.').count() > 1 {
                        return None;
                    }
                    tokens.push(Token::Float(literal.parse().ok()?));
                } else {
                    match literal.parse::<i64>() {
                        Ok(v) => tokens.push(Token::Int(v)),
                        Err(_) => tokens.push(Token::Float(literal.parse().ok()?)),
                    }
                }
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Power);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ => return None,
        }
    }

    Some(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(Num),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinOp::Add),
            Some(Token::Minus) => Some(BinOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinOp::Mul),
            Some(Token::Slash) => Some(BinOp::Div),
            Some(Token::DoubleSlash) => Some(BinOp::FloorDiv),
            Some(Token::Percent) => Some(BinOp::Mod),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Option<Expr> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                Some(Expr::Unary(UnaryOp::Plus, Box::new(self.unary()?)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Some(Expr::Unary(UnaryOp::Minus, Box::new(self.unary()?)))
            }
            _ => self.power(),
        }
    }

    // power := primary ('**' unary)?   (right-associative, binds tighter than unary minus on its left)
    fn power(&mut self) -> Option<Expr> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Power) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Some(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Some(base)
    }

    fn primary(&mut self) -> Option<Expr> {
        match self.bump()? {
            Token::Int(v) => Some(Expr::Num(Num::Int(v))),
            Token::Float(v) => Some(Expr::Num(Num::Float(v))),
            Token::LParen => {
                let inner = self.expr()?;
                match self.bump()? {
                    Token::RParen => Some(inner),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn eval(expr: &Expr) -> Option<Num> {
    match expr {
        Expr::Num(n) => Some(*n),
        Expr::Unary(op, inner) => {
            let value = eval(inner)?;
            Some(match (op, value) {
                (UnaryOp::Plus, v) => v,
                (UnaryOp::Minus, Num::Int(i)) => match i.checked_neg() {
                    Some(n) => Num::Int(n),
                    None => Num::Float(-(i as f64)),
                },
                (UnaryOp::Minus, Num::Float(f)) => Num::Float(-f),
            })
        }
        Expr::Binary(op, lhs, rhs) => apply(*op, eval(lhs)?, eval(rhs)?),
    }
}

fn apply(op: BinOp, lhs: Num, rhs: Num) -> Option<Num> {
    if let (Num::Int(a), Num::Int(b)) = (lhs, rhs) {
        return apply_int(op, a, b);
    }
    apply_float(op, lhs.as_f64(), rhs.as_f64())
}

fn apply_int(op: BinOp, a: i64, b: i64) -> Option<Num> {
    let widened = || apply_float(op, a as f64, b as f64);
    match op {
        BinOp::Add => a.checked_add(b).map(Num::Int).or_else(widened),
        BinOp::Sub => a.checked_sub(b).map(Num::Int).or_else(widened),
        BinOp::Mul => a.checked_mul(b).map(Num::Int).or_else(widened),
        BinOp::Div => apply_float(op, a as f64, b as f64),
        BinOp::FloorDiv => {
            if b == 0 {
                return None;
            }
            let Some(q) = a.checked_div(b) else {
                return widened();
            };
            let q = if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q };
            Some(Num::Int(q))
        }
        BinOp::Mod => {
            if b == 0 {
                return None;
            }
            let Some(r) = a.checked_rem(b) else {
                return widened();
            };
            let r = if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r };
            Some(Num::Int(r))
        }
        BinOp::Pow => {
            if b < 0 {
                return apply_float(op, a as f64, b as f64);
            }
            u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .map(Num::Int)
                .or_else(widened)
        }
    }
}

fn apply_float(op: BinOp, a: f64, b: f64) -> Option<Num> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return None;
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return None;
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return None;
            }
            a.powf(b)
        }
    };

    if value.is_finite() {
        Some(Num::Float(value))
    } else {
        None
    }
}
