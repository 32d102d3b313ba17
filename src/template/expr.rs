//! Restricted expression language.
//!
//! Expressions are parsed into a small AST and interpreted against a JSON
//! scope. There is no function call syntax and no assignment, so evaluating
//! page-author expressions can only read data.
//!
//! ```text
//! ternary   := or ('?' ternary ':' ternary)?
//! or        := and ('||' and)*
//! and       := equality ('&&' equality)*
//! equality  := compare (('==' | '!=' | '===' | '!==') compare)*
//! compare   := additive (('<' | '<=' | '>' | '>=') additive)*
//! additive  := term (('+' | '-') term)*
//! term      := unary (('*' | '/' | '%') unary)*
//! unary     := ('!' | '-' | '+') unary | postfix
//! postfix   := primary ('.' ident | '[' ternary ']')*
//! primary   := literal | ident | '(' ternary ')' | '[' list ']'
//! ```

use serde_json::{Number, Value};
use thiserror::Error;

/// Runtime evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error in `{source_text}`: {message}")]
    Syntax { source_text: String, message: String },

    #[error("cannot read property `{property}` of null")]
    NullAccess { property: String },
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

// =============================================================================
// Scope
// =============================================================================

/// Variable lookup: loop bindings first, then top-level keys of the context.
pub struct Scope<'a> {
    context: &'a Value,
    locals: Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a Value) -> Self {
        Self {
            context,
            locals: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &str, value: Value) {
        self.locals.push((name.to_string(), value));
    }

    pub fn pop(&mut self) {
        self.locals.pop();
    }

    fn lookup(&self, name: &str) -> Value {
        if let Some((_, v)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return v.clone();
        }
        self.context.get(name).cloned().unwrap_or(Value::Null)
    }
}

// =============================================================================
// Value semantics
// =============================================================================

/// Truthiness used by `if`, `&&`, `||`, `!` and fragment conditions.
///
/// The string `"false"` is falsy so that `if="${'false'}"` and `if="false"`
/// suppress a fragment.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String coercion used by interpolation.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn number(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            a == b
        }
        _ => to_number(a) == to_number(b),
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> bool {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            BinaryOp::Lt => x < y,
            BinaryOp::Le => x <= y,
            BinaryOp::Gt => x > y,
            _ => x >= y,
        };
    }
    let (x, y) = (to_number(a), to_number(b));
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        _ => x >= y,
    }
}

fn property(target: &Value, key: &str) -> Result<Value, EvalError> {
    match target {
        Value::Null => Err(EvalError::NullAccess {
            property: key.to_string(),
        }),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => Ok(match key {
            "length" => Value::from(items.len()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
        }),
        Value::String(s) if key == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

// =============================================================================
// Evaluation
// =============================================================================

impl Expr {
    /// Parse a standalone expression.
    pub fn parse(src: &str) -> Result<Self, EvalError> {
        let syntax = |message: String| EvalError::Syntax {
            source_text: src.to_string(),
            message,
        };
        let tokens = tokenize(src).map_err(syntax)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.ternary().map_err(syntax)?;
        if let Some(tok) = parser.peek() {
            return Err(syntax(format!("unexpected token {tok:?}")));
        }
        Ok(expr)
    }

    pub fn eval(&self, scope: &Scope<'_>) -> Result<Value, EvalError> {
        Ok(match self {
            Self::Literal(v) => v.clone(),
            Self::Ident(name) => scope.lookup(name),
            Self::Member(target, key) => property(&target.eval(scope)?, key)?,
            Self::Index(target, index) => {
                let target = target.eval(scope)?;
                let key = match index.eval(scope)? {
                    Value::String(s) => s,
                    other => display(&other),
                };
                property(&target, &key)?
            }
            Self::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|e| e.eval(scope))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Unary(op, operand) => {
                let v = operand.eval(scope)?;
                match op {
                    UnaryOp::Not => Value::Bool(!truthy(&v)),
                    UnaryOp::Neg => number(-to_number(&v)),
                    UnaryOp::Plus => number(to_number(&v)),
                }
            }
            Self::Binary(BinaryOp::And, lhs, rhs) => {
                let l = lhs.eval(scope)?;
                if truthy(&l) { rhs.eval(scope)? } else { l }
            }
            Self::Binary(BinaryOp::Or, lhs, rhs) => {
                let l = lhs.eval(scope)?;
                if truthy(&l) { l } else { rhs.eval(scope)? }
            }
            Self::Binary(op, lhs, rhs) => binary(*op, &lhs.eval(scope)?, &rhs.eval(scope)?),
            Self::Ternary(cond, then, otherwise) => {
                if truthy(&cond.eval(scope)?) {
                    then.eval(scope)?
                } else {
                    otherwise.eval(scope)?
                }
            }
        })
    }
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if a.is_string() || b.is_string() {
                Value::String(display(a) + &display(b))
            } else {
                number(to_number(a) + to_number(b))
            }
        }
        BinaryOp::Sub => number(to_number(a) - to_number(b)),
        BinaryOp::Mul => number(to_number(a) * to_number(b)),
        BinaryOp::Div => number(to_number(a) / to_number(b)),
        BinaryOp::Rem => number(to_number(a) % to_number(b)),
        BinaryOp::Eq => Value::Bool(loose_eq(a, b)),
        BinaryOp::Ne => Value::Bool(!loose_eq(a, b)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(a, b)),
        BinaryOp::StrictNe => Value::Bool(!strict_eq(a, b)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(compare(op, a, b)),
        // short-circuit operators are handled in `eval`
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

/// Strict equality, exposed for `switch`/`case` matching.
pub fn case_matches(subject: &Value, case: &Value) -> bool {
    strict_eq(subject, case)
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

const PUNCTS: [&str; 23] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
    "(", ")", "[", "]", ".", ",", "?",
];

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text.parse().map_err(|_| format!("bad number `{text}`"))?;
            tokens.push(Token::Num(n));
        } else if c == '\'' || c == '"' || c == '`' {
            let (s, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(s));
            i = next;
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == ':' {
            tokens.push(Token::Punct(":"));
            i += 1;
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let punct = PUNCTS
                .iter()
                .find(|p| rest.starts_with(*p))
                .copied()
                .ok_or_else(|| format!("unexpected character `{c}`"))?;
            tokens.push(Token::Punct(punct));
            i += punct.len();
        }
    }
    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(&other) => out.push(other),
                    None => break,
                }
            }
            c if c == quote => return Ok((out, i + 1)),
            c => out.push(c),
        }
        i += 1;
    }
    Err("unterminated string literal".into())
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult = Result<Expr, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), String> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(format!("expected `{punct}`"))
        }
    }

    fn ternary(&mut self) -> ParseResult {
        let cond = self.or()?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.ternary()?;
        self.expect(":")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ParseResult,
    ) -> ParseResult {
        let mut lhs = next(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat(punct) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn or(&mut self) -> ParseResult {
        self.binary_level(&[("||", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> ParseResult {
        self.binary_level(&[("&&", BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> ParseResult {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            Self::compare,
        )
    }

    fn compare(&mut self) -> ParseResult {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> ParseResult {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> ParseResult {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> ParseResult {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Neg
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> ParseResult {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                match self.tokens.get(self.pos).cloned() {
                    Some(Token::Ident(name)) => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), name);
                    }
                    _ => return Err("expected property name after `.`".into()),
                }
            } else if self.eat("[") {
                let index = self.ternary()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ParseResult {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err("unexpected end of expression".into());
        };
        self.pos += 1;
        match token {
            Token::Num(n) => Ok(Expr::Literal(number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let inner = self.ternary()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Punct(p) => Err(format!("unexpected `{p}`")),
        }
    }
}
