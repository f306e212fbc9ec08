//! A small restricted expression language for user-supplied predicates
//! (spec.md §4.5, §9).
//!
//! No scripting-engine crate (`rhai`, `boa`, `mlua`, `deno_core`)
//! appears anywhere in the retrieval corpus this crate was grounded
//! against, so this is hand-rolled per spec.md §9's own suggestion: a
//! lexer, a recursive-descent parser, and a tree-walking evaluator
//! over a small dynamic `Value`. There are no loops and no function
//! definitions — the only side effect the language permits is
//! assignment into `custom_data.*` / `global_data.*`, matching the
//! "predicates are expected to be pure and fast" requirement while
//! still allowing the scratch-space writes spec.md calls for.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use std::collections::BTreeMap;
use std::fmt;

// ── Values ───────────────────────────────────────────────────────────

/// A predicate's return value, or an intermediate expression result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// The evaluation context tree: a read/write view over the
/// PolicyContext, built once per evaluation (spec.md §4.5). Only
/// `Object` nodes are addressable by the language's field-access
/// syntax; arrays exist in the tree (e.g. `groups`) but are not
/// indexable from predicate source — there is no subscript syntax,
/// which keeps the language simple by construction rather than by
/// convention.
#[derive(Debug, Clone, PartialEq)]
pub enum CtxValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<CtxValue>),
    Object(BTreeMap<String, CtxValue>),
}

impl CtxValue {
    pub fn object() -> Self {
        CtxValue::Object(BTreeMap::new())
    }

    fn get(&self, key: &str) -> Option<&CtxValue> {
        match self {
            CtxValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    fn get_path(&self, path: &[String]) -> Option<&CtxValue> {
        let mut cur = self;
        for seg in path {
            cur = cur.get(seg)?;
        }
        Some(cur)
    }

    fn set_path(&mut self, path: &[String], value: CtxValue) -> Result<(), EvalError> {
        if path.is_empty() {
            return Err(EvalError("cannot assign to empty path".into()));
        }
        let mut cur = self;
        for seg in &path[..path.len() - 1] {
            let map = match cur {
                CtxValue::Object(map) => map,
                _ => return Err(EvalError(format!("cannot descend into non-object at '{}'", seg))),
            };
            cur = map
                .entry(seg.clone())
                .or_insert_with(CtxValue::object);
        }
        let last = &path[path.len() - 1];
        match cur {
            CtxValue::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            _ => Err(EvalError("cannot assign into non-object".into())),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            CtxValue::Null => Value::Null,
            CtxValue::Bool(b) => Value::Bool(*b),
            CtxValue::Number(n) => Value::Number(*n),
            CtxValue::Str(s) => Value::Str(s.clone()),
            CtxValue::Array(_) | CtxValue::Object(_) => Value::Null,
        }
    }

    fn from_value(v: Value) -> Self {
        match v {
            Value::Null => CtxValue::Null,
            Value::Bool(b) => CtxValue::Bool(b),
            Value::Number(n) => CtxValue::Number(n),
            Value::Str(s) => CtxValue::Str(s),
        }
    }

    /// Convert an arbitrary `serde_json::Value` into a `CtxValue`
    /// tree. JSON has no NaN/Infinity; those only ever arise inside
    /// the language itself (e.g. `0/0`).
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => CtxValue::Null,
            serde_json::Value::Bool(b) => CtxValue::Bool(*b),
            serde_json::Value::Number(n) => CtxValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => CtxValue::Str(s.clone()),
            serde_json::Value::Array(arr) => {
                CtxValue::Array(arr.iter().map(CtxValue::from_json).collect())
            }
            serde_json::Value::Object(map) => CtxValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), CtxValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CtxValue::Null => serde_json::Value::Null,
            CtxValue::Bool(b) => serde_json::Value::Bool(*b),
            CtxValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CtxValue::Str(s) => serde_json::Value::String(s.clone()),
            CtxValue::Array(arr) => serde_json::Value::Array(arr.iter().map(|x| x.to_json()).collect()),
            CtxValue::Object(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalError(pub String);

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for EvalError {}

#[derive(Debug, Clone)]
pub struct CompileError(pub String);

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for CompileError {}

// ── Lexer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Dot,
    Semicolon,
    Question,
    Colon,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Not,
    Assign,
}

fn lex(src: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
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
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::LtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::GtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(CompileError("unterminated string literal".into()));
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| CompileError(format!("bad number literal '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(match text.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(text),
                });
            }
            other => return Err(CompileError(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

// ── AST ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Path(Vec<String>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Expr(Expr),
    Assign(Vec<String>, Expr),
}

// ── Parser ───────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), CompileError> {
        match self.advance() {
            Some(ref t) if t == tok => Ok(()),
            other => Err(CompileError(format!("expected {:?}, found {:?}", tok, other))),
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.parse_stmt()?);
            if self.peek() == Some(&Token::Semicolon) {
                self.advance();
            } else {
                break;
            }
        }
        if self.peek().is_some() {
            return Err(CompileError(format!("unexpected trailing token {:?}", self.peek())));
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let checkpoint = self.pos;
        if let Some(Token::Ident(_)) = self.peek() {
            if let Ok(path) = self.parse_path() {
                if self.peek() == Some(&Token::Assign) {
                    self.advance();
                    let value = self.parse_ternary()?;
                    return Ok(Stmt::Assign(path, value));
                }
            }
        }
        self.pos = checkpoint;
        Ok(Stmt::Expr(self.parse_ternary()?))
    }

    fn parse_path(&mut self) -> Result<Vec<String>, CompileError> {
        let mut path = Vec::new();
        match self.advance() {
            Some(Token::Ident(name)) => path.push(name),
            other => return Err(CompileError(format!("expected identifier, found {:?}", other))),
        }
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            match self.advance() {
                Some(Token::Ident(name)) => path.push(name),
                other => return Err(CompileError(format!("expected field name, found {:?}", other))),
            }
        }
        Ok(path)
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_or()?;
        if self.peek() == Some(&Token::Question) {
            self.advance();
            let then_branch = self.parse_ternary()?;
            self.expect(&Token::Colon)?;
            let else_branch = self.parse_ternary()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch)));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::LtEq,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::LParen) => {
                let e = self.parse_ternary()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) => {
                let mut path = vec![name];
                while self.peek() == Some(&Token::Dot) {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(field)) => path.push(field),
                        other => {
                            return Err(CompileError(format!("expected field name, found {:?}", other)))
                        }
                    }
                }
                Ok(Expr::Path(path))
            }
            other => Err(CompileError(format!("unexpected token {:?}", other))),
        }
    }
}

// ── Evaluator ────────────────────────────────────────────────────────

fn eval_expr(expr: &Expr, ctx: &CtxValue) -> Result<Value, EvalError> {
    Ok(match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Str(s) => Value::Str(s.clone()),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Null => Value::Null,
        Expr::Path(path) => ctx.get_path(path).map(CtxValue::to_value).unwrap_or(Value::Null),
        Expr::Neg(inner) => {
            let v = eval_expr(inner, ctx)?;
            Value::Number(-v.as_number().unwrap_or(f64::NAN))
        }
        Expr::Not(inner) => Value::Bool(!eval_expr(inner, ctx)?.is_truthy()),
        Expr::Ternary(cond, then_e, else_e) => {
            if eval_expr(cond, ctx)?.is_truthy() {
                eval_expr(then_e, ctx)?
            } else {
                eval_expr(else_e, ctx)?
            }
        }
        Expr::Binary(op, l, r) => eval_binary(*op, l, r, ctx)?,
    })
}

fn eval_binary(op: BinOp, l: &Expr, r: &Expr, ctx: &CtxValue) -> Result<Value, EvalError> {
    match op {
        BinOp::And => {
            let lv = eval_expr(l, ctx)?;
            if !lv.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval_expr(r, ctx)?.is_truthy()));
        }
        BinOp::Or => {
            let lv = eval_expr(l, ctx)?;
            if lv.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval_expr(r, ctx)?.is_truthy()));
        }
        _ => {}
    }

    let lv = eval_expr(l, ctx)?;
    let rv = eval_expr(r, ctx)?;

    Ok(match op {
        BinOp::Add => {
            if let (Value::Str(a), Value::Str(b)) = (&lv, &rv) {
                Value::Str(format!("{}{}", a, b))
            } else {
                Value::Number(lv.as_number().unwrap_or(f64::NAN) + rv.as_number().unwrap_or(f64::NAN))
            }
        }
        BinOp::Sub => Value::Number(lv.as_number().unwrap_or(f64::NAN) - rv.as_number().unwrap_or(f64::NAN)),
        BinOp::Mul => Value::Number(lv.as_number().unwrap_or(f64::NAN) * rv.as_number().unwrap_or(f64::NAN)),
        BinOp::Div => Value::Number(lv.as_number().unwrap_or(f64::NAN) / rv.as_number().unwrap_or(f64::NAN)),
        BinOp::Eq => Value::Bool(lv == rv),
        BinOp::NotEq => Value::Bool(lv != rv),
        BinOp::Lt => Value::Bool(lv.as_number().unwrap_or(f64::NAN) < rv.as_number().unwrap_or(f64::NAN)),
        BinOp::LtEq => Value::Bool(lv.as_number().unwrap_or(f64::NAN) <= rv.as_number().unwrap_or(f64::NAN)),
        BinOp::Gt => Value::Bool(lv.as_number().unwrap_or(f64::NAN) > rv.as_number().unwrap_or(f64::NAN)),
        BinOp::GtEq => Value::Bool(lv.as_number().unwrap_or(f64::NAN) >= rv.as_number().unwrap_or(f64::NAN)),
        BinOp::And | BinOp::Or => unreachable!("short-circuited above"),
    })
}

// ── Public API ───────────────────────────────────────────────────────

/// A predicate compiled once and cached by `(kind, policy_id)`
/// (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    program: Vec<Stmt>,
}

impl CompiledPredicate {
    /// Evaluate against a mutable context tree. Assignment statements
    /// may only target `custom_data.*` / `global_data.*` — any other
    /// lvalue root is a runtime error, caught by the caller and
    /// treated as "no action" per spec.md §4.5.
    pub fn eval(&self, ctx: &mut CtxValue) -> Result<Value, EvalError> {
        let mut result = Value::Null;
        for stmt in &self.program {
            match stmt {
                Stmt::Expr(e) => result = eval_expr(e, ctx)?,
                Stmt::Assign(path, e) => {
                    match path.first().map(String::as_str) {
                        Some("custom_data") | Some("global_data") => {}
                        _ => {
                            return Err(EvalError(format!(
                                "assignment to '{}' is not permitted; only custom_data.* and global_data.* are writable",
                                path.join(".")
                            )))
                        }
                    }
                    let v = eval_expr(e, ctx)?;
                    ctx.set_path(path, CtxValue::from_value(v.clone()))?;
                    result = v;
                }
            }
        }
        Ok(result)
    }
}

pub fn compile(src: &str) -> Result<CompiledPredicate, CompileError> {
    let tokens = lex(src)?;
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    if program.is_empty() {
        return Err(CompileError("predicate source is empty".into()));
    }
    Ok(CompiledPredicate { program })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(fields: &[(&str, CtxValue)]) -> CtxValue {
        let mut map = BTreeMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v.clone());
        }
        CtxValue::Object(map)
    }

    #[test]
    fn literal_and_arithmetic() {
        let pred = compile("1 + 2 * 3").unwrap();
        let mut ctx = CtxValue::object();
        assert_eq!(pred.eval(&mut ctx).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn field_access_and_comparison() {
        let group = ctx_with(&[("price_change_pct", CtxValue::Number(62.0))]);
        let mut ctx = ctx_with(&[("group", group)]);
        let pred = compile("group.price_change_pct > 50").unwrap();
        assert_eq!(pred.eval(&mut ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn ternary_and_boolean_ops() {
        let mut ctx = ctx_with(&[("group", ctx_with(&[("price_change_pct", CtxValue::Number(10.0))]))]);
        let pred = compile("group.price_change_pct > 50 ? 100 : 0").unwrap();
        assert_eq!(pred.eval(&mut ctx).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn assignment_persists_into_custom_data() {
        let mut ctx = ctx_with(&[("custom_data", CtxValue::object())]);
        let pred = compile("custom_data.seen = true; custom_data.seen").unwrap();
        let result = pred.eval(&mut ctx).unwrap();
        assert_eq!(result, Value::Bool(true));
        let stored = ctx.get_path(&["custom_data".into(), "seen".into()]).unwrap();
        assert_eq!(*stored, CtxValue::Bool(true));
    }

    #[test]
    fn assignment_to_disallowed_root_is_rejected() {
        let mut ctx = ctx_with(&[("pair", CtxValue::object())]);
        let pred = compile("pair.symbol = \"HACK\"").unwrap();
        assert!(pred.eval(&mut ctx).is_err());
    }

    #[test]
    fn division_by_zero_yields_infinity_not_panic() {
        let mut ctx = CtxValue::object();
        let pred = compile("1 / 0").unwrap();
        let v = pred.eval(&mut ctx).unwrap();
        match v {
            Value::Number(n) => assert!(n.is_infinite()),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn missing_field_resolves_to_null_not_error() {
        let mut ctx = CtxValue::object();
        let pred = compile("trade").unwrap();
        assert_eq!(pred.eval(&mut ctx).unwrap(), Value::Null);
    }

    #[test]
    fn compile_rejects_empty_source() {
        assert!(compile("").is_err());
    }

    #[test]
    fn compile_rejects_malformed_source() {
        assert!(compile("group..price").is_err());
        assert!(compile("(1 + 2").is_err());
    }

    #[test]
    fn json_round_trip_preserves_numbers_and_bools() {
        let json = serde_json::json!({"a": 1.5, "b": true, "c": "x", "d": null});
        let ctx = CtxValue::from_json(&json);
        assert_eq!(ctx.get("a").cloned(), Some(CtxValue::Number(1.5)));
        assert_eq!(ctx.get("b").cloned(), Some(CtxValue::Bool(true)));
        assert_eq!(ctx.to_json(), json);
    }
}
