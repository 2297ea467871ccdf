//! A small Lisp. Programs are read once by [`Interpreter::new`]; bindings
//! live in an [`Environment`] the caller owns and passes to every
//! [`Interpreter::evaluate`] call.
//!
//! Evaluation failures come back as [`Value::Error`] rather than a `Result`,
//! so callers must inspect the returned value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

const MAX_DEPTH: usize = 1_000;

/// Definitions shipped with the interpreter, written in the language itself.
pub const STDLIB: &str = r#"
(define not (lambda (x) (if x #f #t)))
(define <= (lambda (a b) (if (< a b) #t (= a b))))
(define >= (lambda (a b) (if (> a b) #t (= a b))))
(define zero? (lambda (n) (= n 0)))
(define inc (lambda (n) (+ n 1)))
(define dec (lambda (n) (- n 1)))
(define length (lambda (xs) (if (null? xs) 0 (+ 1 (length (cdr xs))))))
(define map (lambda (f xs) (if (null? xs) nil (cons (f (car xs)) (map f (cdr xs))))))
"#;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LispError {
    #[error("read error: {0}")]
    Read(String),
    #[error("unbound symbol: {0}")]
    Unbound(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("arity error: {0}")]
    Arity(String),
    #[error("integer overflow")]
    Overflow,
    #[error("division by zero")]
    DivideByZero,
    #[error("recursion too deep")]
    Depth,
}

pub type Builtin = fn(&[Value]) -> Result<Value, LispError>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Symbol(Rc<str>),
    List(Rc<[Value]>),
    Lambda(Rc<Lambda>),
    Builtin(&'static str, Builtin),
    Error(String),
}

pub struct Lambda {
    params: Vec<Rc<str>>,
    body: Rc<[Value]>,
    env: Environment,
}

impl Value {
    fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(true) => f.write_str("#t"),
            Value::Bool(false) => f.write_str("#f"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Symbol(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Lambda(_) => f.write_str("#<lambda>"),
            Value::Builtin(name, _) => write!(f, "#<builtin {name}>"),
            Value::Error(msg) => write!(f, "ERROR: {msg}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct Frame {
    vars: HashMap<Rc<str>, Value>,
    parent: Option<Environment>,
}

/// A chain of binding frames. Cloning shares the frame.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Frame { vars: HashMap::new(), parent: None })))
    }

    fn child(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame { vars: HashMap::new(), parent: Some(parent.clone()) })))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.0.borrow();
        match frame.vars.get(name) {
            Some(v) => Some(v.clone()),
            None => frame.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn define(&self, name: impl Into<Rc<str>>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    fn set(&self, name: &str, value: Value) -> Result<(), LispError> {
        let mut frame = self.0.borrow_mut();
        if let Some(slot) = frame.vars.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &frame.parent {
            Some(p) => p.set(name, value),
            None => Err(LispError::Unbound(name.to_string())),
        }
    }
}

/// Install the native primitives into `env`.
pub fn populate_environment(env: &Environment) {
    let builtins: &[(&'static str, Builtin)] = &[
        ("+", |a| fold_ints(a, 0, i64::checked_add)),
        ("*", |a| fold_ints(a, 1, i64::checked_mul)),
        ("-", sub),
        ("/", div),
        ("<", |a| compare(a, |x, y| x < y)),
        (">", |a| compare(a, |x, y| x > y)),
        ("=", |a| compare(a, |x, y| x == y)),
        ("list", |a| Ok(Value::List(Rc::from(a.to_vec())))),
        ("car", car),
        ("cdr", cdr),
        ("cons", cons),
        ("null?", |a| match a {
            [Value::Nil] => Ok(Value::Bool(true)),
            [Value::List(items)] => Ok(Value::Bool(items.is_empty())),
            [_] => Ok(Value::Bool(false)),
            _ => Err(LispError::Arity("null? takes one argument".into())),
        }),
    ];
    for (name, f) in builtins {
        env.define(*name, Value::Builtin(*name, *f));
    }
}

pub struct Interpreter {
    forms: Vec<Value>,
}

impl Interpreter {
    pub fn new(source: &str) -> Result<Self, LispError> {
        Ok(Interpreter { forms: read_all(source)? })
    }

    /// Evaluate every form in order against `env`; yields the last value.
    pub fn evaluate(&self, env: &Environment) -> Value {
        let mut last = Value::Nil;
        for form in &self.forms {
            match eval(form, env, 0) {
                Ok(v) => last = v,
                Err(e) => return Value::Error(e.to_string()),
            }
        }
        last
    }
}

fn eval(expr: &Value, env: &Environment, depth: usize) -> Result<Value, LispError> {
    if depth > MAX_DEPTH {
        return Err(LispError::Depth);
    }
    match expr {
        Value::Symbol(name) => env.get(name).ok_or_else(|| LispError::Unbound(name.to_string())),
        Value::List(items) if !items.is_empty() => {
            if let Value::Symbol(head) = &items[0] {
                match &**head {
                    "quote" => return items.get(1).cloned().ok_or_else(|| arity("quote")),
                    "if" => {
                        let cond = eval(items.get(1).ok_or_else(|| arity("if"))?, env, depth + 1)?;
                        let branch = if cond.truthy() { items.get(2) } else { items.get(3) };
                        return match branch {
                            Some(b) => eval(b, env, depth + 1),
                            None => Ok(Value::Nil),
                        };
                    }
                    "define" => {
                        let [_, Value::Symbol(name), value] = &items[..] else {
                            return Err(arity("define"));
                        };
                        let v = eval(value, env, depth + 1)?;
                        env.define(Rc::clone(name), v);
                        return Ok(Value::Nil);
                    }
                    "set!" => {
                        let [_, Value::Symbol(name), value] = &items[..] else {
                            return Err(arity("set!"));
                        };
                        let v = eval(value, env, depth + 1)?;
                        env.set(name, v)?;
                        return Ok(Value::Nil);
                    }
                    "lambda" => {
                        let [_, Value::List(params), body @ ..] = &items[..] else {
                            return Err(arity("lambda"));
                        };
                        let params = params
                            .iter()
                            .map(|p| match p {
                                Value::Symbol(s) => Ok(Rc::clone(s)),
                                other => Err(LispError::Type(format!("bad parameter {other}"))),
                            })
                            .collect::<Result<_, _>>()?;
                        return Ok(Value::Lambda(Rc::new(Lambda {
                            params,
                            body: Rc::from(body.to_vec()),
                            env: env.clone(),
                        })));
                    }
                    "begin" => return eval_body(&items[1..], env, depth),
                    "let" => {
                        let Some(Value::List(bindings)) = items.get(1) else {
                            return Err(arity("let"));
                        };
                        let scope = Environment::child(env);
                        for binding in bindings.iter() {
                            let Value::List(pair) = binding else {
                                return Err(arity("let"));
                            };
                            let [Value::Symbol(name), value] = &pair[..] else {
                                return Err(arity("let"));
                            };
                            scope.define(Rc::clone(name), eval(value, env, depth + 1)?);
                        }
                        return eval_body(&items[2..], &scope, depth);
                    }
                    _ => {}
                }
            }
            let func = eval(&items[0], env, depth + 1)?;
            let args = items[1..]
                .iter()
                .map(|a| eval(a, env, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            apply(&func, &args, depth)
        }
        other => Ok(other.clone()),
    }
}

fn eval_body(body: &[Value], env: &Environment, depth: usize) -> Result<Value, LispError> {
    let mut last = Value::Nil;
    for form in body {
        last = eval(form, env, depth + 1)?;
    }
    Ok(last)
}

fn apply(func: &Value, args: &[Value], depth: usize) -> Result<Value, LispError> {
    match func {
        Value::Builtin(_, f) => f(args),
        Value::Lambda(lambda) => {
            if lambda.params.len() != args.len() {
                return Err(LispError::Arity(format!(
                    "expected {} argument(s), got {}",
                    lambda.params.len(),
                    args.len()
                )));
            }
            let scope = Environment::child(&lambda.env);
            for (p, a) in lambda.params.iter().zip(args) {
                scope.define(Rc::clone(p), a.clone());
            }
            eval_body(&lambda.body, &scope, depth)
        }
        other => Err(LispError::Type(format!("{other} is not callable"))),
    }
}

fn arity(form: &str) -> LispError {
    LispError::Arity(format!("malformed {form}"))
}

fn ints(args: &[Value]) -> Result<Vec<i64>, LispError> {
    args.iter()
        .map(|a| match a {
            Value::Int(n) => Ok(*n),
            other => Err(LispError::Type(format!("expected integer, got {other}"))),
        })
        .collect()
}

fn fold_ints(args: &[Value], init: i64, f: fn(i64, i64) -> Option<i64>) -> Result<Value, LispError> {
    let mut acc = init;
    for n in ints(args)? {
        acc = f(acc, n).ok_or(LispError::Overflow)?;
    }
    Ok(Value::Int(acc))
}

fn sub(args: &[Value]) -> Result<Value, LispError> {
    match &ints(args)?[..] {
        [] => Err(LispError::Arity("- needs an argument".into())),
        [n] => n.checked_neg().map(Value::Int).ok_or(LispError::Overflow),
        [first, rest @ ..] => {
            let mut acc = *first;
            for n in rest {
                acc = acc.checked_sub(*n).ok_or(LispError::Overflow)?;
            }
            Ok(Value::Int(acc))
        }
    }
}

fn div(args: &[Value]) -> Result<Value, LispError> {
    let [a, b] = &ints(args)?[..] else {
        return Err(LispError::Arity("/ takes two arguments".into()));
    };
    if *b == 0 {
        return Err(LispError::DivideByZero);
    }
    a.checked_div(*b).map(Value::Int).ok_or(LispError::Overflow)
}

fn compare(args: &[Value], f: fn(i64, i64) -> bool) -> Result<Value, LispError> {
    let [a, b] = &ints(args)?[..] else {
        return Err(LispError::Arity("comparison takes two arguments".into()));
    };
    Ok(Value::Bool(f(*a, *b)))
}

fn car(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::List(items)] => Ok(items.first().cloned().unwrap_or(Value::Nil)),
        [Value::Nil] => Ok(Value::Nil),
        _ => Err(LispError::Type("car expects a list".into())),
    }
}

fn cdr(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [Value::List(items)] if items.len() > 1 => Ok(Value::List(Rc::from(items[1..].to_vec()))),
        [Value::List(_)] | [Value::Nil] => Ok(Value::Nil),
        _ => Err(LispError::Type("cdr expects a list".into())),
    }
}

fn cons(args: &[Value]) -> Result<Value, LispError> {
    match args {
        [head, Value::List(tail)] => {
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(head.clone());
            items.extend(tail.iter().cloned());
            Ok(Value::List(Rc::from(items)))
        }
        [head, Value::Nil] => Ok(Value::List(Rc::from(vec![head.clone()]))),
        _ => Err(LispError::Type("cons expects an item and a list".into())),
    }
}

fn read_all(source: &str) -> Result<Vec<Value>, LispError> {
    let tokens = tokenize(source)?;
    let mut pos = 0;
    let mut forms = Vec::new();
    while pos < tokens.len() {
        forms.push(read(&tokens, &mut pos)?);
    }
    Ok(forms)
}

fn tokenize(source: &str) -> Result<Vec<String>, LispError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ';' => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            '(' | ')' | '\'' => {
                tokens.push(c.to_string());
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::from("\"");
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some(other) => s.push(other),
                            None => return Err(LispError::Read("unterminated string".into())),
                        },
                        Some(other) => s.push(other),
                        None => return Err(LispError::Read("unterminated string".into())),
                    }
                }
                tokens.push(s);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut atom = String::new();
                while let Some(c) = chars.next_if(|&c| !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | ';')) {
                    atom.push(c);
                }
                tokens.push(atom);
            }
        }
    }
    Ok(tokens)
}

fn read(tokens: &[String], pos: &mut usize) -> Result<Value, LispError> {
    let token = tokens.get(*pos).ok_or_else(|| LispError::Read("unexpected end of input".into()))?;
    *pos += 1;
    match token.as_str() {
        "(" => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos).map(String::as_str) {
                    None => return Err(LispError::Read("missing )".into())),
                    Some(")") => {
                        *pos += 1;
                        return Ok(Value::List(Rc::from(items)));
                    }
                    Some(_) => items.push(read(tokens, pos)?),
                }
            }
        }
        ")" => Err(LispError::Read("unexpected )".into())),
        "'" => {
            let quoted = read(tokens, pos)?;
            Ok(Value::List(Rc::from(vec![Value::Symbol(Rc::from("quote")), quoted])))
        }
        _ => Ok(atom(token)),
    }
}

fn atom(token: &str) -> Value {
    if let Some(s) = token.strip_prefix('"') {
        return Value::Str(Rc::from(s));
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::Int(n);
    }
    match token {
        "#t" | "true" => Value::Bool(true),
        "#f" | "false" => Value::Bool(false),
        "nil" => Value::Nil,
        _ => Value::Symbol(Rc::from(token)),
    }
}
