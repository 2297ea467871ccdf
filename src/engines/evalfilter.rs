//! C-like filter scripts compiled to bytecode.
//!
//! [`Eval::prepare`] parses and compiles the script once; [`Eval::execute`]
//! runs the compiled program on a small stack machine and can be called any
//! number of times. Name and arity errors are caught at compile time.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

const MAX_FRAMES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalFilterError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("function `{0}` defined twice")]
    DuplicateFunction(String),
    #[error("`{name}` takes {expected} argument(s), {got} given")]
    Arity { name: String, expected: usize, got: usize },
    #[error("script has not been prepared")]
    NotPrepared,
    #[error("integer overflow")]
    Overflow,
    #[error("division by zero")]
    DivideByZero,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("call depth exceeded")]
    CallDepthExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    Void,
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Void => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Void => f.write_str("void"),
        }
    }
}

// ---------- lexing ----------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Str(String),
    Function,
    If,
    Else,
    While,
    Return,
    True,
    False,
    Sym(&'static str),
}

const SYMBOLS: [&str; 21] = [
    "&&", "||", "<=", ">=", "==", "!=", "+", "-", "*", "/", "%", "<", ">", "!", "=", "(", ")",
    "{", "}", ",", ";",
];

fn lex(source: &str) -> Result<Vec<(Tok, usize)>, EvalFilterError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text.parse().map_err(|_| EvalFilterError::Parse {
                line,
                message: format!("integer literal `{text}` out of range"),
            })?;
            out.push((Tok::Int(n), line));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let tok = match word.as_str() {
                "function" => Tok::Function,
                "if" => Tok::If,
                "else" => Tok::Else,
                "while" => Tok::While,
                "return" => Tok::Return,
                "true" => Tok::True,
                "false" => Tok::False,
                _ => Tok::Ident(word),
            };
            out.push((tok, line));
            continue;
        }
        if c == '"' {
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(EvalFilterError::Parse { line, message: "unterminated string".into() });
            }
            out.push((Tok::Str(chars[start..i].iter().collect()), line));
            i += 1;
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let Some(sym) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) else {
            return Err(EvalFilterError::Parse { line, message: format!("unexpected character `{c}`") });
        };
        i += sym.chars().count();
        out.push((Tok::Sym(*sym), line));
    }
    Ok(out)
}

// ---------- parsing ----------

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone)]
enum Expr {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
    Var(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Expr(Expr),
    Assign(String, Expr),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    While(Expr, Vec<Stmt>),
    Return(Option<Expr>),
}

struct FunctionDef {
    name: String,
    params: Vec<String>,
    body: Vec<Stmt>,
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    functions: Vec<FunctionDef>,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(1)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, EvalFilterError> {
        Err(EvalFilterError::Parse { line: self.line(), message: message.into() })
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, sym: &str) -> Result<(), EvalFilterError> {
        if self.eat(sym) {
            Ok(())
        } else {
            self.error(format!("expected `{sym}`, found {:?}", self.peek()))
        }
    }

    fn ident(&mut self) -> Result<String, EvalFilterError> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            other => self.error(format!("expected identifier, found {other:?}")),
        }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, EvalFilterError> {
        let mut body = Vec::new();
        while self.peek().is_some() {
            if let Some(stmt) = self.statement()? {
                body.push(stmt);
            }
        }
        Ok(body)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, EvalFilterError> {
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.eat("}") {
            if self.peek().is_none() {
                return self.error("unterminated block");
            }
            if let Some(stmt) = self.statement()? {
                body.push(stmt);
            }
        }
        Ok(body)
    }

    /// `None` for function definitions, which are hoisted.
    fn statement(&mut self) -> Result<Option<Stmt>, EvalFilterError> {
        let stmt = match self.peek() {
            Some(Tok::Function) => {
                self.pos += 1;
                let name = self.ident()?;
                self.expect("(")?;
                let mut params = Vec::new();
                if !self.eat(")") {
                    loop {
                        params.push(self.ident()?);
                        if self.eat(")") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                let body = self.block()?;
                self.eat(";");
                self.functions.push(FunctionDef { name, params, body });
                return Ok(None);
            }
            Some(Tok::If) => {
                self.pos += 1;
                self.expect("(")?;
                let cond = self.expr()?;
                self.expect(")")?;
                let then = self.block()?;
                let otherwise = if matches!(self.peek(), Some(Tok::Else)) {
                    self.pos += 1;
                    if matches!(self.peek(), Some(Tok::If)) {
                        self.statement()?.into_iter().collect()
                    } else {
                        self.block()?
                    }
                } else {
                    Vec::new()
                };
                Stmt::If(cond, then, otherwise)
            }
            Some(Tok::While) => {
                self.pos += 1;
                self.expect("(")?;
                let cond = self.expr()?;
                self.expect(")")?;
                Stmt::While(cond, self.block()?)
            }
            Some(Tok::Return) => {
                self.pos += 1;
                if self.eat(";") {
                    return Ok(Some(Stmt::Return(None)));
                }
                let value = self.expr()?;
                self.expect(";")?;
                Stmt::Return(Some(value))
            }
            Some(Tok::Ident(_))
                if matches!(self.tokens.get(self.pos + 1), Some((Tok::Sym("="), _))) =>
            {
                let name = self.ident()?;
                self.pos += 1;
                let value = self.expr()?;
                self.expect(";")?;
                Stmt::Assign(name, value)
            }
            _ => {
                let e = self.expr()?;
                self.expect(";")?;
                Stmt::Expr(e)
            }
        };
        Ok(Some(stmt))
    }

    fn expr(&mut self) -> Result<Expr, EvalFilterError> {
        let mut left = self.and_expr()?;
        while self.eat("||") {
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalFilterError> {
        let mut left = self.comparison()?;
        while self.eat("&&") {
            left = Expr::And(Box::new(left), Box::new(self.comparison()?));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, EvalFilterError>,
    ) -> Result<Expr, EvalFilterError> {
        let mut left = next(self)?;
        'outer: loop {
            for (sym, op) in ops {
                if self.eat(sym) {
                    left = Expr::Binary(*op, Box::new(left), Box::new(next(self)?));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn comparison(&mut self) -> Result<Expr, EvalFilterError> {
        self.binary_level(
            &[
                ("==", BinOp::Eq),
                ("!=", BinOp::Ne),
                ("<=", BinOp::Le),
                (">=", BinOp::Ge),
                ("<", BinOp::Lt),
                (">", BinOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, EvalFilterError> {
        self.binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::term)
    }

    fn term(&mut self) -> Result<Expr, EvalFilterError> {
        self.binary_level(&[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, EvalFilterError> {
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalFilterError> {
        match self.next() {
            Some(Tok::Int(n)) => Ok(Expr::Int(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(Rc::from(s))),
            Some(Tok::True) => Ok(Expr::Bool(true)),
            Some(Tok::False) => Ok(Expr::Bool(false)),
            Some(Tok::Sym("(")) => {
                let e = self.expr()?;
                self.expect(")")?;
                Ok(e)
            }
            Some(Tok::Ident(name)) => {
                if !self.eat("(") {
                    return Ok(Expr::Var(name));
                }
                let mut args = Vec::new();
                if !self.eat(")") {
                    loop {
                        args.push(self.expr()?);
                        if self.eat(")") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            other => self.error(format!("unexpected token {other:?}")),
        }
    }
}

// ---------- compiling ----------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Builtin {
    Print,
    Len,
}

#[derive(Debug, Clone)]
enum Op {
    Push(Value),
    Load(usize),
    Store(usize),
    Pop,
    Binary(BinOp),
    Not,
    Neg,
    Truthy,
    Jump(usize),
    JumpIfFalse(usize),
    Call(usize),
    CallBuiltin(Builtin, usize),
    Return,
}

#[derive(Debug)]
struct Chunk {
    code: Vec<Op>,
    params: usize,
    locals: usize,
}

#[derive(Debug)]
struct Compiled {
    chunks: Vec<Chunk>,
    main: usize,
}

struct Signature {
    index: usize,
    arity: usize,
}

struct Compiler<'a> {
    signatures: &'a HashMap<String, Signature>,
    code: Vec<Op>,
    locals: Vec<String>,
}

impl Compiler<'_> {
    fn slot(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|l| l == name)
    }

    fn block(&mut self, body: &[Stmt]) -> Result<(), EvalFilterError> {
        body.iter().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), EvalFilterError> {
        match stmt {
            Stmt::Expr(e) => {
                self.expr(e)?;
                self.code.push(Op::Pop);
            }
            Stmt::Assign(name, e) => {
                self.expr(e)?;
                let slot = match self.slot(name) {
                    Some(slot) => slot,
                    None => {
                        self.locals.push(name.clone());
                        self.locals.len() - 1
                    }
                };
                self.code.push(Op::Store(slot));
            }
            Stmt::If(cond, then, otherwise) => {
                self.expr(cond)?;
                let to_else = self.placeholder();
                self.block(then)?;
                let to_end = self.placeholder();
                self.patch(to_else, Op::JumpIfFalse(self.code.len()));
                self.block(otherwise)?;
                self.patch(to_end, Op::Jump(self.code.len()));
            }
            Stmt::While(cond, body) => {
                let top = self.code.len();
                self.expr(cond)?;
                let exit = self.placeholder();
                self.block(body)?;
                self.code.push(Op::Jump(top));
                self.patch(exit, Op::JumpIfFalse(self.code.len()));
            }
            Stmt::Return(value) => {
                match value {
                    Some(e) => self.expr(e)?,
                    None => self.code.push(Op::Push(Value::Void)),
                }
                self.code.push(Op::Return);
            }
        }
        Ok(())
    }

    fn placeholder(&mut self) -> usize {
        self.code.push(Op::Jump(usize::MAX));
        self.code.len() - 1
    }

    fn patch(&mut self, at: usize, op: Op) {
        self.code[at] = op;
    }

    fn expr(&mut self, e: &Expr) -> Result<(), EvalFilterError> {
        match e {
            Expr::Int(n) => self.code.push(Op::Push(Value::Int(*n))),
            Expr::Str(s) => self.code.push(Op::Push(Value::Str(Rc::clone(s)))),
            Expr::Bool(b) => self.code.push(Op::Push(Value::Bool(*b))),
            Expr::Var(name) => {
                let slot = self
                    .slot(name)
                    .ok_or_else(|| EvalFilterError::UnknownIdentifier(name.clone()))?;
                self.code.push(Op::Load(slot));
            }
            Expr::Not(inner) => {
                self.expr(inner)?;
                self.code.push(Op::Not);
            }
            Expr::Neg(inner) => {
                self.expr(inner)?;
                self.code.push(Op::Neg);
            }
            Expr::Binary(op, l, r) => {
                self.expr(l)?;
                self.expr(r)?;
                self.code.push(Op::Binary(*op));
            }
            Expr::And(l, r) => {
                self.expr(l)?;
                let short = self.placeholder();
                self.expr(r)?;
                self.code.push(Op::Truthy);
                let end = self.placeholder();
                self.patch(short, Op::JumpIfFalse(self.code.len()));
                self.code.push(Op::Push(Value::Bool(false)));
                self.patch(end, Op::Jump(self.code.len()));
            }
            Expr::Or(l, r) => {
                self.expr(l)?;
                let rhs = self.placeholder();
                self.code.push(Op::Push(Value::Bool(true)));
                let end = self.placeholder();
                self.patch(rhs, Op::JumpIfFalse(self.code.len()));
                self.expr(r)?;
                self.code.push(Op::Truthy);
                self.patch(end, Op::Jump(self.code.len()));
            }
            Expr::Call(name, args) => {
                for a in args {
                    self.expr(a)?;
                }
                let (arity, op) = match (name.as_str(), self.signatures.get(name)) {
                    (_, Some(sig)) => (sig.arity, Op::Call(sig.index)),
                    ("print", None) => (args.len(), Op::CallBuiltin(Builtin::Print, args.len())),
                    ("len", None) => (1, Op::CallBuiltin(Builtin::Len, 1)),
                    _ => return Err(EvalFilterError::UnknownFunction(name.clone())),
                };
                if arity != args.len() {
                    return Err(EvalFilterError::Arity {
                        name: name.clone(),
                        expected: arity,
                        got: args.len(),
                    });
                }
                self.code.push(op);
            }
        }
        Ok(())
    }

    fn finish(mut self, params: usize) -> Chunk {
        self.code.push(Op::Push(Value::Void));
        self.code.push(Op::Return);
        Chunk { code: self.code, params, locals: self.locals.len() }
    }
}

fn compile(source: &str) -> Result<Compiled, EvalFilterError> {
    let mut parser = Parser { tokens: lex(source)?, pos: 0, functions: Vec::new() };
    let main_body = parser.program()?;
    let functions = parser.functions;

    let mut signatures = HashMap::new();
    for (index, f) in functions.iter().enumerate() {
        let sig = Signature { index, arity: f.params.len() };
        if signatures.insert(f.name.clone(), sig).is_some() {
            return Err(EvalFilterError::DuplicateFunction(f.name.clone()));
        }
    }

    let mut chunks = Vec::with_capacity(functions.len() + 1);
    for f in &functions {
        let mut c = Compiler { signatures: &signatures, code: Vec::new(), locals: f.params.clone() };
        c.block(&f.body)?;
        chunks.push(c.finish(f.params.len()));
    }
    let mut c = Compiler { signatures: &signatures, code: Vec::new(), locals: Vec::new() };
    c.block(&main_body)?;
    chunks.push(c.finish(0));
    Ok(Compiled { main: chunks.len() - 1, chunks })
}

// ---------- execution ----------

struct Frame {
    chunk: usize,
    ip: usize,
    base: usize,
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, EvalFilterError> {
    use BinOp::*;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            let checked = |v: Option<i64>| v.map(Value::Int).ok_or(EvalFilterError::Overflow);
            match op {
                Add => checked(x.checked_add(y)),
                Sub => checked(x.checked_sub(y)),
                Mul => checked(x.checked_mul(y)),
                Div | Mod if y == 0 => Err(EvalFilterError::DivideByZero),
                Div => checked(x.checked_div(y)),
                Mod => checked(x.checked_rem(y)),
                Lt => Ok(Value::Bool(x < y)),
                Gt => Ok(Value::Bool(x > y)),
                Le => Ok(Value::Bool(x <= y)),
                Ge => Ok(Value::Bool(x >= y)),
                Eq => Ok(Value::Bool(x == y)),
                Ne => Ok(Value::Bool(x != y)),
            }
        }
        (Value::Str(x), Value::Str(y)) => match op {
            Add => Ok(Value::Str(Rc::from(format!("{x}{y}")))),
            Eq => Ok(Value::Bool(x == y)),
            Ne => Ok(Value::Bool(x != y)),
            _ => Err(EvalFilterError::TypeMismatch(format!("{op:?} on strings"))),
        },
        (x, y) => match op {
            Eq => Ok(Value::Bool(x == y)),
            Ne => Ok(Value::Bool(x != y)),
            _ => Err(EvalFilterError::TypeMismatch(format!("{x} {op:?} {y}"))),
        },
    }
}

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or(Value::Void)
}

fn run(program: &Compiled, stack: &mut Vec<Value>, output: &mut String) -> Result<Value, EvalFilterError> {
    stack.clear();
    let main = &program.chunks[program.main];
    stack.resize(main.locals, Value::Void);
    let mut frames = vec![Frame { chunk: program.main, ip: 0, base: 0 }];

    loop {
        let Some(frame) = frames.last_mut() else {
            return Ok(Value::Void);
        };
        let chunk = &program.chunks[frame.chunk];
        let Some(op) = chunk.code.get(frame.ip) else {
            return Ok(Value::Void);
        };
        frame.ip += 1;
        match op {
            Op::Push(v) => stack.push(v.clone()),
            Op::Load(slot) => {
                let v = stack[frame.base + slot].clone();
                stack.push(v);
            }
            Op::Store(slot) => {
                let v = pop(stack);
                stack[frame.base + slot] = v;
            }
            Op::Pop => {
                stack.pop();
            }
            Op::Binary(op) => {
                let b = pop(stack);
                let a = pop(stack);
                stack.push(binary(*op, a, b)?);
            }
            Op::Not => {
                let v = pop(stack);
                stack.push(Value::Bool(!v.truthy()));
            }
            Op::Truthy => {
                let v = pop(stack);
                stack.push(Value::Bool(v.truthy()));
            }
            Op::Neg => match pop(stack) {
                Value::Int(n) => stack.push(Value::Int(n.checked_neg().ok_or(EvalFilterError::Overflow)?)),
                other => return Err(EvalFilterError::TypeMismatch(format!("-{other}"))),
            },
            Op::Jump(to) => frame.ip = *to,
            Op::JumpIfFalse(to) => {
                if !pop(stack).truthy() {
                    frame.ip = *to;
                }
            }
            Op::Call(index) => {
                if frames.len() >= MAX_FRAMES {
                    return Err(EvalFilterError::CallDepthExceeded);
                }
                let callee = &program.chunks[*index];
                let base = stack.len() - callee.params;
                stack.resize(base + callee.locals, Value::Void);
                frames.push(Frame { chunk: *index, ip: 0, base });
            }
            Op::CallBuiltin(builtin, argc) => {
                let args = stack.split_off(stack.len() - argc);
                let result = match builtin {
                    Builtin::Print => {
                        for a in &args {
                            output.push_str(&a.to_string());
                        }
                        Value::Void
                    }
                    Builtin::Len => match &args[0] {
                        Value::Str(s) => Value::Int(s.chars().count() as i64),
                        other => Value::Int(other.to_string().chars().count() as i64),
                    },
                };
                stack.push(result);
            }
            Op::Return => {
                let result = pop(stack);
                let base = frame.base;
                frames.pop();
                if frames.is_empty() {
                    return Ok(result);
                }
                stack.truncate(base);
                stack.push(result);
            }
        }
    }
}

/// A filter script. Call [`Eval::prepare`] once, then [`Eval::execute`].
pub struct Eval {
    source: String,
    program: Option<Compiled>,
    stack: Vec<Value>,
    output: String,
}

impl Eval {
    pub fn new(source: &str) -> Self {
        Eval { source: source.to_string(), program: None, stack: Vec::new(), output: String::new() }
    }

    pub fn prepare(&mut self) -> Result<(), EvalFilterError> {
        self.program = Some(compile(&self.source)?);
        Ok(())
    }

    pub fn execute(&mut self) -> Result<Value, EvalFilterError> {
        let program = self.program.as_ref().ok_or(EvalFilterError::NotPrepared)?;
        run(program, &mut self.stack, &mut self.output)
    }

    /// Text written by `print` across all executions.
    pub fn output(&self) -> &str {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORIAL: &str = r#"
function fact( n ) {
  if ( n <= 1 ) { return 1; }
  return ( n * fact( n - 1 ) );
}
return fact(12);
"#;

    fn run_script(src: &str) -> Result<Value, EvalFilterError> {
        let mut e = Eval::new(src);
        e.prepare()?;
        e.execute()
    }

    #[test]
    fn test_factorial_repeats() {
        let mut e = Eval::new(FACTORIAL);
        e.prepare().unwrap();
        for _ in 0..3 {
            assert_eq!(e.execute().unwrap(), Value::Int(479001600));
        }
    }

    #[test]
    fn test_execute_requires_prepare() {
        let mut e = Eval::new(FACTORIAL);
        assert_eq!(e.execute(), Err(EvalFilterError::NotPrepared));
    }

    #[test]
    fn test_compile_time_name_errors() {
        assert_eq!(
            run_script("return nope(1);"),
            Err(EvalFilterError::UnknownFunction("nope".into()))
        );
        assert_eq!(
            run_script("return x + 1;"),
            Err(EvalFilterError::UnknownIdentifier("x".into()))
        );
        assert!(matches!(
            run_script("function f(a) { return a; } return f(1, 2);"),
            Err(EvalFilterError::Arity { expected: 1, got: 2, .. })
        ));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = run_script("a = 1;\nreturn (a;").unwrap_err();
        assert!(matches!(err, EvalFilterError::Parse { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_while_and_print() {
        let mut e = Eval::new("i = 0; while (i < 3) { print(i); i = i + 1; } return i;");
        e.prepare().unwrap();
        assert_eq!(e.execute().unwrap(), Value::Int(3));
        assert_eq!(e.output(), "012");
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(run_script("return 0 && (1 / 0);").unwrap(), Value::Bool(false));
        assert_eq!(run_script("return false || 2 > 1;").unwrap(), Value::Bool(true));
        assert_eq!(run_script("return 1 && 0;").unwrap(), Value::Bool(false));
        assert_eq!(run_script("if (!(1 == 2)) { return \"yes\"; } else { return \"no\"; }").unwrap().to_string(), "yes");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let src = FACTORIAL.replace("fact(12)", "fact(30)");
        assert_eq!(run_script(&src), Err(EvalFilterError::Overflow));
    }

    #[test]
    fn test_unbounded_recursion_fails_cleanly() {
        let src = "function f(n) { return f(n + 1); } return f(0);";
        assert_eq!(run_script(src), Err(EvalFilterError::CallDepthExceeded));
    }
}
