//! A monkey-style scripting language: lexer, Pratt parser and a tree-walking
//! evaluator over a shared, mutable environment.
//!
//! The parser collects error messages instead of stopping at the first one;
//! the evaluator reports failures as [`Object::Error`] values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

const MAX_DEPTH: usize = 1_000;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Let,
    Fn,
    Function,
    If,
    Else,
    Return,
    True,
    False,
    Assign,
    Plus,
    Minus,
    Bang,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Illegal(String),
    Eof,
}

static EOF: Token = Token::Eof;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer { chars: input.chars().collect(), pos: 0 }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Token {
        loop {
            match self.peek_at(0) {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek_at(0), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let Some(c) = self.peek_at(0) else {
            return Token::Eof;
        };
        let two = |lexer: &mut Lexer, tok: Token| {
            lexer.pos += 2;
            tok
        };
        match (c, self.peek_at(1)) {
            ('=', Some('=')) => return two(self, Token::Eq),
            ('!', Some('=')) => return two(self, Token::NotEq),
            ('<', Some('=')) => return two(self, Token::Le),
            ('>', Some('=')) => return two(self, Token::Ge),
            _ => {}
        }
        if c.is_ascii_digit() {
            let start = self.pos;
            while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            return match text.parse() {
                Ok(n) => Token::Int(n),
                Err(_) => Token::Illegal(text),
            };
        }
        if c.is_alphabetic() || c == '_' {
            let start = self.pos;
            while self.peek_at(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
                self.pos += 1;
            }
            let word: String = self.chars[start..self.pos].iter().collect();
            return match word.as_str() {
                "let" => Token::Let,
                "fn" => Token::Fn,
                "function" => Token::Function,
                "if" => Token::If,
                "else" => Token::Else,
                "return" => Token::Return,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(word),
            };
        }
        if c == '"' {
            self.pos += 1;
            let start = self.pos;
            while self.peek_at(0).is_some_and(|c| c != '"') {
                self.pos += 1;
            }
            if self.peek_at(0).is_none() {
                return Token::Illegal("unterminated string".into());
            }
            let s = self.chars[start..self.pos].iter().collect();
            self.pos += 1;
            return Token::Str(s);
        }
        self.pos += 1;
        match c {
            '=' => Token::Assign,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '!' => Token::Bang,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '<' => Token::Lt,
            '>' => Token::Gt,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            other => Token::Illegal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Let(String, Expression),
    Return(Expression),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub enum Expression {
    Ident(String),
    Int(i64),
    Str(String),
    Bool(bool),
    Prefix(Operator, Box<Expression>),
    Infix(Operator, Box<Expression>, Box<Expression>),
    If(Box<Expression>, Rc<[Statement]>, Option<Rc<[Statement]>>),
    Function(Rc<[String]>, Rc<[Statement]>),
    Call(Box<Expression>, Vec<Expression>),
}

/// Operator carried by prefix and infix expressions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Plus,
    Minus,
    Bang,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn infix_op(tok: &Token) -> Option<(Operator, Precedence)> {
    Some(match tok {
        Token::Eq => (Operator::Eq, Precedence::Equals),
        Token::NotEq => (Operator::NotEq, Precedence::Equals),
        Token::Lt => (Operator::Lt, Precedence::LessGreater),
        Token::Gt => (Operator::Gt, Precedence::LessGreater),
        Token::Le => (Operator::Le, Precedence::LessGreater),
        Token::Ge => (Operator::Ge, Precedence::LessGreater),
        Token::Plus => (Operator::Plus, Precedence::Sum),
        Token::Minus => (Operator::Minus, Precedence::Sum),
        Token::Star => (Operator::Star, Precedence::Product),
        Token::Slash => (Operator::Slash, Precedence::Product),
        Token::Percent => (Operator::Percent, Precedence::Product),
        _ => return None,
    })
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn cur(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos + 1).unwrap_or(&EOF)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect_peek(&mut self, want: &Token) -> bool {
        if self.peek() == want {
            self.advance();
            true
        } else {
            self.errors.push(format!("expected next token to be {want:?}, got {:?}", self.peek()));
            false
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while *self.cur() != Token::Eof {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.advance();
        }
        program
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur().clone() {
            Token::Let => {
                let Token::Ident(name) = self.peek().clone() else {
                    self.errors.push(format!("expected identifier after let, got {:?}", self.peek()));
                    return None;
                };
                self.advance();
                if !self.expect_peek(&Token::Assign) {
                    return None;
                }
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                if *self.peek() == Token::Semicolon {
                    self.advance();
                }
                Some(Statement::Let(name, value))
            }
            // `function name(a) { ... }` is sugar for `let name = fn(a) { ... };`
            Token::Function => {
                let Token::Ident(name) = self.peek().clone() else {
                    self.errors.push("expected function name".to_string());
                    return None;
                };
                self.advance();
                let func = self.parse_function_literal()?;
                if *self.peek() == Token::Semicolon {
                    self.advance();
                }
                Some(Statement::Let(name, func))
            }
            Token::Return => {
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                if *self.peek() == Token::Semicolon {
                    self.advance();
                }
                Some(Statement::Return(value))
            }
            Token::Semicolon => None,
            _ => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                if *self.peek() == Token::Semicolon {
                    self.advance();
                }
                Some(Statement::Expression(expr))
            }
        }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = match self.cur().clone() {
            Token::Ident(name) => Expression::Ident(name),
            Token::Int(n) => Expression::Int(n),
            Token::Str(s) => Expression::Str(s),
            Token::True => Expression::Bool(true),
            Token::False => Expression::Bool(false),
            Token::Bang | Token::Minus => {
                let op = if *self.cur() == Token::Bang { Operator::Bang } else { Operator::Minus };
                self.advance();
                let right = self.parse_expression(Precedence::Prefix)?;
                Expression::Prefix(op, Box::new(right))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                if !self.expect_peek(&Token::RParen) {
                    return None;
                }
                inner
            }
            Token::If => self.parse_if()?,
            Token::Fn => self.parse_function_literal()?,
            other => {
                self.errors.push(format!("no prefix parse function for {other:?}"));
                return None;
            }
        };

        while *self.peek() != Token::Semicolon {
            if *self.peek() == Token::LParen {
                if precedence >= Precedence::Call {
                    break;
                }
                self.advance();
                let args = self.parse_call_arguments()?;
                left = Expression::Call(Box::new(left), args);
                continue;
            }
            let Some((op, prec)) = infix_op(self.peek()) else {
                break;
            };
            if precedence >= prec {
                break;
            }
            self.advance();
            self.advance();
            let right = self.parse_expression(prec)?;
            left = Expression::Infix(op, Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn parse_if(&mut self) -> Option<Expression> {
        if !self.expect_peek(&Token::LParen) {
            return None;
        }
        self.advance();
        let cond = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(&Token::RParen) || !self.expect_peek(&Token::LBrace) {
            return None;
        }
        let consequence = self.parse_block()?;
        let alternative = if *self.peek() == Token::Else {
            self.advance();
            if !self.expect_peek(&Token::LBrace) {
                return None;
            }
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(Expression::If(Box::new(cond), consequence, alternative))
    }

    /// Parses `(params) { body }` with the cursor on the token before `(`.
    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(&Token::LParen) {
            return None;
        }
        let mut params = Vec::new();
        self.advance();
        while *self.cur() != Token::RParen {
            match self.cur().clone() {
                Token::Ident(p) => params.push(p),
                other => {
                    self.errors.push(format!("bad parameter {other:?}"));
                    return None;
                }
            }
            self.advance();
            match self.cur() {
                Token::Comma => self.advance(),
                Token::RParen => {}
                other => {
                    self.errors.push(format!("expected , or ) in parameters, got {other:?}"));
                    return None;
                }
            }
        }
        if !self.expect_peek(&Token::LBrace) {
            return None;
        }
        let body = self.parse_block()?;
        Some(Expression::Function(Rc::from(params), body))
    }

    fn parse_block(&mut self) -> Option<Rc<[Statement]>> {
        let mut statements = Vec::new();
        self.advance();
        while !matches!(self.cur(), Token::RBrace | Token::Eof) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.advance();
        }
        if *self.cur() == Token::Eof {
            self.errors.push("unterminated block".to_string());
            return None;
        }
        Some(Rc::from(statements))
    }

    fn parse_call_arguments(&mut self) -> Option<Vec<Expression>> {
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.advance();
            return Some(args);
        }
        self.advance();
        args.push(self.parse_expression(Precedence::Lowest)?);
        while *self.peek() == Token::Comma {
            self.advance();
            self.advance();
            args.push(self.parse_expression(Precedence::Lowest)?);
        }
        if !self.expect_peek(&Token::RParen) {
            return None;
        }
        Some(args)
    }
}

pub type BuiltinFn = fn(&[Object]) -> Object;

#[derive(Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    Null,
    ReturnValue(Box<Object>),
    Function(Rc<Function>),
    Builtin(BuiltinFn),
    Error(String),
}

pub struct Function {
    params: Rc<[String]>,
    body: Rc<[Statement]>,
    env: Environment,
}

impl Object {
    pub fn inspect(&self) -> String {
        self.to_string()
    }

    fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    fn truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{n}"),
            Object::Boolean(b) => write!(f, "{b}"),
            Object::Str(s) => f.write_str(s),
            Object::Null => f.write_str("null"),
            Object::ReturnValue(v) => write!(f, "{v}"),
            Object::Function(func) => write!(f, "fn({}) {{ ... }}", func.params.join(", ")),
            Object::Builtin(_) => f.write_str("builtin function"),
            Object::Error(msg) => write!(f, "ERROR: {msg}"),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

struct Scope {
    store: HashMap<String, Object>,
    outer: Option<Environment>,
}

/// Variable bindings; clones share the same scope.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Scope { store: HashMap::new(), outer: None })))
    }

    fn enclosed(outer: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope { store: HashMap::new(), outer: Some(outer.clone()) })))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        let scope = self.0.borrow();
        match scope.store.get(name) {
            Some(v) => Some(v.clone()),
            None => scope.outer.as_ref().and_then(|o| o.get(name)),
        }
    }

    pub fn set(&self, name: &str, value: Object) {
        self.0.borrow_mut().store.insert(name.to_string(), value);
    }
}

fn builtin_len(args: &[Object]) -> Object {
    match args {
        [Object::Str(s)] => Object::Integer(s.chars().count() as i64),
        [other] => Object::Error(format!("argument to `len` not supported, got {other}")),
        _ => Object::Error(format!("wrong number of arguments. got={}, want=1", args.len())),
    }
}

fn builtin_puts(_args: &[Object]) -> Object {
    Object::Null
}

fn builtin(name: &str) -> Option<BuiltinFn> {
    match name {
        "len" => Some(builtin_len),
        "puts" => Some(builtin_puts),
        _ => None,
    }
}

/// Evaluate a parsed program against `env`, unwrapping a top-level `return`.
pub fn eval(program: &Program, env: &Environment) -> Object {
    let mut result = Object::Null;
    for stmt in &program.statements {
        result = eval_statement(stmt, env, 0);
        match result {
            Object::ReturnValue(v) => return *v,
            Object::Error(_) => return result,
            _ => {}
        }
    }
    result
}

fn eval_block(statements: &[Statement], env: &Environment, depth: usize) -> Object {
    let mut result = Object::Null;
    for stmt in statements {
        result = eval_statement(stmt, env, depth);
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(stmt: &Statement, env: &Environment, depth: usize) -> Object {
    match stmt {
        Statement::Let(name, expr) => {
            let value = eval_expression(expr, env, depth);
            if value.is_error() {
                return value;
            }
            env.set(name, value);
            Object::Null
        }
        Statement::Return(expr) => {
            let value = eval_expression(expr, env, depth);
            if value.is_error() {
                return value;
            }
            Object::ReturnValue(Box::new(value))
        }
        Statement::Expression(expr) => eval_expression(expr, env, depth),
    }
}

fn eval_expression(expr: &Expression, env: &Environment, depth: usize) -> Object {
    match expr {
        Expression::Int(n) => Object::Integer(*n),
        Expression::Str(s) => Object::Str(Rc::from(s.as_str())),
        Expression::Bool(b) => Object::Boolean(*b),
        Expression::Ident(name) => env
            .get(name)
            .or_else(|| builtin(name).map(Object::Builtin))
            .unwrap_or_else(|| Object::Error(format!("identifier not found: {name}"))),
        Expression::Prefix(op, right) => {
            let right = eval_expression(right, env, depth);
            if right.is_error() {
                return right;
            }
            match (op, right) {
                (Operator::Bang, r) => Object::Boolean(!r.truthy()),
                (Operator::Minus, Object::Integer(n)) => match n.checked_neg() {
                    Some(v) => Object::Integer(v),
                    None => Object::Error("integer overflow".into()),
                },
                (op, r) => Object::Error(format!("unknown operator: {op:?}{r}")),
            }
        }
        Expression::Infix(op, left, right) => {
            let left = eval_expression(left, env, depth);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env, depth);
            if right.is_error() {
                return right;
            }
            eval_infix(*op, left, right)
        }
        Expression::If(cond, consequence, alternative) => {
            let cond = eval_expression(cond, env, depth);
            if cond.is_error() {
                return cond;
            }
            if cond.truthy() {
                eval_block(consequence, env, depth)
            } else if let Some(alt) = alternative {
                eval_block(alt, env, depth)
            } else {
                Object::Null
            }
        }
        Expression::Function(params, body) => Object::Function(Rc::new(Function {
            params: Rc::clone(params),
            body: Rc::clone(body),
            env: env.clone(),
        })),
        Expression::Call(callee, args) => {
            let func = eval_expression(callee, env, depth);
            if func.is_error() {
                return func;
            }
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                let v = eval_expression(a, env, depth);
                if v.is_error() {
                    return v;
                }
                values.push(v);
            }
            apply(&func, &values, depth + 1)
        }
    }
}

fn apply(func: &Object, args: &[Object], depth: usize) -> Object {
    if depth > MAX_DEPTH {
        return Object::Error("maximum call depth exceeded".into());
    }
    match func {
        Object::Function(f) => {
            if f.params.len() != args.len() {
                return Object::Error(format!(
                    "wrong number of arguments: want={}, got={}",
                    f.params.len(),
                    args.len()
                ));
            }
            let scope = Environment::enclosed(&f.env);
            for (p, a) in f.params.iter().zip(args) {
                scope.set(p, a.clone());
            }
            match eval_block(&f.body, &scope, depth) {
                Object::ReturnValue(v) => *v,
                other => other,
            }
        }
        Object::Builtin(b) => b(args),
        other => Object::Error(format!("not a function: {other}")),
    }
}

fn eval_infix(op: Operator, left: Object, right: Object) -> Object {
    match (left, right) {
        (Object::Integer(a), Object::Integer(b)) => {
            let checked = |v: Option<i64>| v.map(Object::Integer).unwrap_or_else(|| Object::Error("integer overflow".into()));
            match op {
                Operator::Plus => checked(a.checked_add(b)),
                Operator::Minus => checked(a.checked_sub(b)),
                Operator::Star => checked(a.checked_mul(b)),
                Operator::Slash if b == 0 => Object::Error("division by zero".into()),
                Operator::Slash => checked(a.checked_div(b)),
                Operator::Percent if b == 0 => Object::Error("division by zero".into()),
                Operator::Percent => checked(a.checked_rem(b)),
                Operator::Lt => Object::Boolean(a < b),
                Operator::Gt => Object::Boolean(a > b),
                Operator::Le => Object::Boolean(a <= b),
                Operator::Ge => Object::Boolean(a >= b),
                Operator::Eq => Object::Boolean(a == b),
                Operator::NotEq => Object::Boolean(a != b),
                Operator::Bang => Object::Error("unknown operator: !".into()),
            }
        }
        (Object::Str(a), Object::Str(b)) => match op {
            Operator::Plus => Object::Str(Rc::from(format!("{a}{b}"))),
            Operator::Eq => Object::Boolean(a == b),
            Operator::NotEq => Object::Boolean(a != b),
            _ => Object::Error(format!("unknown operator: STRING {op:?} STRING")),
        },
        (Object::Boolean(a), Object::Boolean(b)) => match op {
            Operator::Eq => Object::Boolean(a == b),
            Operator::NotEq => Object::Boolean(a != b),
            _ => Object::Error(format!("unknown operator: BOOLEAN {op:?} BOOLEAN")),
        },
        (l, r) => Object::Error(format!("type mismatch: {l} {op:?} {r}")),
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

    fn parse(src: &str) -> Program {
        let mut p = Parser::new(Lexer::new(src));
        let program = p.parse_program();
        assert!(p.errors().is_empty(), "parse errors: {:?}", p.errors());
        program
    }

    #[test]
    fn test_factorial() {
        let program = parse(FACTORIAL);
        let env = Environment::new();
        assert_eq!(eval(&program, &env).inspect(), "479001600");
        assert_eq!(eval(&program, &env).inspect(), "479001600");
    }

    #[test]
    fn test_let_and_closures() {
        let program = parse("let add = fn(a) { fn(b) { a + b } }; let inc = add(1); inc(41);");
        assert_eq!(eval(&program, &Environment::new()).inspect(), "42");
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 - -4 == 11");
        assert_eq!(eval(&program, &Environment::new()).inspect(), "true");
    }

    #[test]
    fn test_parse_errors_are_collected() {
        let mut p = Parser::new(Lexer::new("let = 5; let x 3;"));
        p.parse_program();
        assert!(p.errors().len() >= 2);
    }

    #[test]
    fn test_unknown_identifier_is_error_object() {
        let program = parse("missing + 1");
        assert!(matches!(eval(&program, &Environment::new()), Object::Error(_)));
    }

    #[test]
    fn test_builtin_len() {
        let program = parse("len(\"hello\")");
        assert_eq!(eval(&program, &Environment::new()).inspect(), "5");
    }
}
