//! A line-numbered BASIC with one statement per line.
//!
//! Numbers are `f64`. Line numbers are jump labels only: lines run in source
//! order, and `GOTO`/`GOSUB` resolve to the first line carrying the target
//! number. There is no way to reset a program; re-running an
//! [`Interpreter`] continues with whatever variables the last run left.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

const MAX_GOSUB_DEPTH: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BasicError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("no such line {0}")]
    UnknownLine(u32),
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
    #[error("GOSUB nesting too deep")]
    GosubDepth,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("undefined variable {0}")]
    Undefined(String),
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    Op(&'static str),
    Comma,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Keyword {
    Let,
    If,
    Then,
    Else,
    Goto,
    Gosub,
    Return,
    End,
    Print,
    Rem,
}

fn keyword(word: &str) -> Option<Keyword> {
    Some(match word.to_ascii_uppercase().as_str() {
        "LET" => Keyword::Let,
        "IF" => Keyword::If,
        "THEN" => Keyword::Then,
        "ELSE" => Keyword::Else,
        "GOTO" => Keyword::Goto,
        "GOSUB" => Keyword::Gosub,
        "RETURN" => Keyword::Return,
        "END" => Keyword::End,
        "PRINT" => Keyword::Print,
        "REM" => Keyword::Rem,
        _ => return None,
    })
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Str(String),
    Var(String),
    Neg(Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Let(String, Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Goto(usize),
    Gosub(usize),
    Return,
    End,
    Print(Vec<Expr>),
    Nop,
}

#[derive(Debug, Clone)]
pub struct Interpreter {
    program: Rc<[Stmt]>,
    variables: HashMap<String, Value>,
    output: String,
}

impl Interpreter {
    /// Tokenise and parse `source`; jump targets are resolved here.
    pub fn new(source: &str) -> Result<Self, BasicError> {
        let mut numbered: Vec<(Option<u32>, Vec<Token>, usize)> = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let tokens = tokenize(raw).map_err(|message| BasicError::Syntax { line: line_no, message })?;
            if tokens.is_empty() {
                continue;
            }
            let (label, rest) = match tokens.first() {
                Some(Token::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => (Some(*n as u32), tokens[1..].to_vec()),
                _ => (None, tokens),
            };
            numbered.push((label, rest, line_no));
        }

        let mut labels: HashMap<u32, usize> = HashMap::new();
        for (idx, (label, _, _)) in numbered.iter().enumerate() {
            if let Some(l) = label {
                labels.entry(*l).or_insert(idx);
            }
        }

        let mut program = Vec::with_capacity(numbered.len());
        for (_, tokens, line_no) in &numbered {
            let mut parser = Parser { tokens, pos: 0, labels: &labels };
            let stmt = parser.statement().map_err(|e| match e {
                BasicError::Syntax { message, .. } => BasicError::Syntax { line: *line_no, message },
                other => other,
            })?;
            if parser.pos != tokens.len() {
                return Err(BasicError::Syntax { line: *line_no, message: "trailing tokens".into() });
            }
            program.push(stmt);
        }

        Ok(Interpreter { program: Rc::from(program), variables: HashMap::new(), output: String::new() })
    }

    pub fn run(&mut self) -> Result<(), BasicError> {
        let program = Rc::clone(&self.program);
        let mut pc = 0;
        let mut returns: Vec<usize> = Vec::new();
        while pc < program.len() {
            match self.exec(&program[pc], pc, &mut returns)? {
                Flow::Next => pc += 1,
                Flow::Jump(target) => pc = target,
                Flow::Halt => break,
            }
        }
        Ok(())
    }

    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(&name.to_ascii_uppercase())
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    fn exec(&mut self, stmt: &Stmt, pc: usize, returns: &mut Vec<usize>) -> Result<Flow, BasicError> {
        match stmt {
            Stmt::Let(name, expr) => {
                let v = self.eval(expr)?;
                self.variables.insert(name.clone(), v);
            }
            Stmt::If(cond, then, otherwise) => {
                let truthy = match self.eval(cond)? {
                    Value::Number(n) => n != 0.0,
                    Value::Str(s) => !s.is_empty(),
                };
                if truthy {
                    return self.exec(then, pc, returns);
                } else if let Some(o) = otherwise {
                    return self.exec(o, pc, returns);
                }
            }
            Stmt::Goto(target) => return Ok(Flow::Jump(*target)),
            Stmt::Gosub(target) => {
                if returns.len() >= MAX_GOSUB_DEPTH {
                    return Err(BasicError::GosubDepth);
                }
                returns.push(pc + 1);
                return Ok(Flow::Jump(*target));
            }
            Stmt::Return => {
                let back = returns.pop().ok_or(BasicError::ReturnWithoutGosub)?;
                return Ok(Flow::Jump(back));
            }
            Stmt::End => return Ok(Flow::Halt),
            Stmt::Print(items) => {
                for item in items {
                    let v = self.eval(item)?;
                    self.output.push_str(&v.to_string().replace("\\n", "\n"));
                }
            }
            Stmt::Nop => {}
        }
        Ok(Flow::Next)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, BasicError> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Var(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| BasicError::Undefined(name.clone()))?,
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => Value::Number(-n),
                Value::Str(_) => return Err(BasicError::TypeMismatch("cannot negate a string".into())),
            },
            Expr::Binary(op, l, r) => {
                let (l, r) = (self.eval(l)?, self.eval(r)?);
                match (l, r) {
                    (Value::Number(a), Value::Number(b)) => Value::Number(match *op {
                        "+" => a + b,
                        "-" => a - b,
                        "*" => a * b,
                        "/" if b == 0.0 => return Err(BasicError::DivisionByZero),
                        "/" => a / b,
                        "<" => truth(a < b),
                        ">" => truth(a > b),
                        "<=" => truth(a <= b),
                        ">=" => truth(a >= b),
                        "=" => truth(a == b),
                        "<>" => truth(a != b),
                        other => return Err(BasicError::TypeMismatch(format!("bad operator {other}"))),
                    }),
                    (Value::Str(a), Value::Str(b)) => match *op {
                        "+" => Value::Str(a + &b),
                        "=" => Value::Number(truth(a == b)),
                        "<>" => Value::Number(truth(a != b)),
                        other => return Err(BasicError::TypeMismatch(format!("{other} on strings"))),
                    },
                    _ => return Err(BasicError::TypeMismatch(format!("mixed operands for {op}"))),
                }
            }
        })
    }
}

enum Flow {
    Next,
    Jump(usize),
    Halt,
}

fn truth(cond: bool) -> f64 {
    if cond { 1.0 } else { 0.0 }
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text.parse::<f64>().map_err(|_| format!("bad number {text}"))?;
            tokens.push(Token::Number(n));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '$' || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match keyword(&word) {
                Some(Keyword::Rem) => {
                    tokens.push(Token::Keyword(Keyword::Rem));
                    break;
                }
                Some(k) => tokens.push(Token::Keyword(k)),
                None => tokens.push(Token::Ident(word.to_ascii_uppercase())),
            }
        } else if c == '"' {
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            if i >= chars.len() {
                return Err("unterminated string".into());
            }
            tokens.push(Token::Str(chars[start..i].iter().collect()));
            i += 1;
        } else {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            let op = match two.as_str() {
                "<=" => Some("<="),
                ">=" => Some(">="),
                "<>" => Some("<>"),
                _ => None,
            };
            if let Some(op) = op {
                tokens.push(Token::Op(op));
                i += 2;
                continue;
            }
            tokens.push(match c {
                '+' => Token::Op("+"),
                '-' => Token::Op("-"),
                '*' => Token::Op("*"),
                '/' => Token::Op("/"),
                '<' => Token::Op("<"),
                '>' => Token::Op(">"),
                '=' => Token::Op("="),
                ',' => Token::Comma,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(format!("unexpected character {other:?}")),
            });
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    labels: &'a HashMap<u32, usize>,
}

impl Parser<'_> {
    fn syntax(&self, message: impl Into<String>) -> BasicError {
        BasicError::Syntax { line: 0, message: message.into() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn statement(&mut self) -> Result<Stmt, BasicError> {
        match self.next() {
            None => Ok(Stmt::Nop),
            Some(Token::Keyword(Keyword::Rem)) => Ok(Stmt::Nop),
            Some(Token::Keyword(Keyword::Let)) => self.assignment(),
            Some(Token::Ident(_)) => {
                self.pos -= 1;
                self.assignment()
            }
            Some(Token::Keyword(Keyword::If)) => {
                let cond = self.expr()?;
                if self.next() != Some(Token::Keyword(Keyword::Then)) {
                    return Err(self.syntax("expected THEN"));
                }
                let then = self.branch()?;
                let otherwise = if self.peek() == Some(&Token::Keyword(Keyword::Else)) {
                    self.pos += 1;
                    Some(Box::new(self.branch()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, Box::new(then), otherwise))
            }
            Some(Token::Keyword(Keyword::Goto)) => Ok(Stmt::Goto(self.target()?)),
            Some(Token::Keyword(Keyword::Gosub)) => Ok(Stmt::Gosub(self.target()?)),
            Some(Token::Keyword(Keyword::Return)) => Ok(Stmt::Return),
            Some(Token::Keyword(Keyword::End)) => Ok(Stmt::End),
            Some(Token::Keyword(Keyword::Print)) => {
                let mut items = Vec::new();
                while self.peek().is_some() {
                    items.push(self.expr()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    }
                }
                Ok(Stmt::Print(items))
            }
            Some(other) => Err(self.syntax(format!("unexpected {other:?}"))),
        }
    }

    /// `THEN 230` is shorthand for `THEN GOTO 230`.
    fn branch(&mut self) -> Result<Stmt, BasicError> {
        if let Some(Token::Number(_)) = self.peek() {
            return Ok(Stmt::Goto(self.target()?));
        }
        self.statement()
    }

    fn assignment(&mut self) -> Result<Stmt, BasicError> {
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(self.syntax("expected variable name")),
        };
        if self.next() != Some(Token::Op("=")) {
            return Err(self.syntax("expected ="));
        }
        Ok(Stmt::Let(name, self.expr()?))
    }

    fn target(&mut self) -> Result<usize, BasicError> {
        match self.next() {
            Some(Token::Number(n)) => {
                let label = n as u32;
                self.labels.get(&label).copied().ok_or(BasicError::UnknownLine(label))
            }
            _ => Err(self.syntax("expected line number")),
        }
    }

    fn expr(&mut self) -> Result<Expr, BasicError> {
        let left = self.additive()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if matches!(op, "<" | ">" | "<=" | ">=" | "=" | "<>") {
                self.pos += 1;
                let right = self.additive()?;
                return Ok(Expr::Binary(op, Box::new(left), Box::new(right)));
            }
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, BasicError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ("+" | "-"))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, BasicError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ ("*" | "/"))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, BasicError> {
        if self.peek() == Some(&Token::Op("-")) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, BasicError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let e = self.expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.syntax("expected )"));
                }
                Ok(e)
            }
            other => Err(self.syntax(format!("unexpected {other:?} in expression"))),
        }
    }
}
