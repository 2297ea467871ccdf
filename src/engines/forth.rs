//! A small Forth dialect over an `f64` data stack.
//!
//! Source is tokenised and interpreted in one pass by [`Forth::eval`]; there
//! is no separate compile step a caller can hoist out of a timed region.
//! [`Forth::check`] rejects malformed source up front but keeps nothing.
//! Colon definitions are compiled into a flat op list with resolved jumps.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

const MAX_CALL_DEPTH: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForthError {
    #[error("stack underflow: pop from empty stack")]
    EmptyStack,
    #[error("unknown word `{0}`")]
    UnknownWord(String),
    #[error("`{0}` is only valid inside a definition")]
    CompileOnly(String),
    #[error("unterminated definition `{0}`")]
    UnterminatedDefinition(String),
    #[error("definition is missing a name")]
    MissingName,
    #[error("unbalanced control flow in `{0}`")]
    UnbalancedControl(String),
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("return stack overflow")]
    CallDepthExceeded,
}

/// The data stack.
#[derive(Debug, Default, Clone)]
pub struct Stack {
    items: Vec<f64>,
}

impl Stack {
    pub fn push(&mut self, value: f64) {
        self.items.push(value);
    }

    pub fn pop(&mut self) -> Result<f64, ForthError> {
        self.items.pop().ok_or(ForthError::EmptyStack)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Print,
    Emit,
    Cr,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("+", Builtin::Add),
    ("-", Builtin::Sub),
    ("*", Builtin::Mul),
    ("/", Builtin::Div),
    ("mod", Builtin::Mod),
    ("dup", Builtin::Dup),
    ("drop", Builtin::Drop),
    ("swap", Builtin::Swap),
    ("over", Builtin::Over),
    ("rot", Builtin::Rot),
    ("=", Builtin::Eq),
    ("<", Builtin::Lt),
    (">", Builtin::Gt),
    ("<=", Builtin::Le),
    (">=", Builtin::Ge),
    (".", Builtin::Print),
    ("emit", Builtin::Emit),
    ("cr", Builtin::Cr),
];

#[derive(Debug, Clone)]
enum Op {
    Push(f64),
    Builtin(Builtin),
    Call(usize),
    JumpIfZero(usize),
    Jump(usize),
}

#[derive(Debug, Clone)]
enum Word {
    Builtin(Builtin),
    User(Rc<[Op]>),
}

#[derive(Debug, Clone)]
pub struct Forth {
    pub stack: Stack,
    words: Vec<Word>,
    names: HashMap<String, usize>,
    output: String,
}

impl Default for Forth {
    fn default() -> Self {
        Self::new()
    }
}

impl Forth {
    pub fn new() -> Self {
        let mut forth = Forth {
            stack: Stack::default(),
            words: Vec::with_capacity(BUILTINS.len()),
            names: HashMap::new(),
            output: String::new(),
        };
        for (name, builtin) in BUILTINS {
            forth.names.insert(name.to_string(), forth.words.len());
            forth.words.push(Word::Builtin(*builtin));
        }
        forth
    }

    /// Clears the data stack and captured output. User definitions survive.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.output.clear();
    }

    /// Text written by `.`, `emit` and `cr`.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.names.contains_key(&name.to_lowercase())
    }

    /// Parse and run `source` against the current stack and dictionary.
    pub fn eval(&mut self, source: &str) -> Result<(), ForthError> {
        let tokens = tokenize(source)?;
        let mut iter = tokens.into_iter();
        while let Some(token) = iter.next() {
            match token.as_str() {
                ":" => self.define(&mut iter)?,
                "if" | "else" | "then" | "recursive" | ";" => {
                    return Err(ForthError::CompileOnly(token));
                }
                _ => {
                    if let Ok(v) = token.parse::<f64>() {
                        self.stack.push(v);
                        continue;
                    }
                    let idx = *self
                        .names
                        .get(&token)
                        .ok_or_else(|| ForthError::UnknownWord(token.clone()))?;
                    self.execute(idx, 0)?;
                }
            }
        }
        Ok(())
    }

    /// Syntax-only pass over `source`: tokenises and compiles every colon
    /// definition on a scratch machine without executing top-level words.
    pub fn check(source: &str) -> Result<(), ForthError> {
        let mut scratch = Forth::new();
        let tokens = tokenize(source)?;
        let mut iter = tokens.into_iter();
        while let Some(token) = iter.next() {
            match token.as_str() {
                ":" => scratch.define(&mut iter)?,
                "if" | "else" | "then" | "recursive" | ";" => {
                    return Err(ForthError::CompileOnly(token));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn define(&mut self, iter: &mut impl Iterator<Item = String>) -> Result<(), ForthError> {
        let name = iter.next().ok_or(ForthError::MissingName)?;
        if name == ";" {
            return Err(ForthError::MissingName);
        }

        // Reserve the slot up front so `recursive` bodies can call themselves.
        let slot = self.words.len();
        self.words.push(Word::User(Rc::from(Vec::new())));
        let previous = self.names.get(&name).copied();

        match self.compile(&name, slot, iter) {
            Ok(ops) => {
                self.words[slot] = Word::User(Rc::from(ops));
                self.names.insert(name, slot);
                Ok(())
            }
            Err(e) => {
                match previous {
                    Some(idx) => self.names.insert(name, idx),
                    None => self.names.remove(&name),
                };
                self.words.truncate(slot);
                Err(e)
            }
        }
    }

    fn compile(
        &mut self,
        name: &str,
        slot: usize,
        iter: &mut impl Iterator<Item = String>,
    ) -> Result<Vec<Op>, ForthError> {
        let unbalanced = || ForthError::UnbalancedControl(name.to_string());
        let mut ops: Vec<Op> = Vec::new();
        // (op index, patched by `else`)
        let mut pending: Vec<(usize, bool)> = Vec::new();

        for token in iter.by_ref() {
            match token.as_str() {
                ";" => {
                    if !pending.is_empty() {
                        return Err(unbalanced());
                    }
                    return Ok(ops);
                }
                "recursive" => {
                    self.names.insert(name.to_string(), slot);
                }
                "if" => {
                    pending.push((ops.len(), false));
                    ops.push(Op::JumpIfZero(usize::MAX));
                }
                "else" => {
                    let (at, is_else) = pending.pop().ok_or_else(unbalanced)?;
                    if is_else {
                        return Err(unbalanced());
                    }
                    pending.push((ops.len(), true));
                    ops.push(Op::Jump(usize::MAX));
                    ops[at] = Op::JumpIfZero(ops.len());
                }
                "then" => {
                    let (at, is_else) = pending.pop().ok_or_else(unbalanced)?;
                    let target = ops.len();
                    ops[at] = if is_else { Op::Jump(target) } else { Op::JumpIfZero(target) };
                }
                ":" => return Err(ForthError::UnterminatedDefinition(name.to_string())),
                _ => {
                    if let Ok(v) = token.parse::<f64>() {
                        ops.push(Op::Push(v));
                        continue;
                    }
                    let idx = *self
                        .names
                        .get(&token)
                        .ok_or_else(|| ForthError::UnknownWord(token.clone()))?;
                    match self.words[idx] {
                        Word::Builtin(b) => ops.push(Op::Builtin(b)),
                        Word::User(_) => ops.push(Op::Call(idx)),
                    }
                }
            }
        }
        Err(ForthError::UnterminatedDefinition(name.to_string()))
    }

    fn execute(&mut self, idx: usize, depth: usize) -> Result<(), ForthError> {
        if depth >= MAX_CALL_DEPTH {
            return Err(ForthError::CallDepthExceeded);
        }
        let ops = match &self.words[idx] {
            Word::Builtin(b) => return self.builtin(*b),
            Word::User(ops) => Rc::clone(ops),
        };
        let mut pc = 0;
        while pc < ops.len() {
            match ops[pc] {
                Op::Push(v) => self.stack.push(v),
                Op::Builtin(b) => self.builtin(b)?,
                Op::Call(target) => self.execute(target, depth + 1)?,
                Op::JumpIfZero(target) => {
                    if self.stack.pop()? == 0.0 {
                        pc = target;
                        continue;
                    }
                }
                Op::Jump(target) => {
                    pc = target;
                    continue;
                }
            }
            pc += 1;
        }
        Ok(())
    }

    fn builtin(&mut self, b: Builtin) -> Result<(), ForthError> {
        let s = &mut self.stack;
        match b {
            Builtin::Add => binary(s, |a, b| a + b)?,
            Builtin::Sub => binary(s, |a, b| a - b)?,
            Builtin::Mul => binary(s, |a, b| a * b)?,
            Builtin::Div => binary(s, |a, b| a / b)?,
            Builtin::Mod => binary(s, |a, b| a % b)?,
            Builtin::Eq => binary(s, |a, b| flag(a == b))?,
            Builtin::Lt => binary(s, |a, b| flag(a < b))?,
            Builtin::Gt => binary(s, |a, b| flag(a > b))?,
            Builtin::Le => binary(s, |a, b| flag(a <= b))?,
            Builtin::Ge => binary(s, |a, b| flag(a >= b))?,
            Builtin::Dup => {
                let v = s.pop()?;
                s.push(v);
                s.push(v);
            }
            Builtin::Drop => {
                s.pop()?;
            }
            Builtin::Swap => {
                let b = s.pop()?;
                let a = s.pop()?;
                s.push(b);
                s.push(a);
            }
            Builtin::Over => {
                let b = s.pop()?;
                let a = s.pop()?;
                s.push(a);
                s.push(b);
                s.push(a);
            }
            Builtin::Rot => {
                let c = s.pop()?;
                let b = s.pop()?;
                let a = s.pop()?;
                s.push(b);
                s.push(c);
                s.push(a);
            }
            Builtin::Print => {
                let v = s.pop()?;
                self.output.push_str(&format!("{v} "));
            }
            Builtin::Emit => {
                let v = s.pop()?;
                if let Some(c) = char::from_u32(v as u32) {
                    self.output.push(c);
                }
            }
            Builtin::Cr => self.output.push('\n'),
        }
        Ok(())
    }
}

fn flag(cond: bool) -> f64 {
    if cond { 1.0 } else { 0.0 }
}

fn binary(s: &mut Stack, f: impl Fn(f64, f64) -> f64) -> Result<(), ForthError> {
    let b = s.pop()?;
    let a = s.pop()?;
    s.push(f(a, b));
    Ok(())
}

/// Whitespace-separated, lower-cased tokens with `( ... )` and `\` comments removed.
fn tokenize(source: &str) -> Result<Vec<String>, ForthError> {
    let mut tokens = Vec::new();
    let mut in_comment = false;
    for line in source.lines() {
        let mut parts = line.split_whitespace();
        while let Some(word) = parts.next() {
            if in_comment {
                if word.ends_with(')') {
                    in_comment = false;
                }
                continue;
            }
            match word {
                "\\" => break,
                "(" => in_comment = true,
                _ => tokens.push(word.to_lowercase()),
            }
        }
    }
    if in_comment {
        return Err(ForthError::UnterminatedComment);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORIAL: &str = ": factorial recursive dup 1 > if dup 1 - factorial * then ; 12 factorial";

    #[test]
    fn test_factorial_leaves_one_value() {
        let mut f = Forth::new();
        f.eval(FACTORIAL).unwrap();
        assert_eq!(f.stack.len(), 1);
        assert_eq!(f.stack.pop().unwrap(), 479001600.0);
        assert_eq!(f.stack.pop(), Err(ForthError::EmptyStack));
    }

    #[test]
    fn test_if_else_then() {
        let mut f = Forth::new();
        f.eval(": sign dup 0 < if drop -1 else 0 > if 1 else 0 then then ;").unwrap();
        f.eval("-5 sign 7 sign 0 sign").unwrap();
        assert_eq!(f.stack.pop().unwrap(), 0.0);
        assert_eq!(f.stack.pop().unwrap(), 1.0);
        assert_eq!(f.stack.pop().unwrap(), -1.0);
    }

    #[test]
    fn test_unknown_word() {
        let mut f = Forth::new();
        assert_eq!(f.eval("1 2 frobnicate"), Err(ForthError::UnknownWord("frobnicate".into())));
    }

    #[test]
    fn test_self_reference_requires_recursive() {
        let mut f = Forth::new();
        let err = f.eval(": loop dup loop ;").unwrap_err();
        assert_eq!(err, ForthError::UnknownWord("loop".into()));
        assert!(!f.is_defined("loop"));
    }

    #[test]
    fn test_unterminated_definition() {
        let mut f = Forth::new();
        assert!(matches!(f.eval(": half 2 /"), Err(ForthError::UnterminatedDefinition(_))));
    }

    #[test]
    fn test_check_compiles_definitions_without_running() {
        assert_eq!(Forth::check(": sq dup * ; drop drop frobnicate"), Ok(()));
        assert_eq!(Forth::check(": f 1"), Err(ForthError::UnterminatedDefinition("f".into())));
        assert_eq!(Forth::check(": f then ;"), Err(ForthError::UnbalancedControl("f".into())));
        assert_eq!(Forth::check(": ;"), Err(ForthError::MissingName));
        assert_eq!(Forth::check("1 else"), Err(ForthError::CompileOnly("else".into())));
    }

    #[test]
    fn test_if_outside_definition() {
        let mut f = Forth::new();
        assert_eq!(f.eval("1 if"), Err(ForthError::CompileOnly("if".into())));
    }

    #[test]
    fn test_runaway_recursion_is_bounded() {
        let mut f = Forth::new();
        f.eval(": down recursive down ;").unwrap();
        assert_eq!(f.eval("down"), Err(ForthError::CallDepthExceeded));
    }

    #[test]
    fn test_comments_and_print() {
        let mut f = Forth::new();
        f.eval("( a comment ) 2 3 + . \\ trailing\n4 .").unwrap();
        assert_eq!(f.output(), "5 4 ");
        assert!(f.stack.is_empty());
    }

    #[test]
    fn test_reset_keeps_definitions() {
        let mut f = Forth::new();
        f.eval(": sq dup * ; 3 sq").unwrap();
        f.reset();
        assert!(f.stack.is_empty());
        assert!(f.is_defined("sq"));
    }
}
