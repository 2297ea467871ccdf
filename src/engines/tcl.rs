//! A TCL-like command language. Every value is a string; arithmetic is done
//! by prefix commands (`+`, `*`, `<=`, ...) over `i64`.
//!
//! [`Interpreter::new`] parses the whole program once. Braced bodies handed to
//! `proc`, `if` and `while` are parsed the first time they run and cached by
//! text, so repeated [`Interpreter::evaluate`] calls do no parsing.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

const MAX_DEPTH: usize = 1_000;

/// Procedures shipped with the interpreter, prepended to user programs by
/// callers that want them.
pub const STDLIB: &str = r#"
proc abs {n} {
    if {< $n 0} { return [- 0 $n] } else { return $n }
}
proc max {a b} {
    if {> $a $b} { return $a } else { return $b }
}
proc min {a b} {
    if {< $a $b} { return $a } else { return $b }
}
proc square {n} {
    return [* $n $n]
}
"#;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TclError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid command name \"{0}\"")]
    UnknownCommand(String),
    #[error("can't read \"{0}\": no such variable")]
    UnknownVariable(String),
    #[error("wrong # args: {0}")]
    Arity(String),
    #[error("expected integer but got \"{0}\"")]
    NotANumber(String),
    #[error("integer overflow")]
    Overflow,
    #[error("divide by zero")]
    DivideByZero,
    #[error("too many nested evaluations")]
    Depth,
    /// Control-flow signal raised by `return`. Procedures absorb it; it only
    /// escapes [`Interpreter::evaluate`] when `return` runs at top level.
    #[error("return outside proc")]
    Return(String),
    #[error("invoked \"break\" outside of a loop")]
    Break,
}

type Script = Vec<Command>;
type Command = Vec<Word>;

#[derive(Debug, Clone)]
enum Word {
    Literal(String),
    Parts(Vec<Part>),
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Var(String),
    Subst(Script),
}

#[derive(Debug, Clone)]
struct Proc {
    params: Vec<String>,
    body: String,
}

#[derive(Debug)]
pub struct Interpreter {
    program: Rc<Script>,
    procs: HashMap<String, Rc<Proc>>,
    frames: Vec<HashMap<String, String>>,
    cache: HashMap<String, Rc<Script>>,
    output: String,
    depth: usize,
}

impl Interpreter {
    pub fn new(source: &str) -> Result<Self, TclError> {
        let program = Parser::new(source).script(false)?;
        Ok(Interpreter {
            program: Rc::new(program),
            procs: HashMap::new(),
            frames: vec![HashMap::new()],
            cache: HashMap::new(),
            output: String::new(),
            depth: 0,
        })
    }

    /// Run the program from the top; yields the result of its last command.
    pub fn evaluate(&mut self) -> Result<String, TclError> {
        self.frames.truncate(1);
        self.depth = 0;
        let program = Rc::clone(&self.program);
        self.run(&program)
    }

    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.frames.first().and_then(|f| f.get(name)).map(String::as_str)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    fn run(&mut self, script: &Script) -> Result<String, TclError> {
        let mut result = String::new();
        for command in script {
            let mut words = Vec::with_capacity(command.len());
            for word in command {
                words.push(self.substitute(word)?);
            }
            result = self.invoke(&words)?;
        }
        Ok(result)
    }

    fn run_text(&mut self, text: &str) -> Result<String, TclError> {
        let script = match self.cache.get(text) {
            Some(s) => Rc::clone(s),
            None => {
                let parsed = Rc::new(Parser::new(text).script(false)?);
                self.cache.insert(text.to_string(), Rc::clone(&parsed));
                parsed
            }
        };
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(TclError::Depth);
        }
        let result = self.run(&script);
        self.depth -= 1;
        result
    }

    fn substitute(&mut self, word: &Word) -> Result<String, TclError> {
        match word {
            Word::Literal(s) => Ok(s.clone()),
            Word::Parts(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        Part::Text(t) => out.push_str(t),
                        Part::Var(name) => out.push_str(self.lookup(name)?),
                        Part::Subst(script) => {
                            self.depth += 1;
                            if self.depth > MAX_DEPTH {
                                self.depth -= 1;
                                return Err(TclError::Depth);
                            }
                            let r = self.run(script);
                            self.depth -= 1;
                            out.push_str(&r?);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&str, TclError> {
        self.frames
            .last()
            .and_then(|f| f.get(name))
            .map(String::as_str)
            .ok_or_else(|| TclError::UnknownVariable(name.to_string()))
    }

    fn set_var(&mut self, name: &str, value: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    fn invoke(&mut self, words: &[String]) -> Result<String, TclError> {
        let Some((name, args)) = words.split_first() else {
            return Ok(String::new());
        };
        match name.as_str() {
            "set" => match args {
                [var] => self.lookup(var).map(str::to_string),
                [var, value] => {
                    self.set_var(var, value.clone());
                    Ok(value.clone())
                }
                _ => Err(TclError::Arity("set varName ?newValue?".into())),
            },
            "puts" => {
                let [text] = args else {
                    return Err(TclError::Arity("puts string".into()));
                };
                self.output.push_str(text);
                self.output.push('\n');
                Ok(String::new())
            }
            "proc" => {
                let [pname, params, body] = args else {
                    return Err(TclError::Arity("proc name args body".into()));
                };
                let params = params.split_whitespace().map(str::to_string).collect();
                self.procs.insert(pname.clone(), Rc::new(Proc { params, body: body.clone() }));
                Ok(String::new())
            }
            "return" => match args {
                [] => Err(TclError::Return(String::new())),
                [value] => Err(TclError::Return(value.clone())),
                _ => Err(TclError::Arity("return ?value?".into())),
            },
            "break" => Err(TclError::Break),
            "if" => self.cmd_if(args),
            "while" => {
                let [cond, body] = args else {
                    return Err(TclError::Arity("while test body".into()));
                };
                while truthy(&self.run_text(cond)?) {
                    match self.run_text(body) {
                        Ok(_) => {}
                        Err(TclError::Break) => break,
                        Err(e) => return Err(e),
                    }
                }
                Ok(String::new())
            }
            "incr" => {
                let (var, by) = match args {
                    [var] => (var, 1),
                    [var, by] => (var, int(by)?),
                    _ => return Err(TclError::Arity("incr varName ?increment?".into())),
                };
                let v = int(self.lookup(var)?)?.checked_add(by).ok_or(TclError::Overflow)?;
                self.set_var(var, v.to_string());
                Ok(v.to_string())
            }
            "+" => fold(args, 0, i64::checked_add),
            "*" => fold(args, 1, i64::checked_mul),
            "-" => arith(args, |a, b| a.checked_sub(b).ok_or(TclError::Overflow)),
            "/" => arith(args, |a, b| {
                if b == 0 {
                    return Err(TclError::DivideByZero);
                }
                a.checked_div(b).ok_or(TclError::Overflow)
            }),
            "%" => arith(args, |a, b| {
                if b == 0 {
                    return Err(TclError::DivideByZero);
                }
                a.checked_rem(b).ok_or(TclError::Overflow)
            }),
            "<" => compare(args, |a, b| a < b),
            "<=" => compare(args, |a, b| a <= b),
            ">" => compare(args, |a, b| a > b),
            ">=" => compare(args, |a, b| a >= b),
            "==" => compare(args, |a, b| a == b),
            "!=" => compare(args, |a, b| a != b),
            _ => {
                let proc = self
                    .procs
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| TclError::UnknownCommand(name.clone()))?;
                self.call(&proc, args)
            }
        }
    }

    /// `if cond body ?elseif cond body ...? ?else body?`; conditions are scripts.
    fn cmd_if(&mut self, args: &[String]) -> Result<String, TclError> {
        let mut rest = args;
        loop {
            let [cond, body, tail @ ..] = rest else {
                return Err(TclError::Arity("if test body ?else body?".into()));
            };
            if truthy(&self.run_text(cond)?) {
                return self.run_text(body);
            }
            match tail {
                [] => return Ok(String::new()),
                [kw, otherwise] if kw == "else" => return self.run_text(otherwise),
                [kw, more @ ..] if kw == "elseif" => rest = more,
                _ => return Err(TclError::Arity("if test body ?else body?".into())),
            }
        }
    }

    fn call(&mut self, proc: &Proc, args: &[String]) -> Result<String, TclError> {
        if args.len() != proc.params.len() {
            return Err(TclError::Arity(format!("expected {} argument(s)", proc.params.len())));
        }
        let frame = proc.params.iter().cloned().zip(args.iter().cloned()).collect();
        self.frames.push(frame);
        let result = self.run_text(&proc.body);
        self.frames.pop();
        match result {
            Err(TclError::Return(value)) => Ok(value),
            other => other,
        }
    }
}

fn truthy(s: &str) -> bool {
    !matches!(s.trim(), "" | "0" | "false")
}

fn int(s: &str) -> Result<i64, TclError> {
    s.trim().parse().map_err(|_| TclError::NotANumber(s.to_string()))
}

fn fold(args: &[String], init: i64, f: fn(i64, i64) -> Option<i64>) -> Result<String, TclError> {
    let mut acc = init;
    for a in args {
        acc = f(acc, int(a)?).ok_or(TclError::Overflow)?;
    }
    Ok(acc.to_string())
}

fn arith(args: &[String], f: impl Fn(i64, i64) -> Result<i64, TclError>) -> Result<String, TclError> {
    let [a, b] = args else {
        return Err(TclError::Arity("expected two operands".into()));
    };
    Ok(f(int(a)?, int(b)?)?.to_string())
}

fn compare(args: &[String], f: impl Fn(i64, i64) -> bool) -> Result<String, TclError> {
    let [a, b] = args else {
        return Err(TclError::Arity("expected two operands".into()));
    };
    Ok(if f(int(a)?, int(b)?) { "1" } else { "0" }.to_string())
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Parser { chars: src.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Parse commands until end of input, or until `]` when `nested`.
    fn script(&mut self, nested: bool) -> Result<Script, TclError> {
        let mut script = Vec::new();
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace() || c == ';') {
                self.pos += 1;
            }
            match self.peek() {
                None if nested => return Err(TclError::Parse("missing close-bracket".into())),
                None => return Ok(script),
                Some(']') if nested => {
                    self.pos += 1;
                    return Ok(script);
                }
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                Some(_) => {
                    let command = self.command(nested)?;
                    if !command.is_empty() {
                        script.push(command);
                    }
                }
            }
        }
    }

    fn command(&mut self, nested: bool) -> Result<Command, TclError> {
        let mut words = Vec::new();
        loop {
            while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
                self.pos += 1;
            }
            if self.peek() == Some('\\') && self.chars.get(self.pos + 1) == Some(&'\n') {
                self.pos += 2;
                continue;
            }
            match self.peek() {
                None | Some('\n' | ';') => return Ok(words),
                Some(']') if nested => return Ok(words),
                Some('{') => words.push(Word::Literal(self.braced()?)),
                Some('"') => {
                    self.pos += 1;
                    words.push(Word::Parts(self.parts(|c| c == '"')?));
                    if self.peek() != Some('"') {
                        return Err(TclError::Parse("missing \"".into()));
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    let end = move |c: char| c.is_whitespace() || c == ';' || (nested && c == ']');
                    words.push(Word::Parts(self.parts(end)?));
                }
            }
        }
    }

    fn braced(&mut self) -> Result<String, TclError> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1;
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.pos += 1,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(body);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(TclError::Parse("missing close-brace".into()))
    }

    fn parts(&mut self, end: impl Fn(char) -> bool) -> Result<Vec<Part>, TclError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if end(c) {
                break;
            }
            match c {
                '$' => {
                    self.pos += 1;
                    let name = self.var_name()?;
                    if name.is_empty() {
                        text.push('$');
                        continue;
                    }
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Var(name));
                }
                '[' => {
                    self.pos += 1;
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Subst(self.script(true)?));
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(other) => text.push(other),
                        None => return Err(TclError::Parse("dangling backslash".into())),
                    }
                    self.pos += 1;
                }
                _ => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(parts)
    }

    fn var_name(&mut self) -> Result<String, TclError> {
        if self.peek() == Some('{') {
            return self.braced();
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORIAL: &str = r#"
proc fact {n} {
    if {<= $n 1} {
        return 1
    } else {
        return [* $n [fact [- $n 1]]]
    }
}
fact 12
"#;

    #[test]
    fn test_factorial() {
        let mut i = Interpreter::new(FACTORIAL).unwrap();
        assert_eq!(i.evaluate().unwrap(), "479001600");
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let mut i = Interpreter::new(&format!("{STDLIB}\n{FACTORIAL}")).unwrap();
        assert_eq!(i.evaluate().unwrap(), "479001600");
        assert_eq!(i.evaluate().unwrap(), "479001600");
    }

    #[test]
    fn test_stdlib_procs() {
        let mut i = Interpreter::new(&format!("{STDLIB}\nset a [abs -4]\nmax $a [square 3]")).unwrap();
        assert_eq!(i.evaluate().unwrap(), "9");
        assert_eq!(i.get_variable("a"), Some("4"));
    }

    #[test]
    fn test_top_level_return_is_a_signal() {
        let mut i = Interpreter::new("set x 5\nreturn $x").unwrap();
        assert_eq!(i.evaluate(), Err(TclError::Return("5".into())));
    }

    #[test]
    fn test_while_incr_puts() {
        let src = "set i 0\nwhile {< $i 3} { incr i; puts \"i=$i\" }\nset i";
        let mut i = Interpreter::new(src).unwrap();
        assert_eq!(i.evaluate().unwrap(), "3");
        assert_eq!(i.output(), "i=1\ni=2\ni=3\n");
    }

    #[test]
    fn test_unbalanced_brace_fails_to_parse() {
        let err = Interpreter::new("proc broken {n} { return $n").unwrap_err();
        assert!(matches!(err, TclError::Parse(_)));
    }

    #[test]
    fn test_unknown_command() {
        let mut i = Interpreter::new("frob 1 2").unwrap();
        assert_eq!(i.evaluate(), Err(TclError::UnknownCommand("frob".into())));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut i = Interpreter::new("* 9223372036854775807 2").unwrap();
        assert_eq!(i.evaluate(), Err(TclError::Overflow));
    }
}
