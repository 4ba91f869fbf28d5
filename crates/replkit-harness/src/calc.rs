#![forbid(unsafe_code)]

//! A tiny deterministic script engine for tests and the demo.
//!
//! The language is just enough to exercise every console path:
//!
//! ```text
//! >>> x = 6 * 7
//! >>> x / 2
//! 21
//! >>> print("hi", math.sqrt(16))
//! hi 4
//! >>> sleep(500)              # honours keyboard interrupt
//! >>> def f():                # incomplete until a blank line
//! ...     return x + 1
//! ...
//! >>> f()
//! 43
//! ```
//!
//! A global `wall` has a native type, so completion on it goes through
//! native introspection; everything else is listed by the engine.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use regex_lite::Regex;
use replkit_runtime::{
    CancellationToken, CompileOutcome, CompiledUnit, Diagnostic, DocQuery, ExecutionFault,
    LookupError, NativeMethod, NativeType, OutputStream, ScopeHandle, ScriptEngine, SourceKind,
};

const BUILTINS: [&str; 4] = ["math", "print", "sleep", "wall"];

// ── Values ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Value {
    None,
    Number(f64),
    Str(String),
    Module(&'static str),
    Builtin(&'static str),
    Function(Vec<Expr>),
    Native(&'static str),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Number(_) => "float",
            Self::Str(_) => "str",
            Self::Module(_) => "module",
            Self::Builtin(_) => "builtin_function_or_method",
            Self::Function(_) => "function",
            Self::Native(name) => *name,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Module(name) => write!(f, "<module '{name}'>"),
            Self::Builtin(name) => write!(f, "<built-in function {name}>"),
            Self::Function(_) => f.write_str("<function>"),
            Self::Native(name) => write!(f, "<{name} object>"),
        }
    }
}

// ── Syntax ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Str(String),
    Name(String),
    Neg(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Attr(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Stmt {
    Expr(Expr),
    Assign(String, Expr),
    Def(String, Vec<Expr>),
}

/// Compiled form carried in [`CompiledUnit`].
#[derive(Debug, Clone, PartialEq)]
struct Program {
    statements: Vec<Stmt>,
    echo: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(char),
}

fn tokenize(line: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '#' {
            break;
        }
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::Number(text.parse().ok()?));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '"' || c == '\'' {
            let end = chars[i + 1..].iter().position(|&q| q == c)? + i + 1;
            tokens.push(Token::Str(chars[i + 1..end].iter().collect()));
            i = end + 1;
        } else if "+-*/%().,=".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else {
            return None;
        }
    }
    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek_op(&self, op: char) -> bool {
        self.tokens.get(self.pos) == Some(&Token::Op(op))
    }

    fn eat_op(&mut self, op: char) -> bool {
        let matched = self.peek_op(op);
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn done(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn expr(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat_op('+') {
                '+'
            } else if self.eat_op('-') {
                '-'
            } else {
                return Some(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = ['*', '/', '%'].into_iter().find(|&op| self.eat_op(op));
            let Some(op) = op else {
                return Some(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.eat_op('-') {
            return Some(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_op('.') {
                match self.tokens.get(self.pos) {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Attr(Box::new(expr), name.clone());
                        self.pos += 1;
                    }
                    _ => return None,
                }
            } else if self.eat_op('(') {
                let mut args = Vec::new();
                if !self.eat_op(')') {
                    loop {
                        args.push(self.expr()?);
                        if self.eat_op(')') {
                            break;
                        }
                        if !self.eat_op(',') {
                            return None;
                        }
                    }
                }
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Some(expr);
            }
        }
    }

    fn primary(&mut self) -> Option<Expr> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        match token {
            Token::Number(n) => Some(Expr::Number(n)),
            Token::Str(s) => Some(Expr::Str(s)),
            Token::Ident(name) => Some(Expr::Name(name)),
            Token::Op('(') => {
                let inner = self.expr()?;
                self.eat_op(')').then_some(inner)
            }
            Token::Op(_) => None,
        }
    }
}

fn parse_expr(text: &str) -> Option<Expr> {
    let mut parser = Parser::new(tokenize(text)?);
    let expr = parser.expr()?;
    parser.done().then_some(expr)
}

fn parse_statement(text: &str) -> Option<Stmt> {
    let tokens = tokenize(text)?;
    if let [Token::Ident(name), Token::Op('='), rest @ ..] = tokens.as_slice() {
        let mut parser = Parser::new(rest.to_vec());
        let expr = parser.expr()?;
        return parser.done().then(|| Stmt::Assign(name.clone(), expr));
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.expr()?;
    parser.done().then_some(Stmt::Expr(expr))
}

fn def_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^def\s+([A-Za-z_]\w*)\s*\(\s*\)\s*:\s*$").expect("static pattern"))
}

enum Parsed {
    Program(Vec<Stmt>),
    Incomplete,
    Error(Diagnostic),
}

fn parse_source(source: &str, kind: SourceKind) -> Parsed {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut statements = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line_no = idx + 1;
        let line = lines[idx].trim_end();
        idx += 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == "def" || trimmed.starts_with("def ") {
            let Some(caps) = def_header().captures(trimmed) else {
                return Parsed::Error(Diagnostic::new("invalid syntax", line_no));
            };
            let name = caps[1].to_owned();
            let mut body = Vec::new();
            let mut terminated = false;
            while idx < lines.len() {
                let body_line = lines[idx].trim_end();
                if body_line.trim().is_empty() || !body_line.starts_with(char::is_whitespace) {
                    terminated = true;
                    break;
                }
                idx += 1;
                let text = body_line.trim_start();
                let text = text.strip_prefix("return ").unwrap_or(text);
                match parse_expr(text) {
                    Some(expr) => body.push(expr),
                    None => return Parsed::Error(Diagnostic::new("invalid syntax", idx)),
                }
            }
            if !terminated && kind == SourceKind::Interactive {
                return Parsed::Incomplete;
            }
            if body.is_empty() {
                return Parsed::Error(Diagnostic::new("expected an indented block", line_no + 1));
            }
            statements.push(Stmt::Def(name, body));
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            return Parsed::Error(Diagnostic::new("unexpected indent", line_no));
        }
        match parse_statement(trimmed) {
            Some(stmt) => statements.push(stmt),
            None => return Parsed::Error(Diagnostic::new("invalid syntax", line_no)),
        }
    }
    Parsed::Program(statements)
}

// ── Scope and evaluation ─────────────────────────────────────────────

/// Variables of one console session.
#[derive(Debug, Default)]
pub struct CalcScope {
    vars: Mutex<HashMap<String, Value>>,
}

impl CalcScope {
    fn vars(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.vars.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn fault(kind: &str, message: impl Into<String>) -> ExecutionFault {
    ExecutionFault::raised(kind, message)
}

struct Eval<'a> {
    engine: &'a CalcEngine,
    scope: &'a CalcScope,
    cancel: &'a CancellationToken,
}

impl Eval<'_> {
    fn lookup(&self, name: &str) -> Result<Value, ExecutionFault> {
        if let Some(value) = self.scope.vars().get(name) {
            return Ok(value.clone());
        }
        match name {
            "math" => Ok(Value::Module("math")),
            "print" => Ok(Value::Builtin("print")),
            "sleep" => Ok(Value::Builtin("sleep")),
            "wall" => Ok(Value::Native("Wall")),
            _ => Err(fault("NameError", format!("name '{name}' is not defined"))),
        }
    }

    fn attr(&self, value: &Value, name: &str) -> Result<Value, ExecutionFault> {
        match (value, name) {
            (Value::Module("math"), "pi") => Ok(Value::Number(std::f64::consts::PI)),
            (Value::Module("math"), "e") => Ok(Value::Number(std::f64::consts::E)),
            (Value::Module("math"), "sqrt") => Ok(Value::Builtin("math.sqrt")),
            (Value::Module("math"), "floor") => Ok(Value::Builtin("math.floor")),
            (Value::Number(n), "real") => Ok(Value::Number(*n)),
            (Value::Number(_), "imag") => Ok(Value::Number(0.0)),
            (Value::Native("Wall"), "Width") => Ok(Value::Number(12.0)),
            _ => Err(fault(
                "AttributeError",
                format!("'{}' object has no attribute '{name}'", value.type_name()),
            )),
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ExecutionFault> {
        self.cancel.check()?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(fault(
                    "TypeError",
                    format!("bad operand type for unary -: '{}'", other.type_name()),
                )),
            },
            Expr::Binary(op, lhs, rhs) => self.binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Attr(target, name) => self.attr(&self.eval(target)?, name),
            Expr::Call(target, args) => {
                let callee = self.eval(target)?;
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
                self.call(&callee, &args)
            }
        }
    }

    fn binary(&self, op: char, lhs: Value, rhs: Value) -> Result<Value, ExecutionFault> {
        match (op, lhs, rhs) {
            ('+', Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (_, Value::Number(a), Value::Number(b)) => match op {
                '+' => Ok(Value::Number(a + b)),
                '-' => Ok(Value::Number(a - b)),
                '*' => Ok(Value::Number(a * b)),
                '/' | '%' if b == 0.0 => Err(fault("ZeroDivisionError", "division by zero")),
                '/' => Ok(Value::Number(a / b)),
                _ => Ok(Value::Number(a % b)),
            },
            (op, a, b) => Err(fault(
                "TypeError",
                format!(
                    "unsupported operand type(s) for {op}: '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                ),
            )),
        }
    }

    fn call(&self, callee: &Value, args: &[Value]) -> Result<Value, ExecutionFault> {
        match (callee, args) {
            (Value::Builtin("print"), args) => {
                let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
                self.engine.emit(&format!("{line}\n"));
                Ok(Value::None)
            }
            (Value::Builtin("sleep"), [Value::Number(ms)]) => {
                self.cancel.sleep(Duration::from_millis(ms.max(0.0) as u64))?;
                Ok(Value::None)
            }
            (Value::Builtin("math.sqrt"), [Value::Number(n)]) if *n >= 0.0 => Ok(Value::Number(n.sqrt())),
            (Value::Builtin("math.sqrt"), [Value::Number(_)]) => Err(fault("ValueError", "math domain error")),
            (Value::Builtin("math.floor"), [Value::Number(n)]) => Ok(Value::Number(n.floor())),
            (Value::Builtin(name), _) => Err(fault("TypeError", format!("bad arguments for {name}()"))),
            (Value::Function(body), []) => {
                let mut result = Value::None;
                for expr in body {
                    result = self.eval(expr)?;
                }
                Ok(result)
            }
            (Value::Function(_), _) => Err(fault("TypeError", "function takes 0 positional arguments")),
            (other, _) => Err(fault(
                "TypeError",
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn run(&self, program: &Program) -> Result<(), ExecutionFault> {
        for stmt in &program.statements {
            self.cancel.check()?;
            match stmt {
                Stmt::Assign(name, expr) => {
                    let value = self.eval(expr)?;
                    self.scope.vars().insert(name.clone(), value);
                }
                Stmt::Def(name, body) => {
                    self.scope.vars().insert(name.clone(), Value::Function(body.clone()));
                }
                Stmt::Expr(expr) => {
                    let value = self.eval(expr)?;
                    if program.echo && value != Value::None {
                        self.engine.emit(&format!("{value}\n"));
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Engine ───────────────────────────────────────────────────────────

/// The calculator engine.
#[derive(Default)]
pub struct CalcEngine {
    output: Mutex<Option<OutputStream>>,
    executed: Mutex<Vec<String>>,
    captured: Mutex<String>,
}

impl CalcEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh variable scope for [`ConsoleContext`](replkit_runtime::ConsoleContext).
    pub fn scope() -> ScopeHandle {
        ScopeHandle::new(CalcScope::default())
    }

    /// Sources of every unit executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Everything the engine printed, whether or not an output is attached.
    pub fn printed(&self) -> String {
        self.captured.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn emit(&self, text: &str) {
        self.captured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(text);
        let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stream) = output.as_mut() {
            if let Err(err) = stream.write_all(text.as_bytes()) {
                tracing::warn!(error = %err, "calc output failed");
            }
        }
    }

    fn calc_scope<'a>(&self, scope: &'a ScopeHandle) -> Result<&'a CalcScope, LookupError> {
        scope
            .downcast_ref::<CalcScope>()
            .ok_or_else(|| LookupError::Engine("scope is not a CalcScope".into()))
    }

    /// Evaluate an object path for introspection.
    fn resolve(
        &self,
        path: &str,
        scope: &CalcScope,
        cancel: &CancellationToken,
    ) -> Result<Value, LookupError> {
        let expr = parse_expr(path).ok_or_else(|| LookupError::Unresolved(path.to_owned()))?;
        let eval = Eval {
            engine: self,
            scope,
            cancel,
        };
        eval.eval(&expr).map_err(|err| match err {
            ExecutionFault::Interrupted => LookupError::Interrupted,
            ExecutionFault::Raised { .. } => LookupError::Unresolved(path.to_owned()),
        })
    }
}

fn members_of(value: &Value) -> Vec<&'static str> {
    match value {
        Value::Module(_) => vec!["pi", "e", "sqrt", "floor", "__name__", "__doc__"],
        Value::Number(_) => vec!["real", "imag", "conjugate", "__abs__", "__add__"],
        Value::Str(_) => vec!["upper", "lower", "split", "__len__"],
        Value::Builtin(_) | Value::Function(_) => vec!["__name__", "__doc__", "__call__"],
        Value::Native(_) => vec!["Flip", "Width", "Id", "__class__"],
        Value::None => vec!["__class__"],
    }
}

fn documentation_for(key: &str) -> Option<&'static str> {
    Some(match key {
        "math" => "This module provides access to the mathematical functions.",
        "math.sqrt" => "Return the square root of x.",
        "math.floor" => "Return the floor of x as an Integral.",
        "print" => "print(value, ...) writes the values to the console.",
        "sleep" => "sleep(ms) pauses for the given number of milliseconds.",
        "float" => "Convert a string or number to a floating point number, if possible.",
        "float.real" => "the real part of a complex number",
        "float.imag" => "the imaginary part of a complex number",
        "float.conjugate" => "Return self, the complex conjugate of any float.",
        "Wall" => "A straight wall element.",
        "Wall.Flip" => "Flips the wall orientation.",
        "Wall.Width" => "Wall width in feet.",
        _ => return None,
    })
}

impl ScriptEngine for CalcEngine {
    fn compile(&self, source: &str, kind: SourceKind) -> CompileOutcome {
        match parse_source(source, kind) {
            Parsed::Program(statements) => CompileOutcome::Complete(CompiledUnit::new(
                source,
                Program {
                    statements,
                    echo: kind == SourceKind::Interactive,
                },
            )),
            Parsed::Incomplete => CompileOutcome::Incomplete,
            Parsed::Error(diagnostic) => CompileOutcome::Errors(vec![diagnostic]),
        }
    }

    fn execute(
        &self,
        unit: &CompiledUnit,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionFault> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(unit.source().to_owned());
        let program = unit
            .payload::<Program>()
            .ok_or_else(|| fault("SystemError", "unit was not compiled by CalcEngine"))?;
        let scope = self
            .calc_scope(scope)
            .map_err(|err| fault("SystemError", err.to_string()))?;
        Eval {
            engine: self,
            scope,
            cancel,
        }
        .run(program)
    }

    fn list_members(
        &self,
        path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, LookupError> {
        let scope = self.calc_scope(scope)?;
        if path.is_empty() {
            let mut names: Vec<String> = scope.vars().keys().cloned().collect();
            names.extend(BUILTINS.iter().map(|s| (*s).to_owned()));
            names.sort();
            names.dedup();
            return Ok(names);
        }
        let value = self.resolve(path, scope, cancel)?;
        Ok(members_of(&value).into_iter().map(str::to_owned).collect())
    }

    fn documentation(
        &self,
        query: &DocQuery<'_>,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, LookupError> {
        let scope = self.calc_scope(scope)?;
        let key = if query.on_type {
            if query.owner.is_empty() {
                self.resolve(query.member, scope, cancel)?.type_name().to_owned()
            } else {
                let owner = self.resolve(query.owner, scope, cancel)?;
                format!("{}.{}", owner.type_name(), query.member)
            }
        } else {
            query.dotted()
        };
        Ok(documentation_for(&key).map(str::to_owned))
    }

    fn native_type(&self, path: &str, scope: &ScopeHandle) -> Option<NativeType> {
        let scope = self.calc_scope(scope).ok()?;
        let value = self.resolve(path, scope, &CancellationToken::never()).ok()?;
        match value {
            Value::Native("Wall") => Some(NativeType {
                name: "Wall".into(),
                methods: vec![
                    NativeMethod::public("Flip"),
                    NativeMethod::public("get_Width"),
                    NativeMethod::public("set_Width"),
                    NativeMethod::public("add_Changed"),
                    NativeMethod::public("__repr__"),
                ],
                properties: vec!["Width".into(), "Id".into()],
                fields: vec!["Id".into()],
            }),
            _ => None,
        }
    }

    fn continuation_indent(&self, pending: &str) -> usize {
        let last = pending.lines().last().unwrap_or_default();
        let indent = last.len() - last.trim_start().len();
        if last.trim_end().ends_with(':') {
            indent + 4
        } else {
            indent
        }
    }

    fn set_output(&self, stream: OutputStream) {
        *self.output.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &CalcEngine, scope: &ScopeHandle, source: &str) -> Result<(), ExecutionFault> {
        let CompileOutcome::Complete(unit) = engine.compile(source, SourceKind::Interactive) else {
            panic!("{source:?} did not compile");
        };
        engine.execute(&unit, scope, &CancellationToken::never())
    }

    #[test]
    fn arithmetic_is_echoed() {
        let engine = CalcEngine::new();
        let scope = CalcEngine::scope();
        run(&engine, &scope, "1+1").unwrap();
        run(&engine, &scope, "x = 7 * 3").unwrap();
        run(&engine, &scope, "x / 2").unwrap();
        assert_eq!(engine.printed(), "2\n10.5\n");
        assert_eq!(engine.executed(), ["1+1", "x = 7 * 3", "x / 2"]);
    }

    #[test]
    fn malformed_def_is_one_diagnostic() {
        let engine = CalcEngine::new();
        match engine.compile("def f(:", SourceKind::Interactive) {
            CompileOutcome::Errors(diags) => {
                assert_eq!(diags, [Diagnostic::new("invalid syntax", 1)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn def_is_incomplete_until_blank_line() {
        let engine = CalcEngine::new();
        let scope = CalcEngine::scope();
        assert!(matches!(
            engine.compile("def f():", SourceKind::Interactive),
            CompileOutcome::Incomplete
        ));
        assert!(matches!(
            engine.compile("def f():\n    return 2", SourceKind::Interactive),
            CompileOutcome::Incomplete
        ));
        run(&engine, &scope, "def f():\n    return 40 + 2\n").unwrap();
        run(&engine, &scope, "f()").unwrap();
        assert_eq!(engine.printed(), "42\n");
    }

    #[test]
    fn statements_never_echo() {
        let engine = CalcEngine::new();
        let CompileOutcome::Complete(unit) = engine.compile("1+1\nprint(3)\n", SourceKind::Statements)
        else {
            panic!("did not compile");
        };
        engine
            .execute(&unit, &CalcEngine::scope(), &CancellationToken::never())
            .unwrap();
        assert_eq!(engine.printed(), "3\n");
    }

    #[test]
    fn runtime_errors_are_faults() {
        let engine = CalcEngine::new();
        let scope = CalcEngine::scope();
        assert_eq!(
            run(&engine, &scope, "1/0").unwrap_err().to_string(),
            "ZeroDivisionError: division by zero"
        );
        assert_eq!(
            run(&engine, &scope, "nope").unwrap_err().to_string(),
            "NameError: name 'nope' is not defined"
        );
    }

    #[test]
    fn sleep_observes_cancellation() {
        let engine = CalcEngine::new();
        let CompileOutcome::Complete(unit) = engine.compile("sleep(30000)", SourceKind::Interactive)
        else {
            panic!("did not compile");
        };
        let source = replkit_runtime::CancellationSource::new();
        source.cancel();
        let err = engine
            .execute(&unit, &CalcEngine::scope(), &source.token())
            .unwrap_err();
        assert_eq!(err, ExecutionFault::Interrupted);
    }

    #[test]
    fn members_and_docs() {
        let engine = CalcEngine::new();
        let scope = CalcEngine::scope();
        let never = CancellationToken::never();
        let members = engine.list_members("math", &scope, &never).unwrap();
        assert!(members.contains(&"sqrt".to_owned()));
        let doc = engine
            .documentation(
                &DocQuery {
                    owner: "math",
                    member: "sqrt",
                    on_type: false,
                },
                &scope,
                &never,
            )
            .unwrap();
        assert_eq!(doc.as_deref(), Some("Return the square root of x."));
        assert!(engine.native_type("wall", &scope).is_some());
        assert!(engine.native_type("math", &scope).is_none());
        assert!(matches!(
            engine.list_members("missing", &scope, &never),
            Err(LookupError::Unresolved(_))
        ));
    }

    #[test]
    fn continuation_indent_follows_colon() {
        let engine = CalcEngine::new();
        assert_eq!(engine.continuation_indent("def f():"), 4);
        assert_eq!(engine.continuation_indent("def f():\n    return 1"), 4);
        assert_eq!(engine.continuation_indent("x = 1"), 0);
    }
}
