#![forbid(unsafe_code)]

//! The script-engine boundary.
//!
//! The console treats the scripting language as an opaque capability: it
//! can compile source, execute a compiled unit in a scope, list the members
//! of a value, and fetch documentation for a symbol. Everything else about
//! the language lives behind [`ScriptEngine`].
//!
//! Engines are shared between the REPL thread, the execution thread and the
//! completion thread, hence `Send + Sync`. Engines that are not internally
//! thread-safe should serialise access themselves.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::cancellation::{CancellationToken, Interrupted};
use crate::output::OutputStream;

/// How the engine should interpret a piece of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// One interactive statement typed at the prompt; may be incomplete.
    Interactive,
    /// A block of statements injected by the host or pasted.
    Statements,
}

/// A compile-time diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// 1-based line within the compiled source.
    pub line: usize,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

/// Engine-specific compiled form of a source text.
pub struct CompiledUnit {
    source: String,
    payload: Box<dyn Any + Send + Sync>,
}

impl CompiledUnit {
    pub fn new(source: impl Into<String>, payload: impl Any + Send + Sync) -> Self {
        Self {
            source: source.into(),
            payload: Box::new(payload),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Result of [`ScriptEngine::compile`].
#[derive(Debug)]
pub enum CompileOutcome {
    Complete(CompiledUnit),
    /// The input is a valid prefix; the REPL should read a continuation line.
    Incomplete,
    Errors(Vec<Diagnostic>),
}

/// An error raised while a unit of work was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    /// The engine observed the cancellation token.
    Interrupted,
    /// The script raised; `kind` is the engine's exception class name.
    Raised { kind: String, message: String },
}

impl ExecutionFault {
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<Interrupted> for ExecutionFault {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("KeyboardInterrupt"),
            Self::Raised { kind, message } => write!(f, "{kind}: {message}"),
        }
    }
}

impl std::error::Error for ExecutionFault {}

/// Failure to resolve members or documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The object path does not evaluate in the scope.
    Unresolved(String),
    Interrupted,
    Engine(String),
}

impl From<Interrupted> for LookupError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved(path) => write!(f, "cannot resolve `{path}`"),
            Self::Interrupted => f.write_str("lookup interrupted"),
            Self::Engine(msg) => write!(f, "engine error: {msg}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Visibility of a reflected member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// A method reported by native introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMethod {
    pub name: String,
    pub visibility: Visibility,
}

impl NativeMethod {
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
        }
    }
}

/// Reflection data for a value whose type the host runtime can describe
/// natively (as opposed to dynamic script objects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeType {
    pub name: String,
    pub methods: Vec<NativeMethod>,
    pub properties: Vec<String>,
    pub fields: Vec<String>,
}

/// The subject of a description lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocQuery<'a> {
    /// Object path owning the member; empty for globals.
    pub owner: &'a str,
    pub member: &'a str,
    /// Document the member as found on the owner's type rather than on the
    /// owner value itself.
    pub on_type: bool,
}

impl DocQuery<'_> {
    /// `owner.member`, or just `member` for globals.
    pub fn dotted(&self) -> String {
        if self.owner.is_empty() {
            self.member.to_owned()
        } else {
            format!("{}.{}", self.owner, self.member)
        }
    }
}

/// Opaque execution scope handed to every engine call.
#[derive(Clone)]
pub struct ScopeHandle(Arc<dyn Any + Send + Sync>);

impl ScopeHandle {
    pub fn new(scope: impl Any + Send + Sync) -> Self {
        Self(Arc::new(scope))
    }

    /// A scope for engines that keep their state internally.
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScopeHandle(..)")
    }
}

/// The scripting engine consumed by the console.
pub trait ScriptEngine: Send + Sync {
    fn compile(&self, source: &str, kind: SourceKind) -> CompileOutcome;

    fn execute(
        &self,
        unit: &CompiledUnit,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionFault>;

    /// Member names of the value at `path` (the global scope when empty).
    fn list_members(
        &self,
        path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, LookupError>;

    /// Documentation string for the queried member, `None` if it has none.
    fn documentation(
        &self,
        query: &DocQuery<'_>,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, LookupError>;

    /// Native reflection data for the value at `path`, if it has a native type.
    fn native_type(&self, _path: &str, _scope: &ScopeHandle) -> Option<NativeType> {
        None
    }

    /// Render a fault the way the language would print it.
    fn format_fault(&self, fault: &ExecutionFault) -> String {
        fault.to_string()
    }

    /// Spaces to pre-fill on a continuation line after `pending` input.
    fn continuation_indent(&self, _pending: &str) -> usize {
        0
    }

    /// Route the engine's standard output to the console.
    fn set_output(&self, _stream: OutputStream) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_line() {
        let d = Diagnostic::new("invalid syntax", 1);
        assert_eq!(d.to_string(), "invalid syntax (line 1)");
    }

    #[test]
    fn compiled_unit_payload_round_trips() {
        let unit = CompiledUnit::new("1+1", 2_i64);
        assert_eq!(unit.source(), "1+1");
        assert_eq!(unit.payload::<i64>(), Some(&2));
        assert!(unit.payload::<String>().is_none());
    }

    #[test]
    fn doc_query_dotted_path() {
        let global = DocQuery { owner: "", member: "len", on_type: false };
        assert_eq!(global.dotted(), "len");
        let member = DocQuery { owner: "math", member: "sqrt", on_type: true };
        assert_eq!(member.dotted(), "math.sqrt");
    }

    #[test]
    fn interrupted_converts_to_fault() {
        let fault: ExecutionFault = Interrupted.into();
        assert_eq!(fault, ExecutionFault::Interrupted);
        assert_eq!(
            ExecutionFault::raised("ZeroDivisionError", "division by zero").to_string(),
            "ZeroDivisionError: division by zero"
        );
    }
}
