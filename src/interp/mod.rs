//! Interpreter host state
//!
//! The language frontend (parser, evaluator, the DSL dialect itself) is a
//! collaborator that plugs in through the statement hook; this module owns
//! everything the secure core needs to know about a running interpreter:
//! which modules are registered, the KEYS/DATA globals handed over before
//! execution, and the `require` operation that routes module requests into
//! the resolver.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use thiserror::Error;

use crate::modules::{Module, ModuleCatalog, Resolution, ResolveError};

/// Execution errors surfaced by the host side of the interpreter.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("script is not valid UTF-8 text")]
    NotText,

    #[error("statement failed: {0}")]
    Eval(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Value currency exchanged with module functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Statement evaluator supplied by the language frontend.
pub type EvalHook = Box<dyn FnMut(&str) -> Result<(), String> + Send>;

/// Host state of one interpreter instance.
///
/// The module catalog is built once at startup and shared read-only; the
/// interpreter owns the mutable per-instance state (registered modules,
/// globals). Registration is at-most-once per module name.
pub struct Interpreter {
    catalog: Arc<ModuleCatalog>,
    modules: HashMap<String, Module>,
    loading: HashSet<String>,
    globals: HashMap<String, Value>,
    eval_hook: EvalHook,
    initialized: bool,
}

impl Interpreter {
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        Self {
            catalog,
            modules: HashMap::new(),
            loading: HashSet::new(),
            globals: HashMap::new(),
            // The embedder supplies the real evaluator; the stock hook
            // accepts statements unchanged so that module plumbing and the
            // isolation supervisor can run standalone.
            eval_hook: Box::new(|_stmt| Ok(())),
            initialized: false,
        }
    }

    /// Replace the statement evaluator.
    pub fn set_eval_hook(&mut self, hook: EvalHook) {
        self.eval_hook = hook;
    }

    /// Key material handed over before execution, visible as `KEYS`.
    pub fn set_keys(&mut self, keys: &str) {
        self.globals
            .insert("KEYS".to_string(), Value::Str(keys.to_string()));
    }

    /// Auxiliary data handed over before execution, visible as `DATA`.
    pub fn set_data(&mut self, data: &str) {
        self.globals
            .insert("DATA".to_string(), Value::Str(data.to_string()));
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Run the distinguished init extension. Must be called before any
    /// script executes; idempotent per interpreter instance.
    pub fn init(&mut self) -> Result<(), ResolveError> {
        if self.initialized {
            return Ok(());
        }
        let catalog = Arc::clone(&self.catalog);
        catalog.run_init(self)?;
        self.initialized = true;
        Ok(())
    }

    /// The interpreter-visible import operation.
    pub fn require(&mut self, name: &str) -> Result<Resolution, ResolveError> {
        let catalog = Arc::clone(&self.catalog);
        catalog.resolve(self, name)
    }

    /// Execute a script. `require` statements are serviced by the resolver;
    /// every other statement goes to the pluggable evaluator.
    pub fn execute(&mut self, script: &[u8]) -> Result<(), ExecError> {
        let text = std::str::from_utf8(script).map_err(|_| ExecError::NotText)?;
        self.run_chunk(text)
    }

    /// Execute a script and fold the result into a process exit code,
    /// reporting any failure through the diagnostic sink. Fatal conditions
    /// always leave a diagnostic behind, never a bare non-zero exit.
    pub fn execute_reporting(&mut self, script: &[u8]) -> i32 {
        match self.execute(script) {
            Ok(()) => 0,
            Err(e) => {
                error!("script execution failed: {}", e);
                1
            }
        }
    }

    /// Evaluate an embedded module source (same statement rules as scripts).
    pub(crate) fn eval_source(&mut self, name: &str, source: &str) -> Result<(), ExecError> {
        debug!("evaluating embedded source: {}", name);
        self.run_chunk(source)
    }

    fn run_chunk(&mut self, source: &str) -> Result<(), ExecError> {
        for line in source.lines() {
            let stmt = line.trim();
            if stmt.is_empty() || stmt.starts_with("--") {
                continue;
            }
            if let Some(name) = parse_require(stmt) {
                let catalog = Arc::clone(&self.catalog);
                // NotFound is recoverable and already warned about.
                catalog.resolve(self, &name)?;
            } else {
                (self.eval_hook)(stmt).map_err(ExecError::Eval)?;
            }
        }
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn loaded_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub(crate) fn register(&mut self, module: Module) {
        debug!("registered module: {}", module.name());
        self.modules.insert(module.name().to_string(), module);
    }

    // A module that requires itself while its own source is still being
    // evaluated is treated as already loaded.
    pub(crate) fn is_loading(&self, name: &str) -> bool {
        self.loading.contains(name)
    }

    pub(crate) fn begin_load(&mut self, name: &str) {
        self.loading.insert(name.to_string());
    }

    pub(crate) fn end_load(&mut self, name: &str) {
        self.loading.remove(name);
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("modules", &self.modules.len())
            .field("globals", &self.globals.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Recognize `require 'name'`, `require "name"` and the parenthesized forms.
fn parse_require(stmt: &str) -> Option<String> {
    let rest = stmt.strip_prefix("require")?;
    // Reject identifiers that merely start with "require".
    if rest
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    let rest = rest.trim_start();
    let rest = match rest.strip_prefix('(') {
        Some(inner) => inner.trim_start(),
        None => rest,
    };
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn parse_require_forms() {
        assert_eq!(parse_require("require 'octet'"), Some("octet".into()));
        assert_eq!(parse_require("require \"json\""), Some("json".into()));
        assert_eq!(parse_require("require('ecdh')"), Some("ecdh".into()));
        assert_eq!(parse_require("require ( \"math\" )"), Some("math".into()));
        assert_eq!(parse_require("required = 1"), None);
        assert_eq!(parse_require("print('hi')"), None);
        assert_eq!(parse_require("require octet"), None);
    }

    #[test]
    fn globals_round_trip() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(catalog);
        interp.set_keys("{\"secret\":1}");
        interp.set_data("payload");
        assert_eq!(
            interp.global("KEYS"),
            Some(&Value::Str("{\"secret\":1}".into()))
        );
        assert_eq!(interp.global("DATA"), Some(&Value::Str("payload".into())));
        assert_eq!(interp.global("MISSING"), None);
    }

    #[test]
    fn eval_hook_sees_plain_statements_only() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(catalog);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        interp.set_eval_hook(Box::new(move |stmt| {
            sink.lock().unwrap().push(stmt.to_string());
            Ok(())
        }));
        interp
            .execute(b"-- comment\n\nx = 1\nrequire 'nosuch'\ny = 2\n")
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["x = 1", "y = 2"]);
    }

    #[test]
    fn exit_code_folding_reports_failures() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(catalog);
        assert_eq!(interp.execute_reporting(b"x = 1\n"), 0);
        // Binary input and evaluator failures both fold to a non-zero code.
        assert_eq!(interp.execute_reporting(&[0xff, 0xfe, 0x00]), 1);
        interp.set_eval_hook(Box::new(|_| Err("no parse".to_string())));
        assert_eq!(interp.execute_reporting(b"x = 1\n"), 1);
    }

    #[test]
    fn binary_script_rejected() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(catalog);
        let err = interp.execute(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExecError::NotText));
    }

    #[test]
    fn failing_statement_stops_execution() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(catalog);
        interp.set_eval_hook(Box::new(|stmt| {
            if stmt.contains("boom") {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }));
        let err = interp.execute(b"x = 1\nboom()\ny = 2\n").unwrap_err();
        assert!(matches!(err, ExecError::Eval(_)));
    }
}
