//! Module catalog and resolver
//!
//! Scripts reach host functionality through three tiers of modules, searched
//! in a fixed priority order:
//!
//! | Tier | Match rule | Failure policy |
//! |----------|------------------|-----------------------------------|
//! | Builtin | case-sensitive | n/a (constructors are infallible) |
//! | Embedded | case-insensitive | load failure is fatal |
//! | Native | case-insensitive | n/a (constructors are infallible) |
//!
//! A name that matches no tier yields a warning and no module; the script
//! decides what to make of that. The asymmetries are deliberate: builtins
//! and the init lookup use byte equality, both extension tiers fold case,
//! and only embedded sources - trusted, shipped artifacts - abort the run
//! when they fail to load.
//!
//! The catalog is built once at process startup, is immutable afterwards,
//! and is shared read-only with both the resolver and the sandbox
//! supervisor.

pub mod builtin;
pub mod embedded;
pub mod native;

use std::fmt;

use log::{info, warn};
use thiserror::Error;

use crate::interp::{ExecError, Interpreter, Value};

/// Name of the distinguished bootstrap entry. Excluded from ordinary
/// resolution; loaded exactly once through [`ModuleCatalog::run_init`].
pub const INIT_MODULE: &str = "init";

/// Errors from module resolution. Both variants are fatal for the process:
/// embedded extensions are shipped artifacts, so a load failure is a
/// packaging defect, not bad user input.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("embedded extension '{module}' failed to load: {detail}")]
    EmbeddedLoad { module: String, detail: String },

    #[error("interpreter initialisation failed: {0}")]
    InitFailed(String),
}

/// Errors from calling into a module function.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("expected {expected} arguments, got {got}")]
    InvalidArgCount { expected: usize, got: usize },

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("no such function: {0}")]
    NoSuchFunction(String),
}

/// Module function signature.
pub type ModuleFn = fn(&[Value]) -> Result<Value, ModuleError>;

/// Capability to build a module object for registration.
pub type ModuleCtor = fn() -> Module;

/// Which tier a registered module came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Builtin,
    Embedded,
    Native,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Builtin => write!(f, "builtin"),
            ModuleKind::Embedded => write!(f, "embedded"),
            ModuleKind::Native => write!(f, "native"),
        }
    }
}

/// A module object registered in the interpreter.
pub struct Module {
    name: String,
    kind: ModuleKind,
    functions: Vec<(&'static str, ModuleFn)>,
}

impl Module {
    pub fn new(name: &str, kind: ModuleKind, functions: Vec<(&'static str, ModuleFn)>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            functions,
        }
    }

    /// Module materialized by evaluating an embedded source; its surface
    /// lives in the interpreter, not in host functions.
    pub fn embedded(name: &str) -> Self {
        Self::new(name, ModuleKind::Embedded, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn functions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.iter().map(|(name, _)| *name)
    }

    pub fn call(&self, function: &str, args: &[Value]) -> Result<Value, ModuleError> {
        let (_, f) = self
            .functions
            .iter()
            .find(|(name, _)| *name == function)
            .ok_or_else(|| ModuleError::NoSuchFunction(function.to_string()))?;
        f(args)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("functions", &self.functions.len())
            .finish()
    }
}

/// Loadable code unit behind a catalog entry.
pub enum ModuleSource {
    Builtin { constructor: ModuleCtor },
    Embedded { source: &'static str },
    Native { constructor: ModuleCtor },
}

impl ModuleSource {
    fn kind(&self) -> ModuleKind {
        match self {
            ModuleSource::Builtin { .. } => ModuleKind::Builtin,
            ModuleSource::Embedded { .. } => ModuleKind::Embedded,
            ModuleSource::Native { .. } => ModuleKind::Native,
        }
    }
}

/// One resolvable entry.
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub source: ModuleSource,
}

/// Outcome of a resolution attempt. `NotFound` is recoverable; the script
/// observes an absent module, not a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Loaded,
    NotFound,
}

/// The static, enumerable table of everything `require` can reach.
///
/// Tier priority is a property of the search, not of insertion order:
/// resolution always scans builtins, then embedded sources, then native
/// constructors, regardless of how the entries were pushed.
pub struct ModuleCatalog {
    entries: Vec<ModuleDescriptor>,
}

impl ModuleCatalog {
    /// Empty catalog, mainly for tests and embedders with custom tables.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The stock catalog shipped with the runtime.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for (name, constructor) in builtin::BUILTINS {
            catalog.push_builtin(name, *constructor);
        }
        for entry in embedded::EMBEDDED {
            catalog.push_embedded(entry.name, entry.source);
        }
        for (name, constructor) in native::NATIVE {
            catalog.push_native(name, *constructor);
        }
        catalog
    }

    pub fn push_builtin(&mut self, name: &'static str, constructor: ModuleCtor) {
        self.entries.push(ModuleDescriptor {
            name,
            source: ModuleSource::Builtin { constructor },
        });
    }

    pub fn push_embedded(&mut self, name: &'static str, source: &'static str) {
        self.entries.push(ModuleDescriptor {
            name,
            source: ModuleSource::Embedded { source },
        });
    }

    pub fn push_native(&mut self, name: &'static str, constructor: ModuleCtor) {
        self.entries.push(ModuleDescriptor {
            name,
            source: ModuleSource::Native { constructor },
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|d| d.name)
    }

    /// Service one `require`. Successful resolution registers the module at
    /// most once per interpreter; re-requiring an already loaded name has no
    /// side effects.
    pub fn resolve(
        &self,
        interp: &mut Interpreter,
        name: &str,
    ) -> Result<Resolution, ResolveError> {
        // Tier 1: built-in interpreter libraries, exact match.
        for desc in self.tier(ModuleKind::Builtin) {
            if desc.name == name {
                return self.load(interp, desc);
            }
        }

        // Tier 2: embedded extensions, case folded; init is never reachable
        // through ordinary require.
        for desc in self.tier(ModuleKind::Embedded) {
            if desc.name.eq_ignore_ascii_case(INIT_MODULE) {
                continue;
            }
            if desc.name.eq_ignore_ascii_case(name) {
                return self.load(interp, desc);
            }
        }

        // Tier 3: natively compiled extensions, case folded.
        for desc in self.tier(ModuleKind::Native) {
            if desc.name.eq_ignore_ascii_case(name) {
                return self.load(interp, desc);
            }
        }

        warn!("required extension not found: {}", name);
        Ok(Resolution::NotFound)
    }

    /// Load and run the distinguished init entry. Called once at interpreter
    /// start-up, before any script code; failure means the interpreter
    /// cannot be considered initialized.
    pub fn run_init(&self, interp: &mut Interpreter) -> Result<(), ResolveError> {
        for desc in self.tier(ModuleKind::Embedded) {
            if desc.name != INIT_MODULE {
                continue;
            }
            if let ModuleSource::Embedded { source } = &desc.source {
                info!("loading interpreter initialisation");
                return match interp.eval_source(desc.name, source) {
                    Ok(()) => Ok(()),
                    Err(ExecError::Resolve(e)) => Err(e),
                    Err(e) => Err(ResolveError::InitFailed(e.to_string())),
                };
            }
        }
        Err(ResolveError::InitFailed(
            "no init extension embedded in this build".to_string(),
        ))
    }

    fn tier(&self, kind: ModuleKind) -> impl Iterator<Item = &ModuleDescriptor> {
        self.entries.iter().filter(move |d| d.source.kind() == kind)
    }

    fn load(
        &self,
        interp: &mut Interpreter,
        desc: &ModuleDescriptor,
    ) -> Result<Resolution, ResolveError> {
        if interp.is_loaded(desc.name) || interp.is_loading(desc.name) {
            return Ok(Resolution::Loaded);
        }
        match &desc.source {
            ModuleSource::Builtin { constructor } | ModuleSource::Native { constructor } => {
                interp.register(constructor());
            }
            ModuleSource::Embedded { source } => {
                interp.begin_load(desc.name);
                let result = interp.eval_source(desc.name, source);
                interp.end_load(desc.name);
                match result {
                    Ok(()) => interp.register(Module::embedded(desc.name)),
                    // A nested embedded failure is already fatal; keep its
                    // diagnostic rather than wrapping it.
                    Err(ExecError::Resolve(e)) => return Err(e),
                    Err(e) => {
                        return Err(ResolveError::EmbeddedLoad {
                            module: desc.name.to_string(),
                            detail: e.to_string(),
                        })
                    }
                }
            }
        }
        info!("loaded {}", desc.name);
        Ok(Resolution::Loaded)
    }
}

// Argument plumbing shared by builtin and native module functions.

pub(crate) fn expect_args(args: &[Value], expected: usize) -> Result<(), ModuleError> {
    if args.len() != expected {
        return Err(ModuleError::InvalidArgCount {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

pub(crate) fn str_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a str, ModuleError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s),
        other => Err(bad_arg(index, "a string", other)),
    }
}

/// Byte-oriented functions accept both octet and string arguments.
pub(crate) fn bytes_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a [u8], ModuleError> {
    match args.get(index) {
        Some(Value::Bytes(b)) => Ok(b),
        Some(Value::Str(s)) => Ok(s.as_bytes()),
        other => Err(bad_arg(index, "an octet or string", other)),
    }
}

pub(crate) fn int_arg(args: &[Value], index: usize) -> Result<i64, ModuleError> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        other => Err(bad_arg(index, "an integer", other)),
    }
}

fn bad_arg(index: usize, wanted: &str, got: Option<&Value>) -> ModuleError {
    let got = match got {
        None => "nothing",
        Some(Value::Nil) => "nil",
        Some(Value::Bool(_)) => "a boolean",
        Some(Value::Int(_)) => "an integer",
        Some(Value::Str(_)) => "a string",
        Some(Value::Bytes(_)) => "an octet",
        Some(Value::Array(_)) => "an array",
        Some(Value::Object(_)) => "an object",
    };
    ModuleError::BadArgument(format!(
        "argument {} must be {}, got {}",
        index + 1,
        wanted,
        got
    ))
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ping(_args: &[Value]) -> Result<Value, ModuleError> {
        Ok(Value::Int(1))
    }

    fn make_counter() -> Module {
        Module::new("counter", ModuleKind::Native, vec![("ping", ping as ModuleFn)])
    }

    #[test]
    fn standard_catalog_has_all_tiers() {
        let catalog = ModuleCatalog::standard();
        assert!(catalog.names().any(|n| n == "string"));
        assert!(catalog.names().any(|n| n == "init"));
        assert!(catalog.names().any(|n| n == "octet"));
    }

    #[test]
    fn module_call_dispatch() {
        let module = make_counter();
        assert_eq!(module.call("ping", &[]).unwrap(), Value::Int(1));
        assert!(matches!(
            module.call("pong", &[]),
            Err(ModuleError::NoSuchFunction(_))
        ));
    }

    #[test]
    fn init_is_not_requirable() {
        let catalog = Arc::new(ModuleCatalog::standard());
        let mut interp = Interpreter::new(Arc::clone(&catalog));
        let res = catalog.resolve(&mut interp, "init").unwrap();
        assert_eq!(res, Resolution::NotFound);
        assert!(!interp.is_loaded("init"));
    }

    #[test]
    fn missing_init_is_fatal() {
        let catalog = Arc::new(ModuleCatalog::empty());
        let mut interp = Interpreter::new(Arc::clone(&catalog));
        assert!(matches!(
            catalog.run_init(&mut interp),
            Err(ResolveError::InitFailed(_))
        ));
    }
}
