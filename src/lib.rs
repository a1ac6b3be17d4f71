//! SealVM - Sandboxed Crypto-DSL Runtime
//!
//! A small, restricted execution core for crypto-oriented scripts: bounded
//! input loading, a fixed three-tier module catalog, and a fork-and-seccomp
//! sandbox around script execution.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │  Input loading    │  bounded buffers, shebang stripping
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │  Interpreter      │  require() resolution over the module catalog
//! │  + ModuleCatalog  │  builtin > embedded > native
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │  Sandbox          │  fork, no-new-privs, seccomp allow-list
//! └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sealvm::interp::Interpreter;
//! use sealvm::modules::ModuleCatalog;
//!
//! let catalog = Arc::new(ModuleCatalog::standard());
//! let mut interp = Interpreter::new(Arc::clone(&catalog));
//! interp.init().unwrap();
//! interp.execute(b"require 'octet'").unwrap();
//! assert!(interp.is_loaded("octet"));
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod input;
pub mod interp;
pub mod modules;
pub mod sandbox;

// Re-export commonly used types
pub use config::{ConfigError, VmConfig};
pub use input::{load_file, load_stdin, InputBuffer, LoadError, MAX_FILE, MAX_STRING};
pub use interp::{ExecError, Interpreter, Value};
pub use modules::{Module, ModuleCatalog, ModuleError, Resolution, ResolveError};
pub use sandbox::{run_sandboxed, ExecutionOutcome, SandboxError, SandboxPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
