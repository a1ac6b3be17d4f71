//! Built-in interpreter libraries
//!
//! The interpreter's own standard libraries, matched case-sensitively and
//! resolved before either extension tier. The set mirrors the classic
//! scripting stdlib surface; libraries whose behavior lives entirely in the
//! language frontend (coroutines, the package loader, the debug hooks)
//! register as named modules with no host functions.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    bytes_arg, expect_args, int_arg, str_arg, Module, ModuleCtor, ModuleError, ModuleFn,
    ModuleKind,
};
use crate::interp::Value;

/// The built-in library table. Ordered as the interpreter has always listed
/// them; resolution order across tiers does not depend on this.
pub const BUILTINS: &[(&str, ModuleCtor)] = &[
    ("package", open_package),
    ("coroutine", open_coroutine),
    ("table", open_table),
    ("io", open_io),
    ("os", open_os),
    ("string", open_string),
    ("math", open_math),
    ("utf8", open_utf8),
    ("debug", open_debug),
];

fn builtin(name: &str, functions: Vec<(&'static str, ModuleFn)>) -> Module {
    Module::new(name, ModuleKind::Builtin, functions)
}

fn open_package() -> Module {
    builtin("package", Vec::new())
}

fn open_coroutine() -> Module {
    builtin("coroutine", Vec::new())
}

fn open_debug() -> Module {
    builtin("debug", Vec::new())
}

fn open_string() -> Module {
    builtin(
        "string",
        vec![
            ("upper", string_upper as ModuleFn),
            ("lower", string_lower as ModuleFn),
            ("len", string_len as ModuleFn),
            ("reverse", string_reverse as ModuleFn),
            ("rep", string_rep as ModuleFn),
        ],
    )
}

fn string_upper(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Str(str_arg(args, 0)?.to_uppercase()))
}

fn string_lower(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Str(str_arg(args, 0)?.to_lowercase()))
}

fn string_len(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Int(bytes_arg(args, 0)?.len() as i64))
}

fn string_reverse(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Str(str_arg(args, 0)?.chars().rev().collect()))
}

fn string_rep(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    let s = str_arg(args, 0)?;
    let n = int_arg(args, 1)?;
    if n < 0 {
        return Err(ModuleError::BadArgument(
            "repeat count must not be negative".to_string(),
        ));
    }
    Ok(Value::Str(s.repeat(n as usize)))
}

fn open_math() -> Module {
    builtin(
        "math",
        vec![
            ("abs", math_abs as ModuleFn),
            ("max", math_max as ModuleFn),
            ("min", math_min as ModuleFn),
            ("pow", math_pow as ModuleFn),
        ],
    )
}

fn math_abs(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    int_arg(args, 0)?
        .checked_abs()
        .map(Value::Int)
        .ok_or_else(|| ModuleError::BadArgument("integer overflow in abs".to_string()))
}

fn math_max(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?)))
}

fn math_min(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?)))
}

fn math_pow(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    let base = int_arg(args, 0)?;
    let exp = int_arg(args, 1)?;
    if !(0..=u32::MAX as i64).contains(&exp) {
        return Err(ModuleError::BadArgument(
            "exponent out of range".to_string(),
        ));
    }
    base.checked_pow(exp as u32)
        .map(Value::Int)
        .ok_or_else(|| ModuleError::BadArgument("integer overflow in pow".to_string()))
}

fn open_table() -> Module {
    builtin(
        "table",
        vec![
            ("concat", table_concat as ModuleFn),
            ("size", table_size as ModuleFn),
        ],
    )
}

fn table_concat(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    let items = match &args[0] {
        Value::Array(items) => items,
        _ => {
            return Err(ModuleError::BadArgument(
                "argument 1 must be an array".to_string(),
            ))
        }
    };
    let sep = str_arg(args, 1)?;
    let joined = items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep);
    Ok(Value::Str(joined))
}

fn table_size(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    match &args[0] {
        Value::Array(items) => Ok(Value::Int(items.len() as i64)),
        Value::Object(fields) => Ok(Value::Int(fields.len() as i64)),
        _ => Err(ModuleError::BadArgument(
            "argument 1 must be an array or object".to_string(),
        )),
    }
}

fn open_io() -> Module {
    builtin("io", vec![("write", io_write as ModuleFn)])
}

// Writes through the process stdout; `write` stays on the syscall
// allow-list, so this surface keeps working under isolation.
fn io_write(args: &[Value]) -> Result<Value, ModuleError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut written: i64 = 0;
    for value in args {
        let rendered = value.to_string();
        out.write_all(rendered.as_bytes())
            .map_err(|e| ModuleError::BadArgument(format!("write failed: {}", e)))?;
        written += rendered.len() as i64;
    }
    Ok(Value::Int(written))
}

fn open_os() -> Module {
    builtin(
        "os",
        vec![
            ("time", os_time as ModuleFn),
            ("getenv", os_getenv as ModuleFn),
        ],
    )
}

fn os_time(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 0)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ModuleError::BadArgument(format!("clock error: {}", e)))?;
    Ok(Value::Int(now.as_secs() as i64))
}

fn os_getenv(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let name = str_arg(args, 0)?;
    Ok(match std::env::var(name) {
        Ok(v) => Value::Str(v),
        Err(_) => Value::Nil,
    })
}

fn open_utf8() -> Module {
    builtin("utf8", vec![("len", utf8_len as ModuleFn)])
}

fn utf8_len(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Int(str_arg(args, 0)?.chars().count() as i64))
}
