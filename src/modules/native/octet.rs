//! Octet module
//!
//! Byte-array workhorse of the crypto DSL: encodings, concatenation and
//! digests over opaque byte strings.

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

use super::super::{bytes_arg, expect_args, str_arg, Module, ModuleError, ModuleFn, ModuleKind};
use crate::interp::Value;

pub fn open_octet() -> Module {
    Module::new(
        "octet",
        ModuleKind::Native,
        vec![
            ("hex", hex_encode as ModuleFn),
            ("from_hex", hex_decode as ModuleFn),
            ("base64", base64_encode as ModuleFn),
            ("from_base64", base64_decode as ModuleFn),
            ("concat", concat as ModuleFn),
            ("length", length as ModuleFn),
            ("digest", digest as ModuleFn),
        ],
    )
}

fn hex_encode(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Str(hex::encode(bytes_arg(args, 0)?)))
}

fn hex_decode(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let decoded = hex::decode(str_arg(args, 0)?.trim())
        .map_err(|e| ModuleError::Codec(format!("invalid hex: {}", e)))?;
    Ok(Value::Bytes(decoded))
}

fn base64_encode(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Str(
        general_purpose::STANDARD.encode(bytes_arg(args, 0)?),
    ))
}

fn base64_decode(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let decoded = general_purpose::STANDARD
        .decode(str_arg(args, 0)?.trim())
        .map_err(|e| ModuleError::Codec(format!("invalid base64: {}", e)))?;
    Ok(Value::Bytes(decoded))
}

fn concat(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    let mut out = bytes_arg(args, 0)?.to_vec();
    out.extend_from_slice(bytes_arg(args, 1)?);
    Ok(Value::Bytes(out))
}

fn length(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    Ok(Value::Int(bytes_arg(args, 0)?.len() as i64))
}

fn digest(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let mut hasher = Sha256::new();
    hasher.update(bytes_arg(args, 0)?);
    Ok(Value::Bytes(hasher.finalize().to_vec()))
}
