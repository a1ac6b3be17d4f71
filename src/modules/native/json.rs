//! JSON modules
//!
//! Two codecs over the same machinery: `json` caps nesting depth so script
//! input cannot stack-exhaust the runtime, `cjson_full` lifts the cap for
//! callers that deal in trusted documents.

use serde_json::Number;

use super::super::{expect_args, str_arg, Module, ModuleError, ModuleFn, ModuleKind};
use crate::interp::Value;

/// Nesting allowed by the safe codec.
const SAFE_DEPTH: usize = 32;

pub fn open_json() -> Module {
    Module::new(
        "json",
        ModuleKind::Native,
        vec![
            ("encode", encode_safe as ModuleFn),
            ("decode", decode_safe as ModuleFn),
        ],
    )
}

pub fn open_cjson_full() -> Module {
    Module::new(
        "cjson_full",
        ModuleKind::Native,
        vec![
            ("encode", encode_full as ModuleFn),
            ("decode", decode_full as ModuleFn),
        ],
    )
}

fn encode_safe(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    check_depth(&args[0], SAFE_DEPTH)?;
    encode(&args[0])
}

fn decode_safe(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let value = decode(str_arg(args, 0)?)?;
    check_depth(&value, SAFE_DEPTH)?;
    Ok(value)
}

fn encode_full(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    encode(&args[0])
}

fn decode_full(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    decode(str_arg(args, 0)?)
}

fn encode(value: &Value) -> Result<Value, ModuleError> {
    let doc = to_json(value)?;
    let text = serde_json::to_string(&doc)
        .map_err(|e| ModuleError::Codec(format!("encode failed: {}", e)))?;
    Ok(Value::Str(text))
}

fn decode(text: &str) -> Result<Value, ModuleError> {
    let doc: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ModuleError::Codec(format!("decode failed: {}", e)))?;
    Ok(from_json(doc))
}

fn check_depth(value: &Value, budget: usize) -> Result<(), ModuleError> {
    if budget == 0 {
        return Err(ModuleError::Codec(format!(
            "nesting deeper than {} levels",
            SAFE_DEPTH
        )));
    }
    match value {
        Value::Array(items) => {
            for item in items {
                check_depth(item, budget - 1)?;
            }
        }
        Value::Object(fields) => {
            for (_, item) in fields {
                check_depth(item, budget - 1)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn to_json(value: &Value) -> Result<serde_json::Value, ModuleError> {
    Ok(match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        // Octets have no JSON representation of their own; ship them hex
        // encoded, same as their printed form.
        Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(fields) => {
            let mut map = serde_json::Map::with_capacity(fields.len());
            for (key, item) in fields {
                map.insert(key.clone(), to_json(item)?);
            }
            serde_json::Value::Object(map)
        }
    })
}

fn from_json(doc: serde_json::Value) -> Value {
    match doc {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => from_number(n),
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn from_number(n: Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        // Out-of-range and fractional numbers survive as their textual form
        // rather than losing precision silently.
        None => Value::Str(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deep_array(levels: usize) -> Value {
        let mut value = Value::Int(0);
        for _ in 0..levels {
            value = Value::Array(vec![value]);
        }
        value
    }

    #[test]
    fn object_round_trip() {
        let m = open_json();
        let input = Value::Object(vec![
            ("n".to_string(), Value::Int(42)),
            ("ok".to_string(), Value::Bool(true)),
            ("who".to_string(), Value::Str("alice".to_string())),
        ]);
        let encoded = m.call("encode", &[input.clone()]).unwrap();
        let decoded = m.call("decode", &[encoded]).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn octets_encode_as_hex_strings() {
        let m = open_json();
        let encoded = m
            .call("encode", &[Value::Bytes(vec![0xca, 0xfe])])
            .unwrap();
        assert_eq!(encoded, Value::Str("\"cafe\"".to_string()));
    }

    #[test]
    fn safe_codec_rejects_deep_nesting() {
        let m = open_json();
        assert!(m.call("encode", &[deep_array(SAFE_DEPTH + 1)]).is_err());
        assert!(m.call("encode", &[deep_array(SAFE_DEPTH - 1)]).is_ok());
    }

    #[test]
    fn full_codec_takes_what_safe_rejects() {
        let full = open_cjson_full();
        let deep = deep_array(SAFE_DEPTH + 1);
        let encoded = full.call("encode", &[deep.clone()]).unwrap();
        assert_eq!(full.call("decode", &[encoded]).unwrap(), deep);
    }

    #[test]
    fn malformed_input_is_a_codec_error() {
        let m = open_json();
        assert!(matches!(
            m.call("decode", &[Value::Str("{broken".to_string())]),
            Err(ModuleError::Codec(_))
        ));
    }
}
