//! ECDH module
//!
//! Curve25519 key agreement for scripts: keypair generation, public-key
//! derivation and session-secret computation. Raw shared points are never
//! exposed; the session secret is the SHA-512 of the Diffie-Hellman output.

use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};

use super::super::{bytes_arg, expect_args, Module, ModuleError, ModuleFn, ModuleKind};
use crate::interp::Value;

const KEY_LEN: usize = 32;

pub fn open_ecdh() -> Module {
    Module::new(
        "ecdh",
        ModuleKind::Native,
        vec![
            ("keygen", keygen as ModuleFn),
            ("pubgen", pubgen as ModuleFn),
            ("session", session as ModuleFn),
        ],
    )
}

fn secret_from(args: &[Value], index: usize) -> Result<StaticSecret, ModuleError> {
    let raw: [u8; KEY_LEN] = bytes_arg(args, index)?
        .try_into()
        .map_err(|_| ModuleError::BadArgument(format!("key must be {} bytes", KEY_LEN)))?;
    Ok(StaticSecret::from(raw))
}

fn keygen(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 0)?;
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    Ok(Value::Object(vec![
        ("private".to_string(), Value::Bytes(secret.to_bytes().to_vec())),
        ("public".to_string(), Value::Bytes(public.as_bytes().to_vec())),
    ]))
}

fn pubgen(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 1)?;
    let secret = secret_from(args, 0)?;
    let public = PublicKey::from(&secret);
    Ok(Value::Bytes(public.as_bytes().to_vec()))
}

fn session(args: &[Value]) -> Result<Value, ModuleError> {
    expect_args(args, 2)?;
    let secret = secret_from(args, 0)?;
    let peer: [u8; KEY_LEN] = bytes_arg(args, 1)?
        .try_into()
        .map_err(|_| ModuleError::BadArgument(format!("public key must be {} bytes", KEY_LEN)))?;
    let shared = secret.diffie_hellman(&PublicKey::from(peer));
    if !shared.was_contributory() {
        return Err(ModuleError::BadArgument(
            "low-order public key rejected".to_string(),
        ));
    }
    let mut kdf = Sha512::new();
    kdf.update(shared.as_bytes());
    Ok(Value::Bytes(kdf.finalize().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (Value, Value) {
        let m = open_ecdh();
        match m.call("keygen", &[]).unwrap() {
            Value::Object(fields) => {
                let get = |name: &str| {
                    fields
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .unwrap()
                };
                (get("private"), get("public"))
            }
            other => panic!("unexpected keygen result: {}", other),
        }
    }

    #[test]
    fn pubgen_matches_keygen() {
        let m = open_ecdh();
        let (private, public) = keypair();
        assert_eq!(m.call("pubgen", &[private]).unwrap(), public);
    }

    #[test]
    fn both_sides_derive_the_same_session() {
        let m = open_ecdh();
        let (alice_sk, alice_pk) = keypair();
        let (bob_sk, bob_pk) = keypair();
        let a = m.call("session", &[alice_sk, bob_pk]).unwrap();
        let b = m.call("session", &[bob_sk, alice_pk]).unwrap();
        assert_eq!(a, b);
        match a {
            Value::Bytes(ref secret) => assert_eq!(secret.len(), 64),
            _ => panic!("session secret must be an octet"),
        }
    }

    #[test]
    fn short_key_is_rejected() {
        let m = open_ecdh();
        assert!(m.call("pubgen", &[Value::Bytes(vec![0; 16])]).is_err());
    }

    #[test]
    fn low_order_peer_is_rejected() {
        let m = open_ecdh();
        let (sk, _) = keypair();
        assert!(m.call("session", &[sk, Value::Bytes(vec![0; 32])]).is_err());
    }
}
