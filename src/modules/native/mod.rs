//! Natively compiled extension modules
//!
//! Host-language implementations exposed to scripts through constructor
//! functions, matched case-insensitively and searched after the embedded
//! tier. The table is fixed at build time.

pub mod ecdh;
pub mod json;
pub mod octet;

use super::ModuleCtor;

/// The native extension table.
pub const NATIVE: &[(&str, ModuleCtor)] = &[
    ("octet", octet::open_octet),
    ("ecdh", ecdh::open_ecdh),
    ("json", json::open_json),
    ("cjson_full", json::open_cjson_full),
];
