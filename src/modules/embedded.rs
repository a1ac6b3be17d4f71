//! Embedded extension descriptors
//!
//! DSL sources shipped inside the binary, generated into `lib/` at build
//! time of the language distribution and embedded here verbatim. These are
//! trusted artifacts: a load failure aborts the run (see the resolver).
//!
//! The `init` entry is distinguished - never reachable through `require`,
//! run exactly once at interpreter start-up.

/// One embedded source.
pub struct EmbeddedSource {
    pub name: &'static str,
    pub source: &'static str,
}

/// The embedded extension table, in shipping order. `init` first, by
/// convention only; resolution never reaches it and `run_init` looks it up
/// by name.
pub const EMBEDDED: &[EmbeddedSource] = &[
    EmbeddedSource {
        name: "init",
        source: include_str!("../../lib/init.zn"),
    },
    EmbeddedSource {
        name: "inspect",
        source: include_str!("../../lib/inspect.zn"),
    },
    EmbeddedSource {
        name: "schema",
        source: include_str!("../../lib/schema.zn"),
    },
    EmbeddedSource {
        name: "hash",
        source: include_str!("../../lib/hash.zn"),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_present_and_nonempty() {
        let init = EMBEDDED.iter().find(|e| e.name == "init").unwrap();
        assert!(!init.source.trim().is_empty());
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        for (i, a) in EMBEDDED.iter().enumerate() {
            for b in &EMBEDDED[i + 1..] {
                assert!(
                    !a.name.eq_ignore_ascii_case(b.name),
                    "duplicate embedded name: {}",
                    a.name
                );
            }
        }
    }
}
