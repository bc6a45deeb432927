// src/fingerprint/mod.rs

//! Deterministic configuration fingerprinting and diffing
//!
//! A fingerprint is a stable, order-independent identity for a configuration
//! map. Two configurations that are equal after recursive key sorting always
//! hash to the same fingerprint; any differing key or value changes it.
//!
//! # Algorithm
//!
//! The configuration is serialized to a canonical byte stream (object keys
//! sorted recursively, length-prefixed scalars) and digested with XXH128.
//! XXH128 is non-cryptographic: fingerprints identify configurations, they
//! do not authenticate them. File integrity uses SHA-256 elsewhere.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use xxhash_rust::xxh3::xxh3_128;

/// A configuration map as registered by a producer run
pub type Configuration = Map<String, Value>;

/// Hex length of a rendered fingerprint (128 bits)
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// Broad category of a configuration, kept as an exhaustive tagged type
/// with a narrow string mapping confined to the storage boundary
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationType {
    Ocr,
    Parser,
    Pipeline,
    #[strum(default)]
    #[serde(untagged)]
    Other(String),
}

/// Stable identity of a canonicalized configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Get the fingerprint as a hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Parse(format!("invalid fingerprint: {}", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

/// One differing key between two configurations.
///
/// `None` on a side means the key is absent there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDiff {
    pub a: Option<Value>,
    pub b: Option<Value>,
}

/// Compute the fingerprint of a configuration.
///
/// Equal configurations produce equal fingerprints regardless of key order,
/// at any nesting depth. Returns [`Error::Validation`] if the configuration
/// contains a non-finite number (JSON has no text form for NaN/infinity).
pub fn fingerprint(config: &Configuration) -> Result<Fingerprint> {
    let mut bytes = Vec::new();
    canonical_bytes(&Value::Object(config.clone()), &mut bytes)?;
    Ok(Fingerprint(format!("{:032x}", xxh3_128(&bytes))))
}

/// Convert any serializable value into a [`Configuration`].
///
/// Fails with [`Error::Validation`] when the value is not a JSON object or
/// cannot be serialized at all.
pub fn to_configuration<T: Serialize>(value: &T) -> Result<Configuration> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Validation(format!(
            "configuration must be a map, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(Error::Validation(format!(
            "configuration is not serializable: {}",
            e
        ))),
    }
}

/// Report every key whose value differs between `a` and `b`.
///
/// Keys with equal values are omitted. Nested maps compare as whole values;
/// the diff granularity is the top-level key.
pub fn diff(a: &Configuration, b: &Configuration) -> BTreeMap<String, ValueDiff> {
    let mut out = BTreeMap::new();
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for key in keys {
        let va = a.get(key.as_str());
        let vb = b.get(key.as_str());
        if va != vb {
            out.insert(
                key.clone(),
                ValueDiff {
                    a: va.cloned(),
                    b: vb.cloned(),
                },
            );
        }
    }
    out
}

/// Fraction of keys (over the union of both key sets) whose values match.
///
/// Two empty configurations are defined as fully similar (1.0).
pub fn similarity(a: &Configuration, b: &Configuration) -> f64 {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    if keys.is_empty() {
        return 1.0;
    }
    let matching = keys
        .iter()
        .filter(|k| a.get(k.as_str()) == b.get(k.as_str()))
        .count();
    matching as f64 / keys.len() as f64
}

/// Write the canonical byte form of a JSON value.
///
/// Objects are emitted with keys in sorted order at every depth; scalars are
/// tagged and NUL-terminated so that adjacent values cannot alias each other.
fn canonical_bytes(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"z\0"),
        Value::Bool(b) => {
            out.push(b'b');
            out.push(if *b { 1 } else { 0 });
            out.push(0);
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(Error::Validation(
                        "configuration contains a non-finite number".to_string(),
                    ));
                }
            }
            out.push(b'n');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(0);
        }
        Value::String(s) => {
            out.push(b's');
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        Value::Array(items) => {
            out.extend_from_slice(b"a[");
            for item in items {
                canonical_bytes(item, out)?;
            }
            out.extend_from_slice(b"]\0");
        }
        Value::Object(map) => {
            // BTreeMap gives the sorted key order
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.extend_from_slice(b"o{");
            for (key, val) in sorted {
                out.push(b'k');
                out.extend_from_slice(key.as_bytes());
                out.push(0);
                canonical_bytes(val, out)?;
            }
            out.extend_from_slice(b"}\0");
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
