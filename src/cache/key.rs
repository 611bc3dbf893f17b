//! Canonical cache key derivation.
//!
//! A signal request is identified by `(signal_type, protocol, parameters)`.
//! Parameters arrive from heterogeneous callers, so the same request can show
//! up with `duration: 30` or `duration: 30.0`. A declared schema coerces each
//! field to its expected type before serialization, the sorted-key canonical
//! JSON form is hashed with BLAKE3, and the hex digest is the cache key.
//!
//! The digest is stable across processes: `BTreeMap` ordering and `serde_json`
//! number formatting are deterministic, with no runtime-randomized hashing in
//! the serialization path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single parameter value.
///
/// Untagged so the JSON form reads naturally (`{"duration": 30.0}`).
/// Variant order matters for deserialization: integers are tried before
/// floats so `30` round-trips as `Int(30)` until the schema coerces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Nested parameter map
    Map(BTreeMap<String, ParamValue>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// A request parameter map (sorted by construction).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub BTreeMap<String, ParamValue>);

impl Params {
    /// Empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Numeric value as f64 (accepts `Int` and `Float`).
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Numeric value as i64 (floats are truncated).
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// String value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            ParamValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Boolean value.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Required numeric value; absence is a caller-visible error.
    pub fn require_f64(&self, name: &str) -> crate::types::SignalResult<f64> {
        self.get_f64(name)
            .ok_or_else(|| crate::types::SignalError::MissingParameter(name.to_string()))
    }

    /// Required integer value.
    pub fn require_i64(&self, name: &str) -> crate::types::SignalResult<i64> {
        self.get_i64(name)
            .ok_or_else(|| crate::types::SignalError::MissingParameter(name.to_string()))
    }

    /// Required string value.
    pub fn require_str(&self, name: &str) -> crate::types::SignalResult<&str> {
        self.get_str(name)
            .ok_or_else(|| crate::types::SignalError::MissingParameter(name.to_string()))
    }
}

/// Expected type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Floating point number
    Float,
    /// Integer number
    Integer,
    /// String
    Text,
    /// Boolean
    Flag,
}

/// Declared parameter schema driving canonical coercion.
///
/// Numeric fields not present in the table coerce to `Float`, so two callers
/// sending `5` and `5.0` always land on the same key. Integer-keyed fields
/// must be declared explicitly; `num_satellites` is the one field the wire
/// format distinguishes by integer identity.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    kinds: BTreeMap<String, ParamKind>,
}

impl ParamSchema {
    /// Schema with no declared fields (all numerics coerce to float).
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Declare a field's expected kind.
    pub fn declare(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    /// Kind declared for a field, if any.
    pub fn kind_of(&self, name: &str) -> Option<ParamKind> {
        self.kinds.get(name).copied()
    }

    /// Coerce one value per the declared (or default) kind.
    fn coerce(&self, name: &str, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Map(inner) => ParamValue::Map(
                inner
                    .iter()
                    .map(|(k, v)| (k.clone(), self.coerce(k, v)))
                    .collect(),
            ),
            ParamValue::Int(v) => match self.kind_of(name) {
                Some(ParamKind::Integer) => ParamValue::Int(*v),
                // Undeclared numerics default to float
                _ => ParamValue::Float(*v as f64),
            },
            ParamValue::Float(v) => match self.kind_of(name) {
                Some(ParamKind::Integer) => ParamValue::Int(*v as i64),
                _ => ParamValue::Float(*v),
            },
            ParamValue::Text(v) => ParamValue::Text(v.clone()),
            ParamValue::Bool(v) => ParamValue::Bool(*v),
        }
    }

    /// Canonicalize a full parameter map.
    pub fn canonicalize(&self, params: &Params) -> Params {
        Params(
            params
                .0
                .iter()
                .map(|(k, v)| (k.clone(), self.coerce(k, v)))
                .collect(),
        )
    }
}

impl Default for ParamSchema {
    /// The schema used by the signal cache: `duration` is a float,
    /// `num_satellites` an integer, everything else numeric a float.
    fn default() -> Self {
        Self::empty()
            .declare("duration", ParamKind::Float)
            .declare("num_satellites", ParamKind::Integer)
    }
}

/// Derive the canonical cache key for a request.
///
/// `key = blake3_hex("{signal_type}_{protocol}_{canonical_json}")`
pub fn cache_key(
    signal_type: &str,
    protocol: &str,
    params: &Params,
    schema: &ParamSchema,
) -> String {
    let canonical = schema.canonicalize(params);
    let json = serde_json::to_string(&canonical).expect("parameter maps always serialize");
    let key_string = format!("{}_{}_{}", signal_type, protocol, json);
    blake3::hash(key_string.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(params: &Params) -> String {
        cache_key("gps", "gps_l1", params, &ParamSchema::default())
    }

    #[test]
    fn test_key_stable_across_calls() {
        let p = Params::new().with("duration", 10.0).with("band", "L1");
        assert_eq!(key(&p), key(&p));
    }

    #[test]
    fn test_int_and_float_duration_collide() {
        let int_form = Params::new().with("duration", 30_i64);
        let float_form = Params::new().with("duration", 30.0);
        assert_eq!(key(&int_form), key(&float_form));
    }

    #[test]
    fn test_undeclared_numeric_coerces_to_float() {
        let int_form = Params::new().with("bandwidth", 5_000_000_i64);
        let float_form = Params::new().with("bandwidth", 5_000_000.0);
        assert_eq!(key(&int_form), key(&float_form));
    }

    #[test]
    fn test_num_satellites_distinguishes_keys() {
        let four = Params::new().with("num_satellites", 4_i64).with("duration", 30.0);
        let eight = Params::new().with("num_satellites", 8_i64).with("duration", 30.0);
        assert_ne!(key(&four), key(&eight));
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let a = Params::new().with("a", 1.0).with("b", 2.0).with("c", "x");
        let b = Params::new().with("c", "x").with("b", 2.0).with("a", 1.0);
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_nested_maps_canonicalized() {
        let inner_int = Params::new().with("rate", 100_i64);
        let inner_float = Params::new().with("rate", 100.0);
        let a = Params::new().with("nested", ParamValue::Map(inner_int.0));
        let b = Params::new().with("nested", ParamValue::Map(inner_float.0));
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_signal_type_and_protocol_in_key() {
        let p = Params::new().with("duration", 10.0);
        let schema = ParamSchema::default();
        let k1 = cache_key("gps", "gps_l1", &p, &schema);
        let k2 = cache_key("gps", "gps_l2", &p, &schema);
        let k3 = cache_key("adsb", "gps_l1", &p, &schema);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_strings_and_bools_pass_through() {
        let a = Params::new().with("mode", "manual").with("loop", true);
        let b = Params::new().with("mode", "manual").with("loop", true);
        assert_eq!(key(&a), key(&b));
        let c = Params::new().with("mode", "acro").with("loop", true);
        assert_ne!(key(&a), key(&c));
    }

    #[test]
    fn test_required_parameter_errors() {
        let p = Params::new().with("duration", 10.0);
        assert!(p.require_f64("duration").is_ok());
        let err = p.require_f64("frequency").unwrap_err();
        assert!(matches!(
            err,
            crate::types::SignalError::MissingParameter(ref name) if name == "frequency"
        ));
    }

    #[test]
    fn test_params_json_roundtrip() {
        let p = Params::new()
            .with("duration", 30.0)
            .with("num_satellites", 8_i64)
            .with("band", "L1");
        let json = serde_json::to_string(&p).unwrap();
        let back: Params = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
