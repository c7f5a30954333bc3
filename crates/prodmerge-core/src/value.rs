//! Closed value model for product table cells.
//!
//! Every cell is classified once, at ingestion, into one of three shapes:
//! nothing ([`Value::Absent`]), a single [`Scalar`], or a sequence of
//! [`Item`]s where each item is either a scalar atom or a structured
//! [`Record`]. Merge policies match on these variants instead of probing
//! runtime types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

/// A structured key→value mapping such as `{"unit": "kWh", "value": 120}`.
///
/// Field values are kept exactly as they arrived: nested objects and arrays
/// inside a record are never wrapped or flattened. Two records with the
/// same content have the same [`Item::canonical`] form whatever order their
/// keys arrived in, at any depth.
pub type Record = BTreeMap<String, Json>;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// One element of a sequence-valued cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Scalar(Scalar),
    Record(Record),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Absent,
    Scalar(Scalar),
    Sequence(Vec<Item>),
}

// ─── Scalar ────────────────────────────────────────────────

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Float(x) => Some(*x),
            _ => None,
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Scalar::Str(s) => Json::String(s.clone()),
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Int(n) => Json::from(*n),
            Scalar::Float(x) => serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number),
        }
    }

    fn from_json(json: Json) -> Option<Self> {
        match json {
            Json::String(s) => Some(Scalar::Str(s)),
            Json::Bool(b) => Some(Scalar::Bool(b)),
            Json::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) if x.is_nan() => f.write_str("nan"),
            Scalar::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            Scalar::Float(x) => write!(f, "{x}"),
        }
    }
}

// ─── Item ──────────────────────────────────────────────────

impl Item {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Item::Record(record) => Some(record),
            Item::Scalar(_) => None,
        }
    }

    /// Stable serialization used for content-equality deduplication.
    pub fn canonical(&self) -> String {
        sorted_keys(&self.to_json()).to_string()
    }

    fn to_json(&self) -> Json {
        match self {
            Item::Scalar(scalar) => scalar.to_json(),
            Item::Record(record) => record_to_json(record),
        }
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Scalar(Scalar::Str(s.to_string()))
    }
}

impl From<Record> for Item {
    fn from(record: Record) -> Self {
        Item::Record(record)
    }
}

// ─── Value ─────────────────────────────────────────────────

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Str(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }

    pub fn int(n: i64) -> Self {
        Value::Scalar(Scalar::Int(n))
    }

    pub fn float(x: f64) -> Self {
        Value::Scalar(Scalar::Float(x))
    }

    /// A sequence of string atoms.
    pub fn atoms<I, S>(atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Sequence(
            atoms
                .into_iter()
                .map(|s| Item::Scalar(Scalar::Str(s.into())))
                .collect(),
        )
    }

    pub fn records(records: impl IntoIterator<Item = Record>) -> Self {
        Value::Sequence(records.into_iter().map(Item::Record).collect())
    }

    pub fn empty_sequence() -> Self {
        Value::Sequence(Vec::new())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Item]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the cell carries no information: absent, an empty string,
    /// or an empty sequence.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Absent => true,
            Value::Scalar(Scalar::Str(s)) => s.is_empty(),
            Value::Scalar(_) => false,
            Value::Sequence(items) => items.is_empty(),
        }
    }

    /// Stable serialization; equal content always yields an equal string.
    pub fn canonical(&self) -> String {
        sorted_keys(&self.to_json()).to_string()
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Absent => Json::Null,
            Value::Scalar(scalar) => scalar.to_json(),
            Value::Sequence(items) => Json::Array(items.iter().map(Item::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Scalar(scalar) => scalar.fmt(f),
            Value::Sequence(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Absent,
            Json::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                flatten_into(&mut items, elements);
                Value::Sequence(items)
            }
            Json::Object(map) => Value::Sequence(vec![Item::Record(record_from_map(map))]),
            other => Scalar::from_json(other).map_or(Value::Absent, Value::Scalar),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::float(x)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Absent, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Value::from)
    }
}

fn flatten_into(items: &mut Vec<Item>, elements: Vec<Json>) {
    for element in elements {
        match element {
            Json::Null => {}
            Json::Array(inner) => flatten_into(items, inner),
            Json::Object(map) => items.push(Item::Record(record_from_map(map))),
            other => {
                if let Some(scalar) = Scalar::from_json(other) {
                    items.push(Item::Scalar(scalar));
                }
            }
        }
    }
}

fn record_from_map(map: serde_json::Map<String, Json>) -> Record {
    map.into_iter().collect()
}

fn record_to_json(record: &Record) -> Json {
    Json::Object(
        record
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

/// `json` with the keys of every object sorted, at any depth.
fn sorted_keys(json: &Json) -> Json {
    match json {
        Json::Object(map) => {
            let mut entries: Vec<(&String, &Json)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Json::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted_keys(value)))
                    .collect(),
            )
        }
        Json::Array(elements) => Json::Array(elements.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

/// Convenience constructor for records in tests and fixtures.
pub fn record<I, K, V>(fields: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Json>,
{
    fields
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_classification() {
        assert_eq!(Value::from(json!(null)), Value::Absent);
        assert_eq!(Value::from(json!("a")), Value::str("a"));
        assert_eq!(Value::from(json!(true)), Value::bool(true));
        assert_eq!(Value::from(json!(2020)), Value::int(2020));
        assert_eq!(Value::from(json!(1.5)), Value::float(1.5));
        assert_eq!(
            Value::from(json!(["x", null, ["y"]])),
            Value::atoms(["x", "y"])
        );
    }

    #[test]
    fn test_lone_object_becomes_single_record_sequence() {
        let value = Value::from(json!({"unit": "kWh", "value": 120}));
        let items = value.items().unwrap();
        assert_eq!(items.len(), 1);
        let rec = items[0].as_record().unwrap();
        assert_eq!(rec.get("unit"), Some(&json!("kWh")));
        assert_eq!(rec.get("value"), Some(&json!(120)));
    }

    #[test]
    fn test_record_fields_keep_their_nested_shape() {
        let value = Value::from(json!([
            {"amount": {"value": 5, "currency": "USD"}, "tiers": [[1, 2], null]}
        ]));
        assert_eq!(
            value.to_json(),
            json!([{"amount": {"value": 5, "currency": "USD"}, "tiers": [[1, 2], null]}])
        );

        let wrapped = Value::from(json!([{"a": [{"b": 1}]}]));
        let bare = Value::from(json!([{"a": {"b": 1}}]));
        assert_ne!(wrapped.canonical(), bare.canonical());
    }

    #[test]
    fn test_canonical_sorts_nested_keys() {
        let a = Value::from(json!([{"amount": {"value": 5, "currency": "USD"}}]));
        let b = Value::from(json!([{"amount": {"currency": "USD", "value": 5}}]));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_canonical_ignores_key_order() {
        let a = Value::from(json!([{"unit": "kWh", "v": 1}]));
        let b = Value::from(json!([{"v": 1, "unit": "kWh"}]));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_display_matches_log_format() {
        assert_eq!(Value::bool(true).to_string(), "True");
        assert_eq!(Value::bool(false).to_string(), "False");
        assert_eq!(Value::float(2020.0).to_string(), "2020.0");
        assert_eq!(Value::float(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Absent.to_string(), "");
        assert_eq!(Value::atoms(["a", "b"]).to_string(), r#"["a","b"]"#);
    }

    #[test]
    fn test_serde_roundtrip_through_json_text() {
        let value = Value::records([record([("unit", "kg"), ("amount", "5")])]);
        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_blank_detection() {
        assert!(Value::Absent.is_blank());
        assert!(Value::str("").is_blank());
        assert!(Value::empty_sequence().is_blank());
        assert!(!Value::bool(false).is_blank());
        assert!(!Value::int(0).is_blank());
    }
}
