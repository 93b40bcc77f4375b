/// Typed argument values and the codecs that write them into URLs
///
/// Captured request text is decoded into a [`Value`] of a declared
/// [`ValueKind`]; link generation runs the same [`Codec`] backwards. Every
/// decode/encode pair here is lossless for values it accepts, which is what
/// lets a reversed link route back to the same arguments.
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// The declared type of a parameter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Str => "str",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bound argument value
///
/// `List` holds the items collected by a repetition or a multi-valued query
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// The scalar kind of this value, `None` for lists
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Str(_) => Some(ValueKind::Str),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::List(_) => None,
        }
    }

    /// Human readable type name used in error messages
    pub fn type_name(&self) -> &'static str {
        self.kind().map(|kind| kind.name()).unwrap_or("list")
    }

    /// Whether this value (or every list item) has the given kind
    pub fn conforms_to(&self, kind: ValueKind, many: bool) -> bool {
        match (self, many) {
            (Value::List(items), true) => items.iter().all(|item| item.kind() == Some(kind)),
            (_, true) => false,
            (value, false) => value.kind() == Some(kind),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Raised when request text cannot be read as the declared kind
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot read {raw:?} as {kind} ({codec:?})")]
pub struct DecodeError {
    pub kind: ValueKind,
    pub codec: Codec,
    pub raw: String,
}

/// How a value is written into a single path segment or query value
///
/// Only `Plain` applies to every kind; the others are integer presentations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Decimal numbers, `true`/`false`, raw strings
    #[default]
    Plain,
    /// Base 16, written lowercase or uppercase
    Hex { upper: bool },
    /// Base 2
    Binary,
    /// Decimal, zero padded to at least `width` digits
    Padded { width: usize },
}

impl Codec {
    /// Whether this codec can carry values of `kind`
    pub fn supports(&self, kind: ValueKind) -> bool {
        matches!(self, Codec::Plain) || kind == ValueKind::Int
    }

    /// Reads `raw` as a value of `kind`
    ///
    /// # Examples
    ///
    /// ```
    /// use kettle_router::{Codec, Value, ValueKind};
    ///
    /// let hex = Codec::Hex { upper: false };
    /// assert_eq!(hex.decode(ValueKind::Int, "ff").unwrap(), Value::Int(255));
    /// assert!(Codec::Plain.decode(ValueKind::Int, "abc").is_err());
    /// ```
    pub fn decode(&self, kind: ValueKind, raw: &str) -> Result<Value, DecodeError> {
        let error = || DecodeError {
            kind,
            codec: *self,
            raw: raw.to_string(),
        };

        match (self, kind) {
            (Codec::Plain, ValueKind::Str) => Ok(Value::Str(raw.to_string())),
            (Codec::Plain, ValueKind::Int) | (Codec::Padded { .. }, ValueKind::Int) => {
                parse_radix(raw, 10).map(Value::Int).ok_or_else(error)
            }
            (Codec::Hex { .. }, ValueKind::Int) => parse_radix(raw, 16).map(Value::Int).ok_or_else(error),
            (Codec::Binary, ValueKind::Int) => parse_radix(raw, 2).map(Value::Int).ok_or_else(error),
            (Codec::Plain, ValueKind::Float) => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Float)
                .ok_or_else(error),
            (Codec::Plain, ValueKind::Bool) => parse_bool(raw).map(Value::Bool).ok_or_else(error),
            _ => Err(error()),
        }
    }

    /// Writes `value` as `kind`, or `None` when the value has another type
    pub fn encode(&self, kind: ValueKind, value: &Value) -> Option<String> {
        match (self, kind, value) {
            (Codec::Plain, ValueKind::Str, Value::Str(s)) => Some(s.clone()),
            (Codec::Plain, ValueKind::Int, Value::Int(n)) => Some(n.to_string()),
            (Codec::Plain, ValueKind::Float, Value::Float(n)) if n.is_finite() => Some(n.to_string()),
            (Codec::Plain, ValueKind::Bool, Value::Bool(b)) => Some(b.to_string()),
            (Codec::Hex { upper }, ValueKind::Int, Value::Int(n)) => {
                let digits = if *upper {
                    format!("{:X}", n.unsigned_abs())
                } else {
                    format!("{:x}", n.unsigned_abs())
                };
                Some(signed(*n, digits))
            }
            (Codec::Binary, ValueKind::Int, Value::Int(n)) => {
                Some(signed(*n, format!("{:b}", n.unsigned_abs())))
            }
            (Codec::Padded { width }, ValueKind::Int, Value::Int(n)) => Some(signed(
                *n,
                format!("{:0width$}", n.unsigned_abs(), width = *width),
            )),
            _ => None,
        }
    }
}

fn parse_radix(raw: &str, radix: u32) -> Option<i64> {
    // from_str_radix tolerates a leading '+', which would not survive a round trip
    if raw.starts_with('+') {
        return None;
    }
    i64::from_str_radix(raw, radix).ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn signed(n: i64, digits: String) -> String {
    if n < 0 {
        format!("-{}", digits)
    } else {
        digits
    }
}

/// Named argument values, ordered by name
///
/// Produced by dispatch (the bindings a routable is invoked with) and
/// consumed by link generation.
///
/// # Examples
///
/// ```
/// use kettle_router::{Arguments, Value};
///
/// let args = Arguments::new().with("id", 42).with("tab", "posts");
/// assert_eq!(args.get_int("id"), Some(42));
/// assert_eq!(args.get("tab"), Some(&Value::from("posts")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(BTreeMap<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument (functional builder)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Whether every argument in `self` is present in `other` with the same value
    pub fn is_subset_of(&self, other: &Arguments) -> bool {
        self.iter().all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<K, V> FromIterator<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Arguments {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Codec::Plain, ValueKind::Int, "42", Value::Int(42))]
    #[case(Codec::Plain, ValueKind::Int, "-7", Value::Int(-7))]
    #[case(Codec::Plain, ValueKind::Float, "2.5", Value::Float(2.5))]
    #[case(Codec::Plain, ValueKind::Bool, "yes", Value::Bool(true))]
    #[case(Codec::Plain, ValueKind::Str, "hello world", Value::Str("hello world".into()))]
    #[case(Codec::Hex { upper: true }, ValueKind::Int, "FF", Value::Int(255))]
    #[case(Codec::Binary, ValueKind::Int, "101", Value::Int(5))]
    #[case(Codec::Padded { width: 4 }, ValueKind::Int, "0042", Value::Int(42))]
    fn test_decode(
        #[case] codec: Codec,
        #[case] kind: ValueKind,
        #[case] raw: &str,
        #[case] expected: Value,
    ) {
        assert_eq!(codec.decode(kind, raw).unwrap(), expected);
    }

    #[rstest]
    #[case(Codec::Plain, ValueKind::Int, "12a")]
    #[case(Codec::Plain, ValueKind::Int, "+12")]
    #[case(Codec::Plain, ValueKind::Float, "NaN")]
    #[case(Codec::Plain, ValueKind::Bool, "maybe")]
    #[case(Codec::Binary, ValueKind::Int, "102")]
    #[case(Codec::Hex { upper: false }, ValueKind::Str, "ff")]
    fn test_decode_rejects(#[case] codec: Codec, #[case] kind: ValueKind, #[case] raw: &str) {
        assert!(codec.decode(kind, raw).is_err());
    }

    #[test]
    fn test_encode_signed_presentations() {
        let hex = Codec::Hex { upper: false };
        assert_eq!(hex.encode(ValueKind::Int, &Value::Int(-255)), Some("-ff".into()));
        assert_eq!(
            hex.decode(ValueKind::Int, "-ff").unwrap(),
            Value::Int(-255)
        );

        let padded = Codec::Padded { width: 3 };
        assert_eq!(padded.encode(ValueKind::Int, &Value::Int(7)), Some("007".into()));
        assert_eq!(padded.encode(ValueKind::Int, &Value::Int(-7)), Some("-007".into()));
        assert_eq!(padded.encode(ValueKind::Int, &Value::Int(12345)), Some("12345".into()));
    }

    #[test]
    fn test_encode_rejects_wrong_type() {
        assert_eq!(Codec::Plain.encode(ValueKind::Int, &Value::from("42")), None);
        assert_eq!(Codec::Plain.encode(ValueKind::Float, &Value::Int(1)), None);
        assert_eq!(Codec::Binary.encode(ValueKind::Str, &Value::from("1")), None);
    }

    #[test]
    fn test_codec_supports() {
        assert!(Codec::Plain.supports(ValueKind::Bool));
        assert!(Codec::Binary.supports(ValueKind::Int));
        assert!(!Codec::Hex { upper: true }.supports(ValueKind::Str));
    }

    #[test]
    fn test_value_conformance() {
        let list = Value::from(vec![1, 2, 3]);
        assert!(list.conforms_to(ValueKind::Int, true));
        assert!(!list.conforms_to(ValueKind::Int, false));
        assert!(Value::from("x").conforms_to(ValueKind::Str, false));
        assert_eq!(list.type_name(), "list");
    }

    #[test]
    fn test_arguments_subset() {
        let small = Arguments::new().with("id", 1);
        let large = Arguments::new().with("id", 1).with("page", 2);
        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
    }
}
