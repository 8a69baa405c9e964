//! Typed scalar values carried by dumped rows.
//!
//! Every value has a canonical *key form* used by the column mapper, so the
//! id `17` stored as an integer column and the `17` embedded in a composite
//! string such as `"Company|17"` resolve to the same mapping entry.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format used for the key form of date/time values.
pub const DATETIME_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One column value of a dumped row.
///
/// Serialized adjacently tagged (`{"type": "int", "value": 5}`) so the dump
/// container keeps the type information needed at restore time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Guid(Uuid),
    DateTime(NaiveDateTime),
    Binary(Vec<u8>),
}

impl ColumnValue {
    /// Canonical key form, or `None` for values that can never be keys.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Null | Self::Binary(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(normalize_key(s)),
            Self::Guid(g) => Some(g.hyphenated().to_string()),
            Self::DateTime(dt) => Some(dt.format(DATETIME_KEY_FORMAT).to_string()),
        }
    }

    /// `true` for values that mean "no reference" in a foreign-key column.
    pub fn is_no_reference(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Int(0) => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Re-express `new` in the representation of `self`.
    ///
    /// A text column that references an integer key keeps holding text after
    /// remapping; an integer column keeps holding an integer.
    pub fn coerce_like(&self, new: &ColumnValue) -> ColumnValue {
        match (self, new) {
            (Self::Text(_), Self::Text(_)) => new.clone(),
            (Self::Text(_), other) => match other.key() {
                Some(key) => Self::Text(key),
                None => other.clone(),
            },
            (Self::Int(_), Self::Text(s)) => match s.parse() {
                Ok(i) => Self::Int(i),
                Err(_) => new.clone(),
            },
            (Self::Guid(_), Self::Text(s)) => match Uuid::parse_str(s) {
                Ok(g) => Self::Guid(g),
                Err(_) => new.clone(),
            },
            _ => new.clone(),
        }
    }
}

/// Lowercase GUID-shaped text so `"ABC..."` and `"abc..."` map identically.
fn normalize_key(s: &str) -> String {
    match Uuid::parse_str(s) {
        Ok(g) => g.hyphenated().to_string(),
        Err(_) => s.to_string(),
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(k) => f.write_str(&k),
            None if self.is_null() => f.write_str("NULL"),
            None => write!(f, "<binary>"),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for ColumnValue {
    fn from(v: Uuid) -> Self {
        Self::Guid(v)
    }
}

impl From<NaiveDateTime> for ColumnValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_text_share_key_form() {
        assert_eq!(ColumnValue::Int(17).key(), ColumnValue::from("17").key());
    }

    #[test]
    fn guid_text_key_is_lowercased() {
        let g = Uuid::new_v4();
        let upper = ColumnValue::Text(g.to_string().to_uppercase());
        assert_eq!(upper.key(), ColumnValue::Guid(g).key());
    }

    #[test]
    fn no_reference_values() {
        assert!(ColumnValue::Null.is_no_reference());
        assert!(ColumnValue::Int(0).is_no_reference());
        assert!(ColumnValue::from("  ").is_no_reference());
        assert!(!ColumnValue::Int(3).is_no_reference());
        assert!(!ColumnValue::from("Task_3").is_no_reference());
    }

    #[test]
    fn coerce_keeps_column_representation() {
        let text = ColumnValue::from("5");
        assert_eq!(text.coerce_like(&ColumnValue::Int(105)), ColumnValue::from("105"));

        let int = ColumnValue::Int(5);
        assert_eq!(int.coerce_like(&ColumnValue::from("105")), ColumnValue::Int(105));
    }

    #[test]
    fn serialized_form_is_tagged() {
        let json = serde_json::to_value(ColumnValue::Int(5)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "int", "value": 5 }));

        let null = serde_json::to_value(ColumnValue::Null).unwrap();
        assert_eq!(null["type"], "null");
        let back: ColumnValue = serde_json::from_value(null).unwrap();
        assert!(back.is_null());
    }
}
