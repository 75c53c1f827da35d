//! Cell values before and after coercion.
//!
//! [`RawValue`] is what the loader hands over: one of five tagged variants,
//! with no typing beyond what the source format carried. [`Value`] is the
//! canonical, typed cell that every stage after normalization works with.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// ISO format used whenever a date is rendered as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// RawValue
// ---------------------------------------------------------------------------

/// An untyped source cell.
///
/// Every coercion rule matches on all five variants explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// Empty cell.
    Missing,
    /// Cell the loader could not read at all (spreadsheet error values and the like).
    Invalid,
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

/// JSON null → `Missing`, numbers → `Number`, strings → `Text`,
/// booleans → `Number(1|0)`, arrays and objects → `Invalid`. Dates arrive
/// as text and are parsed by the date coercion rule.
impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawValueVisitor;

        impl<'de> Visitor<'de> for RawValueVisitor {
            type Value = RawValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number, boolean or null cell")
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawValue, E> {
                Ok(RawValue::Missing)
            }

            fn visit_none<E: de::Error>(self) -> Result<RawValue, E> {
                Ok(RawValue::Missing)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawValue, E> {
                Ok(RawValue::Number(if v { 1.0 } else { 0.0 }))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawValue, E> {
                Ok(RawValue::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawValue, E> {
                Ok(RawValue::Number(v as f64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawValue, E> {
                Ok(RawValue::Number(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawValue, E> {
                Ok(RawValue::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RawValue, E> {
                Ok(RawValue::Text(v))
            }

            // A nested cell is unreadable, not a broken document.
            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<RawValue, A::Error> {
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                Ok(RawValue::Invalid)
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<RawValue, A::Error> {
                while map
                    .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                    .is_some()
                {}
                Ok(RawValue::Invalid)
            }
        }

        deserializer.deserialize_any(RawValueVisitor)
    }
}

// ---------------------------------------------------------------------------
// ColumnType
// ---------------------------------------------------------------------------

/// Target type of a canonical column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Decimal,
    Integer,
    Date,
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Decimal => write!(f, "decimal"),
            Self::Integer => write!(f, "integer"),
            Self::Date => write!(f, "date"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A typed canonical cell.
///
/// `Decimal` never holds NaN or an infinity; constructors that could
/// produce one go through [`Value::decimal`], which maps them to `Null`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Decimal(f64),
    Integer(i64),
    Date(NaiveDate),
    Bool(bool),
}

impl Value {
    /// Finite decimal, or `Null`.
    pub fn decimal(v: f64) -> Self {
        if v.is_finite() {
            // Fold -0.0 into 0.0 so equal sums hash equally.
            Self::Decimal(if v == 0.0 { 0.0 } else { v })
        } else {
            Self::Null
        }
    }

    pub fn from_opt_f64(v: Option<f64>) -> Self {
        v.map_or(Self::Null, Self::decimal)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of `Decimal` and `Integer` cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Decimal(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Decimal(_) => 2,
            Self::Date(_) => 3,
            Self::Text(_) => 4,
        }
    }

    /// Total order used for sorting and min/max.
    ///
    /// Integers and decimals compare numerically with each other; other
    /// mixed-type pairs order by variant. `Null` sorts first here; callers
    /// that want nulls last handle them before comparing.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Text(s) => s.hash(state),
            Self::Decimal(v) => v.to_bits().hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Date(d) => d.hash(state),
            Self::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Decimal(v) => serializer.serialize_f64(*v),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::decimal(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Round half away from zero to `places` decimal places.
pub fn round_to(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_rejects_non_finite() {
        assert_eq!(Value::decimal(f64::NAN), Value::Null);
        assert_eq!(Value::decimal(f64::INFINITY), Value::Null);
        assert_eq!(Value::decimal(-0.0), Value::Decimal(0.0));
    }

    #[test]
    fn integer_and_decimal_compare_numerically() {
        assert_eq!(
            Value::Integer(3).total_cmp(&Value::Decimal(2.5)),
            Ordering::Greater
        );
        assert_eq!(
            Value::Decimal(3.0).total_cmp(&Value::Integer(3)),
            Ordering::Equal
        );
    }

    #[test]
    fn integer_and_decimal_are_distinct_keys() {
        assert_ne!(Value::Integer(1), Value::Decimal(1.0));
    }

    #[test]
    fn serializes_dates_as_iso() {
        let d = NaiveDate::from_ymd_opt(2006, 3, 24).unwrap();
        let json = serde_json::to_string(&Value::Date(d)).unwrap();
        assert_eq!(json, "\"2006-03-24\"");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn raw_value_from_json() {
        let cells: Vec<RawValue> =
            serde_json::from_str(r#"[null, 12, 1.5, "Order Date", true]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                RawValue::Missing,
                RawValue::Number(12.0),
                RawValue::Number(1.5),
                RawValue::Text("Order Date".into()),
                RawValue::Number(1.0),
            ]
        );
    }

    #[test]
    fn nested_json_cells_are_invalid() {
        let cells: Vec<RawValue> =
            serde_json::from_str(r#"[2, {"oops": [1, 2]}, [3, {"a": null}], 5]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                RawValue::Number(2.0),
                RawValue::Invalid,
                RawValue::Invalid,
                RawValue::Number(5.0),
            ]
        );
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round_to(1.005 * 1000.0, 2), 1005.0);
        assert_eq!(round_to(33.333_333, 2), 33.33);
        assert_eq!(round_to(-2.675, 1), -2.7);
    }
}
