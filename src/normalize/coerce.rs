//! Per-cell type coercion.
//!
//! Each target type has one function that matches all five [`RawValue`]
//! variants explicitly. The outcome keeps "missing" and "invalid" apart so
//! the quality report can count them separately; the column's
//! [`Coercion`] rule then decides what value lands in the table.

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::value::DATE_FORMAT;
use crate::model::{ColumnType, RawValue, Value};
use crate::schema::Coercion;

/// Datetime layouts accepted in text cells, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];
/// Date-only layouts accepted in text cells, tried in order.
const DATE_FORMATS: &[&str] = &[DATE_FORMAT, "%m/%d/%Y"];

/// Result of parsing one raw cell against a target type.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(Value),
    Missing,
    Invalid,
}

/// How a cell ended up in the normalized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    Parsed,
    Missing,
    Invalid,
}

/// Parse a raw cell as `ty`.
pub fn coerce(raw: &RawValue, ty: ColumnType) -> Coerced {
    match ty {
        ColumnType::Text => to_text(raw),
        ColumnType::Decimal => to_decimal(raw),
        ColumnType::Integer => to_integer(raw),
        ColumnType::Date => to_date(raw),
        ColumnType::Boolean => to_bool(raw),
    }
}

/// Parse a raw cell and apply the column's fallback rule.
///
/// Returns the cell value, how parsing went, and whether a fallback value
/// was substituted.
pub fn coerce_cell(raw: &RawValue, ty: ColumnType, rule: Coercion) -> (Value, CellOutcome, bool) {
    if let Coercion::Lookup { labels, default } = rule {
        return lookup(raw, labels, default);
    }
    let (parsed, outcome) = match coerce(raw, ty) {
        Coerced::Value(v) => return (v, CellOutcome::Parsed, false),
        Coerced::Missing => (Value::Null, CellOutcome::Missing),
        Coerced::Invalid => (Value::Null, CellOutcome::Invalid),
    };
    match (rule, ty) {
        (Coercion::ZeroFallback, ColumnType::Decimal) => (Value::Decimal(0.0), outcome, true),
        (Coercion::ZeroFallback, ColumnType::Integer) => (Value::Integer(0), outcome, true),
        _ => (parsed, outcome, false),
    }
}

fn lookup(raw: &RawValue, labels: &[(&str, i64)], default: i64) -> (Value, CellOutcome, bool) {
    match raw {
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return (Value::Integer(default), CellOutcome::Missing, true);
            }
            if let Some((_, code)) = labels.iter().find(|(l, _)| l.eq_ignore_ascii_case(s)) {
                return (Value::Integer(*code), CellOutcome::Parsed, false);
            }
            match s.parse::<i64>() {
                Ok(code) => (Value::Integer(code), CellOutcome::Parsed, false),
                Err(_) => (Value::Integer(default), CellOutcome::Invalid, true),
            }
        }
        RawValue::Number(n) => match integral(*n) {
            Some(code) => (Value::Integer(code), CellOutcome::Parsed, false),
            None => (Value::Integer(default), CellOutcome::Invalid, true),
        },
        RawValue::Date(_) | RawValue::Invalid => {
            (Value::Integer(default), CellOutcome::Invalid, true)
        }
        RawValue::Missing => (Value::Integer(default), CellOutcome::Missing, true),
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15).then_some(n as i64)
}

fn to_text(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                Coerced::Missing
            } else {
                Coerced::Value(Value::Text(s.to_string()))
            }
        }
        RawValue::Number(n) if !n.is_finite() => Coerced::Invalid,
        RawValue::Number(n) => Coerced::Value(Value::Text(match integral(*n) {
            Some(i) => i.to_string(),
            None => n.to_string(),
        })),
        RawValue::Date(d) => Coerced::Value(Value::Text(d.format(DATE_FORMAT).to_string())),
        RawValue::Missing => Coerced::Missing,
        RawValue::Invalid => Coerced::Invalid,
    }
}

/// Parse numeric text: surrounding whitespace, one leading `$` and `,`
/// thousands separators are tolerated.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn to_decimal(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Text(s) if s.trim().is_empty() => Coerced::Missing,
        RawValue::Text(s) => parse_number(s).map_or(Coerced::Invalid, |v| Coerced::Value(Value::decimal(v))),
        RawValue::Number(n) if n.is_finite() => Coerced::Value(Value::decimal(*n)),
        RawValue::Number(_) => Coerced::Invalid,
        RawValue::Date(_) => Coerced::Invalid,
        RawValue::Missing => Coerced::Missing,
        RawValue::Invalid => Coerced::Invalid,
    }
}

fn to_integer(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Text(s) if s.trim().is_empty() => Coerced::Missing,
        RawValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| parse_number(s).and_then(integral))
                .map_or(Coerced::Invalid, |v| Coerced::Value(Value::Integer(v)))
        }
        RawValue::Number(n) => integral(*n).map_or(Coerced::Invalid, |v| Coerced::Value(Value::Integer(v))),
        RawValue::Date(_) => Coerced::Invalid,
        RawValue::Missing => Coerced::Missing,
        RawValue::Invalid => Coerced::Invalid,
    }
}

/// Parse a date from text in any accepted layout.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok().map(|dt| dt.date()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        })
}

fn to_date(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Text(s) if s.trim().is_empty() => Coerced::Missing,
        RawValue::Text(s) => parse_date(s).map_or(Coerced::Invalid, |d| Coerced::Value(Value::Date(d))),
        // Bare numbers are ambiguous (serial days, epoch seconds, …).
        RawValue::Number(_) => Coerced::Invalid,
        RawValue::Date(d) => Coerced::Value(Value::Date(*d)),
        RawValue::Missing => Coerced::Missing,
        RawValue::Invalid => Coerced::Invalid,
    }
}

fn to_bool(raw: &RawValue) -> Coerced {
    match raw {
        RawValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Coerced::Missing,
            "true" | "yes" | "y" | "1" => Coerced::Value(Value::Bool(true)),
            "false" | "no" | "n" | "0" => Coerced::Value(Value::Bool(false)),
            _ => Coerced::Invalid,
        },
        RawValue::Number(n) if n.is_nan() => Coerced::Invalid,
        RawValue::Number(n) => Coerced::Value(Value::Bool(*n != 0.0)),
        RawValue::Date(_) => Coerced::Invalid,
        RawValue::Missing => Coerced::Missing,
        RawValue::Invalid => Coerced::Invalid,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
