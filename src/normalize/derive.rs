//! Single-table derived columns.
//!
//! Every formula returns `Null` when a dependency is null or absent, never
//! an error. Money-valued results are rounded to the configured precision.

use chrono::Datelike;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::model::Value;
use crate::model::value::round_to;
use crate::schema::{DatePart, Derivation, DerivedSpec, tables};

/// Extraction patterns of the standard registry, compiled once per process.
static STANDARD_PATTERNS: Lazy<FxHashMap<&'static str, Regex>> = Lazy::new(|| {
    tables::ALL
        .iter()
        .flat_map(|t| t.derived.iter())
        .filter_map(|spec| match spec.derivation {
            Derivation::Extract { pattern, .. } => Some(pattern),
            _ => None,
        })
        .filter_map(|pattern| Regex::new(pattern).ok().map(|re| (pattern, re)))
        .collect()
});

/// Derivations prepared for one table.
pub struct DeriveContext {
    precision: u32,
    patterns: FxHashMap<&'static str, Regex>,
}

impl DeriveContext {
    /// Resolve the patterns used by `specs`. Standard patterns come from the
    /// process-wide set; others are compiled here. A pattern that fails to
    /// compile leaves its column null rather than aborting normalization.
    pub fn new(specs: &[DerivedSpec], precision: u32) -> Self {
        let mut patterns = FxHashMap::default();
        for spec in specs {
            let Derivation::Extract { pattern, .. } = spec.derivation else {
                continue;
            };
            if let Some(re) = STANDARD_PATTERNS.get(pattern) {
                patterns.insert(pattern, re.clone());
                continue;
            }
            match Regex::new(pattern) {
                Ok(re) => {
                    patterns.insert(pattern, re);
                }
                Err(e) => {
                    tracing::warn!(column = spec.name, error = %e, "invalid extraction pattern");
                }
            }
        }
        Self {
            precision,
            patterns,
        }
    }

    /// Evaluate one derivation against a row. `get` returns `Null` for
    /// absent columns.
    pub fn evaluate<'a>(&self, derivation: &Derivation, get: impl Fn(&str) -> &'a Value) -> Value {
        let num = |c: &str| get(c).as_f64();
        match *derivation {
            Derivation::LineTotal {
                quantity,
                unit_price,
                discount,
            } => match (num(quantity), num(unit_price), num(discount)) {
                (Some(q), Some(p), Some(d)) => line_total(q, p, d, self.precision),
                _ => Value::Null,
            },
            Derivation::DaysBetween { start, end } => {
                match (get(start).as_date(), get(end).as_date()) {
                    (Some(s), Some(e)) => Value::Integer((e - s).num_days()),
                    _ => Value::Null,
                }
            }
            Derivation::DatePart { source, part } => match get(source).as_date() {
                Some(d) => date_part(d, part),
                None => Value::Null,
            },
            Derivation::Difference {
                minuend,
                subtrahend,
            } => match (num(minuend), num(subtrahend)) {
                (Some(a), Some(b)) => Value::decimal(round_to(a - b, self.precision)),
                _ => Value::Null,
            },
            Derivation::Percentage {
                numerator,
                denominator,
            } => match (num(numerator), num(denominator)) {
                (Some(_), Some(d)) if d == 0.0 => Value::Null,
                (Some(n), Some(d)) => Value::decimal(round_to(n / d * 100.0, self.precision)),
                _ => Value::Null,
            },
            Derivation::Concat { parts, separator } => {
                let texts: Option<Vec<&str>> = parts.iter().map(|p| get(*p).as_str()).collect();
                texts.map_or(Value::Null, |t| Value::Text(t.iter().join(separator)))
            }
            Derivation::Extract { source, pattern } => {
                let found = self
                    .patterns
                    .get(pattern)
                    .zip(get(source).as_str())
                    .and_then(|(re, text)| re.find(text))
                    .map(|m| m.as_str().trim_end().to_string());
                found.map_or(Value::Null, Value::Text)
            }
        }
    }
}

/// `quantity × unit_price × (1 − discount)` rounded to `precision` places.
pub fn line_total(quantity: f64, unit_price: f64, discount: f64, precision: u32) -> Value {
    Value::decimal(round_to(quantity * unit_price * (1.0 - discount), precision))
}

fn date_part(d: chrono::NaiveDate, part: DatePart) -> Value {
    match part {
        DatePart::Year => Value::Integer(i64::from(d.year())),
        DatePart::Month => Value::Integer(i64::from(d.month())),
        DatePart::Quarter => Value::Integer(i64::from((d.month() - 1) / 3 + 1)),
        DatePart::DayName => Value::text(weekday_name(d.weekday())),
    }
}

fn weekday_name(w: chrono::Weekday) -> &'static str {
    use chrono::Weekday::*;
    match w {
        Mon => "Monday",
        Tue => "Tuesday",
        Wed => "Wednesday",
        Thu => "Thursday",
        Fri => "Friday",
        Sat => "Saturday",
        Sun => "Sunday",
    }
}
