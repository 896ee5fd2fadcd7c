//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Identifier normalisation and tolerant numeric parsing.
//!
//! Survey exports mix textual, integer and float renditions of the same key
//! (`"42 "`, `42.0`, `42`). Every join in the engine goes through [`normalize`]
//! so those variants land on one canonical string.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::Serialize;

/// A cell value as delivered by the attribute loader, before interpretation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    #[default]
    Missing,
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(text) => f.write_str(text),
            RawValue::Integer(value) => write!(f, "{value}"),
            RawValue::Float(value) => write!(f, "{value}"),
            RawValue::Missing => f.write_str("<missing>"),
        }
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string, number, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<RawValue, E> {
        Ok(RawValue::Text(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<RawValue, E> {
        Ok(RawValue::Integer(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<RawValue, E> {
        Ok(i64::try_from(value)
            .map(RawValue::Integer)
            .unwrap_or_else(|_| RawValue::Text(value.to_string())))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<RawValue, E> {
        Ok(RawValue::Float(value))
    }

    // Empty CSV cells arrive as empty strings.
    fn visit_str<E: de::Error>(self, value: &str) -> Result<RawValue, E> {
        if value.is_empty() {
            return Ok(RawValue::Missing);
        }
        Ok(RawValue::Text(value.to_owned()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<RawValue, E> {
        if value.is_empty() {
            return Ok(RawValue::Missing);
        }
        Ok(RawValue::Text(value))
    }

    fn visit_none<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Missing)
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Missing)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawValue, D::Error> {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

/// Canonical key, or the sentinel that never participates in a join.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedId {
    Key(String),
    Invalid,
}

impl NormalizedId {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            NormalizedId::Key(key) => Some(key),
            NormalizedId::Invalid => None,
        }
    }

    pub fn into_key(self) -> Option<String> {
        match self {
            NormalizedId::Key(key) => Some(key),
            NormalizedId::Invalid => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, NormalizedId::Key(_))
    }
}

impl fmt::Display for NormalizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedId::Key(key) => f.write_str(key),
            NormalizedId::Invalid => f.write_str("<invalid>"),
        }
    }
}

// Largest magnitude at which every integer is exactly representable as f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn normalize_float(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        Some((value as i64).to_string())
    } else {
        Some(value.to_string())
    }
}

/// Normalise a raw identifier into its canonical key.
///
/// Text is trimmed; text that parses as a float with no fractional part is
/// rewritten through its integer form, any other text is kept literally.
pub fn normalize(raw: &RawValue) -> NormalizedId {
    let key = match raw {
        RawValue::Missing => None,
        RawValue::Integer(value) => Some(value.to_string()),
        RawValue::Float(value) => normalize_float(*value),
        RawValue::Text(text) => normalize_text(text),
    };
    key.map(NormalizedId::Key).unwrap_or(NormalizedId::Invalid)
}

/// Convenience wrapper for identifiers that are already strings.
pub fn normalize_str(text: &str) -> NormalizedId {
    normalize_text(text)
        .map(NormalizedId::Key)
        .unwrap_or(NormalizedId::Invalid)
}

fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER => {
            Some((value as i64).to_string())
        }
        _ => Some(trimmed.to_owned()),
    }
}

/// Parse a numeric field that may use either a comma or a point as decimal separator.
pub fn parse_decimal(raw: &RawValue) -> Option<f64> {
    let value = match raw {
        RawValue::Missing => return None,
        RawValue::Integer(value) => *value as f64,
        RawValue::Float(value) => *value,
        RawValue::Text(text) => text.trim().replace(',', ".").parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: impl Into<RawValue>) -> Option<String> {
        normalize(&raw.into()).into_key()
    }

    #[test]
    fn numeric_variants_share_one_key() {
        assert_eq!(key("42 ").as_deref(), Some("42"));
        assert_eq!(key("42.0").as_deref(), Some("42"));
        assert_eq!(key(42i64).as_deref(), Some("42"));
        assert_eq!(key(42.0f64).as_deref(), Some("42"));
        assert_eq!(key("  42.000\t").as_deref(), Some("42"));
    }

    #[test]
    fn fractional_and_alphanumeric_values_stay_literal() {
        assert_eq!(key("4.50").as_deref(), Some("4.50"));
        assert_eq!(key(" TP-Ziri 3 ").as_deref(), Some("TP-Ziri 3"));
        assert_ne!(key("abc"), key("ABC"));
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["42 ", "42.0", "4.50", "N-17", "-0", "1e3", "007"] {
            let once = normalize(&raw.into());
            let twice = normalize(&RawValue::Text(once.to_string()));
            assert_eq!(once, twice, "input {raw:?}");
        }
    }

    #[test]
    fn unusable_values_are_invalid() {
        assert_eq!(normalize(&RawValue::Missing), NormalizedId::Invalid);
        assert_eq!(normalize(&"   ".into()), NormalizedId::Invalid);
        assert_eq!(normalize(&f64::NAN.into()), NormalizedId::Invalid);
        assert_eq!(normalize(&f64::INFINITY.into()), NormalizedId::Invalid);
        assert!(NormalizedId::Invalid.as_key().is_none());
    }

    #[test]
    fn non_finite_text_is_a_literal_key() {
        assert_eq!(key(" NaN ").as_deref(), Some("NaN"));
        assert_eq!(key("inf").as_deref(), Some("inf"));
        assert_eq!(key("-Infinity").as_deref(), Some("-Infinity"));
        assert_ne!(key("nan"), key("NaN"));
    }

    #[test]
    fn decimal_comma_is_accepted() {
        assert_eq!(parse_decimal(&"630000,5".into()), Some(630000.5));
        assert_eq!(parse_decimal(&" 21000 ".into()), Some(21000.0));
        assert_eq!(parse_decimal(&1.25f64.into()), Some(1.25));
        assert_eq!(parse_decimal(&"n/a".into()), None);
        assert_eq!(parse_decimal(&RawValue::Missing), None);
    }

    #[test]
    fn deserializes_mixed_json_cells() {
        let values: Vec<RawValue> =
            serde_json::from_str(r#"["12", 12, 12.5, null, true]"#).expect("valid json");
        assert_eq!(
            values,
            vec![
                RawValue::Text("12".into()),
                RawValue::Integer(12),
                RawValue::Float(12.5),
                RawValue::Missing,
                RawValue::Text("true".into()),
            ]
        );
    }
}
