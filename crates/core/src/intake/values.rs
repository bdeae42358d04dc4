use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Collected wizard answers keyed by field key. Unset fields are absent.
pub type ValueMap = BTreeMap<String, FieldValue>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Bool(bool),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Whitespace-only text counts as empty; numbers and booleans never do.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) => value.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// Returns the value for `key` unless it is absent or empty.
pub fn present<'a>(values: &'a ValueMap, key: &str) -> Option<&'a FieldValue> {
    values.get(key).filter(|value| !value.is_empty())
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Number(value) => write!(f, "{}", value.normalize()),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text(value) => serializer.serialize_str(value),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(value) => {
                if value.fract().is_zero() {
                    if let Some(integer) = value.to_i64() {
                        return serializer.serialize_i64(integer);
                    }
                }
                match value.to_f64() {
                    Some(float) => serializer.serialize_f64(float),
                    None => serializer.serialize_str(&value.to_string()),
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string, number, or boolean")
    }

    fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Number(Decimal::from(value)))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Number(Decimal::from(value)))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Decimal::try_from(value)
            .map(FieldValue::Number)
            .map_err(|_| E::custom(format!("number `{value}` is out of range")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Text(value.to_owned()))
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Text(value))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{present, FieldValue, ValueMap};

    #[test]
    fn json_scalars_map_to_matching_variants() {
        let values: ValueMap = serde_json::from_str(
            r#"{"idNumber":"123456","loanAmount":50000,"monthlyIncome":4200.5,"agreeTerms":true}"#,
        )
        .expect("value map should parse");

        assert_eq!(values["idNumber"], FieldValue::text("123456"));
        assert_eq!(values["loanAmount"], FieldValue::Number(Decimal::from(50_000)));
        assert_eq!(values["monthlyIncome"], FieldValue::Number(Decimal::new(42_005, 1)));
        assert_eq!(values["agreeTerms"], FieldValue::Bool(true));
    }

    #[test]
    fn whole_numbers_serialize_without_fraction() {
        let mut values = ValueMap::new();
        values.insert("loanTerm".to_owned(), FieldValue::from(60_i64));
        values.insert("email".to_owned(), FieldValue::from("a@b.co"));

        let json = serde_json::to_string(&values).expect("serialize");
        assert_eq!(json, r#"{"email":"a@b.co","loanTerm":60}"#);
    }

    #[test]
    fn blank_text_is_not_present() {
        let mut values = ValueMap::new();
        values.insert("firstName".to_owned(), FieldValue::from("   "));
        values.insert("agreeTerms".to_owned(), FieldValue::from(false));

        assert!(present(&values, "firstName").is_none());
        assert!(present(&values, "agreeTerms").is_some());
        assert!(present(&values, "missing").is_none());
    }
}
