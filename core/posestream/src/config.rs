//! Per-component configuration.
//!
//! A component config is a flat map of key-value pairs handed to the
//! constructor of a filter through [`FromConfig`]. Values are wrapped RON
//! values so the same map can be written inline on a command line.

use crate::error::{PoseStreamError, PsResult};
use ron::value::Value as RonValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;

/// Construction of a component from an optional [`ComponentConfig`].
///
/// Missing optional keys fall back to the component defaults. Every value is
/// validated here, so a badly configured component never reaches a session.
pub trait FromConfig: Sized {
    fn from_config(config: Option<&ComponentConfig>) -> PsResult<Self>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig(pub HashMap<String, Value>);

impl Display for ComponentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        write!(f, "{{")?;
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {}", self.0[key])?;
        }
        write!(f, "}}")
    }
}

// forward map interface
impl ComponentConfig {
    pub fn new() -> Self {
        ComponentConfig(HashMap::new())
    }

    /// Parses an inline RON map such as `{"radius": 2, "live": true}`.
    pub fn from_ron(text: &str) -> PsResult<Self> {
        let value: RonValue =
            ron::from_str(text).map_err(|e| PoseStreamError::ConfigParse(e.to_string()))?;
        let RonValue::Map(map) = value else {
            return Err(PoseStreamError::ConfigParse(format!(
                "expected a map of settings, got {}",
                Value(value)
            )));
        };
        let mut config = ComponentConfig::new();
        for (key, value) in map.iter() {
            let RonValue::String(key) = key else {
                return Err(PoseStreamError::ConfigParse(format!(
                    "config keys must be strings, got {}",
                    Value(key.clone())
                )));
            };
            config.0.insert(key.clone(), Value(value.clone()));
        }
        Ok(config)
    }

    pub fn get<T: FromValue>(&self, key: &str) -> PsResult<Option<T>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| PoseStreamError::ConfigType {
                    key: key.to_string(),
                    expected: T::EXPECTED,
                    found: value.to_string(),
                }),
        }
    }

    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> PsResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn require<T: FromValue>(&self, component: &str, key: &str) -> PsResult<T> {
        self.get(key)?
            .ok_or_else(|| PoseStreamError::missing_config(component, key))
    }

    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Wrapper around the ron::Value to allow for custom serialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Value(RonValue);

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value(RonValue::Number((value as i64).into()))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value(RonValue::Number((value as i64).into()))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value(RonValue::Number((value as i64).into()))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value(RonValue::Number(value.into()))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value(RonValue::Number((value as f64).into()))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value(RonValue::Bool(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value(RonValue::String(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value(RonValue::String(value.to_string()))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            RonValue::Number(_) => match (as_integer(self), as_float(self)) {
                (Some(i), _) => write!(f, "{i}"),
                (None, Some(x)) => write!(f, "{x}"),
                (None, None) => write!(f, "NaN"),
            },
            RonValue::String(s) => write!(f, "{s}"),
            RonValue::Bool(b) => write!(f, "{b}"),
            RonValue::Map(m) => write!(f, "{m:?}"),
            RonValue::Char(c) => write!(f, "{c:?}"),
            RonValue::Unit => write!(f, "unit"),
            RonValue::Option(o) => write!(f, "{o:?}"),
            RonValue::Seq(s) => write!(f, "{s:?}"),
        }
    }
}

/// Conversion out of a config [`Value`]; `None` means the type does not match.
pub trait FromValue: Sized {
    const EXPECTED: &'static str;
    fn from_value(value: &Value) -> Option<Self>;
}

fn as_float(value: &Value) -> Option<f64> {
    match &value.0 {
        RonValue::Number(num) => num.as_f64().or_else(|| num.as_i64().map(|i| i as f64)),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match &value.0 {
        // the RON parser may hand back a whole number as a float
        RonValue::Number(num) => num.as_i64().or_else(|| {
            num.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "a number";
    fn from_value(value: &Value) -> Option<Self> {
        as_float(value)
    }
}

impl FromValue for f32 {
    const EXPECTED: &'static str = "a number";
    fn from_value(value: &Value) -> Option<Self> {
        as_float(value).map(|f| f as f32)
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "an integer";
    fn from_value(value: &Value) -> Option<Self> {
        as_integer(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u32 {
    const EXPECTED: &'static str = "a non-negative integer";
    fn from_value(value: &Value) -> Option<Self> {
        as_integer(value).and_then(|i| u32::try_from(i).ok())
    }
}

impl FromValue for usize {
    const EXPECTED: &'static str = "a non-negative integer";
    fn from_value(value: &Value) -> Option<Self> {
        as_integer(value).and_then(|i| usize::try_from(i).ok())
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "a boolean";
    fn from_value(value: &Value) -> Option<Self> {
        match &value.0 {
            RonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "a string";
    fn from_value(value: &Value) -> Option<Self> {
        match &value.0 {
            RonValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut config = ComponentConfig::default();
        config.set("radius", 2u32);
        config.set("threshold", 0.25f64);
        config.set("live", false);
        config.set("name", "left_hand");

        assert_eq!(config.get::<u32>("radius").unwrap(), Some(2));
        assert_eq!(config.get::<usize>("radius").unwrap(), Some(2));
        assert_eq!(config.get::<f64>("threshold").unwrap(), Some(0.25));
        assert_eq!(config.get::<bool>("live").unwrap(), Some(false));
        assert_eq!(config.get::<String>("name").unwrap(), Some("left_hand".to_string()));
        assert_eq!(config.get::<f64>("missing").unwrap(), None);
    }

    #[test]
    fn test_integer_reads_as_float() {
        let mut config = ComponentConfig::new();
        config.set("samples_per_unit", 40);
        assert_eq!(config.get::<f32>("samples_per_unit").unwrap(), Some(40.0));
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut config = ComponentConfig::new();
        config.set("radius", "big");
        let err = config.get::<u32>("radius").unwrap_err();
        assert!(matches!(err, PoseStreamError::ConfigType { .. }));

        config.set("radius", -3);
        assert!(config.get::<u32>("radius").is_err());
    }

    #[test]
    fn test_require_reports_component() {
        let config = ComponentConfig::new();
        let err = config.require::<f64>("deadzone", "radius").unwrap_err();
        assert_eq!(err, PoseStreamError::missing_config("deadzone", "radius"));
    }

    #[test]
    fn test_from_ron() {
        let config = ComponentConfig::from_ron(r#"{"radius": 3, "live": true, "gain": 0.5}"#)
            .unwrap();
        assert_eq!(config.get::<u32>("radius").unwrap(), Some(3));
        assert_eq!(config.get::<bool>("live").unwrap(), Some(true));
        assert_eq!(config.get::<f64>("gain").unwrap(), Some(0.5));
        assert!(ComponentConfig::from_ron("[1, 2]").is_err());
        assert!(ComponentConfig::from_ron("{1: 2}").is_err());
    }

    #[test]
    fn test_display_is_sorted() {
        let mut config = ComponentConfig::new();
        config.set("b", 2);
        config.set("a", 1);
        assert_eq!(config.to_string(), "{a: 1, b: 2}");
    }
}
