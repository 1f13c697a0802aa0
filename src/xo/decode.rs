//! Response decoding
//!
//! Some endpoints emit objects with repeated keys (e.g. `cpus` twice on a VM).
//! Decoding runs a strict strategy first, which rejects duplicate keys, and falls
//! back to a lenient strategy that keeps the last value seen for each key.

use crate::error::{Result, XoError};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Which strategy produced a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Strict,
    LastWriteWins,
}

/// Decode a response body, tolerating duplicate object keys
pub fn decode(body: &str) -> Result<Value> {
    decode_with_strategy(body).map(|(value, _)| value)
}

/// Decode a response body and report which strategy succeeded
pub fn decode_with_strategy(body: &str) -> Result<(Value, Strategy)> {
    let strict_err = match serde_json::from_str::<StrictValue>(body) {
        Ok(StrictValue(value)) => return Ok((value, Strategy::Strict)),
        Err(e) => e,
    };

    // serde_json's own Value keeps the last occurrence of a repeated key
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            tracing::debug!(
                "strict decode failed ({}), collapsed duplicate keys",
                strict_err
            );
            Ok((value, Strategy::LastWriteWins))
        }
        Err(e) => Err(XoError::Decode(e.to_string())),
    }
}

/// A JSON value whose objects are guaranteed to have unique keys
struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value without duplicate object keys")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        StrictValue::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut values = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if values.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key `{}`", key)));
            }
            let StrictValue(value) = map.next_value()?;
            values.insert(key, value);
        }
        Ok(Value::Object(values))
    }
}
