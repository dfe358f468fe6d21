//! Upstream payload validation and field extraction.
//!
//! The upstream answers with a JSON:API document. Only
//! `data[0].attributes.arrival_time` is of interest; it is located without
//! re-encoding so the value reaches the caller exactly as the upstream wrote it.

use std::borrow::Cow;
use std::fmt;

use serde::de::{Deserializer as _, IgnoredAny, MapAccess, Visitor};
use serde_json::value::RawValue;
use thiserror::Error;

/// Reasons an upstream body cannot be turned into a response.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body is not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    /// Top-level value is not an object with a `data` array.
    #[error("response has no `data` array")]
    MissingData,

    /// `data` is present but holds no elements.
    #[error("response `data` array is empty")]
    EmptyData,

    /// `data[0]` is not an object with an `attributes` object.
    #[error("`data[0]` has no `attributes` object")]
    MissingAttributes,

    /// `data[0].attributes` lacks `arrival_time`.
    #[error("`data[0].attributes` has no `arrival_time`")]
    MissingArrivalTime,
}

/// The `arrival_time` value, borrowed verbatim from the upstream body.
#[derive(Debug, Clone, Copy)]
pub struct ArrivalTime<'a>(&'a RawValue);

impl<'a> ArrivalTime<'a> {
    /// Exact JSON text of the value (a quoted string, a number, `null`, ...).
    pub fn as_json(&self) -> &'a str {
        self.0.get()
    }

    /// Render the reshaped response body.
    pub fn to_response_body(&self) -> String {
        format!("{{\"datetime\": {}}}", self.as_json())
    }
}

/// Validate an upstream body and locate `data[0].attributes.arrival_time`.
pub fn extract_arrival_time(body: &[u8]) -> Result<ArrivalTime<'_>, PayloadError> {
    let root: &RawValue = serde_json::from_slice(body).map_err(PayloadError::NotJson)?;

    let data = member(root, "data").ok_or(PayloadError::MissingData)?;
    let data: Vec<&RawValue> =
        serde_json::from_str(data.get()).map_err(|_| PayloadError::MissingData)?;
    let first = *data.first().ok_or(PayloadError::EmptyData)?;

    let attributes = member(first, "attributes").ok_or(PayloadError::MissingAttributes)?;
    if !attributes.get().starts_with('{') {
        return Err(PayloadError::MissingAttributes);
    }
    let arrival_time =
        member(attributes, "arrival_time").ok_or(PayloadError::MissingArrivalTime)?;

    Ok(ArrivalTime(arrival_time))
}

/// Value of `name` in a JSON object; the last occurrence wins on duplicate keys.
/// `None` when `raw` is not an object or lacks the key.
fn member<'a>(raw: &'a RawValue, name: &str) -> Option<&'a RawValue> {
    let mut deserializer = serde_json::Deserializer::from_str(raw.get());
    (&mut deserializer).deserialize_map(LastMember { name }).ok().flatten()
}

struct LastMember<'n> {
    name: &'n str,
}

impl<'de> Visitor<'de> for LastMember<'_> {
    type Value = Option<&'de RawValue>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut found = None;
        while let Some(key) = map.next_key::<Cow<'de, str>>()? {
            if key == self.name {
                found = Some(map.next_value::<&'de RawValue>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }
}
