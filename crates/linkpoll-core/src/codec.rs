// ── Payload codecs ──
//
// Turn a response body into zero or more record field maps. The poller uses
// the same codec for the device listing and for object payloads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

pub type Fields = Map<String, Value>;

/// Decodes a response body into a finite sequence of JSON objects.
pub trait Codec: Send + Sync + fmt::Debug {
    fn decode(&self, body: &[u8]) -> Result<Vec<Fields>, CoreError>;
}

/// Which codec to build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    JsonLines,
    Plain,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            Self::Json => Arc::new(JsonCodec),
            Self::JsonLines => Arc::new(JsonLinesCodec),
            Self::Plain => Arc::new(PlainCodec),
        }
    }
}

/// A JSON object yields one record, an array yields one per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, body: &[u8]) -> Result<Vec<Fields>, CoreError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let value: Value =
            serde_json::from_slice(body).map_err(|e| CoreError::decode(e.to_string()))?;
        match value {
            Value::Array(items) => items.into_iter().map(into_object).collect(),
            other => Ok(vec![into_object(other)?]),
        }
    }
}

/// One JSON object per non-blank line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl Codec for JsonLinesCodec {
    fn decode(&self, body: &[u8]) -> Result<Vec<Fields>, CoreError> {
        body.split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .enumerate()
            .map(|(idx, line)| {
                let value: Value = serde_json::from_slice(line)
                    .map_err(|e| CoreError::decode(format!("line {}: {e}", idx + 1)))?;
                into_object(value)
            })
            .collect()
    }
}

/// The whole body as UTF-8 text under `message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl Codec for PlainCodec {
    fn decode(&self, body: &[u8]) -> Result<Vec<Fields>, CoreError> {
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let mut fields = Map::new();
        fields.insert(
            "message".into(),
            Value::String(String::from_utf8_lossy(body).into_owned()),
        );
        Ok(vec![fields])
    }
}

fn into_object(value: Value) -> Result<Fields, CoreError> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(CoreError::decode(format!(
            "expected a JSON object, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
