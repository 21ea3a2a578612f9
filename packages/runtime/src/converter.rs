//! Content-type driven (de)serialisation.
//!
//! Converters are looked up by asking each registered [`Converter`], in
//! registration order, whether it handles a content type; the first that
//! answers yes wins. There is no ranking by specificity.
//!
//! | Converter | Writes | Reads |
//! |-----------|--------|-------|
//! | [`JsonConverter`] | `application/json`, `*/*+json` | the same, and responses without a Content-Type |
//! | [`TextConverter`] | `text/*` | `text/*` |

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::ConvertError;

/// A pluggable codec between wire bytes and `serde_json::Value`.
///
/// Typed values reach a converter through `serde_json::to_value` and leave
/// it through `serde_json::from_value`, so any serde-compatible type works
/// with any converter.
pub trait Converter: Send + Sync {
    fn can_write(&self, content_type: &str) -> bool;

    /// `content_type` is `None` when the response carried no Content-Type.
    fn can_read(&self, content_type: Option<&str>) -> bool;

    fn write(&self, value: &Value, content_type: &str) -> Result<Bytes, ConvertError>;

    fn read(&self, body: &[u8], content_type: Option<&str>) -> Result<Value, ConvertError>;
}

/// The converters of one client, in lookup order.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new(converters: Vec<Arc<dyn Converter>>) -> Self {
        Self { converters }
    }

    /// JSON first, then text.
    pub fn with_defaults() -> Self {
        Self::new(vec![Arc::new(JsonConverter), Arc::new(TextConverter)])
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub fn writer_for(&self, content_type: &str) -> Option<&dyn Converter> {
        self.converters
            .iter()
            .find(|c| c.can_write(content_type))
            .map(|c| c.as_ref())
    }

    pub fn reader_for(&self, content_type: Option<&str>) -> Option<&dyn Converter> {
        self.converters
            .iter()
            .find(|c| c.can_read(content_type))
            .map(|c| c.as_ref())
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("len", &self.converters.len())
            .finish()
    }
}

/// `type/subtype` in lower case, parameters stripped.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    fn handles(content_type: &str) -> bool {
        let essence = essence(content_type);
        essence == "application/json" || essence.ends_with("+json")
    }
}

impl Converter for JsonConverter {
    fn can_write(&self, content_type: &str) -> bool {
        Self::handles(content_type)
    }

    fn can_read(&self, content_type: Option<&str>) -> bool {
        content_type.map_or(true, Self::handles)
    }

    fn write(&self, value: &Value, _content_type: &str) -> Result<Bytes, ConvertError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn read(&self, body: &[u8], _content_type: Option<&str>) -> Result<Value, ConvertError> {
        Ok(serde_json::from_slice(body)?)
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Plain text. Scalars are written in their display form; reading always
/// yields a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl TextConverter {
    fn handles(content_type: &str) -> bool {
        essence(content_type).starts_with("text/")
    }
}

impl Converter for TextConverter {
    fn can_write(&self, content_type: &str) -> bool {
        Self::handles(content_type)
    }

    fn can_read(&self, content_type: Option<&str>) -> bool {
        content_type.is_some_and(Self::handles)
    }

    fn write(&self, value: &Value, content_type: &str) -> Result<Bytes, ConvertError> {
        let text = match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ConvertError::Unsupported {
                    kind: if value.is_array() { "list" } else { "map" },
                    content_type: content_type.to_string(),
                })
            }
        };
        Ok(Bytes::from(text))
    }

    fn read(&self, body: &[u8], content_type: Option<&str>) -> Result<Value, ConvertError> {
        match std::str::from_utf8(body) {
            Ok(text) => Ok(Value::String(text.to_string())),
            Err(_) => Err(ConvertError::NotUtf8 {
                content_type: content_type.unwrap_or("text/plain").to_string(),
            }),
        }
    }
}
