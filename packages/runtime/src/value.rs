//! Call-time argument values.
//!
//! An [`ArgValue`] is the dynamic form of whatever the caller passes for a
//! parameter. Encoders only ever see these; structured values enter through
//! `serde_json::Value` via [`Arguments::body`].

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use restwire::ir::{MapType, ValueBinding, ValueMode};
use serde::Serialize;
use serde_json::Value;

use crate::error::ValueError;

type Opener = dyn Fn() -> Box<dyn Read + Send> + Send + Sync;

/// A re-openable byte source.
///
/// Request bodies may be written more than once (length pass, redirect
/// replay), so a stream is described by a factory rather than a reader.
#[derive(Clone)]
pub struct StreamSource {
    open: Arc<Opener>,
    length: Option<u64>,
}

impl StreamSource {
    /// `length` is the exact number of bytes every reader yields, if known.
    pub fn new<F, R>(length: Option<u64>, open: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Read + Send + 'static,
    {
        Self {
            open: Arc::new(move || Box::new(open()) as Box<dyn Read + Send>),
            length,
        }
    }

    /// A stream over in-memory bytes whose length is deliberately unknown.
    pub fn unsized_bytes(bytes: Bytes) -> Self {
        Self::new(None, move || std::io::Cursor::new(bytes.clone()))
    }

    pub fn open(&self) -> Box<dyn Read + Send> {
        (self.open)()
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Open a fresh reader and copy it into `out`.
    ///
    /// With a declared length, exactly that many bytes are written: a reader
    /// that ends early or runs past it fails with `InvalidData`, so a
    /// precomputed `Content-Length` can never disagree with the wire.
    pub fn copy_to(&self, out: &mut dyn Write) -> io::Result<u64> {
        let mut reader = self.open();
        let Some(expected) = self.length else {
            return io::copy(&mut reader, out);
        };
        let copied = io::copy(&mut reader.by_ref().take(expected), out)?;
        if copied < expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream ended after {copied} of {expected} declared bytes"),
            ));
        }
        let mut extra = [0u8; 1];
        if reader.read(&mut extra)? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream is longer than its declared {expected} bytes"),
            ));
        }
        Ok(copied)
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// The dynamic value of one argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ArgValue>),
    /// Ordered entries. Also the form a pair list takes once normalised.
    Map(Vec<(String, ArgValue)>),
    Bytes(Bytes),
    Stream(StreamSource),
}

impl ArgValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Int(_) => "integer",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "string",
            ArgValue::List(_) => "list",
            ArgValue::Map(_) => "map",
            ArgValue::Bytes(_) => "bytes",
            ArgValue::Stream(_) => "stream",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Int(i),
                None => ArgValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ArgValue::Str(s),
            Value::Array(items) => ArgValue::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => ArgValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// The JSON form handed to converters. Bytes become an array of
    /// numbers; streams have no JSON form.
    pub fn to_json(&self, parameter: &str) -> Result<Value, ValueError> {
        Ok(match self {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Int(i) => Value::from(*i),
            ArgValue::Float(f) => Value::from(*f),
            ArgValue::Str(s) => Value::String(s.clone()),
            ArgValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json(parameter))
                    .collect::<Result<_, _>>()?,
            ),
            ArgValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json(parameter)?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
            ArgValue::Bytes(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
            ArgValue::Stream(_) => return Err(shape(parameter, "a serializable value", self)),
        })
    }

    /// Stringify for a URL, header or form position. `None` for null.
    ///
    /// Lists and maps are written as compact JSON; streams are rejected.
    pub fn to_text(&self, parameter: &str) -> Result<Option<String>, ValueError> {
        Ok(Some(match self {
            ArgValue::Null => return Ok(None),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::Str(s) => s.clone(),
            ArgValue::List(_) | ArgValue::Map(_) => self.to_json(parameter)?.to_string(),
            ArgValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            ArgValue::Stream(_) => return Err(shape(parameter, "a text value", self)),
        }))
    }

    /// Elements of an iterable binding. A scalar counts as one element and
    /// null as none.
    pub fn elements(&self) -> Vec<&ArgValue> {
        match self {
            ArgValue::Null => Vec::new(),
            ArgValue::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Flatten a many-valued argument into `(key, value)` entries in order.
    ///
    /// | `MapType` | Accepted value | Entries |
    /// |-----------|----------------|---------|
    /// | `Map` | map | one per key |
    /// | `PairList` | list of `[key, value]` lists, or a map | one per pair |
    /// | `MultiValue` | map of lists (or scalars) | one per list element |
    pub fn entries(
        &self,
        map_type: MapType,
        parameter: &str,
    ) -> Result<Vec<(&str, &ArgValue)>, ValueError> {
        match (map_type, self) {
            (_, ArgValue::Null) => Ok(Vec::new()),
            (MapType::Map, ArgValue::Map(entries)) => {
                Ok(entries.iter().map(|(k, v)| (k.as_str(), v)).collect())
            }
            (MapType::PairList, ArgValue::Map(entries)) => {
                Ok(entries.iter().map(|(k, v)| (k.as_str(), v)).collect())
            }
            (MapType::PairList, ArgValue::List(pairs)) => pairs
                .iter()
                .map(|pair| match pair {
                    ArgValue::List(kv) => match kv.as_slice() {
                        [ArgValue::Str(k), v] => Ok((k.as_str(), v)),
                        _ => Err(shape(parameter, "a list of [string, value] pairs", pair)),
                    },
                    other => Err(shape(parameter, "a list of [string, value] pairs", other)),
                })
                .collect(),
            (MapType::MultiValue, ArgValue::Map(entries)) => Ok(entries
                .iter()
                .flat_map(|(k, v)| v.elements().into_iter().map(move |e| (k.as_str(), e)))
                .collect()),
            (MapType::PairList, other) => Err(shape(parameter, "a list of pairs", other)),
            (_, other) => Err(shape(parameter, "a map", other)),
        }
    }
}

fn shape(parameter: &str, expected: &'static str, found: &ArgValue) -> ValueError {
    ValueError::Shape {
        parameter: parameter.to_string(),
        expected,
        found: found.kind(),
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<Bytes> for ArgValue {
    fn from(v: Bytes) -> Self {
        ArgValue::Bytes(v)
    }
}

impl From<StreamSource> for ArgValue {
    fn from(v: StreamSource) -> Self {
        ArgValue::Stream(v)
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::from_json(v)
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(v: Vec<T>) -> Self {
        ArgValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ArgValue::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for ArgValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ArgValue::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Expand value bindings into ordered `(name, text)` pairs, skipping nulls.
/// Shared by query strings and form bodies.
pub(crate) fn binding_pairs(
    bindings: &[ValueBinding],
    args: &Arguments,
) -> Result<Vec<(String, String)>, ValueError> {
    let mut out = Vec::new();
    for binding in bindings {
        let parameter = binding.parameter.as_str();
        let value = args.value(parameter);
        let name = binding.name.as_deref().unwrap_or(parameter);
        match binding.mode {
            ValueMode::Single => {
                if let Some(text) = value.to_text(parameter)? {
                    out.push((name.to_string(), text));
                }
            }
            ValueMode::Iterable => {
                for element in value.elements() {
                    if let Some(text) = element.to_text(parameter)? {
                        out.push((name.to_string(), text));
                    }
                }
            }
            ValueMode::Map(map_type) => {
                for (key, element) in value.entries(map_type, parameter)? {
                    if let Some(text) = element.to_text(parameter)? {
                        out.push((key.to_string(), text));
                    }
                }
            }
        }
    }
    Ok(out)
}

static NULL: ArgValue = ArgValue::Null;

/// Named arguments for one call.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: HashMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind `name` to `value`.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Builder: bind `name` to an explicit null.
    pub fn null(self, name: impl Into<String>) -> Self {
        self.arg(name, ArgValue::Null)
    }

    /// Builder: bind `name` to any serialisable value.
    pub fn body<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_value(value)?;
        Ok(self.arg(name, ArgValue::from_json(json)))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// The bound value, with absence read as null.
    pub fn value(&self, name: &str) -> &ArgValue {
        self.values.get(name).unwrap_or(&NULL)
    }
}
