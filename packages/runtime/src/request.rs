//! The outgoing request and its lazily written body.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use restwire::ir::HttpMethod;
use url::Url;

use crate::value::StreamSource;

/// Content that can be written any number of times, each time producing the
/// same bytes.
pub trait OutgoingContent: Send + Sync {
    /// Full `Content-Type` header value, if the content has one.
    fn content_type(&self) -> Option<&str>;

    /// Exact byte count of every [`write_to`](Self::write_to), if known up
    /// front. `None` implies chunked transfer.
    fn content_length(&self) -> Option<u64>;

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Buffer one full write.
    fn to_bytes(&self) -> io::Result<Bytes> {
        let capacity = self.content_length().unwrap_or(0) as usize;
        let mut buf = Vec::with_capacity(capacity);
        self.write_to(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// A shared handle to request content.
#[derive(Clone)]
pub struct RequestBody(Arc<dyn OutgoingContent>);

impl RequestBody {
    pub fn new(content: impl OutgoingContent + 'static) -> Self {
        Self(Arc::new(content))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.0.content_type()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.0.content_length()
    }

    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        self.0.write_to(out)
    }

    pub fn to_bytes(&self) -> io::Result<Bytes> {
        self.0.to_bytes()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("content_type", &self.content_type())
            .field("content_length", &self.content_length())
            .finish()
    }
}

/// In-memory content of known length.
#[derive(Debug, Clone)]
pub struct BytesContent {
    content_type: Option<String>,
    bytes: Bytes,
}

impl BytesContent {
    pub fn new(content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            bytes: bytes.into(),
        }
    }
}

impl OutgoingContent for BytesContent {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.bytes)
    }

    fn to_bytes(&self) -> io::Result<Bytes> {
        Ok(self.bytes.clone())
    }
}

/// Content read from a [`StreamSource`] on every write.
#[derive(Debug, Clone)]
pub struct StreamContent {
    content_type: Option<String>,
    source: StreamSource,
}

impl StreamContent {
    pub fn new(content_type: Option<String>, source: StreamSource) -> Self {
        Self {
            content_type,
            source,
        }
    }
}

impl OutgoingContent for StreamContent {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn content_length(&self) -> Option<u64> {
        self.source.length()
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        self.source.copy_to(out).map(|_| ())
    }
}

/// One outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    pub url: Url,
    /// In emission order. Names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Builder: append a header line.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace every existing value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}
