//! Error types for every runtime layer, plus the umbrella [`ClientError`].
//!
//! | Layer | Error | Raised by |
//! |-------|-------|-----------|
//! | construction | [`ConfigError`] | [`BaseUrl::parse`](crate::BaseUrl::parse), [`ClientConfig::from_env`](crate::ClientConfig::from_env) |
//! | arguments | [`ValueError`] | every encoder |
//! | URL | [`UrlError`], [`SecurityError`] | [`resolve`](crate::resolve::resolve) |
//! | content | [`EncodeError`], [`ConvertError`] | [`encode_content`](crate::content::encode_content), [`encode_headers`](crate::headers::encode_headers) |
//! | chain | [`ChainError`] | [`execute`](crate::chain::execute) |
//! | transport | [`TransportError`] | [`Transport`](crate::Transport) implementations |
//! | response | [`DecodeError`] | [`decode`](crate::decode::decode) |

use bytes::Bytes;
use restwire::http_syntax::SyntaxError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base URL {url:?} is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("base URL must use http or https, got {0:?}")]
    UnsupportedScheme(String),

    #[error("base URL must not have a query string")]
    BaseHasQuery,

    #[error("base URL must not have a fragment")]
    BaseHasFragment,

    #[error("base URL must end with '/', got {0:?}")]
    MissingTrailingSlash(String),

    #[error("{name} must be {expected}, got {value:?}")]
    InvalidEnv {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} is not set")]
    MissingEnv(&'static str),

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A call-time argument that is absent or has the wrong shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("missing required argument {0}")]
    Missing(String),

    #[error("argument {parameter} must be {expected}, got a {found} value")]
    Shape {
        parameter: String,
        expected: &'static str,
        found: &'static str,
    },
}

// ---------------------------------------------------------------------------
// URL resolution
// ---------------------------------------------------------------------------

/// Hard failures that no call shape may capture as a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("path segment {segment:?} from {origin} would traverse outside the request path")]
    PathTraversal { segment: String, origin: String },
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("URL scheme {0:?} is not supported; use http or https")]
    UnsupportedScheme(String),

    #[error("resolved URL {url:?} is invalid: {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{content_type} payload is not valid UTF-8")]
    NotUtf8 { content_type: String },

    #[error("cannot write a {kind} value as {content_type}")]
    Unsupported {
        kind: &'static str,
        content_type: String,
    },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no converter can write {content_type}")]
    NoWriter { content_type: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("header {name:?} is invalid: {reason}")]
    InvalidHeaderName { name: String, reason: SyntaxError },

    #[error("value of header {name} is invalid: {reason}")]
    InvalidHeaderValue { name: String, reason: SyntaxError },

    #[error("{0} is set by the request content and cannot be supplied as a header")]
    ContentHeader(String),
}

// ---------------------------------------------------------------------------
// Chain, transport, response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("interceptor chain is empty")]
    Empty,

    #[error("the last interceptor must not call proceed")]
    ProceedPastTerminal,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not write request body: {0}")]
    Body(#[from] std::io::Error),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    /// For transports that are not backed by `reqwest`.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no converter can read {}", .content_type.as_deref().unwrap_or("a response without Content-Type"))]
    NoReader { content_type: Option<String> },

    #[error("response body is empty but {type_name} is not nullable")]
    EmptyBody { type_name: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("response does not match the declared type: {0}")]
    Type(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// ClientError
// ---------------------------------------------------------------------------

/// Everything a call can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Argument(#[from] ValueError),

    #[error("URL error: {0}")]
    Url(UrlError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A non-2xx response reached a plain-value call site.
    #[error("server responded with status {status}")]
    Status { status: u16, body: Bytes },

    #[error("service has no function named {0}")]
    UnknownFunction(String),

    #[error("function {function} returns {declared}, which cannot be called as {requested}")]
    ShapeMismatch {
        function: String,
        declared: String,
        requested: &'static str,
    },

    /// Raised by user interceptors.
    #[error("interceptor error: {0}")]
    Interceptor(Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    pub fn is_security(&self) -> bool {
        matches!(self, ClientError::Security(_))
    }
}

/// Security and argument problems keep their own variant so the
/// propagation policy can tell them apart.
impl From<UrlError> for ClientError {
    fn from(e: UrlError) -> Self {
        match e {
            UrlError::Security(s) => ClientError::Security(s),
            UrlError::Value(v) => ClientError::Argument(v),
            other => ClientError::Url(other),
        }
    }
}
