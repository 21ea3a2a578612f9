//! Responses, failures and the value a call site receives.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::ClientError;
use crate::request::Request;

/// What a [`Transport`](crate::Transport) hands back: status, head and a
/// fully buffered body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Protocol version as printed on the wire, e.g. `HTTP/1.1`.
    pub version: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl RawResponse {
    /// A response timestamped now. Mostly useful for fake transports.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let now = Utc::now();
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            version: "HTTP/1.1".to_string(),
            sent_at: now,
            received_at: now,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response paired with the request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    pub request: Request,
    pub raw: RawResponse,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.raw.status
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        self.raw.is_success()
    }

    pub fn body(&self) -> &Bytes {
        &self.raw.body
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.raw.received_at - self.raw.sent_at
    }
}

/// No response was obtained.
#[derive(Debug)]
pub struct Failure {
    /// The request as it stood when the error happened.
    pub request: Request,
    pub error: ClientError,
}

/// The outcome of running the interceptor chain.
#[derive(Debug)]
pub enum CallResult {
    Response(Response),
    Failure(Failure),
}

impl CallResult {
    pub fn failure(request: Request, error: impl Into<ClientError>) -> Self {
        CallResult::Failure(Failure {
            request,
            error: error.into(),
        })
    }

    pub fn request(&self) -> &Request {
        match self {
            CallResult::Response(r) => &r.request,
            CallResult::Failure(f) => &f.request,
        }
    }
}

/// The wrapped call shape: every outcome except a security violation is a
/// value.
#[derive(Debug)]
pub enum ApiResult<T> {
    /// 2xx with a decoded body.
    Success { value: T, response: Response },
    /// Non-2xx response; the body is left undecoded.
    Error(Response),
    /// No usable response. `request` is `None` when the request could not
    /// even be built.
    Failure {
        error: ClientError,
        request: Option<Request>,
    },
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ApiResult::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Collapse into the plain shape.
    pub fn into_result(self) -> Result<T, ClientError> {
        match self {
            ApiResult::Success { value, .. } => Ok(value),
            ApiResult::Error(response) => Err(ClientError::Status {
                status: response.status(),
                body: response.raw.body,
            }),
            ApiResult::Failure { error, .. } => Err(error),
        }
    }
}
