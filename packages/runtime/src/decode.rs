//! Response decoding for each call shape.
//!
//! | Shape | 2xx | non-2xx | failure |
//! |-------|-----|---------|---------|
//! | plain ([`decode_plain`]) | `Ok(value)` | `Err(Status)` | `Err(error)` |
//! | wrapped ([`decode_wrapped`]) | `Success` | `Error` | `Failure` |
//! | wildcard ([`decode_discard`]) | `Success(())` | `Error` | `Failure` |
//!
//! Security errors are never captured by a wrapped shape; they come back as
//! the outer `Err`.

use bytes::Bytes;
use restwire::TypeRef;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::converter::ConverterRegistry;
use crate::error::{ClientError, DecodeError, SecurityError};
use crate::response::{ApiResult, CallResult, Response};

/// Decode the body of a response against its declared type.
///
/// An empty body decodes as JSON null when `declared` is nullable or
/// `Unit`, which `Option<T>` and `()` accept. `Unit` ignores the body
/// entirely. A `ByteStream` target receives the raw bytes as an array of
/// numbers, which `Vec<u8>` accepts.
pub fn decode<T: DeserializeOwned>(
    response: &Response,
    converters: &ConverterRegistry,
    declared: &TypeRef,
) -> Result<T, DecodeError> {
    let body = response.body();
    let value = if declared.is_unit() {
        Value::Null
    } else if declared.is_byte_stream() {
        bytes_value(body)
    } else if body.is_empty() {
        if !declared.nullable {
            return Err(DecodeError::EmptyBody {
                type_name: declared.to_string(),
            });
        }
        Value::Null
    } else {
        let content_type = response.raw.content_type();
        let reader = converters
            .reader_for(content_type)
            .ok_or_else(|| DecodeError::NoReader {
                content_type: content_type.map(str::to_string),
            })?;
        reader.read(body, content_type)?
    };
    serde_json::from_value(value).map_err(DecodeError::Type)
}

fn bytes_value(body: &Bytes) -> Value {
    Value::Array(body.iter().map(|b| Value::from(*b)).collect())
}

/// Plain shape: anything but a decodable 2xx escapes as `Err`.
pub fn decode_plain<T: DeserializeOwned>(
    result: CallResult,
    converters: &ConverterRegistry,
    declared: &TypeRef,
) -> Result<T, ClientError> {
    match result {
        CallResult::Failure(failure) => Err(failure.error),
        CallResult::Response(response) if !response.is_success() => Err(ClientError::Status {
            status: response.status(),
            body: response.raw.body,
        }),
        CallResult::Response(response) => Ok(decode(&response, converters, declared)?),
    }
}

/// Wrapped shape: every outcome but a security violation is a value,
/// including decode errors.
pub fn decode_wrapped<T: DeserializeOwned>(
    result: CallResult,
    converters: &ConverterRegistry,
    declared: &TypeRef,
) -> Result<ApiResult<T>, SecurityError> {
    wrap(result, |response| decode(response, converters, declared))
}

/// Wildcard shape: like [`decode_wrapped`] but the body is never read.
pub fn decode_discard(result: CallResult) -> Result<ApiResult<()>, SecurityError> {
    wrap(result, |_| Ok(()))
}

fn wrap<T>(
    result: CallResult,
    decode: impl FnOnce(&Response) -> Result<T, DecodeError>,
) -> Result<ApiResult<T>, SecurityError> {
    match result {
        CallResult::Failure(failure) => capture(failure.error, Some(failure.request)),
        CallResult::Response(response) if !response.is_success() => Ok(ApiResult::Error(response)),
        CallResult::Response(response) => match decode(&response) {
            Ok(value) => Ok(ApiResult::Success { value, response }),
            Err(e) => Ok(ApiResult::Failure {
                error: e.into(),
                request: Some(response.request),
            }),
        },
    }
}

/// Turn an error into a wrapped `Failure`, unless it is a security error.
pub fn capture<T>(
    error: ClientError,
    request: Option<crate::request::Request>,
) -> Result<ApiResult<T>, SecurityError> {
    match error {
        ClientError::Security(e) => Err(e),
        error => Ok(ApiResult::Failure { error, request }),
    }
}
