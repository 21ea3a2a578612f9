//! Runtime protocol for `restwire` clients.
//!
//! Takes a validated [`ServiceDescription`](restwire::ServiceDescription)
//! and executes its functions: resolve the URL, encode headers and content,
//! run the interceptor chain, decode the response for the declared call
//! shape.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`value`] | [`ArgValue`] and [`Arguments`], the call-time inputs |
//! | [`resolve`] | [`BaseUrl`] and URL resolution with traversal checks |
//! | [`headers`] | Header encoding with call-time syntax checks |
//! | [`content`] | Body, form and multipart encoding |
//! | [`converter`] | [`Converter`] registry; JSON and text built in |
//! | [`request`] / [`response`] | [`Request`], [`Response`], [`CallResult`], [`ApiResult`] |
//! | [`chain`] | [`Interceptor`] chain and the terminal transport step |
//! | [`transport`] | [`Transport`] contract and [`ReqwestTransport`] |
//! | [`decode`] | Plain, wrapped and wildcard decoding |
//! | [`client`] | [`Client`] and [`ServiceClient`] |
//! | [`config`] | [`ClientConfig`] from environment variables |
//! | [`error`] | Error enums for every layer |
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let users = ServiceClient::new(Client::from_config(&config)?, service);
//! let count: i64 = users.invoke("count", &Arguments::new()).await?;
//! ```

pub mod chain;
pub mod client;
pub mod config;
pub mod content;
pub mod converter;
pub mod decode;
pub mod error;
pub mod headers;
pub mod request;
pub mod resolve;
pub mod response;
pub mod transport;
pub mod value;

pub use chain::{Chain, Interceptor, TransportInterceptor};
pub use client::{Client, ServiceClient};
pub use config::ClientConfig;
pub use converter::{Converter, ConverterRegistry, JsonConverter, TextConverter};
pub use error::{
    ChainError, ClientError, ConfigError, ConvertError, DecodeError, EncodeError, SecurityError,
    TransportError, UrlError, ValueError,
};
pub use request::{BytesContent, OutgoingContent, Request, RequestBody, StreamContent};
pub use resolve::BaseUrl;
pub use response::{ApiResult, CallResult, Failure, RawResponse, Response};
pub use transport::{ReqwestTransport, Transport};
pub use value::{ArgValue, Arguments, StreamSource};
