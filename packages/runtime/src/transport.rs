//! The transport contract and its `reqwest` implementation.
//!
//! A [`Transport`] performs exactly one HTTP exchange. It does not retry,
//! follow policy or decode; those belong to interceptors and the decoder.

use std::io::{self, BufWriter, Write};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};
use crate::request::{Request, RequestBody};
use crate::response::RawResponse;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

/// Sends requests through a shared `reqwest::Client`.
///
/// Bodies with a known length are buffered and go out with
/// `Content-Length`. Bodies of unknown length are produced on a blocking
/// thread into a bounded channel and sent chunked, so at most a few chunks
/// are in memory at once.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.as_str().to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = match body.content_length() {
                Some(_) => {
                    let body = body.clone();
                    let bytes = tokio::task::spawn_blocking(move || body.to_bytes())
                        .await
                        .map_err(io::Error::other)??;
                    builder.body(bytes)
                }
                None => builder.body(reqwest::Body::wrap_stream(body_stream(body.clone()))),
            };
        }

        let sent_at = Utc::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let version = format!("{:?}", response.version());
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;
        let received_at = Utc::now();
        debug!(
            "transport: {} {} -> {status} ({} bytes)",
            request.method,
            request.url,
            body.len()
        );

        Ok(RawResponse {
            status,
            headers,
            body,
            version,
            sent_at,
            received_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Streaming bodies
// ---------------------------------------------------------------------------

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_CHUNKS: usize = 4;

/// Write `body` on a blocking thread and hand it over in chunks.
///
/// The channel is bounded, so the writer waits for the connection instead of
/// reading ahead. A write error ends the stream with that error.
fn body_stream(body: RequestBody) -> ReceiverStream<io::Result<Bytes>> {
    let (tx, rx) = mpsc::channel(CHANNEL_CHUNKS);
    tokio::task::spawn_blocking(move || {
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, ChannelWriter { tx });
        let result = body.write_to(&mut writer).and_then(|()| writer.flush());
        // Bytes still buffered after a failure must not follow the error.
        let (channel, _) = writer.into_parts();
        if let Err(e) = result {
            // The receiver may already be gone; nothing is left to notify.
            let _ = channel.tx.blocking_send(Err(e));
        }
    });
    ReceiverStream::new(rx)
}

/// A `Write` that forwards every buffer as one chunk.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
