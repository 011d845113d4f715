//! One-shot publish of a single message.
//!
//! The payload is read (from a literal or a file), compacted when it is JSON,
//! given a key and headers, and written once through a producer session
//! under an absolute deadline.

use crate::config::SessionConfig;
use crate::kafka::{KafkaStore, ProduceRecord, SessionFactory};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// How long a failed or timed-out publish may spend discarding its session.
pub const DISCARD_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    Literal(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ProduceRequest {
    key: Option<String>,
    payload: PayloadSource,
    headers: Vec<String>,
    timeout: Duration,
}

impl ProduceRequest {
    /// Exactly one of `payload` and `file` must be given, and the timeout
    /// must be non-zero.
    pub fn new(payload: Option<String>, file: Option<PathBuf>, timeout: Duration) -> Result<Self> {
        let payload = match (payload, file) {
            (Some(literal), None) => PayloadSource::Literal(literal.into_bytes()),
            (None, Some(path)) => PayloadSource::File(path),
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfiguration(
                    "payload and file are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(Error::InvalidConfiguration(
                    "either a payload or a file is required".to_string(),
                ))
            }
        };

        if timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            key: None,
            payload,
            headers: Vec::new(),
            timeout,
        })
    }

    /// Sets the message key. An empty key means one is generated.
    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    /// Header tokens in `name:value` form.
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn payload(&self) -> &PayloadSource {
        &self.payload
    }
}

pub struct ProducePipeline<F> {
    factory: F,
}

impl<F: SessionFactory> ProducePipeline<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Publishes one message and returns the record as it was sent.
    ///
    /// The producer session is released on every path. After a failed or
    /// timed-out write the pending record is discarded rather than flushed,
    /// and the whole call returns within the timeout plus [`DISCARD_GRACE`].
    #[instrument(skip(self, request), fields(timeout = ?request.timeout))]
    pub async fn publish(&self, request: ProduceRequest) -> Result<ProduceRecord> {
        let deadline = Instant::now() + request.timeout;

        let payload = load_payload(request.payload).await?;
        let record = ProduceRecord {
            key: resolve_key(request.key),
            value: compact_json(payload),
            headers: parse_headers(&request.headers),
        };
        info!(key = %record.key, bytes = record.value.len(), "Producing message");

        let mut session = self.factory.open_producer()?;

        let outcome = match tokio::time::timeout_at(deadline, session.write(record.clone())).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProduceTimeout {
                timeout: request.timeout,
            }),
        };

        match outcome {
            Ok(()) => {
                session.close().await?;
                info!(key = %record.key, "Message produced successfully");
                Ok(record)
            }
            Err(e) => {
                match tokio::time::timeout(DISCARD_GRACE, session.discard()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(discard_err)) => {
                        warn!("Producer discard failed after publish error: {}", discard_err)
                    }
                    Err(_) => warn!(grace = ?DISCARD_GRACE, "Producer discard did not finish in time"),
                }
                Err(e)
            }
        }
    }
}

/// Publishes one message to `config`'s topic.
pub async fn produce_publish(
    config: SessionConfig,
    key: Option<String>,
    payload: Option<String>,
    file: Option<PathBuf>,
    headers: Vec<String>,
    timeout: Duration,
) -> Result<ProduceRecord> {
    let request = ProduceRequest::new(payload, file, timeout)?
        .with_key(key)
        .with_headers(headers);
    ProducePipeline::new(KafkaStore::new(config))
        .publish(request)
        .await
}

async fn load_payload(source: PayloadSource) -> Result<Vec<u8>> {
    match source {
        PayloadSource::Literal(bytes) => Ok(bytes),
        PayloadSource::File(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = ?path, bytes = bytes.len(), "Read payload file");
                Ok(bytes)
            }
            Err(source) => Err(Error::PayloadReadFailure { path, source }),
        },
    }
}

/// Strips insignificant whitespace from a JSON document.
///
/// Anything that is not valid JSON is returned unchanged. Object key order,
/// number spelling and string escapes are kept exactly as written.
pub fn compact_json(payload: Vec<u8>) -> Vec<u8> {
    if serde_json::from_slice::<serde::de::IgnoredAny>(&payload).is_err() {
        return payload;
    }

    let mut compacted = Vec::with_capacity(payload.len());
    let mut in_string = false;
    let mut escaped = false;

    for byte in payload {
        if in_string {
            compacted.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b' ' | b'\t' | b'\n' | b'\r' => {}
            b'"' => {
                in_string = true;
                compacted.push(byte);
            }
            _ => compacted.push(byte),
        }
    }

    compacted
}

/// Returns the supplied key, or a fresh UUIDv4 when it is absent or empty.
pub fn resolve_key(key: Option<String>) -> String {
    match key {
        Some(key) if !key.is_empty() => key,
        _ => Uuid::new_v4().to_string(),
    }
}

/// Turns `name:value` tokens into a header map, splitting on the first
/// colon. Tokens without a colon are dropped.
pub fn parse_headers<S: AsRef<str>>(tokens: &[S]) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for token in tokens {
        match token.as_ref().split_once(':') {
            Some((name, value)) => {
                headers.insert(name.to_string(), value.to_string());
            }
            None => debug!(token = token.as_ref(), "Dropping malformed header"),
        }
    }
    headers
}
