//! Frequency Stream Sources
//!
//! A source yields frequency messages in arrival order until the producer
//! closes the stream (`Ok(None)`) or the transport fails (`Err`).
//!
//! The network source reads newline-delimited JSON from a long-lived HTTP
//! response body (`GET {address}/frequencies`):
//!
//! ```text
//! {"session_id":"2f1c...","frequency":-3.214,"timestamp":1718035200}
//! ```
//!
//! Blank lines are keep-alives.

use crate::error::SourceError;
use async_trait::async_trait;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

pub const STREAM_PATH: &str = "/frequencies";

/// One message on the frequency stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMessage {
    pub session_id: String,
    pub frequency: f64,
    /// Unix seconds at the producer
    pub timestamp: i64,
}

impl FrequencyMessage {
    /// Bare sample with no producer session, for replays and tests
    pub fn sample(frequency: f64) -> Self {
        Self {
            session_id: String::new(),
            frequency,
            timestamp: 0,
        }
    }
}

/// Sequential pull interface over a frequency stream
#[async_trait]
pub trait SampleSource: Send {
    /// Next message, `Ok(None)` on clean end-of-stream
    async fn next_message(&mut self) -> Result<Option<FrequencyMessage>, SourceError>;
}

/// Opens fresh sources; used by the supervisor to reconnect
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SampleSource>, SourceError>;
}

// ============================================================================
// LINE DECODER
// ============================================================================

/// Splits a byte stream into NDJSON lines and decodes each one
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next complete line, skipping blank ones.
    pub fn next_message(&mut self) -> Result<Option<FrequencyMessage>, SourceError> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line = self.buf.split_to(pos + 1);
            if let Some(msg) = decode_line(&mut line[..pos])? {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Result<Option<FrequencyMessage>, SourceError> {
        let mut rest = self.buf.split();
        decode_line(&mut rest)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(line: &mut [u8]) -> Result<Option<FrequencyMessage>, SourceError> {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    if start >= end {
        return Ok(None);
    }

    simd_json::from_slice::<FrequencyMessage>(&mut line[start..end])
        .map(Some)
        .map_err(|e| SourceError::Decode(e.to_string()))
}

// ============================================================================
// HTTP STREAM SOURCE
// ============================================================================

/// Build the stream URL from a bare `host:port` or a full base URL
pub fn stream_url(address: &str) -> String {
    let base = address.trim_end_matches('/');
    if base.contains("://") {
        format!("{}{}", base, STREAM_PATH)
    } else {
        format!("http://{}{}", base, STREAM_PATH)
    }
}

pub struct HttpStreamSource {
    response: reqwest::Response,
    decoder: LineDecoder,
    finished: bool,
}

impl HttpStreamSource {
    /// Open the stream. Only connecting is bounded by `connect_timeout`;
    /// waiting for the next sample never times out.
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, SourceError> {
        let url = stream_url(address);
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        info!(url = %url, "Connected to frequency stream");
        Ok(Self {
            response,
            decoder: LineDecoder::new(),
            finished: false,
        })
    }
}

#[async_trait]
impl SampleSource for HttpStreamSource {
    async fn next_message(&mut self) -> Result<Option<FrequencyMessage>, SourceError> {
        loop {
            if let Some(msg) = self.decoder.next_message()? {
                return Ok(Some(msg));
            }
            if self.finished {
                return Ok(None);
            }

            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|e| SourceError::Transport(e.to_string()))?;

            match chunk {
                Some(bytes) => self.decoder.extend(&bytes),
                None => {
                    debug!(leftover = self.decoder.buffered(), "Stream body ended");
                    self.finished = true;
                    return self.decoder.finish();
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub address: String,
    pub connect_timeout: Duration,
}

impl HttpConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<Box<dyn SampleSource>, SourceError> {
        let source = HttpStreamSource::connect(&self.address, self.connect_timeout).await?;
        Ok(Box::new(source))
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Replays a fixed sequence, then ends cleanly or with a scripted error
#[derive(Debug, Default)]
pub struct VecSource {
    messages: VecDeque<FrequencyMessage>,
    error: Option<SourceError>,
}

impl VecSource {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            messages: samples.into_iter().map(FrequencyMessage::sample).collect(),
            error: None,
        }
    }

    pub fn from_messages(messages: impl IntoIterator<Item = FrequencyMessage>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            error: None,
        }
    }

    /// End with `error` instead of a clean end-of-stream
    pub fn then_fail(mut self, error: SourceError) -> Self {
        self.error = Some(error);
        self
    }
}

#[async_trait]
impl SampleSource for VecSource {
    async fn next_message(&mut self) -> Result<Option<FrequencyMessage>, SourceError> {
        if let Some(msg) = self.messages.pop_front() {
            return Ok(Some(msg));
        }
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
