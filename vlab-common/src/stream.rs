//! Reconnecting transcript stream client
//!
//! Consumes the server's per-meeting SSE endpoint and maintains a local,
//! deduplicated view of the transcript. On any transport error the client
//! closes the connection and retries after a fixed delay, up to a bounded
//! number of attempts. Received batches are merged by transcript id, never
//! replacing rows already held.
//!
//! Delivery from the server is ordered by creation timestamp only; callers
//! that need conversational order use [`TranscriptStreamClient::transcripts_in_order`],
//! which re-sorts by (round_number, sequence_number).

use crate::db::models::Transcript;
use crate::{Error, Result};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// One SSE frame: a batch of transcripts plus the server's event id
/// (newest emitted created_at in epoch milliseconds)
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub transcripts: Vec<Transcript>,
    pub last_event_id: Option<i64>,
}

/// Transport abstraction over the SSE connection
///
/// The production implementation is [`HttpTransport`]; tests script
/// failure sequences with their own implementations.
#[allow(async_fn_in_trait)]
pub trait StreamTransport {
    async fn connect(
        &mut self,
        meeting_id: &str,
        last_event_id: Option<i64>,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}

/// Reconnection policy
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Client-local transcript state for one meeting
pub struct TranscriptStreamClient<T> {
    meeting_id: String,
    transport: T,
    config: StreamConfig,
    transcripts: Vec<Transcript>,
    seen: HashSet<String>,
    last_event_id: Option<i64>,
}

impl<T: StreamTransport> TranscriptStreamClient<T> {
    pub fn new(meeting_id: impl Into<String>, transport: T, config: StreamConfig) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            transport,
            config,
            transcripts: Vec::new(),
            seen: HashSet::new(),
            last_event_id: None,
        }
    }

    /// Seed the client with rows already rendered (e.g. an initial page
    /// load); streamed duplicates of these are dropped.
    pub fn seed(&mut self, initial: Vec<Transcript>) {
        for t in initial {
            if self.seen.insert(t.id.clone()) {
                self.transcripts.push(t);
            }
        }
    }

    /// Run the connection until the server closes it cleanly.
    ///
    /// Transport errors trigger bounded reconnection: after
    /// `max_reconnect_attempts` consecutive failures the terminal error is
    /// returned. A successful connection resets the attempt counter.
    /// Resumption uses the last received event id, so a reconnect picks up
    /// where the previous connection left off.
    pub async fn run_until_closed(&mut self) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            match self.transport.connect(&self.meeting_id, self.last_event_id).await {
                Ok(mut frames) => {
                    attempts = 0;
                    let mut failed = false;

                    while let Some(frame) = frames.next().await {
                        match frame {
                            Ok(event) => self.absorb(event),
                            Err(e) => {
                                warn!("Transcript stream error: {}", e);
                                failed = true;
                                break;
                            }
                        }
                    }

                    if !failed {
                        debug!("Transcript stream for meeting {} closed", self.meeting_id);
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Transcript stream connect failed: {}", e);
                }
            }

            if attempts >= self.config.max_reconnect_attempts {
                return Err(Error::Http(format!(
                    "Transcript stream for meeting {} gave up after {} reconnect attempts",
                    self.meeting_id, attempts
                )));
            }
            attempts += 1;
            warn!(
                "Connection lost, reconnecting ({}/{})",
                attempts, self.config.max_reconnect_attempts
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Merge a frame into local state, deduplicated by transcript id
    fn absorb(&mut self, event: StreamEvent) {
        for t in event.transcripts {
            if self.seen.insert(t.id.clone()) {
                self.transcripts.push(t);
            }
        }
        if event.last_event_id.is_some() {
            self.last_event_id = event.last_event_id;
        }
    }

    /// Rows in arrival order
    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// Rows in conversational order: (round_number, sequence_number),
    /// creation time as the tiebreak
    pub fn transcripts_in_order(&self) -> Vec<Transcript> {
        let mut rows = self.transcripts.clone();
        rows.sort_by(|a, b| {
            (a.round_number, a.sequence_number, a.created_at)
                .cmp(&(b.round_number, b.sequence_number, b.created_at))
        });
        rows
    }

    pub fn last_event_id(&self) -> Option<i64> {
        self.last_event_id
    }
}

/// SSE transport over HTTP (reqwest byte stream)
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl StreamTransport for HttpTransport {
    async fn connect(
        &mut self,
        meeting_id: &str,
        last_event_id: Option<i64>,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!(
            "{}/transcripts/{}/stream",
            self.base_url.trim_end_matches('/'),
            meeting_id
        );

        let mut request = self.client.get(&url).header("Accept", "text/event-stream");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("Failed to connect to {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Stream request to {} returned {}",
                url,
                response.status()
            )));
        }

        Ok(parse_sse(response.bytes_stream()).boxed())
    }
}

/// Decode an SSE byte stream into [`StreamEvent`] frames
///
/// Frames are separated by a blank line; `data:` lines carry the JSON
/// transcript array, `id:` lines carry the resume timestamp. Comment
/// (keep-alive) frames produce nothing.
fn parse_sse<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        futures::pin_mut!(bytes);
        let mut buf = String::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(data) => {
                    buf.push_str(&String::from_utf8_lossy(data.as_ref()));
                    while let Some(pos) = buf.find("\n\n") {
                        let block: String = buf.drain(..pos + 2).collect();
                        if let Some(event) = parse_block(&block) {
                            yield Ok(event);
                        }
                    }
                }
                Err(e) => {
                    yield Err(Error::Http(format!("Stream transport error: {}", e)));
                    return;
                }
            }
        }
    }
}

/// Parse one SSE block; returns None for comments and unparsable payloads
fn parse_block(block: &str) -> Option<StreamEvent> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut last_event_id = None;

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        } else if let Some(rest) = line.strip_prefix("id:") {
            last_event_id = rest.trim().parse::<i64>().ok();
        }
        // "event:" and ":" comment lines carry nothing we use
    }

    if data_lines.is_empty() {
        return None;
    }

    let payload = data_lines.join("\n");
    match serde_json::from_str::<Vec<Transcript>>(&payload) {
        Ok(transcripts) => Some(StreamEvent {
            transcripts,
            last_event_id,
        }),
        Err(e) => {
            warn!("Failed to parse transcript frame: {}", e);
            None
        }
    }
}
