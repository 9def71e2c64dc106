//! Live transcript streaming over Server-Sent Events
//!
//! The stream polls the database rather than subscribing to writes:
//! transcripts arrive through the same HTTP API from external runtimes,
//! so a 2 second poll is the freshness bound. Each frame carries a JSON
//! array of transcripts and an `id` of the newest row's timestamp in
//! epoch milliseconds, which a reconnecting client echoes back as
//! `Last-Event-ID` to resume without replaying the whole meeting.

use crate::access::Identity;
use crate::api::{require_read, ApiError};
use crate::db;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};
use vlab_common::db::models::Transcript;
use vlab_common::Error;

/// How often the stream re-queries for new transcripts
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Keep-alive comment interval, below common proxy idle timeouts
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn resume_point(headers: &HeaderMap) -> DateTime<Utc> {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn batch_event(batch: &[Transcript], watermark: DateTime<Utc>) -> Option<Event> {
    match Event::default().json_data(batch) {
        Ok(event) => Some(event.id(watermark.timestamp_millis().to_string())),
        Err(e) => {
            warn!("Failed to serialize transcript batch: {}", e);
            None
        }
    }
}

/// GET /transcripts/:meeting_id/stream
pub async fn transcript_stream(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    identity: Identity,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (meeting, session) = db::meetings::get_meeting_with_session(&state.db, &meeting_id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    require_read(&session, identity.as_deref(), "Meeting")?;

    let since = resume_point(&headers);
    debug!("Streaming transcripts for meeting {} since {}", meeting.id, since);

    let pool = state.db.clone();
    let stream = async_stream::stream! {
        let mut watermark = since;

        // Initial frame is sent unconditionally, empty or not, so the
        // client learns the connection is live before the first poll.
        match db::transcripts::newer_than(&pool, &meeting.id, watermark).await {
            Ok(batch) => {
                if let Some(latest) = batch.last() {
                    watermark = latest.created_at;
                }
                if let Some(event) = batch_event(&batch, watermark) {
                    yield Ok(event);
                }
            }
            Err(e) => {
                warn!("Initial transcript fetch failed for {}: {}", meeting.id, e);
                if let Some(event) = batch_event(&[], watermark) {
                    yield Ok(event);
                }
            }
        }

        // The loop ends when the client disconnects and the stream is
        // dropped; a poll error is logged and retried next tick.
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            match db::transcripts::newer_than(&pool, &meeting.id, watermark).await {
                Ok(batch) => {
                    let Some(latest) = batch.last() else { continue };
                    watermark = latest.created_at;
                    if let Some(event) = batch_event(&batch, watermark) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    warn!("Transcript poll failed for {}: {}", meeting.id, e);
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}
