//! Relay polling
//!
//! Repeatedly fetches a callback location until the responder posts a
//! payload or an error, or the caller cancels. A transient fetch failure is
//! retried on the next scheduled interval; there is no built-in timeout, so
//! cancellation is the only termination besides a terminal payload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{Result, TransportError};

/// Write-once cancellation switch shared between a caller and a poll loop.
///
/// The flag is checked before every network round-trip, so cancellation
/// latency is bounded by the polling interval, not immediate.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal outcome of a poll loop.
///
/// Cancellation is a terminal state of its own, not an error; a
/// relay-reported error surfaces as [`TransportError::Relay`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The responder posted a payload (`access_token` or `tx`)
    Payload(Value),
    /// The caller cancelled before a response arrived
    Cancelled,
}

/// What a single fetch of the relay envelope yielded
enum Extraction {
    Payload(Value),
    Error(String),
    NotYet,
}

/// Poll a callback location until a terminal outcome.
///
/// Fetches `url` every `interval`, stopping before each fetch if `cancel`
/// has been flipped. Once a payload or error is extracted the relay entry
/// is scrubbed best-effort; a cleanup failure is reported via `warn!` and
/// never overturns the outcome.
pub async fn poll(
    client: &reqwest::Client,
    url: &str,
    interval: Duration,
    cancel: &CancelHandle,
) -> Result<PollOutcome> {
    loop {
        if cancel.is_cancelled() {
            debug!(url, "poll cancelled");
            return Ok(PollOutcome::Cancelled);
        }

        match fetch_topic(client, url).await {
            Ok(Extraction::Payload(value)) => {
                scrub(client, url).await;
                return Ok(PollOutcome::Payload(value));
            }
            Ok(Extraction::Error(message)) => {
                scrub(client, url).await;
                return Err(TransportError::Relay(message));
            }
            Ok(Extraction::NotYet) => {}
            // Retried on the next scheduled interval, no backoff
            Err(err) => debug!(url, error = %err, "transient relay fetch failure"),
        }

        sleep(interval).await;
    }
}

/// Fetch the relay envelope once and inspect its `message` field.
///
/// Success is an `access_token` or `tx` field, in that priority order;
/// failure is an `error` field. Neither means the request has not been
/// answered yet.
async fn fetch_topic(client: &reqwest::Client, url: &str) -> Result<Extraction> {
    let body: Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(message) = body.get("message") else {
        return Ok(Extraction::NotYet);
    };

    if let Some(payload) = message.get("access_token").or_else(|| message.get("tx")) {
        return Ok(Extraction::Payload(payload.clone()));
    }
    if let Some(error) = message.get("error") {
        let text = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        return Ok(Extraction::Error(text));
    }

    Ok(Extraction::NotYet)
}

/// Delete a consumed relay entry.
///
/// Deleting an already-absent entry is not a failure; any other non-2xx or
/// transport error is [`TransportError::Cleanup`].
pub async fn clear_response(client: &reqwest::Client, url: &str) -> Result<()> {
    let response = client
        .delete(url)
        .send()
        .await
        .map_err(|err| TransportError::Cleanup(err.to_string()))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(());
    }
    response
        .error_for_status()
        .map_err(|err| TransportError::Cleanup(err.to_string()))?;
    Ok(())
}

/// Best-effort scrub after a terminal outcome
async fn scrub(client: &reqwest::Client, url: &str) {
    if let Err(err) = clear_response(client, url).await {
        warn!(url, error = %err, "failed to scrub relay entry");
    }
}
