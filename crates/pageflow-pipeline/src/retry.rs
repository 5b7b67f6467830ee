//! Error classification and retry with backoff
//!
//! Failures are classified into the closed [`ErrorKind`] taxonomy, then the
//! recoverability policy decides whether another attempt is worthwhile:
//! cancellation and corruption never are (the input will not change and an
//! abort is deliberate), memory pressure gets a single retry, everything
//! else retries up to the configured budget with bounded exponential
//! backoff.

use pageflow_core::{EngineError, ErrorKind, ProcessingError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Backoff schedule in milliseconds; attempts past the end clamp to the
/// last entry.
pub const BACKOFF_SCHEDULE_MS: [u64; 3] = [1000, 2000, 4000];

/// Classify an engine failure into the taxonomy.
///
/// Structured variants map directly; free-text variants fall back to the
/// ordered keyword heuristics.
#[must_use]
pub fn classify(error: &EngineError) -> ErrorKind {
    match error {
        EngineError::Corrupted(_) => ErrorKind::Corruption,
        EngineError::OutOfMemory(_) => ErrorKind::Memory,
        EngineError::Network(_) => ErrorKind::Network,
        EngineError::Timeout(_) => ErrorKind::Timeout,
        EngineError::Cancelled => ErrorKind::Cancelled,
        // No dedicated taxonomy kind; surfaces as a parse-level failure.
        EngineError::Encrypted => ErrorKind::Parsing,
        EngineError::Render(message) => classify_message(message),
        EngineError::Io(io) => classify_message(&io.to_string()),
        EngineError::Other(other) => classify_message(&format!("{other:#}")),
    }
}

/// Ordered keyword heuristics for free-text failure messages.
///
/// Evaluated in order, first match wins; "aborted" lands in timeout before
/// the broader "abort" check maps deliberate aborts to cancelled.
fn classify_message(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| message.contains(needle));

    if contains_any(&["network", "fetch", "connection", "offline"]) {
        ErrorKind::Network
    } else if contains_any(&["memory", "quota", "allocation"]) {
        ErrorKind::Memory
    } else if contains_any(&["timeout", "timed out", "deadline", "aborted"]) {
        ErrorKind::Timeout
    } else if contains_any(&["cancel", "abort"]) {
        ErrorKind::Cancelled
    } else if contains_any(&["pdf", "parse", "corrupt", "malformed"]) {
        ErrorKind::Corruption
    } else {
        ErrorKind::Parsing
    }
}

/// Whether another attempt is worthwhile.
#[must_use]
pub fn is_recoverable(kind: ErrorKind, retry_count: u32, max_retries: u32) -> bool {
    match kind {
        ErrorKind::Cancelled | ErrorKind::Corruption => false,
        // Immediate re-attempts rarely free memory; allow one.
        ErrorKind::Memory => retry_count < 1,
        _ => retry_count < max_retries,
    }
}

/// Backoff delay before the retry following attempt `attempt`.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let index = (attempt as usize).min(BACKOFF_SCHEDULE_MS.len() - 1);
    Duration::from_millis(BACKOFF_SCHEDULE_MS[index])
}

/// Run `operation` with classification-driven retry.
///
/// Attempts `0..=max_retries`. Every failure is classified, wrapped into a
/// [`ProcessingError`] carrying its attempt index, and reported through
/// `on_error`; the loop continues only while the failure is recoverable,
/// sleeping the backoff schedule between attempts. The last classified
/// error is surfaced when the loop stops.
pub async fn execute_with_retry<T, Op, Fut, OnError>(
    mut operation: Op,
    mut on_error: OnError,
    max_retries: u32,
) -> Result<T, ProcessingError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
    OnError: FnMut(&ProcessingError),
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(engine_error) => {
                let kind = classify(&engine_error);
                let recoverable = is_recoverable(kind, attempt, max_retries);
                let error = ProcessingError {
                    kind,
                    message: engine_error.to_string(),
                    recoverable,
                    retry_count: attempt,
                    max_retries,
                    cause: Some(Arc::new(engine_error)),
                };
                on_error(&error);

                if !recoverable {
                    warn!(
                        kind = kind.as_str(),
                        attempt, "giving up: {}", error.message
                    );
                    return Err(error);
                }

                let delay = backoff_delay(attempt);
                debug!(
                    kind = kind.as_str(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// A cancellation token that fires itself after `timeout`.
///
/// The timer task exits early if the token is cancelled first, so callers
/// can cancel it to reap the timer once the raced operation settles.
#[must_use]
pub fn timeout_controller(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let fired = token.clone();
    let watcher = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(timeout) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "timeout controller fired");
                fired.cancel();
            }
            () = watcher.cancelled() => {}
        }
    });
    token
}
