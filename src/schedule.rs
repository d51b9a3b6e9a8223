//! Release time extraction and the forward/requeue decision.
//!
//! Everything here is pure: callers supply the current time, which keeps the
//! decision testable without a clock or a transport.

use chrono::DateTime;

use crate::{
    error::Error,
    message::{AttributeValue, DataType, Message, AT_TIMESTAMP},
};

/// Longest delay SQS accepts on a single send.
pub const MAX_DELAY_SECONDS: i64 = 900;

/// What to do with a message once its release time is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Release time has passed; send to the outgoing queue.
    Forward,
    /// Release time is in the future; send back to the incoming queue,
    /// invisible for `delay_seconds`.
    Requeue { delay_seconds: i64 },
}

/// Reads the release time of a message as Unix seconds.
///
/// Returns `Ok(None)` when the message carries no release time at all.
pub fn release_time(msg: &Message) -> Result<Option<i64>, Error> {
    let Some(attr) = msg.attributes.get(AT_TIMESTAMP) else {
        return Ok(None);
    };

    let text = match (attr.kind(), attr.value()) {
        (Some(DataType::Number | DataType::String), AttributeValue::Text(text)) => text,
        _ => {
            return Err(Error::malformed_release_time(
                format!("{:?}", attr.value()),
                format!("unsupported data type {}", attr.data_type()),
            ))
        }
    };

    let text = text.trim();
    match attr.kind() {
        Some(DataType::Number) => parse_unix(text).map(Some),
        _ if is_integer(text) => parse_unix(text).map(Some),
        _ => parse_rfc3339(text).map(Some),
    }
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_unix(s: &str) -> Result<i64, Error> {
    s.parse::<i64>()
        .map_err(|e| Error::malformed_release_time(s, format!("not an integer: {e}")))
}

fn parse_rfc3339(s: &str) -> Result<i64, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.timestamp())
        .map_err(|e| Error::malformed_release_time(s, format!("not an RFC 3339 timestamp: {e}")))
}

/// Decides between forwarding and requeueing, clamping the requeue delay to
/// [`MAX_DELAY_SECONDS`].
pub fn decide(release: i64, now: i64) -> Decision {
    let delay = release.saturating_sub(now);
    if delay <= 0 {
        return Decision::Forward;
    }

    if delay > MAX_DELAY_SECONDS {
        tracing::info!(
            delay,
            truncated = MAX_DELAY_SECONDS,
            "delay exceeds transport maximum, truncating"
        );
        Decision::Requeue {
            delay_seconds: MAX_DELAY_SECONDS,
        }
    } else {
        tracing::info!(delay, "delaying message");
        Decision::Requeue {
            delay_seconds: delay,
        }
    }
}
