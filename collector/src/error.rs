//! Error taxonomy for a collection cycle.

use thiserror::Error;

/// A failure that aborts the remainder of a collection cycle.
///
/// The cursor is never touched when a cycle ends with one of these; the next
/// wake is still armed.
#[derive(Error, Debug)]
pub enum CycleError {
    /// Client-credentials exchange failed (non-2xx, transport, bad body)
    #[error("credential exchange failed ({}): {message}", status_label(.status))]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// Activity query failed (non-2xx, transport, bad body)
    #[error("activity fetch failed ({}): {message}", status_label(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    /// Anything else, e.g. checkpoint storage errors
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl CycleError {
    /// Short kind label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Auth { .. } => "auth",
            CycleError::Fetch { .. } => "fetch",
            CycleError::Unclassified(_) => "unclassified",
        }
    }
}

/// Delivery failure for a single activity.
///
/// Logged by the collector and otherwise ignored: the cycle continues and
/// the cursor still advances past the record.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to encode activity {activity_id}: {reason}")]
    Encode { activity_id: i64, reason: String },

    #[error("sink rejected activity {activity_id} with status {status}: {body}")]
    Rejected {
        activity_id: i64,
        status: u16,
        body: String,
    },

    #[error("failed to deliver activity {activity_id}: {source}")]
    Transport {
        activity_id: i64,
        #[source]
        source: reqwest::Error,
    },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no response".to_string(),
    }
}
