//! Maps opaque chat-platform SDK error strings to an enumerated kind and decides
//! retry-vs-fail behavior, per the priority-ordered substring table.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    FloodWait,
    Unauthorized,
    BadRequest,
    InternalError,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FloodWait => "FLOOD_WAIT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::Other => "other",
        }
    }
}

/// What the worker loop should do having classified a send error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Count the item as failed under `kind` immediately.
    CountFailed { kind: ErrorKind },
    /// Sleep `wait` in the current worker, then count the item as failed as `FLOOD_WAIT`.
    BlockThenCountFailed { wait: Duration },
    /// Re-enqueue the item after `delay` without touching the counters, unless the
    /// retry budget (§9 Open Question resolution) has been exhausted, in which case
    /// count it as failed under `other`.
    Retry { delay: Duration },
}

fn flood_wait_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"FLOOD_WAIT_(\d+)").expect("valid regex"))
}

/// Bounded retry budget for `INTERNAL_ERROR`, resolving spec §9's "unbounded retries"
/// Open Question: after this many attempts the item counts as failed instead of
/// retrying forever.
pub const MAX_INTERNAL_ERROR_ATTEMPTS: u32 = 3;
pub const INTERNAL_ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Classify a send error message and decide the worker's next action, given how many
/// times this item has already been retried for an `INTERNAL_ERROR`.
pub fn classify(message: &str, attempt: u32) -> Action {
    if message.contains("chat not found (400)") {
        return Action::CountFailed {
            kind: ErrorKind::NotFound,
        };
    }
    if let Some(caps) = flood_wait_re().captures(message) {
        let seconds: u64 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        return Action::BlockThenCountFailed {
            wait: Duration::from_secs(seconds),
        };
    }
    if message.contains("UNAUTHORIZED") {
        return Action::CountFailed {
            kind: ErrorKind::Unauthorized,
        };
    }
    if message.contains("BAD_REQUEST") {
        return Action::CountFailed {
            kind: ErrorKind::BadRequest,
        };
    }
    if message.contains("INTERNAL_ERROR") {
        if attempt >= MAX_INTERNAL_ERROR_ATTEMPTS {
            return Action::CountFailed {
                kind: ErrorKind::Other,
            };
        }
        return Action::Retry {
            delay: INTERNAL_ERROR_RETRY_DELAY,
        };
    }
    Action::CountFailed {
        kind: ErrorKind::Other,
    }
}

/// Narrower classification used by the stats accumulator directly (§4.6): only
/// distinguishes `NOT_FOUND` / `FLOOD_WAIT` / `other`, independent of the retry
/// decision already made by `classify`.
pub fn classify_to_kind(message: &str) -> ErrorKind {
    if message.contains("chat not found") {
        ErrorKind::NotFound
    } else if message.contains("FLOOD_WAIT") {
        ErrorKind::FloodWait
    } else {
        ErrorKind::Other
    }
}
