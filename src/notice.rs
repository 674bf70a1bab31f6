//! Purpose: Structured stderr notices for link failures a command recovers from.
//! Exports: `Notice`, `notice_json`, `notice_kind`.
//! Role: `watch` reports rejected configurations and interrupted waits without exiting.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: `cached_version` is the version still in use after the failure.
use std::error::Error as StdError;

use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: ErrorKind,
    pub time: String,
    pub cmd: String,
    pub coordinator: String,
    pub message: String,
    pub cached_version: u64,
    /// Version the coordinator offered, when it was rejected as older.
    pub offered_version: Option<u64>,
    pub request_id: Option<u64>,
    pub cause: Option<String>,
}

impl Notice {
    pub fn from_error(
        cmd: &str,
        coordinator: &str,
        cached_version: u64,
        err: &Error,
        time: String,
    ) -> Self {
        let offered_version = match err.kind() {
            ErrorKind::BadConfig => err.version(),
            _ => None,
        };
        Self {
            kind: err.kind(),
            time,
            cmd: cmd.to_string(),
            coordinator: coordinator.to_string(),
            message: err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| notice_kind(err.kind()).replace('_', " ")),
            cached_version,
            offered_version,
            request_id: err.request_id(),
            cause: err.source().map(|source| source.to_string()),
        }
    }
}

pub fn notice_kind(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::CoordFail => "coord_fail",
        ErrorKind::Internal => "internal",
        ErrorKind::BadConfig => "bad_config",
        ErrorKind::PollFailed => "poll_failed",
        ErrorKind::Usage => "usage",
        ErrorKind::Io => "io",
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice_kind(notice.kind)));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("coordinator".to_string(), json!(notice.coordinator));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("cached_version".to_string(), json!(notice.cached_version));
    if let Some(offered) = notice.offered_version {
        inner.insert("offered_version".to_string(), json!(offered));
    }
    if let Some(request_id) = notice.request_id {
        inner.insert("request_id".to_string(), json!(request_id));
    }
    if let Some(cause) = &notice.cause {
        inner.insert("cause".to_string(), json!(cause));
    }

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}
