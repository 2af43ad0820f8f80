//! Cursor-based tail polling.
//!
//! `TailSource` owns the resumable cursor for one selected log stream and
//! the discipline around it: at most one in-flight poll, cursor advanced
//! only on an explicit `next_cursor`, cursor untouched on failure. The
//! polling cadence lives in an explicit `PollScheduler` that the follow
//! controller starts and stops; the event loop only asks "is a poll due".

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_LIMIT_BYTES: u64 = 65536;
pub const DEFAULT_FETCH_MAX_LINES: usize = 400;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Poll request sent to the backend.
#[derive(Clone, Debug, Serialize)]
pub struct TailRequest {
    pub path: String,
    pub cursor: Option<String>,
    pub limit_bytes: u64,
    pub max_lines: usize,
}

/// Poll response.
///
/// Decoded leniently: a missing or malformed `lines` field means zero new
/// lines, a missing `next_cursor` means "do not advance".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TailResponse {
    pub lines: Vec<String>,
    pub next_cursor: Option<String>,
}

/// One issued poll. The epoch records which source generation it was issued
/// under, so a result that resolves after a source switch can be discarded.
#[derive(Clone, Debug)]
pub struct PollTicket {
    pub epoch: u64,
    pub request: TailRequest,
}

/// Explicit polling cadence, decoupled from any particular timer primitive.
/// Started/stopped by the follow controller, ticked by the event loop.
pub struct PollScheduler {
    interval: Duration,
    running: bool,
    next_due: Option<Instant>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            next_due: None,
        }
    }

    /// Start polling. The first poll is due immediately.
    pub fn start(&mut self, now: Instant) {
        if !self.running {
            self.running = true;
            self.next_due = Some(now);
        }
    }

    /// Stop polling entirely. No further polls are due until restarted.
    pub fn stop(&mut self) {
        self.running = false;
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.running && self.next_due.is_some_and(|due| now >= due)
    }

    /// Schedule the next poll one interval from `now`. A poll is scheduled
    /// only after the previous one settles, never overlapping.
    pub fn reschedule(&mut self, now: Instant) {
        if self.running {
            self.next_due = Some(now + self.interval);
        }
    }
}

/// Tail state for one selected source.
pub struct TailSource {
    path: String,
    cursor: Option<String>,
    limit_bytes: u64,
    max_lines: usize,
    pub scheduler: PollScheduler,
    in_flight: bool,
    /// Pending one-shot poll requested by an explicit retry; honored even
    /// while the scheduler is stopped.
    retry_requested: bool,
    last_error: Option<String>,
}

impl TailSource {
    pub fn new(path: String, limit_bytes: u64, max_lines: usize, interval: Duration) -> Self {
        Self {
            path,
            cursor: None,
            limit_bytes,
            max_lines,
            scheduler: PollScheduler::new(interval),
            in_flight: false,
            retry_requested: false,
            last_error: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Request a single immediate poll, e.g. after a failed fetch. Works
    /// even while scheduled polling is stopped.
    pub fn request_retry(&mut self) {
        if !self.in_flight {
            self.retry_requested = true;
        }
    }

    fn poll_due(&self, now: Instant) -> bool {
        !self.in_flight && (self.retry_requested || self.scheduler.is_due(now))
    }

    /// Issue a poll ticket if one is due. Marks the source in-flight; no
    /// second ticket is handed out until the first settles.
    pub fn begin_poll(&mut self, epoch: u64, now: Instant) -> Option<PollTicket> {
        if !self.poll_due(now) {
            return None;
        }
        self.retry_requested = false;
        self.in_flight = true;
        Some(PollTicket {
            epoch,
            request: TailRequest {
                path: self.path.clone(),
                cursor: self.cursor.clone(),
                limit_bytes: self.limit_bytes,
                max_lines: self.max_lines,
            },
        })
    }

    /// Settle a successful poll: clear the error flag, advance the cursor
    /// only if the response carries one, schedule the next poll.
    pub fn complete(&mut self, response: &TailResponse, now: Instant) {
        self.in_flight = false;
        self.last_error = None;
        if let Some(next) = &response.next_cursor {
            debug!(path = %self.path, cursor = %next, "cursor advanced");
            self.cursor = Some(next.clone());
        }
        self.scheduler.reschedule(now);
    }

    /// Settle a failed poll: cursor stays byte-for-byte unchanged so the
    /// next attempt resumes from the same position.
    pub fn fail(&mut self, error: &str, now: Instant) {
        warn!(path = %self.path, error, "tail poll failed");
        self.in_flight = false;
        self.last_error = Some(error.to_string());
        self.scheduler.reschedule(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> TailSource {
        TailSource::new(
            "/var/log/server.log".into(),
            DEFAULT_LIMIT_BYTES,
            DEFAULT_FETCH_MAX_LINES,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
    }

    #[test]
    fn test_no_poll_until_started() {
        let mut src = source();
        assert!(src.begin_poll(0, Instant::now()).is_none());
    }

    #[test]
    fn test_first_poll_due_immediately_after_start() {
        let mut src = source();
        let now = Instant::now();
        src.scheduler.start(now);
        let ticket = src.begin_poll(0, now).unwrap();
        assert_eq!(ticket.request.path, "/var/log/server.log");
        assert_eq!(ticket.request.cursor, None);
        assert_eq!(ticket.request.limit_bytes, DEFAULT_LIMIT_BYTES);
        assert_eq!(ticket.request.max_lines, DEFAULT_FETCH_MAX_LINES);
    }

    #[test]
    fn test_single_poll_in_flight() {
        let mut src = source();
        let now = Instant::now();
        src.scheduler.start(now);
        assert!(src.begin_poll(0, now).is_some());
        // No second ticket until the first settles
        assert!(src.begin_poll(0, now).is_none());
        src.complete(&TailResponse::default(), now);
        // Settled, but the next poll waits out the interval
        assert!(src.begin_poll(0, now).is_none());
        assert!(
            src.begin_poll(0, now + Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
                .is_some()
        );
    }

    #[test]
    fn test_cursor_advances_only_when_present() {
        let mut src = source();
        let now = Instant::now();
        src.scheduler.start(now);
        src.begin_poll(0, now).unwrap();
        src.complete(
            &TailResponse {
                lines: vec!["boot ok".into()],
                next_cursor: Some("c1".into()),
            },
            now,
        );
        assert_eq!(src.cursor(), Some("c1"));

        // Absent next_cursor: repeat from the same position
        src.begin_poll(0, now + Duration::from_secs(1)).unwrap();
        src.complete(&TailResponse::default(), now);
        assert_eq!(src.cursor(), Some("c1"));
    }

    #[test]
    fn test_failure_preserves_cursor_and_surfaces_error() {
        let mut src = source();
        let now = Instant::now();
        src.scheduler.start(now);
        src.begin_poll(0, now).unwrap();
        src.complete(
            &TailResponse {
                lines: vec![],
                next_cursor: Some("c7".into()),
            },
            now,
        );

        src.begin_poll(0, now + Duration::from_secs(1)).unwrap();
        src.fail("connection refused", now);
        assert_eq!(src.cursor(), Some("c7"));
        assert_eq!(src.last_error(), Some("connection refused"));

        // The retry carries the same cursor
        let ticket = src.begin_poll(0, now + Duration::from_secs(2)).unwrap();
        assert_eq!(ticket.request.cursor.as_deref(), Some("c7"));
        // A later success clears the error flag
        src.complete(&TailResponse::default(), now);
        assert_eq!(src.last_error(), None);
    }

    #[test]
    fn test_stop_halts_polling() {
        let mut src = source();
        let now = Instant::now();
        src.scheduler.start(now);
        src.begin_poll(0, now).unwrap();
        src.complete(&TailResponse::default(), now);
        src.scheduler.stop();
        assert!(src.begin_poll(0, now + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_manual_retry_works_while_stopped() {
        let mut src = source();
        let now = Instant::now();
        assert!(src.begin_poll(0, now).is_none());
        src.request_retry();
        assert!(src.begin_poll(0, now).is_some());
        // One-shot only
        src.complete(&TailResponse::default(), now);
        assert!(src.begin_poll(0, now + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_response_decodes_leniently() {
        let resp: TailResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.lines.is_empty());
        assert!(resp.next_cursor.is_none());

        let resp: TailResponse =
            serde_json::from_str(r#"{"lines":["a","b"],"next_cursor":"x"}"#).unwrap();
        assert_eq!(resp.lines, vec!["a", "b"]);
        assert_eq!(resp.next_cursor.as_deref(), Some("x"));

        let resp: TailResponse = serde_json::from_str(r#"{"next_cursor":null}"#).unwrap();
        assert!(resp.next_cursor.is_none());
    }
}
