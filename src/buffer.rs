//! Bounded line storage for the log view.
//!
//! `LineBuffer` is a fixed-capacity FIFO: appends go to the tail, and once
//! the capacity is reached the oldest lines are evicted from the head.
//! Freshness wins over completeness. Buffer indices are not stable across
//! evictions, so every line position is also addressable by a monotonically
//! increasing sequence number assigned at receipt.

use std::collections::VecDeque;

use ansi_to_tui::IntoText;
use chrono::{SecondsFormat, TimeZone, Utc};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};

/// Detected log level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    None,
}

impl LogLevel {
    /// Detect log level from a line of text
    pub fn detect(line: &str) -> Self {
        let upper = line.to_uppercase();
        if upper.contains("ERROR") || upper.contains("[E]") || upper.contains("ERR]") {
            LogLevel::Error
        } else if upper.contains("WARN") || upper.contains("[W]") || upper.contains("WRN]") {
            LogLevel::Warn
        } else if upper.contains("INFO") || upper.contains("[I]") || upper.contains("INF]") {
            LogLevel::Info
        } else if upper.contains("DEBUG") || upper.contains("[D]") || upper.contains("DBG]") {
            LogLevel::Debug
        } else if upper.contains("TRACE") || upper.contains("[T]") || upper.contains("TRC]") {
            LogLevel::Trace
        } else {
            LogLevel::None
        }
    }

    /// Get the color for this log level
    pub fn color(&self) -> Option<Color> {
        match self {
            LogLevel::Error => Some(Color::Red),
            LogLevel::Warn => Some(Color::Yellow),
            LogLevel::Info => Some(Color::Green),
            LogLevel::Debug => Some(Color::Blue),
            LogLevel::Trace => Some(Color::DarkGray),
            LogLevel::None => None,
        }
    }
}

/// A single received log line with optional cached rendering.
///
/// Immutable once created, apart from the lazily built render cache.
pub struct LogLine {
    /// The raw line as received (may contain ANSI codes)
    pub text: String,
    /// Unix milliseconds at which the line was received, if it came from a
    /// live poll (lines loaded from elsewhere carry no timestamp)
    pub received_at_ms: Option<i64>,
    /// Detected log level
    pub level: LogLevel,
    /// Whether the line contains ANSI escape codes
    has_ansi: bool,
    /// Cached rendered version with ANSI codes converted to styles
    rendered: Option<Text<'static>>,
}

impl LogLine {
    pub fn new(text: String) -> Self {
        let level = LogLevel::detect(&text);
        let has_ansi = text.contains('\x1b');
        Self {
            text,
            received_at_ms: None,
            level,
            has_ansi,
            rendered: None,
        }
    }

    /// A line received from a live poll, stamped with the receive time.
    pub fn received(text: String, received_at_ms: i64) -> Self {
        Self {
            received_at_ms: Some(received_at_ms),
            ..Self::new(text)
        }
    }

    /// ISO-8601 rendering of the receive time, if any.
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        let ms = self.received_at_ms?;
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Get or create the rendered text, optionally applying level coloring
    pub fn get_rendered(&mut self, apply_level_colors: bool) -> &Text<'static> {
        if self.rendered.is_none() {
            let text = if self.has_ansi {
                self.text
                    .as_bytes()
                    .into_text()
                    .unwrap_or_else(|_| Text::raw(self.text.clone()))
            } else if apply_level_colors {
                if let Some(color) = self.level.color() {
                    Text::from(Line::from(Span::styled(
                        self.text.clone(),
                        Style::default().fg(color),
                    )))
                } else {
                    Text::raw(self.text.clone())
                }
            } else {
                Text::raw(self.text.clone())
            };
            self.rendered = Some(text);
        }
        self.rendered.as_ref().unwrap()
    }

    /// Invalidate the cached render (e.g., when display settings change)
    pub fn invalidate_render(&mut self) {
        self.rendered = None;
    }
}

/// Fixed-capacity FIFO store of log lines.
pub struct LineBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
    /// Sequence number the next appended line will get. The line at buffer
    /// index `i` has sequence `next_seq - len + i`.
    next_seq: u64,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            next_seq: 0,
        }
    }

    /// Append lines at the tail, evicting from the head once the capacity is
    /// exceeded. Returns the number of evicted lines so the caller can
    /// compensate anything index- or offset-relative. Duplicate suppression
    /// is the poller's job, not the buffer's.
    pub fn append(&mut self, new_lines: Vec<LogLine>) -> usize {
        for line in new_lines {
            self.lines.push_back(line);
            self.next_seq += 1;
        }
        let mut evicted = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&LogLine> {
        self.lines.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LogLine> {
        self.lines.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// The last `n` lines (all of them if `n` exceeds the length).
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &LogLine> {
        let start = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(start)
    }

    /// Sequence number of the line currently at `index`.
    pub fn seq_at(&self, index: usize) -> Option<u64> {
        if index < self.lines.len() {
            Some(self.next_seq - self.lines.len() as u64 + index as u64)
        } else {
            None
        }
    }

    /// Current buffer index of the line with sequence `seq`, if it has not
    /// been evicted yet.
    pub fn index_of_seq(&self, seq: u64) -> Option<usize> {
        let first = self.next_seq - self.lines.len() as u64;
        if seq >= first && seq < self.next_seq {
            Some((seq - first) as usize)
        } else {
            None
        }
    }

    /// Drop all cached renders (display settings changed)
    pub fn invalidate_renders(&mut self) {
        for line in &mut self.lines {
            line.invalidate_render();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(buffer: &LineBuffer) -> Vec<String> {
        buffer.iter().map(|l| l.text.clone()).collect()
    }

    #[test]
    fn test_append_keeps_order() {
        let mut buffer = LineBuffer::new(10);
        buffer.append(vec![LogLine::new("a".into()), LogLine::new("b".into())]);
        buffer.append(vec![LogLine::new("c".into())]);
        assert_eq!(texts(&buffer), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_capacity_keeps_suffix() {
        let mut buffer = LineBuffer::new(2000);
        for chunk in 0..25 {
            let lines = (0..100)
                .map(|i| LogLine::new(format!("line {}", chunk * 100 + i)))
                .collect();
            buffer.append(lines);
        }
        assert_eq!(buffer.len(), 2000);
        // Content equals the suffix of the full input sequence
        assert_eq!(buffer.get(0).unwrap().text, "line 500");
        assert_eq!(buffer.get(1999).unwrap().text, "line 2499");
    }

    #[test]
    fn test_append_reports_evictions() {
        let mut buffer = LineBuffer::new(3);
        let evicted = buffer.append(vec![LogLine::new("a".into()), LogLine::new("b".into())]);
        assert_eq!(evicted, 0);
        let evicted = buffer.append(vec![
            LogLine::new("c".into()),
            LogLine::new("d".into()),
            LogLine::new("e".into()),
        ]);
        assert_eq!(evicted, 2);
        assert_eq!(texts(&buffer), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_oversized_append_keeps_newest() {
        let mut buffer = LineBuffer::new(3);
        let lines = (0..8).map(|i| LogLine::new(format!("{i}"))).collect();
        let evicted = buffer.append(lines);
        assert_eq!(evicted, 5);
        assert_eq!(texts(&buffer), vec!["5", "6", "7"]);
    }

    #[test]
    fn test_sequence_survives_eviction() {
        let mut buffer = LineBuffer::new(3);
        buffer.append(vec![
            LogLine::new("a".into()),
            LogLine::new("b".into()),
            LogLine::new("c".into()),
        ]);
        let seq_c = buffer.seq_at(2).unwrap();
        buffer.append(vec![LogLine::new("d".into())]);
        // "c" shifted from index 2 to index 1 but kept its sequence number
        assert_eq!(buffer.index_of_seq(seq_c), Some(1));
        assert_eq!(buffer.get(1).unwrap().text, "c");
        // "a" was evicted, its sequence no longer resolves
        assert_eq!(buffer.index_of_seq(0), None);
    }

    #[test]
    fn test_last_n_clamps_to_length() {
        let mut buffer = LineBuffer::new(10);
        buffer.append(vec![
            LogLine::new("a".into()),
            LogLine::new("b".into()),
            LogLine::new("c".into()),
        ]);
        let last: Vec<String> = buffer.last_n(2).map(|l| l.text.clone()).collect();
        assert_eq!(last, vec!["b", "c"]);
        let all: Vec<String> = buffer.last_n(100).map(|l| l.text.clone()).collect();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_level_detection() {
        assert_eq!(LogLevel::detect("2024-01-01 ERROR boom"), LogLevel::Error);
        assert_eq!(LogLevel::detect("[W] low disk"), LogLevel::Warn);
        assert_eq!(LogLevel::detect("server started"), LogLevel::None);
    }

    #[test]
    fn test_timestamp_rendering() {
        let line = LogLine::received("boot ok".into(), 0);
        assert_eq!(
            line.timestamp_rfc3339().unwrap(),
            "1970-01-01T00:00:00.000Z"
        );
        assert!(LogLine::new("no ts".into()).timestamp_rfc3339().is_none());
    }
}
