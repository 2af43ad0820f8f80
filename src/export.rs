//! Clipboard export of log line subsets.
//!
//! Serialization is pure and tested; the actual clipboard write is
//! fire-and-forget and every failure is swallowed. Copying is best-effort
//! UX and must never surface an error or disturb the viewer.

use tracing::debug;

use crate::buffer::{LineBuffer, LogLine};

pub const DEFAULT_COPY_LAST_N: usize = 200;

/// Join lines with `\n`. With `include_timestamp`, each line that carries a
/// receive time is prefixed with its ISO-8601 rendering and a space; lines
/// without one are emitted bare.
pub fn serialize<'a>(
    lines: impl IntoIterator<Item = &'a LogLine>,
    include_timestamp: bool,
) -> String {
    lines
        .into_iter()
        .map(|line| {
            if include_timestamp {
                if let Some(ts) = line.timestamp_rfc3339() {
                    return format!("{ts} {}", line.text);
                }
            }
            line.text.clone()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last `n` lines, clamped to the buffer length.
pub fn serialize_last_n(buffer: &LineBuffer, n: usize, include_timestamp: bool) -> String {
    serialize(buffer.last_n(n), include_timestamp)
}

pub fn serialize_all(buffer: &LineBuffer, include_timestamp: bool) -> String {
    serialize(buffer.iter(), include_timestamp)
}

/// Write to the system clipboard off the event loop. Failures are logged
/// and otherwise ignored.
pub fn copy_to_clipboard(text: String) {
    tokio::task::spawn_blocking(move || {
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        if let Err(e) = result {
            debug!(error = %e, "clipboard write failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> LineBuffer {
        let mut buf = LineBuffer::new(100);
        buf.append(lines.iter().map(|l| LogLine::new(l.to_string())).collect());
        buf
    }

    #[test]
    fn test_serialize_joins_with_newlines() {
        let buf = buffer(&["a", "b", "c"]);
        assert_eq!(serialize(buf.iter(), false), "a\nb\nc");
    }

    #[test]
    fn test_last_n_takes_suffix() {
        let buf = buffer(&["a", "b", "c"]);
        assert_eq!(serialize_last_n(&buf, 2, false), "b\nc");
    }

    #[test]
    fn test_last_n_clamps_to_buffer_length() {
        let buf = buffer(&["a", "b", "c"]);
        assert_eq!(serialize_last_n(&buf, 100, false), "a\nb\nc");
    }

    #[test]
    fn test_timestamp_prefix() {
        let mut buf = LineBuffer::new(10);
        buf.append(vec![LogLine::received("boot ok".into(), 0)]);
        assert_eq!(
            serialize_all(&buf, true),
            "1970-01-01T00:00:00.000Z boot ok"
        );
    }

    #[test]
    fn test_lines_without_timestamp_are_emitted_bare() {
        let mut buf = LineBuffer::new(10);
        buf.append(vec![
            LogLine::received("stamped".into(), 0),
            LogLine::new("bare".into()),
        ]);
        assert_eq!(
            serialize_all(&buf, true),
            "1970-01-01T00:00:00.000Z stamped\nbare"
        );
    }

    #[test]
    fn test_timestamps_off_by_default_scope() {
        let mut buf = LineBuffer::new(10);
        buf.append(vec![LogLine::received("stamped".into(), 0)]);
        assert_eq!(serialize_all(&buf, false), "stamped");
    }
}
