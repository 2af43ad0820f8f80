//! Substring search over the line buffer.
//!
//! Matching is case-insensitive substring containment, recomputed by a full
//! linear scan whenever the query or the buffer changes. At the buffer's
//! capacity (a few thousand lines) the scan is cheap, and a full recompute
//! sidesteps every index-drift hazard the trimming buffer would otherwise
//! create for an incremental index.

use crate::buffer::LineBuffer;

pub struct SearchIndex {
    query: String,
    /// Buffer indices of matching lines, ascending.
    matches: Vec<usize>,
    /// Current position within `matches`.
    pointer: usize,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            matches: Vec::new(),
            pointer: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Buffer index of the currently pointed match.
    pub fn current(&self) -> Option<usize> {
        self.matches.get(self.pointer).copied()
    }

    /// 1-based (position, total) for the status bar.
    pub fn position(&self) -> Option<(usize, usize)> {
        if self.matches.is_empty() {
            None
        } else {
            Some((self.pointer + 1, self.matches.len()))
        }
    }

    /// Replace the query. The pointer resets to the first match.
    pub fn set_query(&mut self, query: &str, buffer: &LineBuffer) {
        self.query = query.to_string();
        self.pointer = 0;
        self.recompute(buffer);
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.pointer = 0;
    }

    /// Full rescan of the buffer. Called after every query or buffer
    /// change; the pointer is clamped into the new match set.
    pub fn recompute(&mut self, buffer: &LineBuffer) {
        self.matches.clear();
        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            self.pointer = 0;
            return;
        }
        for (i, line) in buffer.iter().enumerate() {
            if line.text.to_lowercase().contains(&needle) {
                self.matches.push(i);
            }
        }
        if !self.matches.is_empty() {
            self.pointer = self.pointer.min(self.matches.len() - 1);
        } else {
            self.pointer = 0;
        }
    }

    /// Advance to the next match, wrapping from the last back to the
    /// first. Returns the new match's buffer index.
    pub fn next(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        self.pointer = (self.pointer + 1) % self.matches.len();
        self.current()
    }

    /// Step to the previous match, wrapping from the first to the last.
    pub fn prev(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        self.pointer = (self.pointer + self.matches.len() - 1) % self.matches.len();
        self.current()
    }

    /// Whether the given buffer index is a match (for render highlighting).
    pub fn is_match(&self, index: usize) -> bool {
        self.matches.binary_search(&index).is_ok()
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LogLine;

    fn buffer(lines: &[&str]) -> LineBuffer {
        let mut buf = LineBuffer::new(100);
        buf.append(lines.iter().map(|l| LogLine::new(l.to_string())).collect());
        buf
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let buf = buffer(&["Server started", "player JOINED", "tick", "joined lobby"]);
        let mut search = SearchIndex::new();
        search.set_query("joined", &buf);
        assert_eq!(search.matches(), &[1, 3]);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let buf = buffer(&["a", "b"]);
        let mut search = SearchIndex::new();
        search.set_query("   ", &buf);
        assert!(search.matches().is_empty());
        assert_eq!(search.current(), None);
    }

    #[test]
    fn test_query_change_resets_pointer() {
        let buf = buffer(&["err one", "ok", "err two", "err three"]);
        let mut search = SearchIndex::new();
        search.set_query("err", &buf);
        search.next();
        search.next();
        assert_eq!(search.pointer(), 2);
        search.set_query("e", &buf);
        assert_eq!(search.pointer(), 0);
    }

    #[test]
    fn test_navigation_wraps_both_ways() {
        let buf = buffer(&["x", "match a", "x", "match b", "match c"]);
        let mut search = SearchIndex::new();
        search.set_query("match", &buf);
        assert_eq!(search.current(), Some(1));

        assert_eq!(search.next(), Some(3));
        assert_eq!(search.next(), Some(4));
        // Last wraps to first
        assert_eq!(search.next(), Some(1));
        // First wraps back to last
        assert_eq!(search.prev(), Some(4));
    }

    #[test]
    fn test_pointer_clamped_when_matches_shrink() {
        let mut buf = LineBuffer::new(4);
        buf.append(vec![
            LogLine::new("hit 1".into()),
            LogLine::new("hit 2".into()),
            LogLine::new("hit 3".into()),
        ]);
        let mut search = SearchIndex::new();
        search.set_query("hit", &buf);
        search.next();
        search.next();
        assert_eq!(search.pointer(), 2);

        // Two of the matching lines are evicted by the append
        buf.append(vec![
            LogLine::new("miss".into()),
            LogLine::new("miss".into()),
            LogLine::new("miss".into()),
        ]);
        search.recompute(&buf);
        assert_eq!(search.matches(), &[0]);
        assert_eq!(search.pointer(), 0);
    }

    #[test]
    fn test_is_match() {
        let buf = buffer(&["a", "needle", "b"]);
        let mut search = SearchIndex::new();
        search.set_query("needle", &buf);
        assert!(search.is_match(1));
        assert!(!search.is_match(0));
    }
}
