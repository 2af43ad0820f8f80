//! The viewer state container.
//!
//! One `Viewer` owns everything the log view needs: the bounded buffer,
//! the tail source and its cursor, the follow state machine, the search
//! index, the viewport geometry, the selection, and the display
//! preferences. Each handled event makes one state change, then the
//! affected recomputations run explicitly and in a fixed order — nothing
//! here reacts implicitly, which keeps the whole engine drivable from
//! tests without a terminal.
//!
//! The buffer/cursor/search/follow quadruple belongs to one selected
//! source. Switching sources discards it wholesale and bumps the epoch so
//! an in-flight poll for the old source is ignored when it lands.

use std::time::Instant;

use chrono::Utc;
use ratatui::style::{Color, Style};
use tracing::{debug, info};
use tui_textarea::TextArea;

use crate::buffer::{LineBuffer, LogLine};
use crate::config::Config;
use crate::export;
use crate::follow::{FollowController, FollowMode};
use crate::prefs::{PrefsStore, ViewerPrefs};
use crate::search::SearchIndex;
use crate::tail::{PollTicket, TailResponse, TailSource};
use crate::transport::SourceSpec;
use crate::viewport::Viewport;

/// Input mode for the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Editing the search query
    SearchEditing,
}

/// Which panel has focus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusedPanel {
    LogView,
    Sources,
}

/// A settled poll, tagged with the epoch it was issued under.
pub struct PollOutcome {
    pub epoch: u64,
    pub result: Result<TailResponse, String>,
}

/// Default viewport height used until the first render reports real
/// geometry.
const INITIAL_VIEW_ROWS: usize = 40;

pub struct Viewer<'a> {
    config: Config,
    /// Available log sources
    pub sources: Vec<SourceSpec>,
    current_source: usize,
    /// Bumped on every source switch; poll results from older epochs are
    /// discarded unapplied.
    epoch: u64,

    pub buffer: LineBuffer,
    pub tail: TailSource,
    pub follow: FollowController,
    pub search: SearchIndex,
    pub viewport: Viewport,
    /// Selected line, pinned by sequence number so buffer trims cannot
    /// silently re-point it at a different logical line.
    selected_seq: Option<u64>,

    pub prefs: ViewerPrefs,
    prefs_store: Box<dyn PrefsStore>,

    /// Search query input widget
    pub search_textarea: TextArea<'a>,
    pub mode: InputMode,
    pub focused_panel: FocusedPanel,
    /// Cursor position in the sources panel
    pub selected_source_idx: usize,
    pub show_side_panel: bool,
    pub show_help: bool,
    pub should_quit: bool,
    /// Status message to display
    pub status_message: Option<String>,
    /// Last time the search input changed (for debounce)
    search_last_change: Option<Instant>,
    search_needs_recompute: bool,
    /// Whether to apply log level coloring (for lines without ANSI)
    pub level_colors_enabled: bool,
}

impl<'a> Viewer<'a> {
    pub fn new(
        config: Config,
        sources: Vec<SourceSpec>,
        prefs_store: Box<dyn PrefsStore>,
        now: Instant,
    ) -> Self {
        assert!(!sources.is_empty(), "viewer needs at least one source");
        let source = sources[0].clone();
        let prefs = ViewerPrefs::load(prefs_store.as_ref(), &Self::prefs_key(&source));

        let mut viewer = Self {
            buffer: LineBuffer::new(config.buffer_capacity),
            tail: Self::make_tail(&config, &source),
            follow: FollowController::new(),
            search: SearchIndex::new(),
            viewport: Self::make_viewport(&prefs),
            selected_seq: None,
            prefs,
            prefs_store,
            sources,
            current_source: 0,
            epoch: 0,
            search_textarea: Self::make_textarea(),
            mode: InputMode::Normal,
            focused_panel: FocusedPanel::LogView,
            selected_source_idx: 0,
            show_side_panel: false,
            show_help: false,
            should_quit: false,
            status_message: None,
            search_last_change: None,
            search_needs_recompute: false,
            level_colors_enabled: true,
            config,
        };
        // Follow starts LIVE, which means polling starts immediately
        viewer.tail.scheduler.start(now);
        viewer
    }

    fn make_tail(config: &Config, source: &SourceSpec) -> TailSource {
        TailSource::new(
            source.tail_path(),
            config.limit_bytes,
            config.fetch_max_lines,
            std::time::Duration::from_millis(config.poll_interval_ms),
        )
    }

    fn make_viewport(prefs: &ViewerPrefs) -> Viewport {
        let mut viewport = Viewport::new(prefs.font_size, 0);
        let height = INITIAL_VIEW_ROWS * viewport.line_height_px();
        viewport.set_viewport_height(height, 0);
        viewport
    }

    fn make_textarea() -> TextArea<'a> {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        textarea.set_placeholder_text("type to search...");
        textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
        textarea
    }

    fn prefs_key(source: &SourceSpec) -> String {
        format!("viewer:{}", source.name())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_source(&self) -> &SourceSpec {
        &self.sources[self.current_source]
    }

    pub fn current_source_idx(&self) -> usize {
        self.current_source
    }

    // ---- source switching ----

    /// Select a different source. Everything tied to the old stream is
    /// discarded: buffer, cursor, search, follow state, selection. The
    /// epoch bump makes any still-in-flight poll for the old source a
    /// no-op when it resolves.
    pub fn switch_source(&mut self, idx: usize, now: Instant) {
        if idx >= self.sources.len() || idx == self.current_source {
            return;
        }
        self.epoch += 1;
        self.current_source = idx;
        self.selected_source_idx = idx;
        let source = self.sources[idx].clone();
        info!(source = %source.name(), epoch = self.epoch, "switching source");

        self.prefs = ViewerPrefs::load(self.prefs_store.as_ref(), &Self::prefs_key(&source));
        self.buffer = LineBuffer::new(self.config.buffer_capacity);
        self.tail = Self::make_tail(&self.config, &source);
        self.follow = FollowController::new();
        self.search = SearchIndex::new();
        let old_view_height = self.viewport.viewport_height_px();
        self.viewport = Self::make_viewport(&self.prefs);
        self.viewport.set_viewport_height(old_view_height, 0);
        self.selected_seq = None;
        self.search_textarea = Self::make_textarea();
        self.search_last_change = None;
        self.search_needs_recompute = false;
        self.mode = InputMode::Normal;
        self.tail.scheduler.start(now);
        self.status_message = Some(format!("Tailing {}", source.name()));
    }

    pub fn next_source(&mut self, now: Instant) {
        if self.sources.len() > 1 {
            let idx = (self.current_source + 1) % self.sources.len();
            self.switch_source(idx, now);
        }
    }

    // ---- polling ----

    /// Hand out a poll ticket if one is due.
    pub fn begin_poll(&mut self, now: Instant) -> Option<PollTicket> {
        self.tail.begin_poll(self.epoch, now)
    }

    /// Apply a settled poll. Stale results (issued before a source
    /// switch) are discarded without touching any state.
    pub fn apply_poll(&mut self, outcome: PollOutcome, now: Instant) {
        if outcome.epoch != self.epoch {
            debug!(
                stale = outcome.epoch,
                current = self.epoch,
                "discarding poll result from a previous source"
            );
            return;
        }
        match outcome.result {
            Ok(response) => {
                self.tail.complete(&response, now);
                if !response.lines.is_empty() {
                    let received_at = Utc::now().timestamp_millis();
                    let lines = response
                        .lines
                        .into_iter()
                        .map(|text| LogLine::received(text, received_at))
                        .collect();
                    let evicted = self.buffer.append(lines);
                    self.after_buffer_change(evicted);
                }
            }
            Err(error) => {
                self.tail.fail(&error, now);
            }
        }
    }

    /// The named recompute steps that follow any buffer mutation, in a
    /// fixed order: search, selection, then scroll.
    fn after_buffer_change(&mut self, evicted: usize) {
        self.search.recompute(&self.buffer);
        if let Some(seq) = self.selected_seq {
            if self.buffer.index_of_seq(seq).is_none() {
                // The selected line was evicted
                self.selected_seq = None;
            }
        }
        let total = self.buffer.len();
        if self.follow.on_new_lines() {
            self.viewport.scroll_to_bottom(total);
        } else if evicted > 0 {
            self.viewport.compensate_eviction(evicted, total);
        }
    }

    /// Called after every draw; performs the second bottom-pin queued by
    /// a new-lines event so the settled layout is what ends up pinned.
    pub fn after_render(&mut self) {
        if self.follow.take_repin() {
            self.viewport.scroll_to_bottom(self.buffer.len());
        }
    }

    /// Explicit retry after a failed poll; works even while paused.
    pub fn retry_fetch(&mut self) {
        self.tail.request_retry();
        self.status_message = Some("Retrying fetch...".to_string());
    }

    // ---- scrolling and follow ----

    fn line_height(&self) -> usize {
        self.viewport.line_height_px()
    }

    /// A user scroll settled; let the follow controller decide whether
    /// the user has left the live zone.
    fn settle_scroll(&mut self) {
        let distance = self.viewport.distance_from_bottom(self.buffer.len());
        if self.follow.on_scroll(distance, &mut self.tail.scheduler) {
            self.status_message = Some("Paused (scrolled up). G to resume".to_string());
        }
    }

    pub fn scroll_lines(&mut self, delta: isize) {
        let px = delta.saturating_mul(self.line_height() as isize);
        self.viewport.scroll_by(px, self.buffer.len());
        self.settle_scroll();
    }

    pub fn scroll_page_up(&mut self, page_rows: usize) {
        self.scroll_lines(-(page_rows as isize));
    }

    pub fn scroll_page_down(&mut self, page_rows: usize) {
        self.scroll_lines(page_rows as isize);
    }

    pub fn go_to_top(&mut self) {
        self.viewport.set_scroll(0, self.buffer.len());
        self.settle_scroll();
    }

    /// Jump to the newest lines and resume following.
    pub fn jump_to_bottom(&mut self, now: Instant) {
        self.follow.resume(&mut self.tail.scheduler, now);
        self.viewport.scroll_to_bottom(self.buffer.len());
    }

    pub fn toggle_follow(&mut self, now: Instant) {
        let mode = self.follow.toggle(&mut self.tail.scheduler, now);
        self.status_message = Some(
            match mode {
                FollowMode::Live => "Live",
                FollowMode::Paused => "Paused",
            }
            .to_string(),
        );
    }

    /// The render area changed size.
    pub fn set_view_rows(&mut self, rows: usize) {
        let height = rows * self.line_height();
        if height != self.viewport.viewport_height_px() {
            self.viewport.set_viewport_height(height, self.buffer.len());
            if self.follow.is_live() {
                self.viewport.scroll_to_bottom(self.buffer.len());
            }
        }
    }

    // ---- search ----

    pub fn search_input(&self) -> String {
        self.search_textarea.lines().join("\n")
    }

    pub fn open_search(&mut self) {
        self.mode = InputMode::SearchEditing;
        self.focused_panel = FocusedPanel::LogView;
        self.search_textarea.select_all();
        self.search_textarea.cut();
    }

    /// Apply the typed query and go to the first match.
    pub fn apply_search(&mut self) {
        let query = self.search_input();
        self.search.set_query(&query, &self.buffer);
        self.mode = InputMode::Normal;
        self.search_last_change = None;
        self.search_needs_recompute = false;
        if self.search.current().is_some() {
            self.goto_current_match();
        } else if !query.trim().is_empty() {
            self.status_message = Some("No matches".to_string());
        }
    }

    /// Cancel search editing and revert to the previous query
    pub fn cancel_search(&mut self) {
        let prev = self.search.query().to_string();
        self.search_textarea = TextArea::new(vec![prev]);
        self.search_textarea.set_cursor_line_style(Style::default());
        self.mode = InputMode::Normal;
        self.search_last_change = None;
        self.search_needs_recompute = false;
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
        self.search_textarea.select_all();
        self.search_textarea.cut();
        self.status_message = Some("Search cleared".to_string());
    }

    /// Mark that search input changed (for debounce)
    pub fn search_changed(&mut self) {
        self.search_last_change = Some(Instant::now());
        self.search_needs_recompute = true;
    }

    /// Recompute matches once the debounce period has passed. Typing only
    /// updates the match set; the view does not jump until the query is
    /// applied or navigated.
    pub fn check_search_debounce(&mut self) {
        const DEBOUNCE_MS: u128 = 150;

        if let Some(last_change) = self.search_last_change {
            if last_change.elapsed().as_millis() >= DEBOUNCE_MS && self.search_needs_recompute {
                let query = self.search_input();
                self.search.set_query(&query, &self.buffer);
                self.search_needs_recompute = false;
            }
        }
    }

    pub fn next_match(&mut self) {
        if self.search.next().is_some() {
            self.goto_current_match();
        }
    }

    pub fn prev_match(&mut self) {
        if self.search.prev().is_some() {
            self.goto_current_match();
        }
    }

    /// Select the pointed match and scroll it to a quarter of the way
    /// down the view. Moving the view this way counts as a scroll, so it
    /// can pause follow mode — walking matches is reading history.
    fn goto_current_match(&mut self) {
        let Some(index) = self.search.current() else {
            return;
        };
        self.selected_seq = self.buffer.seq_at(index);
        self.viewport
            .scroll_line_to_quarter(index, self.buffer.len());
        self.settle_scroll();
    }

    /// Buffer index of the selected line, if it is still in the buffer.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_seq
            .and_then(|seq| self.buffer.index_of_seq(seq))
    }

    // ---- clipboard export ----

    /// Copy the selected line. No-op when nothing is selected.
    pub fn copy_selected(&mut self) {
        let Some(index) = self.selected_index() else {
            return;
        };
        if let Some(line) = self.buffer.get(index) {
            export::copy_to_clipboard(export::serialize(
                std::iter::once(line),
                self.prefs.include_timestamp,
            ));
            self.status_message = Some("Copied 1 line".to_string());
        }
    }

    pub fn copy_last_n(&mut self, n: Option<usize>) {
        let n = n.unwrap_or(export::DEFAULT_COPY_LAST_N);
        let count = n.min(self.buffer.len());
        export::copy_to_clipboard(export::serialize_last_n(
            &self.buffer,
            n,
            self.prefs.include_timestamp,
        ));
        self.status_message = Some(format!("Copied last {count} lines"));
    }

    pub fn copy_all(&mut self) {
        export::copy_to_clipboard(export::serialize_all(
            &self.buffer,
            self.prefs.include_timestamp,
        ));
        self.status_message = Some(format!("Copied {} lines", self.buffer.len()));
    }

    // ---- display preferences ----

    fn save_prefs(&mut self) {
        let key = Self::prefs_key(&self.sources[self.current_source]);
        self.prefs.save(self.prefs_store.as_mut(), &key);
    }

    /// Toggle line wrapping. With wrap on, line heights vary and the
    /// fixed-height window is only approximate.
    pub fn toggle_wrap(&mut self) {
        self.prefs.wrap = !self.prefs.wrap;
        self.save_prefs();
        self.status_message = Some(format!(
            "Line wrap: {}",
            if self.prefs.wrap { "on" } else { "off" }
        ));
    }

    pub fn toggle_timestamps(&mut self) {
        self.prefs.include_timestamp = !self.prefs.include_timestamp;
        self.save_prefs();
        self.status_message = Some(format!(
            "Copy timestamps: {}",
            if self.prefs.include_timestamp { "on" } else { "off" }
        ));
    }

    pub fn adjust_font_size(&mut self, delta: i16) {
        let size = self.prefs.font_size.saturating_add_signed(delta).clamp(6, 32);
        if size != self.prefs.font_size {
            self.prefs.font_size = size;
            self.save_prefs();
            self.viewport.set_font_size(size, self.buffer.len());
            self.status_message = Some(format!("Font size: {size}"));
        }
    }

    /// Toggle log level coloring
    pub fn toggle_level_colors(&mut self) {
        self.level_colors_enabled = !self.level_colors_enabled;
        self.buffer.invalidate_renders();
        self.status_message = Some(format!(
            "Level colors: {}",
            if self.level_colors_enabled { "on" } else { "off" }
        ));
    }

    // ---- panels ----

    pub fn toggle_side_panel(&mut self) {
        self.show_side_panel = !self.show_side_panel;
        if !self.show_side_panel {
            self.focused_panel = FocusedPanel::LogView;
        }
    }

    pub fn cycle_focus(&mut self) {
        if !self.show_side_panel {
            return;
        }
        self.focused_panel = match self.focused_panel {
            FocusedPanel::LogView => FocusedPanel::Sources,
            FocusedPanel::Sources => FocusedPanel::LogView,
        };
    }
}
