use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};

use crate::follow::FollowMode;
use crate::viewer::{FocusedPanel, InputMode, Viewer};

const SIDE_PANEL_WIDTH: u16 = 28;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, viewer: &mut Viewer) {
    let main_chunks = if viewer.show_side_panel {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDE_PANEL_WIDTH), Constraint::Min(20)])
            .split(frame.area())
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20)])
            .split(frame.area())
    };

    if viewer.show_side_panel {
        draw_sources_panel(frame, viewer, main_chunks[0]);
    }

    let content_area = if viewer.show_side_panel {
        main_chunks[1]
    } else {
        main_chunks[0]
    };

    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Log view
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Search bar
        ])
        .split(content_area);

    draw_header(frame, viewer, content_chunks[0]);
    draw_log_view(frame, viewer, content_chunks[1]);
    draw_status_bar(frame, viewer, content_chunks[2]);
    draw_search_bar(frame, viewer, content_chunks[3]);

    if viewer.show_help {
        draw_help_overlay(frame);
    }
}

/// Draw the sources list
fn draw_sources_panel(frame: &mut Frame, viewer: &Viewer, area: Rect) {
    let focused = viewer.focused_panel == FocusedPanel::Sources;
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .title(" Sources ")
        .borders(Borders::ALL)
        .border_style(border_style);

    let items: Vec<ListItem> = viewer
        .sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let tailing = i == viewer.current_source_idx();
            let cursor = if i == viewer.selected_source_idx {
                "▶ "
            } else {
                "  "
            };
            let style = if tailing {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", cursor, source.name())).style(style)
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

/// Draw the header: source name, follow state, fetch error indicator
fn draw_header(frame: &mut Frame, viewer: &Viewer, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " taillight ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(
            viewer.current_source().name(),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
    ];

    spans.push(match viewer.follow.mode() {
        FollowMode::Live => Span::styled(" LIVE ", Style::default().bg(Color::Green).fg(Color::Black)),
        FollowMode::Paused => {
            Span::styled(" PAUSED ", Style::default().bg(Color::Yellow).fg(Color::Black))
        }
    });

    if let Some(error) = viewer.tail.last_error() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("fetch failed: {} (r to retry)", truncate(error, 60)),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}

/// Draw the virtualized log view
fn draw_log_view(frame: &mut Frame, viewer: &mut Viewer, area: Rect) {
    let focused = viewer.focused_panel == FocusedPanel::LogView;
    let border_style = if focused && viewer.show_side_panel {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(if viewer.show_side_panel {
            Borders::LEFT
        } else {
            Borders::NONE
        })
        .border_style(border_style);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    if height == 0 {
        return;
    }
    viewer.set_view_rows(height);

    let total = viewer.buffer.len();
    let (first, _) = viewer.viewport.visible_range(total);
    let range = viewer.viewport.materialized_range(total);

    let level_colors = viewer.level_colors_enabled;
    let selected = viewer.selected_index();

    // Only the materialized window is turned into styled text; everything
    // else stays as raw strings in the buffer.
    let mut lines_content: Vec<Line<'_>> = Vec::with_capacity(range.len());
    for idx in range.clone() {
        let is_selected = selected == Some(idx);
        let is_match = viewer.search.is_match(idx);
        let Some(line) = viewer.buffer.get_mut(idx) else {
            break;
        };
        let rendered = line.get_rendered(level_colors);
        for text_line in rendered.lines.iter() {
            let mut text_line = text_line.clone();
            if is_selected {
                text_line = text_line.patch_style(Style::default().add_modifier(Modifier::REVERSED));
            } else if is_match {
                text_line = text_line.patch_style(Style::default().fg(Color::Yellow));
            }
            lines_content.push(text_line);
        }
    }

    let mut paragraph =
        Paragraph::new(lines_content).scroll(((first - range.start) as u16, 0));
    if viewer.prefs.wrap {
        // With wrapping on, rows per line vary and the window is only
        // approximate.
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    frame.render_widget(paragraph, inner);

    if total > height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total).position(first);
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }

    if total == 0 {
        let msg = Paragraph::new("Waiting for log lines...")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, inner);
    }
}

/// Draw the status bar
fn draw_status_bar(frame: &mut Frame, viewer: &Viewer, area: Rect) {
    let mode_str = match viewer.mode {
        InputMode::Normal => "NORMAL",
        InputMode::SearchEditing => "SEARCH",
    };

    let wrap_indicator = if viewer.prefs.wrap { "[W]" } else { "" };
    let ts_indicator = if viewer.prefs.include_timestamp { "[T]" } else { "" };
    let color_indicator = if viewer.level_colors_enabled { "[C]" } else { "" };
    let indicators: Vec<&str> = [wrap_indicator, ts_indicator, color_indicator]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect();
    let indicators_str = if indicators.is_empty() {
        String::new()
    } else {
        format!(" {}", indicators.join(" "))
    };

    let match_str = match viewer.search.position() {
        Some((pos, total)) => format!(" | match {pos}/{total}"),
        None if !viewer.search.query().is_empty() => " | no matches".to_string(),
        None => String::new(),
    };

    let help_text = match viewer.mode {
        InputMode::SearchEditing => " Enter:apply  Esc:cancel ",
        _ => " ?:help  /:search  G:follow ",
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default().bg(Color::Blue).fg(Color::White),
        ),
        Span::raw(format!(
            " {}/{} lines{}{} ",
            viewer.buffer.len(),
            viewer.buffer.capacity(),
            indicators_str,
            match_str
        )),
        Span::styled(help_text, Style::default().fg(Color::DarkGray)),
    ]);

    let paragraph = Paragraph::new(status).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Draw the search input bar (or the status message)
fn draw_search_bar(frame: &mut Frame, viewer: &mut Viewer, area: Rect) {
    match viewer.mode {
        InputMode::SearchEditing => {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(1), Constraint::Min(1)])
                .split(area);

            let prefix = Paragraph::new("/").style(Style::default().fg(Color::Yellow));
            frame.render_widget(prefix, chunks[0]);
            frame.render_widget(&viewer.search_textarea, chunks[1]);
        }
        _ => {
            if let Some(msg) = &viewer.status_message {
                let content =
                    Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Yellow)));
                frame.render_widget(Paragraph::new(content), area);
            }
        }
    }
}

/// Draw the help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let width = 52.min(area.width.saturating_sub(4));
    let height = 24.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  j/k, ↑/↓     Scroll up/down"),
        Line::from("  PgUp/PgDn    Page up/down"),
        Line::from("  g            Go to top (pauses)"),
        Line::from("  G            Jump to bottom, resume live"),
        Line::from("  Space        Toggle live/paused"),
        Line::from(""),
        Line::from("Search:"),
        Line::from("  /            Start search input"),
        Line::from("  n/N          Next/previous match"),
        Line::from("  Esc          Clear search"),
        Line::from(""),
        Line::from("Copy:"),
        Line::from("  y            Copy selected line"),
        Line::from("  Y            Copy all lines"),
        Line::from("  p            Copy last 200 lines"),
        Line::from(""),
        Line::from("Other:"),
        Line::from("  w/t/c        Wrap / timestamps / colors"),
        Line::from("  +/-          Font size"),
        Line::from("  s, b, Tab    Next source / panel / focus"),
        Line::from("  r            Retry fetch    q: quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}
