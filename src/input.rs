use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input;

use crate::viewer::{FocusedPanel, InputMode, Viewer};

/// Handle a mouse event
pub fn handle_mouse(viewer: &mut Viewer, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => viewer.scroll_lines(-3),
        MouseEventKind::ScrollDown => viewer.scroll_lines(3),
        _ => {}
    }
}

/// Handle a key event and update viewer state accordingly
pub fn handle_key(viewer: &mut Viewer, key: KeyEvent, page_size: usize) {
    // Help overlay takes priority
    if viewer.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            viewer.show_help = false;
        }
        return;
    }

    match viewer.mode {
        InputMode::Normal => handle_normal_mode(viewer, key, page_size),
        InputMode::SearchEditing => handle_search_mode(viewer, key),
    }
}

fn handle_normal_mode(viewer: &mut Viewer, key: KeyEvent, page_size: usize) {
    match key.code {
        // Quit
        KeyCode::Char('q') => {
            viewer.should_quit = true;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            viewer.should_quit = true;
        }

        // Help
        KeyCode::Char('?') => {
            viewer.show_help = true;
        }

        // Side panel / focus
        KeyCode::Char('b') => {
            viewer.toggle_side_panel();
        }
        KeyCode::Tab => {
            viewer.cycle_focus();
        }

        // Navigation (context-dependent on focused panel)
        KeyCode::Char('j') | KeyCode::Down => match viewer.focused_panel {
            FocusedPanel::LogView => viewer.scroll_lines(1),
            FocusedPanel::Sources => {
                if viewer.selected_source_idx + 1 < viewer.sources.len() {
                    viewer.selected_source_idx += 1;
                }
            }
        },
        KeyCode::Char('k') | KeyCode::Up => match viewer.focused_panel {
            FocusedPanel::LogView => viewer.scroll_lines(-1),
            FocusedPanel::Sources => {
                viewer.selected_source_idx = viewer.selected_source_idx.saturating_sub(1);
            }
        },

        // Enter switches to the source under the cursor
        KeyCode::Enter => {
            if viewer.focused_panel == FocusedPanel::Sources {
                viewer.switch_source(viewer.selected_source_idx, Instant::now());
            }
        }

        KeyCode::PageDown => viewer.scroll_page_down(page_size),
        KeyCode::PageUp => viewer.scroll_page_up(page_size),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            viewer.scroll_page_down(page_size);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            viewer.scroll_page_up(page_size);
        }
        KeyCode::Char('g') => viewer.go_to_top(),
        KeyCode::Char('G') => viewer.jump_to_bottom(Instant::now()),

        // Follow control
        KeyCode::Char(' ') => viewer.toggle_follow(Instant::now()),

        // Search
        KeyCode::Char('/') => viewer.open_search(),
        KeyCode::Char('n') => viewer.next_match(),
        KeyCode::Char('N') => viewer.prev_match(),
        KeyCode::Esc => {
            if !viewer.search.query().is_empty() {
                viewer.clear_search();
            }
        }

        // Clipboard
        KeyCode::Char('y') => viewer.copy_selected(),
        KeyCode::Char('Y') => viewer.copy_all(),
        KeyCode::Char('p') => viewer.copy_last_n(None),

        // Display toggles
        KeyCode::Char('w') => viewer.toggle_wrap(),
        KeyCode::Char('t') => viewer.toggle_timestamps(),
        KeyCode::Char('c') => viewer.toggle_level_colors(),
        KeyCode::Char('+') | KeyCode::Char('=') => viewer.adjust_font_size(1),
        KeyCode::Char('-') => viewer.adjust_font_size(-1),

        // Sources / fetch
        KeyCode::Char('s') => viewer.next_source(Instant::now()),
        KeyCode::Char('r') => viewer.retry_fetch(),

        _ => {}
    }
}

fn handle_search_mode(viewer: &mut Viewer, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            viewer.apply_search();
        }
        KeyCode::Esc => {
            viewer.cancel_search();
        }
        _ => {
            // Forward all other keys to the textarea
            let input = Input::from(key);
            if viewer.search_textarea.input(input) {
                // Text changed, mark for debounce
                viewer.search_changed();
            }
        }
    }
}
