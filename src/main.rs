mod buffer;
mod config;
mod export;
mod follow;
mod input;
mod prefs;
mod search;
mod tail;
mod transport;
mod ui;
mod viewer;
mod viewport;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::Config;
use prefs::{FilePrefsStore, MemoryPrefsStore, PrefsStore};
use transport::SourceSpec;
use viewer::{PollOutcome, Viewer};

fn usage() -> ! {
    eprintln!("Usage: taillight <file>...");
    eprintln!("       taillight --url <base_url> <remote_path>");
    eprintln!();
    eprintln!("Sources can be mixed; s cycles between them.");
    std::process::exit(1);
}

fn parse_sources(args: &[String]) -> Vec<SourceSpec> {
    let mut sources = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--url" {
            if i + 2 >= args.len() {
                usage();
            }
            sources.push(SourceSpec::Remote {
                base_url: args[i + 1].clone(),
                path: args[i + 2].clone(),
            });
            i += 3;
        } else {
            sources.push(SourceSpec::File {
                path: PathBuf::from(&args[i]),
            });
            i += 1;
        }
    }
    sources
}

/// Log to a file; the terminal itself belongs to the TUI.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = Config::log_dir()?;
    let appender = tracing_appender::rolling::never(dir, "taillight.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }
    let sources = parse_sources(&args);
    if sources.is_empty() {
        usage();
    }

    let _tracing_guard = init_tracing();
    let config = Config::load();

    let prefs_store: Box<dyn PrefsStore> = match Config::prefs_path() {
        Some(path) => Box::new(FilePrefsStore::open(path)),
        None => Box::new(MemoryPrefsStore::default()),
    };

    let mut viewer = Viewer::new(config, sources, prefs_store, Instant::now());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_event_loop(&mut terminal, &mut viewer).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    viewer: &mut Viewer<'_>,
) -> Result<()> {
    let (poll_tx, mut poll_rx) = mpsc::channel::<PollOutcome>(8);

    loop {
        // Check search debounce before drawing
        viewer.check_search_debounce();

        terminal.draw(|frame| {
            ui::draw(frame, viewer);
        })?;
        // Second bottom-pin for new lines, now that layout has settled
        viewer.after_render();

        // Kick off a poll if one is due. The result comes back through
        // the channel tagged with the epoch it was issued under.
        if let Some(ticket) = viewer.begin_poll(Instant::now()) {
            let transport = viewer.current_source().transport();
            let tx = poll_tx.clone();
            tokio::spawn(async move {
                let result = transport
                    .fetch(&ticket.request)
                    .await
                    .map_err(|e| format!("{e:#}"));
                let _ = tx
                    .send(PollOutcome {
                        epoch: ticket.epoch,
                        result,
                    })
                    .await;
            });
        }

        // Calculate page size for scrolling
        let page_size = terminal.size()?.height.saturating_sub(4) as usize;

        // Handle both terminal input and settled polls
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                // Poll for events with no blocking
                if event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            // Only handle key press events (not release)
                            if key.kind == KeyEventKind::Press {
                                input::handle_key(viewer, key, page_size);
                            }
                        }
                        Event::Mouse(mouse) => {
                            input::handle_mouse(viewer, mouse);
                        }
                        _ => {}
                    }
                }
            }

            Some(outcome) = poll_rx.recv() => {
                viewer.apply_poll(outcome, Instant::now());
            }
        }

        if viewer.should_quit {
            break;
        }
    }

    Ok(())
}
