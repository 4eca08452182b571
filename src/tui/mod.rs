pub mod records;
pub mod status;

use crate::coordinator::ScanCoordinator;
use crate::store::ScanView;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_TICK_RATE_MS: u64 = 250;

/// Main TUI application: binds the read-only scan view to the terminal and
/// forwards key commands to the coordinator.
pub struct TuiApp {
    view: ScanView,
    coordinator: Arc<ScanCoordinator>,
    should_quit: bool,
    last_tick: Instant,
    tick_rate: Duration,
}

impl TuiApp {
    pub fn new(view: ScanView, coordinator: Arc<ScanCoordinator>, tick_rate: Duration) -> Self {
        Self {
            view,
            coordinator,
            should_quit: false,
            last_tick: Instant::now(),
            tick_rate,
        }
    }

    pub fn with_default_tick_rate(view: ScanView, coordinator: Arc<ScanCoordinator>) -> Self {
        Self::new(view, coordinator, Duration::from_millis(DEFAULT_TICK_RATE_MS))
    }

    /// Run the TUI event loop until the user quits. Must be called from
    /// within a tokio runtime so scan sessions can be spawned.
    pub fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            let timeout = self.tick_rate
                .checked_sub(self.last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            if crossterm::event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => {
                                self.should_quit = true;
                            }
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                self.should_quit = true;
                            }
                            KeyCode::Char('s') | KeyCode::Enter => {
                                self.start_scan();
                            }
                            KeyCode::Char('c') => {
                                self.coordinator.cancel();
                            }
                            _ => {}
                        }
                    }
                }
            }

            if self.should_quit {
                break;
            }

            if self.last_tick.elapsed() >= self.tick_rate {
                self.last_tick = Instant::now();
            }
        }

        Ok(())
    }

    /// Kick off a scan session in the background. The session keeps the
    /// store updated; errors land in the status value and the log.
    fn start_scan(&self) {
        if self.coordinator.phase().is_active() {
            log::debug!("[tui] start_ignored: session already active");
            return;
        }
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            if let Err(e) = coordinator.start_scan().await {
                log::error!("[tui] scan_failed: error={}", e);
            }
        });
    }

    fn ui(&mut self, frame: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(frame.area());

        status::render(frame, chunks[0], &self.view, &self.coordinator);
        records::render(frame, chunks[1], &self.view);

        let help = Paragraph::new("s: start scan   c: cancel   q: quit")
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(help, chunks[2]);
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// Standard bordered block used by both panes.
pub fn create_block(title: &str) -> Block {
    Block::default()
        .title(title.to_uppercase())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray))
}

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal after TUI mode
pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
