use std::{io, time::Duration};

use color_eyre::Result;
use crossterm::{
    event::{self, DisableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use marks_cache::BookmarkApi;
use marks_core::bookmarks::Collection;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph},
    Terminal,
};

use crate::commands::report;

/// Interactive bookmark picker. Returns the url chosen with Enter, or `None` on quit.
/// `d` deletes the highlighted bookmark and `r` re-reads the store from disk.
pub async fn launch<A: BookmarkApi>(api: &mut A) -> Result<Option<String>> {
    let mut status = String::from("Ready.");
    let mut bookmarks = load(api, &mut status).await?;

    // Guard restores the terminal even if we early-return.
    let guard = TerminalGuard::enter()?;
    let mut terminal = guard.terminal()?;
    let mut state = ListState::default();
    state.select(first_index(bookmarks.len()));

    loop {
        terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(1),
                    Constraint::Length(3),
                ])
                .split(frame.area());

            let header = Paragraph::new(Line::from(vec![
                Span::styled(
                    "marks",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("  {} bookmarks", bookmarks.len())),
            ]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
            frame.render_widget(header, chunks[0]);

            let items: Vec<ListItem> = bookmarks
                .iter()
                .map(|b| {
                    let mut line = vec![Span::styled(
                        b.url.as_str(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )];
                    if let Some(desc) = b.description() {
                        line.push(Span::styled(
                            format!("  {desc}"),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    ListItem::new(Line::from(line))
                })
                .collect();

            let body = List::new(items)
                .block(Block::default().borders(Borders::ALL).title("Bookmarks"))
                .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
                .highlight_symbol("> ");
            frame.render_stateful_widget(body, chunks[1], &mut state);

            let footer = Paragraph::new(Line::from(vec![
                Span::styled("Enter", Style::default().fg(Color::Cyan)),
                Span::raw(" select  "),
                Span::styled("d", Style::default().fg(Color::Cyan)),
                Span::raw(" delete  "),
                Span::styled("r", Style::default().fg(Color::Cyan)),
                Span::raw(" reload  "),
                Span::styled("q", Style::default().fg(Color::Cyan)),
                Span::raw(" quit  | "),
                Span::raw(status.as_str()),
            ]))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
            frame.render_widget(footer, chunks[2]);
        })?;

        if !event::poll(Duration::from_millis(150))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let len = bookmarks.len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(None),
            KeyCode::Down | KeyCode::Char('j') => {
                state.select(step(state.selected(), len, 1));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.select(step(state.selected(), len, -1));
            }
            KeyCode::Enter => {
                if let Some(bookmark) = state.selected().and_then(|i| bookmarks.get(i)) {
                    return Ok(Some(bookmark.url.clone()));
                }
            }
            KeyCode::Char('d') => {
                if let Some(url) = state
                    .selected()
                    .and_then(|i| bookmarks.get(i))
                    .map(|b| b.url.clone())
                {
                    status = report(api.delete_bookmark(&url).await.map(|o| o.to_string()))?;
                    bookmarks = load(api, &mut status).await?;
                    state.select(clamp(state.selected(), bookmarks.len()));
                }
            }
            KeyCode::Char('r') => {
                status = api.reload().to_string();
                bookmarks = load(api, &mut status).await?;
                state.select(clamp(state.selected(), bookmarks.len()));
            }
            _ => {}
        }
    }
}

/// Current collection. Recovery warnings and recoverable errors land in `status`;
/// decryption failures abort.
async fn load<A: BookmarkApi>(api: &mut A, status: &mut String) -> Result<Collection> {
    let result = api.list_bookmarks().await;
    let warnings = api.take_warnings();
    if !warnings.is_empty() {
        *status = warnings.join("; ");
    }

    match result {
        Ok(collection) => Ok(collection),
        Err(err) => {
            *status = report(Err(err))?;
            Ok(Collection::new())
        }
    }
}

fn first_index(len: usize) -> Option<usize> {
    (len > 0).then_some(0)
}

fn step(selected: Option<usize>, len: usize, delta: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = selected.unwrap_or(0) as isize;
    Some((current + delta).clamp(0, len as isize - 1) as usize)
}

fn clamp(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(selected.unwrap_or(0).min(len - 1))
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        // Enter alternate screen to avoid polluting the shell buffer.
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }

    fn terminal(&self) -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
        let backend = CrosstermBackend::new(io::stdout());
        Ok(Terminal::new(backend)?)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Best-effort cleanup; errors are logged but not propagated from Drop.
        if let Err(err) = disable_raw_mode() {
            eprintln!("failed to disable raw mode: {err}");
        }
        if let Err(err) = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture) {
            eprintln!("failed to restore terminal: {err}");
        }
    }
}
