use std::{
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame,
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::warn;

use crate::{
    agg::{drain_into, live::LiveAggregator},
    model::agg::LiveState,
    resolve::PathResolver,
    trace::{SampleSource, parse::SampleFilter},
    ui::{files::draw_files, report::render_live_to_string},
};

const FRAME_POLL: Duration = Duration::from_millis(100);

/// One polling cycle: pull whatever the sampler has ready and re-rank.
/// Returns whether the view changed.
fn pump<S, R>(
    source: &mut S,
    agg: &mut LiveAggregator<R>,
    filter: &SampleFilter,
    drain_limit: usize,
) -> bool
where
    S: SampleSource,
    R: PathResolver,
{
    if agg.state().sampler_closed {
        return false;
    }
    let drain = drain_into(source, filter, drain_limit, agg);
    if drain.closed {
        warn!(samples = agg.state().samples, "sampler output ended");
        agg.mark_sampler_closed();
    }
    agg.refresh()
}

/// Clear-and-reprint loop for dumb terminals and pipes. Ends when the sampler
/// exits or `stop` is raised.
pub fn run_live_plain<S, R>(
    source: &mut S,
    agg: &mut LiveAggregator<R>,
    filter: &SampleFilter,
    drain_limit: usize,
    stop: &AtomicBool,
) -> Result<()>
where
    S: SampleSource,
    R: PathResolver,
{
    let mut stdout = io::stdout();
    while !stop.load(Ordering::SeqCst) {
        if pump(source, agg, filter, drain_limit) {
            stdout.write_all(render_live_to_string(agg.state()).as_bytes())?;
            stdout.flush()?;
        } else {
            thread::sleep(FRAME_POLL);
        }
        if agg.state().sampler_closed {
            break;
        }
    }
    Ok(())
}

/// Puts the terminal back however the view exits.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

pub fn run_live_tui<S, R>(
    source: &mut S,
    agg: &mut LiveAggregator<R>,
    filter: &SampleFilter,
    drain_limit: usize,
    stop: &AtomicBool,
) -> Result<()>
where
    S: SampleSource,
    R: PathResolver,
{
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut scroll: u16 = 0;
    let mut redraw = true;

    while !stop.load(Ordering::SeqCst) {
        redraw |= pump(source, agg, filter, drain_limit);

        if redraw {
            terminal.draw(|frame| draw_frame(frame, agg.state(), scroll))?;
            redraw = false;
        }

        if event::poll(FRAME_POLL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Up | KeyCode::Char('k') => {
                        scroll = scroll.saturating_sub(1);
                        redraw = true;
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        scroll = scroll.saturating_add(1);
                        redraw = true;
                    }
                    KeyCode::Home => {
                        scroll = 0;
                        redraw = true;
                    }
                    _ => {}
                },
                Event::Resize(..) => redraw = true,
                _ => {}
            }
        }
    }

    Ok(())
}

fn draw_frame(frame: &mut Frame, state: &LiveState, scroll: u16) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status
            Constraint::Min(1),    // files
        ])
        .split(frame.area());

    draw_status(frame, chunks[0], state);
    draw_files(frame, chunks[1], state, scroll);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &LiveState) {
    let sampler = if state.sampler_closed {
        Span::styled(
            "sampler exited, totals frozen",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("sampling", Style::default().fg(Color::Green))
    };

    let line = Line::from(vec![
        Span::raw(format!(
            " samples: {}  files: {}  ",
            state.samples, state.files_seen
        )),
        sampler,
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .title("peak-scope live (q quit, ↑/↓ scroll)")
            .borders(Borders::ALL),
    );
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        agg::Aggregator,
        model::agg::RankKey,
        trace::{SamplerLauncher, fake::FakeLauncher},
    };

    struct NoPaths;

    impl PathResolver for NoPaths {
        fn resolve(&self, _filename: &str) -> Vec<PathBuf> {
            Vec::new()
        }
    }

    #[test]
    fn pump_accumulates_regardless_of_peaks() {
        let mut fake = FakeLauncher::new();
        let mut src = fake.launch().unwrap();
        let mut agg = LiveAggregator::new(NoPaths, RankKey::Combined, 10);
        agg.on_start();
        agg.refresh();

        assert!(!pump(&mut src, &mut agg, &SampleFilter::Any, 8));

        fake.push("1 java 1 0 4.00 0.00 R a.log");
        fake.push("1 java 1 0 2.00 1.00 R b.log");
        assert!(pump(&mut src, &mut agg, &SampleFilter::Any, 8));
        assert_eq!(agg.state().samples, 2);
        assert_eq!(agg.state().rows[0].filename, "a.log");
    }

    #[test]
    fn plain_loop_ends_with_sampler() {
        let mut fake = FakeLauncher::new();
        fake.set_close_when_empty(true);
        fake.push("1 java 1 0 4.00 0.00 R a.log");
        let mut src = fake.launch().unwrap();
        let mut agg = LiveAggregator::new(NoPaths, RankKey::Combined, 10);
        agg.on_start();

        let stop = AtomicBool::new(false);
        run_live_plain(&mut src, &mut agg, &SampleFilter::Any, 8, &stop).unwrap();

        assert!(agg.state().sampler_closed);
        assert_eq!(agg.state().samples, 1);
    }

    #[test]
    fn plain_loop_honours_stop() {
        let mut fake = FakeLauncher::new();
        let mut src = fake.launch().unwrap();
        let mut agg = LiveAggregator::new(NoPaths, RankKey::Combined, 10);
        agg.on_start();

        let stop = AtomicBool::new(true);
        run_live_plain(&mut src, &mut agg, &SampleFilter::Any, 8, &stop).unwrap();
        assert_eq!(agg.state().samples, 0);
    }
}
