use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::model::agg::LiveState;

const NAME_WIDTH: usize = 32;

pub fn draw_files(frame: &mut Frame, area: Rect, state: &LiveState, scroll: u16) {
    let rank = state.rank;
    let block = Block::default()
        .title(format!("Top files by {}", rank.label()))
        .borders(Borders::ALL);

    if state.rows.is_empty() {
        let paragraph = Paragraph::new("Waiting for file activity...").block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let mut lines = vec![
        Line::from(format!(
            "{:<NAME_WIDTH$} {:>12} {:>12} {:>12} {:>8} {:>8}  {}",
            "File", "Total KB", "Read KB", "Write KB", "Reads", "Writes", "Processes"
        )),
        Line::from(format!(
            "{:-<NAME_WIDTH$} {:-<12} {:-<12} {:-<12} {:-<8} {:-<8}  {:-<9}",
            "", "", "", "", "", "", ""
        )),
    ];

    let path_style = Style::default().fg(Color::DarkGray);
    for row in &state.rows {
        let s = &row.stats;
        let processes = s.processes.iter().map(String::as_str).collect::<Vec<_>>();
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<NAME_WIDTH$}", truncate(&row.filename, NAME_WIDTH)),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                " {:>12.2} {:>12.2} {:>12.2} {:>8} {:>8}  {}",
                s.total_kb().as_f64(),
                s.read_kb.as_f64(),
                s.write_kb.as_f64(),
                s.reads,
                s.writes,
                processes.join(", ")
            )),
        ]));
        for path in &row.paths {
            lines.push(Line::from(Span::styled(
                format!("  -> {}", path.display()),
                path_style,
            )));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max > 3 {
        let head: String = s.chars().take(max - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max).collect()
    }
}
