use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::ui::{AppState, Mode, ToastLevel};

pub fn draw_footer_combined(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let theme = &state.theme;
    let mut spans: Vec<Span> = Vec::new();
    if let Some(msg) = &state.status_text {
        let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][state.tick as usize % 6];
        spans.push(Span::raw(format!(" {spinner} {msg}")));
        spans.push(Span::raw("  |  "));
    }
    if let Some(t) = &state.toast {
        let color = theme.toast_color(t.level);
        let tag = match t.level {
            ToastLevel::Success => "[OK]",
            ToastLevel::Error => "[ERROR]",
            ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }
    let mode = match state.mode {
        Mode::Browse => None,
        Mode::Search => Some("search"),
        Mode::Edit => Some("editing"),
        Mode::Snapshot => Some("snapshot"),
    };
    if let Some(m) = mode {
        spans.push(Span::styled(m, Style::default().fg(Color::Magenta)));
        spans.push(Span::raw("  |  "));
    }
    spans.push(Span::styled(
        format!("reports: {}  |  ", state.session.report_count()),
        Style::default().fg(Color::Magenta),
    ));
    spans.push(Span::styled(
        help_text.to_string(),
        Style::default().fg(Color::DarkGray),
    ));
    let p = Paragraph::new(Line::from(spans));
    f.render_widget(p, area);
}
