use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::ui::{AppState, Mode};

pub fn draw_search_bar(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let editing = state.mode == Mode::Search;
    let text = state.session.search_text();
    let border = if editing {
        theme.border_focused()
    } else {
        theme.border_unfocused()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title("Search");
    let mut spans = vec![Span::styled(" / ", theme.text_muted())];
    if text.is_empty() && !editing {
        spans.push(Span::styled("press / to filter settings", theme.text_muted()));
    } else {
        let style = if editing {
            theme.text_editing_bold()
        } else {
            theme.text_active_bold()
        };
        spans.push(Span::styled(text.to_string(), style));
        if editing && (state.tick / 3) % 2 == 0 {
            spans.push(Span::styled("█", Style::default().fg(theme.selected)));
        }
    }
    if let Some(m) = state.session.search() {
        let shown = state.view.control_rows().count();
        spans.push(Span::styled(
            format!("   {shown} shown for \"{}\"", m.needle()),
            theme.text_muted(),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
