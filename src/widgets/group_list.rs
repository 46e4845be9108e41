use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};

use crate::theme::Theme;
use crate::ui::AppState;
use crate::widgets::chrome::panel_block;

/// Left column: one entry per group, `[n]` shortcut first. While a search is
/// active every group is rendered on the right, so the list is drawn muted.
pub fn draw_group_list(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let title = state.pane.label.as_str();
    let block = panel_block(title, false, theme);
    if state.pane.groups.is_empty() {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    }
    let searching = state.session.search().is_some();
    let current = state.session.current_group();
    let items: Vec<ListItem> = state
        .pane
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let selected = i == current && !searching && !state.pane.show_all_groups;
            ListItem::new(group_line(theme, i, &g.label, g.level, selected, searching))
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn group_line<'a>(
    theme: &Theme,
    index: usize,
    label: &'a str,
    level: u8,
    selected: bool,
    searching: bool,
) -> Line<'a> {
    let text_style = if searching {
        theme.text_muted()
    } else if selected {
        Style::default()
            .fg(theme.selected)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.fg)
    };
    let key_style = if selected {
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        theme.text_muted()
    };
    let key = if index < 9 {
        format!("{}", index + 1)
    } else {
        " ".to_string()
    };
    let indent = if level > 1 { "  " } else { "" };
    let marker = if selected { "▌" } else { " " };
    Line::from(vec![
        Span::styled(marker, Style::default().fg(theme.selected)),
        Span::styled("[", Style::default().fg(theme.frame)),
        Span::styled(key, key_style),
        Span::styled("]", Style::default().fg(theme.frame)),
        Span::raw(" "),
        Span::raw(indent),
        Span::styled(label, text_style),
    ])
}
