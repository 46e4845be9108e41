use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};
use serde_json::Value as JsonValue;

use crate::compose::node::{ChoiceOption, Control, ControlKind};
use crate::engine::path::value_text;
use crate::engine::search::SearchMatcher;
use crate::nav::flatten::{FlatRow, RowKind};
use crate::theme::Theme;
use crate::ui::AppState;
use crate::widgets::chrome::panel_block;

fn option_label<'a>(options: &'a [ChoiceOption], current: &JsonValue) -> Option<&'a str> {
    options
        .iter()
        .find(|o| &o.value == current)
        .map(|o| o.label.as_str())
}

/// Offset (in lines) that keeps `[start, end)` inside a viewport of `inner_h`.
pub(crate) fn scroll_to_fit(
    offset: usize,
    start: usize,
    end: usize,
    inner_h: usize,
    total: usize,
) -> usize {
    if inner_h == 0 {
        return 0;
    }
    let mut off = offset;
    if start < off {
        off = start;
    }
    if end > off + inner_h {
        off = end.saturating_sub(inner_h).min(start);
    }
    off.min(total.saturating_sub(inner_h))
}

pub fn draw_settings(f: &mut Frame, area: Rect, state: &mut AppState) {
    let title = match state.session.search() {
        Some(m) => format!("{} · \"{}\"", state.pane.label, m.needle()),
        None => state.pane.label.clone(),
    };
    let block = panel_block(&title, true, &state.theme);
    if let Some(err) = &state.render_error {
        let lines = vec![
            Line::from(Span::styled("Cannot render settings", state.theme.text_error())),
            Line::from(""),
            Line::from(Span::styled(err.clone(), state.theme.text_error())),
        ];
        let p = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        f.render_widget(p, area);
        return;
    }

    let width = area.width.saturating_sub(2) as usize;
    let search = state.session.search();
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut sel_span = (0, 0);
    for (i, row) in state.view.rows.iter().enumerate() {
        let selected = i == state.selected && row.is_selectable();
        let start = lines.len();
        lines.extend(row_lines(row, &state.theme, search, selected, width));
        if selected {
            sel_span = (start, lines.len());
        }
    }

    let inner_h = area.height.saturating_sub(2) as usize;
    state.list_viewport_h = inner_h as u16;
    state.list_offset = scroll_to_fit(
        state.list_offset,
        sel_span.0,
        sel_span.1,
        inner_h,
        lines.len(),
    );
    let p = Paragraph::new(lines)
        .block(block)
        .scroll((state.list_offset as u16, 0));
    f.render_widget(p, area);
}

fn label_spans(
    label: &str,
    base: Style,
    theme: &Theme,
    search: Option<&SearchMatcher>,
) -> Vec<Span<'static>> {
    match search {
        Some(m) => m
            .highlight(label)
            .into_iter()
            .map(|frag| {
                let style = if frag.matched {
                    theme.match_highlight()
                } else {
                    base
                };
                Span::styled(frag.text, style)
            })
            .collect(),
        None => vec![Span::styled(label.to_string(), base)],
    }
}

fn description_line(indent: &str, text: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("{indent}    ")),
        Span::styled(text.to_string(), theme.text_muted()),
    ])
}

pub(crate) fn row_lines(
    row: &FlatRow,
    theme: &Theme,
    search: Option<&SearchMatcher>,
    selected: bool,
    width: usize,
) -> Vec<Line<'static>> {
    let indent = "  ".repeat(row.depth);
    let marker = if selected { "› " } else { "  " };
    let mut out: Vec<Line<'static>> = Vec::new();
    match &row.kind {
        RowKind::GroupHeader {
            label,
            description,
            level,
        } => {
            let mut spans = vec![Span::raw(indent.clone())];
            spans.extend(label_spans(label, theme.group_header(*level), theme, search));
            out.push(Line::from(spans));
            if let Some(d) = description {
                out.push(description_line(&indent, d, theme));
            }
        }
        RowKind::SubgroupHeader { label, description } => {
            let base = Style::default()
                .fg(theme.secondary)
                .add_modifier(Modifier::BOLD);
            let mut spans = vec![Span::raw(format!("{indent}  "))];
            spans.extend(label_spans(label, base, theme, search));
            out.push(Line::from(spans));
            if let Some(d) = description {
                out.push(description_line(&indent, d, theme));
            }
        }
        RowKind::Control { control, value, .. } => {
            out.extend(control_lines(control, value, &indent, marker, theme, search));
            if let Some(d) = &control.description {
                out.push(description_line(&indent, d, theme));
            }
        }
        RowKind::SubPageLink {
            label,
            description,
            match_count,
            ..
        } => {
            let mut spans = vec![Span::raw(format!("{indent}{marker}"))];
            spans.extend(label_spans(label, Style::default().fg(theme.fg), theme, search));
            if *match_count > 0 {
                let noun = if *match_count == 1 { "match" } else { "matches" };
                spans.push(Span::styled(
                    format!("  {match_count} {noun}"),
                    Style::default().fg(theme.accent),
                ));
            }
            spans.push(Span::styled("  ›", theme.text_muted()));
            out.push(Line::from(spans));
            if let Some(d) = description {
                out.push(description_line(&indent, d, theme));
            }
        }
        RowKind::BackBar { label, .. } => {
            out.push(Line::from(vec![
                Span::raw(format!("{indent}{marker}")),
                Span::styled("‹ Back", theme.text_active_bold()),
                Span::styled("  |  ", theme.text_muted()),
                Span::styled(label.clone(), theme.group_header(1)),
            ]));
        }
        RowKind::Divider => {
            let len = width.saturating_sub(indent.len() + 2);
            out.push(Line::from(vec![
                Span::raw(format!("{indent}  ")),
                Span::styled("─".repeat(len), Style::default().fg(theme.frame)),
            ]));
        }
        RowKind::Empty(msg) => {
            out.push(Line::from(Span::styled(
                format!("  {msg}"),
                theme.text_muted().add_modifier(Modifier::ITALIC),
            )));
        }
    }
    if row.disabled {
        for line in &mut out {
            for span in &mut line.spans {
                span.style = theme.text_muted();
            }
        }
    }
    if selected {
        if let Some(first) = out.first_mut() {
            first.style = theme.list_cursor_style();
        }
    }
    out
}

fn control_lines(
    control: &Control,
    value: &JsonValue,
    indent: &str,
    marker: &str,
    theme: &Theme,
    search: Option<&SearchMatcher>,
) -> Vec<Line<'static>> {
    let label_style = Style::default().fg(theme.fg);
    let mut spans = vec![Span::raw(format!("{indent}{marker}"))];
    let mut extra: Vec<Line<'static>> = Vec::new();
    match &control.kind {
        ControlKind::Boolean {
            immediate_effect, ..
        } => {
            let on = value.as_bool().unwrap_or(false);
            let mark = match (immediate_effect, on) {
                (true, true) => "(on)  ",
                (true, false) => "(off) ",
                (false, true) => "[x] ",
                (false, false) => "[ ] ",
            };
            spans.push(Span::styled(mark, theme.text_active_bold()));
            spans.extend(label_spans(&control.label, label_style, theme, search));
        }
        ControlKind::Input { units, .. } => {
            spans.extend(label_spans(&control.label, label_style, theme, search));
            spans.push(Span::raw(": "));
            let text = value_text(value);
            if text.is_empty() {
                spans.push(Span::styled("<empty>", theme.text_muted()));
            } else {
                spans.push(Span::styled(text, theme.text_active_bold()));
            }
            if let Some(u) = units {
                spans.push(Span::styled(format!(" {u}"), theme.text_muted()));
            }
        }
        ControlKind::Select { options } => {
            spans.extend(label_spans(&control.label, label_style, theme, search));
            let current = option_label(options, value)
                .map(str::to_string)
                .unwrap_or_else(|| value_text(value));
            spans.push(Span::raw(": "));
            spans.push(Span::styled("‹ ", theme.text_muted()));
            spans.push(Span::styled(current, theme.text_active_bold()));
            spans.push(Span::styled(" ›", theme.text_muted()));
        }
        ControlKind::RadioGroup {
            options,
            one_column,
        } => {
            spans.extend(label_spans(&control.label, label_style, theme, search));
            if *one_column {
                for o in options {
                    let dot = if &o.value == value { "(•) " } else { "( ) " };
                    extra.push(Line::from(vec![
                        Span::raw(format!("{indent}      ")),
                        Span::styled(dot, theme.text_active_bold()),
                        Span::raw(o.label.clone()),
                    ]));
                }
            } else {
                spans.push(Span::raw(": "));
                for o in options {
                    let dot = if &o.value == value { "(•) " } else { "( ) " };
                    spans.push(Span::styled(dot, theme.text_active_bold()));
                    spans.push(Span::raw(format!("{}  ", o.label)));
                }
            }
        }
        ControlKind::ToggleGroup { options } => {
            spans.extend(label_spans(&control.label, label_style, theme, search));
            spans.push(Span::raw(": "));
            for o in options {
                if &o.value == value {
                    spans.push(Span::styled(format!("[{}]", o.label), theme.text_editing_bold()));
                } else {
                    spans.push(Span::styled(format!(" {} ", o.label), theme.text_muted()));
                }
            }
        }
        ControlKind::Chooser { button_label, .. } => {
            spans.extend(label_spans(&control.label, label_style, theme, search));
            spans.push(Span::raw(": "));
            let text = value_text(value);
            if text.is_empty() {
                spans.push(Span::styled("<none>", theme.text_muted()));
            } else {
                spans.push(Span::styled(text, theme.text_active_bold()));
            }
            spans.push(Span::styled(
                format!("  [{button_label}]"),
                Style::default().fg(theme.accent),
            ));
        }
    }
    let mut out = vec![Line::from(spans)];
    out.extend(extra);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose;
    use crate::model::PaneSpec;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn state_for(spec: JsonValue, values: JsonValue) -> AppState {
        let spec: PaneSpec = serde_json::from_value(spec).unwrap();
        let pane = compose(&spec).unwrap();
        let mut state = AppState::new(pane, values);
        crate::app::begin_pass(&mut state);
        state
    }

    fn screen(state: &mut AppState, w: u16, h: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(w, h)).unwrap();
        terminal.draw(|f| draw_settings(f, f.area(), state)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content()
            .chunks(w as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect()
    }

    #[test]
    fn renders_each_control_kind() {
        let mut state = state_for(
            json!({"groups": [{"label": "Editor", "children": [
                {"type": "boolean", "path": "wrap", "label": "Wrap lines"},
                {"type": "input", "path": "tabs", "label": "Tab size", "input": "number", "units": "spaces"},
                {"type": "select", "path": "theme", "label": "Theme",
                 "options": [{"value": "dark", "label": "Dark"}, {"value": "light", "label": "Light"}]},
                {"type": "toggle_group", "path": "eol", "label": "Line endings", "options": ["lf", "crlf"]},
                {"type": "subpage", "path": "fonts", "label": "Fonts", "children": [
                    {"type": "input", "path": "fonts.size", "label": "Size"}
                ]}
            ]}]}),
            json!({"wrap": true, "tabs": 4, "theme": "light", "eol": "crlf"}),
        );
        let lines = screen(&mut state, 60, 14).join("\n");
        assert!(lines.contains("[x] Wrap lines"));
        assert!(lines.contains("Tab size: 4 spaces"));
        assert!(lines.contains("Theme: ‹ Light ›"));
        assert!(lines.contains("[crlf]"));
        assert!(lines.contains("Fonts  ›"));
    }

    #[test]
    fn one_column_radio_lists_options_below_label() {
        let mut state = state_for(
            json!({"groups": [{"label": "G", "children": [
                {"type": "radio_group", "path": "mode", "label": "Mode", "one_column": true,
                 "options": [{"value": "a", "label": "Alpha"}, {"value": "b", "label": "Beta"}]}
            ]}]}),
            json!({"mode": "b"}),
        );
        let lines = screen(&mut state, 40, 8);
        let alpha = lines.iter().position(|l| l.contains("( ) Alpha")).unwrap();
        let beta = lines.iter().position(|l| l.contains("(•) Beta")).unwrap();
        assert_eq!(beta, alpha + 1);
    }

    #[test]
    fn render_error_replaces_rows() {
        let mut state = AppState {
            render_error: Some("predicate failed".into()),
            ..Default::default()
        };
        let lines = screen(&mut state, 40, 6).join("\n");
        assert!(lines.contains("Cannot render settings"));
        assert!(lines.contains("predicate failed"));
    }

    #[test]
    fn selection_scrolls_into_view() {
        assert_eq!(scroll_to_fit(0, 0, 1, 5, 20), 0);
        assert_eq!(scroll_to_fit(0, 7, 8, 5, 20), 3);
        assert_eq!(scroll_to_fit(6, 2, 3, 5, 20), 2);
        assert_eq!(scroll_to_fit(18, 19, 20, 5, 20), 15);
        assert_eq!(scroll_to_fit(3, 0, 0, 0, 20), 0);
    }
}
