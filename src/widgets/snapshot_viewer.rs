use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::theme::Theme as UiTheme;
use crate::widgets::chrome::panel_block;

/// Read-only view of the last reported value tree.
pub struct SnapshotViewer {
    pub title: String,
    pub text: String,
    lines: Vec<Line<'static>>,
    pub scroll_y: u16,
    pub wrap: bool,
    last_viewport_h: u16,
    theme: UiTheme,
}

impl SnapshotViewer {
    pub fn new(title: impl Into<String>, value: &JsonValue, theme: UiTheme) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        let lines = highlight_code(&text, Some("json"));
        Self {
            title: title.into(),
            text,
            lines,
            scroll_y: 0,
            wrap: false,
            last_viewport_h: 0,
            theme,
        }
    }

    /// Swap in a newer snapshot, keeping the scroll position where possible.
    pub fn set_value(&mut self, value: &JsonValue) {
        self.text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.lines = highlight_code(&self.text, Some("json"));
    }
}

// ---------------- Syntax highlighting helpers ----------------
static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn get_theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let ts = THEME_SET.get_or_init(ThemeSet::load_defaults);
        ts.themes
            .get("base16-ocean.dark")
            .cloned()
            .unwrap_or_else(|| ts.themes.values().next().cloned().unwrap_or_default())
    })
}

fn syn_to_tui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

fn highlight_code(code: &str, lang: Option<&str>) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let syn = match lang {
        Some(l) if !l.is_empty() => ps
            .find_syntax_by_token(l)
            .unwrap_or_else(|| ps.find_syntax_plain_text()),
        _ => ps.find_syntax_plain_text(),
    };
    let mut high = HighlightLines::new(syn, get_theme());
    let mut out: Vec<Line<'static>> = Vec::new();
    for line in code.split('\n') {
        let regions: Vec<(SynStyle, &str)> = high.highlight_line(line, ps).unwrap_or_default();
        if regions.is_empty() {
            out.push(Line::from(line.to_string()));
            continue;
        }
        let spans: Vec<Span<'static>> = regions
            .into_iter()
            .map(|(st, seg)| {
                let mut style = Style::default().fg(syn_to_tui_color(st.foreground));
                if st
                    .font_style
                    .contains(syntect::highlighting::FontStyle::BOLD)
                {
                    style = style.add_modifier(Modifier::BOLD);
                }
                Span::styled(seg.to_string(), style)
            })
            .collect();
        out.push(Line::from(spans));
    }
    out
}

impl crate::widgets::Widget for SnapshotViewer {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        f.render_widget(Clear, area);
        self.last_viewport_h = area.height.saturating_sub(2);
        let total_lines = self.lines.len() as u16;
        let max_scroll = total_lines.saturating_sub(self.last_viewport_h);
        if self.scroll_y > max_scroll {
            self.scroll_y = max_scroll;
        }
        let title = format!("{} · Ctrl+C Copy · F2/Esc Close", self.title);
        let block = panel_block(&title, focused, &self.theme);
        let mut p = Paragraph::new(self.lines.clone())
            .block(block)
            .scroll((self.scroll_y, 0));
        if self.wrap {
            p = p.wrap(Wrap { trim: false });
        }
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<crate::app::Effect> {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll_y = self.scroll_y.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll_y = self.scroll_y.saturating_add(1);
            }
            KeyCode::PageUp => {
                self.scroll_y = self.scroll_y.saturating_sub(self.last_viewport_h);
            }
            KeyCode::PageDown => {
                self.scroll_y = self.scroll_y.saturating_add(self.last_viewport_h);
            }
            KeyCode::Home => {
                self.scroll_y = 0;
            }
            KeyCode::End => {
                self.scroll_y = (self.lines.len() as u16).saturating_sub(self.last_viewport_h);
            }
            KeyCode::Char('w') | KeyCode::Char('W') => {
                self.wrap = !self.wrap;
            }
            _ => {}
        }
        Vec::new()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
