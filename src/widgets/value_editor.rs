use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use tui_textarea::TextArea;

use crate::compose::node::InputKind;
use crate::engine::overlay::Binding;

/// What the host should do after a key went to the editor.
#[derive(Debug, PartialEq)]
pub enum EditorAction {
    Continue,
    Commit(String),
    Cancel,
}

/// Single-line popup editor for `input` controls.
pub struct ValueEditor {
    pub binding: Binding,
    pub label: String,
    pub input: InputKind,
    pub error: Option<String>,
    ta: TextArea<'static>,
}

impl ValueEditor {
    pub fn new(binding: Binding, label: impl Into<String>, input: InputKind, text: &str) -> Self {
        let label = label.into();
        let mut ta = TextArea::default();
        if !text.is_empty() {
            ta.insert_str(text);
        }
        let kind = match input {
            InputKind::Text => "text",
            InputKind::Number => "number",
            InputKind::Email => "email",
        };
        ta.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Editing: {label} ({kind}) · Enter Save · Esc Cancel")),
        );
        Self {
            binding,
            label,
            input,
            error: None,
            ta,
        }
    }

    pub fn text(&self) -> String {
        self.ta.lines().join("")
    }

    pub fn input(&mut self, key: KeyEvent) -> EditorAction {
        match key.code {
            KeyCode::Enter => return EditorAction::Commit(self.text()),
            KeyCode::Esc => return EditorAction::Cancel,
            _ => {}
        }
        if let Some(ev) = to_textarea_event(key) {
            self.error = None;
            let _ = self.ta.input(ev);
        }
        EditorAction::Continue
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let rect = centered_rect(60, area, 5);
        f.render_widget(Clear, rect);
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(rect);
        f.render_widget(&self.ta, parts[0]);
        if let Some(err) = &self.error {
            let p = Paragraph::new(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(Color::Red),
            )));
            f.render_widget(p, parts[1]);
        }
    }
}

// tui-textarea speaks ratatui's crossterm; map ours across.
fn to_textarea_event(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        _ => return None,
    };
    let mut mods = rt_event::KeyModifiers::NONE;
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= rt_event::KeyModifiers::CONTROL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods |= rt_event::KeyModifiers::ALT;
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        mods |= rt_event::KeyModifiers::SHIFT;
    }
    Some(rt_event::KeyEvent::new(code, mods))
}

fn centered_rect(percent_x: u16, area: Rect, height: u16) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(v[1]);
    h[1]
}
