use crate::app::{begin_pass, end_pass, update, AppMsg, Effect};
use crate::compose::compose;
use crate::compose::node::ComposedPane;
use crate::engine::session::{Session, ValueGetter};
use crate::nav::flatten::FlatView;
use crate::services::cli_runner::spawn_chooser;
use crate::services::loader::{initial_values, load_pane};
use crate::theme::Theme;
use crate::widgets::group_list::draw_group_list;
use crate::widgets::search_bar::draw_search_bar;
use crate::widgets::settings_list::draw_settings;
use crate::widgets::snapshot_viewer::SnapshotViewer;
use crate::widgets::status_bar::draw_footer_combined;
use crate::widgets::value_editor::{EditorAction, ValueEditor};
use crate::widgets::Widget;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

// normalization converges after one extra pass; the cap guards the loop
const MAX_PASSES: usize = 8;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    #[default]
    Browse,
    Search,
    Edit,
    Snapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

/// Result of a chooser command, posted back from its worker thread.
pub(crate) struct ChooserMsg {
    pub(crate) path: String,
    pub(crate) outcome: Result<Option<String>, String>,
}

#[derive(Default)]
pub(crate) struct AppState {
    pub(crate) pane: ComposedPane,
    pub(crate) session: Session,
    pub(crate) getter: Option<ValueGetter>,
    pub(crate) view: FlatView,
    // predicate or overlay failure from the last flatten; drawn instead of rows
    pub(crate) render_error: Option<String>,
    pub(crate) selected: usize,
    pub(crate) selected_key: Option<String>,
    // subpage link to come back to
    pub(crate) return_key: Option<String>,
    pub(crate) list_offset: usize,
    pub(crate) list_viewport_h: u16,
    pub(crate) mode: Mode,
    pub(crate) editor: Option<ValueEditor>,
    pub(crate) snapshot: Option<SnapshotViewer>,
    pub(crate) status_text: Option<String>,
    pub(crate) toast: Option<Toast>,
    pub(crate) tick: u64,
    pub(crate) theme: Theme,
    pub(crate) quit: bool,
    pub(crate) saved: Option<JsonValue>,
    pub(crate) chooser_tx: Option<Sender<ChooserMsg>>,
    pub(crate) chooser_rx: Option<Receiver<ChooserMsg>>,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
}

impl AppState {
    pub(crate) fn new(pane: ComposedPane, initial: JsonValue) -> Self {
        let session = Session::new(
            initial,
            Some(Box::new(|snapshot: Rc<JsonValue>| {
                tracing::info!(values = %snapshot, "values reported");
            })),
        );
        let getter = Some(session.value_getter());
        let (tx, rx) = mpsc::channel::<ChooserMsg>();
        Self {
            pane,
            session,
            getter,
            chooser_tx: Some(tx),
            chooser_rx: Some(rx),
            ..Default::default()
        }
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }
}

fn show_toast(state: &mut AppState, text: String, level: ToastLevel, seconds: u64) {
    let ticks = seconds.saturating_mul(5); // ~200ms tick
    state.toast = Some(Toast {
        text,
        level,
        expires_at_tick: state.tick.saturating_add(ticks),
    });
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => show_toast(state, text, level, seconds),
            Effect::RunChooser {
                path,
                label,
                cmdline,
            } => {
                state.dbg(format!("chooser {path} :: {cmdline}"));
                state.status_text = Some(format!("Choosing {label}"));
                if let Some(tx) = &state.chooser_tx {
                    spawn_chooser(path, cmdline, tx.clone());
                }
            }
            Effect::CopyToClipboard(text) => {
                let copied = arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text));
                match copied {
                    Ok(()) => {
                        show_toast(state, "Copied to clipboard!".into(), ToastLevel::Success, 2)
                    }
                    Err(e) => {
                        state.dbg(format!("clipboard: {e}"));
                        show_toast(state, format!("Copy failed: {e}"), ToastLevel::Error, 3);
                    }
                }
            }
        }
    }
}

fn dispatch(state: &mut AppState, msg: AppMsg) {
    let effects = update(state, msg);
    run_effects(state, effects);
}

fn pump_chooser(state: &mut AppState) {
    let mut drained: Vec<ChooserMsg> = Vec::new();
    if let Some(rx) = &state.chooser_rx {
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
    }
    for msg in drained {
        dispatch(
            state,
            AppMsg::ChooserDone {
                path: msg.path,
                outcome: msg.outcome,
            },
        );
    }
}

/// Translate a key into a message for the current mode. Editor and viewer
/// keys that only move their own cursor are consumed here.
pub(crate) fn key_to_msg(state: &mut AppState, key: KeyEvent) -> Option<AppMsg> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match state.mode {
        Mode::Edit => {
            let Some(editor) = state.editor.as_mut() else {
                return Some(AppMsg::CancelEdit);
            };
            match editor.input(key) {
                EditorAction::Continue => None,
                EditorAction::Commit(text) => Some(AppMsg::CommitEdit { text }),
                EditorAction::Cancel => Some(AppMsg::CancelEdit),
            }
        }
        Mode::Snapshot => match key.code {
            KeyCode::Char('c') if ctrl => Some(AppMsg::CopySnapshot),
            KeyCode::F(2) | KeyCode::Esc | KeyCode::Char('q') => Some(AppMsg::ToggleSnapshot),
            code => {
                if let Some(viewer) = &mut state.snapshot {
                    let effects = viewer.on_key(code);
                    run_effects(state, effects);
                }
                None
            }
        },
        Mode::Search => match key.code {
            KeyCode::Enter => Some(AppMsg::CommitSearch),
            KeyCode::Esc => Some(AppMsg::ClearSearch),
            KeyCode::Up => Some(AppMsg::MoveCursor(-1)),
            KeyCode::Down => Some(AppMsg::MoveCursor(1)),
            KeyCode::Backspace => {
                let mut text = state.session.search_text().to_string();
                text.pop();
                Some(AppMsg::SearchInput(text))
            }
            KeyCode::Char(c) if !ctrl => {
                let mut text = state.session.search_text().to_string();
                text.push(c);
                Some(AppMsg::SearchInput(text))
            }
            _ => None,
        },
        Mode::Browse => match key.code {
            KeyCode::Char('s') if ctrl => Some(AppMsg::Save),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(AppMsg::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(AppMsg::MoveCursor(-1)),
            KeyCode::Down | KeyCode::Char('j') => Some(AppMsg::MoveCursor(1)),
            KeyCode::PageUp => Some(AppMsg::PageCursor(-1)),
            KeyCode::PageDown => Some(AppMsg::PageCursor(1)),
            KeyCode::Enter | KeyCode::Char(' ') => Some(AppMsg::Activate),
            KeyCode::Left | KeyCode::Char('h') => Some(AppMsg::CycleOption(-1)),
            KeyCode::Right | KeyCode::Char('l') => Some(AppMsg::CycleOption(1)),
            KeyCode::Char('/') => Some(AppMsg::BeginSearch),
            KeyCode::Esc | KeyCode::Backspace => Some(AppMsg::Back),
            KeyCode::Tab | KeyCode::Char(']') => Some(AppMsg::NextGroup),
            KeyCode::BackTab | KeyCode::Char('[') => Some(AppMsg::PrevGroup),
            KeyCode::F(2) => Some(AppMsg::ToggleSnapshot),
            KeyCode::Char(c @ '1'..='9') => Some(AppMsg::SelectGroup(c as usize - '1' as usize)),
            _ => None,
        },
    }
}

/// One render pass per iteration, plus follow-up passes while deferred
/// normalizations keep changing the tree.
fn render_passes<B: Backend>(terminal: &mut Terminal<B>, state: &mut AppState) -> Result<()> {
    for _ in 0..MAX_PASSES {
        begin_pass(state);
        terminal.draw(|f| ui(f, state))?;
        if !end_pass(state) {
            break;
        }
    }
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    let loaded = load_pane()?;
    let initial = initial_values(&loaded)?;
    let pane = compose(&loaded.spec)
        .with_context(|| format!("composing {}", loaded.source.display()))?;
    let mut state = AppState::new(pane, initial);
    state.theme = Theme::from_env();
    state.dbg(format!("loaded {}", loaded.source.display()));

    // Headless smoke mode
    let headless = env_flag("SETTINGS_PANE_HEADLESS");
    let headless_ticks: u64 = std::env::var("SETTINGS_PANE_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    let headless_search: Option<String> = std::env::var("SETTINGS_PANE_SEARCH").ok();
    let headless_summary = env_flag("SETTINGS_PANE_SMOKE_SUMMARY");
    if headless {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend)?;
        if let Some(text) = headless_search {
            dispatch(&mut state, AppMsg::SearchInput(text));
        }
        for _ in 0..headless_ticks {
            render_passes(&mut terminal, &mut state)?;
            pump_chooser(&mut state);
            state.tick = state.tick.wrapping_add(1);
        }
        if headless_summary {
            let summary = serde_json::json!({
                "ok": state.render_error.is_none(),
                "error": state.render_error,
                "groups": state.pane.groups.len(),
                "rows": state.view.rows.len(),
                "controls": state.view.control_rows().count(),
                "reports": state.session.report_count(),
                "search": state.session.search_text(),
                "shadowed": state.session.shadow().to_json(),
                "values": state.getter.as_ref().map(|g| g()),
            });
            println!("{summary}");
        }
        return Ok(());
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res: Result<()> = loop {
        if let Err(e) = render_passes(&mut terminal, &mut state) {
            break Err(e);
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(msg) = key_to_msg(&mut state, key) {
                        dispatch(&mut state, msg);
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        pump_chooser(&mut state);
        if state.quit {
            break Ok(());
        }
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res?;
    if let Some(saved) = &state.saved {
        println!("{}", serde_json::to_string_pretty(saved)?);
    }
    Ok(())
}

fn help_text(state: &AppState) -> &'static str {
    match state.mode {
        Mode::Browse if state.session.focus().is_top() => {
            "↑/↓ Move • Enter Toggle/Edit • ←/→ Cycle • / Search • Tab Group • F2 Snapshot • Ctrl+S Save • q Quit"
        }
        Mode::Browse => "↑/↓ Move • Enter Activate • Esc Back • / Search • F2 Snapshot • Ctrl+S Save • q Quit",
        Mode::Search => "Type to filter • Enter Keep • Esc Clear • ↑/↓ Move",
        Mode::Edit => "Enter Save • Esc Cancel",
        Mode::Snapshot => "↑/↓ PgUp/PgDn Scroll • w Wrap • Ctrl+C Copy • F2/Esc Close",
    }
}

fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }

    let screen = f.area();
    let bg = Block::default().style(Style::default().bg(state.theme.bg).fg(state.theme.fg));
    f.render_widget(bg, screen);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(screen);
    let body = rows[0];

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(20)])
        .split(body);
    draw_group_list(f, cols[0], state);

    let right = if state.pane.show_search {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(cols[1]);
        draw_search_bar(f, parts[0], state);
        parts[1]
    } else {
        cols[1]
    };
    draw_settings(f, right, state);

    draw_debug(f, rows[1], state);
    let help = help_text(state);
    draw_footer_combined(f, rows[2], state, help);

    if let Some(viewer) = &mut state.snapshot {
        let area = body.inner(Margin {
            horizontal: 4,
            vertical: 1,
        });
        viewer.render(f, area, true, state.tick);
    }
    if let Some(editor) = &mut state.editor {
        editor.render(f, screen);
    }
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height.saturating_sub(1) as usize;
    let total = state.debug_log.len();
    let start = total.saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}
