use crate::compose::node::{ControlKind, InputKind};
use crate::engine::overlay::Binding;
use crate::engine::path::value_text;
use crate::engine::EngineError;
use crate::nav::flatten::{flatten, FlatRow, FlatView, RowKind};
use crate::nav::keys::group_of;
use crate::services::cli_runner::chooser_cmdline;
use crate::ui::{AppState, Mode, ToastLevel};
use crate::widgets::snapshot_viewer::SnapshotViewer;
use crate::widgets::value_editor::ValueEditor;
use serde_json::Value as JsonValue;

pub enum AppMsg {
    MoveCursor(i32),
    PageCursor(i32),
    Activate,
    CycleOption(i32),
    NextGroup,
    PrevGroup,
    SelectGroup(usize),
    BeginSearch,
    SearchInput(String),
    CommitSearch,
    ClearSearch,
    Back,
    CommitEdit {
        text: String,
    },
    CancelEdit,
    ChooserDone {
        path: String,
        outcome: Result<Option<String>, String>,
    },
    ToggleSnapshot,
    CopySnapshot,
    Save,
    Quit,
}

pub enum Effect {
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    RunChooser {
        path: String,
        label: String,
        cmdline: String,
    },
    CopyToClipboard(String),
}

fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds: 3,
    }
}

/// First half of a render pass: report the tree if it changed since the last
/// pass, then rebuild the visible rows.
pub fn begin_pass(state: &mut AppState) {
    if let Some(report) = state.session.begin_render() {
        let keys = report.as_object().map_or(0, |m| m.len());
        state.dbg(format!(
            "report #{}: {keys} top-level keys",
            state.session.report_count()
        ));
        if let Some(viewer) = &mut state.snapshot {
            viewer.set_value(&report);
        }
    }
    let pane = &state.pane;
    match state.session.render(|ctx| flatten(pane, ctx)) {
        Ok(view) => {
            state.view = view;
            state.render_error = None;
        }
        Err(e) => {
            let msg = format!("{:#}", anyhow::Error::new(e));
            if state.render_error.as_deref() != Some(msg.as_str()) {
                tracing::warn!(error = %msg, "render failed");
                state.dbg(format!("render failed: {msg}"));
            }
            state.view = FlatView::default();
            state.render_error = Some(msg);
        }
    }
    restore_selection(state);
}

/// Second half: apply deferred normalizations. `true` asks for another pass.
pub fn end_pass(state: &mut AppState) -> bool {
    match state.session.end_render() {
        Ok(0) => false,
        Ok(n) => {
            state.dbg(format!("normalized {n} unset boolean(s) to false"));
            true
        }
        Err(EngineError::Normalize { written, failures }) => {
            for e in &failures {
                tracing::warn!(error = %e, "normalization failed");
                state.dbg(format!("normalization failed: {e}"));
            }
            if written > 0 {
                state.dbg(format!("normalized {written} unset boolean(s) to false"));
            }
            written > 0
        }
        Err(e) => {
            tracing::warn!(error = %e, "normalization failed");
            state.dbg(format!("normalization failed: {e}"));
            false
        }
    }
}

fn restore_selection(state: &mut AppState) {
    let view = &state.view;
    let by_key = state
        .selected_key
        .as_deref()
        .and_then(|k| view.position_of(k))
        .filter(|&i| view.rows[i].is_selectable());
    let idx = match by_key {
        Some(i) => Some(i),
        None if state.selected_key.is_some() && !view.rows.is_empty() => {
            // the row went away; stay close to where it was
            let at = state.selected.min(view.rows.len() - 1);
            if view.rows[at].is_selectable() {
                Some(at)
            } else {
                let down = view.step(at, 1);
                let up = view.step(at, -1);
                [down, up]
                    .into_iter()
                    .find(|&i| view.rows[i].is_selectable())
                    .or_else(|| view.first_selectable())
            }
        }
        None => view.first_selectable(),
    };
    if let Some(i) = idx {
        state.selected = i;
        state.selected_key = Some(view.rows[i].key.clone());
    } else {
        state.selected = 0;
        state.list_offset = 0;
    }
}

fn selected_row(state: &AppState) -> Option<FlatRow> {
    state
        .view
        .rows
        .get(state.selected)
        .filter(|r| r.is_selectable())
        .cloned()
}

fn move_cursor(state: &mut AppState, delta: i32) {
    if state.view.rows.is_empty() {
        return;
    }
    let next = state.view.step(state.selected, delta);
    state.selected = next;
    state.selected_key = Some(state.view.rows[next].key.clone());
}

fn select_group(state: &mut AppState, index: usize) {
    if index >= state.pane.groups.len() || index == state.session.current_group() {
        return;
    }
    if !state.session.focus().is_top() {
        state.session.back();
        state.return_key = None;
    }
    state.session.select_group(index);
    state.selected_key = None;
    state.list_offset = 0;
    let label = state.pane.groups[index].label.clone();
    state.dbg(format!("group: {label}"));
}

fn step_group(state: &mut AppState, delta: i64) {
    let n = state.pane.groups.len();
    if n == 0 {
        return;
    }
    let cur = state.session.current_group() as i64;
    let next = (cur + delta).rem_euclid(n as i64) as usize;
    select_group(state, next);
}

fn leave_subpage(state: &mut AppState) {
    if let Some(p) = state.session.focus().focused() {
        let p = p.to_string();
        state.session.back();
        state.selected_key = state.return_key.take();
        state.dbg(format!("back from subpage {p}"));
    }
}

fn write_value(state: &mut AppState, binding: &Binding, value: JsonValue) -> Option<Effect> {
    match state.session.write(binding, value) {
        Ok(()) => None,
        Err(e) => {
            state.dbg(format!("write failed: {e}"));
            Some(toast(e.to_string(), ToastLevel::Error))
        }
    }
}

fn parse_input(input: InputKind, text: &str) -> Result<JsonValue, String> {
    match input {
        InputKind::Number => {
            let t = text.trim();
            match serde_json::from_str::<JsonValue>(t) {
                Ok(v @ JsonValue::Number(_)) => Ok(v),
                _ => Err(format!("'{t}' is not a number")),
            }
        }
        InputKind::Email => {
            if text.is_empty() || text.contains('@') {
                Ok(JsonValue::String(text.to_string()))
            } else {
                Err(format!("'{text}' is not an email address"))
            }
        }
        InputKind::Text => Ok(JsonValue::String(text.to_string())),
    }
}

fn activate(state: &mut AppState) -> Vec<Effect> {
    let mut effects = Vec::new();
    let Some(row) = selected_row(state) else {
        return effects;
    };
    if row.disabled {
        state.dbg(format!("{} is disabled", row.key));
        return effects;
    }
    match row.kind {
        RowKind::Control {
            control,
            binding,
            value,
        } => match &control.kind {
            ControlKind::Boolean { .. } => {
                let next = !value.as_bool().unwrap_or(false);
                effects.extend(write_value(state, &binding, JsonValue::Bool(next)));
            }
            ControlKind::Input { input, .. } => {
                state.editor = Some(ValueEditor::new(
                    binding,
                    control.label.clone(),
                    *input,
                    &value_text(&value),
                ));
                state.mode = Mode::Edit;
            }
            ControlKind::Select { .. }
            | ControlKind::RadioGroup { .. }
            | ControlKind::ToggleGroup { .. } => {
                effects.extend(cycle_option(state, 1));
            }
            ControlKind::Chooser { command, .. } => {
                match chooser_cmdline(command, &value) {
                    Ok(cmdline) => effects.push(Effect::RunChooser {
                        path: control.path.clone(),
                        label: control.label.clone(),
                        cmdline,
                    }),
                    Err(e) => effects.push(toast(format!("{e:#}"), ToastLevel::Error)),
                }
            }
        },
        RowKind::SubPageLink { label, path, .. } => {
            if state.session.search().is_some() {
                state.session.clear_search();
                state.mode = Mode::Browse;
            }
            if let Some(gi) = group_of(&row.key) {
                state.session.select_group(gi);
            }
            state.return_key = Some(row.key.clone());
            state.session.open_subpage(&path);
            state.selected_key = None;
            state.list_offset = 0;
            state.dbg(format!("open subpage {label} ({path})"));
        }
        RowKind::BackBar { .. } => leave_subpage(state),
        _ => {}
    }
    effects
}

fn cycle_option(state: &mut AppState, delta: i32) -> Vec<Effect> {
    let mut effects = Vec::new();
    let Some(row) = selected_row(state) else {
        return effects;
    };
    if row.disabled {
        return effects;
    }
    let RowKind::Control { control, binding, .. } = row.kind else {
        return effects;
    };
    if let ControlKind::Boolean { .. } = control.kind {
        effects.extend(write_value(state, &binding, JsonValue::Bool(delta > 0)));
        return effects;
    }
    let Some(options) = control.options().filter(|o| !o.is_empty()) else {
        return effects;
    };
    // the row may predate a write made since the last pass
    let current = state.session.read(&binding);
    let n = options.len() as i64;
    let next = match options.iter().position(|o| o.value == current) {
        Some(i) => (i as i64 + delta as i64).rem_euclid(n) as usize,
        None if delta > 0 => 0,
        None => (n - 1) as usize,
    };
    let chosen = options[next].value.clone();
    effects.extend(write_value(state, &binding, chosen));
    effects
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        MoveCursor(delta) => move_cursor(state, delta),
        PageCursor(delta) => {
            let steps = (state.list_viewport_h / 2).max(1);
            for _ in 0..steps {
                move_cursor(state, delta.signum());
            }
        }
        Activate => effects.extend(activate(state)),
        CycleOption(delta) => effects.extend(cycle_option(state, delta)),
        NextGroup => step_group(state, 1),
        PrevGroup => step_group(state, -1),
        SelectGroup(i) => select_group(state, i),
        BeginSearch => {
            if state.pane.show_search {
                state.mode = Mode::Search;
            }
        }
        SearchInput(text) => {
            state.session.set_search(&text);
            state.selected_key = None;
            state.list_offset = 0;
        }
        CommitSearch => state.mode = Mode::Browse,
        ClearSearch => {
            state.session.clear_search();
            state.mode = Mode::Browse;
            state.selected_key = None;
            state.list_offset = 0;
        }
        Back => {
            if state.session.search().is_some() {
                effects.extend(update(state, ClearSearch));
            } else {
                leave_subpage(state);
            }
        }
        CommitEdit { text } => {
            let Some(editor) = state.editor.as_mut() else {
                state.mode = Mode::Browse;
                return effects;
            };
            match parse_input(editor.input, &text) {
                Ok(value) => {
                    let binding = editor.binding.clone();
                    let label = editor.label.clone();
                    state.editor = None;
                    state.mode = Mode::Browse;
                    match write_value(state, &binding, value) {
                        Some(err) => effects.push(err),
                        None => state.dbg(format!("{label} = {text}")),
                    }
                }
                Err(msg) => {
                    editor.error = Some(msg.clone());
                    effects.push(toast(msg, ToastLevel::Error));
                }
            }
        }
        CancelEdit => {
            state.editor = None;
            state.mode = Mode::Browse;
        }
        ChooserDone { path, outcome } => {
            state.status_text = None;
            match outcome {
                Ok(Some(picked)) => {
                    let binding = Binding::real(&path);
                    match write_value(state, &binding, JsonValue::String(picked.clone())) {
                        Some(err) => effects.push(err),
                        None => {
                            state.dbg(format!("chooser {path} -> {picked}"));
                            effects.push(toast(format!("{path} updated"), ToastLevel::Success));
                        }
                    }
                }
                Ok(None) => state.dbg(format!("chooser {path} cancelled")),
                Err(e) => {
                    state.dbg(format!("chooser {path} failed: {e}"));
                    effects.push(toast(format!("Chooser failed: {e}"), ToastLevel::Error));
                }
            }
        }
        ToggleSnapshot => {
            if state.mode == Mode::Snapshot {
                state.snapshot = None;
                state.mode = Mode::Browse;
            } else {
                let last = state.session.last_reported();
                state.snapshot = Some(SnapshotViewer::new(
                    "Last report",
                    &last,
                    state.theme.clone(),
                ));
                state.mode = Mode::Snapshot;
            }
        }
        CopySnapshot => {
            if let Some(viewer) = &state.snapshot {
                effects.push(Effect::CopyToClipboard(viewer.text.clone()));
            }
        }
        Save => {
            let getter = state
                .getter
                .clone()
                .unwrap_or_else(|| state.session.value_getter());
            state.saved = Some(getter());
            state.quit = true;
            tracing::info!("values saved");
        }
        Quit => state.quit = true,
    }
    effects
}

#[cfg(test)]
mod tests;
