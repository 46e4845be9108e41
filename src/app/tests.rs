use super::*;
use crate::compose::compose;
use crate::model::PaneSpec;
use serde_json::json;

fn state(spec: JsonValue, values: JsonValue) -> AppState {
    let spec: PaneSpec = serde_json::from_value(spec).unwrap();
    let mut st = AppState::new(compose(&spec).unwrap(), values);
    settle(&mut st);
    st
}

// Run passes until normalization stops asking for more.
fn settle(st: &mut AppState) {
    loop {
        begin_pass(st);
        if !end_pass(st) {
            break;
        }
    }
}

fn select_label(st: &mut AppState, label: &str) {
    let i = st
        .view
        .rows
        .iter()
        .position(|r| match &r.kind {
            RowKind::Control { control, .. } => control.label == label,
            RowKind::SubPageLink { label: l, .. } => l == label,
            _ => false,
        })
        .unwrap_or_else(|| panic!("no row labelled {label}"));
    st.selected = i;
    st.selected_key = Some(st.view.rows[i].key.clone());
}

fn has_error_toast(effects: &[Effect]) -> bool {
    effects.iter().any(|e| {
        matches!(
            e,
            Effect::ShowToast {
                level: ToastLevel::Error,
                ..
            }
        )
    })
}

#[test]
fn toggling_a_boolean_writes_and_reports() {
    let mut st = state(
        json!({"groups": [{"label": "Editor", "children": [
            {"type": "boolean", "path": "editor.wrap", "label": "Wrap"}
        ]}]}),
        json!({}),
    );
    // the unset boolean was normalized and reported once
    assert_eq!(*st.session.tree(), json!({"editor": {"wrap": false}}));
    assert_eq!(st.session.report_count(), 1);

    select_label(&mut st, "Wrap");
    let effects = update(&mut st, AppMsg::Activate);
    assert!(effects.is_empty());
    settle(&mut st);
    assert_eq!(st.session.report_count(), 2);
    assert_eq!(*st.session.last_reported(), json!({"editor": {"wrap": true}}));
}

#[test]
fn unwritable_boolean_does_not_block_other_normalizations() {
    let st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "boolean", "path": "flags[4000000000]", "label": "Far flag"},
            {"type": "boolean", "path": "near", "label": "Near flag"}
        ]}]}),
        json!({"flags": []}),
    );
    assert_eq!(*st.session.tree(), json!({"flags": [], "near": false}));
    assert!(st
        .debug_log
        .iter()
        .any(|l| l.starts_with("normalization failed")));
}

#[test]
fn number_input_refuses_non_numbers() {
    let mut st = state(
        json!({"groups": [{"label": "Editor", "children": [
            {"type": "input", "path": "tabs", "label": "Tab size", "input": "number"}
        ]}]}),
        json!({"tabs": 4}),
    );
    select_label(&mut st, "Tab size");
    let _ = update(&mut st, AppMsg::Activate);
    assert_eq!(st.mode, Mode::Edit);
    assert_eq!(st.editor.as_ref().map(|e| e.text()), Some("4".to_string()));

    let effects = update(&mut st, AppMsg::CommitEdit { text: "four".into() });
    assert!(has_error_toast(&effects));
    assert_eq!(st.mode, Mode::Edit);
    assert!(st.editor.as_ref().and_then(|e| e.error.as_ref()).is_some());
    assert_eq!(*st.session.tree(), json!({"tabs": 4}));

    let effects = update(&mut st, AppMsg::CommitEdit { text: " 8 ".into() });
    assert!(effects.is_empty());
    assert_eq!(st.mode, Mode::Browse);
    assert!(st.editor.is_none());
    assert_eq!(*st.session.tree(), json!({"tabs": 8}));
}

#[test]
fn cancel_edit_leaves_value_alone() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "input", "path": "name", "label": "Name"}
        ]}]}),
        json!({"name": "old"}),
    );
    select_label(&mut st, "Name");
    let _ = update(&mut st, AppMsg::Activate);
    let _ = update(&mut st, AppMsg::CancelEdit);
    assert_eq!(st.mode, Mode::Browse);
    assert_eq!(*st.session.tree(), json!({"name": "old"}));
}

#[test]
fn forced_row_is_disabled_and_ignores_activation() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "boolean", "path": "spell.check", "label": "Spell check", "disabled_value": true}
        ]}]}),
        json!({"spell": {"check": false}}),
    );
    let row = st.view.control_rows().next().cloned().unwrap();
    assert!(row.disabled);
    match &row.kind {
        RowKind::Control { value, binding, .. } => {
            assert_eq!(value, &json!(true));
            assert!(binding.is_shadow());
        }
        _ => panic!("expected a control row"),
    }
    select_label(&mut st, "Spell check");
    let _ = update(&mut st, AppMsg::Activate);
    let _ = update(&mut st, AppMsg::CycleOption(-1));
    settle(&mut st);
    assert_eq!(*st.session.tree(), json!({"spell": {"check": false}}));
    assert_eq!(st.session.report_count(), 0);
}

#[test]
fn subpage_round_trip_restores_selection() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "boolean", "path": "a", "label": "Alpha"},
            {"type": "subpage", "path": "fonts", "label": "Fonts", "children": [
                {"type": "input", "path": "fonts.size", "label": "Size"}
            ]}
        ]}]}),
        json!({"a": true}),
    );
    select_label(&mut st, "Fonts");
    let _ = update(&mut st, AppMsg::Activate);
    settle(&mut st);
    assert_eq!(st.session.focus().focused(), Some("fonts"));
    assert!(matches!(st.view.rows[st.selected].kind, RowKind::BackBar { .. }));
    assert!(st.view.control_rows().all(|r| match &r.kind {
        RowKind::Control { control, .. } => control.label == "Size",
        _ => false,
    }));

    let _ = update(&mut st, AppMsg::Back);
    settle(&mut st);
    assert!(st.session.focus().is_top());
    assert!(matches!(
        &st.view.rows[st.selected].kind,
        RowKind::SubPageLink { label, .. } if label == "Fonts"
    ));
}

#[test]
fn search_filters_and_back_clears_it() {
    let mut st = state(
        json!({"groups": [
            {"label": "Editor", "children": [
                {"type": "input", "path": "font.size", "label": "Font size"},
                {"type": "boolean", "path": "wrap", "label": "Wrap"}
            ]},
            {"label": "Terminal", "children": [
                {"type": "input", "path": "term.font_size", "label": "Terminal font size"}
            ]}
        ]}),
        json!({"wrap": false}),
    );
    let _ = update(&mut st, AppMsg::BeginSearch);
    assert_eq!(st.mode, Mode::Search);
    let _ = update(&mut st, AppMsg::SearchInput("SIZE".into()));
    settle(&mut st);
    assert_eq!(st.view.control_rows().count(), 2);

    let _ = update(&mut st, AppMsg::CommitSearch);
    assert_eq!(st.mode, Mode::Browse);
    assert!(st.session.search().is_some());

    let _ = update(&mut st, AppMsg::Back);
    settle(&mut st);
    assert!(st.session.search().is_none());
    assert_eq!(st.view.control_rows().count(), 2);
}

#[test]
fn opening_a_subpage_from_search_switches_to_its_group() {
    let mut st = state(
        json!({"groups": [
            {"label": "General", "children": [
                {"type": "input", "path": "lang", "label": "Language"}
            ]},
            {"label": "Appearance", "children": [
                {"type": "subpage", "path": "font", "label": "Fonts", "children": [
                    {"type": "input", "path": "font.size", "label": "Font size"}
                ]}
            ]}
        ]}),
        json!({}),
    );
    assert_eq!(st.session.current_group(), 0);
    let _ = update(&mut st, AppMsg::SearchInput("font".into()));
    settle(&mut st);
    select_label(&mut st, "Fonts");
    let _ = update(&mut st, AppMsg::Activate);
    settle(&mut st);

    assert!(st.session.search().is_none());
    assert_eq!(st.session.current_group(), 1);
    assert_eq!(st.session.focus().focused(), Some("font"));
    assert!(st
        .view
        .rows
        .iter()
        .any(|r| matches!(r.kind, RowKind::BackBar { .. })));
    assert_eq!(st.view.control_rows().count(), 1);
}

#[test]
fn cycling_options_wraps_both_ways() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "select", "path": "theme", "label": "Theme", "options": ["a", "b", "c"]}
        ]}]}),
        json!({"theme": "c"}),
    );
    select_label(&mut st, "Theme");
    let _ = update(&mut st, AppMsg::CycleOption(1));
    assert_eq!(st.session.tree()["theme"], json!("a"));
    let _ = update(&mut st, AppMsg::CycleOption(-1));
    assert_eq!(st.session.tree()["theme"], json!("c"));
    settle(&mut st);
    let _ = update(&mut st, AppMsg::Activate);
    assert_eq!(st.session.tree()["theme"], json!("a"));
}

#[test]
fn unknown_current_value_cycles_from_the_ends() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "radio_group", "path": "mode", "label": "Mode", "options": [1, 2, 3]}
        ]}]}),
        json!({}),
    );
    select_label(&mut st, "Mode");
    let _ = update(&mut st, AppMsg::CycleOption(-1));
    assert_eq!(st.session.tree()["mode"], json!(3));
}

#[test]
fn group_navigation_wraps_and_ignores_out_of_range() {
    let mut st = state(
        json!({"groups": [
            {"label": "One", "children": []},
            {"label": "Two", "children": []},
            {"label": "Three", "children": []}
        ]}),
        json!({}),
    );
    let _ = update(&mut st, AppMsg::PrevGroup);
    assert_eq!(st.session.current_group(), 2);
    let _ = update(&mut st, AppMsg::NextGroup);
    assert_eq!(st.session.current_group(), 0);
    let _ = update(&mut st, AppMsg::SelectGroup(1));
    assert_eq!(st.session.current_group(), 1);
    let _ = update(&mut st, AppMsg::SelectGroup(7));
    assert_eq!(st.session.current_group(), 1);
}

#[test]
fn activating_a_chooser_quotes_the_current_value() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": [
            {"type": "chooser", "path": "dir", "label": "Folder",
             "button_label": "Browse", "command": "pick-folder {value}"}
        ]}]}),
        json!({"dir": "/a b"}),
    );
    select_label(&mut st, "Folder");
    let effects = update(&mut st, AppMsg::Activate);
    match effects.as_slice() {
        [Effect::RunChooser { path, cmdline, .. }] => {
            assert_eq!(path, "dir");
            assert_eq!(shlex::split(cmdline).unwrap(), vec!["pick-folder", "/a b"]);
        }
        _ => panic!("expected a single RunChooser effect"),
    }
}

#[test]
fn chooser_results_are_applied() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": []}]}),
        json!({"dir": "/old"}),
    );
    st.status_text = Some("Choosing".into());
    let _ = update(
        &mut st,
        AppMsg::ChooserDone {
            path: "dir".into(),
            outcome: Ok(None),
        },
    );
    assert!(st.status_text.is_none());
    assert_eq!(st.session.tree()["dir"], json!("/old"));

    let _ = update(
        &mut st,
        AppMsg::ChooserDone {
            path: "dir".into(),
            outcome: Ok(Some("/new".into())),
        },
    );
    assert_eq!(st.session.tree()["dir"], json!("/new"));

    let effects = update(
        &mut st,
        AppMsg::ChooserDone {
            path: "dir".into(),
            outcome: Err("exit status 1".into()),
        },
    );
    assert!(has_error_toast(&effects));
    assert_eq!(st.session.tree()["dir"], json!("/new"));
}

#[test]
fn save_pulls_the_tree_without_the_reserved_root() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": []}]}),
        json!({"keep": 1, "disabledValue$": {"x": true}}),
    );
    let _ = update(&mut st, AppMsg::Save);
    assert!(st.quit);
    assert_eq!(st.saved, Some(json!({"keep": 1})));
}

#[test]
fn snapshot_toggles_and_copies() {
    let mut st = state(
        json!({"groups": [{"label": "G", "children": []}]}),
        json!({"k": "v"}),
    );
    let _ = update(&mut st, AppMsg::ToggleSnapshot);
    assert_eq!(st.mode, Mode::Snapshot);
    let effects = update(&mut st, AppMsg::CopySnapshot);
    match effects.as_slice() {
        [Effect::CopyToClipboard(text)] => assert!(text.contains("\"k\": \"v\"")),
        _ => panic!("expected a clipboard effect"),
    }
    let _ = update(&mut st, AppMsg::ToggleSnapshot);
    assert_eq!(st.mode, Mode::Browse);
    assert!(st.snapshot.is_none());
}

#[test]
fn quit_does_not_save() {
    let mut st = state(json!({"groups": [{"label": "G", "children": []}]}), json!({}));
    let _ = update(&mut st, AppMsg::Quit);
    assert!(st.quit);
    assert!(st.saved.is_none());
}
