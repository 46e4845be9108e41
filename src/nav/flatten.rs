use crate::compose::node::{ComposedPane, Container, Control, ControlKind, Node};
use crate::engine::overlay::Binding;
use crate::engine::path::{self, Path};
use crate::engine::predicate::Gate;
use crate::engine::search::{match_count, SearchMatcher};
use crate::engine::session::RenderCtx;
use crate::engine::EngineError;
use crate::nav::keys::{divider_key, group_key, node_key};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug)]
pub enum RowKind {
    GroupHeader {
        label: String,
        description: Option<String>,
        level: u8,
    },
    SubgroupHeader {
        label: String,
        description: Option<String>,
    },
    Control {
        control: Control,
        binding: Binding,
        value: JsonValue,
    },
    SubPageLink {
        label: String,
        description: Option<String>,
        path: String,
        match_count: usize,
    },
    BackBar {
        label: String,
        path: String,
    },
    Divider,
    Empty(String),
}

#[derive(Clone, Debug)]
pub struct FlatRow {
    pub key: String,
    pub depth: usize,
    pub disabled: bool,
    pub kind: RowKind,
}

impl FlatRow {
    pub fn is_selectable(&self) -> bool {
        matches!(
            self.kind,
            RowKind::Control { .. } | RowKind::SubPageLink { .. } | RowKind::BackBar { .. }
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlatView {
    pub rows: Vec<FlatRow>,
}

impl FlatView {
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.key == key)
    }

    pub fn first_selectable(&self) -> Option<usize> {
        self.rows.iter().position(FlatRow::is_selectable)
    }

    /// Next selectable row from `from` in direction `delta`, clamped at the ends.
    pub fn step(&self, from: usize, delta: i32) -> usize {
        let mut i = from as i64;
        loop {
            i += delta as i64;
            if i < 0 || i >= self.rows.len() as i64 {
                return from;
            }
            if self.rows[i as usize].is_selectable() {
                return i as usize;
            }
        }
    }

    pub fn control_rows(&self) -> impl Iterator<Item = &FlatRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r.kind, RowKind::Control { .. }))
    }
}

#[derive(Clone)]
struct Scope {
    // inherited from the nearest container's enable_when; only controls honour it
    disabled: bool,
    // already inside the expanded subpage: focus filtering no longer applies
    inside_focus: bool,
    // a container matched the search by itself: show its content as-is
    unfiltered: bool,
    depth: usize,
    key: String,
}

type Chunk = Vec<FlatRow>;

/// Walk `pane` against the render context and produce the rows to draw.
pub fn flatten(pane: &ComposedPane, ctx: &mut RenderCtx<'_>) -> Result<FlatView, EngineError> {
    let searching = ctx.search.is_some();
    let mut rows = Vec::new();
    for (gi, group) in pane.groups.iter().enumerate() {
        if !searching && !pane.show_all_groups && gi != ctx.current_group {
            continue;
        }
        let gate = Gate::evaluate(
            group.enable_when.as_ref(),
            group.visible_when.as_ref(),
            ctx.tree,
        )?;
        if !gate.visible {
            continue;
        }
        let scope = Scope {
            disabled: !gate.enabled,
            inside_focus: false,
            unfiltered: false,
            depth: 1,
            key: group_key(gi),
        };
        let body = join(render_children(&group.children, ctx, &scope)?, &scope.key);
        let keep_empty = !searching && ctx.focus.is_top();
        if body.is_empty() && !keep_empty {
            continue;
        }
        rows.push(FlatRow {
            key: scope.key.clone(),
            depth: 0,
            disabled: !gate.enabled,
            kind: RowKind::GroupHeader {
                label: group.label.clone(),
                description: group.description.clone(),
                level: group.level,
            },
        });
        rows.extend(body);
    }
    if rows.is_empty() {
        if let Some(m) = ctx.search {
            rows.push(FlatRow {
                key: "empty".into(),
                depth: 0,
                disabled: true,
                kind: RowKind::Empty(format!("No settings match \"{}\"", m.needle())),
            });
        }
    }
    Ok(FlatView { rows })
}

// Dividers only go between siblings that actually rendered.
fn join(chunks: Vec<Chunk>, parent_key: &str) -> Chunk {
    let mut out = Vec::new();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 {
            let depth = chunk.first().map(|r| r.depth).unwrap_or(0);
            out.push(FlatRow {
                key: divider_key(parent_key, i),
                depth,
                disabled: true,
                kind: RowKind::Divider,
            });
        }
        out.extend(chunk);
    }
    out
}

fn render_children(
    children: &[Node],
    ctx: &mut RenderCtx<'_>,
    scope: &Scope,
) -> Result<Vec<Chunk>, EngineError> {
    let mut chunks = Vec::new();
    for node in children {
        render_node(node, ctx, scope, &mut chunks)?;
    }
    Ok(chunks)
}

fn matcher<'a>(ctx: &RenderCtx<'a>, scope: &Scope) -> Option<&'a SearchMatcher> {
    if scope.unfiltered {
        None
    } else {
        ctx.search
    }
}

fn focus_hides(ctx: &RenderCtx<'_>, scope: &Scope, path: &str) -> bool {
    ctx.search.is_none() && !scope.inside_focus && !ctx.focus.shows(path)
}

fn render_node(
    node: &Node,
    ctx: &mut RenderCtx<'_>,
    scope: &Scope,
    chunks: &mut Vec<Chunk>,
) -> Result<(), EngineError> {
    match node {
        Node::Control(c) => {
            if let Some(row) = render_control(c, ctx, scope)? {
                chunks.push(vec![row]);
            }
        }
        Node::Subgroup(c) => {
            if let Some(chunk) = render_subgroup(c, ctx, scope)? {
                chunks.push(chunk);
            }
        }
        Node::SubPage(c) => {
            if let Some(chunk) = render_subpage(c, ctx, scope)? {
                chunks.push(chunk);
            }
        }
        Node::Conditional {
            enable_when,
            visible_when,
            children,
        } => {
            let gate = Gate::evaluate(enable_when.as_ref(), visible_when.as_ref(), ctx.tree)?;
            if !gate.visible {
                return Ok(());
            }
            let inner = Scope {
                disabled: scope.disabled || !gate.enabled,
                ..scope.clone()
            };
            chunks.extend(render_children(children, ctx, &inner)?);
        }
        Node::ForEach {
            path: list_path,
            search_terms,
            template,
        } => {
            let len = path::get(ctx.tree, &Path::parse(list_path))
                .and_then(JsonValue::as_array)
                .map_or(0, Vec::len);
            let terms_match = matcher(ctx, scope)
                .zip(search_terms.as_deref())
                .is_some_and(|(m, t)| m.is_match(t));
            let inner = Scope {
                unfiltered: scope.unfiltered || terms_match,
                ..scope.clone()
            };
            for i in 0..len {
                let base = format!("{list_path}[{i}]");
                for t in template {
                    render_node(&t.instantiate(&base, i), ctx, &inner, chunks)?;
                }
            }
        }
    }
    Ok(())
}

fn render_control(
    c: &Control,
    ctx: &mut RenderCtx<'_>,
    scope: &Scope,
) -> Result<Option<FlatRow>, EngineError> {
    if focus_hides(ctx, scope, &c.path) {
        return Ok(None);
    }
    if let Some(m) = matcher(ctx, scope) {
        if !m.matches_row(&c.label, c.description.as_deref()) {
            return Ok(None);
        }
    }
    let gate = Gate::evaluate(c.enable_when.as_ref(), c.visible_when.as_ref(), ctx.tree)?;
    if !gate.visible {
        return Ok(None);
    }
    let binding = match c.shadow_override() {
        Some(forced) => ctx.shadow.bind(&c.path, forced)?,
        None => Binding::real(&c.path),
    };
    let value = match &binding {
        Binding::Real(p) => path::get(ctx.tree, p).cloned().unwrap_or(JsonValue::Null),
        Binding::Shadow(key) => ctx
            .shadow
            .get(key)
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),
    };
    if matches!(c.kind, ControlKind::Boolean { .. }) && !binding.is_shadow() && value.is_null() {
        ctx.pending.schedule(&c.path);
    }
    Ok(Some(FlatRow {
        key: node_key(&scope.key, &c.path),
        depth: scope.depth,
        disabled: c.disabled || scope.disabled || !gate.enabled || binding.is_shadow(),
        kind: RowKind::Control {
            control: c.clone(),
            binding,
            value,
        },
    }))
}

fn render_subgroup(
    c: &Container,
    ctx: &mut RenderCtx<'_>,
    scope: &Scope,
) -> Result<Option<Chunk>, EngineError> {
    if focus_hides(ctx, scope, &c.path) {
        return Ok(None);
    }
    let gate = Gate::evaluate(c.enable_when.as_ref(), c.visible_when.as_ref(), ctx.tree)?;
    if !gate.visible {
        return Ok(None);
    }
    let key = node_key(&scope.key, &c.path);
    let inner = Scope {
        disabled: !gate.enabled,
        depth: scope.depth + 1,
        key: key.clone(),
        ..scope.clone()
    };
    let body = join(render_children(&c.children, ctx, &inner)?, &key);
    if body.is_empty() {
        return Ok(None);
    }
    let mut chunk = vec![FlatRow {
        key,
        depth: scope.depth,
        disabled: !gate.enabled,
        kind: RowKind::SubgroupHeader {
            label: c.label.clone(),
            description: c.description.clone(),
        },
    }];
    chunk.extend(body);
    Ok(Some(chunk))
}

fn render_subpage(
    c: &Container,
    ctx: &mut RenderCtx<'_>,
    scope: &Scope,
) -> Result<Option<Chunk>, EngineError> {
    if focus_hides(ctx, scope, &c.path) {
        return Ok(None);
    }
    let gate = Gate::evaluate(c.enable_when.as_ref(), c.visible_when.as_ref(), ctx.tree)?;
    if !gate.visible {
        return Ok(None);
    }
    let key = node_key(&scope.key, &c.path);
    let m = matcher(ctx, scope);
    let own_match = m.is_some_and(|m| m.matches_row(&c.label, c.description.as_deref()));

    if ctx.search.is_none() && ctx.focus.focused() == Some(c.path.as_str()) {
        let inner = Scope {
            disabled: !gate.enabled,
            inside_focus: true,
            unfiltered: scope.unfiltered || own_match,
            depth: scope.depth,
            key: key.clone(),
        };
        let mut chunk = vec![FlatRow {
            key: format!("{key}/back"),
            depth: scope.depth,
            disabled: false,
            kind: RowKind::BackBar {
                label: c.label.clone(),
                path: c.path.clone(),
            },
        }];
        chunk.extend(join(render_children(&c.children, ctx, &inner)?, &key));
        return Ok(Some(chunk));
    }

    let count = m.map_or(0, |m| match_count(&c.children, m));
    if m.is_some() && !own_match && count == 0 {
        return Ok(None);
    }
    Ok(Some(vec![FlatRow {
        key,
        depth: scope.depth,
        disabled: !gate.enabled,
        kind: RowKind::SubPageLink {
            label: c.label.clone(),
            description: c.description.clone(),
            path: c.path.clone(),
            match_count: count,
        },
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose;
    use crate::engine::session::Session;
    use crate::model::PaneSpec;
    use serde_json::json;

    fn pane(v: JsonValue) -> ComposedPane {
        let spec: PaneSpec = serde_json::from_value(v).unwrap();
        compose(&spec).unwrap()
    }

    fn labels(view: &FlatView) -> Vec<String> {
        view.rows
            .iter()
            .filter_map(|r| match &r.kind {
                RowKind::GroupHeader { label, .. }
                | RowKind::SubgroupHeader { label, .. }
                | RowKind::SubPageLink { label, .. } => Some(label.clone()),
                RowKind::BackBar { label, .. } => Some(format!("< {label}")),
                RowKind::Control { control, .. } => Some(control.label.clone()),
                RowKind::Divider => None,
                RowKind::Empty(msg) => Some(msg.clone()),
            })
            .collect()
    }

    fn two_groups() -> ComposedPane {
        pane(json!({"groups": [
            {"label": "General", "children": [
                {"type": "input", "path": "lang", "label": "Language"},
                {"type": "input", "path": "theme", "label": "Theme"}
            ]},
            {"label": "Advanced", "children": [
                {"type": "input", "path": "proxy", "label": "Proxy"},
                {"type": "input", "path": "cache", "label": "Cache size"}
            ]}
        ]}))
    }

    #[test]
    fn search_shows_only_matching_groups_and_clear_restores_tab() {
        let p = two_groups();
        let mut s = Session::new(json!({}), None);
        s.select_group(1);
        assert_eq!(
            labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()),
            vec!["Advanced", "Proxy", "Cache size"]
        );
        s.set_search("lang");
        assert_eq!(
            labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()),
            vec!["General", "Language"]
        );
        s.set_search("");
        assert_eq!(
            labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()),
            vec!["Advanced", "Proxy", "Cache size"]
        );
        s.set_search("zzz");
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        assert!(matches!(view.rows[0].kind, RowKind::Empty(_)));
    }

    #[test]
    fn visible_when_hides_enable_when_greys() {
        let mk = |key: &str| {
            let mut child = json!({"type": "boolean", "path": "x.child", "label": "Child"});
            child[key] = json!("x.on");
            pane(json!({"groups": [{"label": "G", "children": [child]}]}))
        };
        let tree = json!({"x": {"on": false, "child": true}});

        let mut s = Session::new(tree.clone(), None);
        let view = s.render(|ctx| flatten(&mk("enable_when"), ctx)).unwrap();
        let row = view.control_rows().next().unwrap();
        assert!(row.disabled);

        let mut s = Session::new(tree, None);
        let view = s.render(|ctx| flatten(&mk("visible_when"), ctx)).unwrap();
        assert_eq!(view.control_rows().count(), 0);
    }

    #[test]
    fn group_enable_when_disables_direct_controls_only() {
        let p = pane(json!({"groups": [{"label": "G", "enable_when": "on", "children": [
            {"type": "boolean", "path": "a", "label": "A"},
            {"type": "subgroup", "path": "sub", "label": "Sub", "children": [
                {"type": "boolean", "path": "sub.b", "label": "B"}
            ]}
        ]}]}));
        let mut s = Session::new(json!({"on": false, "a": true, "sub": {"b": true}}), None);
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        let disabled: Vec<bool> = view.control_rows().map(|r| r.disabled).collect();
        assert_eq!(disabled, vec![true, false]);
    }

    #[test]
    fn dividers_sit_between_rendered_siblings() {
        let p = pane(json!({"groups": [{"label": "G", "children": [
            {"type": "input", "path": "a", "label": "A"},
            {"type": "input", "path": "b", "label": "B", "visible_when": false},
            {"type": "input", "path": "c", "label": "C"}
        ]}]}));
        let mut s = Session::new(json!({}), None);
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        let kinds: Vec<bool> = view
            .rows
            .iter()
            .map(|r| matches!(r.kind, RowKind::Divider))
            .collect();
        assert_eq!(kinds, vec![false, false, true, false]);
    }

    fn with_subpage() -> ComposedPane {
        pane(json!({"groups": [{"label": "Appearance", "children": [
            {"type": "boolean", "path": "dark", "label": "Dark mode"},
            {"type": "subpage", "path": "font", "label": "Fonts", "children": [
                {"type": "input", "path": "font.size", "label": "Font size"},
                {"type": "input", "path": "font.family", "label": "Font family"},
                {"type": "boolean", "path": "ligatures", "label": "Ligatures"}
            ]}
        ]}]}))
    }

    #[test]
    fn focused_subpage_replaces_the_list() {
        let p = with_subpage();
        let mut s = Session::new(json!({"dark": true}), None);
        assert_eq!(
            labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()),
            vec!["Appearance", "Dark mode", "Fonts"]
        );
        s.open_subpage("font");
        assert_eq!(
            labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()),
            vec!["Appearance", "< Fonts", "Font size", "Font family", "Ligatures"]
        );
        s.back();
        assert_eq!(labels(&s.render(|ctx| flatten(&p, ctx)).unwrap()).len(), 3);
    }

    #[test]
    fn search_while_focused_ignores_the_open_subpage() {
        let p = with_subpage();
        let mut s = Session::new(json!({"dark": true}), None);
        s.open_subpage("font");
        s.set_search("zzz");
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        assert_eq!(view.rows.len(), 1);
        assert!(matches!(view.rows[0].kind, RowKind::Empty(_)));

        s.set_search("font");
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        assert_eq!(labels(&view), vec!["Appearance", "Fonts"]);
        assert!(!view
            .rows
            .iter()
            .any(|r| matches!(r.kind, RowKind::BackBar { .. })));
    }

    #[test]
    fn search_counts_matches_inside_subpages() {
        let p = with_subpage();
        let mut s = Session::new(json!({"dark": true}), None);
        s.set_search("font");
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        let link = view
            .rows
            .iter()
            .find_map(|r| match &r.kind {
                RowKind::SubPageLink { match_count, .. } => Some(*match_count),
                _ => None,
            })
            .unwrap();
        assert_eq!(link, 2);
        assert_eq!(labels(&view), vec!["Appearance", "Fonts"]);
    }

    #[test]
    fn for_each_expands_per_item() {
        let p = pane(json!({"groups": [{"label": "Languages", "children": [
            {"type": "for_each", "path": "langs", "children": [
                {"type": "input", "path": "./iso", "label": "Language {number}"}
            ]}
        ]}]}));
        let tree = json!({"langs": [{"iso": "en"}, {"iso": "fr"}, {"iso": "de"}]});
        let mut s = Session::new(tree, None);
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        let rows: Vec<(String, JsonValue)> = view
            .control_rows()
            .filter_map(|r| match &r.kind {
                RowKind::Control { control, value, .. } => {
                    Some((control.path.clone(), value.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("langs[0].iso".to_string(), json!("en")),
                ("langs[1].iso".to_string(), json!("fr")),
                ("langs[2].iso".to_string(), json!("de")),
            ]
        );
        assert_eq!(labels(&view)[3], "Language 3");
    }

    #[test]
    fn undefined_boolean_is_scheduled_not_written() {
        let p = pane(json!({"groups": [{"label": "G", "children": [
            {"type": "boolean", "path": "beta", "label": "Beta"},
            {"type": "boolean", "path": "locked", "label": "Locked", "disabled_value": true}
        ]}]}));
        let mut s = Session::new(json!({}), None);
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        assert_eq!(s.pending_len(), 1);
        let locked = view.control_rows().nth(1).unwrap();
        assert!(locked.disabled);
        assert!(matches!(
            &locked.kind,
            RowKind::Control { binding: Binding::Shadow(_), value, .. } if *value == json!(true)
        ));
        assert_eq!(s.end_render().unwrap(), 1);
        assert_eq!(*s.tree(), json!({"beta": false}));
    }

    #[test]
    fn step_skips_non_selectable_rows() {
        let p = two_groups();
        let mut s = Session::new(json!({}), None);
        let view = s.render(|ctx| flatten(&p, ctx)).unwrap();
        let first = view.first_selectable().unwrap();
        assert_eq!(first, 1);
        assert_eq!(view.step(first, 1), 3);
        assert_eq!(view.step(3, 1), 3);
        assert_eq!(view.step(3, -1), 1);
    }
}
