use super::focus::FocusState;
use super::normalize::PendingNormalizations;
use super::overlay::{strip_shadow_root, Binding, ShadowMap};
use super::path;
use super::report::{ChangeReporter, ReportFn};
use super::search::SearchMatcher;
use super::EngineError;
use serde_json::{Map, Value as JsonValue};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Zero-argument accessor handed to the host; always returns the latest tree.
pub type ValueGetter = Rc<dyn Fn() -> JsonValue>;

/// What a render pass may look at and touch. Only the shadow map and the
/// normalization queue are writable; the value tree is read-only mid-render.
pub struct RenderCtx<'a> {
    pub tree: &'a JsonValue,
    pub shadow: &'a mut ShadowMap,
    pub pending: &'a mut PendingNormalizations,
    pub focus: &'a FocusState,
    pub search: Option<&'a SearchMatcher>,
    pub current_group: usize,
}

/// One editing session over a working copy of the host's value tree.
pub struct Session {
    values: Rc<RefCell<JsonValue>>,
    shadow: ShadowMap,
    pending: PendingNormalizations,
    reporter: ChangeReporter,
    focus: FocusState,
    search: Option<SearchMatcher>,
    search_text: String,
    current_group: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(JsonValue::Object(Map::new()), None)
    }
}

impl Session {
    pub fn new(initial: JsonValue, on_report: Option<ReportFn>) -> Self {
        let initial = if initial.is_null() {
            JsonValue::Object(Map::new())
        } else {
            initial
        };
        let reporter = ChangeReporter::new(&initial, on_report);
        Self {
            values: Rc::new(RefCell::new(initial)),
            shadow: ShadowMap::new(),
            pending: PendingNormalizations::default(),
            reporter,
            focus: FocusState::Top,
            search: None,
            search_text: String::new(),
            current_group: 0,
        }
    }

    pub fn read(&self, binding: &Binding) -> JsonValue {
        match binding {
            Binding::Real(p) => path::get_or(&self.values.borrow(), p, &JsonValue::Null).clone(),
            Binding::Shadow(key) => self
                .shadow
                .get(key)
                .map(JsonValue::Bool)
                .unwrap_or(JsonValue::Null),
        }
    }

    /// Shadow bindings only ever touch the shadow map.
    pub fn write(&mut self, binding: &Binding, value: JsonValue) -> Result<(), EngineError> {
        match binding {
            Binding::Real(p) => {
                tracing::trace!(path = %p, %value, "write");
                path::set(&mut self.values.borrow_mut(), p, value)
            }
            Binding::Shadow(key) => {
                let Some(b) = value.as_bool() else {
                    return Err(EngineError::PathWrite {
                        path: binding.display_path(),
                        reason: "shadow values are boolean".into(),
                    });
                };
                if !self.shadow.set(key, b) {
                    return Err(EngineError::PathWrite {
                        path: binding.display_path(),
                        reason: "no shadow value bound".into(),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn tree(&self) -> Ref<'_, JsonValue> {
        self.values.borrow()
    }

    pub fn value_getter(&self) -> ValueGetter {
        let values = Rc::clone(&self.values);
        Rc::new(move || strip_shadow_root(&values.borrow()).into_owned())
    }

    /// Start of a render pass: hand the current tree to the reporter.
    pub fn begin_render(&mut self) -> Option<Rc<JsonValue>> {
        let tree = self.values.borrow();
        self.reporter.observe(&tree)
    }

    pub fn render<R>(&mut self, f: impl FnOnce(&mut RenderCtx<'_>) -> R) -> R {
        let tree = self.values.borrow();
        let mut ctx = RenderCtx {
            tree: &tree,
            shadow: &mut self.shadow,
            pending: &mut self.pending,
            focus: &self.focus,
            search: self.search.as_ref(),
            current_group: self.current_group,
        };
        f(&mut ctx)
    }

    /// End of a render pass: apply deferred boolean normalizations. A non-zero
    /// result means the tree changed and another pass is due.
    pub fn end_render(&mut self) -> Result<usize, EngineError> {
        let mut tree = self.values.borrow_mut();
        self.pending.drain_into(&mut tree)
    }

    pub fn last_reported(&self) -> Rc<JsonValue> {
        self.reporter.last_reported()
    }

    pub fn report_count(&self) -> usize {
        self.reporter.report_count()
    }

    pub fn set_search(&mut self, text: &str) {
        self.search_text = text.to_string();
        self.search = SearchMatcher::compile(text);
    }

    pub fn clear_search(&mut self) {
        self.set_search("");
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn search(&self) -> Option<&SearchMatcher> {
        self.search.as_ref()
    }

    pub fn open_subpage(&mut self, path: &str) {
        self.focus.open_subpage(path);
    }

    pub fn back(&mut self) {
        self.focus.back();
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn select_group(&mut self, index: usize) {
        self.current_group = index;
    }

    pub fn current_group(&self) -> usize {
        self.current_group
    }

    pub fn shadow(&self) -> &ShadowMap {
        &self.shadow
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shadow_writes_never_reach_the_tree() {
        let mut s = Session::new(json!({"spell": {"check": false}}), None);
        let binding = s.render(|ctx| ctx.shadow.bind("spell.check", true)).unwrap();
        for v in [false, true, false] {
            s.write(&binding, json!(v)).unwrap();
        }
        assert_eq!(s.read(&binding), json!(false));
        assert_eq!(s.read(&Binding::real("spell.check")), json!(false));
        assert_eq!((s.value_getter())(), json!({"spell": {"check": false}}));
        assert!(s.write(&binding, json!("yes")).is_err());
    }

    #[test]
    fn getter_sees_latest_writes_and_reports_dedupe() {
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let mut s = Session::new(
            json!({"a": 1}),
            Some(Box::new(move |_| *sink.borrow_mut() += 1)),
        );
        let getter = s.value_getter();
        assert!(s.begin_render().is_none());
        s.write(&Binding::real("a"), json!(2)).unwrap();
        assert_eq!(getter(), json!({"a": 2}));
        assert!(s.begin_render().is_some());
        assert!(s.begin_render().is_none());
        // write the same content back: equal tree, no report
        s.write(&Binding::real("a"), json!(2)).unwrap();
        assert!(s.begin_render().is_none());
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(*s.last_reported(), json!({"a": 2}));
    }

    #[test]
    fn normalization_waits_for_end_of_pass() {
        let mut s = Session::new(json!({}), None);
        s.render(|ctx| {
            ctx.pending.schedule("flags.beta");
            assert!(path::get(ctx.tree, &"flags.beta".into()).is_none());
        });
        assert_eq!(s.pending_len(), 1);
        assert_eq!(s.end_render().unwrap(), 1);
        assert_eq!(s.read(&Binding::real("flags.beta")), json!(false));
        assert_eq!(s.end_render().unwrap(), 0);
    }

    #[test]
    fn clearing_search_restores_previous_mode() {
        let mut s = Session::new(json!({}), None);
        s.select_group(1);
        s.open_subpage("fonts");
        s.set_search("lang");
        assert!(s.search().is_some());
        s.clear_search();
        assert!(s.search().is_none());
        assert_eq!(s.current_group(), 1);
        assert_eq!(s.focus().focused(), Some("fonts"));
    }
}
