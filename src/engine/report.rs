use super::overlay::strip_shadow_root;
use serde_json::Value as JsonValue;
use std::rc::Rc;

pub type ReportFn = Box<dyn FnMut(Rc<JsonValue>)>;

/// Forwards value-tree snapshots to the host at most once per distinct
/// content. Equal content always comes back as the same `Rc`.
pub struct ChangeReporter {
    last: Rc<JsonValue>,
    last_json: String,
    on_report: Option<ReportFn>,
    reports: usize,
}

impl std::fmt::Debug for ChangeReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeReporter")
            .field("last_json", &self.last_json)
            .field("reports", &self.reports)
            .finish()
    }
}

fn serialize(tree: &JsonValue) -> String {
    // Value's Serialize cannot fail
    serde_json::to_string(tree).unwrap_or_default()
}

impl ChangeReporter {
    /// Seeded with the initial tree, so nothing is reported until the
    /// content actually moves away from it.
    pub fn new(initial: &JsonValue, on_report: Option<ReportFn>) -> Self {
        let stripped = strip_shadow_root(initial).into_owned();
        Self {
            last_json: serialize(&stripped),
            last: Rc::new(stripped),
            on_report,
            reports: 0,
        }
    }

    /// Compare `tree` (shadow root stripped) with the last report. On a change
    /// the callback fires once and the new snapshot is returned.
    pub fn observe(&mut self, tree: &JsonValue) -> Option<Rc<JsonValue>> {
        let candidate = strip_shadow_root(tree);
        let json = serialize(&candidate);
        if json == self.last_json {
            return None;
        }
        let snapshot = Rc::new(candidate.into_owned());
        self.last = Rc::clone(&snapshot);
        self.last_json = json;
        self.reports += 1;
        tracing::debug!(reports = self.reports, "value tree reported");
        if let Some(cb) = self.on_report.as_mut() {
            cb(Rc::clone(&snapshot));
        }
        Some(snapshot)
    }

    pub fn last_reported(&self) -> Rc<JsonValue> {
        Rc::clone(&self.last)
    }

    pub fn report_count(&self) -> usize {
        self.reports
    }
}
