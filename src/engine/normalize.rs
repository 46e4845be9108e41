use super::path::{self, Path};
use super::EngineError;
use serde_json::Value as JsonValue;

/// Boolean fields found undefined during a render pass. They are written as
/// `false` only once the pass is over.
#[derive(Clone, Debug, Default)]
pub struct PendingNormalizations {
    paths: Vec<String>,
}

impl PendingNormalizations {
    pub fn schedule(&mut self, path: &str) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Apply and clear the queue. Paths that gained a value since they were
    /// scheduled are left alone. Returns how many writes happened; a failed
    /// write does not stop the rest of the queue.
    pub fn drain_into(&mut self, tree: &mut JsonValue) -> Result<usize, EngineError> {
        let mut written = 0;
        let mut failures = Vec::new();
        for raw in self.paths.drain(..) {
            let p = Path::parse(&raw);
            let current = path::get(tree, &p);
            if current.map_or(true, JsonValue::is_null) {
                match path::set(tree, &p, JsonValue::Bool(false)) {
                    Ok(()) => written += 1,
                    Err(e) => failures.push(e),
                }
            }
        }
        if written > 0 {
            tracing::debug!(written, "normalized undefined booleans");
        }
        if failures.is_empty() {
            Ok(written)
        } else {
            Err(EngineError::Normalize { written, failures })
        }
    }
}
