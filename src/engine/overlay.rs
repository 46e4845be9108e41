use super::path::Path;
use super::EngineError;
use serde_json::{Map, Value as JsonValue};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Reserved top-level key under which hosts historically kept shadow values
/// inside the value tree itself.
pub const SHADOW_ROOT: &str = "disabledValue$";

/// `a.b[0]` -> `a_b_0_`
pub fn mangle(path: &str) -> String {
    path.chars()
        .map(|c| if matches!(c, '.' | '[' | ']') { '_' } else { c })
        .collect()
}

/// Where a control reads and writes its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Real(Path),
    Shadow(String),
}

impl Binding {
    pub fn real(path: &str) -> Self {
        Binding::Real(Path::parse(path))
    }

    pub fn is_shadow(&self) -> bool {
        matches!(self, Binding::Shadow(_))
    }

    /// The effective path as a host would see it: shadowed controls answer
    /// `disabledValue$.<mangled>`.
    pub fn display_path(&self) -> String {
        match self {
            Binding::Real(p) => p.to_string(),
            Binding::Shadow(key) => format!("{SHADOW_ROOT}.{key}"),
        }
    }
}

#[derive(Clone, Debug)]
struct ShadowEntry {
    origin: String,
    value: bool,
}

/// Boolean overrides for disabled controls, kept apart from the value tree.
#[derive(Clone, Debug, Default)]
pub struct ShadowMap {
    entries: BTreeMap<String, ShadowEntry>,
}

impl ShadowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirect `original` to its shadow slot and force the slot to `forced`.
    /// Called on every render pass, so rebinding the same path is fine; a
    /// different path that mangles to the same key is not.
    pub fn bind(&mut self, original: &str, forced: bool) -> Result<Binding, EngineError> {
        let key = mangle(original);
        match self.entries.get_mut(&key) {
            Some(entry) if entry.origin != original => {
                return Err(EngineError::ShadowKeyCollision {
                    key,
                    existing: entry.origin.clone(),
                    incoming: original.to_string(),
                });
            }
            Some(entry) => entry.value = forced,
            None => {
                tracing::debug!(path = original, key = %key, "shadow value bound");
                self.entries.insert(
                    key.clone(),
                    ShadowEntry {
                        origin: original.to_string(),
                        value: forced,
                    },
                );
            }
        }
        Ok(Binding::Shadow(key))
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|e| e.value)
    }

    /// Returns false when nothing is bound under `key`.
    pub fn set(&mut self, key: &str, value: bool) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Flat `{mangled: bool}` view, printed in the headless summary.
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), JsonValue::Bool(e.value)))
            .collect();
        JsonValue::Object(map)
    }
}

/// Drop the reserved shadow key from the top of `tree` without touching the
/// original. Trees without the key are borrowed as-is.
pub fn strip_shadow_root(tree: &JsonValue) -> Cow<'_, JsonValue> {
    match tree {
        JsonValue::Object(map) if map.contains_key(SHADOW_ROOT) => {
            let mut copy = map.clone();
            copy.remove(SHADOW_ROOT);
            Cow::Owned(JsonValue::Object(copy))
        }
        _ => Cow::Borrowed(tree),
    }
}
