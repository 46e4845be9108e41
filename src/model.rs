use crate::engine::predicate::Predicate;
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GroupSpec {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    // 1 = top-level heading, 2 = secondary heading inside the same tab
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub enable_when: Option<Predicate>,
    #[serde(default)]
    pub visible_when: Option<Predicate>,
    // kept raw so composition can point at the offending child by index
    #[serde(default)]
    pub children: Vec<JsonValue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaneSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub initial_values: Option<JsonValue>,
    // JSON, or YAML when the extension says so; relative to the config dir
    #[serde(default)]
    pub initial_values_path: Option<String>,
    #[serde(default = "default_true")]
    pub show_search: bool,
    #[serde(default)]
    pub show_all_groups: bool,
}

impl Default for PaneSpec {
    fn default() -> Self {
        Self {
            label: Some("Settings".to_string()),
            groups: vec![],
            initial_values: None,
            initial_values_path: None,
            show_search: true,
            show_all_groups: false,
        }
    }
}

fn default_true() -> bool {
    true
}

pub(crate) fn validate_pane_spec(spec: &PaneSpec) -> Result<(), String> {
    use std::collections::HashSet;
    if spec.groups.is_empty() {
        return Err("pane must declare at least one group".to_string());
    }
    let mut labels = HashSet::new();
    for (i, g) in spec.groups.iter().enumerate() {
        if g.label.trim().is_empty() {
            return Err(format!("group at index {i} has an empty label"));
        }
        if !labels.insert(g.label.as_str()) {
            return Err(format!("duplicate group label: '{}' at index {}", g.label, i));
        }
        if let Some(level) = g.level {
            if !(1..=2).contains(&level) {
                return Err(format!("group '{}' has level {level}, expected 1 or 2", g.label));
            }
        }
    }
    if let Some(v) = &spec.initial_values {
        if !v.is_object() {
            return Err("initial_values must be a mapping".to_string());
        }
    }
    Ok(())
}
