//! Turns a [`PaneSpec`] into typed nodes. Composition is fail-fast: a child
//! that cannot be understood aborts the whole pane instead of being skipped.

pub mod node;

use crate::engine::predicate::Predicate;
use crate::model::{GroupSpec, PaneSpec};
use node::{ChoiceOption, ComposedPane, Container, Control, ControlKind, Group, InputKind, Node};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("{parent}: child #{index} is not a mapping")]
    MalformedChild { parent: String, index: usize },
    #[error("{parent}: child #{index} has unknown type '{ty}'")]
    UnknownNodeType {
        parent: String,
        index: usize,
        ty: String,
    },
    #[error("{parent}: child #{index} ({ty}) is missing '{field}'")]
    MissingField {
        parent: String,
        index: usize,
        ty: String,
        field: &'static str,
    },
    #[error("{parent}: child #{index} is invalid")]
    InvalidChild {
        parent: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{parent}: child #{index} has an invalid option #{option}")]
    InvalidOption {
        parent: String,
        index: usize,
        option: usize,
    },
}

// Every field any node type may carry; which ones are required is decided
// per type below.
#[derive(Debug, Deserialize, Default)]
struct RawNode {
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    enable_when: Option<Predicate>,
    #[serde(default)]
    visible_when: Option<Predicate>,
    #[serde(default)]
    immediate_effect: bool,
    #[serde(default)]
    disabled_value: Option<bool>,
    #[serde(default)]
    input: Option<InputKind>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    options: Option<Vec<JsonValue>>,
    #[serde(default)]
    one_column: bool,
    #[serde(default)]
    button_label: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    search_terms: Option<String>,
    #[serde(default)]
    children: Vec<JsonValue>,
}

struct Site<'a> {
    parent: &'a str,
    index: usize,
    ty: &'a str,
}

impl Site<'_> {
    fn missing(&self, field: &'static str) -> CompositionError {
        CompositionError::MissingField {
            parent: self.parent.to_string(),
            index: self.index,
            ty: self.ty.to_string(),
            field,
        }
    }

    fn require(&self, v: Option<String>, field: &'static str) -> Result<String, CompositionError> {
        v.ok_or_else(|| self.missing(field))
    }
}

pub fn compose(spec: &PaneSpec) -> Result<ComposedPane, CompositionError> {
    let groups = spec
        .groups
        .iter()
        .map(compose_group)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(groups = groups.len(), "pane composed");
    Ok(ComposedPane {
        label: spec.label.clone().unwrap_or_else(|| "Settings".to_string()),
        groups,
        show_search: spec.show_search,
        show_all_groups: spec.show_all_groups,
    })
}

fn compose_group(g: &GroupSpec) -> Result<Group, CompositionError> {
    Ok(Group {
        label: g.label.clone(),
        description: g.description.clone(),
        level: g.level.unwrap_or(1),
        enable_when: g.enable_when.clone(),
        visible_when: g.visible_when.clone(),
        children: compose_children(&g.children, &g.label, false)?,
    })
}

fn compose_children(
    raw: &[JsonValue],
    parent: &str,
    inside_subpage: bool,
) -> Result<Vec<Node>, CompositionError> {
    raw.iter()
        .enumerate()
        .map(|(index, child)| compose_child(child, parent, index, inside_subpage))
        .collect()
}

fn compose_child(
    child: &JsonValue,
    parent: &str,
    index: usize,
    inside_subpage: bool,
) -> Result<Node, CompositionError> {
    if !child.is_object() {
        return Err(CompositionError::MalformedChild {
            parent: parent.to_string(),
            index,
        });
    }
    let raw: RawNode =
        serde_json::from_value(child.clone()).map_err(|source| CompositionError::InvalidChild {
            parent: parent.to_string(),
            index,
            source,
        })?;
    let ty = raw.ty.clone().unwrap_or_default();
    let site = Site {
        parent,
        index,
        ty: &ty,
    };
    if ty.is_empty() {
        return Err(site.missing("type"));
    }

    let kind = match ty.as_str() {
        "boolean" => ControlKind::Boolean {
            immediate_effect: raw.immediate_effect,
            disabled_value: raw.disabled_value,
        },
        "input" => ControlKind::Input {
            input: raw.input.unwrap_or_default(),
            units: raw.units.clone(),
        },
        "select" => ControlKind::Select {
            options: options(&raw, &site)?,
        },
        "radio_group" => ControlKind::RadioGroup {
            options: options(&raw, &site)?,
            one_column: raw.one_column,
        },
        "toggle_group" => ControlKind::ToggleGroup {
            options: options(&raw, &site)?,
        },
        "chooser" => ControlKind::Chooser {
            button_label: raw
                .button_label
                .clone()
                .unwrap_or_else(|| "Choose…".to_string()),
            command: site.require(raw.command.clone(), "command")?,
        },
        "subgroup" | "subpage" => {
            let label = site.require(raw.label, "label")?;
            let nested_parent = format!("{parent} > {label}");
            let is_page = ty == "subpage";
            let container = Container {
                path: site.require(raw.path, "path")?,
                description: raw.description,
                enable_when: raw.enable_when,
                visible_when: raw.visible_when,
                children: compose_children(
                    &raw.children,
                    &nested_parent,
                    inside_subpage || is_page,
                )?,
                label,
            };
            if is_page && inside_subpage {
                tracing::warn!(
                    parent,
                    label = %container.label,
                    "subpage nested in a subpage; rendering it as a subgroup"
                );
                return Ok(Node::Subgroup(container));
            }
            return Ok(if is_page {
                Node::SubPage(container)
            } else {
                Node::Subgroup(container)
            });
        }
        "conditional" => {
            return Ok(Node::Conditional {
                enable_when: raw.enable_when,
                visible_when: raw.visible_when,
                children: compose_children(
                    &raw.children,
                    &format!("{parent} > #{index}"),
                    inside_subpage,
                )?,
            });
        }
        "for_each" => {
            let path = site.require(raw.path, "path")?;
            return Ok(Node::ForEach {
                template: compose_children(
                    &raw.children,
                    &format!("{parent} > {path}[]"),
                    inside_subpage,
                )?,
                search_terms: raw.search_terms,
                path,
            });
        }
        _ => {
            return Err(CompositionError::UnknownNodeType {
                parent: parent.to_string(),
                index,
                ty: ty.clone(),
            })
        }
    };

    Ok(Node::Control(Control {
        path: site.require(raw.path, "path")?,
        label: site.require(raw.label, "label")?,
        description: raw.description,
        disabled: raw.disabled,
        enable_when: raw.enable_when,
        visible_when: raw.visible_when,
        kind,
    }))
}

fn options(raw: &RawNode, site: &Site<'_>) -> Result<Vec<ChoiceOption>, CompositionError> {
    let list = raw.options.as_ref().ok_or_else(|| site.missing("options"))?;
    list.iter()
        .enumerate()
        .map(|(i, o)| {
            choice_option(o).ok_or_else(|| CompositionError::InvalidOption {
                parent: site.parent.to_string(),
                index: site.index,
                option: i,
            })
        })
        .collect()
}

fn display_value(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// A bare number or string stands for both value and label.
fn choice_option(o: &JsonValue) -> Option<ChoiceOption> {
    match o {
        JsonValue::Number(_) | JsonValue::String(_) => Some(ChoiceOption {
            value: o.clone(),
            label: display_value(o),
            description: None,
        }),
        JsonValue::Object(map) => {
            let value = map.get("value")?.clone();
            let label = map
                .get("label")
                .and_then(|l| l.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| display_value(&value));
            let description = map
                .get("description")
                .and_then(|d| d.as_str())
                .map(str::to_string);
            Some(ChoiceOption {
                value,
                label,
                description,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pane(children: JsonValue) -> PaneSpec {
        PaneSpec {
            groups: vec![GroupSpec {
                label: "General".into(),
                children: children.as_array().cloned().unwrap_or_default(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn composes_controls_with_options() {
        let composed = compose(&pane(json!([
            {"type": "boolean", "path": "spell.on", "label": "Spell check"},
            {"type": "select", "path": "size", "label": "Size",
             "options": [10, {"value": "l", "label": "Large", "description": "big"}, {"value": "m"}]},
            {"type": "input", "path": "font", "label": "Font", "input": "number", "units": "pt"},
        ])))
        .unwrap();
        let children = &composed.groups[0].children;
        assert_eq!(children.len(), 3);
        let Node::Control(select) = &children[1] else {
            panic!("expected control");
        };
        let opts = select.options().unwrap();
        assert_eq!(opts[0].label, "10");
        assert_eq!(opts[0].value, json!(10));
        assert_eq!(opts[1].label, "Large");
        assert_eq!(opts[2].label, "m");
        let Node::Control(input) = &children[2] else {
            panic!("expected control");
        };
        assert!(matches!(
            input.kind,
            ControlKind::Input {
                input: InputKind::Number,
                ..
            }
        ));
    }

    #[test]
    fn non_mapping_child_names_parent() {
        let err = compose(&pane(json!([
            {"type": "subgroup", "label": "Fonts", "path": "fonts", "children": ["oops"]},
        ])))
        .unwrap_err();
        assert!(matches!(err, CompositionError::MalformedChild { index: 0, .. }));
        assert!(err.to_string().contains("General > Fonts"));
    }

    #[test]
    fn unknown_type_and_missing_fields_fail() {
        let err = compose(&pane(json!([{"type": "slider", "path": "x", "label": "X"}]))).unwrap_err();
        assert!(matches!(err, CompositionError::UnknownNodeType { .. }));
        let err = compose(&pane(json!([{"type": "boolean", "label": "X"}]))).unwrap_err();
        assert!(err.to_string().contains("'path'"));
        let err = compose(&pane(json!([
            {"type": "select", "path": "x", "label": "X", "options": [true]}
        ])))
        .unwrap_err();
        assert!(matches!(err, CompositionError::InvalidOption { option: 0, .. }));
    }

    #[test]
    fn nested_subpage_becomes_subgroup() {
        let composed = compose(&pane(json!([
            {"type": "subpage", "label": "Outer", "path": "outer", "children": [
                {"type": "subpage", "label": "Inner", "path": "outer.inner", "children": [
                    {"type": "boolean", "path": "outer.inner.on", "label": "On"}
                ]}
            ]}
        ])))
        .unwrap();
        let Node::SubPage(outer) = &composed.groups[0].children[0] else {
            panic!("outer should stay a subpage");
        };
        assert!(matches!(outer.children[0], Node::Subgroup(_)));
    }

    #[test]
    fn for_each_template_instantiates_with_rebased_paths() {
        let composed = compose(&pane(json!([
            {"type": "for_each", "path": "langs", "search_terms": "language", "children": [
                {"type": "input", "path": "./iso", "label": "Language {number}",
                 "enable_when": "./enabled"}
            ]}
        ])))
        .unwrap();
        let Node::ForEach { template, .. } = &composed.groups[0].children[0] else {
            panic!("expected for_each");
        };
        let Node::Control(c) = template[0].instantiate("langs[2]", 2) else {
            panic!("expected control");
        };
        assert_eq!(c.path, "langs[2].iso");
        assert_eq!(c.label, "Language 3");
        assert!(matches!(c.enable_when, Some(Predicate::Path(ref p)) if p == "langs[2].enabled"));
    }
}
