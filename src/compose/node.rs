use crate::engine::path::rebase;
use crate::engine::predicate::Predicate;
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceOption {
    pub value: JsonValue,
    pub label: String,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Email,
}

#[derive(Clone, Debug)]
pub enum ControlKind {
    Boolean {
        immediate_effect: bool,
        disabled_value: Option<bool>,
    },
    Input {
        input: InputKind,
        units: Option<String>,
    },
    Select {
        options: Vec<ChoiceOption>,
    },
    RadioGroup {
        options: Vec<ChoiceOption>,
        one_column: bool,
    },
    ToggleGroup {
        options: Vec<ChoiceOption>,
    },
    Chooser {
        button_label: String,
        command: String,
    },
}

#[derive(Clone, Debug)]
pub struct Control {
    pub path: String,
    pub label: String,
    pub description: Option<String>,
    pub disabled: bool,
    pub enable_when: Option<Predicate>,
    pub visible_when: Option<Predicate>,
    pub kind: ControlKind,
}

impl Control {
    pub fn options(&self) -> Option<&[ChoiceOption]> {
        match &self.kind {
            ControlKind::Select { options }
            | ControlKind::RadioGroup { options, .. }
            | ControlKind::ToggleGroup { options } => Some(options),
            _ => None,
        }
    }

    /// The effective `disabled_value` override. Switch-style booleans do not
    /// support it.
    pub fn shadow_override(&self) -> Option<bool> {
        match self.kind {
            ControlKind::Boolean {
                immediate_effect: false,
                disabled_value,
            } => disabled_value,
            _ => None,
        }
    }
}

/// Subgroups and subpages share a shape; only their rendering differs.
#[derive(Clone, Debug)]
pub struct Container {
    pub label: String,
    pub path: String,
    pub description: Option<String>,
    pub enable_when: Option<Predicate>,
    pub visible_when: Option<Predicate>,
    pub children: Vec<Node>,
}

#[derive(Clone, Debug)]
pub enum Node {
    Control(Control),
    Subgroup(Container),
    SubPage(Container),
    Conditional {
        enable_when: Option<Predicate>,
        visible_when: Option<Predicate>,
        children: Vec<Node>,
    },
    ForEach {
        path: String,
        search_terms: Option<String>,
        template: Vec<Node>,
    },
}

impl Node {
    /// A copy of this template node for item `index` of a `for_each` whose
    /// item path is `base`.
    pub fn instantiate(&self, base: &str, index: usize) -> Node {
        let text = |s: &str| expand_index(s, index);
        let pred = |p: &Option<Predicate>| p.as_ref().map(|p| rebase_predicate(p, base));
        let many = |nodes: &[Node]| nodes.iter().map(|n| n.instantiate(base, index)).collect();
        match self {
            Node::Control(c) => Node::Control(Control {
                path: rebase(base, &c.path),
                label: text(&c.label),
                description: c.description.as_deref().map(text),
                disabled: c.disabled,
                enable_when: pred(&c.enable_when),
                visible_when: pred(&c.visible_when),
                kind: c.kind.clone(),
            }),
            Node::Subgroup(c) => Node::Subgroup(instantiate_container(c, base, index)),
            Node::SubPage(c) => Node::SubPage(instantiate_container(c, base, index)),
            Node::Conditional {
                enable_when,
                visible_when,
                children,
            } => Node::Conditional {
                enable_when: pred(enable_when),
                visible_when: pred(visible_when),
                children: many(children),
            },
            Node::ForEach {
                path,
                search_terms,
                template,
            } => Node::ForEach {
                path: rebase(base, path),
                search_terms: search_terms.clone(),
                template: template.clone(),
            },
        }
    }
}

fn instantiate_container(c: &Container, base: &str, index: usize) -> Container {
    Container {
        label: expand_index(&c.label, index),
        path: rebase(base, &c.path),
        description: c.description.as_deref().map(|d| expand_index(d, index)),
        enable_when: c.enable_when.as_ref().map(|p| rebase_predicate(p, base)),
        visible_when: c.visible_when.as_ref().map(|p| rebase_predicate(p, base)),
        children: c.children.iter().map(|n| n.instantiate(base, index)).collect(),
    }
}

fn expand_index(s: &str, index: usize) -> String {
    s.replace("{index}", &index.to_string())
        .replace("{number}", &(index + 1).to_string())
}

fn rebase_predicate(p: &Predicate, base: &str) -> Predicate {
    match p {
        Predicate::Path(path) => Predicate::Path(rebase(base, path)),
        Predicate::Equals { path, equals } => Predicate::Equals {
            path: rebase(base, path),
            equals: equals.clone(),
        },
        Predicate::Not(inner) => Predicate::Not(Box::new(rebase_predicate(inner, base))),
        other => other.clone(),
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    pub label: String,
    pub description: Option<String>,
    pub level: u8,
    pub enable_when: Option<Predicate>,
    pub visible_when: Option<Predicate>,
    pub children: Vec<Node>,
}

#[derive(Clone, Debug, Default)]
pub struct ComposedPane {
    pub label: String,
    pub groups: Vec<Group>,
    pub show_search: bool,
    pub show_all_groups: bool,
}
