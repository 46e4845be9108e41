use super::path::{self, Path};
use super::EngineError;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::rc::Rc;

pub type PredicateFn = Rc<dyn Fn(&JsonValue) -> anyhow::Result<bool>>;

/// Enable/visibility condition over the whole value tree.
#[derive(Clone)]
pub enum Predicate {
    Literal(bool),
    /// True iff the value at the path is exactly boolean `true`.
    Path(String),
    Equals {
        path: String,
        equals: JsonValue,
    },
    Not(Box<Predicate>),
    Func(PredicateFn),
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Literal(b) => f.debug_tuple("Literal").field(b).finish(),
            Predicate::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Predicate::Equals { path, equals } => f
                .debug_struct("Equals")
                .field("path", path)
                .field("equals", equals)
                .finish(),
            Predicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Predicate::Func(_) => f.write_str("Func(..)"),
        }
    }
}

// YAML shape: `true`, `"some.path"`, `{path, equals}` or `{not: ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPredicate {
    Literal(bool),
    Path(String),
    Not { not: Box<RawPredicate> },
    Equals { path: String, equals: JsonValue },
}

impl From<RawPredicate> for Predicate {
    fn from(raw: RawPredicate) -> Self {
        match raw {
            RawPredicate::Literal(b) => Predicate::Literal(b),
            RawPredicate::Path(p) => Predicate::Path(p),
            RawPredicate::Not { not } => Predicate::Not(Box::new((*not).into())),
            RawPredicate::Equals { path, equals } => Predicate::Equals { path, equals },
        }
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawPredicate::deserialize(deserializer).map(Into::into)
    }
}

impl Predicate {
    pub fn func(f: impl Fn(&JsonValue) -> anyhow::Result<bool> + 'static) -> Self {
        Predicate::Func(Rc::new(f))
    }

    pub fn check(&self, tree: &JsonValue) -> Result<bool, EngineError> {
        Ok(match self {
            Predicate::Literal(b) => *b,
            Predicate::Path(p) => path::get(tree, &Path::parse(p)) == Some(&JsonValue::Bool(true)),
            Predicate::Equals { path: p, equals } => {
                path::get(tree, &Path::parse(p)).unwrap_or(&JsonValue::Null) == equals
            }
            Predicate::Not(inner) => !inner.check(tree)?,
            Predicate::Func(f) => f(tree).map_err(EngineError::Predicate)?,
        })
    }
}

/// `default` when there is no predicate, otherwise whatever it says.
pub fn evaluate(
    default: bool,
    predicate: Option<&Predicate>,
    tree: &JsonValue,
) -> Result<bool, EngineError> {
    match predicate {
        None => Ok(default),
        Some(p) => p.check(tree),
    }
}

/// Both axes for one node. They are independent: a node may be visible but
/// disabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate {
    pub enabled: bool,
    pub visible: bool,
}

impl Gate {
    pub fn evaluate(
        enable_when: Option<&Predicate>,
        visible_when: Option<&Predicate>,
        tree: &JsonValue,
    ) -> Result<Self, EngineError> {
        let visible = evaluate(true, visible_when, tree)?;
        // no point asking about enablement of something that will not render
        let enabled = if visible {
            evaluate(true, enable_when, tree)?
        } else {
            true
        };
        Ok(Gate { enabled, visible })
    }
}
