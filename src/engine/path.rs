use super::EngineError;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::hash::{Hash, Hasher};

/// One step into the value tree: a mapping key or a sequence offset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => k.parse::<usize>().ok(),
        }
    }

    fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

/// A parsed `a.b[2].c` path. Equality and hashing look at the segments only,
/// so `a[0]` and `a.0` are different paths even though both read the same slot.
#[derive(Clone, Debug, Default)]
pub struct Path {
    raw: String,
    segments: Vec<Segment>,
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

impl Path {
    /// Parse a dotted/bracketed path. Never fails: anything that is not a
    /// bracketed integer or a quoted key is taken literally as a key, the same
    /// way form libraries split field names.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut cur = String::new();
        let mut chars = raw.chars().peekable();
        let mut after_bracket = false;
        let mut last_was_dot = false;
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !after_bracket {
                        segments.push(Segment::Key(std::mem::take(&mut cur)));
                    }
                    after_bracket = false;
                    last_was_dot = true;
                }
                '[' => {
                    if !cur.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut cur)));
                    }
                    let quoted = matches!(chars.peek(), Some('"') | Some('\''));
                    let mut inner = String::new();
                    if quoted {
                        let quote = chars.next().unwrap_or('"');
                        while let Some(q) = chars.next() {
                            if q == '\\' {
                                if let Some(escaped) = chars.next() {
                                    inner.push(escaped);
                                }
                            } else if q == quote {
                                break;
                            } else {
                                inner.push(q);
                            }
                        }
                        for rest in chars.by_ref() {
                            if rest == ']' {
                                break;
                            }
                        }
                        segments.push(Segment::Key(inner));
                    } else {
                        for b in chars.by_ref() {
                            if b == ']' {
                                break;
                            }
                            inner.push(b);
                        }
                        let trimmed = inner.trim();
                        match trimmed.parse::<usize>() {
                            Ok(i) => segments.push(Segment::Index(i)),
                            Err(_) => segments.push(Segment::Key(trimmed.to_string())),
                        }
                    }
                    after_bracket = true;
                    last_was_dot = false;
                }
                other => {
                    cur.push(other);
                    after_bracket = false;
                    last_was_dot = false;
                }
            }
        }
        if !cur.is_empty() || last_was_dot {
            segments.push(Segment::Key(cur));
        }
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_parent_of(&self, other: &Path) -> bool {
        is_parent(&self.raw, &other.raw)
    }

    /// `items` -> `items[3]`
    pub fn index(&self, i: usize) -> Path {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(i));
        Path {
            raw: format!("{}[{i}]", self.raw),
            segments,
        }
    }
}

/// String-form parent test: `a.b` is a parent of `a.b.c` but not of `a.bc`
/// (and not of itself).
pub fn is_parent(parent: &str, child: &str) -> bool {
    child.len() > parent.len() + 1
        && child.starts_with(parent)
        && child[parent.len()..].starts_with('.')
}

/// Resolve a template path against a prefix. `./name` and `.` are relative;
/// anything else is already absolute.
pub fn rebase(prefix: &str, relative: &str) -> String {
    if relative == "." {
        prefix.to_string()
    } else if let Some(rest) = relative.strip_prefix("./") {
        if prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{prefix}.{rest}")
        }
    } else {
        relative.to_string()
    }
}

fn step<'a>(node: &'a JsonValue, seg: &Segment) -> Option<&'a JsonValue> {
    match node {
        JsonValue::Object(map) => map.get(&seg.as_key()),
        JsonValue::Array(items) => seg.as_index().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Walk `path` into `tree`. Returns `None` as soon as an intermediate node is
/// missing, `null` or a scalar. An empty path yields the whole tree.
pub fn get<'a>(tree: &'a JsonValue, path: &Path) -> Option<&'a JsonValue> {
    let mut cur = tree;
    for seg in &path.segments {
        cur = step(cur, seg)?;
    }
    Some(cur)
}

pub fn get_or<'a>(tree: &'a JsonValue, path: &Path, default: &'a JsonValue) -> &'a JsonValue {
    get(tree, path).unwrap_or(default)
}

/// Text shown for a scalar: strings bare, `null` empty, the rest as JSON.
pub fn value_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Most `null` slots a single write may pad a sequence with.
const MAX_SEQUENCE_GROWTH: usize = 1024;

fn is_container(v: &JsonValue) -> bool {
    v.is_object() || v.is_array()
}

// A missing slot becomes a sequence when the segment that indexes into it
// is numeric, otherwise a mapping.
fn container_for(next: &Segment) -> JsonValue {
    if next.as_index().is_some() {
        JsonValue::Array(Vec::new())
    } else {
        JsonValue::Object(Map::new())
    }
}

fn child_slot<'a>(
    node: &'a mut JsonValue,
    seg: &Segment,
    path: &Path,
) -> Result<&'a mut JsonValue, EngineError> {
    if !is_container(node) {
        *node = container_for(seg);
    }
    match node {
        JsonValue::Object(map) => Ok(map.entry(seg.as_key()).or_insert(JsonValue::Null)),
        JsonValue::Array(items) => {
            let idx = seg.as_index().ok_or_else(|| EngineError::PathWrite {
                path: path.to_string(),
                reason: format!("key '{}' used on a sequence", seg.as_key()),
            })?;
            if items.len() <= idx {
                let new_len = idx
                    .checked_add(1)
                    .filter(|&n| n - items.len() <= MAX_SEQUENCE_GROWTH)
                    .ok_or_else(|| EngineError::PathWrite {
                        path: path.to_string(),
                        reason: format!(
                            "index {idx} is too far past the end of a sequence of {}",
                            items.len()
                        ),
                    })?;
                items.resize(new_len, JsonValue::Null);
            }
            Ok(&mut items[idx])
        }
        _ => Err(EngineError::PathWrite {
            path: path.to_string(),
            reason: "not a container".into(),
        }),
    }
}

/// Write `value` at `path`, creating intermediate mappings or sequences as
/// needed. Scalars standing in the way are replaced.
pub fn set(tree: &mut JsonValue, path: &Path, value: JsonValue) -> Result<(), EngineError> {
    let Some((last, parents)) = path.segments.split_last() else {
        *tree = value;
        return Ok(());
    };
    let mut cur = tree;
    for (i, seg) in parents.iter().enumerate() {
        let next = &path.segments[i + 1];
        cur = child_slot(cur, seg, path)?;
        if !is_container(cur) {
            *cur = container_for(next);
        }
    }
    let slot = child_slot(cur, last, path)?;
    *slot = value;
    Ok(())
}
