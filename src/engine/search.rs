use crate::compose::node::Node;
use regex::{Regex, RegexBuilder};

/// Case-insensitive literal substring matcher built from the search box.
#[derive(Clone, Debug)]
pub struct SearchMatcher {
    needle: String,
    regex: Regex,
}

/// A piece of a label, flagged when it is part of a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub matched: bool,
}

impl SearchMatcher {
    /// `None` for an empty or whitespace-only string: search is off.
    pub fn compile(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let regex = RegexBuilder::new(&regex::escape(trimmed))
            .case_insensitive(true)
            .build()
            .ok()?;
        Some(Self {
            needle: trimmed.to_string(),
            regex,
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn matches_row(&self, label: &str, description: Option<&str>) -> bool {
        self.is_match(label) || description.is_some_and(|d| self.is_match(d))
    }

    pub fn highlight(&self, text: &str) -> Vec<Fragment> {
        let mut out = Vec::new();
        let mut last = 0;
        for m in self.regex.find_iter(text) {
            if m.start() > last {
                out.push(Fragment {
                    text: text[last..m.start()].to_string(),
                    matched: false,
                });
            }
            out.push(Fragment {
                text: m.as_str().to_string(),
                matched: true,
            });
            last = m.end();
        }
        if last < text.len() || out.is_empty() {
            out.push(Fragment {
                text: text[last..].to_string(),
                matched: false,
            });
        }
        out
    }
}

/// Whether `node`, or anything below it, matches. Visibility is not taken
/// into account here; the flattener applies it separately.
pub fn node_matches(node: &Node, m: &SearchMatcher) -> bool {
    match node {
        Node::Control(c) => m.matches_row(&c.label, c.description.as_deref()),
        Node::SubPage(c) => {
            m.matches_row(&c.label, c.description.as_deref()) || match_count(&c.children, m) > 0
        }
        Node::Subgroup(c) => c.children.iter().any(|n| node_matches(n, m)),
        Node::Conditional { children, .. } => children.iter().any(|n| node_matches(n, m)),
        Node::ForEach {
            search_terms,
            template,
            ..
        } => {
            search_terms.as_deref().is_some_and(|t| m.is_match(t))
                || template.iter().any(|n| node_matches(n, m))
        }
    }
}

/// Number of direct children that match, each counted once however many of
/// its own descendants match.
pub fn match_count(children: &[Node], m: &SearchMatcher) -> usize {
    children.iter().filter(|n| node_matches(n, m)).count()
}
