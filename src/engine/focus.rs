use super::path::is_parent;

/// Single-level subpage focus. There is no stack: opening a subpage while
/// another is focused replaces it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FocusState {
    #[default]
    Top,
    Focused(String),
}

impl FocusState {
    pub fn open_subpage(&mut self, path: &str) {
        if self.focused() != Some(path) {
            tracing::debug!(from = ?self.focused(), to = path, "subpage focus");
        }
        *self = FocusState::Focused(path.to_string());
    }

    pub fn back(&mut self) {
        *self = FocusState::Top;
    }

    pub fn focused(&self) -> Option<&str> {
        match self {
            FocusState::Top => None,
            FocusState::Focused(p) => Some(p.as_str()),
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, FocusState::Top)
    }

    /// Whether a node at `q` survives the focus filter.
    pub fn shows(&self, q: &str) -> bool {
        match self {
            FocusState::Top => true,
            FocusState::Focused(p) => q == p || is_parent(p, q) || is_parent(q, p),
        }
    }
}
