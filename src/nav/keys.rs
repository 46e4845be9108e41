pub fn group_key(index: usize) -> String {
    format!("group:{index}")
}

/// Group index a row key belongs to: `group:2/net/--1` -> `2`.
pub fn group_of(key: &str) -> Option<usize> {
    let head = key.split('/').next()?;
    head.strip_prefix("group:")?.parse().ok()
}

pub fn node_key(parent_key: &str, path: &str) -> String {
    format!("{parent_key}/{path}")
}

pub fn divider_key(parent_key: &str, idx: usize) -> String {
    format!("{parent_key}/--{idx}")
}
