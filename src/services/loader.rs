use crate::model::{validate_pane_spec, PaneSpec};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value as JsonValue};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "settings-pane.yaml";

pub struct LoadedPane {
    pub spec: PaneSpec,
    // directory of the config file; relative paths inside it resolve here
    pub base_dir: PathBuf,
    pub source: PathBuf,
}

/// First hit wins: the env dir, CWD, CWD/.tui, each ancestor's .tui, then
/// ~/.tui. An env dir is returned even when the file is missing so the read
/// error names it.
pub fn find_config(env_dir: Option<PathBuf>, cwd: &Path, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(dir) = env_dir {
        return Some(dir.join(CONFIG_FILE));
    }
    let candidates = [cwd.join(CONFIG_FILE), cwd.join(".tui").join(CONFIG_FILE)];
    if let Some(p) = candidates.into_iter().find(|p| p.exists()) {
        return Some(p);
    }
    let mut cur = cwd;
    while let Some(parent) = cur.parent() {
        let p = parent.join(".tui").join(CONFIG_FILE);
        if p.exists() {
            return Some(p);
        }
        cur = parent;
    }
    home.map(|h| h.join(".tui").join(CONFIG_FILE))
        .filter(|p| p.exists())
}

pub fn load_pane() -> Result<LoadedPane> {
    let env_dir = env::var_os("SETTINGS_PANE_CONFIG_DIR").map(PathBuf::from);
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    let path = find_config(env_dir, &cwd, home).ok_or_else(|| {
        anyhow!(
            "No config found. Set SETTINGS_PANE_CONFIG_DIR=<dir with {CONFIG_FILE}> or place {CONFIG_FILE} in CWD, .tui or an ancestor's .tui"
        )
    })?;
    load_pane_from_path(&path)
}

pub fn load_pane_from_path(path: &Path) -> Result<LoadedPane> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let spec: PaneSpec = serde_yaml::from_str(&s).map_err(|e| {
        if let Some(loc) = e.location() {
            anyhow!("{}:{}:{}: {}", path.display(), loc.line(), loc.column(), e)
        } else {
            anyhow!("{}: {}", path.display(), e)
        }
    })?;
    validate_pane_spec(&spec).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tracing::info!(config = %path.display(), groups = spec.groups.len(), "pane description loaded");
    Ok(LoadedPane {
        spec,
        base_dir,
        source: path.to_path_buf(),
    })
}

/// Initial value tree for a loaded pane, honouring `SETTINGS_PANE_VALUES`.
pub fn initial_values(loaded: &LoadedPane) -> Result<JsonValue> {
    let override_path = env::var_os("SETTINGS_PANE_VALUES").map(PathBuf::from);
    resolve_initial_values(&loaded.spec, &loaded.base_dir, override_path.as_deref())
}

/// Precedence: override file, then `initial_values_path`, then inline
/// `initial_values`, then an empty mapping.
pub fn resolve_initial_values(
    spec: &PaneSpec,
    base_dir: &Path,
    override_path: Option<&Path>,
) -> Result<JsonValue> {
    if let Some(p) = override_path {
        return read_values_file(p);
    }
    if let Some(rel) = &spec.initial_values_path {
        let pb = PathBuf::from(rel);
        let full = if pb.is_absolute() { pb } else { base_dir.join(rel) };
        return read_values_file(&full);
    }
    if let Some(v) = &spec.initial_values {
        return Ok(v.clone());
    }
    Ok(JsonValue::Object(Map::new()))
}

fn read_values_file(p: &Path) -> Result<JsonValue> {
    let s = fs::read_to_string(p).with_context(|| format!("reading values {p:?}"))?;
    let is_yaml = matches!(
        p.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let v: JsonValue = if is_yaml {
        serde_yaml::from_str(&s).with_context(|| format!("parsing values {p:?}"))?
    } else {
        serde_json::from_str(&s).with_context(|| format!("parsing values {p:?}"))?
    };
    if !v.is_object() {
        bail!("{}: initial values must be a mapping", p.display());
    }
    Ok(v)
}
