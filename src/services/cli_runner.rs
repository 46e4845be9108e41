use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::process::Command;
use std::sync::mpsc::Sender;
use std::sync::OnceLock;
use std::thread;
use std::{collections::HashMap, env};

use crate::engine::path::value_text;

static ENV_VAR_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn env_var_re() -> Option<&'static Regex> {
    ENV_VAR_RE
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").ok())
        .as_ref()
}

fn expand_cmdline_env(cmdline: &str) -> String {
    // ${VAR} from the environment; unknown variables expand to nothing
    let Some(re) = env_var_re() else {
        return cmdline.to_string();
    };
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        env_map.get(&caps[1]).cloned().unwrap_or_default()
    })
    .to_string()
}

/// Expand `${VAR}` and substitute `{value}` with the shell-quoted current
/// value. The value is substituted last so its content is never expanded.
pub fn chooser_cmdline(template: &str, current: &JsonValue) -> Result<String> {
    let text = value_text(current);
    let quoted = shlex::try_quote(&text).map_err(|e| anyhow!("cannot quote current value: {e}"))?;
    Ok(expand_cmdline_env(template).replace("{value}", &quoted))
}

/// Empty output means the user backed out of the chooser.
pub(crate) fn parse_chooser_output(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(JsonValue::String(s)) => Some(s),
        _ => Some(trimmed.to_string()),
    }
}

pub fn run_chooser(cmdline: &str) -> Result<Option<String>> {
    let parts = shlex::split(cmdline).ok_or_else(|| anyhow!("Failed to parse command line"))?;
    if parts.is_empty() {
        return Err(anyhow!("Empty command line"));
    }
    let program = &parts[0];
    let args = &parts[1..];
    let output = Command::new(program)
        .args(args)
        .env("SETTINGS_PANE_CHOOSER", "1")
        .output()
        .with_context(|| format!("spawning {cmdline}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow!("Command failed: {}\n{}", cmdline, err));
    }
    Ok(parse_chooser_output(&String::from_utf8_lossy(&output.stdout)))
}

pub fn spawn_chooser(path: String, cmdline: String, tx: Sender<crate::ui::ChooserMsg>) {
    thread::spawn(move || {
        tracing::debug!(%path, %cmdline, "chooser started");
        let outcome = run_chooser(&cmdline).map_err(|e| format!("{e:#}"));
        let _ = tx.send(crate::ui::ChooserMsg { path, outcome });
    });
}
