//! Path-addressed state and visibility engine behind the settings pane.
//!
//! Everything here is independent of the terminal: the UI only talks to a
//! [`session::Session`] and feeds its render context to `nav::flatten`.

pub mod focus;
pub mod normalize;
pub mod overlay;
pub mod path;
pub mod predicate;
pub mod report;
pub mod search;
pub mod session;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot write '{path}': {reason}")]
    PathWrite { path: String, reason: String },
    #[error("shadow key '{key}' is already bound to '{existing}', refusing to bind '{incoming}'")]
    ShadowKeyCollision {
        key: String,
        existing: String,
        incoming: String,
    },
    #[error("{n} of the queued boolean normalizations failed", n = .failures.len())]
    Normalize {
        written: usize,
        failures: Vec<EngineError>,
    },
    #[error("predicate failed")]
    Predicate(#[source] anyhow::Error),
}
