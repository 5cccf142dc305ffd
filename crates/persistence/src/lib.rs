#![deny(warnings)]

//! Persistence layer: build state as a plain key-value save document.
//!
//! Every engine input round-trips verbatim. Restoring goes through
//! [`restore_session`], which drops substitution overrides whose node the
//! saved trees no longer contain.

use build_core::{BuildFlags, BuildState, GatedState, NodeKey, PricingConfig, SigilPurchases};
use build_runtime::Session;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Current save format.
pub const FORMAT_VERSION: u64 = 1;

/// Flat, ordered key-value document.
pub type SaveDocument = BTreeMap<String, Value>;

const KEY_VERSION: &str = "format_version";
const KEY_SAVED_AT: &str = "saved_at";
const KEY_FACTION: &str = "flags.faction";
const KEY_PACTS: &str = "flags.pacts";
const KEY_DEBUG: &str = "flags.debug";
const KEY_SIGILS_PRIMARY: &str = "sigils.primary";
const KEY_SIGILS_SECONDARY: &str = "sigils.secondary";
const KEY_TREES: &str = "trees";
const KEY_EXTRA_USAGE: &str = "extra_usage";
const KEY_SELECTIONS: &str = "selections";
const KEY_SUBSTITUTIONS: &str = "substitutions";
const KEY_GATED_LIVE: &str = "gated.live";
const KEY_GATED_BACKUP: &str = "gated.backup";
const KEY_GATED_LAST: &str = "gated.last_condition";
const KEY_GATE_OPEN: &str = "gate_open";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("save document is missing key {0:?}")]
    MissingKey(&'static str),
    #[error("unsupported save format version {0}")]
    UnsupportedVersion(u64),
}

/// Returns the default location used for local saves.
pub fn default_save_path() -> PathBuf {
    PathBuf::from("./saves/build.json")
}

fn put<T: Serialize>(doc: &mut SaveDocument, key: &str, value: &T) -> Result<(), PersistenceError> {
    doc.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(())
}

fn take<T: DeserializeOwned>(doc: &SaveDocument, key: &'static str) -> Result<T, PersistenceError> {
    let value = doc.get(key).ok_or(PersistenceError::MissingKey(key))?;
    Ok(T::deserialize(value)?)
}

/// Flatten a build into a save document stamped with `saved_at`.
pub fn to_document(
    state: &BuildState,
    saved_at: DateTime<Utc>,
) -> Result<SaveDocument, PersistenceError> {
    let mut doc = SaveDocument::new();
    put(&mut doc, KEY_VERSION, &FORMAT_VERSION)?;
    put(&mut doc, KEY_SAVED_AT, &saved_at)?;
    put(&mut doc, KEY_FACTION, &state.flags.faction)?;
    put(&mut doc, KEY_PACTS, &state.flags.pacts)?;
    put(&mut doc, KEY_DEBUG, &state.flags.debug)?;
    put(&mut doc, KEY_SIGILS_PRIMARY, &state.sigils.primary)?;
    put(&mut doc, KEY_SIGILS_SECONDARY, &state.sigils.secondary)?;
    put(&mut doc, KEY_TREES, &state.trees)?;
    put(&mut doc, KEY_EXTRA_USAGE, &state.extra_usage)?;
    put(&mut doc, KEY_SELECTIONS, &state.selections)?;
    put(&mut doc, KEY_SUBSTITUTIONS, &state.substitutions)?;
    put(&mut doc, KEY_GATED_LIVE, &state.gated.live)?;
    put(&mut doc, KEY_GATED_BACKUP, &state.gated.backup)?;
    put(&mut doc, KEY_GATED_LAST, &state.gated.last_condition)?;
    put(&mut doc, KEY_GATE_OPEN, &state.gate_open)?;
    Ok(doc)
}

/// Rebuild a build from a save document, verbatim.
pub fn from_document(doc: &SaveDocument) -> Result<BuildState, PersistenceError> {
    let version: u64 = take(doc, KEY_VERSION)?;
    if version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }
    Ok(BuildState {
        flags: BuildFlags {
            faction: take(doc, KEY_FACTION)?,
            pacts: take(doc, KEY_PACTS)?,
            debug: take(doc, KEY_DEBUG)?,
        },
        sigils: SigilPurchases {
            primary: take(doc, KEY_SIGILS_PRIMARY)?,
            secondary: take(doc, KEY_SIGILS_SECONDARY)?,
        },
        trees: take(doc, KEY_TREES)?,
        extra_usage: take(doc, KEY_EXTRA_USAGE)?,
        selections: take(doc, KEY_SELECTIONS)?,
        substitutions: take(doc, KEY_SUBSTITUTIONS)?,
        gated: GatedState {
            live: take(doc, KEY_GATED_LIVE)?,
            backup: take(doc, KEY_GATED_BACKUP)?,
            last_condition: take(doc, KEY_GATED_LAST)?,
        },
        gate_open: take(doc, KEY_GATE_OPEN)?,
    })
}

/// Timestamp recorded at save time, if present and well-formed.
pub fn saved_at(doc: &SaveDocument) -> Option<DateTime<Utc>> {
    take(doc, KEY_SAVED_AT).ok()
}

/// Restore a session and run the override garbage-collection pass at once.
pub fn restore_session(
    doc: &SaveDocument,
    pricing: PricingConfig,
) -> Result<(Session, Vec<NodeKey>), PersistenceError> {
    let state = from_document(doc)?;
    Ok(Session::from_restored(state, pricing))
}

pub fn save_to_path(path: &Path, state: &BuildState) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let doc = to_document(state, Utc::now())?;
    fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    info!(path = %path.display(), "build saved");
    Ok(())
}

pub fn load_document(path: &Path) -> Result<SaveDocument, PersistenceError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
