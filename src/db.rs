//! The status store records the content hash of each target after the last
//! build, for determining which targets are up to date.
//!
//! On disk it is one JSON document shaped
//! `{build_dir: {mode: {target: hash | null}}}`; a null hash means the target
//! failed (or has no durable hash) and must be rebuilt.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Hashes recorded for one build directory and mode, keyed by target name.
pub type Hashes = BTreeMap<String, Option<String>>;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusStore {
    dirs: BTreeMap<String, BTreeMap<String, Hashes>>,
}

impl StatusStore {
    /// Read the store at `path`.  A missing file is an empty store; a file
    /// that can't be parsed is an error.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(err) => return Err(anyhow!("read {}: {}", path.display(), err)),
        };
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    /// Rewrite the whole store at `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
    }

    pub fn hashes(&self, build_dir: &str, mode: &str) -> Option<&Hashes> {
        self.dirs.get(build_dir)?.get(mode)
    }

    pub fn hashes_mut(&mut self, build_dir: &str, mode: &str) -> &mut Hashes {
        self.dirs
            .entry(build_dir.to_owned())
            .or_default()
            .entry(mode.to_owned())
            .or_default()
    }
}
