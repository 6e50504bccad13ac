//! A single hash over a target's inputs is recorded and used to determine
//! when those inputs change.
//!
//! The hash is a chain: each input is folded in as
//! `digest = hex(sha256(digest ++ bytes))`, starting from the empty string.
//! Inputs are, in order, the target's own file, its declared sources, its
//! command line (unless the action is a callable) and its salt.

use crate::def::{Invocation, TargetDef};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct HashChain {
    digest: String,
}

impl HashChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&mut self, bytes: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.digest.as_bytes());
        hasher.update(bytes);
        self.digest = format!("{:x}", hasher.finalize());
    }

    /// Fold in a file's content.  Absent files are skipped; returns whether
    /// the file was present.
    pub fn link_file(&mut self, path: &Path) -> std::io::Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        let bytes = std::fs::read(path)?;
        self.link(&bytes);
        Ok(true)
    }

    pub fn finish(self) -> String {
        self.digest
    }
}

/// Compute the content hash of a target, or None for virtual targets.
pub fn content_hash(def: &TargetDef, inv: &Invocation) -> anyhow::Result<Option<String>> {
    if def.is_virtual {
        return Ok(None);
    }
    let mut chain = HashChain::new();
    for path in std::iter::once(inv.name).chain(def.sources.iter().map(String::as_str)) {
        chain
            .link_file(Path::new(path))
            .map_err(|err| anyhow::anyhow!("read {}: {}", path, err))?;
    }
    if !def.action.is_callable() {
        chain.link(def.action.args(inv).join(" ").as_bytes());
    }
    if let Some(salt) = &def.hash {
        chain.link(salt.as_bytes());
    }
    Ok(Some(chain.finish()))
}
