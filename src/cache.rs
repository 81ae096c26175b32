use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::storage::ModuleIndex;
use crate::types::{ModuleInfo, Result};

/// Dump the module map to `path` as pretty-printed JSON. The agent calls
/// this after every successful inspection; failures are the caller's to
/// log, never to abort on.
pub fn store(path: &Path, index: &ModuleIndex) -> Result<()> {
    let snapshot = index.modules_snapshot();
    let json = serde_json::to_string_pretty(&snapshot)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, json)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<HashMap<PathBuf, ModuleInfo>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Seed the index from a previous session's cache. A cold start without a
/// cache is fine; the agent re-inspects everything anyway.
pub fn prewarm(path: &Path, index: &ModuleIndex) -> usize {
    match load(path) {
        Ok(entries) => {
            let count = entries.len();
            for (file, info) in entries {
                index.put_module_info(file, info);
            }
            info!(count, cache = %path.display(), "pre-warmed module index");
            count
        }
        Err(error) => {
            debug!(%error, cache = %path.display(), "no usable module cache");
            0
        }
    }
}
