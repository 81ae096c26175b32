use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::types::{ModuleInfo, ProjectInfo};

/// Aggregate counters over the index, for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub modules: usize,
    pub declarations: usize,
    pub std_modules: usize,
    pub projects: usize,
}

/// Concurrent-safe store for everything the completion engine reads.
///
/// Three mappings, each behind its own reader/writer lock so a writer
/// updating module info never blocks a reader of project info:
/// - file path -> parsed module metadata
/// - standard-module name -> exported symbols (populated lazily, once)
/// - project name -> project metadata
///
/// Writers replace whole entries and hold the lock only for the in-memory
/// mutation; subprocess calls and JSON decoding happen before the lock is
/// taken. Readers therefore see either the entire old value or the entire
/// new value for a key, never a mix.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    modules: RwLock<HashMap<PathBuf, ModuleInfo>>,
    std_modules: RwLock<HashMap<String, Vec<String>>>,
    projects: RwLock<HashMap<String, ProjectInfo>>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // --- per-file module metadata ---

    pub fn module_info(&self, path: &Path) -> Option<ModuleInfo> {
        self.modules.read().get(path).cloned()
    }

    /// Full replacement of the entry for `path`.
    pub fn put_module_info(&self, path: PathBuf, info: ModuleInfo) {
        self.modules.write().insert(path, info);
    }

    /// Eviction hook for file-deletion events. The inspection agent never
    /// calls this; entries otherwise live for the process lifetime.
    pub fn remove_module(&self, path: &Path) -> bool {
        self.modules.write().remove(path).is_some()
    }

    /// Modification time recorded at the last successful inspection, if any.
    pub fn inspected_at(&self, path: &Path) -> Option<SystemTime> {
        self.modules.read().get(path).map(|info| info.inspected_at)
    }

    /// Read access for scans (completion, browsing). Hold briefly.
    pub fn modules(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, ModuleInfo>> {
        self.modules.read()
    }

    /// Cloned view of the module map, for serialization.
    pub fn modules_snapshot(&self) -> HashMap<PathBuf, ModuleInfo> {
        self.modules.read().clone()
    }

    // --- standard-module exports ---

    pub fn has_std_module(&self, name: &str) -> bool {
        self.std_modules.read().contains_key(name)
    }

    pub fn std_module(&self, name: &str) -> Option<Vec<String>> {
        self.std_modules.read().get(name).cloned()
    }

    /// Write-once-per-key is the expected pattern; a second write replaces.
    pub fn put_std_module(&self, name: String, exports: Vec<String>) {
        self.std_modules.write().insert(name, exports);
    }

    pub fn std_modules(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<String>>> {
        self.std_modules.read()
    }

    // --- project metadata ---

    pub fn project(&self, name: &str) -> Option<ProjectInfo> {
        self.projects.read().get(name).cloned()
    }

    pub fn put_project(&self, name: String, info: ProjectInfo) {
        self.projects.write().insert(name, info);
    }

    pub fn projects(&self) -> RwLockReadGuard<'_, HashMap<String, ProjectInfo>> {
        self.projects.read()
    }

    // --- aggregates ---

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let modules = self.modules.read();
        IndexStats {
            modules: modules.len(),
            declarations: modules.values().map(|info| info.declarations.len()).sum(),
            std_modules: self.std_modules.read().len(),
            projects: self.projects.read().len(),
        }
    }
}
