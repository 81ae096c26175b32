use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{Result, ScoutError};

/// Top-level configuration, loadable from a TOML file. Every field has a
/// default so a missing or partial file still yields a working setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub toolchain: ToolchainConfig,
    pub completion: CompletionConfig,
    pub agent: AgentConfig,
}

impl ScoutConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ScoutError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Programs and paths for the external analysis tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Compiler used to build the two inspector executables.
    pub compiler: String,
    /// Line-oriented lexicon tool (`lang`, `list`, `browse <module>`).
    pub lexicon: String,
    /// Directory holding the inspector sources, their build objects, and the
    /// compiled executables.
    pub tools_dir: PathBuf,
    pub module_inspector_source: PathBuf,
    pub project_inspector_source: PathBuf,
    /// Subprocess timeout in seconds; 0 disables the timeout.
    pub invoke_timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let tools_dir = PathBuf::from("tools");
        Self {
            compiler: "ghc".to_string(),
            lexicon: "ghc-mod".to_string(),
            module_inspector_source: tools_dir.join("ModuleInspector.hs"),
            project_inspector_source: tools_dir.join("ProjectInspector.hs"),
            tools_dir,
            invoke_timeout_secs: 300,
        }
    }
}

impl ToolchainConfig {
    pub fn module_inspector_exe(&self) -> PathBuf {
        self.tools_dir.join("ModuleInspector")
    }

    pub fn project_inspector_exe(&self) -> PathBuf {
        self.tools_dir.join("ProjectInspector")
    }

    pub fn obj_dir(&self) -> PathBuf {
        self.tools_dir.join("obj")
    }

    pub fn invoke_timeout(&self) -> Option<Duration> {
        (self.invoke_timeout_secs > 0).then(|| Duration::from_secs(self.invoke_timeout_secs))
    }
}

/// Feature toggles for the completion engine. Read per query so changes
/// apply without restarting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub language_pragmas: bool,
    pub imports: bool,
    /// Enables the lexicon tool (language extensions, importable module list,
    /// standard-module exports). When off, those candidate sources are empty.
    pub lexicon: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            language_pragmas: true,
            imports: true,
            lexicon: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Pause between inspection cycles.
    pub sleep_secs: u64,
    /// When on, files whose modification time has not advanced past their
    /// last successful inspection are skipped.
    pub check_mtime: bool,
    /// Where the serialized module index is dumped after each successful
    /// inspection.
    pub cache_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sleep_secs: 5,
            check_mtime: true,
            cache_path: PathBuf::from("module_info.cache"),
        }
    }
}

impl AgentConfig {
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_secs)
    }
}
