use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::invoker::ToolInvoker;
use crate::types::{Result, ScoutError};

/// Cached front for the line-oriented lexicon tool.
///
/// The language-extension and importable-module lists are fetched once,
/// lazily, and then served from memory; `browse` hits the tool every call
/// (the agent caches its results in the index). On tool failure the cached
/// lists stay unset so a later `prime` can retry.
pub struct Lexicon {
    invoker: ToolInvoker,
    program: String,
    languages: Mutex<Option<Vec<String>>>,
    modules: Mutex<Option<Vec<String>>>,
}

impl Lexicon {
    pub fn new(program: impl Into<String>, invoker: ToolInvoker) -> Self {
        Self {
            invoker,
            program: program.into(),
            languages: Mutex::new(None),
            modules: Mutex::new(None),
        }
    }

    /// Fetch and cache both lists if not already present.
    pub async fn prime(&self) {
        if self.languages.lock().is_none() {
            match self.query(&["lang"]).await {
                Ok(lines) => {
                    info!(count = lines.len(), "cached language extensions");
                    *self.languages.lock() = Some(lines);
                }
                Err(error) => warn!(%error, "could not list language extensions"),
            }
        }
        if self.modules.lock().is_none() {
            match self.query(&["list"]).await {
                Ok(lines) => {
                    info!(count = lines.len(), "cached importable module list");
                    *self.modules.lock() = Some(lines);
                }
                Err(error) => warn!(%error, "could not list importable modules"),
            }
        }
    }

    /// Cached language extensions; empty until `prime` has succeeded.
    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().clone().unwrap_or_default()
    }

    /// Cached importable module names; empty until `prime` has succeeded.
    pub fn modules(&self) -> Vec<String> {
        self.modules.lock().clone().unwrap_or_default()
    }

    /// Exported symbols of one module.
    pub async fn browse(&self, module: &str) -> Result<Vec<String>> {
        self.query(&["browse", module]).await
    }

    /// Drop the cached lists so the next `prime` refetches them. Used when
    /// the lexicon toggle flips back on.
    pub fn invalidate(&self) {
        *self.languages.lock() = None;
        *self.modules.lock() = None;
        debug!("lexicon caches invalidated");
    }

    /// Install cached lists directly, bypassing the tool.
    #[cfg(test)]
    pub(crate) fn seed(&self, languages: Vec<String>, modules: Vec<String>) {
        *self.languages.lock() = Some(languages);
        *self.modules.lock() = Some(modules);
    }

    async fn query(&self, args: &[&str]) -> Result<Vec<String>> {
        let out = self.invoker.invoke(&self.program, args).await?;
        if !out.success() {
            return Err(ScoutError::ToolFailed {
                tool: self.program.clone(),
                code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(out.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn stub_tool(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("lexicon");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn prime_caches_both_lists_once() {
        let dir = TempDir::new().unwrap();
        let counter = dir.path().join("calls");
        let tool = stub_tool(
            &dir,
            &format!(
                r#"echo "$1" >> "{}"
case "$1" in
  lang) printf 'OverloadedStrings\nGADTs\n' ;;
  list) printf 'Data.Text\nControl.Monad\n' ;;
esac"#,
                counter.display()
            ),
        );

        let lexicon = Lexicon::new(tool, ToolInvoker::new());
        assert!(lexicon.languages().is_empty());

        lexicon.prime().await;
        assert_eq!(lexicon.languages(), vec!["OverloadedStrings", "GADTs"]);
        assert_eq!(lexicon.modules(), vec!["Data.Text", "Control.Monad"]);

        // Second prime is a no-op.
        lexicon.prime().await;
        let calls = fs::read_to_string(&counter).unwrap();
        assert_eq!(calls.lines().count(), 2);
    }

    #[tokio::test]
    async fn browse_returns_exports() {
        let dir = TempDir::new().unwrap();
        let tool = stub_tool(&dir, "printf 'pack\\nunpack\\nsplitOn\\n'");
        let lexicon = Lexicon::new(tool, ToolInvoker::new());

        let exports = lexicon.browse("Data.Text").await.unwrap();
        assert_eq!(exports, vec!["pack", "unpack", "splitOn"]);
    }

    #[tokio::test]
    async fn browse_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tool = stub_tool(&dir, "echo 'unknown module' >&2; exit 1");
        let lexicon = Lexicon::new(tool, ToolInvoker::new());

        let err = lexicon.browse("No.Such.Module").await.unwrap_err();
        assert!(matches!(err, ScoutError::ToolFailed { code: 1, .. }));
    }

    #[tokio::test]
    async fn failed_prime_retries_later() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ok");
        // Fails until the marker file exists.
        let tool = stub_tool(
            &dir,
            &format!(
                r#"[ -f "{marker}" ] || exit 1
printf 'Safe\n'"#,
                marker = marker.display()
            ),
        );

        let lexicon = Lexicon::new(tool, ToolInvoker::new());
        lexicon.prime().await;
        assert!(lexicon.languages().is_empty());

        fs::write(&marker, "").unwrap();
        lexicon.prime().await;
        assert_eq!(lexicon.languages(), vec!["Safe"]);
    }

    #[tokio::test]
    async fn invalidate_clears_caches() {
        let dir = TempDir::new().unwrap();
        let tool = stub_tool(&dir, "printf 'A\\n'");
        let lexicon = Lexicon::new(tool, ToolInvoker::new());

        lexicon.prime().await;
        assert_eq!(lexicon.languages(), vec!["A"]);
        lexicon.invalidate();
        assert!(lexicon.languages().is_empty());
    }
}
