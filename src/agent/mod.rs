//! The background inspection agent.
//!
//! One long-lived task drains the dirty-file set each cycle, groups files
//! by enclosing project, runs the external inspectors, and writes results
//! into the shared [`ModuleIndex`]. Per-file and per-project failures are
//! isolated; nothing here ever takes the loop down.

mod queue;

pub use queue::DirtySet;

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache;
use crate::config::ScoutConfig;
use crate::invoker::ToolInvoker;
use crate::lexicon::Lexicon;
use crate::scanner::{self, ProjectDescriptor};
use crate::status::{LogReporter, StatusReporter};
use crate::storage::ModuleIndex;
use crate::types::{ModuleInfo, ProjectInfo, ProjectInspection, Result, ScoutError};

pub struct InspectionAgent {
    config: ScoutConfig,
    invoker: ToolInvoker,
    index: Arc<ModuleIndex>,
    lexicon: Arc<Lexicon>,
    dirty: DirtySet,
    status: Arc<dyn StatusReporter>,
    /// Cleared when bootstrap fails to build the project inspector; the
    /// agent then degrades to file-level inspection only.
    project_inspector_ready: AtomicBool,
    /// Launch failures already surfaced to the user, by program name.
    reported_launch_failures: Mutex<HashSet<String>>,
}

impl InspectionAgent {
    pub fn new(config: ScoutConfig, index: Arc<ModuleIndex>, lexicon: Arc<Lexicon>) -> Self {
        let invoker = ToolInvoker::with_timeout(config.toolchain.invoke_timeout());
        Self {
            config,
            invoker,
            index,
            lexicon,
            dirty: DirtySet::new(),
            status: Arc::new(LogReporter),
            project_inspector_ready: AtomicBool::new(true),
            reported_launch_failures: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_status_reporter(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    pub fn index(&self) -> &Arc<ModuleIndex> {
        &self.index
    }

    /// Report that a file should be re-inspected.
    pub fn mark_file_dirty(&self, path: impl Into<PathBuf>) {
        self.dirty.mark(path);
    }

    /// Enqueue every file under `root`. Used once at startup to seed the
    /// dirty set from the workspace.
    pub fn mark_workspace_dirty(&self, root: &Path) {
        let files = scanner::list_files_recursively(root);
        debug!(count = files.len(), root = %root.display(), "seeding dirty set");
        self.dirty.mark_all(files);
    }

    pub fn pending_files(&self) -> usize {
        self.dirty.len()
    }

    /// Compile the two inspector executables. A project-inspector failure
    /// degrades gracefully (no project metadata); a module-inspector
    /// failure is fatal for inspection and is surfaced prominently.
    pub async fn bootstrap(&self) -> Result<()> {
        let toolchain = &self.config.toolchain;

        self.status.status("Compiling project inspector...");
        match self
            .build_inspector(&toolchain.project_inspector_source, &toolchain.project_inspector_exe())
            .await
        {
            Ok(()) => self.project_inspector_ready.store(true, Ordering::Relaxed),
            Err(error) => {
                self.project_inspector_ready.store(false, Ordering::Relaxed);
                warn!(%error, "project inspector unavailable; continuing without project metadata");
            }
        }

        self.status.status("Compiling module inspector...");
        match self
            .build_inspector(&toolchain.module_inspector_source, &toolchain.module_inspector_exe())
            .await
        {
            Ok(()) => Ok(()),
            Err(error) => {
                self.status.error(&format!("Failed to build module inspector: {error}"));
                Err(error)
            }
        }
    }

    async fn build_inspector(&self, source: &Path, exe: &Path) -> Result<()> {
        let toolchain = &self.config.toolchain;
        let obj_dir = toolchain.obj_dir();
        let args: Vec<&OsStr> = vec![
            OsStr::new("--make"),
            source.as_os_str(),
            OsStr::new("-o"),
            exe.as_os_str(),
            OsStr::new("-outputdir"),
            obj_dir.as_os_str(),
        ];
        let out = self.invoker.invoke(&toolchain.compiler, args).await?;
        if !out.success() {
            return Err(ScoutError::Bootstrap {
                tool: exe.file_name().unwrap_or_default().to_string_lossy().into_owned(),
                stderr: out.stderr,
            });
        }
        Ok(())
    }

    /// One steady-state cycle: drain the dirty set, partition into project
    /// groups and standalone files, refresh each. Project metadata is
    /// refreshed before that project's files.
    pub async fn run_cycle(&self) {
        let drained = self.dirty.drain();
        if drained.is_empty() {
            return;
        }

        let mut project_dirs: HashSet<PathBuf> = HashSet::new();
        let mut standalone: HashSet<PathBuf> = HashSet::new();
        for file in drained {
            match scanner::find_project_dir(&file) {
                Some(dir) => {
                    project_dirs.insert(dir);
                }
                None => {
                    standalone.insert(file);
                }
            }
        }

        for dir in project_dirs {
            self.refresh_project_tree(&dir).await;
        }
        for file in standalone {
            self.refresh_module_info(&file).await;
        }
    }

    /// Refresh project metadata, then every source file under the project
    /// directory (skipping build-output subtrees).
    async fn refresh_project_tree(&self, dir: &Path) {
        info!(project_dir = %dir.display(), "re-inspecting project");
        let started = Instant::now();

        if let Some(descriptor) = scanner::project_descriptor_in(dir) {
            self.refresh_project_info(dir, &descriptor).await;
        }

        for file in scanner::haskell_sources_under(dir) {
            self.refresh_module_info(&file).await;
        }

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "project inspection finished");
    }

    async fn refresh_project_info(&self, dir: &Path, descriptor: &ProjectDescriptor) {
        if !self.project_inspector_ready.load(Ordering::Relaxed) {
            return;
        }

        let exe = self.config.toolchain.project_inspector_exe();
        let out = match self.invoker.invoke(&exe, [descriptor.path.as_os_str()]).await {
            Ok(out) => out,
            Err(error) => {
                self.report_invocation_failure(&exe, &error);
                return;
            }
        };
        if !out.success() {
            debug!(code = out.code, project = %descriptor.name, "project inspector reported failure");
            return;
        }

        let parsed: ProjectInspection = match serde_json::from_str(&out.stdout) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(%error, project = %descriptor.name, "malformed project inspector output");
                return;
            }
        };
        if let Some(error) = parsed.error {
            debug!(%error, project = %descriptor.name, "project inspector reported error");
            return;
        }
        let Some(executables) = parsed.executables else {
            return;
        };

        let build_file_name = descriptor
            .path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        self.index.put_project(
            descriptor.name.clone(),
            ProjectInfo {
                dir: dir.to_path_buf(),
                build_file_name,
                executables,
            },
        );
    }

    /// Rebuild module information for one source file.
    ///
    /// Skips non-Haskell files, and (unless mtime checking is disabled)
    /// files whose modification time has not advanced past the last
    /// successful inspection. On any failure the prior entry is left
    /// untouched; the file stays eligible for retry next cycle.
    pub async fn refresh_module_info(&self, path: &Path) {
        if !scanner::is_haskell_source(path) {
            return;
        }

        let modified = match std::fs::metadata(path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(error) => {
                debug!(%error, file = %path.display(), "cannot stat file");
                return;
            }
        };
        if self.config.agent.check_mtime {
            // A never-inspected file has no recorded time and always runs.
            if let Some(inspected_at) = self.index.inspected_at(path) {
                if inspected_at >= modified {
                    debug!(file = %path.display(), "unchanged since last inspection");
                    return;
                }
            }
        }

        let exe = self.config.toolchain.module_inspector_exe();
        let out = match self.invoker.invoke(&exe, [path.as_os_str()]).await {
            Ok(out) => out,
            Err(error) => {
                self.report_invocation_failure(&exe, &error);
                return;
            }
        };
        if !out.success() {
            debug!(code = out.code, file = %path.display(), "module inspector reported failure; keeping previous data");
            return;
        }

        let mut info: ModuleInfo = match serde_json::from_str(&out.stdout) {
            Ok(info) => info,
            Err(error) => {
                debug!(%error, file = %path.display(), "malformed module inspector output");
                return;
            }
        };
        if let Some(error) = info.error.as_deref() {
            debug!(error, file = %path.display(), "module inspector reported error");
            return;
        }

        // Any import we have not seen yet triggers a lazy lookup of that
        // module's exports.
        for import in &info.imports {
            if !self.index.has_std_module(&import.name) {
                self.load_standard_module(&import.name).await;
            }
        }

        info.inspected_at = modified;

        if let Err(error) = cache::store(&self.config.agent.cache_path, &self.index) {
            warn!(%error, "failed to write module cache");
        }

        self.index.put_module_info(path.to_path_buf(), info);
    }

    async fn load_standard_module(&self, name: &str) {
        if !self.config.completion.lexicon {
            return;
        }
        match self.lexicon.browse(name).await {
            Ok(exports) => self.index.put_std_module(name.to_string(), exports),
            Err(error) => debug!(module = name, %error, "could not browse module exports"),
        }
    }

    /// Launch failures are surfaced to the user once per program, then
    /// demoted to the log.
    fn report_invocation_failure(&self, program: &Path, error: &ScoutError) {
        let key = program.to_string_lossy().into_owned();
        let first = self.reported_launch_failures.lock().insert(key.clone());
        if first {
            self.status.error(&format!("Tool invocation failed: {error}"));
        } else {
            debug!(program = %key, %error, "tool invocation failed");
        }
    }

    /// Steady-state loop: run a cycle, then sleep until the next one or
    /// until shutdown is signaled. The sleep is interrupted cleanly.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.run_cycle().await;
            tokio::select! {
                _ = tokio::time::sleep(self.config.agent.sleep()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("inspection agent stopped");
    }

    /// Full lifecycle on a background task: bootstrap, seed from the
    /// workspace roots, then loop until shut down. A fatal bootstrap ends
    /// the task (the failure has already been surfaced).
    pub fn spawn(self: Arc<Self>, workspace_roots: Vec<PathBuf>) -> AgentHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let agent = self;
        let task = tokio::spawn(async move {
            if agent.bootstrap().await.is_err() {
                return;
            }
            for root in &workspace_roots {
                agent.mark_workspace_dirty(root);
            }
            agent.run(shutdown_rx).await;
        });
        AgentHandle { shutdown: shutdown_tx, task }
    }
}

/// Handle to a spawned agent; dropping it does not stop the task, calling
/// [`AgentHandle::shutdown`] does.
pub struct AgentHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AgentHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
