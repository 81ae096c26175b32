use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify::{EventKind, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::agent::InspectionAgent;
use crate::browse;
use crate::cache;
use crate::completion::CompletionEngine;
use crate::config::ScoutConfig;
use crate::invoker::ToolInvoker;
use crate::lexicon::Lexicon;
use crate::storage::ModuleIndex;

/// Inspect Haskell sources with external tools and answer completion
/// queries from the resulting index. Stands in for the host editor's
/// event surface.
#[derive(Debug, Parser)]
#[command(name = "modscout", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect every file under a workspace root once and print a summary.
    Scan {
        path: PathBuf,
        /// Skip pre-warming the index from the cache file.
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect the file's project, then answer one completion query.
    Complete {
        file: PathBuf,
        /// Contents of the current line up to the cursor.
        #[arg(long)]
        line: String,
    },
    /// List every known declaration, or locate one identifier.
    Browse {
        path: PathBuf,
        /// Jump target; prints its source position instead of the full list.
        #[arg(long)]
        identifier: Option<String>,
    },
    /// Keep the agent running and feed it filesystem change events.
    Watch { path: PathBuf },
}

struct App {
    config: ScoutConfig,
    index: Arc<ModuleIndex>,
    agent: Arc<InspectionAgent>,
    completion: CompletionEngine,
    lexicon: Arc<Lexicon>,
}

impl App {
    fn build(config: ScoutConfig) -> Self {
        let index = Arc::new(ModuleIndex::new());
        let invoker = ToolInvoker::with_timeout(config.toolchain.invoke_timeout());
        let lexicon = Arc::new(Lexicon::new(config.toolchain.lexicon.clone(), invoker));
        let agent = Arc::new(InspectionAgent::new(
            config.clone(),
            Arc::clone(&index),
            Arc::clone(&lexicon),
        ));
        let completion = CompletionEngine::new(
            Arc::clone(&index),
            Arc::clone(&lexicon),
            config.completion.clone(),
        );
        Self {
            config,
            index,
            agent,
            completion,
            lexicon,
        }
    }

    /// Bootstrap the inspectors and run one full pass over `root`.
    async fn inspect_once(&self, root: &Path) -> Result<()> {
        self.agent
            .bootstrap()
            .await
            .context("could not build the analysis tools")?;
        self.agent.mark_workspace_dirty(root);
        self.agent.run_cycle().await;
        Ok(())
    }

    fn print_summary(&self) {
        let stats = self.index.stats();
        println!(
            "{} modules, {} declarations, {} standard modules, {} projects",
            stats.modules, stats.declarations, stats.std_modules, stats.projects
        );
        for (name, project) in self.index.projects().iter() {
            let executables: Vec<&str> = project
                .executables
                .iter()
                .map(|exe| exe.name.as_str())
                .collect();
            println!("  project {name} ({}): [{}]", project.dir.display(), executables.join(", "));
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ScoutConfig::load(path).context("could not load configuration")?,
        None => ScoutConfig::default(),
    };

    match cli.command {
        Command::Scan { path, no_cache } => {
            let app = App::build(config);
            if !no_cache {
                cache::prewarm(&app.config.agent.cache_path, &app.index);
            }
            app.inspect_once(&path).await?;
            app.print_summary();
        }
        Command::Complete { file, line } => {
            let app = App::build(config);
            let root = crate::scanner::find_project_dir(&file)
                .unwrap_or_else(|| file.parent().unwrap_or(Path::new(".")).to_path_buf());
            app.inspect_once(&root).await?;
            if app.config.completion.lexicon {
                app.lexicon.prime().await;
            }
            for candidate in app.completion.completions(&file, &line) {
                println!("{}\t{}", candidate.display, candidate.insertion);
            }
        }
        Command::Browse { path, identifier } => {
            let app = App::build(config);
            app.inspect_once(&path).await?;
            match identifier {
                Some(identifier) => match browse::find_declaration(&app.index, &identifier) {
                    Some(site) => println!("{}:{}:{}", site.file.display(), site.line, site.column),
                    None => anyhow::bail!("identifier `{identifier}` not found"),
                },
                None => {
                    for item in browse::all_declarations(&app.index) {
                        println!("{}", item.label);
                    }
                }
            }
        }
        Command::Watch { path } => {
            let app = App::build(config);
            cache::prewarm(&app.config.agent.cache_path, &app.index);
            if app.config.completion.lexicon {
                app.lexicon.prime().await;
            }

            let handle = Arc::clone(&app.agent).spawn(vec![path.clone()]);

            // Filesystem events stand in for the editor's dirty marks.
            // Removals evict the affected index entries.
            let agent = Arc::clone(&app.agent);
            let index = Arc::clone(&app.index);
            let mut watcher =
                notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
                    let Ok(event) = event else { return };
                    match event.kind {
                        EventKind::Remove(_) => {
                            for path in event.paths {
                                if index.remove_module(&path) {
                                    info!(file = %path.display(), "evicted removed file");
                                }
                            }
                        }
                        EventKind::Create(_) | EventKind::Modify(_) => {
                            for path in event.paths {
                                agent.mark_file_dirty(path);
                            }
                        }
                        _ => {}
                    }
                })
                .context("could not create filesystem watcher")?;
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .with_context(|| format!("could not watch {}", path.display()))?;

            info!(root = %path.display(), "watching; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;

            if handle.is_finished() {
                warn!("inspection agent had already stopped");
            }
            handle.shutdown().await;
            app.print_summary();
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("modscout={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
