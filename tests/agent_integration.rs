// End-to-end tests for the inspection agent, with stub analysis tools
// standing in for the real executables.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use modscout::{
    cache, CompletionEngine, InspectionAgent, Lexicon, ModuleIndex, ScoutConfig, ToolInvoker,
};

fn write_exec(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Stub module inspector: logs each invocation, optionally fails for one
/// module, and otherwise emits the JSON contract with a tagged declaration
/// derived from the file name.
fn install_module_inspector(
    config: &ScoutConfig,
    log: &Path,
    tag: &str,
    fail_for: Option<&str>,
    imports_json: &str,
) {
    let fail_part = match fail_for {
        Some(name) => format!(r#"if [ "$base" = "{name}" ]; then echo boom >&2; exit 1; fi"#),
        None => String::new(),
    };
    let body = format!(
        r#"echo "$1" >> "{log}"
base=$(basename "$1" .hs)
{fail_part}
printf '{{"moduleName":"%s","imports":{imports_json},"declarations":[{{"identifier":"{tag}_%s","kind":"function","line":1,"column":1}}]}}' "$base" "$base""#,
        log = log.display(),
    );
    write_exec(&config.toolchain.module_inspector_exe(), &body);
}

fn install_broken_module_inspector(config: &ScoutConfig, log: &Path, output: &str) {
    let body = format!(
        r#"echo "$1" >> "{log}"
printf '%s' '{output}'"#,
        log = log.display(),
    );
    write_exec(&config.toolchain.module_inspector_exe(), &body);
}

fn install_project_inspector(config: &ScoutConfig, log: &Path) {
    let body = format!(
        r#"echo "$1" >> "{log}"
printf '{{"executables":[{{"name":"scout-exe"}}]}}'"#,
        log = log.display(),
    );
    write_exec(&config.toolchain.project_inspector_exe(), &body);
}

fn invocations(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .map(|raw| raw.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

struct Fixture {
    _tools: TempDir,
    workspace: TempDir,
    config: ScoutConfig,
}

impl Fixture {
    fn new() -> Self {
        let tools = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        let mut config = ScoutConfig::default();
        config.toolchain.tools_dir = tools.path().to_path_buf();
        config.toolchain.module_inspector_source = tools.path().join("ModuleInspector.hs");
        config.toolchain.project_inspector_source = tools.path().join("ProjectInspector.hs");
        config.agent.cache_path = tools.path().join("module_info.cache");
        config.agent.sleep_secs = 1;
        config.completion.lexicon = false;

        Self {
            _tools: tools,
            workspace,
            config,
        }
    }

    fn tool_log(&self) -> PathBuf {
        self.config.toolchain.tools_dir.join("invocations.log")
    }

    fn source(&self, name: &str) -> PathBuf {
        let path = self.workspace.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("module {name} where\n")).unwrap();
        path
    }

    fn agent(&self) -> Arc<InspectionAgent> {
        let index = Arc::new(ModuleIndex::new());
        let lexicon = Arc::new(Lexicon::new(
            self.config.toolchain.lexicon.clone(),
            ToolInvoker::new(),
        ));
        Arc::new(InspectionAgent::new(self.config.clone(), index, lexicon))
    }
}

#[tokio::test]
async fn successful_inspection_populates_index_and_cache() {
    let fixture = Fixture::new();
    install_module_inspector(&fixture.config, &fixture.tool_log(), "decl", None, "[]");
    let file = fixture.source("Foo.hs");

    let agent = fixture.agent();
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;

    let info = agent.index().module_info(&file).expect("Foo.hs should be indexed");
    assert_eq!(info.module_name, "Foo");
    assert_eq!(info.declarations[0].identifier, "decl_Foo");

    let expected_mtime = fs::metadata(&file).unwrap().modified().unwrap();
    assert_eq!(info.inspected_at, expected_mtime);

    // The cache dump happens before the entry lands in the index, so after
    // a later inspection this file shows up there too.
    let other = fixture.source("Other.hs");
    agent.mark_file_dirty(&other);
    agent.run_cycle().await;
    let cached = cache::load(&fixture.config.agent.cache_path).unwrap();
    assert!(cached.contains_key(&file));
}

#[tokio::test]
async fn unchanged_file_is_not_reinspected() {
    let fixture = Fixture::new();
    install_module_inspector(&fixture.config, &fixture.tool_log(), "decl", None, "[]");
    let file = fixture.source("Foo.hs");

    let agent = fixture.agent();
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;
    assert_eq!(invocations(&fixture.tool_log()).len(), 1);

    // Marked dirty again without touching the file: the mtime check skips
    // the subprocess entirely and the index entry stays put.
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;
    assert_eq!(invocations(&fixture.tool_log()).len(), 1);
}

#[tokio::test]
async fn disabled_mtime_check_forces_reinspection() {
    let mut fixture = Fixture::new();
    fixture.config.agent.check_mtime = false;
    install_module_inspector(&fixture.config, &fixture.tool_log(), "decl", None, "[]");
    let file = fixture.source("Foo.hs");

    let agent = fixture.agent();
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;
    assert_eq!(invocations(&fixture.tool_log()).len(), 2);
}

#[tokio::test]
async fn failing_file_keeps_previous_data_while_others_update() {
    let mut fixture = Fixture::new();
    fixture.config.agent.check_mtime = false;
    let log = fixture.tool_log();

    install_module_inspector(&fixture.config, &log, "one", None, "[]");
    let good = fixture.source("Good.hs");
    let bad = fixture.source("Bad.hs");

    let agent = fixture.agent();
    agent.mark_file_dirty(&good);
    agent.mark_file_dirty(&bad);
    agent.run_cycle().await;

    // Second generation: Bad.hs now fails, Good.hs produces new data.
    install_module_inspector(&fixture.config, &log, "two", Some("Bad"), "[]");
    agent.mark_file_dirty(&good);
    agent.mark_file_dirty(&bad);
    agent.run_cycle().await;

    let good_info = agent.index().module_info(&good).unwrap();
    let bad_info = agent.index().module_info(&bad).unwrap();
    assert_eq!(good_info.declarations[0].identifier, "two_Good");
    assert_eq!(bad_info.declarations[0].identifier, "one_Bad");
}

#[tokio::test]
async fn malformed_json_preserves_previous_entry() {
    let mut fixture = Fixture::new();
    fixture.config.agent.check_mtime = false;
    let log = fixture.tool_log();

    install_module_inspector(&fixture.config, &log, "one", None, "[]");
    let file = fixture.source("Foo.hs");
    let agent = fixture.agent();
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;

    install_broken_module_inspector(&fixture.config, &log, "this is not json");
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;

    let info = agent.index().module_info(&file).unwrap();
    assert_eq!(info.declarations[0].identifier, "one_Foo");
}

#[tokio::test]
async fn error_marker_preserves_previous_entry() {
    let mut fixture = Fixture::new();
    fixture.config.agent.check_mtime = false;
    let log = fixture.tool_log();

    install_module_inspector(&fixture.config, &log, "one", None, "[]");
    let file = fixture.source("Foo.hs");
    let agent = fixture.agent();
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;

    install_broken_module_inspector(&fixture.config, &log, r#"{"error":"parse failure"}"#);
    agent.mark_file_dirty(&file);
    agent.run_cycle().await;

    let info = agent.index().module_info(&file).unwrap();
    assert!(info.is_reliable());
    assert_eq!(info.declarations[0].identifier, "one_Foo");
}

#[tokio::test]
async fn dirty_file_in_project_refreshes_descriptor_and_all_sources() {
    let fixture = Fixture::new();
    let log = fixture.tool_log();
    let project_log = fixture.config.toolchain.tools_dir.join("projects.log");
    install_module_inspector(&fixture.config, &log, "decl", None, "[]");
    install_project_inspector(&fixture.config, &project_log);

    fs::write(fixture.workspace.path().join("scout.cabal"), "name: scout\n").unwrap();
    let a = fixture.source("src/A.hs");
    let b = fixture.source("src/B.hs");
    let generated = fixture.source("dist-newstyle/Gen.hs");

    let agent = fixture.agent();
    // One dirty file is enough to refresh the whole project tree.
    agent.mark_file_dirty(&a);
    agent.run_cycle().await;

    assert!(agent.index().module_info(&a).is_some());
    assert!(agent.index().module_info(&b).is_some());
    assert!(agent.index().module_info(&generated).is_none());

    let project = agent.index().project("scout").expect("project metadata");
    assert_eq!(project.dir, fixture.workspace.path());
    assert_eq!(project.build_file_name, "scout.cabal");
    assert_eq!(project.executables[0].name, "scout-exe");
    assert_eq!(invocations(&project_log).len(), 1);
}

#[tokio::test]
async fn standard_modules_are_browsed_lazily_once() {
    let mut fixture = Fixture::new();
    fixture.config.completion.lexicon = true;
    let lexicon_log = fixture.config.toolchain.tools_dir.join("lexicon.log");
    let lexicon_tool = fixture.config.toolchain.tools_dir.join("lexicon");
    write_exec(
        &lexicon_tool,
        &format!(
            r#"echo "$@" >> "{log}"
case "$1" in
  browse) printf 'sort\nnub\n' ;;
  lang) printf 'GADTs\n' ;;
  list) printf 'Data.List\n' ;;
esac"#,
            log = lexicon_log.display()
        ),
    );
    fixture.config.toolchain.lexicon = lexicon_tool.to_str().unwrap().to_string();

    install_module_inspector(
        &fixture.config,
        &fixture.tool_log(),
        "decl",
        None,
        r#"[{"importName":"Data.List"}]"#,
    );
    let first = fixture.source("Foo.hs");
    let second = fixture.source("Bar.hs");

    let agent = fixture.agent();
    agent.mark_file_dirty(&first);
    agent.mark_file_dirty(&second);
    agent.run_cycle().await;

    assert_eq!(
        agent.index().std_module("Data.List").unwrap(),
        vec!["sort", "nub"]
    );
    // Both files import Data.List; only the first triggers a browse.
    let browses = invocations(&lexicon_log)
        .into_iter()
        .filter(|line| line.starts_with("browse"))
        .count();
    assert_eq!(browses, 1);
}

#[tokio::test]
async fn completion_queries_read_the_live_index() {
    let fixture = Fixture::new();
    // Every inspected file imports module X, unqualified.
    install_module_inspector(
        &fixture.config,
        &fixture.tool_log(),
        "decl",
        None,
        r#"[{"importName":"X"}]"#,
    );
    let current = fixture.source("Current.hs");
    let x = fixture.source("X.hs");

    let index = Arc::new(ModuleIndex::new());
    let lexicon = Arc::new(Lexicon::new("true", ToolInvoker::new()));
    let agent = Arc::new(InspectionAgent::new(
        fixture.config.clone(),
        Arc::clone(&index),
        Arc::clone(&lexicon),
    ));
    agent.mark_file_dirty(&current);
    agent.mark_file_dirty(&x);
    agent.run_cycle().await;

    let engine = CompletionEngine::new(index, lexicon, fixture.config.completion.clone());
    let candidates = engine.completions(&current, "v = de");
    assert!(candidates
        .iter()
        .any(|candidate| candidate.insertion == "decl_X"));
}

#[tokio::test]
async fn spawned_agent_inspects_and_shuts_down_cleanly() {
    let fixture = Fixture::new();
    install_module_inspector(&fixture.config, &fixture.tool_log(), "decl", None, "[]");
    // The stub compiler succeeds without touching the stub inspectors.
    let compiler = fixture.config.toolchain.tools_dir.join("ghc-stub");
    write_exec(&compiler, "exit 0");
    let mut config = fixture.config.clone();
    config.toolchain.compiler = compiler.to_str().unwrap().to_string();

    let index = Arc::new(ModuleIndex::new());
    let lexicon = Arc::new(Lexicon::new("true", ToolInvoker::new()));
    let agent = Arc::new(InspectionAgent::new(config, Arc::clone(&index), lexicon));

    fixture.source("Foo.hs");
    let handle = Arc::clone(&agent).spawn(vec![fixture.workspace.path().to_path_buf()]);

    let mut indexed = false;
    for _ in 0..50 {
        if !index.is_empty() {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(indexed, "agent never indexed the seeded workspace");

    handle.shutdown().await;
}
