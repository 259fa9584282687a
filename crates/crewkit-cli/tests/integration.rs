use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn crewkit(project: &Path, home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("crewkit").unwrap();
    cmd.current_dir(project)
        .env("CREWKIT_ROOT", project)
        .env("HOME", home.path())
        .env_remove("CREWKIT_WORKTREE");
    cmd
}

fn git(repo: &Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_repo(repo: &Path) {
    git(repo, &["init", "-b", "main"]);
    git(repo, &["config", "user.name", "Crewkit Test"]);
    git(repo, &["config", "user.email", "test@crewkit.local"]);
    std::fs::write(repo.join("README.md"), "seed\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", "init"]);
}

/// A project dir inside a container dir so sibling worktrees have a home.
fn project() -> (TempDir, std::path::PathBuf) {
    let container = TempDir::new().unwrap();
    let root = container.path().join("app");
    std::fs::create_dir_all(&root).unwrap();
    init_repo(&root);
    (container, root)
}

fn write_config(root: &Path) {
    std::fs::write(
        root.join(".crew-config.json"),
        r#"{
  "profiles": {
    "dev": {
      "name": "dev team",
      "teammates": [
        {"name": "alice", "branch": "feat/a", "role": "developer"},
        {"name": "bob", "branch": "feat/b", "role": "reviewer"}
      ]
    }
  },
  "default": "dev",
  "project": {"main_branch": "main"}
}
"#,
    )
    .unwrap();
}

fn hook(project: &Path, home: &TempDir, event: &str, payload: serde_json::Value) -> String {
    let assert = crewkit(project, home)
        .args(["hook", event])
        .write_stdin(payload.to_string())
        .assert()
        .success();
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config_once() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();

    crewkit(&root, &home)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains(".crew-config.json"));
    assert!(root.join(".crew-config.json").exists());

    crewkit(&root, &home)
        .arg("init")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

// ---------------------------------------------------------------------------
// start / stop / status (seed scenario 4, invariant 8)
// ---------------------------------------------------------------------------

#[test]
fn start_provisions_worktrees_registry_and_state() {
    let (container, root) = project();
    let home = TempDir::new().unwrap();
    write_config(&root);

    let assert = crewkit(&root, &home)
        .args(["--json", "start", "dev"])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("start --json output");

    let wt_a = container.path().join("app-dev-feat--a");
    let wt_b = container.path().join("app-dev-feat--b");
    assert!(wt_a.is_dir(), "alice worktree missing");
    assert!(wt_b.is_dir(), "bob worktree missing");
    assert!(wt_a.join("crew-identity.json").exists());
    assert!(wt_b.join("crew-identity.json").exists());

    assert_eq!(json["profile"], "dev");
    assert_eq!(json["resume"], false);
    let hash = json["config_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 12);
    assert!(json["lead_prompt"]
        .as_str()
        .unwrap()
        .contains("spawn all teammates IN PARALLEL"));

    // Registry and team state live under HOME.
    let identity: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(wt_a.join("crew-identity.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(identity["teammate_name"], "alice");
    assert_eq!(identity["branch"], "feat/a");
    assert_eq!(identity["profile_name"], "dev");

    let crew_dir = home.path().join(".config/crewkit/crew");
    let project_dirs: Vec<_> = std::fs::read_dir(&crew_dir).unwrap().collect();
    assert_eq!(project_dirs.len(), 1);
    let project_dir = project_dirs[0].as_ref().unwrap().path();

    let registry: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(project_dir.join("worktrees.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(registry["worktrees"].as_array().unwrap().len(), 2);

    let state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(project_dir.join("dev/team-state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["status"], "active");
    assert_eq!(state["config_hash"], *hash);
    assert_eq!(state["teammates"]["alice"]["status"], "pending");
    assert_eq!(state["teammates"]["bob"]["status"], "pending");

    // status prints the profile and exits 0.
    crewkit(&root, &home)
        .args(["status", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").and(predicate::str::contains("pending")));
}

#[test]
fn start_twice_is_idempotent_on_paths() {
    let (container, root) = project();
    let home = TempDir::new().unwrap();
    write_config(&root);

    crewkit(&root, &home).args(["start", "dev"]).assert().success();
    crewkit(&root, &home)
        .args(["start", "dev", "--fresh"])
        .assert()
        .success();

    assert!(container.path().join("app-dev-feat--a").is_dir());
    assert!(container.path().join("app-dev-feat--b").is_dir());
}

#[test]
fn stop_cleanup_removes_worktrees_and_gc_finds_nothing() {
    let (container, root) = project();
    let home = TempDir::new().unwrap();
    write_config(&root);

    crewkit(&root, &home).args(["start", "dev"]).assert().success();
    crewkit(&root, &home)
        .args(["stop", "dev", "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped profile 'dev'"));

    assert!(!container.path().join("app-dev-feat--a").exists());
    assert!(!container.path().join("app-dev-feat--b").exists());

    crewkit(&root, &home)
        .args(["gc", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No orphaned worktrees."));
}

#[test]
fn gc_reclaims_stopped_profiles_worktrees() {
    let (container, root) = project();
    let home = TempDir::new().unwrap();
    write_config(&root);

    crewkit(&root, &home).args(["start", "dev"]).assert().success();
    // Stop WITHOUT cleanup: worktrees remain, then gc reclaims them.
    crewkit(&root, &home).args(["stop", "dev"]).assert().success();
    assert!(container.path().join("app-dev-feat--a").is_dir());

    crewkit(&root, &home)
        .args(["gc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
    assert!(container.path().join("app-dev-feat--a").is_dir(), "without --force nothing moves");

    crewkit(&root, &home)
        .args(["gc", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));
    assert!(!container.path().join("app-dev-feat--a").exists());
    assert!(!container.path().join("app-dev-feat--b").exists());
}

#[test]
fn start_rejects_invalid_config() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    std::fs::write(
        root.join(".crew-config.json"),
        r#"{"team": {"name": "t", "teammates": [{"name": "a"}]}, "project": {"main_branch": "main"}}"#,
    )
    .unwrap();

    crewkit(&root, &home)
        .args(["start"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing a branch"));
}

#[test]
fn status_without_state_is_fine() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    crewkit(&root, &home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No team state"));
}

// ---------------------------------------------------------------------------
// Hook cycle (seed scenarios 1 and 2)
// ---------------------------------------------------------------------------

#[test]
fn solo_capture_cycle_feeds_next_session() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();

    for (tool, input) in [
        ("Read", serde_json::json!({"file_path": "/p/src/a.ts"})),
        ("Edit", serde_json::json!({"file_path": "/p/src/a.ts"})),
        (
            "Task",
            serde_json::json!({"subagent_type": "error-detective", "prompt": "why NPE?"}),
        ),
    ] {
        hook(
            &root,
            &home,
            "post-tool-use",
            serde_json::json!({"session_id": "s1", "tool_name": tool, "tool_input": input,
                               "cwd": root.to_string_lossy()}),
        );
    }
    hook(
        &root,
        &home,
        "session-end",
        serde_json::json!({"session_id": "s1", "cwd": root.to_string_lossy()}),
    );

    // Stats over the store see the capture: one read record plus one edit
    // record for a.ts.
    let assert = crewkit(&root, &home)
        .args(["--json", "stats", "files"])
        .assert()
        .success();
    let rows: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let a_ts = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["key"] == "a.ts")
        .expect("a.ts row");
    assert_eq!(a_ts["count"], 2);
    crewkit(&root, &home)
        .args(["stats", "agents"])
        .assert()
        .success()
        .stdout(predicate::str::contains("error-detective"));

    // The next session gets the summary injected.
    let out = hook(
        &root,
        &home,
        "session-start",
        serde_json::json!({"session_id": "s2", "cwd": root.to_string_lossy()}),
    );
    let json: serde_json::Value = serde_json::from_str(out.trim()).expect("session-start JSON");
    let context = json["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert_eq!(json["hookSpecificOutput"]["hookEventName"], "SessionStart");
    // Read + Edit of one file are two operations: files=2, subagents=1.
    assert!(context.contains("2 file(s), 1 subagent(s)"));
    assert!(context.contains("## Recent Files"));
}

#[test]
fn handoff_wins_over_last_session_section() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();

    hook(
        &root,
        &home,
        "post-tool-use",
        serde_json::json!({"session_id": "s1", "tool_name": "Edit",
                           "tool_input": {"file_path": "/p/src/core.rs"},
                           "cwd": root.to_string_lossy()}),
    );
    hook(
        &root,
        &home,
        "session-end",
        serde_json::json!({"session_id": "s1", "cwd": root.to_string_lossy()}),
    );
    hook(
        &root,
        &home,
        "pre-compact",
        serde_json::json!({"session_id": "s1", "cwd": root.to_string_lossy()}),
    );

    let out = hook(
        &root,
        &home,
        "session-start",
        serde_json::json!({"session_id": "s2", "cwd": root.to_string_lossy()}),
    );
    let json: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    let context = json["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.contains("## Session Handoff"));
    assert!(context.contains("core.rs"));
    assert!(!context.contains("## Last Session"));
}

#[test]
fn branch_aware_session_resume() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();

    // Session on feat/x, then a later one on main.
    git(&root, &["checkout", "-b", "feat/x"]);
    hook(
        &root,
        &home,
        "session-end",
        serde_json::json!({"session_id": "s-feat", "cwd": root.to_string_lossy()}),
    );
    git(&root, &["checkout", "main"]);
    hook(
        &root,
        &home,
        "session-end",
        serde_json::json!({"session_id": "s-main", "cwd": root.to_string_lossy()}),
    );

    // Back on feat/x, the injected context is the feat/x session even
    // though the main session is more recent.
    git(&root, &["checkout", "feat/x"]);
    let out = hook(
        &root,
        &home,
        "session-start",
        serde_json::json!({"session_id": "s-next", "cwd": root.to_string_lossy()}),
    );
    let json: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    let context = json["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.contains("Branch Context (feat/x)"));
    assert!(context.contains("s-feat"));
    assert!(!context.contains("## Last Session"));
}

#[test]
fn hooks_disabled_by_marker_and_silent_on_garbage() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    std::fs::write(root.join(".crewkit-disable"), b"").unwrap();

    let out = hook(
        &root,
        &home,
        "post-tool-use",
        serde_json::json!({"session_id": "s1", "tool_name": "Edit",
                           "tool_input": {"file_path": "/p/a.rs"},
                           "cwd": root.to_string_lossy()}),
    );
    assert!(out.trim().is_empty());

    // Garbage on stdin still exits 0 with no output.
    crewkit(&root, &home)
        .args(["hook", "session-start"])
        .write_stdin("garbage {{{")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ---------------------------------------------------------------------------
// prune / stats surfaces
// ---------------------------------------------------------------------------

#[test]
fn prune_dry_run_reports_zero_on_fresh_store() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    crewkit(&root, &home)
        .args(["prune", "30", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 record(s)"));
}

#[test]
fn stats_summary_on_empty_store_exits_zero() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    crewkit(&root, &home)
        .args(["stats", "summary"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// merge-preview (seed scenario 5)
// ---------------------------------------------------------------------------

#[test]
fn merge_preview_reports_overlap_and_conflict() {
    let (_container, root) = project();
    let home = TempDir::new().unwrap();
    std::fs::write(root.join("core.ts"), "base\n").unwrap();
    git(&root, &["add", "."]);
    git(&root, &["commit", "-m", "add core"]);

    git(&root, &["checkout", "-b", "feat/a"]);
    std::fs::write(root.join("core.ts"), "alice\n").unwrap();
    git(&root, &["commit", "-am", "alice"]);
    git(&root, &["checkout", "main"]);
    git(&root, &["checkout", "-b", "feat/b"]);
    std::fs::write(root.join("core.ts"), "bob\n").unwrap();
    git(&root, &["commit", "-am", "bob"]);
    // Diverge main itself so both branches genuinely conflict.
    git(&root, &["checkout", "main"]);
    std::fs::write(root.join("core.ts"), "mainline\n").unwrap();
    git(&root, &["commit", "-am", "mainline core"]);

    std::fs::write(
        root.join(".crew-config.json"),
        r#"{
  "team": {
    "name": "core",
    "teammates": [
      {"name": "alice", "branch": "feat/a"},
      {"name": "bob", "branch": "feat/b"}
    ]
  },
  "project": {"main_branch": "main"}
}
"#,
    )
    .unwrap();

    let assert = crewkit(&root, &home)
        .args(["--json", "merge-preview"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let branches = json["branches"].as_array().unwrap();
    let alice = branches.iter().find(|b| b["teammate"] == "alice").unwrap();
    assert_eq!(alice["status"], "conflict");
    assert!(alice["conflict_files"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "core.ts"));

    let overlaps = json["overlaps"].as_array().unwrap();
    assert_eq!(overlaps.len(), 1);
    assert!(overlaps[0]["files"].as_array().unwrap().iter().any(|f| f == "core.ts"));
}
