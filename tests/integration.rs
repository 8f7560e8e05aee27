use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kh");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs = root.join("docs");
    fs::create_dir_all(docs.join("ontologies")).unwrap();
    fs::create_dir_all(docs.join("graphs")).unwrap();
    fs::write(
        docs.join("ontologies/brre.md"),
        "---\ncategory: ontology\n---\n# BRRE Guide\n\nBRRE is a Bayesian reasoning engine.\n\nBRRE relates to AUTOAGENCY.\n",
    )
    .unwrap();
    fs::write(
        docs.join("graphs/autoagency.md"),
        "# Autoagency\n\nAUTOAGENCY uses BRRE for planning.\n",
    )
    .unwrap();
    fs::write(
        docs.join("notes.txt"),
        "Deployment notes for the clinical pipeline.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/kh.sqlite"

[source]
root = "{root}/docs"
repository = "voither/knowledge"

[embedding]
provider = "hashed"
dims = 32

[publish]
dir = "{root}/public"

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("kh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn synced_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["init"]);
    let (stdout, stderr, success) = run_kh(&config_path, &["sync", "--revision", "abc123"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/kh.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_kh(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_kh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sync_reports_counts_and_publishes() {
    let (tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["init"]);

    let (stdout, stderr, success) = run_kh(&config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("new: 3"));
    assert!(stdout.contains("embeddings written: 3"));
    assert!(stdout.contains("snapshot: 1"));
    assert!(stdout.trim_end().ends_with("ok"));

    let current = fs::read_to_string(tmp.path().join("public/CURRENT")).unwrap();
    assert_eq!(current.trim(), "1");
    for file in ["metadata.json", "ontology.json", "graph.json", "content_index.json"] {
        assert!(
            tmp.path().join("public/snapshots/1").join(file).exists(),
            "missing {}",
            file
        );
    }
}

#[test]
fn test_second_sync_is_idle() {
    let (_tmp, config_path) = synced_env();

    let (stdout, _, success) = run_kh(&config_path, &["sync"]);
    assert!(success);
    assert!(stdout.contains("new: 0"));
    assert!(stdout.contains("unchanged: 3"));
    assert!(stdout.contains("snapshot: 2"));
}

#[test]
fn test_sync_detects_deletion() {
    let (tmp, config_path) = synced_env();
    fs::remove_file(tmp.path().join("docs/notes.txt")).unwrap();

    let (stdout, _, success) = run_kh(&config_path, &["sync"]);
    assert!(success);
    assert!(stdout.contains("deleted: 1"));
    assert!(stdout.contains("unchanged: 2"));
}

#[test]
fn test_non_utf8_edit_is_not_a_deletion() {
    let (tmp, config_path) = synced_env();
    let path = tmp.path().join("docs/ontologies/brre.md");
    let mut bytes = fs::read(&path).unwrap();
    bytes.push(0xe9);
    fs::write(&path, bytes).unwrap();

    let (stdout, stderr, success) = run_kh(&config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("deleted: 0"), "stdout={}", stdout);
    assert!(stdout.contains("modified: 1"));

    let (stdout, _, success) = run_kh(&config_path, &["related", "brre"]);
    assert!(success);
    assert!(stdout.contains("AUTOAGENCY"));
}

#[test]
fn test_old_snapshots_are_pruned() {
    let (tmp, config_path) = setup_test_env();
    let limited = fs::read_to_string(&config_path)
        .unwrap()
        .replace("[server]", "keep_snapshots = 2\n\n[server]");
    fs::write(&config_path, limited).unwrap();
    run_kh(&config_path, &["init"]);

    for _ in 0..4 {
        let (stdout, stderr, success) = run_kh(&config_path, &["sync"]);
        assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    }

    let snapshots = tmp.path().join("public/snapshots");
    assert!(!snapshots.join("1").exists());
    assert!(!snapshots.join("2").exists());
    assert!(snapshots.join("3").exists());
    assert!(snapshots.join("4").exists());
    let current = fs::read_to_string(tmp.path().join("public/CURRENT")).unwrap();
    assert_eq!(current.trim(), "4");
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();
    run_kh(&config_path, &["init"]);

    let (stdout, _, success) = run_kh(&config_path, &["sync", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("new: 3"));
    assert!(!tmp.path().join("public/CURRENT").exists());

    let (stdout, _, _) = run_kh(&config_path, &["history"]);
    assert!(stdout.contains("No syncs recorded."));
}

#[test]
fn test_sync_missing_root_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("docs")).unwrap();

    let (_, stderr, success) = run_kh(&config_path, &["sync"]);
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_search_finds_published_entry() {
    let (_tmp, config_path) = synced_env();

    let (stdout, stderr, success) = run_kh(&config_path, &["search", "brre"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("BRRE Guide"));
    assert!(stdout.contains("path: ontologies/brre.md"));
}

#[test]
fn test_search_short_query() {
    let (_tmp, config_path) = synced_env();

    let (stdout, _, success) = run_kh(&config_path, &["search", "br"]);
    assert!(success);
    assert!(stdout.contains("at least 3 characters"));
}

#[test]
fn test_related_lists_neighbours() {
    let (_tmp, config_path) = synced_env();

    let (stdout, _, success) = run_kh(&config_path, &["related", "brre"]);
    assert!(success);
    assert!(stdout.contains("AUTOAGENCY"));

    let (stdout, _, success) = run_kh(&config_path, &["related", "nothing-here"]);
    assert!(success);
    assert!(stdout.contains("No related concepts."));
}

#[test]
fn test_highlight_marks_terms() {
    let (tmp, config_path) = synced_env();
    let text = tmp.path().join("input.txt");
    fs::write(&text, "Our planner calls BRRE twice.").unwrap();

    let (stdout, _, success) = run_kh(&config_path, &["highlight", text.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("calls [[BRRE]] twice."));
    assert!(stdout.contains("BRRE: BRRE is a Bayesian reasoning engine"));
}

#[test]
fn test_history_and_stats() {
    let (_tmp, config_path) = synced_env();

    let (stdout, _, success) = run_kh(&config_path, &["history"]);
    assert!(success);
    assert!(stdout.contains("abc123"));
    assert!(stdout.contains("Totals: 3 added"));

    let (stdout, _, success) = run_kh(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   3"));
    assert!(stdout.contains("Embedded:    3 / 3"));
}

#[test]
fn test_export_formats() {
    let (_tmp, config_path) = synced_env();

    let (stdout, _, success) = run_kh(&config_path, &["export", "--format", "graphml"]);
    assert!(success);
    assert!(stdout.contains("<graphml"));
    assert!(stdout.contains("<node id=\"brre\">"));

    let (stdout, _, success) = run_kh(&config_path, &["export", "--format", "cypher"]);
    assert!(success);
    assert!(stdout.contains("MERGE (c:Concept {id: 'brre'})"));
}

#[test]
fn test_completions_without_config() {
    let output = Command::new(kh_binary())
        .args(["--config", "/nonexistent/kh.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("kh"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, config_path) = setup_test_env();
    let bad = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"hashed\"", "provider = \"magic\"");
    fs::write(&config_path, bad).unwrap();

    let (_, stderr, success) = run_kh(&config_path, &["sync"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
    assert!(!tmp.path().join("public").exists());
}
