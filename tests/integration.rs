mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use common::{MockState, Shared};
use tempfile::TempDir;

fn yams_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("yams");
    path
}

/// Start a mock store and write a config pointing at it.
fn setup_test_env(rules: &[(&str, &str)]) -> (TempDir, PathBuf, Shared) {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));
    state.lock().unwrap().rules = rules
        .iter()
        .map(|(pattern, response)| (pattern.to_string(), response.to_string()))
        .collect();
    let addr = common::start_in_background(state.clone());

    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[store]
url = "{}"
user = "admin"
password = "admin"
database = "yams-test"
timeout_secs = 5

[crawler]
batch_size = 10
audit = false

[query]
on_duplicate = "skip"
"#,
        common::store_url(addr)
    );

    let config_path = config_dir.join("yams.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, state)
}

fn run_yams(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = yams_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("YAMS_LOG")
        .env_remove("YAMS_STORE_PASSWORD")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run yams binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ─── CLI surface ───

#[test]
fn test_help_lists_commands() {
    let output = Command::new(yams_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["stats", "search", "links", "delete-branch", "tree-types", "icons"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, success) = run_yams(&tmp.path().join("absent.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("yams.toml");
    fs::write(
        &config_path,
        "[store]\nurl = \"http://127.0.0.1:1/rest/\"\n[crawler]\nbatch_size = 0\n",
    )
    .unwrap();
    let (_stdout, stderr, success) = run_yams(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("batch_size"));
}

#[test]
fn test_bad_criterion_fails_before_store() {
    let (_tmp, config_path, state) = setup_test_env(&[]);
    let (_stdout, stderr, success) =
        run_yams(&config_path, &["search", "--criterion", "Session|is|contains"]);
    assert!(!success);
    assert!(stderr.contains("Invalid criterion"));
    assert!(state.lock().unwrap().requests.is_empty());
}

// ─── Database lifecycle ───

#[test]
fn test_init_creates_database_once() {
    let (_tmp, config_path, state) = setup_test_env(&[]);

    let (stdout, stderr, success) = run_yams(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database 'yams-test' is ready."));
    assert!(state.lock().unwrap().databases.contains("yams-test"));

    let (_stdout, _stderr, success) = run_yams(&config_path, &["init"]);
    assert!(success);
    let puts = state
        .lock()
        .unwrap()
        .requests
        .iter()
        .filter(|(method, path)| method == "PUT" && path == "yams-test")
        .count();
    assert_eq!(puts, 1);
}

#[test]
fn test_stats_are_cached_after_first_run() {
    let stats = "<DatabaseStats><KnownDocuments>7</KnownDocuments>\
                 <MissingDocuments>2</MissingDocuments><DuplicateDocuments>0</DuplicateDocuments>\
                 <RootDocuments>1</RootDocuments><Cached>false</Cached>\
                 <RootDocumentID>corpus</RootDocumentID></DatabaseStats>";
    let (_tmp, config_path, _state) = setup_test_env(&[("<KnownDocuments>", stats)]);

    let (stdout, stderr, success) = run_yams(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Known:       7"));
    assert!(stdout.contains("Cached:      no"));
    assert!(stdout.contains("corpus"));

    let (stdout, _stderr, success) = run_yams(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Cached:      yes"));

    let (stdout, _stderr, success) = run_yams(&config_path, &["stats", "--clear"]);
    assert!(success);
    assert!(stdout.contains("Cached stats cleared"));

    let (stdout, _stderr, _success) = run_yams(&config_path, &["stats"]);
    assert!(stdout.contains("Cached:      no"));
}

// ─── Crawler ───

#[test]
fn test_links_counts() {
    let (_tmp, config_path, _state) = setup_test_env(&[("count(", "5\n1\n40")]);
    let (stdout, stderr, success) = run_yams(&config_path, &["links", "counts"]);
    assert!(success, "links counts failed: {}", stderr);
    assert!(stdout.contains("Missing:    5"));
    assert!(stdout.contains("Recent:     1"));
    assert!(stdout.contains("Documents:  40"));
}

#[test]
fn test_links_merge_creates_link_document() {
    let missing = "<DatabaseLinks><MissingDocumentLinks ID=\"m\" URI=\"http://a/m.cmdi\"/></DatabaseLinks>";
    let (tmp, config_path, state) = setup_test_env(&[
        ("[position() le", missing),
        ("if (fn:empty(", "0"),
    ]);

    let batch = tmp.path().join("batch.xml");
    fs::write(
        &batch,
        "<DatabaseLinks>\
         <RootDocumentLinks ID=\"r\" URI=\"http://a/r.cmdi\"/>\
         <MissingDocumentLinks ID=\"m\" URI=\"http://a/m.cmdi\"/>\
         </DatabaseLinks>",
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_yams(&config_path, &["links", "merge", batch.to_str().unwrap()]);
    assert!(success, "links merge failed: {}", stderr);
    assert!(stdout.contains("Merged 1 root, 0 recent, 1 missing link(s)."));
    assert!(stdout.contains("m  http://a/m.cmdi"));

    let state = state.lock().unwrap();
    assert_eq!(
        state.documents.get("yams-test/DatabaseLinks").map(String::as_str),
        Some("<DatabaseLinks/>")
    );
    assert!(state
        .queries
        .iter()
        .any(|q| q.contains("<RootDocumentLinks ID=\"r\" URI=\"http://a/r.cmdi\"/>")));
}

#[test]
fn test_insert_skips_duplicates_by_default() {
    let (tmp, config_path, state) = setup_test_env(&[("let $countValue", "1")]);
    let record = tmp.path().join("record.xml");
    fs::write(&record, "<DataNode ID=\"n1\" URI=\"http://a/n1.cmdi\"/>").unwrap();

    let (stdout, stderr, success) = run_yams(&config_path, &["insert", record.to_str().unwrap()]);
    assert!(success, "insert failed: {}", stderr);
    assert!(stdout.contains("Skipped n1"));
    assert!(state.lock().unwrap().documents.is_empty());

    let (_stdout, _stderr, success) = run_yams(
        &config_path,
        &["insert", record.to_str().unwrap(), "--fail-on-duplicate"],
    );
    assert!(!success);
}

#[test]
fn test_delete_branch_reports_count() {
    let (_tmp, config_path, state) = setup_test_env(&[("count(distinct-values(local:branch(", "3")]);
    let (stdout, stderr, success) = run_yams(&config_path, &["delete-branch", "corpus"]);
    assert!(success, "delete-branch failed: {}", stderr);
    assert!(stdout.contains("Deleted 3 record(s) under corpus."));
    // count, then the delete itself
    assert_eq!(state.lock().unwrap().queries.len(), 2);
}

// ─── Icons ───

#[test]
fn test_icons_add_keeps_other_types() {
    let (tmp, config_path, state) = setup_test_env(&[]);
    let image = tmp.path().join("icon.png");
    fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
    let image = image.to_str().unwrap();

    let (stdout, stderr, success) = run_yams(
        &config_path,
        &["icons", "add", image, "--type", "Session", "--format", "imdi"],
    );
    assert!(success, "icons add failed: {}", stderr);
    assert!(stdout.contains("Stored icon for Session."));
    assert!(stdout.contains("1 icon(s)"));

    let (stdout, stderr, success) =
        run_yams(&config_path, &["icons", "add", image, "--type", "Corpus"]);
    assert!(success, "icons add failed: {}", stderr);
    assert!(stdout.contains("2 icon(s)"));

    let (stdout, _stderr, success) = run_yams(&config_path, &["icons", "list"]);
    assert!(success);
    assert!(stdout.contains("Session"));
    assert!(stdout.contains("imdi"));
    assert!(stdout.contains("Corpus"));
    assert!(stdout.contains("4 bytes"));

    let stored = state
        .lock()
        .unwrap()
        .documents
        .get("yams-test/IconTable")
        .cloned()
        .unwrap();
    assert_eq!(stored.matches("<NodeTypeImage>").count(), 2);
}
