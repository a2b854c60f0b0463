use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ANN: &str = "ann@example.com";
const BOB: &str = "bob@example.com";

fn senti_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("senti");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "The support team was great\n\n   \nShipping was slow and the box was broken\nArrived on Tuesday\n",
    )
    .unwrap();
    fs::write(
        files_dir.join("reviews.csv"),
        "id,comment,stars\n1,Excellent value,5\n2,,3\n3,\"Terrible, awful fit\",1\n4,Love it,5\n",
    )
    .unwrap();
    fs::write(files_dir.join("blank.txt"), "  \n\t\n").unwrap();
    fs::write(files_dir.join("slides.pdf"), "%PDF-1.4").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/senti.sqlite"

[storage]
backend = "filesystem"
root = "{root}/data/blobs"

[classifier]
provider = "lexicon"

[server]
bind = "127.0.0.1:7341"

[logging]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("senti.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_senti(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = senti_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run senti binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Upload a fixture file and return its id.
fn upload(tmp: &TempDir, config_path: &Path, name: &str, user: &str) -> String {
    let path = tmp.path().join("files").join(name);
    let (stdout, stderr, success) =
        run_senti(config_path, &["upload", path.to_str().unwrap(), "--user", user]);
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("id:"))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no id in upload output: {}", stdout))
}

fn analyze(config_path: &Path, file_id: &str, user: &str, mode: &str) -> Value {
    let (stdout, stderr, success) = run_senti(
        config_path,
        &["analyze", file_id, "--user", user, "--mode", mode],
    );
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_senti(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/senti.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_senti(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_senti(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_senti(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_upload_and_list_files() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);

    let id = upload(&tmp, &config_path, "notes.txt", ANN);

    let (stdout, _, success) = run_senti(&config_path, &["files", "--user", ANN]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("notes.txt"));
    assert!(stdout.contains("1 file(s)"));

    let (stdout, _, success) = run_senti(&config_path, &["files", "--user", BOB]);
    assert!(success);
    assert!(stdout.contains("No files."));
}

#[test]
fn test_upload_rejects_unsupported_type() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);

    let path = tmp.path().join("files/slides.pdf");
    let (_, stderr, success) =
        run_senti(&config_path, &["upload", path.to_str().unwrap(), "--user", ANN]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));
}

#[test]
fn test_analyze_per_unit_lines() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "notes.txt", ANN);

    let resp = analyze(&config_path, &id, ANN, "per-unit");
    assert_eq!(resp["summary"]["total"], 3);
    assert_eq!(resp["summary"]["positive"], 1);
    assert_eq!(resp["summary"]["negative"], 1);
    assert_eq!(resp["summary"]["neutral"], 1);
    assert_eq!(resp["summary"]["overall"], "MIXED");

    let indices: Vec<i64> = resp["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["index"].as_i64().unwrap())
        .collect();
    assert_eq!(indices, vec![1, 4, 5]);
    assert!(resp["result_url"].as_str().unwrap().starts_with("file://"));
}

#[test]
fn test_analyze_whole_document() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "notes.txt", ANN);

    let resp = analyze(&config_path, &id, ANN, "whole-document");
    assert_eq!(resp["overall_result"]["label"], "NEGATIVE");

    let (stdout, _, success) = run_senti(&config_path, &["results", "--user", ANN]);
    assert!(success);
    assert!(stdout.contains(resp["result_id"].as_str().unwrap()));
    assert!(stdout.contains("whole-document"));
}

#[test]
fn test_whole_document_on_blank_file_fails() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "blank.txt", ANN);

    let (_, stderr, success) = run_senti(
        &config_path,
        &["analyze", &id, "--user", ANN, "--mode", "whole-document"],
    );
    assert!(!success);
    assert!(stderr.contains("no text to analyze"));

    let (stdout, _, _) = run_senti(&config_path, &["results", "--user", ANN]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_download_csv_and_json() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "reviews.csv", ANN);
    let resp = analyze(&config_path, &id, ANN, "per-unit");
    let result_id = resp["result_id"].as_str().unwrap();

    let (csv_out, stderr, success) =
        run_senti(&config_path, &["download", result_id, "--user", ANN]);
    assert!(success, "download failed: {}", stderr);
    let mut lines = csv_out.lines();
    assert_eq!(
        lines.next().unwrap(),
        "index,text,text_column,row,label,score"
    );
    assert_eq!(lines.count(), 3);
    assert!(csv_out.contains("\"Terrible, awful fit\""));

    let out_path = tmp.path().join("result.json");
    let (_, stderr, success) = run_senti(
        &config_path,
        &[
            "download",
            result_id,
            "--user",
            ANN,
            "--format",
            "json",
            "--output",
            out_path.to_str().unwrap(),
        ],
    );
    assert!(success, "download failed: {}", stderr);
    let record: Value = serde_json::from_slice(&fs::read(&out_path).unwrap()).unwrap();
    assert_eq!(record["id"], result_id);
    assert_eq!(record["analysis_type"], "per-unit");
    assert_eq!(record["rows"].as_array().unwrap().len(), 3);
    assert!(record.get("store_id").is_none());
}

#[test]
fn test_download_rejects_bad_format_and_foreign_user() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "notes.txt", ANN);
    let resp = analyze(&config_path, &id, ANN, "whole-document");
    let result_id = resp["result_id"].as_str().unwrap();

    let (_, stderr, success) = run_senti(
        &config_path,
        &["download", result_id, "--user", ANN, "--format", "xml"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid format"));

    let (_, stderr, success) = run_senti(&config_path, &["download", result_id, "--user", ANN]);
    assert!(!success);
    assert!(stderr.contains("no rows available"));

    let (_, stderr, success) = run_senti(
        &config_path,
        &["download", result_id, "--user", BOB, "--format", "json"],
    );
    assert!(!success);
    assert!(stderr.contains("not found or unauthorized"));
}

#[test]
fn test_delete_file() {
    let (tmp, config_path) = setup_test_env();
    run_senti(&config_path, &["init"]);
    let id = upload(&tmp, &config_path, "notes.txt", ANN);

    let (_, _, success) = run_senti(&config_path, &["delete", &id, "--user", BOB]);
    assert!(!success, "another user must not delete the file");

    let (stdout, _, success) = run_senti(&config_path, &["delete", &id, "--user", ANN]);
    assert!(success);
    assert!(stdout.contains("Deleted"));

    let (stdout, _, _) = run_senti(&config_path, &["files", "--user", ANN]);
    assert!(stdout.contains("No files."));

    let blobs = fs::read_dir(tmp.path().join("data/blobs")).unwrap().count();
    assert_eq!(blobs, 0);
}
