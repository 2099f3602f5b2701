use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Command running in an isolated directory with its own database
fn taggable(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("taggable");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("TAGGABLE__GENERAL__DATABASE_PATH", dir.path().join("tags.sqlite"))
        .env("TAGGABLE__SUBJECTS__POST", "posts")
        .args(["--log-level", "warn"]);
    cmd
}

fn json_output(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("taggable.toml");

    taggable(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[subjects]"));
    assert!(content.contains("delimiter = \",\""));

    taggable(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn config_show_reflects_env_overrides() {
    let dir = TempDir::new().expect("temp dir");

    taggable(&dir)
        .env("TAGGABLE__TAGGING__DELIMITER", ";")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("delimiter = \";\""))
        .stdout(predicate::str::contains("post = \"posts\""));
}

#[test]
fn tags_create_then_list_as_json() {
    let dir = TempDir::new().expect("temp dir");

    taggable(&dir)
        .args(["tags", "create", "Hello World", "--group", "Greetings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello-world"));

    let tags = json_output(taggable(&dir).args(["tags", "list", "--json"]));
    let tags = tags.as_array().expect("array");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["slug"], "hello-world");
    assert_eq!(tags[0]["group"], "greetings");
    assert_eq!(tags[0]["name"]["en"], "Hello World");

    taggable(&dir)
        .args(["tags", "create", "hello world!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already taken"));
}

#[test]
fn rename_keeps_slug() {
    let dir = TempDir::new().expect("temp dir");
    let tag = json_output(taggable(&dir).args(["tags", "create", "Original", "--json"]));
    let id = tag["id"].to_string();

    taggable(&dir)
        .args(["tags", "rename", id.as_str(), "Renamed"])
        .assert()
        .success();

    let shown = json_output(taggable(&dir).args(["tags", "show", id.as_str(), "--json"]));
    assert_eq!(shown["name"]["en"], "Renamed");
    assert_eq!(shown["slug"], "original");
}

#[test]
fn subject_tagging_round_trip() {
    let dir = TempDir::new().expect("temp dir");

    taggable(&dir)
        .args(["subject", "tag", "post", "1", "rust, async, cli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Attached 3"));

    taggable(&dir)
        .args(["subject", "retag", "post", "1", "rust, cli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("detached 1"));

    taggable(&dir)
        .args(["subject", "retag", "post", "1", "cli, rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    let tags = json_output(taggable(&dir).args(["subject", "show", "post", "1", "--json"]));
    let slugs: Vec<&str> = tags
        .as_array()
        .expect("array")
        .iter()
        .map(|t| t["slug"].as_str().expect("slug"))
        .collect();
    assert_eq!(slugs, vec!["rust", "cli"]);

    taggable(&dir)
        .args(["subject", "untag", "post", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("detached 2"));
}

#[test]
fn tag_entries_and_reorder() {
    let dir = TempDir::new().expect("temp dir");
    for id in ["2", "1"] {
        taggable(&dir)
            .args(["subject", "tag", "post", id, "red, blue"])
            .assert()
            .success();
    }

    let tags = json_output(taggable(&dir).args(["tags", "list", "--json"]));
    let ids: Vec<String> = tags
        .as_array()
        .expect("array")
        .iter()
        .map(|t| t["id"].to_string())
        .collect();
    let (red, blue) = (ids[0].as_str(), ids[1].as_str());

    let entries = json_output(taggable(&dir).args(["tags", "entries", red, "post", "--json"]));
    assert_eq!(entries, serde_json::json!(["1", "2"]));

    taggable(&dir)
        .args(["tags", "reorder", blue, red])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reordered 2 tags"));

    let tags = json_output(taggable(&dir).args(["tags", "list", "--json"]));
    assert_eq!(tags[0]["slug"], "blue");
    assert_eq!(tags[0]["sort_order"], 1);
    assert_eq!(tags[1]["slug"], "red");
}

#[test]
fn query_filters_candidates() {
    let dir = TempDir::new().expect("temp dir");
    taggable(&dir)
        .args(["subject", "tag", "post", "1", "red, blue"])
        .assert()
        .success();
    taggable(&dir)
        .args(["subject", "tag", "post", "2", "red"])
        .assert()
        .success();

    let all = json_output(taggable(&dir).args([
        "query",
        "--all",
        "post",
        "--candidates",
        "1,2,3",
        "red, blue",
        "--json",
    ]));
    assert_eq!(all["matches"], serde_json::json!(["1"]));

    let missing = json_output(taggable(&dir).args([
        "query",
        "--all",
        "post",
        "--candidates",
        "1,2,3",
        "red, nonexistent",
        "--json",
    ]));
    assert_eq!(missing["matches"], serde_json::json!([]));
    assert_eq!(missing["predicate"]["mode"], "nothing");

    taggable(&dir)
        .args(["query", "--without-any", "post", "--candidates", "1,2,3"])
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn unknown_subject_type_fails() {
    let dir = TempDir::new().expect("temp dir");

    taggable(&dir)
        .args(["subject", "tag", "comment", "1", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown subject type: comment"));
}

#[test]
fn query_requires_a_mode() {
    let dir = TempDir::new().expect("temp dir");

    taggable(&dir)
        .args(["query", "post", "--candidates", "1", "red"])
        .assert()
        .failure();
}

#[test]
fn doctor_reports_database_status() {
    let dir = TempDir::new().expect("temp dir");

    let report = json_output(taggable(&dir).args(["doctor", "--json"]));
    assert_eq!(report["overall"], "ok");
    assert_eq!(report["database"]["details"]["live_tags"], 0);
}
