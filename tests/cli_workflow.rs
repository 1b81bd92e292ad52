// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use archive_search::catalog::Catalog;
use archive_search::embedding::Collection;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn write_dummy_config(root: &Path) {
    fs::write(
        root.join(".archive-search.toml"),
        r#"
[embeddings]
provider = "dummy"
dimension = 16
"#,
    )
    .unwrap();
}

fn cmd(root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("archive-search");
    cmd.current_dir(root).env("NO_COLOR", "1");
    cmd
}

fn json_output(root: &Path, args: &[&str]) -> Value {
    let assert = cmd(root)
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).unwrap()
}

fn add(root: &Path, title: &str, genre: &str, difficulty: &str) {
    cmd(root)
        .args([
            "add",
            "--title",
            title,
            "--genre",
            genre,
            "--difficulty",
            difficulty,
            "--summary",
            "a summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(title));
}

fn seeded() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_dummy_config(dir.path());
    add(dir.path(), "Dune", "Fantasy", "Beginner");
    add(dir.path(), "Calculus", "Math", "Advanced");
    add(dir.path(), "Linear Algebra", "Math", "Advanced");
    dir
}

#[test]
fn add_writes_catalogue_and_collection() {
    let dir = seeded();

    let catalog = Catalog::open(dir.path().join("archive.db")).unwrap();
    assert_eq!(catalog.count().unwrap(), 3);

    let collection = Collection::open(
        dir.path().join(".archive-search/collection.sqlite"),
        "records_collection",
    )
    .unwrap();
    assert_eq!(collection.count().unwrap(), 3);
    assert_eq!(collection.model().unwrap().as_deref(), Some("dummy"));
}

#[test]
fn list_show_and_find() {
    let dir = seeded();

    let records = json_output(dir.path(), &["list"]);
    let titles: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "Calculus", "Linear Algebra"]);

    let record = json_output(dir.path(), &["show", "2"]);
    assert_eq!(record["title"], "Calculus");
    assert_eq!(record["genre"], "Math");

    let found = json_output(dir.path(), &["find", "title", "Alg"]);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["id"], 3);

    cmd(dir.path())
        .args(["find", "genre", "Math"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#2 Calculus [Math/Advanced]"));
}

#[test]
fn show_missing_record_fails() {
    let dir = seeded();
    cmd(dir.path())
        .args(["show", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Record not found: 99"));
}

#[test]
fn find_rejects_unsearchable_field() {
    let dir = seeded();
    cmd(dir.path())
        .args(["find", "password", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("field 'password' is not searchable"));
}

#[test]
fn ingest_is_incremental() {
    let dir = seeded();

    let summary = json_output(dir.path(), &["ingest"]);
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["embedded"], 0);
    assert_eq!(summary["unchanged"], 3);

    let summary = json_output(dir.path(), &["ingest", "--force"]);
    assert_eq!(summary["embedded"], 3);
}

#[test]
fn search_returns_nearest_records() {
    let dir = seeded();

    let result = json_output(
        dir.path(),
        &["search", "Calculus - Advanced - Math", "-k", "2"],
    );
    assert_eq!(result["ids"][0].as_array().unwrap().len(), 2);
    assert_eq!(result["ids"][0][0], "2");
    assert_eq!(result["metadatas"][0][0]["title"], "Calculus");
    assert_eq!(result["documents"][0][0], "Calculus - Advanced - Math");

    let filtered = json_output(
        dir.path(),
        &[
            "search",
            "Calculus - Advanced - Math",
            "--filter",
            r#"{"genre": "Fantasy"}"#,
        ],
    );
    assert_eq!(filtered["ids"][0], serde_json::json!(["1"]));
}

#[test]
fn search_rejects_bad_input() {
    let dir = seeded();
    cmd(dir.path())
        .args(["search", "dune", "-k", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid result count 0"));
    cmd(dir.path())
        .args(["search", "dune", "--filter", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--filter is not valid JSON"));
}

#[test]
fn analytics_reports() {
    let dir = seeded();

    let genres = json_output(dir.path(), &["analytics", "genre"]);
    assert_eq!(genres, serde_json::json!({"Fantasy": 1, "Math": 2}));

    let difficulty = json_output(dir.path(), &["analytics", "difficulty"]);
    assert_eq!(difficulty["Advanced"], 2);

    let clusters = json_output(dir.path(), &["analytics", "clusters", "-n", "3"]);
    let total: usize = clusters
        .as_object()
        .unwrap()
        .values()
        .map(|members| members.as_array().unwrap().len())
        .sum();
    assert_eq!(total, 3);

    cmd(dir.path())
        .args(["analytics", "clusters", "-n", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid cluster count 4"));
}

#[test]
fn add_hashes_file_with_blake3() {
    let dir = TempDir::new().unwrap();
    write_dummy_config(dir.path());
    let file = dir.path().join("paper.txt");
    fs::write(&file, b"hello archive").unwrap();

    let record = json_output(
        dir.path(),
        &[
            "add",
            "--title",
            "Paper",
            "--genre",
            "Science",
            "--difficulty",
            "Intermediate",
            "--file",
            file.to_str().unwrap(),
            "--cid",
            "bafy123",
        ],
    );
    assert_eq!(
        record["file_hash"],
        blake3::hash(b"hello archive").to_hex().to_string()
    );
    assert_eq!(record["file_cid"], "bafy123");
    assert_eq!(record["summary"], "");
}

#[test]
fn db_and_store_flags_override_paths() {
    let dir = TempDir::new().unwrap();
    write_dummy_config(dir.path());
    cmd(dir.path())
        .args([
            "--db",
            "data/custom.db",
            "--store",
            "data/vectors.sqlite",
            "add",
            "--title",
            "Dune",
            "--genre",
            "Fantasy",
            "--difficulty",
            "Beginner",
        ])
        .assert()
        .success();

    assert!(dir.path().join("data/custom.db").exists());
    assert!(dir.path().join("data/vectors.sqlite").exists());
    assert!(!dir.path().join("archive.db").exists());
}

#[test]
fn add_rolls_back_when_embedding_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".archive-search.toml"),
        r#"
[embeddings]
provider = "command"
command = "cat > /dev/null; exit 1"
"#,
    )
    .unwrap();

    cmd(dir.path())
        .args([
            "add",
            "--title",
            "Dune",
            "--genre",
            "Fantasy",
            "--difficulty",
            "Beginner",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to index record 1"));

    let catalog = Catalog::open(dir.path().join("archive.db")).unwrap();
    assert_eq!(catalog.count().unwrap(), 0);
}

#[test]
fn completions_generate_script() {
    cargo_bin_cmd!("archive-search")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("archive-search"));
}
