//! CLI integration tests.
//! Each test isolates its database, output, and config via a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SOCIAL_KEYS: [&str; 5] = [
    "SOCIAL_API_KEY",
    "SOCIAL_API_SECRET",
    "SOCIAL_ACCESS_TOKEN",
    "SOCIAL_ACCESS_TOKEN_SECRET",
    "SOCIAL_BEARER_TOKEN",
];

fn curator_cmd(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("curator").unwrap();
    cmd.env("DATABASE_PATH", dir.path().join("db/curator.db"));
    cmd.env("OUTPUT_DIR", dir.path().join("out"));
    cmd.env("LLM_API_KEY", "test-key");
    cmd.env_remove("LOG_FILE_PATH");
    cmd.env_remove("LOG_LEVEL");
    for key in SOCIAL_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn stats_fresh_db() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("references:  0"))
        .stdout(predicate::str::contains("articles:    0 (0 evaluated)"))
        .stdout(predicate::str::contains("evaluations: 0"));
}

#[test]
fn run_requires_llm_api_key() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir)
        .env_remove("LLM_API_KEY")
        .args(["run", "--json-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("LLM_API_KEY"));
}

#[test]
fn run_rejects_partial_social_credentials() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir)
        .env("SOCIAL_API_KEY", "only-one")
        .args(["run", "--json-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("all-or-none"));
}

#[test]
fn json_only_writes_feeds() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir)
        .args(["run", "--json-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feeds regenerated"));

    for name in ["articles.json", "top5.json", "meta.json"] {
        let path = dir.path().join("out").join(name);
        assert!(path.exists(), "{name} should exist");
    }

    let articles = std::fs::read_to_string(dir.path().join("out/articles.json")).unwrap();
    assert!(articles.contains("\"total\": 0"));
}

#[test]
fn json_only_is_idempotent() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir).args(["run", "--json-only"]).assert().success();
    curator_cmd(&dir).args(["run", "--json-only"]).assert().success();
}

#[test]
fn run_fails_without_config_files() {
    let dir = TempDir::new().unwrap();
    let empty_config = dir.path().join("no-config-here");
    std::fs::create_dir_all(&empty_config).unwrap();

    curator_cmd(&dir)
        .arg("run")
        .arg("--config-dir")
        .arg(&empty_config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("urls.toml"));
}

#[test]
fn unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    curator_cmd(&dir).arg("publish").assert().failure();
}
