//! CLI smoke tests for recobra-analyze

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

fn write_transcript(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("lead.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"sender\":\"agent\",\"text\":\"Estas a un paso de la aprobacion de tu prestamo personal\",\"sent_at\":\"2026-08-01T12:00:00Z\"}\n",
            "{\"sender\":\"customer\",\"text\":\"si quisiera mas informacion\",\"sent_at\":\"2026-08-01T12:01:00Z\"}\n",
        ),
    )
    .unwrap();
    path
}

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("recobra-analyze").unwrap();
    // Keep config, cache, and logs inside the test sandbox
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_STATE_HOME", dir.path().join("state"));
    cmd
}

#[test]
fn test_analyze_text_output() {
    let dir = TempDir::new().unwrap();
    let transcript = write_transcript(dir.path());

    cmd(&dir)
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicates::str::contains("handoff:        accepted"));
}

#[test]
fn test_analyze_json_output_and_cache_hit() {
    let dir = TempDir::new().unwrap();
    let transcript = write_transcript(dir.path());

    cmd(&dir)
        .args([transcript.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"from_cache\":false"));

    // Same content, second run: served from the on-disk cache
    cmd(&dir)
        .args([transcript.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"from_cache\":true"));
}

#[test]
fn test_evict_field_requires_digest() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .args(["--evict-field", "next_action"])
        .assert()
        .failure();
}
