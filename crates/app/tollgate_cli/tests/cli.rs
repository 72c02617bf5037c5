use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Run the binary from an empty directory so no `.env` file leaks in.
fn tollgate(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tollgate").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .env_remove("ENC_KEY_BASE64")
        .env_remove("XUI_BASE_URL");
    cmd
}

#[test]
fn version_prints_package_and_version() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("tollgate_cli "))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn gen_key_prints_one_base64_key() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .arg("gen-key")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[A-Za-z0-9+/]{43}=\n$").unwrap());
}

#[test]
fn gen_key_is_random() {
    let dir = TempDir::new().unwrap();
    let first = tollgate(&dir).arg("gen-key").output().unwrap().stdout;
    let second = tollgate(&dir).arg("gen-key").output().unwrap().stdout;
    assert_ne!(first, second);
}

#[test]
fn activate_without_database_fails() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .args(["activate", "ABC123", "--max-streams", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn set_upstream_requires_vault_key() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .args(["set-upstream", "ABC123", "--username", "u", "--password", "p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ENC_KEY_BASE64"));
}

#[test]
fn set_upstream_rejects_bad_vault_key() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .args(["set-upstream", "ABC123", "--username", "u", "--password", "p"])
        .env("ENC_KEY_BASE64", "c2hvcnQ=")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ENC_KEY_BASE64"));
}

#[test]
fn activate_rejects_both_expiry_forms() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .args([
            "activate",
            "ABC123",
            "--days",
            "30",
            "--expires-at",
            "2030-01-01T00:00:00Z",
        ])
        .assert()
        .failure();
}

#[test]
fn activate_rejects_out_of_range_days() {
    let dir = TempDir::new().unwrap();
    tollgate(&dir)
        .args(["activate", "ABC123", "--days", "4000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}
