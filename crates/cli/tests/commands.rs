//! End-to-end tests for the `ldapmerge` binary.
//!
//! Every run gets its own scratch HOME so the per-user config, database and
//! log directory never leak between tests.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn ldapmerge(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ldapmerge"))
        .args(args)
        .env("HOME", home)
        .env("LDAPMERGE_LOG_DIR", home.join("logs"))
        .env("LDAPMERGE_DB", home.join("data.db"))
        .env_remove("RUST_LOG")
        .env_remove("LDAPMERGE_LOG_LEVEL")
        .output()
        .expect("failed to run ldapmerge")
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

const INITIAL: &str = r#"[{
    "id": "example.lab",
    "domain_name": "example.lab",
    "base_dn": "DC=example,DC=lab",
    "alternative_domain_names": [],
    "ldap_servers": [
        {"url": "ldaps://dc1.example.lab:636", "starttls": "false", "enabled": "true"},
        {"url": "ldaps://dc2.example.lab:636", "starttls": "false", "enabled": "true"}
    ]
}]"#;

const RESPONSE: &str = r#"{"results": [
    {"json": {"pem_encoded": "CERT1"}, "item": {"url": "ldaps://dc1.example.lab:636"}},
    {"json": {"pem_encoded": ""}, "item": {"url": "ldaps://dc2.example.lab:636"}}
]}"#;

#[test]
fn merge_prints_merged_domains() {
    let home = TempDir::new().unwrap();
    let initial = write(home.path(), "initial.json", INITIAL);
    let response = write(home.path(), "response.json", RESPONSE);

    let out = ldapmerge(home.path(), &["merge", "-i", &initial, "-r", &response]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("\n    {"), "expected four-space indentation");
    let merged: Value = serde_json::from_str(&stdout).unwrap();
    let servers = &merged[0]["ldap_servers"];
    assert_eq!(servers[0]["certificates"][0], "CERT1");
    assert!(servers[1].get("certificates").is_none());

    // the run was logged to the daily file
    let logs: Vec<_> = std::fs::read_dir(home.path().join("logs")).unwrap().collect();
    assert!(!logs.is_empty());
}

#[test]
fn merge_writes_compact_output_file() {
    let home = TempDir::new().unwrap();
    let initial = write(home.path(), "initial.json", INITIAL);
    let response = write(home.path(), "response.json", RESPONSE);
    let output = home.path().join("out.json");

    let out = ldapmerge(
        home.path(),
        &[
            "merge",
            "-i",
            &initial,
            "-r",
            &response,
            "-o",
            output.to_str().unwrap(),
            "--compact",
        ],
    );
    assert!(out.status.success());

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.ends_with('\n'));
    let merged: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(merged[0]["id"], "example.lab");
}

#[test]
fn merge_fails_on_missing_input() {
    let home = TempDir::new().unwrap();
    let response = write(home.path(), "response.json", RESPONSE);

    let out = ldapmerge(
        home.path(),
        &["merge", "-i", "/nonexistent/initial.json", "-r", &response],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error"));
}

#[test]
fn init_then_validate() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("ldapmerge.toml");
    let config = config.to_str().unwrap();

    let out = ldapmerge(home.path(), &["init", "-o", config]);
    assert!(out.status.success());
    assert!(Path::new(config).exists());

    // refuses to overwrite
    let out = ldapmerge(home.path(), &["init", "-o", config]);
    assert!(!out.status.success());

    let out = ldapmerge(home.path(), &["validate", "--config", config]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Configuration is valid."));
}

#[test]
fn validate_rejects_bad_log_level() {
    let home = TempDir::new().unwrap();
    let config = write(home.path(), "bad.toml", "[logging]\nlevel = \"loud\"\n");

    let out = ldapmerge(home.path(), &["validate", "--config", &config]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("[FAIL]"));
}

#[test]
fn profiles_round_trip_through_the_store() {
    let home = TempDir::new().unwrap();

    let out = ldapmerge(
        home.path(),
        &[
            "profile", "add", "--name", "lab", "--host", "https://nsx.lab", "-u", "admin", "-P",
            "secret", "-k",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = ldapmerge(home.path(), &["profile", "show", "lab"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("https://nsx.lab"));
    assert!(stdout.contains("Password    : set"));
    assert!(!stdout.contains("secret"));

    let out = ldapmerge(home.path(), &["profile", "delete", "lab"]);
    assert!(out.status.success());
    let out = ldapmerge(home.path(), &["profile", "show", "lab"]);
    assert!(!out.status.success());
}

#[test]
fn version_skips_logging() {
    let home = TempDir::new().unwrap();
    let out = ldapmerge(home.path(), &["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("ldapmerge "));
    assert!(!home.path().join("logs").exists());
}
