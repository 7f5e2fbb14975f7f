use std::io::Write;

use assert_cmd::Command;

fn chain_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# chain").unwrap();
    for i in 0..4 {
        writeln!(file, "{} {}", i, i + 1).unwrap();
    }
    file.flush().unwrap();
    file
}

fn stdout_of(args: &[&str]) -> String {
    let output = Command::cargo_bin("cnm-community").unwrap().args(args).output().unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_edges_histogram() {
    let file = chain_file();
    let stdout = stdout_of(&["edges", file.path().to_str().unwrap()]);
    assert_eq!(stdout, "communities {s3, s2} [2]\nmodularity 0.218750\n");
}

#[test]
fn test_edges_members() {
    let file = chain_file();
    let stdout = stdout_of(&["edges", file.path().to_str().unwrap(), "--members"]);
    assert!(stdout.starts_with("communities {[2, 4, 3], [1, 0]}\n"));
}

#[test]
fn test_cutoff_and_json() {
    let file = chain_file();
    let stdout = stdout_of(&["edges", file.path().to_str().unwrap(), "--cutoff", "5", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["outcome"]["communities"].as_array().unwrap().len(), 5);
    assert_eq!(report["outcome"]["stop"], serde_json::json!("CutoffReached"));
}

#[test]
fn test_config_file() {
    let file = chain_file();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "cutoff: 4").unwrap();
    config.flush().unwrap();
    let stdout = stdout_of(&[
        "edges",
        file.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
        "--members",
    ]);
    assert!(stdout.starts_with("communities {"));
    let members = stdout.lines().next().unwrap();
    assert_eq!(members.matches('[').count(), 4);
}

#[test]
fn test_missing_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("cnm-community")
        .unwrap()
        .args(["dataset", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}
