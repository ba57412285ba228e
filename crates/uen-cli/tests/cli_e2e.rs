use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::tempdir;

fn uen_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_uen"))
}

fn run(args: &[&str]) -> Output {
    Command::new(uen_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("UEN_SIGNER_KEY")
        .output()
        .expect("run uen")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn write_dump(dir: &Path, name: &str, json: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), json).unwrap();
}

#[test]
fn analyze_prints_shape_statistics() {
    let tmp = tempdir().unwrap();
    write_dump(
        tmp.path(),
        "d_1.json",
        r#"[{"uen": "53123456A", "entity_name": "a"},
            {"uen": "201912345K", "entity_name": "b"},
            {"uen": "T08LL1234A", "entity_name": "c"}]"#,
    );

    let out = run(&["analyze", tmp.path().to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("number of uens: 3"));
    assert!(text.contains("number of 9 char uens: 1"));
    assert!(text.contains("number of 10 char uens: 2"));
}

#[test]
fn local_sample_lists_records_and_skips_bad_files() {
    let tmp = tempdir().unwrap();
    let sample = tmp.path().join("sample");
    write_dump(&sample, "a.json", r#"[{"uen": "53123456A", "entity_name": "Old"}]"#);
    write_dump(&sample, "b.json", r#"[{"uen": "53123456A", "entity_name": "New"}]"#);
    write_dump(&sample, "c.json", "not json");

    let out = run(&["local", "--data-root", tmp.path().to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("Using sample data."));
    assert!(text.contains("53123456A: New"));
    assert!(text.contains("Skipping"));
    assert!(text.contains("Found 1 UENs in total"));
}

#[test]
fn missing_dump_directory_fails() {
    let tmp = tempdir().unwrap();
    let out = run(&["local", "--full", "--data-root", tmp.path().to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
}

#[test]
fn config_with_unknown_keys_is_rejected() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("uen.json");
    fs::write(&cfg, r#"{"rpc": "http://typo"}"#).unwrap();

    let out = run(&["--config", cfg.to_str().unwrap(), "analyze", tmp.path().to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid config"));
}

#[test]
fn upload_without_abi_fails_before_any_network_call() {
    let tmp = tempdir().unwrap();
    let out = run(&[
        "upload",
        "--manual",
        "--rpc-url",
        "http://127.0.0.1:9",
        "--abi",
        tmp.path().join("missing.json").to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.json"));
}
