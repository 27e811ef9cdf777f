use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn gb18030(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::GB18030.encode(text);
    bytes.into_owned()
}

fn write(root: &Path, rel: &str, bytes: &[u8]) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Lays out a small two-era corpus and a config pointing at it
fn setup(terms: &str) -> Result<TempDir> {
    let dir = tempdir()?;
    let root = dir.path();
    write(root, "corpus/gudai/shiji/juan1.txt", &gb18030("昨日春天来了\n"))?;
    write(root, "corpus/xiandai/1990s/a.txt", &gb18030("今年的春天很暖和\n秋天也不错\n"))?;
    write(root, "corpus/xiandai/2000s/b.txt", &gb18030("没有季节\n"))?;
    write(root, "terms.txt", terms.as_bytes())?;
    write(
        root,
        "scan.yaml",
        br#"
classical_root: "corpus/gudai"
modern_root: "corpus/xiandai"
modern_eras: ["1990s", "2000s"]
output_dir: "query_result"
terms_file: "terms.txt"
context_window: 5
max_workers: 2
batch_count: 2
"#,
    )?;
    Ok(dir)
}

fn corpusscan(dir: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("corpusscan")?;
    cmd.current_dir(dir.path()).env("RUST_LOG", "warn");
    Ok(cmd)
}

fn result(dir: &TempDir, term: &str) -> Result<String> {
    Ok(fs::read_to_string(
        dir.path().join("query_result").join(format!("{}.txt", term)),
    )?)
}

#[test]
fn test_run_with_worker_processes() -> Result<()> {
    let dir = setup("春天\n秋天\n冬天\n")?;

    corpusscan(&dir)?
        .args(["run", "--config", "scan.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scanned 3 terms with 2 workers"));

    let spring = result(&dir, "春天")?;
    let mut lines: Vec<_> = spring.lines().collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            format!("【来源: {}】今年的【春天】很暖和", Path::new("1990s").join("a.txt").display()),
            format!("【来源: {}】昨日【春天】来了", Path::new("shiji").join("juan1.txt").display()),
        ]
    );
    assert_eq!(
        result(&dir, "秋天")?,
        format!("【来源: {}】【秋天】也不错\n", Path::new("1990s").join("a.txt").display())
    );
    assert!(!dir.path().join("query_result/冬天.txt").exists());
    Ok(())
}

#[test]
fn test_scan_in_process() -> Result<()> {
    let dir = setup("春天\n")?;

    corpusscan(&dir)?
        .args(["scan", "--config", "scan.yaml", "--window", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 snippets"));

    let spring = result(&dir, "春天")?;
    assert!(spring.contains("】日【春天】来\n"));
    assert!(spring.contains("】的【春天】很\n"));
    Ok(())
}

#[test]
fn test_previous_results_cleared_unless_kept() -> Result<()> {
    let dir = setup("秋天\n")?;
    write(dir.path(), "query_result/stale.txt", b"old")?;

    corpusscan(&dir)?
        .args(["scan", "--config", "scan.yaml", "--keep-output"])
        .assert()
        .success();
    assert!(dir.path().join("query_result/stale.txt").exists());

    corpusscan(&dir)?
        .args(["scan", "--config", "scan.yaml"])
        .assert()
        .success();
    assert!(!dir.path().join("query_result/stale.txt").exists());
    assert_eq!(result(&dir, "秋天")?.lines().count(), 1);
    Ok(())
}

#[test]
fn test_corrupt_file_does_not_abort_run() -> Result<()> {
    let dir = setup("春天\n")?;
    let mut corrupt = gb18030("春天");
    corrupt.extend_from_slice(&[0xFF, 0xFF]);
    write(dir.path(), "corpus/xiandai/2000s/bad.txt", &corrupt)?;
    let mut config = fs::read_to_string(dir.path().join("scan.yaml"))?;
    config.push_str("encoding_mode: failfast\n");
    fs::write(dir.path().join("scan.yaml"), config)?;

    corpusscan(&dir)?
        .args(["run", "--config", "scan.yaml"])
        .assert()
        .success();

    assert_eq!(result(&dir, "春天")?.lines().count(), 2);
    Ok(())
}

#[test]
fn test_regex_flag() -> Result<()> {
    let dir = setup("[春秋]天\n")?;

    corpusscan(&dir)?
        .args(["scan", "--config", "scan.yaml", "--regex"])
        .assert()
        .success();

    assert_eq!(result(&dir, "[春秋]天")?.lines().count(), 3);
    Ok(())
}

#[test]
fn test_missing_terms_file() -> Result<()> {
    let dir = setup("春天\n")?;

    corpusscan(&dir)?
        .args(["run", "--config", "scan.yaml", "--terms", "nope.txt"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_empty_terms_file() -> Result<()> {
    let dir = setup("\n  \n")?;

    corpusscan(&dir)?
        .args(["run", "--config", "scan.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No usable terms"));
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<()> {
    let dir = tempdir()?;

    Command::cargo_bin("corpusscan")?
        .current_dir(dir.path())
        .args(["scan", "--config", "missing.yaml"])
        .assert()
        .failure();
    Ok(())
}
