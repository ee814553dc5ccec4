//! rshogi-exp のスモークテスト
#![cfg(feature = "cli")]

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use rshogi_experience::{ExperienceStore, Move, StdFs, Value};

fn write_exp(path: &Path, records: &[(u64, u32, i32, u32)]) {
    let mut store = ExperienceStore::new(Arc::new(StdFs::new()), 0);
    for &(key, mv, value, depth) in records {
        store.add_pv_experience(key, Move::from_raw(mv), Value::new(value), depth);
    }
    assert!(store.save(path, false));
}

fn bin() -> Command {
    Command::cargo_bin("rshogi-exp").unwrap()
}

#[test]
fn info_prints_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.exp");
    write_exp(&path, &[(1, 1, 0, 8), (1, 1, 10, 8), (2, 1, 0, 2)]);

    let output = bin().arg("info").arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("positions: 2"), "{stdout}");
    assert!(stdout.contains("moves: 2"), "{stdout}");
    assert!(stdout.contains("duplicate moves: 1"), "{stdout}");
    assert!(stdout.contains("moves below min depth 4: 1"), "{stdout}");
}

#[test]
fn defrag_rewrites_file_with_min_depth_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.exp");
    write_exp(&path, &[(1, 1, 0, 8), (1, 1, 10, 8), (2, 1, 0, 5)]);

    bin().args(["--min-depth", "6", "defrag"]).arg(&path).assert().success();

    let mut store = ExperienceStore::new(Arc::new(StdFs::new()), 0);
    assert!(store.load(&path, true));
    assert_eq!(store.index().moves(), 1);
    assert!(dir.path().join("a.exp.bak").exists());
}

#[test]
fn merge_requires_target_and_source() {
    let dir = tempfile::tempdir().unwrap();
    bin().arg("merge").arg(dir.path().join("t.exp")).assert().failure();
}

#[test]
fn merge_writes_target() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.exp");
    let b = dir.path().join("b.exp");
    let target = dir.path().join("t.exp");
    write_exp(&a, &[(1, 1, 0, 8)]);
    write_exp(&b, &[(2, 1, 0, 8)]);

    bin().arg("merge").arg(&target).arg(&a).arg(&b).assert().success();
    assert!(target.exists());
}

#[test]
fn config_file_selects_default_defrag_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.exp");
    write_exp(&path, &[(1, 1, 0, 8), (1, 1, 3, 8)]);
    let config = dir.path().join("experience.toml");
    std::fs::write(&config, format!("file = {:?}\nmin_depth = 4\n", path.display().to_string()))
        .unwrap();

    bin().arg("--config").arg(&config).arg("defrag").assert().success();
    assert!(dir.path().join("conf.exp.bak").exists());
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    bin().arg("info").arg(dir.path().join("none.exp")).assert().failure();
}
