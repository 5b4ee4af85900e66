use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn chunkfactor(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chunkfactor").unwrap();
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0");
    cmd
}

#[test]
fn inspect_prints_owners() {
    let dir = tempfile::tempdir().unwrap();

    chunkfactor(&dir)
        .arg("inspect")
        .arg("--modules")
        .arg(fixture("factor.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("common: 12, 3"))
        .stdout(predicate::str::contains("entry1: 10, 2, entry1"))
        .stdout(predicate::str::contains("entry2: 11, 4, entry2"));
}

#[test]
fn inspect_json_by_package() {
    let dir = tempfile::tempdir().unwrap();

    let output = chunkfactor(&dir)
        .args(["inspect", "--json", "--granularity", "package", "--modules"])
        .arg(fixture("factor.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let owners: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(owners["3"], "common");
    assert_eq!(owners["2"], "entry1");
    assert_eq!(owners["4"], "entry2");
}

#[test]
fn inspect_rejects_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();

    chunkfactor(&dir)
        .arg("inspect")
        .arg("--modules")
        .arg(fixture("broken.ndjson"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("`missing`"));
}

#[test]
fn build_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let outdir = dir.path().join("out");

    chunkfactor(&dir)
        .arg("build")
        .arg("--modules")
        .arg(fixture("factor.json"))
        .arg("--outdir")
        .arg(&outdir)
        .args(["--size-limit", "200", "--label", "file-stem"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 3 group(s)"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(outdir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["groups"]["entry-one-0"]["parent"], "entry-one");
    assert_eq!(manifest["grouping"]["common"][0], "common-0");

    let file = manifest["groups"]["entry-one-0"]["file"].as_str().unwrap();
    let script = fs::read_to_string(outdir.join(file)).unwrap();
    assert!(script.trim_end().ends_with("__chunkfactor_require__(\"entry1\");"));
}

#[test]
fn build_honours_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("factor.json"), dir.path().join("graph.json")).unwrap();
    fs::write(
        dir.path().join("chunkfactor.toml"),
        "[input]\nmodules = \"graph.json\"\n\n[split]\nenabled = false\n\n[output]\ndir = \"public\"\nformat = \"json\"\nhash = false\n",
    )
    .unwrap();

    chunkfactor(&dir).arg("build").assert().success();

    assert!(dir.path().join("public/common.json").exists());
    assert!(dir.path().join("public/entry1.json").exists());
    assert!(dir.path().join("public/entry2.json").exists());
    assert!(dir.path().join("public/manifest.json").exists());
}

#[test]
fn named_config_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();

    chunkfactor(&dir)
        .args(["--config", "missing.toml", "build", "--modules"])
        .arg(fixture("factor.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn build_without_factoring_writes_one_split_group() {
    let dir = tempfile::tempdir().unwrap();
    let outdir = dir.path().join("out");

    chunkfactor(&dir)
        .args(["build", "--no-factor", "--primary-label", "bundle", "--size-limit", "100000"])
        .arg("--modules")
        .arg(fixture("factor.json"))
        .arg("--outdir")
        .arg(&outdir)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 1 group(s)"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(outdir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["grouping"]["bundle"][0], "bundle-0");
    assert_eq!(manifest["groups"]["bundle-0"]["modules"].as_array().unwrap().len(), 8);
}
