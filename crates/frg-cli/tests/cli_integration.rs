use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

fn frg() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("frg");
    cmd.env_remove("FRG_LOG").env("NO_COLOR", "1");
    cmd
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn source(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    /// Config replacing the toolchain with `sh -c <script> <path>`.
    fn fake_toolchain(&self, check: &str, run: &str) -> PathBuf {
        let config = format!(
            "racket_path = \"sh\"\ncheck_args = [\"-c\", {check:?}, \"{{file}}\"]\nrun_args = [\"-c\", {run:?}, \"{{file}}\"]\nscratch_dir = {scratch:?}\n",
            scratch = self.path().join("scratch").display().to_string(),
        );
        self.source("frg.toml", &config)
    }
}

#[test]
fn test_help_lists_subcommands() {
    frg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("links"));
}

#[test]
fn test_check_rejects_non_source_file() {
    let ws = Workspace::new();
    let notes = ws.source("notes.txt", "hello\n");
    frg()
        .arg("check")
        .arg(&notes)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a .frg source file"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let ws = Workspace::new();
    let model = ws.source("model.frg", "#lang forge\n");
    frg()
        .arg("--config")
        .arg(ws.path().join("missing.toml"))
        .arg("check")
        .arg(&model)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn test_config_prints_effective_settings() {
    let ws = Workspace::new();
    frg()
        .current_dir(ws.path())
        .args(["config", "--racket", "/opt/racket/bin/racket"])
        .assert()
        .success()
        .stdout(predicate::str::contains("racket_path = \"/opt/racket/bin/racket\""))
        .stdout(predicate::str::contains("syntax_error_exit_code = 2"));
}

#[test]
fn test_discovered_config_is_used() {
    let ws = Workspace::new();
    ws.source(".frg.toml", "racket_path = \"/from/discovered\"\n");
    frg()
        .current_dir(ws.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/discovered"));
}

#[test]
fn test_links_text_output() {
    let ws = Workspace::new();
    let active = ws.path().join("model.frg");
    let input = format!(
        "noise\n{}:12:5: unbound identifier\nother.frg:1:1: elsewhere\n",
        active.display()
    );
    frg()
        .args(["links", "--active"])
        .arg(&active)
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "2: {}:12:5",
            active.display()
        )))
        .stdout(predicate::str::contains("other.frg").not());
}

#[test]
fn test_links_json_output() {
    let output = frg()
        .args(["links", "--active", "/hw/model.frg", "--format", "json"])
        .write_stdin("model.frg:3:7:\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let links: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(links.as_array().unwrap().len(), 1);
    assert_eq!(links[0]["line"], 2);
    assert_eq!(links[0]["column"], 6);
    assert_eq!(links[0]["filePath"], "/hw/model.frg");
}

#[cfg(unix)]
#[test]
fn test_check_clean_file() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain("exit 0", "exit 0");
    let model = ws.source("model.frg", "#lang forge\nsig Node {}\n");
    frg()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&model)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok:"));
}

#[cfg(unix)]
#[test]
fn test_check_reports_located_syntax_error() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain(
        "echo \"$0:2:5: sig: expected a name\" 1>&2; exit 2",
        "exit 0",
    );
    let model = ws.source("model.frg", "#lang forge\nsig {}\n");
    frg()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&model)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(":2:5: error:"))
        .stdout(predicate::str::contains("sig: expected a name"))
        .stdout(predicate::str::contains("[frg-syntax]"));
}

#[cfg(unix)]
#[test]
fn test_check_json_reports_unlocated_warning() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain("echo 'racket: out of memory' 1>&2; exit 1", "exit 0");
    let model = ws.source("model.frg", "#lang forge\n");
    let output = frg()
        .arg("--config")
        .arg(&config)
        .args(["check", "--format", "json"])
        .arg(&model)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let reported: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reported[0]["line"], 1);
    assert_eq!(reported[0]["column"], 1);
    assert_eq!(reported[0]["severity"], "warning");
    assert_eq!(reported[0]["source"], "frg-check");
    assert_eq!(reported[0]["message"], "racket: out of memory");
}

#[cfg(unix)]
#[test]
fn test_check_removes_scratch_file() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain("exit 0", "exit 0");
    let model = ws.source("model.frg", "#lang forge\n");
    frg()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&model)
        .assert()
        .success();

    let leftovers = std::fs::read_dir(ws.path().join("scratch"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[cfg(unix)]
#[test]
fn test_run_relays_output() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain(
        "exit 0",
        "echo 'Sterling running. Hit enter to stop service.'; echo done",
    );
    let model = ws.source("model.frg", "#lang forge\n");
    frg()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&model)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running file"))
        .stdout(predicate::str::contains("Sterling running. Hit Stop to stop service."))
        .stdout(predicate::str::contains("Finished running."));
}

#[cfg(unix)]
#[test]
fn test_run_failure_points_at_location() {
    let ws = Workspace::new();
    let config = ws.fake_toolchain("exit 0", "echo \"$0:3:2: run failed\" 1>&2; exit 1");
    let model = ws.source("model.frg", "#lang forge\nsig A {}\nrun {}\n");
    frg()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&model)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("run failed"))
        .stdout(predicate::str::contains("Forge exited."))
        .stderr(predicate::str::contains(format!("{}:3:2", model.display())));
}
