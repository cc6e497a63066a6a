//! Tests for the one-shot cdrdao queries against fake tool scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use disctoc::cdrdao::{detect_cdr_with_binary, version_with_binary};

fn write_fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn version_parses_banner_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        "fake-cdrdao",
        "#!/bin/sh\n>&2 printf 'Cdrdao version 1.2.4 - (C) Andreas Mueller <andreas@daneb.de>\\n'\nexit 1\n",
    );

    let version = version_with_binary(&tool.display().to_string()).await;
    assert_eq!(version, Some("1.2.4".to_string()));
}

#[tokio::test]
async fn version_rejects_unexpected_exit_code() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        "fake-cdrdao",
        "#!/bin/sh\n>&2 printf 'Cdrdao version 1.2.4 - (C) Andreas Mueller\\n'\nexit 0\n",
    );

    assert_eq!(version_with_binary(&tool.display().to_string()).await, None);
}

#[tokio::test]
async fn version_rejects_garbled_banner() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        "fake-cdrdao",
        "#!/bin/sh\n>&2 printf 'some other tool 9.9\\n'\nexit 1\n",
    );

    assert_eq!(version_with_binary(&tool.display().to_string()).await, None);
}

#[tokio::test]
async fn detect_cdr_false_on_no_medium_marker() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        "fake-cdrdao",
        "#!/bin/sh\nprintf 'CD-R medium          : n/a\\n'\n",
    );

    assert!(!detect_cdr_with_binary(&tool.display().to_string(), "/dev/sr0").await);
}

#[tokio::test]
async fn detect_cdr_true_on_other_output() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        "fake-cdrdao",
        "#!/bin/sh\nprintf 'CD-R medium          : empty\\n'\n",
    );

    assert!(detect_cdr_with_binary(&tool.display().to_string(), "/dev/sr0").await);
}

#[tokio::test]
async fn detect_cdr_true_on_ambiguous_output() {
    let dir = TempDir::new().unwrap();
    let tool = write_fake_tool(dir.path(), "fake-cdrdao", "#!/bin/sh\nexit 1\n");

    assert!(detect_cdr_with_binary(&tool.display().to_string(), "/dev/sr0").await);
}
