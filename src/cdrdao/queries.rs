//! One-shot cdrdao queries: medium writability and tool version.

use regex::Regex;
use tokio::process::Command;

use super::process::DEFAULT_BINARY;

/// Literal printed by `disk-info` when no writable medium is present.
const NO_CDR_MARKER: &str = "CD-R medium          : n/a";

/// Return whether cdrdao detects a writable (CD-R) medium in `device`.
///
/// Ambiguous output, and even a failed invocation, count as `true`; callers
/// double-check before any destructive action, so the permissive default is
/// the safe one here.
pub async fn detect_cdr(device: &str) -> bool {
    detect_cdr_with_binary(DEFAULT_BINARY, device).await
}

/// `detect_cdr` with a custom binary (for testing or configuration).
pub async fn detect_cdr_with_binary(binary: &str, device: &str) -> bool {
    let output = Command::new(binary)
        .args(["disk-info", "-v1", "--device", device])
        .output()
        .await;

    match output {
        Ok(out) => !String::from_utf8_lossy(&out.stdout).contains(NO_CDR_MARKER),
        Err(err) => {
            tracing::warn!(%binary, error = %err, "disk-info invocation failed");
            true
        }
    }
}

/// Return the cdrdao version as a string, or `None` if detection fails.
///
/// Invoked bare, cdrdao prints its banner to stderr and exits with code 1.
/// Any deviation is logged as a warning, never surfaced as an error.
pub async fn version() -> Option<String> {
    version_with_binary(DEFAULT_BINARY).await
}

/// `version` with a custom binary (for testing or configuration).
pub async fn version_with_binary(binary: &str) -> Option<String> {
    let output = match Command::new(binary).output().await {
        Ok(out) => out,
        Err(err) => {
            tracing::warn!(%binary, error = %err, "cdrdao version detection failed");
            return None;
        }
    };

    if output.status.code() != Some(1) {
        tracing::warn!(
            code = ?output.status.code(),
            "cdrdao version detection failed: unexpected return code"
        );
        return None;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let found = parse_version_banner(&stderr);
    if found.is_none() {
        tracing::warn!("cdrdao version detection failed: could not find version");
    }
    found
}

/// Extract the version token from the tool's banner line.
fn parse_version_banner(stderr: &str) -> Option<String> {
    let re = Regex::new(r"^Cdrdao version (?P<version>.*) - \(C\)").expect("valid banner pattern");
    re.captures(stderr)
        .and_then(|caps| caps.name("version"))
        .map(|m| m.as_str().to_string())
}
