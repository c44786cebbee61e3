//! Git client: clone, open, and interrogate local working copies.
//!
//! Shells out to `git` rather than linking a libgit2 binding. Clone
//! transfer progress is parsed from the `--progress` sideband on stderr
//! and forwarded as structured samples; rendering is the reporter's
//! concern.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use crate::progress::{ProgressEvent, ProgressReporter};

/// One transfer-progress sample from a running clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSample {
    pub received_objects: u64,
    pub total_objects: u64,
    pub received_bytes: u64,
}

/// A local, full-history materialization of a repository.
pub struct WorkingCopy {
    root: PathBuf,
}

impl WorkingCopy {
    /// Open an existing working copy. Fails if `path` is not inside a git
    /// repository.
    pub fn open(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(path)
            .output()
            .with_context(|| format!("Failed to run git in {}. Is git installed?", path.display()))?;

        if !output.status.success() {
            bail!("'{}' is not a git working copy", path.display());
        }

        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    /// Clone `url` into `dest`, forwarding transfer progress to `reporter`.
    pub fn clone(url: &str, dest: &Path, reporter: &dyn ProgressReporter) -> Result<Self> {
        let mut child = Command::new("git")
            .args(["clone", "--progress"])
            .arg(url)
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to execute 'git clone'. Is git installed?")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("git clone produced no stderr handle"))?;

        // git writes progress updates terminated by \r and ordinary
        // messages terminated by \n; keep the latter for error reporting.
        let mut messages: Vec<String> = Vec::new();
        let mut line = Vec::new();
        for byte in BufReader::new(stderr).bytes() {
            let byte = byte.context("Failed to read git clone output")?;
            if byte == b'\r' || byte == b'\n' {
                let text = String::from_utf8_lossy(&line).trim().to_string();
                line.clear();
                if text.is_empty() {
                    continue;
                }
                match parse_transfer_line(&text) {
                    Some(sample) => reporter.report(ProgressEvent::CloneTransfer {
                        received_objects: sample.received_objects,
                        total_objects: sample.total_objects,
                        received_bytes: sample.received_bytes,
                    }),
                    None => {
                        messages.push(text);
                        if messages.len() > 10 {
                            messages.remove(0);
                        }
                    }
                }
            } else {
                line.push(byte);
            }
        }

        let status = child.wait().context("Failed to wait for git clone")?;
        if !status.success() {
            bail!("git clone failed: {}", messages.join("; "));
        }

        Ok(Self {
            root: dest.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full hash HEAD currently points to.
    pub fn head_commit(&self) -> Result<String> {
        git_stdout(&self.root, &["rev-parse", "HEAD"])
    }

    /// The configured `origin` remote URL.
    pub fn origin_url(&self) -> Result<String> {
        let url = git_stdout(&self.root, &["remote", "get-url", "origin"])
            .with_context(|| format!("No 'origin' remote in {}", self.root.display()))?;
        if url.is_empty() {
            bail!("No 'origin' remote in {}", self.root.display());
        }
        Ok(url)
    }
}

/// Run `git` in `root` and return trimmed stdout, failing with git's own
/// stderr on a non-zero exit.
pub(crate) fn git_stdout(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to execute 'git {}'", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Parse one `Receiving objects: …` progress line.
///
/// Shapes seen in the wild:
/// `Receiving objects:  67% (1234/1840), 5.67 MiB | 1.20 MiB/s`
/// `Receiving objects: 100% (1840/1840), 8.01 MiB | 1.20 MiB/s, done.`
pub fn parse_transfer_line(line: &str) -> Option<TransferSample> {
    let rest = line.trim().strip_prefix("Receiving objects:")?;

    let open = rest.find('(')?;
    let close = rest[open..].find(')')? + open;
    let counts = &rest[open + 1..close];
    let (received, total) = counts.split_once('/')?;
    let received_objects = received.trim().parse::<u64>().ok()?;
    let total_objects = total.trim().parse::<u64>().ok()?;

    let received_bytes = rest[close + 1..]
        .trim_start_matches(',')
        .trim()
        .split('|')
        .next()
        .map(str::trim)
        .and_then(parse_byte_size)
        .unwrap_or(0);

    Some(TransferSample {
        received_objects,
        total_objects,
        received_bytes,
    })
}

/// Parse git's human byte sizes: `697 bytes`, `4.25 KiB`, `8.01 MiB`, …
fn parse_byte_size(text: &str) -> Option<u64> {
    let text = text.trim_end_matches(", done.").trim();
    let (value, unit) = text.split_once(' ')?;
    let value = value.trim().parse::<f64>().ok()?;

    let factor = match unit.trim() {
        "bytes" | "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((value * factor) as u64)
}
