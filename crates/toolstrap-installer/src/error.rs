use std::path::PathBuf;

use thiserror::Error;

/// Failures that carry a category or an external exit status.
///
/// Everything else travels as plain `anyhow` context and maps to status 1.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported platform: os={os} arch={arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("elevated privileges are required; re-run with sudo")]
    NotElevated,

    #[error("required command '{command}' was not found on PATH")]
    MissingCommand { command: String },

    #[error("install root exists and is not a directory: {}", .path.display())]
    InstallRootNotDirectory { path: PathBuf },

    #[error("{tool} is already installed at {}", .path.display())]
    AlreadyInstalled { tool: String, path: PathBuf },

    #[error("PATH integration file already exists: {}", .path.display())]
    IntegrationExists { path: PathBuf },

    #[error("toolchain workspace already exists: {}", .path.display())]
    WorkspaceExists { path: PathBuf },

    #[error("download failed for {url}: {detail}")]
    Download {
        url: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("no sha256 entry for {file} in {url}")]
    ChecksumMissing { url: String, file: String },

    #[error("sha256 mismatch for {} (expected {expected}, got {actual})", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("command failed ({}): {command}{}", describe_code(.code), stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("expected build output is missing: {}", .path.display())]
    BuildOutputMissing { path: PathBuf },
}

impl ProvisionError {
    /// Process exit status for this failure: the external operation's own
    /// status where there is one, 124 for timeouts, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        let external = match self {
            Self::Download { code, .. } | Self::CommandFailed { code, .. } => *code,
            Self::Timeout { .. } => Some(124),
            _ => None,
        };
        external.filter(|code| *code != 0).unwrap_or(1)
    }
}

pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ProvisionError>())
        .map(ProvisionError::exit_code)
        .unwrap_or(1)
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let last_line = trimmed.lines().last().unwrap_or(trimmed);
    format!(": {last_line}")
}
