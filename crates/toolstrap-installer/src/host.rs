use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use toolstrap_core::ArchiveType;
use tracing::debug;

use crate::error::ProvisionError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Operating-system collaborators the provisioner drives.
///
/// The engine never touches the network, spawns processes or probes
/// privileges except through this trait.
pub trait HostOps {
    fn is_elevated(&self) -> bool;

    fn find_command(&self, name: &str) -> Option<PathBuf>;

    /// Downloads `url` to `destination`. Failures surface as
    /// [`ProvisionError::Download`] naming the URL.
    fn download(&self, url: &str, destination: &Path, timeout: Duration) -> Result<()>;

    /// Fetches a small text document such as a checksum listing.
    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String>;

    fn extract(
        &self,
        archive: &Path,
        archive_type: ArchiveType,
        destination: &Path,
        timeout: Duration,
    ) -> Result<()>;

    /// Runs a command to completion. Non-zero exit surfaces as
    /// [`ProvisionError::CommandFailed`], an expired deadline as
    /// [`ProvisionError::Timeout`].
    fn run(&self, command: &mut Command, timeout: Duration) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostOps for SystemHost {
    fn is_elevated(&self) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail.
            unsafe { libc::geteuid() == 0 }
        }

        #[cfg(not(unix))]
        {
            false
        }
    }

    fn find_command(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn download(&self, url: &str, destination: &Path, timeout: Duration) -> Result<()> {
        let mut command = build_download_command(url, destination, timeout);
        run_with_timeout(&mut command, timeout).map_err(|err| {
            let code = match err.downcast_ref::<ProvisionError>() {
                Some(ProvisionError::CommandFailed { code, .. }) => *code,
                Some(ProvisionError::Timeout { .. }) => Some(124),
                _ => None,
            };
            ProvisionError::Download {
                url: url.to_string(),
                code,
                detail: format!("{err:#}"),
            }
        })?;
        Ok(())
    }

    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!(url, "fetching text document");
        let download_error = |detail: String| ProvisionError::Download {
            url: url.to_string(),
            code: None,
            detail,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let response = client
            .get(url)
            .send()
            .map_err(|err| download_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {status}")).into());
        }
        let body = response
            .text()
            .map_err(|err| download_error(err.to_string()))?;
        Ok(body)
    }

    fn extract(
        &self,
        archive: &Path,
        archive_type: ArchiveType,
        destination: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let mut command = build_extract_command(archive, archive_type, destination);
        run_with_timeout(&mut command, timeout).with_context(|| {
            format!(
                "failed to extract {} archive {}",
                archive_type.as_str(),
                archive.display()
            )
        })?;
        Ok(())
    }

    fn run(&self, command: &mut Command, timeout: Duration) -> Result<CommandOutput> {
        run_with_timeout(command, timeout)
    }
}

pub(crate) fn build_download_command(url: &str, destination: &Path, timeout: Duration) -> Command {
    let mut command = Command::new("curl");
    command
        .arg("-fsSL")
        .arg("--connect-timeout")
        .arg("30")
        .arg("--max-time")
        .arg(timeout.as_secs().max(1).to_string())
        .arg("-o")
        .arg(destination)
        .arg(url);
    command
}

pub(crate) fn build_extract_command(
    archive: &Path,
    archive_type: ArchiveType,
    destination: &Path,
) -> Command {
    match archive_type {
        ArchiveType::TarGz => {
            let mut command = Command::new("tar");
            command
                .arg("-xzf")
                .arg(archive)
                .arg("-C")
                .arg(destination);
            command
        }
        ArchiveType::Zip => {
            let mut command = Command::new("unzip");
            command.arg("-q").arg(archive).arg("-d").arg(destination);
            command
        }
    }
}

pub fn describe_command(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

pub(crate) fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<CommandOutput> {
    let rendered = describe_command(command);
    debug!(command = %rendered, timeout_secs = timeout.as_secs(), "running external command");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start {rendered}"))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to wait for {rendered}"))?
        {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProvisionError::Timeout {
                command: rendered,
                seconds: timeout.as_secs(),
            }
            .into());
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(ProvisionError::CommandFailed {
            command: rendered,
            code: status.code(),
            stderr,
        }
        .into());
    }

    Ok(CommandOutput { stdout, stderr })
}

fn drain<R>(source: Option<R>) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}
