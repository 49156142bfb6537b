use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use toolstrap_core::{ArchiveSource, Platform, ToolId, ToolSpec};
use tracing::debug;

use crate::error::ProvisionError;
use crate::fs_utils::{path_exists, remove_file_if_exists, set_executable};
use crate::host::HostOps;
use crate::ledger::{InstallLedger, ReversibleAction};

/// Downloads the tool's artifact into `scratch` and checks it against the
/// publisher's SHA-256 listing. A mismatching file is removed.
pub fn fetch_verified_artifact(
    host: &dyn HostOps,
    source: &ArchiveSource,
    platform: Platform,
    version: &str,
    scratch: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let url = source.artifact_url(platform, version);
    let file_name = source.artifact_file_name(platform, version);
    let destination = scratch.join(&file_name);

    debug!(url, destination = %destination.display(), "downloading artifact");
    host.download(&url, &destination, timeout)?;

    let checksum_url = source.checksum_url(platform, version);
    let listing = host.fetch_text(&checksum_url, timeout)?;
    let expected = parse_checksum_listing(&listing, &file_name).ok_or_else(|| {
        ProvisionError::ChecksumMissing {
            url: checksum_url.clone(),
            file: file_name.clone(),
        }
    })?;

    let actual = sha256_file(&destination)?;
    if actual != expected {
        let _ = remove_file_if_exists(&destination);
        return Err(ProvisionError::ChecksumMismatch {
            path: destination,
            expected,
            actual,
        }
        .into());
    }

    debug!(file = %file_name, sha256 = %actual, "artifact checksum verified");
    Ok(destination)
}

/// Finds the SHA-256 for `file_name` in a checksum listing.
///
/// Accepts a bare single-hash document (`<hex>`) as well as `sha256sum`
/// style listings (`<hex>  <file>` or `<hex> *<file>`).
pub fn parse_checksum_listing(listing: &str, file_name: &str) -> Option<String> {
    let lines: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if let [single] = lines.as_slice() {
        let mut fields = single.split_whitespace();
        if let (Some(hash), None) = (fields.next(), fields.next()) {
            return is_sha256_hex(hash).then(|| hash.to_ascii_lowercase());
        }
    }

    lines.iter().find_map(|line| {
        let mut fields = line.split_whitespace();
        let hash = fields.next()?;
        let name = fields.next()?.trim_start_matches('*');
        let name = name.rsplit('/').next().unwrap_or(name);
        (name == file_name && is_sha256_hex(hash)).then(|| hash.to_ascii_lowercase())
    })
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Extracts `archive` into a staging directory next to it and returns the
/// path of the catalog payload inside it.
pub fn stage_payload(
    host: &dyn HostOps,
    source: &ArchiveSource,
    tool: &ToolSpec,
    archive: &Path,
    scratch: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let staged_dir = scratch.join(format!("{}-staged", tool.name));
    fs::create_dir_all(&staged_dir)
        .with_context(|| format!("failed to create {}", staged_dir.display()))?;

    host.extract(archive, source.archive_type()?, &staged_dir, timeout)?;

    let payload = staged_dir.join(&source.payload);
    if !path_exists(&payload) {
        return Err(anyhow!(
            "payload '{}' was not found after extracting {}",
            source.payload,
            archive.display()
        ));
    }
    Ok(payload)
}

/// Creates `dir` when absent, recording the topmost directory this run
/// brought into existence.
pub fn ensure_dir(dir: &Path, tool: ToolId, ledger: &mut InstallLedger) -> Result<()> {
    if path_exists(dir) {
        if !dir.is_dir() {
            return Err(ProvisionError::InstallRootNotDirectory {
                path: dir.to_path_buf(),
            }
            .into());
        }
        return Ok(());
    }

    let topmost = dir
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !path_exists(ancestor))
        .last()
        .unwrap_or(dir)
        .to_path_buf();
    ledger.record(tool, ReversibleAction::DirCreated { path: topmost });

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Moves a staged payload into the install root without overwriting
/// anything. A directory payload contributes its top-level entries; a file
/// payload becomes the tool's binary.
pub fn place_payload(
    tool: &ToolSpec,
    staged: &Path,
    install_root: &Path,
    ledger: &mut InstallLedger,
) -> Result<PathBuf> {
    let binary = install_root.join(&tool.binary);

    if staged.is_dir() {
        let mut entries = fs::read_dir(staged)
            .with_context(|| format!("failed to read {}", staged.display()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()
            .with_context(|| format!("failed to read {}", staged.display()))?;
        entries.sort();

        for src in entries {
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let dst = install_root.join(file_name);
            claim_destination(tool, &dst, ledger)?;
            move_entry(&src, &dst)?;
        }
    } else {
        if let Some(parent) = binary.parent() {
            ensure_dir(parent, tool.id, ledger)?;
        }
        claim_destination(tool, &binary, ledger)?;
        fs::copy(staged, &binary).with_context(|| {
            format!(
                "failed to copy {} to {}",
                staged.display(),
                binary.display()
            )
        })?;
    }

    if !binary.is_file() {
        return Err(anyhow!(
            "{} payload did not provide its binary at {}",
            tool.name,
            binary.display()
        ));
    }
    set_executable(&binary)
        .with_context(|| format!("failed to mark {} executable", binary.display()))?;
    Ok(binary)
}

/// Copies a single built file to `destination` as an executable.
pub fn place_file(
    tool: &ToolSpec,
    src: &Path,
    destination: &Path,
    ledger: &mut InstallLedger,
) -> Result<()> {
    if let Some(parent) = destination.parent() {
        ensure_dir(parent, tool.id, ledger)?;
    }
    claim_destination(tool, destination, ledger)?;
    fs::copy(src, destination).with_context(|| {
        format!(
            "failed to copy {} to {}",
            src.display(),
            destination.display()
        )
    })?;
    set_executable(destination)
        .with_context(|| format!("failed to mark {} executable", destination.display()))
}

fn claim_destination(tool: &ToolSpec, dst: &Path, ledger: &mut InstallLedger) -> Result<()> {
    if path_exists(dst) {
        return Err(ProvisionError::AlreadyInstalled {
            tool: tool.name.clone(),
            path: dst.to_path_buf(),
        }
        .into());
    }
    ledger.record(
        tool.id,
        ReversibleAction::PayloadPlaced {
            path: dst.to_path_buf(),
        },
    );
    Ok(())
}

fn move_entry(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("failed to stat {}", src.display()))?;
    if metadata.is_dir() {
        copy_dir_recursive(src, dst)?;
        fs::remove_dir_all(src)
            .with_context(|| format!("failed to cleanup staging dir: {}", src.display()))?;
    } else {
        copy_entry(src, dst, &metadata)?;
        fs::remove_file(src)
            .with_context(|| format!("failed to cleanup staged file: {}", src.display()))?;
    }
    Ok(())
}

pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            copy_entry(&src_path, &dst_path, &metadata)?;
        }
    }
    Ok(())
}

fn copy_entry(src: &Path, dst: &Path, metadata: &fs::Metadata) -> Result<()> {
    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src)
            .with_context(|| format!("failed to read symlink {}", src.display()))?;
        std::os::unix::fs::symlink(&target, dst).with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                dst.display(),
                target.display()
            )
        })?;
        return Ok(());
    }
    #[cfg(not(unix))]
    let _ = metadata;

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}
