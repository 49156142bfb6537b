use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toolstrap_core::ToolSpec;
use tracing::debug;

use crate::fs_utils::remove_file_if_exists;
use crate::layout::InstallLayout;
use crate::ledger::{InstallLedger, ReversibleAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationKind {
    /// One directory per line, read by `path_helper` on macOS.
    PathsD,
    /// Shell snippet sourced by login shells.
    ProfileD,
}

/// Picks where a tool's PATH entry goes: `/etc/paths.d` when the host has it,
/// otherwise `/etc/profile.d`. `None` when neither directory exists.
pub fn choose_integration(
    layout: &InstallLayout,
    tool: &ToolSpec,
) -> Option<(IntegrationKind, PathBuf)> {
    let [paths_d, profile_d] = layout.integration_candidates(tool);
    if layout.paths_d_dir().is_dir() {
        Some((IntegrationKind::PathsD, paths_d))
    } else if layout.profile_d_dir().is_dir() {
        Some((IntegrationKind::ProfileD, profile_d))
    } else {
        None
    }
}

pub fn render_integration_file(kind: IntegrationKind, bin_dir: &Path) -> String {
    match kind {
        IntegrationKind::PathsD => format!("{}\n", bin_dir.display()),
        IntegrationKind::ProfileD => format!("export PATH=\"{}:$PATH\"\n", bin_dir.display()),
    }
}

/// Writes the integration file for `bin_dir`. Returns `Ok(None)` when the host
/// has no integration directory. A partially written file is removed before
/// the error is returned.
pub fn write_path_integration(
    layout: &InstallLayout,
    tool: &ToolSpec,
    bin_dir: &Path,
    ledger: &mut InstallLedger,
) -> Result<Option<PathBuf>> {
    write_path_integration_with(layout, tool, bin_dir, ledger, |file, bytes| {
        file.write_all(bytes)
    })
}

pub(crate) fn write_path_integration_with<W>(
    layout: &InstallLayout,
    tool: &ToolSpec,
    bin_dir: &Path,
    ledger: &mut InstallLedger,
    write: W,
) -> Result<Option<PathBuf>>
where
    W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let Some((kind, path)) = choose_integration(layout, tool) else {
        return Ok(None);
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create PATH integration file {}", path.display()))?;

    let contents = render_integration_file(kind, bin_dir);
    if let Err(err) = write(&mut file, contents.as_bytes()).and_then(|()| file.flush()) {
        drop(file);
        let _ = remove_file_if_exists(&path);
        return Err(err)
            .with_context(|| format!("failed to write PATH integration file {}", path.display()));
    }

    debug!(path = %path.display(), bin_dir = %bin_dir.display(), "wrote PATH integration");
    ledger.record(
        tool.id,
        ReversibleAction::IntegrationWritten {
            path: path.clone(),
        },
    );
    Ok(Some(path))
}
