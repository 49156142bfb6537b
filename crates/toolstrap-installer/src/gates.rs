use anyhow::Result;
use toolstrap_core::{Catalog, Platform};
use tracing::debug;

use crate::error::ProvisionError;
use crate::fs_utils::path_exists;
use crate::host::HostOps;
use crate::layout::InstallLayout;

pub fn check_host_platform(catalog: &Catalog) -> Result<Platform> {
    check_platform(std::env::consts::OS, std::env::consts::ARCH, catalog)
}

/// Resolves the (OS, arch) pair and checks it against the catalog allow-list.
pub fn check_platform(os: &str, arch: &str, catalog: &Catalog) -> Result<Platform> {
    let unsupported = || ProvisionError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    };

    let platform = Platform::resolve(os, arch).ok_or_else(unsupported)?;
    if !catalog.is_supported(platform) {
        return Err(unsupported().into());
    }
    Ok(platform)
}

/// Read-only checks that must all pass before anything is written.
pub fn check_prerequisites(
    catalog: &Catalog,
    layout: &InstallLayout,
    platform: Platform,
    host: &dyn HostOps,
) -> Result<()> {
    if !host.is_elevated() {
        return Err(ProvisionError::NotElevated.into());
    }

    for command in &catalog.required_commands {
        match host.find_command(command) {
            Some(path) => debug!(command, path = %path.display(), "found required command"),
            None => {
                return Err(ProvisionError::MissingCommand {
                    command: command.clone(),
                }
                .into())
            }
        }
    }

    let applicable: Vec<_> = catalog
        .tools
        .iter()
        .filter(|tool| tool.is_supported_on(platform))
        .collect();

    for tool in &applicable {
        let root = layout.install_root(tool);
        if path_exists(&root) && !root.is_dir() {
            return Err(ProvisionError::InstallRootNotDirectory { path: root }.into());
        }
    }

    for tool in &applicable {
        let binary = layout.binary_path(tool);
        if path_exists(&binary) {
            return Err(ProvisionError::AlreadyInstalled {
                tool: tool.name.clone(),
                path: binary,
            }
            .into());
        }
    }

    for tool in applicable
        .iter()
        .filter(|tool| tool.path_integration.is_some())
    {
        for candidate in layout.integration_candidates(tool) {
            if path_exists(&candidate) {
                return Err(ProvisionError::IntegrationExists { path: candidate }.into());
            }
        }
    }

    Ok(())
}
