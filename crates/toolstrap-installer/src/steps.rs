use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use toolstrap_core::{
    ArchiveSource, BuildSource, Catalog, InstallBase, Platform, ToolSource, ToolSpec,
};
use tracing::debug;

use crate::artifact::{
    ensure_dir, fetch_verified_artifact, place_file, place_payload, stage_payload,
};
use crate::error::ProvisionError;
use crate::exposure::write_path_integration;
use crate::fs_utils::{chown_tree, path_exists};
use crate::host::HostOps;
use crate::layout::InstallLayout;
use crate::ledger::{InstallLedger, ReversibleAction};
use crate::profile::{append_profile_block, profile_tag, render_profile_block};
use crate::report::Reporter;

/// Everything a tool step reads, plus the toolchain workspace handed from the
/// runtime step to the build step.
pub struct StepContext<'a> {
    pub catalog: &'a Catalog,
    pub layout: &'a InstallLayout,
    pub platform: Platform,
    pub host: &'a dyn HostOps,
    pub scratch: &'a Path,
    pub reporter: &'a mut dyn Reporter,
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Installed { binary: PathBuf },
    Skipped { reason: String },
}

/// Installs one tool. Fatal errors propagate; best-effort work (PATH
/// integration, profile edits, ownership) is reported as warnings.
pub fn run_step(
    ctx: &mut StepContext<'_>,
    tool: &ToolSpec,
    ledger: &mut InstallLedger,
) -> Result<StepOutcome> {
    if !tool.is_supported_on(ctx.platform) {
        let reason = format!("{} is not available for {}", tool.name, ctx.platform);
        ctx.reporter.warn(&format!("skipping {}: {reason}", tool.name));
        return Ok(StepOutcome::Skipped { reason });
    }

    let binary = match &tool.source {
        ToolSource::Archive(source) => install_archive_tool(ctx, tool, source, ledger)?,
        ToolSource::Build(source) => install_built_tool(ctx, tool, source, ledger)?,
    };

    if tool.toolchain.is_some() {
        let workspace = query_workspace(ctx, tool, &binary)?;
        ctx.workspace = Some(workspace);
    }

    let install_root = ctx.layout.install_root(tool);
    if let Some(dir) = &tool.path_integration {
        let bin_dir = install_root.join(dir);
        match write_path_integration(ctx.layout, tool, &bin_dir, ledger) {
            Ok(Some(path)) => ctx
                .reporter
                .info(&format!("added {} to PATH via {}", bin_dir.display(), path.display())),
            Ok(None) => ctx.reporter.warn(&format!(
                "no /etc/paths.d or /etc/profile.d on this host; add {} to PATH manually",
                bin_dir.display()
            )),
            Err(err) => ctx.reporter.warn(&format!("{err:#}")),
        }
    }

    if let Some(dir) = &tool.profile_path {
        update_profiles(ctx, tool, &install_root.join(dir), ledger);
    }

    if tool.install_base == InstallBase::UserHome {
        hand_back_ownership(ctx, tool, ledger);
    }

    if !tool.self_check.is_empty() {
        let mut command = Command::new(&binary);
        command.args(&tool.self_check);
        let output = ctx
            .host
            .run(&mut command, ctx.catalog.timeouts.self_check())
            .with_context(|| format!("{} self-check failed", tool.name))?;
        debug!(tool = %tool.name, output = %output.stdout.trim(), "self-check passed");
    }

    ctx.reporter.info(&format!(
        "installed {} {} at {}",
        tool.name,
        tool.version,
        binary.display()
    ));
    Ok(StepOutcome::Installed { binary })
}

/// Download, verify, stage and place an archive-sourced tool.
pub fn install_archive_tool(
    ctx: &mut StepContext<'_>,
    tool: &ToolSpec,
    source: &ArchiveSource,
    ledger: &mut InstallLedger,
) -> Result<PathBuf> {
    let version = tool.version_string();
    let timeouts = ctx.catalog.timeouts;

    ctx.reporter.info(&format!(
        "downloading {} {}",
        tool.name,
        source.artifact_url(ctx.platform, &version)
    ));
    let archive = fetch_verified_artifact(
        ctx.host,
        source,
        ctx.platform,
        &version,
        ctx.scratch,
        timeouts.download(),
    )?;
    let staged = stage_payload(
        ctx.host,
        source,
        tool,
        &archive,
        ctx.scratch,
        timeouts.extract(),
    )?;

    let install_root = ctx.layout.install_root(tool);
    ensure_dir(&install_root, tool.id, ledger)?;
    place_payload(tool, &staged, &install_root, ledger)
}

/// Builds a tool with the toolchain installed by an earlier step, inside the
/// workspace that step reserved.
pub fn install_built_tool(
    ctx: &mut StepContext<'_>,
    tool: &ToolSpec,
    source: &BuildSource,
    ledger: &mut InstallLedger,
) -> Result<PathBuf> {
    let toolchain_tool = ctx
        .catalog
        .tool(source.toolchain)
        .ok_or_else(|| anyhow!("build toolchain '{}' is not in the catalog", source.toolchain))?;
    let toolchain = toolchain_tool
        .toolchain
        .as_ref()
        .ok_or_else(|| anyhow!("'{}' does not provide a toolchain", toolchain_tool.name))?;
    let workspace = ctx.workspace.clone().ok_or_else(|| {
        anyhow!(
            "{} must be installed before building {}",
            toolchain_tool.name,
            tool.name
        )
    })?;
    let compiler = ctx.layout.binary_path(toolchain_tool);

    ledger.record(
        tool.id,
        ReversibleAction::BuildWorkspace {
            path: workspace.clone(),
        },
    );

    let module_ref = source.module_ref(&tool.version_string());
    let mut command = Command::new(&compiler);
    command.args(toolchain.build_args(&module_ref));
    if let Some(var) = &toolchain.workspace_env {
        command.env(var, &workspace);
    }
    if let Some(var) = &toolchain.cache_env {
        command.env(var, workspace.join(".cache"));
    }
    command.envs(&toolchain.env);

    ctx.reporter.info(&format!(
        "building {} {} with {}",
        tool.name, tool.version, toolchain_tool.name
    ));
    ctx.host
        .run(&mut command, ctx.catalog.timeouts.build())
        .with_context(|| format!("failed to build {module_ref}"))?;

    let output = workspace.join(&toolchain.output_dir).join(&source.output);
    if !output.is_file() {
        return Err(ProvisionError::BuildOutputMissing { path: output }.into());
    }

    let destination = ctx.layout.binary_path(tool);
    place_file(tool, &output, &destination, ledger)?;
    Ok(destination)
}

/// Asks the freshly installed toolchain where its workspace lives. The
/// workspace must not exist yet, so everything in it belongs to this run.
pub fn query_workspace(ctx: &StepContext<'_>, tool: &ToolSpec, binary: &Path) -> Result<PathBuf> {
    let toolchain = tool
        .toolchain
        .as_ref()
        .ok_or_else(|| anyhow!("'{}' does not provide a toolchain", tool.name))?;

    let mut command = Command::new(binary);
    command.args(&toolchain.workspace_query);
    let output = ctx
        .host
        .run(&mut command, ctx.catalog.timeouts.self_check())
        .with_context(|| format!("failed to query the {} workspace", tool.name))?;

    let reported = output.stdout.trim();
    if reported.is_empty() {
        return Err(anyhow!("{} reported an empty workspace path", tool.name));
    }
    // Lists like GOPATH=a:b build into the first entry.
    let first = reported.split(':').next().unwrap_or(reported);
    let workspace = PathBuf::from(first);
    if !workspace.is_absolute() {
        return Err(anyhow!("{} reported a relative workspace path: {first}", tool.name));
    }
    if path_exists(&workspace) {
        return Err(ProvisionError::WorkspaceExists { path: workspace }.into());
    }
    debug!(tool = %tool.name, workspace = %workspace.display(), "toolchain workspace reserved");
    Ok(workspace)
}

fn update_profiles(
    ctx: &mut StepContext<'_>,
    tool: &ToolSpec,
    bin_dir: &Path,
    ledger: &mut InstallLedger,
) {
    let tag = profile_tag(&tool.name);
    let block = render_profile_block(&tag, bin_dir);

    for profile in ctx.layout.profile_paths(ctx.catalog) {
        match append_profile_block(&profile, &block) {
            Ok(edit) => {
                if edit.created {
                    ledger.record(
                        tool.id,
                        ReversibleAction::ProfileCreated {
                            path: profile.clone(),
                        },
                    );
                }
                ledger.record(
                    tool.id,
                    ReversibleAction::ProfileAppended {
                        path: profile,
                        tag: tag.clone(),
                        offset: edit.offset,
                        appended: edit.appended,
                    },
                );
            }
            Err(err) => ctx.reporter.warn(&format!("{err:#}")),
        }
    }
}

fn hand_back_ownership(ctx: &mut StepContext<'_>, tool: &ToolSpec, ledger: &InstallLedger) {
    let Some((uid, gid)) = ctx.layout.user_owner() else {
        return;
    };

    let owned: Vec<PathBuf> = ledger
        .actions()
        .iter()
        .filter(|recorded| recorded.tool == tool.id)
        .filter_map(|recorded| match &recorded.action {
            ReversibleAction::DirCreated { path }
            | ReversibleAction::PayloadPlaced { path }
            | ReversibleAction::ProfileCreated { path } => Some(path.clone()),
            _ => None,
        })
        .collect();

    for path in owned {
        if let Err(err) = chown_tree(&path, uid, gid) {
            ctx.reporter.warn(&format!(
                "failed to hand {} back to uid {uid}: {err}",
                path.display()
            ));
        }
    }
}
