use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use toolstrap_core::ToolId;
use tracing::debug;

/// A side effect performed by this run, with enough detail to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversibleAction {
    /// Topmost directory that did not exist and was created by this run.
    DirCreated { path: PathBuf },
    /// File or directory placed at a location that was empty before.
    PayloadPlaced { path: PathBuf },
    IntegrationWritten { path: PathBuf },
    /// Profile file that did not exist before this run.
    ProfileCreated { path: PathBuf },
    /// Tagged block appended to a profile file at byte `offset`. `appended`
    /// holds the exact text written.
    ProfileAppended {
        path: PathBuf,
        tag: String,
        offset: u64,
        appended: String,
    },
    /// Toolchain workspace produced as a side effect of building a tool.
    BuildWorkspace { path: PathBuf },
}

impl ReversibleAction {
    pub fn path(&self) -> &Path {
        match self {
            Self::DirCreated { path }
            | Self::PayloadPlaced { path }
            | Self::IntegrationWritten { path }
            | Self::ProfileCreated { path }
            | Self::ProfileAppended { path, .. }
            | Self::BuildWorkspace { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirCreated { .. } => "directory",
            Self::PayloadPlaced { .. } => "payload",
            Self::IntegrationWritten { .. } => "PATH integration file",
            Self::ProfileCreated { .. } => "profile file",
            Self::ProfileAppended { .. } => "profile entry",
            Self::BuildWorkspace { .. } => "build workspace",
        }
    }

    /// Scratch produced on the way to a successful install; undone on success
    /// as well as on failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BuildWorkspace { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAction {
    pub tool: ToolId,
    pub action: ReversibleAction,
}

/// What this run created or installed, in the order it happened.
///
/// The forward pass only appends. Rollback consumes the ledger by value, so it
/// can run at most once per run.
#[derive(Debug, Default)]
pub struct InstallLedger {
    actions: Vec<RecordedAction>,
    scratch_dir: Option<PathBuf>,
}

impl InstallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tool: ToolId, action: ReversibleAction) {
        debug!(
            tool = %tool,
            kind = action.kind(),
            path = %action.path().display(),
            "recorded action"
        );
        self.actions.push(RecordedAction { tool, action });
    }

    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    /// Whether `profile` did not exist before this run.
    pub fn profile_created_by_run(&self, profile: &Path) -> bool {
        self.actions.iter().any(|recorded| {
            matches!(&recorded.action, ReversibleAction::ProfileCreated { path } if path == profile)
        })
    }

    pub fn set_scratch_dir(&mut self, path: PathBuf) -> Result<()> {
        if let Some(existing) = &self.scratch_dir {
            return Err(anyhow!(
                "scratch workspace already recorded for this run: {}",
                existing.display()
            ));
        }
        self.scratch_dir = Some(path);
        Ok(())
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }
}
