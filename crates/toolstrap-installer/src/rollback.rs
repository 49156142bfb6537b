use anyhow::{Context, Result};
use tracing::debug;

use crate::fs_utils::remove_path_if_exists;
use crate::ledger::{InstallLedger, RecordedAction, ReversibleAction};
use crate::profile::revert_profile_append;
use crate::report::Reporter;

/// Final cleanup for a run, invoked exactly once with the run's exit status.
///
/// A non-zero `status` undoes every recorded action, newest first. Status 0
/// only undoes transient actions. Either way the scratch workspace is
/// removed. Undo failures are reported and the walk continues; the returned
/// status is always `status`.
pub fn cleanup(ledger: InstallLedger, status: i32, reporter: &mut dyn Reporter) -> i32 {
    let rolling_back = status != 0;

    let mut undone = 0usize;
    for recorded in ledger.actions().iter().rev() {
        if !rolling_back && !recorded.action.is_transient() {
            continue;
        }
        match undo(recorded, &ledger) {
            Ok(()) => {
                undone += 1;
                reporter.reverted(recorded);
            }
            Err(err) => reporter.error(&format!(
                "failed to remove {} for {}: {err:#}",
                recorded.action.kind(),
                recorded.tool
            )),
        }
    }

    if let Some(scratch_dir) = ledger.scratch_dir() {
        if let Err(err) = remove_path_if_exists(scratch_dir) {
            reporter.error(&format!(
                "failed to remove scratch workspace {}: {err}",
                scratch_dir.display()
            ));
        }
    }

    if rolling_back {
        reporter.info(&format!("rollback complete ({undone} change(s) reverted)"));
    } else {
        reporter.info("cleanup complete");
    }
    reporter.finished(status);
    status
}

fn undo(recorded: &RecordedAction, ledger: &InstallLedger) -> Result<()> {
    let action = &recorded.action;
    debug!(
        tool = %recorded.tool,
        kind = action.kind(),
        path = %action.path().display(),
        "undoing action"
    );

    match action {
        ReversibleAction::ProfileAppended {
            path,
            tag,
            offset,
            appended,
        } => {
            // The whole file goes with its ProfileCreated record.
            if ledger.profile_created_by_run(path) {
                return Ok(());
            }
            if !revert_profile_append(path, *offset, appended)? {
                debug!(path = %path.display(), tag = %tag, "appended block no longer present");
            }
        }
        ReversibleAction::DirCreated { path }
        | ReversibleAction::PayloadPlaced { path }
        | ReversibleAction::IntegrationWritten { path }
        | ReversibleAction::ProfileCreated { path }
        | ReversibleAction::BuildWorkspace { path } => {
            remove_path_if_exists(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}
