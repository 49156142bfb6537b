use crate::ledger::RecordedAction;

/// Sink for user-facing progress lines.
///
/// Three severities only; diagnostics go through `tracing` instead.
pub trait Reporter {
    fn info(&mut self, message: &str);

    fn warn(&mut self, message: &str);

    fn error(&mut self, message: &str);

    /// Called before each installation step; `index` is 1-based.
    fn step_started(&mut self, _index: usize, _total: usize, _label: &str) {}

    /// Called for each action cleanup has undone, newest first.
    fn reverted(&mut self, _recorded: &RecordedAction) {}

    /// Called once after cleanup has run, with the run's exit status.
    fn finished(&mut self, _status: i32) {}
}
