use anyhow::Result;
use toolstrap_core::Catalog;
use tracing::{debug, info};

use crate::error::exit_code_for;
use crate::gates::{check_platform, check_prerequisites};
use crate::host::HostOps;
use crate::layout::InstallLayout;
use crate::ledger::InstallLedger;
use crate::report::Reporter;
use crate::rollback;
use crate::scratch::create_scratch_dir;
use crate::steps::{run_step, StepContext, StepOutcome};

/// Drives one provisioning run: gates, scratch workspace, tool steps in
/// catalog order, then cleanup.
pub struct Provisioner<'a> {
    catalog: &'a Catalog,
    layout: &'a InstallLayout,
    host: &'a dyn HostOps,
    host_os: String,
    host_arch: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub installed: Vec<String>,
    pub skipped: Vec<String>,
}

impl<'a> Provisioner<'a> {
    pub fn new(catalog: &'a Catalog, layout: &'a InstallLayout, host: &'a dyn HostOps) -> Self {
        Self {
            catalog,
            layout,
            host,
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Overrides the detected (OS, arch) pair.
    pub fn with_host_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.host_os = os.into();
        self.host_arch = arch.into();
        self
    }

    /// Runs to completion and returns the process exit status. Cleanup runs
    /// exactly once whatever the outcome.
    pub fn run(&self, reporter: &mut dyn Reporter) -> i32 {
        let mut ledger = InstallLedger::new();
        let status = match self.run_forward(&mut ledger, reporter) {
            Ok(summary) => {
                report_summary(&summary, reporter);
                0
            }
            Err(err) => {
                reporter.error(&format!("{err:#}"));
                exit_code_for(&err)
            }
        };
        debug!(status, "forward pass finished");
        rollback::cleanup(ledger, status, reporter)
    }

    fn run_forward(
        &self,
        ledger: &mut InstallLedger,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let platform = check_platform(&self.host_os, &self.host_arch, self.catalog)?;
        info!(%platform, "platform accepted");
        check_prerequisites(self.catalog, self.layout, platform, self.host)?;

        let scratch = create_scratch_dir(self.layout.scratch_parent())?;
        ledger.set_scratch_dir(scratch.clone())?;

        let mut ctx = StepContext {
            catalog: self.catalog,
            layout: self.layout,
            platform,
            host: self.host,
            scratch: &scratch,
            reporter,
            workspace: None,
        };

        let total = self.catalog.tools.len();
        let mut summary = RunSummary::default();
        for (index, tool) in self.catalog.tools.iter().enumerate() {
            ctx.reporter.step_started(
                index + 1,
                total,
                &format!("{} {}", tool.name, tool.version),
            );
            match run_step(&mut ctx, tool, ledger)? {
                StepOutcome::Installed { .. } => summary.installed.push(tool.name.clone()),
                StepOutcome::Skipped { .. } => summary.skipped.push(tool.name.clone()),
            }
        }
        Ok(summary)
    }
}

fn report_summary(summary: &RunSummary, reporter: &mut dyn Reporter) {
    let mut line = format!("installed {} tool(s)", summary.installed.len());
    if !summary.installed.is_empty() {
        line.push_str(&format!(": {}", summary.installed.join(", ")));
    }
    if !summary.skipped.is_empty() {
        line.push_str(&format!("; skipped {}", summary.skipped.join(", ")));
    }
    reporter.info(&line);
}
