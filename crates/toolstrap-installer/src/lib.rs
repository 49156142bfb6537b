mod artifact;
mod error;
mod exposure;
mod fs_utils;
mod gates;
mod host;
mod layout;
mod ledger;
mod profile;
mod report;
mod rollback;
mod scratch;
mod sequencer;
mod steps;

pub use artifact::{parse_checksum_listing, sha256_file};
pub use error::{exit_code_for, ProvisionError};
pub use exposure::{render_integration_file, IntegrationKind};
pub use gates::{check_host_platform, check_platform, check_prerequisites};
pub use host::{describe_command, CommandOutput, HostOps, SystemHost};
pub use layout::InstallLayout;
pub use ledger::{InstallLedger, RecordedAction, ReversibleAction};
pub use profile::{
    append_profile_block, profile_tag, render_profile_block, revert_profile_append, ProfileEdit,
};
pub use report::Reporter;
pub use rollback::cleanup;
pub use scratch::create_scratch_dir;
pub use sequencer::{Provisioner, RunSummary};
pub use steps::{run_step, StepContext, StepOutcome};
