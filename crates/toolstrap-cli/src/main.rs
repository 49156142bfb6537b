use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use toolstrap_core::Catalog;
use toolstrap_installer::{InstallLayout, Provisioner, Reporter, SystemHost};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod render;

use render::{resolve_output_style, OutputStyle, TerminalRenderer};

const LOG_ENV: &str = "TOOLSTRAP_LOG";

#[derive(Parser, Debug)]
#[command(name = "toolstrap", version)]
#[command(
    about = "Install the Go toolchain, tflint, Terraform and k9s onto this host",
    long_about = "Installs a fixed set of developer tools. Must run with elevated \
                  privileges. Any failure rolls back everything this run created."
)]
struct Cli {}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("toolstrap=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    resolve_output_style(std::io::stdout().is_terminal(), std::io::stderr().is_terminal())
}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    init_tracing();

    let mut renderer = TerminalRenderer::new(current_output_style());
    let status = match provision(&mut renderer) {
        Ok(status) => status,
        Err(err) => {
            renderer.error(&format!("{err:#}"));
            1
        }
    };
    ExitCode::from(exit_status(status))
}

fn provision(renderer: &mut TerminalRenderer) -> Result<i32> {
    let catalog = Catalog::builtin()?;
    let layout = InstallLayout::from_env()?;
    let host = SystemHost::new();
    tracing::debug!(?layout, "resolved install layout");

    Ok(Provisioner::new(&catalog, &layout, &host).run(renderer))
}

/// Statuses outside 0..=255 collapse to a generic failure.
fn exit_status(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

#[cfg(test)]
mod tests;
