use super::*;
use clap::error::ErrorKind;
use clap::CommandFactory;
use std::time::Duration;

use crate::render::{render_completion_line, render_progress_line, render_status_line};

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn cli_accepts_no_operational_arguments() {
    assert!(Cli::try_parse_from(["toolstrap"]).is_ok());

    let err = Cli::try_parse_from(["toolstrap", "--prefix", "/opt"])
        .expect_err("unknown flags must be rejected");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);

    let err = Cli::try_parse_from(["toolstrap", "install"]).expect_err("positionals must fail");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}

#[test]
fn cli_reports_version() {
    let err = Cli::try_parse_from(["toolstrap", "--version"]).expect_err("version exits early");
    assert_eq!(err.kind(), ErrorKind::DisplayVersion);
}

#[test]
fn resolve_output_style_uses_rich_when_both_streams_are_tty() {
    assert_eq!(resolve_output_style(true, true), OutputStyle::Rich);
}

#[test]
fn resolve_output_style_uses_rich_when_stdout_is_tty_and_stderr_is_not() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
}

#[test]
fn resolve_output_style_uses_plain_when_stdout_is_not_tty() {
    assert_eq!(resolve_output_style(false, true), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed go 1.22.5"),
        "installed go 1.22.5"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed go 1.22.5"),
        "[OK] installed go 1.22.5"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "skipping k9s"),
        "[WARN] skipping k9s"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "err", "download failed"),
        "[ERR] download failed"
    );
}

#[test]
fn render_status_line_rich_keeps_progress_messages_neutral() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "info", "downloading go 1.22.5"),
        "[..] downloading go 1.22.5"
    );
}

#[test]
fn completion_line_is_only_rendered_for_successful_runs() {
    let elapsed = Duration::from_millis(2_000);
    let line = render_completion_line(OutputStyle::Rich, 0, 4, 4, elapsed)
        .expect("successful rich runs must render a summary bar");
    assert!(line.contains("100% 4/4 in 2.000s"));

    assert_eq!(render_completion_line(OutputStyle::Rich, 7, 3, 4, elapsed), None);
    assert_eq!(render_completion_line(OutputStyle::Plain, 0, 4, 4, elapsed), None);
}

#[test]
fn render_progress_line_is_suppressed_in_plain_mode() {
    assert_eq!(
        render_progress_line(OutputStyle::Plain, "toolstrap", 4, 4, None),
        None
    );
}

#[test]
fn render_progress_line_rich_reports_percent_and_counts() {
    let line = render_progress_line(
        OutputStyle::Rich,
        "toolstrap",
        2,
        4,
        Some(Duration::from_millis(1_250)),
    )
    .expect("rich mode must render a line");

    assert!(line.contains("toolstrap"));
    assert!(line.contains("=========---------"));
    assert!(line.contains(" 50% 2/4 in 1.250s"));
}

#[test]
fn exit_status_maps_statuses_into_process_range() {
    assert_eq!(exit_status(0), 0);
    assert_eq!(exit_status(22), 22);
    assert_eq!(exit_status(124), 124);
    assert_eq!(exit_status(-1), 1);
    assert_eq!(exit_status(300), 1);
}

#[test]
fn plain_renderer_tracks_steps_without_drawing() {
    let mut renderer = TerminalRenderer::new(OutputStyle::Plain);
    renderer.step_started(1, 4, "go 1.22.5");
    renderer.info("installed go 1.22.5");
    renderer.step_started(2, 4, "tflint 0.52.0");
    renderer.finished(0);
    renderer.finished(0);
}
