use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use toolstrap_installer::{RecordedAction, Reporter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// Console sink for provisioning progress: info lines on stdout, warnings
/// and errors on stderr, and a step bar in rich mode.
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
    progress: Option<StepProgress>,
}

struct StepProgress {
    bar: ProgressBar,
    current: u64,
    total: u64,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self {
            style,
            progress: None,
        }
    }

    fn emit(&self, status: &str, message: &str, to_stderr: bool) {
        let line = render_status_line(self.style, status, message);
        let print = || {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        };
        match &self.progress {
            Some(progress) => progress.bar.suspend(print),
            None => print(),
        }
    }

    fn start_progress(&mut self, total: u64) -> &mut StepProgress {
        let style = self.style;
        self.progress.get_or_insert_with(|| {
            let bar = ProgressBar::new(total.max(1));
            if style == OutputStyle::Rich {
                if let Ok(template) = ProgressStyle::with_template(
                    "{spinner:.cyan.bold} {msg:<20} [{bar:20.cyan/blue}] {pos:>2}/{len:2} {elapsed_precise}",
                ) {
                    bar.set_style(template.tick_chars("|/-\\ ").progress_chars("=>-"));
                }
                bar.enable_steady_tick(Duration::from_millis(80));
            } else {
                bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
            }
            StepProgress {
                bar,
                current: 0,
                total,
                started_at: Instant::now(),
            }
        })
    }
}

impl Reporter for TerminalRenderer {
    fn info(&mut self, message: &str) {
        self.emit("info", message, false);
    }

    fn warn(&mut self, message: &str) {
        self.emit("warn", message, true);
    }

    fn error(&mut self, message: &str) {
        self.emit("err", message, true);
    }

    fn step_started(&mut self, index: usize, total: usize, label: &str) {
        let progress = self.start_progress(total as u64);
        progress.current = index.saturating_sub(1) as u64;
        progress.bar.set_position(progress.current);
        progress.bar.set_message(label.to_string());
    }

    fn reverted(&mut self, recorded: &RecordedAction) {
        let message = format!(
            "removed {} for {}: {}",
            recorded.action.kind(),
            recorded.tool,
            recorded.action.path().display()
        );
        self.emit("info", &message, false);
    }

    fn finished(&mut self, status: i32) {
        let Some(progress) = self.progress.take() else {
            return;
        };
        progress.bar.finish_and_clear();
        if let Some(line) = render_completion_line(
            self.style,
            status,
            progress.current + 1,
            progress.total,
            progress.started_at.elapsed(),
        ) {
            println!("{line}");
        }
    }
}

/// Summary bar printed after a successful run. Failed runs end on their
/// rollback lines instead.
pub(crate) fn render_completion_line(
    style: OutputStyle,
    status: i32,
    completed: u64,
    total: u64,
    elapsed: Duration,
) -> Option<String> {
    if status != 0 {
        return None;
    }
    render_progress_line(style, "toolstrap", completed, total, Some(elapsed))
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "info" => "[..]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{}/{}", HumanCount(bounded_current), HumanCount(total));
    let suffix = elapsed
        .map(|value| format!(" in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
