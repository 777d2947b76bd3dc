//! # Output sink for orchestrator lines.
//!
//! Everything the orchestrator and unit contexts print goes through a [`Sink`]:
//! one call per pre-formatted line. The orchestrator never inspects the sink.
//!
//! ```text
//! Boot::printf ──► "[BOOT] <msg>" ──────────────────────┐
//! RunContext::printf ──► "[BOOT] [NORMAL:db] <msg>" ────┴──► Sink::write_line
//! ```
//!
//! Lines are styled with [`console`], which drops the escape codes when the
//! terminal does not support them. Closures `Fn(&str)` implement [`Sink`].

use std::fmt;

use console::style;

/// Receiver of pre-formatted output lines.
pub trait Sink: Send + Sync + 'static {
    /// Writes one line (without trailing newline).
    fn write_line(&self, line: &str);
}

impl<F> Sink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Default sink: forwards every line as a `tracing` INFO event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "bootvisor", "{line}");
    }
}

/// Color of an orchestrator status line.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Tone {
    Bold,
    Cyan,
    Green,
    Blue,
    Magenta,
    Red,
}

/// Styles `msg` with the given tone.
pub(crate) fn paint(tone: Tone, msg: impl fmt::Display) -> String {
    let s = style(msg.to_string());
    match tone {
        Tone::Bold => s.bold(),
        Tone::Cyan => s.cyan(),
        Tone::Green => s.green(),
        Tone::Blue => s.blue(),
        Tone::Magenta => s.magenta(),
        Tone::Red => s.red().bold(),
    }
    .to_string()
}

/// `"[BOOT] "` header shared by every line.
pub(crate) fn boot_line(msg: impl fmt::Display) -> String {
    format!("{} {msg}", style("[BOOT]").bold())
}

/// `"[PHASE:name] "` prefix of unit lines.
pub(crate) fn unit_prefix(phase: &str, name: &str) -> String {
    style(format!("[{}:{}]", phase.to_uppercase(), name))
        .bold()
        .to_string()
}

/// Grey body of unit lines.
pub(crate) fn unit_body(msg: impl fmt::Display) -> String {
    style(msg.to_string()).dim().to_string()
}

pub(crate) const BANNER: &str = r"
 _                 _       _
| |__   ___   ___ | |_ __ _(_)___  ___  _ __
| '_ \ / _ \ / _ \| __|\ \ / / __|/ _ \| '__|
| |_) | (_) | (_) | |_  \ V /\__ \ (_) | |
|_.__/ \___/ \___/ \__|  \_/ |___/\___/|_|
";
