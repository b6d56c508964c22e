//! Terminal output helpers shared by the tools.

mod histogram;
mod stats;
mod table;

pub use histogram::{HistogramChart, render_histogram};
pub use stats::{Statistics, format_sig, interval_percentiles};
pub use table::render_table;

use std::fmt::Display;
use std::sync::OnceLock;

use crossterm::style::{Color, Stylize};

static NO_COLOR: OnceLock<bool> = OnceLock::new();

pub fn set_no_color(no_color: bool) {
    drop(NO_COLOR.set(no_color));
}

fn color_enabled() -> bool {
    !NO_COLOR.get().copied().unwrap_or(false)
}

/// Styles `text` unless color output is disabled.
#[must_use]
pub fn styled(text: impl Display, color: Color) -> String {
    let text = text.to_string();
    if color_enabled() {
        text.with(color).to_string()
    } else {
        text
    }
}

/// Per-client status in discovery output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

/// Prints one status line: a colored glyph, the client token, a message.
pub fn echo_status(status: Status, token: &str, message: &str) {
    let prefix = match status {
        Status::Ok => styled("\u{2714}", Color::Green),
        Status::Warning => styled("\u{26a0}", Color::Yellow),
        Status::Error => styled("\u{274c}", Color::Red),
    };
    println!("{} {}: {}", prefix, styled(token, Color::Cyan), message);
}
