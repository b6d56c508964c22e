use indicatif::{ProgressBar, ProgressStyle};

/// External observer of per-query completion. The engine declares the total
/// once, then advances the sink exactly once per settled query.
pub trait ProgressSink {
    fn begin(&mut self, total: usize);
    fn advance(&mut self, completed: usize);
    fn finish(&mut self);
}

/// Sink for non-interactive runs and tests.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&mut self, _total: usize) {}
    fn advance(&mut self, _completed: usize) {}
    fn finish(&mut self) {}
}

/// Progress bar on stderr, hidden when stderr is not a terminal.
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    #[must_use]
    pub const fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn begin(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
        {
            bar.set_style(style);
        }
        self.bar = Some(bar);
    }

    fn advance(&mut self, completed: usize) {
        if let Some(bar) = self.bar.as_ref() {
            bar.set_position(completed as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
