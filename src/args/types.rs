use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored output
    Pretty,
    /// Machine-readable JSON on stdout
    Json,
}

/// Discovery events that can be suppressed in pretty output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IgnoredEvent {
    /// Replies whose body reports an error
    ErrorResponses,
}
