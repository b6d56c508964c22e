use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::time::{Timedelta, Timestamp};

use super::parsers::{parse_duration_arg, parse_template_arg, parse_timestamp_arg};
use super::types::{IgnoredEvent, OutputFormat};

const EPILOG: &str = "All options can be passed as environment variables prefixed with \
'METRICQ_', i.e. 'METRICQ_SERVER=metricq://...'. A '.metricq' file in the current or home \
directory with the same KEY=VALUE settings is used as a fallback. Some options, including \
server and token, can contain placeholders for $USER and $HOST.";

#[derive(Debug, Parser, Clone)]
#[clap(
    name = "metricq",
    version,
    about = "Diagnostic utilities for a MetricQ network: discover live agents, check historic data, dump time series, compute energy integrals, and inspect live metric streams.",
    after_help = EPILOG
)]
pub struct ToolArgs {
    /// MetricQ server URL, e.g. metricq://broker.example.com
    #[arg(
        long,
        short = 's',
        global = true,
        env = "METRICQ_SERVER",
        value_name = "URL",
        value_parser = parse_template_arg
    )]
    pub server: Option<String>,

    /// Token identifying this client on the MetricQ network
    #[arg(
        long,
        global = true,
        env = "METRICQ_TOKEN",
        value_name = "CLIENT_TOKEN",
        value_parser = parse_template_arg
    )]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Send an RPC broadcast and collect replies from online clients
    Discover(DiscoverArgs),
    /// Check all historic metrics for non-finite values
    Check(CheckArgs),
    /// Dump historic values of one metric to a CSV file
    Csv(CsvArgs),
    /// Integrate a power metric over the runtime of a command
    Energy(EnergyArgs),
    /// Follow one metric live until Ctrl+C, then print statistics
    Inspect(InspectArgs),
    /// Collect metrics while a command runs, then print per-metric summaries
    Summary(SummaryArgs),
    /// Publish a single time-value pair for a metric
    Send(SendArgs),
    /// Look up metadata and storage location for a set of metrics
    Spy(SpyArgs),
    /// Compute per-job energy for finished SLURM jobs
    Slurm(SlurmArgs),
}

impl Command {
    /// Token used when none is configured, with `$USER` expanded later.
    #[must_use]
    pub const fn default_token(&self) -> &'static str {
        match self {
            Self::Discover(_) => "tool-$USER-discover",
            Self::Check(_) => "tool-$USER-check",
            Self::Csv(_) => "history-$USER-tool-csv",
            Self::Energy(_) => "sink-$USER-tool-energy",
            Self::Inspect(_) => "agent-$USER-tool-inspect",
            Self::Summary(_) => "agent-$USER-tool-summary",
            Self::Send(_) => "source-$USER-tool-send",
            Self::Spy(_) => "tool-$USER-spy",
            Self::Slurm(_) => "history-$USER-tool-slurm",
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct DiscoverArgs {
    /// Diff against a list of previously discovered clients (from --format=json)
    #[arg(long, short = 'd', value_name = "JSON_FILE")]
    pub diff: Option<PathBuf>,

    /// Wait at most this long for replies
    #[arg(long, short = 't', value_parser = parse_duration_arg)]
    pub timeout: Option<Timedelta>,

    /// Print results in this format
    #[arg(long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Replies to suppress in pretty output (repeatable)
    #[arg(long, value_enum)]
    pub ignore: Vec<IgnoredEvent>,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    /// Per-metric timeout for aggregate requests; unlimited when unset
    #[arg(long, short = 't', value_parser = parse_duration_arg)]
    pub timeout: Option<Timedelta>,
}

#[derive(Debug, Args, Clone)]
pub struct CsvArgs {
    /// Output CSV file
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Start of the dumped time range
    #[arg(long, short = 's', default_value = "-1h", value_parser = parse_timestamp_arg)]
    pub start_time: Timestamp,

    /// End of the dumped time range
    #[arg(long, short = 'e', default_value = "now", value_parser = parse_timestamp_arg)]
    pub end_time: Timestamp,

    /// Metric to dump
    pub metric: String,
}

#[derive(Debug, Args, Clone)]
pub struct EnergyArgs {
    /// Power metric to integrate, in W ($USER/$HOST placeholders expand)
    #[arg(long, short = 'm', value_parser = parse_template_arg)]
    pub metric: String,

    /// Queue expiration in seconds; set to the maximum expected command runtime
    #[arg(long, default_value_t = 3600)]
    pub expires: u64,

    /// Command to run while collecting data
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Skip the histogram of durations between data points
    #[arg(long, short = 'I')]
    pub no_intervals_histogram: bool,

    /// Skip the histogram of metric values
    #[arg(long, short = 'H')]
    pub no_values_histogram: bool,

    /// Show a histogram of the chunk sizes of received messages
    #[arg(long, short = 'c')]
    pub chunk_sizes_histogram: bool,

    /// Print each data point as it arrives
    #[arg(long, short = 'd')]
    pub print_data_points: bool,

    /// Metric to inspect
    pub metric: String,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryArgs {
    /// Metric to collect (repeatable)
    #[arg(long, short = 'm', required = true)]
    pub metric: Vec<String>,

    /// Show a histogram of durations between data points
    #[arg(long, short = 'i')]
    pub intervals_histogram: bool,

    /// Show a histogram of metric values
    #[arg(long)]
    pub values_histogram: bool,

    /// Skip the statistics block
    #[arg(long, short = 'S')]
    pub no_print_statistics: bool,

    /// Print each data point as it arrives
    #[arg(long, short = 'd')]
    pub print_data_points: bool,

    /// Command to run while collecting data
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SendArgs {
    /// Timestamp to send
    #[arg(long, default_value = "now", value_parser = parse_timestamp_arg)]
    pub timestamp: Timestamp,

    /// Metric name
    pub metric: String,

    /// Value to send
    pub value: f64,
}

#[derive(Debug, Args, Clone)]
pub struct SpyArgs {
    /// Print results in this format
    #[arg(long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Metric names or selector patterns
    #[arg(required = true)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SlurmArgs {
    /// Per-host power metric pattern; $HOST is replaced with each job host.
    /// The metric is assumed to be in W (watts).
    #[arg(long, short = 'm')]
    pub metric: String,

    /// job(.step) or list of job(.steps), as accepted by sacct
    #[arg(long, short = 'j')]
    pub jobs: String,
}
