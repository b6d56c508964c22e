//! CLI argument types and parsing helpers.
mod cli;
mod env;
mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{
    CheckArgs, Command, CsvArgs, DiscoverArgs, EnergyArgs, InspectArgs, SendArgs, SlurmArgs,
    SpyArgs, SummaryArgs, ToolArgs,
};
pub use types::{IgnoredEvent, OutputFormat};

pub(crate) use env::EnvFile;
pub(crate) use parsers::expand_template;
