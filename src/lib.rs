//! Command-line diagnostic utilities for a MetricQ metric-distribution
//! network. The binary lives in `main.rs`; everything else is a library so
//! integration tests can drive the fan-out engine directly.

pub mod args;
pub mod client;
pub mod entry;
pub mod error;
pub mod fanout;
pub mod logger;
pub mod output;
pub mod shutdown;
pub mod subprocess;
pub mod time;
pub mod tools;
