//! Concurrent fan-out of independent remote queries.
//!
//! All submitted operations are in flight at once; each settles into exactly
//! one [`Outcome`], with timeouts and per-query errors recorded rather than
//! propagated. One slow or failing query never delays or aborts its siblings,
//! and the engine only returns once every query has settled.

mod accumulate;
mod broadcast;
mod progress;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::timeout;

pub use accumulate::{MetricAccumulator, MetricSeries};
pub use broadcast::collect_until_deadline;
pub use progress::{NoProgress, ProgressSink, TerminalProgress};

/// The classified result of one query. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    Timeout,
    Error(E),
}

impl<T, E> Outcome<T, E> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One settled outcome per submitted identifier, ordered by identifier so
/// that rendering the set is deterministic.
pub type OutcomeSet<T, E> = BTreeMap<String, Outcome<T, E>>;

/// Runs one asynchronous operation per identifier, all concurrently, and
/// collects every outcome.
///
/// `per_query_timeout` bounds each operation independently; `None` means the
/// engine never synthesizes a timeout outcome. The progress sink is advanced
/// exactly once per settled query, in completion order.
pub async fn run<T, E, F, Fut>(
    identifiers: impl IntoIterator<Item = String>,
    perform: F,
    per_query_timeout: Option<Duration>,
    progress: &mut dyn ProgressSink,
) -> OutcomeSet<T, E>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut in_flight = FuturesUnordered::new();
    for identifier in identifiers {
        let operation = perform(identifier.clone());
        in_flight.push(async move {
            let outcome = match per_query_timeout {
                Some(limit) => match timeout(limit, operation).await {
                    Ok(Ok(value)) => Outcome::Success(value),
                    Ok(Err(error)) => Outcome::Error(error),
                    Err(_) => Outcome::Timeout,
                },
                None => match operation.await {
                    Ok(value) => Outcome::Success(value),
                    Err(error) => Outcome::Error(error),
                },
            };
            (identifier, outcome)
        });
    }

    progress.begin(in_flight.len());

    let mut outcomes = OutcomeSet::new();
    let mut completed = 0usize;
    while let Some((identifier, outcome)) = in_flight.next().await {
        outcomes.insert(identifier, outcome);
        completed = completed.saturating_add(1);
        progress.advance(completed);
    }
    progress.finish();

    outcomes
}
