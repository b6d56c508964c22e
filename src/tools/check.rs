//! Scans every historic metric for non-finite aggregate values. This is the
//! heaviest consumer of the fan-out engine: one aggregate request per metric,
//! all in flight at once, with a progress bar while they settle.

use tracing::debug;

use crate::args::CheckArgs;
use crate::client::TimeAggregate;
use crate::error::{AppResult, HistoryError};
use crate::fanout::{self, Outcome, OutcomeSet, TerminalProgress};
use crate::output::{Status, echo_status};
use crate::time::{Timedelta, Timestamp};

use super::ToolContext;

/// Aggregates are requested over a fixed sanity window: anything recorded
/// before this is treated as equally suspect as values from the future.
const RANGE_START: &str = "2010-01-01T00:00:00Z";
const RANGE_END_SLACK: Timedelta = Timedelta::from_seconds(7 * 86_400);

/// Effectively unlimited; the broker caps listings at this count.
const METRIC_LISTING_LIMIT: u64 = 9_999_999;

pub async fn run(context: &ToolContext, args: &CheckArgs) -> AppResult<()> {
    let client = super::connect(context).await?;
    let metrics = client.get_metric_names("", METRIC_LISTING_LIMIT).await?;
    debug!(count = metrics.len(), "checking historic metrics");

    let start = Timestamp::parse(RANGE_START)?;
    let end = Timestamp::now() + RANGE_END_SLACK;
    let client_ref = &client;
    let mut progress = TerminalProgress::new();
    let outcomes = fanout::run(
        metrics,
        |metric| async move { client_ref.history_aggregate(&metric, start, end).await },
        args.timeout.map(Timedelta::to_duration),
        &mut progress,
    )
    .await;
    client.close().await;

    report(&outcomes);
    Ok(())
}

fn report(outcomes: &OutcomeSet<TimeAggregate, HistoryError>) {
    let mut healthy = 0usize;
    let mut bad = 0usize;
    let mut timeouts = 0usize;
    let mut errors = 0usize;

    for (metric, outcome) in outcomes {
        match outcome {
            Outcome::Success(aggregate) => {
                if is_sane(aggregate) {
                    healthy += 1;
                } else {
                    bad += 1;
                    echo_status(
                        Status::Error,
                        metric,
                        &format!("non-finite values: {}", aggregate),
                    );
                }
            }
            Outcome::Timeout => {
                timeouts += 1;
                echo_status(Status::Warning, metric, "check timed out");
            }
            Outcome::Error(HistoryError::NoData) => {
                // An empty range is not corruption.
                healthy += 1;
            }
            Outcome::Error(error) => {
                errors += 1;
                echo_status(Status::Error, metric, &error.to_string());
            }
        }
    }

    eprintln!(
        "{} metrics checked: {} ok, {} with non-finite values, {} timed out, {} failed",
        outcomes.len(),
        healthy,
        bad,
        timeouts,
        errors
    );
}

fn is_sane(aggregate: &TimeAggregate) -> bool {
    aggregate.count == 0
        || (aggregate.minimum.is_finite()
            && aggregate.maximum.is_finite()
            && aggregate.sum.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn aggregate(minimum: f64, maximum: f64, sum: f64, count: u64) -> TimeAggregate {
        TimeAggregate {
            minimum,
            maximum,
            sum,
            count,
            integral_s: 0.0,
        }
    }

    #[test]
    fn finite_aggregates_are_sane() {
        assert!(is_sane(&aggregate(1.0, 5.0, 10.0, 4)));
    }

    #[test]
    fn infinite_extrema_are_flagged() {
        assert!(!is_sane(&aggregate(f64::NEG_INFINITY, 5.0, 10.0, 4)));
        assert!(!is_sane(&aggregate(1.0, f64::INFINITY, 10.0, 4)));
        assert!(!is_sane(&aggregate(1.0, 5.0, f64::NAN, 4)));
    }

    #[test]
    fn empty_ranges_are_sane_regardless_of_extrema() {
        // Databases report sentinel extrema for ranges without samples.
        assert!(is_sane(&aggregate(f64::MAX, f64::MIN, 0.0, 0)));
    }
}
