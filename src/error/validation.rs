use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing MetricQ server URL (set --server or METRICQ_SERVER).")]
    MissingServer,
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'. Expected '<value><unit>' (e.g. 30s, 5min, 7d).")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration unit '{unit}'. Use ns, us, ms, s, min, h, or d.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error(
        "Invalid timestamp '{value}'. Expected ISO-8601 (e.g. '2012-12-21T00:00:00Z'), \
         POSIX seconds, 'now', 'epoch', or a past duration (e.g. '-10h')."
    )]
    InvalidTimestamp { value: String },
    #[error("Timestamp out of range: '{value}'.")]
    TimestampOutOfRange { value: String },
    #[error("Queue expiration must be > 0.")]
    ExpiresZero,
    #[error("Missing companion command.")]
    MissingCommand,
    #[error("Malformed sacct row: '{row}'. Expected 5 '|'-separated fields.")]
    MalformedSacctRow { row: String },
    #[error("Invalid hostlist '{value}'.")]
    InvalidHostlist { value: String },
    #[error("Invalid hostlist range '{value}': {source}")]
    InvalidHostlistRange {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
