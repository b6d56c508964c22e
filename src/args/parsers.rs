use std::str::FromStr;

use crate::error::ValidationError;
use crate::time::{Timedelta, Timestamp};

pub(super) fn parse_duration_arg(s: &str) -> Result<Timedelta, ValidationError> {
    Timedelta::from_str(s)
}

pub(super) fn parse_timestamp_arg(s: &str) -> Result<Timestamp, ValidationError> {
    Timestamp::parse(s)
}

/// Expands `$USER`/`${USER}` and `$HOST`/`${HOST}` placeholders. Unknown
/// placeholders are left untouched so per-host templates (slurm) survive.
#[must_use]
pub(crate) fn expand_template(value: &str) -> String {
    let mut expanded = value.to_owned();
    if let Ok(user) = std::env::var("USER") {
        expanded = expanded.replace("${USER}", &user).replace("$USER", &user);
    }
    if let Ok(host) = hostname::get() {
        let host = host.to_string_lossy();
        expanded = expanded
            .replace("${HOST}", host.as_ref())
            .replace("$HOST", host.as_ref());
    }
    expanded
}

pub(super) fn parse_template_arg(s: &str) -> Result<String, ValidationError> {
    Ok(expand_template(s))
}
