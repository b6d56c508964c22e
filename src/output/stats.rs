use hdrhistogram::Histogram;

use crate::time::Timedelta;

/// Summary statistics over a value series.
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub median: f64,
    pub standard_deviation: f64,
    pub variance: f64,
    pub count: usize,
}

impl Statistics {
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in values {
            minimum = minimum.min(value);
            maximum = maximum.max(value);
            sum += value;
        }
        let mean = sum / count as f64;

        let variance = values
            .iter()
            .map(|&value| {
                let diff = value - mean;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let middle = count / 2;
        let median = if count % 2 == 0 {
            let upper = sorted.get(middle).copied().unwrap_or(f64::NAN);
            let lower = sorted.get(middle.wrapping_sub(1)).copied().unwrap_or(upper);
            (lower + upper) / 2.0
        } else {
            sorted.get(middle).copied().unwrap_or(f64::NAN)
        };

        Some(Self {
            minimum,
            maximum,
            mean,
            median,
            standard_deviation: variance.sqrt(),
            variance,
            count,
        })
    }
}

/// Formats `value` with `digits` significant digits, keeping plain decimal
/// notation for moderate magnitudes.
#[must_use]
pub fn format_sig(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0.0".to_owned();
    }
    if !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&magnitude) {
        return format!("{:.*e}", digits.saturating_sub(1), value);
    }
    let decimals = i32::try_from(digits)
        .map(|digits| (digits - 1 - magnitude).max(0))
        .unwrap_or(0);
    format!("{:.*}", usize::try_from(decimals).unwrap_or(0), value)
}

/// Percentile summary of inter-arrival gaps. Equal-width histogram bins hide
/// the tail this shows.
#[must_use]
pub fn interval_percentiles(intervals: &[Timedelta]) -> Option<String> {
    let mut histogram: Histogram<u64> = Histogram::new(3).ok()?;
    for interval in intervals {
        let nanos = u64::try_from(interval.nanos()).unwrap_or(0);
        drop(histogram.record(nanos));
    }
    if histogram.is_empty() {
        return None;
    }
    let as_seconds =
        |nanos: u64| Timedelta::from_nanos(i64::try_from(nanos).unwrap_or(i64::MAX)).as_secs_f64();
    Some(format!(
        "p50={:.6}s p90={:.6}s p99={:.6}s max={:.6}s",
        as_seconds(histogram.value_at_quantile(0.5)),
        as_seconds(histogram.value_at_quantile(0.9)),
        as_seconds(histogram.value_at_quantile(0.99)),
        as_seconds(histogram.max()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_over_a_small_series() {
        let stats = Statistics::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.minimum, 1.0);
        assert_eq!(stats.maximum, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.variance, 1.25);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn median_of_odd_length_series() {
        let stats = Statistics::from_values(&[5.0, 1.0, 3.0]).unwrap();
        assert_eq!(stats.median, 3.0);
    }

    #[test]
    fn empty_series_has_no_statistics() {
        assert!(Statistics::from_values(&[]).is_none());
    }

    #[test]
    fn interval_percentiles_summarize_the_tail() {
        let intervals: Vec<Timedelta> = std::iter::repeat(Timedelta::from_nanos(1_000_000))
            .take(99)
            .chain(std::iter::once(Timedelta::from_seconds(1)))
            .collect();
        let line = interval_percentiles(&intervals).unwrap();
        assert!(line.starts_with("p50=0.001"));
        assert!(line.contains("max=1.0"));
    }

    #[test]
    fn no_intervals_yield_no_percentiles() {
        assert!(interval_percentiles(&[]).is_none());
    }

    #[test]
    fn significant_digit_formatting() {
        assert_eq!(format_sig(0.0, 2), "0.0");
        assert_eq!(format_sig(1234.5, 2), "1235");
        assert_eq!(format_sig(0.0123, 2), "0.012");
        assert_eq!(format_sig(1.0e9, 2), "1.0e9");
    }
}
