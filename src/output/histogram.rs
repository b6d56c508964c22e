use super::stats::format_sig;

/// Widest bar drawn for the most populated bin.
const MAX_BAR_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramChart {
    bins: Vec<Bin>,
}

impl HistogramChart {
    /// Bins `samples` using Doane's formula (robust for skewed data) and an
    /// equal-width layout, like the reference tooling this replaces.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }

        let minimum = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if minimum == maximum {
            return Some(Self {
                bins: vec![Bin {
                    lower: minimum,
                    upper: maximum,
                    count: finite.len() as u64,
                }],
            });
        }

        let bin_count = doane_bin_count(&finite);
        let width = (maximum - minimum) / bin_count as f64;
        let mut bins: Vec<Bin> = (0..bin_count)
            .map(|index| Bin {
                lower: minimum + width * index as f64,
                upper: minimum + width * (index as f64 + 1.0),
                count: 0,
            })
            .collect();

        for value in &finite {
            let index = ((value - minimum) / width) as usize;
            let index = index.min(bin_count.saturating_sub(1));
            if let Some(bin) = bins.get_mut(index) {
                bin.count = bin.count.saturating_add(1);
            }
        }

        Some(Self { bins })
    }

    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Renders the horizontal bar chart, one line per bin: a `[lower - upper)`
    /// label, the count, and a bar scaled to the most populated bin.
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        let peak = self.bins.iter().map(|bin| bin.count).max().unwrap_or(0);
        let label_width = self
            .bins
            .iter()
            .map(|bin| bin_label(bin, self.is_last(bin)).len())
            .max()
            .unwrap_or(0);

        self.bins
            .iter()
            .map(|bin| {
                let label = bin_label(bin, self.is_last(bin));
                let bar_width = if peak == 0 {
                    0
                } else {
                    ((bin.count as u128 * MAX_BAR_WIDTH as u128) / peak as u128) as usize
                };
                let bar_width = if bin.count > 0 { bar_width.max(1) } else { 0 };
                format!(
                    "{:<label_width$}  {:>7}  {}",
                    label,
                    bin.count,
                    "\u{2587}".repeat(bar_width)
                )
            })
            .collect()
    }

    fn is_last(&self, bin: &Bin) -> bool {
        self.bins
            .last()
            .is_some_and(|last| std::ptr::eq(last, bin))
    }
}

fn bin_label(bin: &Bin, closed: bool) -> String {
    let close = if closed { ']' } else { ')' };
    format!(
        "[{} - {}{}",
        format_sig(bin.lower, 6),
        format_sig(bin.upper, 6),
        close
    )
}

/// Doane's bin-count estimate: `1 + log2(n) + log2(1 + |g1| / sigma_g1)`.
fn doane_bin_count(samples: &[f64]) -> usize {
    let n = samples.len();
    if n < 3 {
        return 1;
    }
    let n_f = n as f64;
    let mean = samples.iter().sum::<f64>() / n_f;
    let variance = samples
        .iter()
        .map(|&value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / n_f;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 1;
    }
    let skewness = samples
        .iter()
        .map(|&value| {
            let scaled = (value - mean) / std_dev;
            scaled * scaled * scaled
        })
        .sum::<f64>()
        / n_f;
    let sigma_g1 = (6.0 * (n_f - 2.0) / ((n_f + 1.0) * (n_f + 3.0))).sqrt();
    let bins = 1.0 + n_f.log2() + (1.0 + skewness.abs() / sigma_g1).log2();
    (bins.ceil() as usize).clamp(1, 128)
}

/// Convenience wrapper used by the inspect and summary tools.
#[must_use]
pub fn render_histogram(samples: &[f64]) -> Vec<String> {
    HistogramChart::from_samples(samples)
        .map(|chart| chart.render())
        .unwrap_or_default()
}
