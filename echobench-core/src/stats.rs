use crate::HISTOGRAM_BINS;
use std::time::Duration;

/// Run Statistics
///
/// Derived once from the final aggregated state and never mutated afterwards. Computing it twice
/// from the same input gives the same value.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub elapsed: Duration,
    pub total_requests: u64,
    pub total_errors: u64,
    pub qps: f64,
    /// `None` when no request completed, in which case there is nothing to rank or bucket.
    pub latency: Option<LatencyStatistics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStatistics {
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub histogram: Histogram,
}

impl RunStatistics {
    pub fn compute(samples: &[Duration], total_errors: u64, elapsed: Duration) -> Self {
        let sorted = sorted(samples);
        let total_requests = sorted.len() as u64;

        let latency = match (sorted.first(), sorted.last()) {
            (Some(min), Some(max)) => Some(LatencyStatistics {
                min: *min,
                mean: mean(&sorted).unwrap_or_default(),
                p50: percentile(&sorted, 50).unwrap_or_default(),
                p99: percentile(&sorted, 99).unwrap_or_default(),
                max: *max,
                histogram: Histogram::from_sorted(&sorted).unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            elapsed,
            total_requests,
            total_errors,
            qps: qps(total_requests, elapsed),
            latency,
        }
    }

    pub fn has_data(&self) -> bool {
        self.latency.is_some()
    }
}

pub fn sorted(samples: &[Duration]) -> Vec<Duration> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    sorted
}

/// Nearest-rank percentile over an ascending slice: the element at `floor(len * p / 100)`,
/// clamped to the last index. No interpolation.
pub fn percentile(sorted: &[Duration], p: u32) -> Option<Duration> {
    let last = sorted.len().checked_sub(1)?;
    let idx = sorted.len().saturating_mul(p as usize) / 100;
    sorted.get(idx.min(last)).copied()
}

/// Integer mean, truncated to the nanosecond.
pub fn mean(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let nanos = total / samples.len() as u128;
    let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
    Some(Duration::from_nanos(nanos))
}

pub fn qps(total_requests: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        total_requests as f64 / secs
    } else {
        0.
    }
}

/// Fixed-bin latency histogram in milliseconds, spanning `[min, max]` of the samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    min_ms: f64,
    width_ms: f64,
    counts: [u64; HISTOGRAM_BINS],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start_ms: f64,
    pub end_ms: f64,
    pub count: u64,
}

impl Histogram {
    pub fn from_sorted(sorted: &[Duration]) -> Option<Self> {
        let min_ms = as_millis_f64(*sorted.first()?);
        let max_ms = as_millis_f64(*sorted.last()?);

        let mut width_ms = (max_ms - min_ms) / HISTOGRAM_BINS as f64;
        if width_ms <= 0. {
            // All samples identical
            width_ms = 1.;
        }

        let mut counts = [0; HISTOGRAM_BINS];
        for sample in sorted {
            let idx = ((as_millis_f64(*sample) - min_ms) / width_ms) as usize;
            counts[idx.min(HISTOGRAM_BINS - 1)] += 1;
        }

        Some(Self {
            min_ms,
            width_ms,
            counts,
        })
    }

    pub fn width_ms(&self) -> f64 {
        self.width_ms
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Non-empty bins in ascending order.
    pub fn bins(&self) -> impl Iterator<Item = HistogramBin> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, count)| HistogramBin {
                start_ms: self.min_ms + i as f64 * self.width_ms,
                end_ms: self.min_ms + (i + 1) as f64 * self.width_ms,
                count: *count,
            })
    }
}

fn as_millis_f64(dur: Duration) -> f64 {
    dur.as_secs_f64() * 1000.
}
