//! Console rendering of a run.
use echobench_core::{Histogram, RunConfig, RunStatistics};
use std::fmt;

const RULE: &str = "--------------------------------------------------";
const BAR_WIDTH: usize = 40;

/// Printed before the run starts.
pub struct Banner<'a>(pub &'a RunConfig);

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        writeln!(f, "Starting benchmark against {}", config.target)?;
        writeln!(f, "   Concurrency: {} connections", config.concurrency)?;
        writeln!(
            f,
            "   Duration:    {}",
            humantime::format_duration(config.duration)
        )?;
        writeln!(f, "   Payload:     {} bytes", config.payload_size)?;
        write!(f, "{RULE}")
    }
}

/// Printed once the run is over.
pub struct Report<'a>(pub &'a RunStatistics);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        let Some(latency) = &stats.latency else {
            writeln!(f, "\nNo requests completed successfully.")?;
            return write!(f, "   Total Errors: {}", stats.total_errors);
        };

        writeln!(f, "\nBenchmark Results:")?;
        writeln!(f, "   Time Taken:    {:.2}s", stats.elapsed.as_secs_f64())?;
        writeln!(f, "   Total Reqs:    {}", stats.total_requests)?;
        writeln!(f, "   Total Errors:  {}", stats.total_errors)?;
        writeln!(f, "   QPS:           {:.2} req/sec", stats.qps)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Latency Distribution:")?;
        writeln!(f, "   Avg:   {:?}", latency.mean)?;
        writeln!(f, "   P50:   {:?}", latency.p50)?;
        writeln!(f, "   P99:   {:?}", latency.p99)?;
        writeln!(f, "   Max:   {:?}", latency.max)?;
        writeln!(f, "{RULE}")?;
        write_histogram(f, &latency.histogram)
    }
}

fn write_histogram(f: &mut fmt::Formatter<'_>, histogram: &Histogram) -> fmt::Result {
    write!(f, "Latency Histogram (ms):")?;
    let max_count = histogram.max_count().max(1);
    for bin in histogram.bins() {
        let bar_len = (bin.count as f64 / max_count as f64 * BAR_WIDTH as f64) as usize;
        let bar = "█".repeat(bar_len);
        write!(
            f,
            "\n   {:.2} - {:.2} ms : {:<width$} ({})",
            bin.start_ms,
            bin.end_ms,
            bar,
            bin.count,
            width = BAR_WIDTH
        )?;
    }
    Ok(())
}
