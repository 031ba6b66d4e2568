//! Command-line configuration for the `echobench` and `echobench-plot` binaries.
use crate::chart::DEFAULT_CHART_FILE;
use crate::persist::DEFAULT_RESULTS_FILE;
use clap::Parser;
use echobench_core::{RunConfig, DEFAULT_PAYLOAD_SIZE, DEFAULT_TARGET};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "echobench",
    version,
    about = "Measure throughput and latency of an echo-style TCP server"
)]
pub struct BenchCli {
    /// Target server address
    #[arg(short, long, default_value = DEFAULT_TARGET)]
    pub addr: String,

    /// Number of concurrent connections
    #[arg(short, long, default_value = "100")]
    pub concurrency: NonZeroUsize,

    /// Test duration (e.g. `10s`, `1m 30s`)
    #[arg(short, long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Payload size in bytes
    #[arg(short, long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub size: usize,

    /// Append the results to the results file
    #[arg(long)]
    pub save: bool,

    /// Server name for the report (e.g. 'Threaded Server')
    #[arg(short, long, default_value = "Unknown")]
    pub name: String,

    /// Results file written by `--save`
    #[arg(long, default_value = DEFAULT_RESULTS_FILE)]
    pub results: PathBuf,

    /// Bound on establishing each connection
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub connect_timeout: Duration,

    /// Bound on waiting for the server's handshake byte
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub handshake_timeout: Duration,

    /// Count a missing handshake byte as a failed connection
    #[arg(long)]
    pub strict_handshake: bool,
}

impl BenchCli {
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(&self.addr)
            .concurrency(self.concurrency)
            .duration(self.duration)
            .payload_size(self.size)
            .connect_timeout(self.connect_timeout)
            .handshake_timeout(self.handshake_timeout)
            .strict_handshake(self.strict_handshake)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "echobench-plot",
    version,
    about = "Render saved echobench results as an SVG bar chart"
)]
pub struct PlotCli {
    /// Results file to read
    #[arg(short, long, default_value = DEFAULT_RESULTS_FILE)]
    pub input: PathBuf,

    /// SVG file to write
    #[arg(short, long, default_value = DEFAULT_CHART_FILE)]
    pub output: PathBuf,
}
