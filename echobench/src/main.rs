use anyhow::Context;
use clap::Parser;
use echobench::cli::BenchCli;
use echobench::persist::{self, ResultRow};
use echobench::report::{Banner, Report};
use echobench::Benchmark;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("echobench=info")),
        )
        .init();

    let cli = BenchCli::parse();
    let config = cli.run_config();

    println!("{}", Banner(&config));
    let outcome = Benchmark::with_config(config).await;
    println!("{}", Report(&outcome.statistics));

    if cli.save {
        let row = ResultRow::from_statistics(
            persist::timestamp_now()?,
            &cli.name,
            cli.concurrency.get(),
            &outcome.statistics,
        );
        match row {
            Some(row) => {
                persist::append_row(&cli.results, &row).with_context(|| {
                    format!("Failed to save results to {}", cli.results.display())
                })?;
                info!("Results saved to {}", cli.results.display());
            }
            None => warn!("No requests completed; nothing saved."),
        }
    }

    Ok(())
}
