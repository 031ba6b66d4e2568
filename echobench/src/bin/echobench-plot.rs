use anyhow::Context;
use clap::Parser;
use echobench::chart;
use echobench::cli::PlotCli;
use echobench::persist;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("echobench=info")),
        )
        .init();

    let cli = PlotCli::parse();

    let rows = persist::read_rows(&cli.input)
        .with_context(|| format!("Cannot open {}", cli.input.display()))?;
    info!("Read {} result rows from {}", rows.len(), cli.input.display());

    let entries = chart::latest_qps(&rows);
    let svg = chart::render_svg(&entries)?;
    std::fs::write(&cli.output, svg)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Chart generated: {}", cli.output.display());
    Ok(())
}
