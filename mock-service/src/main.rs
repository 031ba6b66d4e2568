use clap::Parser;
use mock_service::{MockConfig, MockServer};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "mock-service",
    about = "Reference server for the echobench protocol"
)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9090")]
    listen: SocketAddr,

    /// Do not send the handshake byte on accept
    #[arg(long)]
    no_handshake: bool,

    /// Hang up right after the handshake
    #[arg(long)]
    close_after_handshake: bool,

    /// Delay before each reply (e.g. `5ms`)
    #[arg(long, value_parser = humantime::parse_duration)]
    delay: Option<Duration>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = MockConfig::default();
    if args.no_handshake {
        config = config.without_handshake();
    }
    if args.close_after_handshake {
        config = config.close_after_handshake();
    }
    if let Some(delay) = args.delay {
        config = config.delay(delay);
    }

    let server = MockServer::bind(args.listen, config).await?;
    tracing::info!("Listening on {}", server.addr());
    server.wait().await;
    Ok(())
}
