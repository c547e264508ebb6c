use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerError};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "9600")]
    port: u16,
    /// World state broadcasts per second
    #[clap(short, long, default_value = "18")]
    tick_rate: u32,
    /// Maximum number of connected players
    #[clap(short, long, default_value = "16")]
    max_clients: usize,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "5")]
    client_timeout_secs: u64,
    /// Only require the cars to be close before a race instead of side by side
    #[clap(long)]
    relaxed_line_up: bool,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        line_up_required: !args.relaxed_line_up,
    };
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, tick_duration, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
