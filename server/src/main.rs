use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Runtime worker threads (defaults to available parallelism)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Maximum number of concurrent connections
    #[arg(short = 'm', long, default_value = "1024")]
    max_connections: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let defaults = ServerConfig::default();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        workers: args.workers.unwrap_or(defaults.workers).max(1),
        max_connections: args.max_connections,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!("Starting Reversi server on {}", config.bind_addr);
        let server = Server::bind(config).await?;

        tokio::select! {
            result = server.run() => {
                if let Err(e) = result {
                    error!("Server stopped: {}", e);
                    return Err(e.into());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
