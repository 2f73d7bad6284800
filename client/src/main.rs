use clap::Parser;
use client::{describe, Client, ClientError};
use log::{info, warn};
use shared::Request;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Send bincode frames instead of text commands
    #[arg(short = 'b', long)]
    binary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = Client::connect(&args.server).await?;
    client.set_binary(args.binary);

    println!("Commands: create | connect <id> | turn <id> <row> <col> | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" {
                    break;
                }

                match Request::parse(line) {
                    Ok(request) => client.send(&request).await?,
                    Err(e) => println!("Invalid command: {}", e),
                }
            }
            response = client.next_response() => {
                match response {
                    Ok(Some(response)) => println!("{}", describe(&response)),
                    Ok(None) => {
                        println!("Server closed the connection");
                        return Ok(());
                    }
                    Err(ClientError::WebSocket(e)) => return Err(e.into()),
                    Err(e) => warn!("Bad response from server: {}", e),
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
