//! # Reversi Client Library
//!
//! WebSocket client for the Reversi match server. It sends requests in either
//! the text grammar or bincode frames and decodes every response the server
//! pushes, including notifications caused by the opponent.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::Client;
//! use shared::{Position, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8080").await?;
//!
//!     client.send(&Request::Create).await?;
//!     if let Some(response) = client.next_response().await? {
//!         println!("{}", response);
//!     }
//!
//!     client
//!         .send(&Request::Turn {
//!             session_id: 0,
//!             position: Position::new(4, 2),
//!         })
//!         .await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod network;

pub use network::{describe, Client, ClientError};
