//! # Reversi Match Server Library
//!
//! This library hosts two-player Reversi games for clients connected over
//! WebSocket. Clients create a game, a second client joins it by id, and the
//! two alternate moves until the side to move has no legal move left.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Every game lives in a session that pairs exactly two participants:
//! - The creator plays white and waits for an opponent
//! - The joining participant plays black and the game starts
//! - Only the participant whose side is to move may play
//!
//! ### Concurrent Registry
//! All live sessions are stored in one registry indexed by session id and by
//! participant. Games in different sessions progress in parallel; moves within
//! one session are strictly serialized. Finished games are removed on the move
//! that ends them, and abandoned games are removed when a participant
//! disconnects.
//!
//! ### Request Dispatch
//! Each inbound request produces a list of responses addressed to specific
//! participants: the sender alone, or the sender and its opponent.
//!
//! ## Module Organization
//!
//! ### Identity Module (`identity`)
//! The participant trait and the `ConnectionId` assigned to every connection.
//!
//! ### Session Module (`session`)
//! The two-state pairing machine around one game.
//!
//! ### Registry Module (`registry`)
//! Thread-safe session store with per-session locking.
//!
//! ### Handler Module (`handler`)
//! Turns requests into addressed responses and handles disconnects.
//!
//! ### Credentials Module (`credentials`)
//! Alternate identity scheme where players present a random secret key
//! instead of being identified by their connection.
//!
//! ### Peers and Network Modules (`peers`, `network`)
//! The WebSocket accept loop, per-connection reader and writer tasks, and the
//! table that maps connection ids back to their outbound channels.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         workers: 4,
//!         max_connections: 256,
//!     })
//!     .await?;
//!
//!     // Accepts connections until the process is stopped
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The handler can also be driven without any networking:
//!
//! ```rust
//! use server::handler::{Action, Handler};
//! use server::identity::ConnectionId;
//! use shared::Response;
//!
//! let handler = Handler::new();
//! let (a, b) = (ConnectionId::new(1), ConnectionId::new(2));
//!
//! handler.handle_request(&a, "create");
//! let actions = handler.handle_request(&b, "connect 0");
//!
//! assert_eq!(actions[1], Action::new(a, Response::GameStarted));
//! ```

pub mod credentials;
pub mod handler;
pub mod identity;
pub mod network;
pub mod peers;
pub mod registry;
pub mod session;

pub use handler::{Action, Handler};
pub use identity::{ConnectionId, Participant};
pub use registry::{MoveOutcome, Registry, RegistryError, SessionView};
pub use session::{Session, SessionError, SessionState};
