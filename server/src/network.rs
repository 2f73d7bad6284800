//! Server network layer: WebSocket accept loop and per-connection tasks

use crate::handler::{Action, Handler};
use crate::identity::ConnectionId;
use crate::peers::{Codec, PeerManager};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::{self, Message};

pub const SERVER_FULL: &str = "server full";

/// Runtime settings for the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`
    pub bind_addr: String,
    /// Worker threads in the runtime pool
    pub workers: usize,
    /// Connections beyond this are refused after the handshake
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_connections: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Accepts WebSocket connections and routes their frames through the handler
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    handler: Arc<Handler<ConnectionId>>,
    peers: Arc<RwLock<PeerManager>>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(
            "Server listening on {} ({} workers, max {} connections)",
            listener.local_addr()?,
            config.workers,
            config.max_connections
        );

        Ok(Server {
            listener,
            peers: Arc::new(RwLock::new(PeerManager::new(config.max_connections))),
            handler: Arc::new(Handler::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> Arc<Handler<ConnectionId>> {
        Arc::clone(&self.handler)
    }

    /// Accept loop. Only returns if the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let handler = Arc::clone(&self.handler);
                    let peers = Arc::clone(&self.peers);
                    tokio::spawn(handle_connection(stream, addr, handler, peers));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Drives one connection from handshake to teardown
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: Arc<Handler<ConnectionId>>,
    peers: Arc<RwLock<PeerManager>>,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let id = {
        let mut peers = peers.write().await;
        peers.add_peer(addr, outbound_tx)
    };
    let Some(id) = id else {
        warn!("Refusing {}: {}", addr, SERVER_FULL);
        let refusal = Message::Text(Response::error(SERVER_FULL).to_string());
        if let Err(e) = sink.send(refusal).await {
            debug!("Failed to notify {}: {}", addr, e);
        }
        if let Err(e) = sink.close().await {
            debug!("Failed to close refused connection {}: {}", addr, e);
        }
        return;
    };

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if let Err(e) = sink.send(message).await {
                warn!("Write to connection {} failed: {}", id, e);
                break;
            }
        }
        if let Err(e) = sink.close().await {
            debug!("Failed to close connection {}: {}", id, e);
        }
    });

    let mut reader = {
        let handler = Arc::clone(&handler);
        let peers = Arc::clone(&peers);
        tokio::spawn(async move {
            let mut codec = Codec::Text;

            while let Some(frame) = stream.next().await {
                let message = match frame {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Read from connection {} failed: {}", id, e);
                        break;
                    }
                };

                let frame_codec = match &message {
                    Message::Text(_) => Codec::Text,
                    Message::Binary(_) => Codec::Binary,
                    Message::Close(_) => break,
                    _ => continue,
                };
                if frame_codec != codec {
                    codec = frame_codec;
                    peers.write().await.set_codec(&id, codec);
                }

                let actions = match message {
                    Message::Text(text) => handler.handle_request(&id, &text),
                    Message::Binary(data) => match Request::from_bytes(&data) {
                        Ok(request) => handler.dispatch(&id, request),
                        Err(e) => {
                            debug!("Undecodable binary frame from {}: {}", id, e);
                            vec![Action::new(
                                id,
                                Response::error(format!("invalid binary request: {}", e)),
                            )]
                        }
                    },
                    _ => continue,
                };
                deliver(&peers, actions).await;
            }
        })
    };

    let writer_done = tokio::select! {
        _ = &mut reader => false,
        _ = &mut writer => {
            reader.abort();
            true
        }
    };

    // Dropping the peer entry drops the writer's sender
    peers.write().await.remove_peer(&id);
    let actions = handler.handle_disconnect(&id);
    deliver(&peers, actions).await;

    if !writer_done {
        let _ = writer.await;
    }
}

/// Encodes a response in the given codec
pub fn encode_response(response: &Response, codec: Codec) -> bincode::Result<Message> {
    match codec {
        Codec::Text => Ok(Message::Text(response.to_string())),
        Codec::Binary => Ok(Message::Binary(response.to_bytes()?)),
    }
}

/// Routes actions to their recipients' writer tasks
async fn deliver(peers: &RwLock<PeerManager>, actions: Vec<Action<ConnectionId>>) {
    if actions.is_empty() {
        return;
    }

    let peers = peers.read().await;
    for Action {
        recipient,
        response,
    } in actions
    {
        let Some(peer) = peers.get(&recipient) else {
            debug!("Dropping '{}' for closed connection {}", response, recipient);
            continue;
        };

        match encode_response(&response, peer.codec) {
            Ok(message) => {
                if !peer.send(message) {
                    debug!("Writer for connection {} already stopped", recipient);
                }
            }
            Err(e) => error!("Failed to encode '{}' for {}: {}", response, recipient, e),
        }
    }
}
