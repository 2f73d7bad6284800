use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use shared::{ParseError, Request, Response};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("unreadable response: {0}")]
    Parse(#[from] ParseError),
}

/// WebSocket connection to a Reversi server
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    binary: bool,
}

impl Client {
    /// Connects to `url`, e.g. `ws://127.0.0.1:8080`
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        info!("Connected to {}", url);

        Ok(Client { ws, binary: false })
    }

    /// Switches requests sent with [`Client::send`] to bincode frames
    pub fn set_binary(&mut self, binary: bool) {
        self.binary = binary;
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        debug!("Sending {}", request);

        let message = if self.binary {
            Message::Binary(request.to_bytes()?)
        } else {
            Message::Text(request.to_string())
        };
        self.ws.send(message).await?;
        Ok(())
    }

    /// Sends text as-is, without checking the grammar
    pub async fn send_raw(&mut self, text: &str) -> Result<(), ClientError> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    pub async fn send_bytes(&mut self, data: Vec<u8>) -> Result<(), ClientError> {
        self.ws.send(Message::Binary(data)).await?;
        Ok(())
    }

    /// Waits for the next response. Returns None once the server closed the
    /// connection.
    pub async fn next_response(&mut self) -> Result<Option<Response>, ClientError> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(Response::parse(&text)?)),
                Message::Binary(data) => return Ok(Some(Response::from_bytes(&data)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.ws.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Human-readable line for a server response
pub fn describe(response: &Response) -> String {
    match response {
        Response::SessionCreated { session_id } => {
            format!("Created game {}, waiting for an opponent (you play white)", session_id)
        }
        Response::Connected { session_id } => {
            format!("Joined game {} (you play black, white moves first)", session_id)
        }
        Response::GameStarted => "Opponent joined, your move".to_string(),
        Response::MoveAccepted => "Move accepted".to_string(),
        Response::MoveRejected => "Move rejected".to_string(),
        Response::OpponentMoved { position } => format!("Opponent played {}", position),
        Response::Error { reason } => format!("Error: {}", reason),
        Response::Quit => "Opponent left the game".to_string(),
    }
}
