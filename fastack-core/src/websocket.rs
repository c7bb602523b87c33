// WebSocket support for Fastack

use crate::logging::warn;
use crate::{Error, State};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// WebSocket message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSocketMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl From<WsMessage> for WebSocketMessage {
    fn from(msg: WsMessage) -> Self {
        match msg {
            WsMessage::Text(text) => WebSocketMessage::Text(text.to_string()),
            WsMessage::Binary(data) => WebSocketMessage::Binary(data.to_vec()),
            WsMessage::Ping(data) => WebSocketMessage::Ping(data.to_vec()),
            WsMessage::Pong(data) => WebSocketMessage::Pong(data.to_vec()),
            WsMessage::Close(_) => WebSocketMessage::Close,
            _ => WebSocketMessage::Close,
        }
    }
}

impl From<WebSocketMessage> for WsMessage {
    fn from(msg: WebSocketMessage) -> Self {
        match msg {
            WebSocketMessage::Text(text) => WsMessage::Text(text.into()),
            WebSocketMessage::Binary(data) => WsMessage::Binary(data.into()),
            WebSocketMessage::Ping(data) => WsMessage::Ping(data.into()),
            WebSocketMessage::Pong(data) => WsMessage::Pong(data.into()),
            WebSocketMessage::Close => WsMessage::Close(None),
        }
    }
}

/// The wire-facing half of a connection, consumed by the stream pump.
pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedReceiver<WebSocketMessage>,
    incoming: mpsc::UnboundedSender<WebSocketMessage>,
}

/// The remote side of an in-process connection, for tests and tools
/// that exercise handlers without a socket.
pub struct WebSocketPeer {
    to_connection: mpsc::UnboundedSender<WebSocketMessage>,
    from_connection: Mutex<mpsc::UnboundedReceiver<WebSocketMessage>>,
}

impl WebSocketPeer {
    /// Push a message toward the connection, as the remote peer would.
    pub fn send(&self, message: WebSocketMessage) -> Result<(), Error> {
        self.to_connection
            .send(message)
            .map_err(|_| Error::WebSocket("connection closed".to_string()))
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(WebSocketMessage::Text(text.into()))
    }

    /// Receive the next message the connection sent, None once the
    /// connection side is gone.
    pub async fn receive(&self) -> Option<WebSocketMessage> {
        self.from_connection.lock().await.recv().await
    }
}

/// WebSocket connection handle
///
/// Handlers receive one of these per connection. Send and receive are
/// gated on `accept`; calling either first is a fault, mirroring the
/// accept-before-use protocol of the HTTP upgrade.
pub struct WebSocketConnection {
    id: String,
    path: String,
    headers: HashMap<String, String>,
    accepted: AtomicBool,
    outgoing: mpsc::UnboundedSender<WebSocketMessage>,
    incoming: Mutex<mpsc::UnboundedReceiver<WebSocketMessage>>,
    path_params: OnceLock<HashMap<String, String>>,
    state: OnceLock<State>,
}

impl WebSocketConnection {
    pub(crate) fn channel(
        path: String,
        headers: HashMap<String, String>,
    ) -> (Arc<Self>, WebSocketTransport) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            headers,
            accepted: AtomicBool::new(false),
            outgoing: outgoing_tx,
            incoming: Mutex::new(incoming_rx),
            path_params: OnceLock::new(),
            state: OnceLock::new(),
        });

        let transport = WebSocketTransport {
            outgoing: outgoing_rx,
            incoming: incoming_tx,
        };

        (connection, transport)
    }

    /// Build a detached connection whose remote side is an in-process
    /// peer instead of a socket.
    pub fn pair(path: &str) -> (Arc<Self>, WebSocketPeer) {
        Self::pair_with_headers(path, HashMap::new())
    }

    pub fn pair_with_headers(
        path: &str,
        headers: HashMap<String, String>,
    ) -> (Arc<Self>, WebSocketPeer) {
        let (connection, transport) = Self::channel(path.to_string(), headers);
        let peer = WebSocketPeer {
            to_connection: transport.incoming,
            from_connection: Mutex::new(transport.outgoing),
        };
        (connection, peer)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a handshake header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(name).or_else(|| {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    pub fn path_param(&self, name: &str) -> Option<&String> {
        self.path_params.get().and_then(|params| params.get(name))
    }

    pub(crate) fn set_path_params(&self, params: HashMap<String, String>) {
        let _ = self.path_params.set(params);
    }

    pub(crate) fn seed_state(&self, state: State) {
        let _ = self.state.set(state);
    }

    /// Connection-scoped state, seeded from the application state
    /// before the handler runs.
    pub fn state(&self) -> State {
        self.state.get().cloned().unwrap_or_default()
    }

    /// Mark the connection as accepted, enabling send and receive.
    pub async fn accept(&self) -> Result<(), Error> {
        self.accepted.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted.load(Ordering::SeqCst)
    }

    pub async fn send(&self, message: WebSocketMessage) -> Result<(), Error> {
        if !self.is_accepted() {
            return Err(Error::WebSocket(
                "connection not accepted; call accept() first".to_string(),
            ));
        }
        self.outgoing
            .send(message)
            .map_err(|_| Error::WebSocket("connection closed".to_string()))
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(WebSocketMessage::Text(text.into())).await
    }

    pub async fn send_json<T: serde::Serialize>(&self, data: &T) -> Result<(), Error> {
        let json = serde_json::to_string(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.send_text(json).await
    }

    /// Receive the next message. A disconnected peer yields Close.
    pub async fn receive(&self) -> Result<WebSocketMessage, Error> {
        if !self.is_accepted() {
            return Err(Error::WebSocket(
                "connection not accepted; call accept() first".to_string(),
            ));
        }
        let mut incoming = self.incoming.lock().await;
        Ok(incoming.recv().await.unwrap_or(WebSocketMessage::Close))
    }

    /// Send a close frame. Permitted before accept, where it rejects
    /// the connection.
    pub async fn close(&self) -> Result<(), Error> {
        self.outgoing
            .send(WebSocketMessage::Close)
            .map_err(|_| Error::WebSocket("connection closed".to_string()))
    }
}

/// Pump frames between a tungstenite stream and a connection's
/// transport until either side closes.
pub(crate) async fn drive_stream<S>(
    stream: WebSocketStream<S>,
    transport: WebSocketTransport,
) -> Result<(), Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    use futures_util::{SinkExt, StreamExt};

    let (mut sink, mut source) = stream.split();
    let WebSocketTransport {
        mut outgoing,
        incoming,
    } = transport;

    loop {
        tokio::select! {
            queued = outgoing.recv() => match queued {
                Some(message) => {
                    let is_close = matches!(message, WebSocketMessage::Close);
                    if sink.send(message.into()).await.is_err() {
                        break;
                    }
                    if is_close {
                        break;
                    }
                }
                None => {
                    // Handler finished without an explicit close
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(message)) => {
                    let is_close = message.is_close();
                    if incoming.send(message.into()).is_err() {
                        break;
                    }
                    if is_close {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket stream error");
                    break;
                }
                None => break,
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive_through_pair() {
        let (connection, peer) = WebSocketConnection::pair("/ws");
        connection.accept().await.unwrap();

        connection.send_text("hello").await.unwrap();
        assert_eq!(
            peer.receive().await,
            Some(WebSocketMessage::Text("hello".to_string()))
        );

        peer.send_text("world").unwrap();
        assert_eq!(
            connection.receive().await.unwrap(),
            WebSocketMessage::Text("world".to_string())
        );
    }

    #[tokio::test]
    async fn test_send_before_accept_is_a_fault() {
        let (connection, _peer) = WebSocketConnection::pair("/ws");

        let err = connection.send_text("early").await.unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
    }

    #[tokio::test]
    async fn test_receive_before_accept_is_a_fault() {
        let (connection, _peer) = WebSocketConnection::pair("/ws");

        let err = connection.receive().await.unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
    }

    #[tokio::test]
    async fn test_receive_after_peer_drop_yields_close() {
        let (connection, peer) = WebSocketConnection::pair("/ws");
        connection.accept().await.unwrap();
        drop(peer);

        assert_eq!(connection.receive().await.unwrap(), WebSocketMessage::Close);
    }

    #[tokio::test]
    async fn test_send_json() {
        let (connection, peer) = WebSocketConnection::pair("/ws");
        connection.accept().await.unwrap();

        connection
            .send_json(&serde_json::json!({"n": 1}))
            .await
            .unwrap();

        match peer.receive().await {
            Some(WebSocketMessage::Text(text)) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["n"], 1);
            }
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_allowed_before_accept() {
        let (connection, peer) = WebSocketConnection::pair("/ws");

        connection.close().await.unwrap();
        assert_eq!(peer.receive().await, Some(WebSocketMessage::Close));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer token".to_string());
        let (connection, _peer) = WebSocketConnection::pair_with_headers("/ws", headers);

        assert_eq!(
            connection.header("authorization"),
            Some(&"Bearer token".to_string())
        );
    }

    #[test]
    fn test_path_params_set_once() {
        let (connection, _peer) = WebSocketConnection::pair("/rooms/{room}");

        let mut params = HashMap::new();
        params.insert("room".to_string(), "lobby".to_string());
        connection.set_path_params(params);

        // A second set is ignored
        connection.set_path_params(HashMap::new());

        assert_eq!(connection.path_param("room"), Some(&"lobby".to_string()));
    }

    #[test]
    fn test_state_defaults_empty_and_seeds_once() {
        let (connection, _peer) = WebSocketConnection::pair("/ws");
        assert!(connection.state().is_empty());

        let mut state = State::new();
        state.insert(42u32);
        connection.seed_state(state);

        assert_eq!(connection.state().get::<u32>(), Some(&42));
    }

    #[test]
    fn test_message_round_trip_through_wire_format() {
        let text: WsMessage = WebSocketMessage::Text("hi".to_string()).into();
        assert_eq!(WebSocketMessage::from(text), WebSocketMessage::Text("hi".to_string()));

        let binary: WsMessage = WebSocketMessage::Binary(vec![1, 2, 3]).into();
        assert_eq!(
            WebSocketMessage::from(binary),
            WebSocketMessage::Binary(vec![1, 2, 3])
        );

        let close: WsMessage = WebSocketMessage::Close.into();
        assert_eq!(WebSocketMessage::from(close), WebSocketMessage::Close);
    }
}
