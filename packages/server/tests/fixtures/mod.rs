//! Shared fixtures for relay integration tests.

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use hibiki_server::{config::ServerConfig, error::ServerError, ui::Server};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

/// How long a test waits for a frame or a state change
pub const WAIT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// In-process relay server bound to an ephemeral port
pub struct TestServer {
    addr: SocketAddr,
    ws_path: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let ws_path = config.ws_path.clone();
        let server = Server::new(config).expect("Invalid test config");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        TestServer {
            addr,
            ws_path,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, self.ws_path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Ids of the registered sessions, as reported by `/api/sessions`
    pub async fn session_ids(&self) -> Vec<u64> {
        let body: serde_json::Value = reqwest::get(format!("{}/api/sessions", self.base_url()))
            .await
            .expect("Failed to request sessions")
            .json()
            .await
            .expect("Failed to parse sessions");
        body["sessions"]
            .as_array()
            .expect("sessions should be an array")
            .iter()
            .map(|s| s["id"].as_u64().expect("id should be a number"))
            .collect()
    }

    /// Poll `/api/sessions` until exactly `count` sessions are registered
    pub async fn wait_for_sessions(&self, count: usize) -> Vec<u64> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let ids = self.session_ids().await;
            if ids.len() == count {
                return ids;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "Expected {} sessions, still have {:?}",
                count,
                ids
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Trigger shutdown and wait for `serve` to return
    pub async fn stop(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let task = self.task.take().expect("server task already taken");
        tokio::time::timeout(WAIT, task)
            .await
            .expect("server should stop")
            .expect("server task panicked")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// WebSocket client speaking raw text frames
pub struct TestClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _response) = connect_async(url).await.expect("Failed to connect");
        let (write, read) = stream.split();
        TestClient { write, read }
    }

    pub async fn send_text(&mut self, text: &str) {
        self.write
            .send(Message::Text(text.into()))
            .await
            .expect("Failed to send text");
    }

    /// Next text frame, or `None` if nothing arrives within `timeout`
    pub async fn next_text_within(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.read.next())
                .await
                .ok()??;
            match frame {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }

    pub async fn next_text(&mut self) -> String {
        self.next_text_within(WAIT)
            .await
            .expect("Expected a text frame")
    }

    /// Assert no text frame arrives for a short while
    pub async fn expect_silence(&mut self) {
        let frame = self.next_text_within(Duration::from_millis(200)).await;
        assert_eq!(frame, None, "Expected no frame");
    }

    /// Send a close frame and wait for the server to finish the handshake
    pub async fn close(mut self) {
        let _ = self.write.send(Message::Close(None)).await;
        let _ = tokio::time::timeout(WAIT, async {
            while let Some(Ok(_)) = self.read.next().await {}
        })
        .await;
    }
}
