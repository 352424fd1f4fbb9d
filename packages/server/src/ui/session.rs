//! One accepted WebSocket connection.
//!
//! A session runs three loops that share one cancellation token:
//!
//! - read: socket -> inbound queue
//! - dispatch: inbound queue -> `MessageHandler`
//! - write: outbound queue -> socket
//!
//! Socket I/O runs on a child of the session token, so a write failure stops
//! reading and writing without cutting off the dispatch loop. Cancelling the
//! session token itself ends all three loops promptly.
//!
//! The read loop is the session's main loop. When it ends the disconnect
//! sequence runs: drain the inbound queue through the routing policy, cancel,
//! join the write loop, close the socket, deregister, mark `Closed`.

use std::{fmt::Display, net::SocketAddr, sync::Arc};

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use hibiki_shared::time::get_jst_timestamp;

use crate::{
    config::SessionConfig,
    domain::{
        MessageHandler, SessionError, SessionHandle, SessionId, SessionInfo, SessionLifecycle,
        SessionState,
    },
    infrastructure::RegistryHandle,
};

/// Server-side state of one connected client.
pub struct ClientSession {
    handle: SessionHandle,
    lifecycle: SessionLifecycle,
    outbound: mpsc::Receiver<String>,
    registry: RegistryHandle,
    handler: Arc<dyn MessageHandler>,
    inbound_capacity: usize,
}

impl ClientSession {
    /// Create a session with a fresh id.
    ///
    /// The session's cancellation token is a child of `shutdown`, so server
    /// shutdown cancels it too.
    pub fn new(
        registry: RegistryHandle,
        handler: Arc<dyn MessageHandler>,
        config: &SessionConfig,
        remote_addr: Option<SocketAddr>,
        shutdown: &CancellationToken,
    ) -> Self {
        let (outbound_tx, outbound) = mpsc::channel(config.outbound_capacity);
        let lifecycle = SessionLifecycle::new();
        let info = SessionInfo {
            id: registry.next_session_id(),
            remote_addr,
            connected_at: get_jst_timestamp(),
        };
        let handle = SessionHandle::new(
            info,
            outbound_tx,
            shutdown.child_token(),
            config.send_timeout,
            lifecycle.subscribe(),
        );

        Self {
            handle,
            lifecycle,
            outbound,
            registry,
            handler,
            inbound_capacity: config.inbound_capacity,
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    /// Handle that can be used to send to, cancel or await this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Register, run the three loops until the connection ends, then disconnect.
    ///
    /// Returns once the session is `Closed`: all loops have exited, the socket
    /// has been closed and the registry no longer lists the session.
    pub async fn run<R, W, E>(self, reader: R, writer: W)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display + Send,
        E: Display + Send,
    {
        let span = tracing::info_span!("session", id = %self.id());
        self.run_inner(reader, writer).instrument(span).await
    }

    async fn run_inner<R, W, E>(self, reader: R, mut writer: W)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display + Send,
        E: Display + Send,
    {
        let id = self.id();
        match self.registry.register(self.handle.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Session {} could not be registered", id);
                self.abandon(&mut writer).await;
                return;
            }
            Err(e) => {
                tracing::warn!("Session {} could not be registered: {}", id, e);
                self.abandon(&mut writer).await;
                return;
            }
        }
        tracing::info!("Session {} connected", id);

        let io = self.handle.child_token();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.inbound_capacity);
        let write_task = tokio::spawn(
            write_loop(
                self.handle.id(),
                io.clone(),
                self.outbound,
                writer,
                self.registry.clone(),
            )
            .in_current_span(),
        );
        let dispatch_task = tokio::spawn(
            dispatch_loop(self.handle.clone(), inbound_rx, self.handler.clone())
                .in_current_span(),
        );

        // Dropping the inbound sender on return lets the dispatch loop drain
        read_loop(&self.handle, &io, reader, inbound_tx, &self.registry).await;

        disconnect(
            &self.handle,
            &self.lifecycle,
            &self.registry,
            write_task,
            dispatch_task,
        )
        .await;
    }

    /// Tear down a session that never made it into the registry.
    async fn abandon<W>(&self, writer: &mut W)
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        if !self.lifecycle.begin_disconnect() {
            return;
        }
        self.handle.cancel();
        if let Err(e) = writer.close().await {
            self.registry.report_error(SessionError::Close {
                id: self.id(),
                reason: e.to_string(),
            });
        }
        self.lifecycle.finish();
    }
}

/// Receive frames from the socket and push their text onto the inbound queue.
///
/// Returns on end of stream, close frame, socket error or I/O cancellation.
/// A frame already read is queued unless the whole session is cancelled.
async fn read_loop<R, E>(
    handle: &SessionHandle,
    io: &CancellationToken,
    mut reader: R,
    inbound: mpsc::Sender<String>,
    registry: &RegistryHandle,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let id = handle.id();
    loop {
        let frame = tokio::select! {
            biased;
            _ = io.cancelled() => {
                tracing::debug!("Read loop cancelled");
                return;
            }
            frame = reader.next() => frame,
        };

        let text = match frame {
            None => {
                tracing::info!("Session {} stream ended", id);
                return;
            }
            Some(Err(e)) => {
                registry.report_error(SessionError::Read {
                    id,
                    reason: e.to_string(),
                });
                return;
            }
            Some(Ok(Message::Close(_))) => {
                tracing::info!("Session {} requested close", id);
                return;
            }
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("Session {} sent a non-UTF-8 binary frame, ignoring", id);
                    continue;
                }
            },
            // Answered by the transport
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
        };

        tracing::debug!("Received message: {}", text);
        tokio::select! {
            biased;
            _ = handle.cancelled() => return,
            result = inbound.send(text) => {
                if result.is_err() {
                    return;
                }
            }
        }
    }
}

/// Drain the outbound queue onto the socket, one frame at a time.
///
/// A write failure cancels `io`, which also ends the read loop. Gives the
/// writer back so the disconnect sequence can close it; the outbound queue is
/// dropped here so later sends to this session fail fast.
async fn write_loop<W>(
    id: SessionId,
    io: CancellationToken,
    mut outbound: mpsc::Receiver<String>,
    mut writer: W,
    registry: RegistryHandle,
) -> W
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = io.cancelled() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        tracing::debug!("Sending message: {}", message);
        let result = tokio::select! {
            biased;
            _ = io.cancelled() => break,
            result = writer.send(Message::Text(message.into())) => result,
        };

        if let Err(e) = result {
            registry.report_error(SessionError::Write {
                id,
                reason: e.to_string(),
            });
            io.cancel();
            break;
        }
    }
    tracing::debug!("Write loop stopped");
    writer
}

/// Hand each inbound message to the routing policy, in arrival order.
///
/// Runs until the inbound queue is closed and empty, or the session is
/// cancelled.
async fn dispatch_loop(
    handle: SessionHandle,
    mut inbound: mpsc::Receiver<String>,
    handler: Arc<dyn MessageHandler>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = handle.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = handle.cancelled() => break,
            _ = handler.on_message(&handle, &message) => {}
        }
    }
    tracing::debug!("Dispatch loop stopped");
}

/// Drain, cancel, join, close, deregister, done. Runs at most once per session.
async fn disconnect<W>(
    handle: &SessionHandle,
    lifecycle: &SessionLifecycle,
    registry: &RegistryHandle,
    write_task: JoinHandle<W>,
    dispatch_task: JoinHandle<()>,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let id = handle.id();
    if !lifecycle.begin_disconnect() {
        tracing::debug!("Session {} is already disconnecting", id);
        return;
    }
    tracing::info!("Session {} disconnecting", id);

    // Messages already read still go out unless the session was cancelled
    if let Err(e) = dispatch_task.await {
        tracing::warn!("Dispatch loop of session {} panicked: {}", id, e);
    }
    handle.cancel();

    match write_task.await {
        Ok(mut writer) => {
            if let Err(e) = writer.close().await {
                registry.report_error(SessionError::Close {
                    id,
                    reason: e.to_string(),
                });
            }
        }
        Err(e) => tracing::warn!("Write loop of session {} panicked: {}", id, e),
    }

    match registry.deregister(id).await {
        Ok(_) => {}
        Err(e) => tracing::debug!("Session {} not deregistered: {}", id, e),
    }

    lifecycle.finish();
    tracing::info!("Session {} closed", id);
}
