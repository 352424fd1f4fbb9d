//! One WebSocket connection to the relay.

use futures_util::{SinkExt, StreamExt};
use hibiki_shared::time::get_jst_timestamp;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::{error::ClientError, formatter::MessageFormatter, ui::redisplay_prompt};

/// Run a single connection until the user leaves or the connection drops.
///
/// Lines from `input` are sent as text frames; received frames are printed
/// with the local time.
///
/// # Returns
///
/// * `Ok(())` - `input` was closed (the user left)
/// * `Err(ClientError::ConnectionError)` - The handshake failed
/// * `Err(ClientError::Disconnected)` - The connection ended from the other side
pub async fn run_client_session(
    url: &str,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let (ws_stream, _response) = connect_async(url).await?;

    tracing::info!("Connected to relay server");
    print!("{}", MessageFormatter::format_connected(url));
    redisplay_prompt();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    print!("{}", MessageFormatter::format_received(text.as_str(), get_jst_timestamp()));
                    redisplay_prompt();
                }
                Some(Ok(Message::Binary(data))) => {
                    print!("{}", MessageFormatter::format_binary_message(data.len(), get_jst_timestamp()));
                    redisplay_prompt();
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Server closed the connection");
                    return Err(ClientError::Disconnected("closed by server".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return Err(ClientError::Disconnected(e.to_string()));
                }
            },
            line = input.recv() => match line {
                Some(line) => {
                    if let Err(e) = write.send(Message::Text(line.into())).await {
                        tracing::warn!("Failed to send message: {}", e);
                        return Err(ClientError::Disconnected(e.to_string()));
                    }
                }
                None => {
                    if let Err(e) = write.close().await {
                        tracing::debug!("Close handshake failed: {}", e);
                    }
                    return Ok(());
                }
            },
        }
    }
}
