//! UseCase: ブロードキャスト
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - BroadcastHandler::on_message() / broadcast()
//! - Registry のスナップショットに含まれる全セッションへの配送
//!
//! ### なぜこのテストが必要か
//! - 受信したメッセージの宛先を決める唯一のポリシー
//! - 送信者自身も宛先に含まれることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：送信者を含む全員への配送
//! - 異常系：キャンセル済みセッション、満杯の送信キュー
//! - エッジケース：除外リストの指定

use async_trait::async_trait;

use crate::{
    domain::{MessageHandler, RegistryError, SessionHandle, SessionId},
    infrastructure::RegistryHandle,
};

/// Forwards every received message to every registered session, sender included.
pub struct BroadcastHandler {
    registry: RegistryHandle,
}

impl BroadcastHandler {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Enqueue `message` on every registered session not listed in `exclude`.
    ///
    /// Sessions are sent to one after another, in id order. A session that
    /// fails to accept the message is logged and skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<SessionId>)` - Sessions that accepted the message
    /// * `Err(RegistryError)` - The registry could not be queried
    pub async fn broadcast(
        &self,
        message: &str,
        exclude: &[SessionId],
    ) -> Result<Vec<SessionId>, RegistryError> {
        let sessions = self.registry.snapshot().await?;
        let mut delivered = Vec::with_capacity(sessions.len());

        for session in sessions.iter().filter(|s| !exclude.contains(&s.id())) {
            match session.send(message.to_string()).await {
                Ok(()) => delivered.push(session.id()),
                Err(e) => tracing::warn!("Failed to enqueue message: {}", e),
            }
        }

        Ok(delivered)
    }
}

#[async_trait]
impl MessageHandler for BroadcastHandler {
    async fn on_message(&self, sender: &SessionHandle, message: &str) {
        tracing::info!(
            "Broadcast message from session {} ({} bytes)",
            sender.id(),
            message.len()
        );

        match self.broadcast(message, &[]).await {
            Ok(delivered) => {
                tracing::debug!("Delivered to {} sessions", delivered.len());
            }
            Err(e) => {
                tracing::warn!("Broadcast from session {} failed: {}", sender.id(), e);
            }
        }
    }
}
