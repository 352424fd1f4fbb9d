//! The registry control loop.

use std::collections::HashMap;

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::domain::{SessionError, SessionHandle, SessionId, SessionInfo};

use super::{command::RegistryCommand, handle::RegistryHandle};

/// Capacity of the request queue between handles and the control loop
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Sole owner of the session membership mapping.
///
/// Processes register, deregister, snapshot, member and error events one at a
/// time. It stops when `shutdown` is cancelled or every handle is dropped, and
/// cancels any sessions still registered on the way out.
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, SessionHandle>,
    commands: mpsc::Receiver<RegistryCommand>,
    errors: mpsc::UnboundedReceiver<SessionError>,
    shutdown: CancellationToken,
}

impl ConnectionRegistry {
    /// Create a registry and the handle that talks to it.
    ///
    /// Nothing is processed until [`run`](Self::run) is awaited.
    pub fn new(shutdown: CancellationToken) -> (Self, RegistryHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (error_tx, errors) = mpsc::unbounded_channel();
        let registry = Self {
            sessions: HashMap::new(),
            commands,
            errors,
            shutdown,
        };
        (registry, RegistryHandle::new(command_tx, error_tx))
    }

    /// Create a registry and run its control loop on a new task.
    pub fn spawn(shutdown: CancellationToken) -> (RegistryHandle, JoinHandle<()>) {
        let (registry, handle) = Self::new(shutdown);
        let task = tokio::spawn(registry.run());
        (handle, task)
    }

    /// Run the control loop.
    pub async fn run(mut self) {
        tracing::info!("Connection registry started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Connection registry shutting down");
                    break;
                }
                Some(error) = self.errors.recv() => self.handle_error(error),
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("All registry handles dropped");
                        break;
                    }
                },
            }
        }

        // Errors reported right before shutdown still reach the log
        while let Ok(error) = self.errors.try_recv() {
            self.handle_error(error);
        }
        self.cancel_remaining();
        tracing::info!("Connection registry stopped");
    }

    fn handle_command(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::Register { session, ack } => {
                let accepted = self.add(session);
                let _ = ack.send(accepted);
            }
            RegistryCommand::Deregister { id, ack } => {
                let removed = self.remove(id);
                let _ = ack.send(removed);
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RegistryCommand::Members { reply } => {
                let members = self
                    .snapshot()
                    .iter()
                    .map(|session| session.info().clone())
                    .collect::<Vec<SessionInfo>>();
                let _ = reply.send(members);
            }
        }
    }

    fn add(&mut self, session: SessionHandle) -> bool {
        let id = session.id();
        if self.sessions.contains_key(&id) {
            tracing::warn!("Session {} is already registered, ignoring", id);
            return false;
        }
        self.sessions.insert(id, session);
        tracing::info!("Added session {}", id);
        self.log_sessions();
        true
    }

    fn remove(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(_) => {
                tracing::info!("Removed session {}", id);
                self.log_sessions();
                true
            }
            None => {
                tracing::debug!("Session {} was not registered, nothing to remove", id);
                false
            }
        }
    }

    fn snapshot(&self) -> Vec<SessionHandle> {
        let mut sessions: Vec<SessionHandle> = self.sessions.values().cloned().collect();
        sessions.sort_by_key(|session| session.id());
        sessions
    }

    fn handle_error(&self, error: SessionError) {
        tracing::error!("Session error: {}", error);
    }

    fn cancel_remaining(&mut self) {
        for (id, session) in self.sessions.drain() {
            tracing::debug!("Cancelling session {}", id);
            session.cancel();
        }
    }

    fn log_sessions(&self) {
        tracing::info!("Now {} sessions connected", self.sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use crate::domain::{RegistryError, test_support::handle};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - ConnectionRegistry の制御ループ経由のメンバーシップ変更
    // - ID 採番の一意性と単調増加
    // - 存在しないセッションの削除が no-op であること
    // - シャットダウン時の残存セッションのキャンセル
    //
    // 【なぜこのテストが必要か】
    // - Registry はメンバーシップを唯一書き換えるコンポーネント
    // - ブロードキャストの宛先はすべて Registry のスナップショットから決まる
    // ========================================

    fn spawn_registry() -> (RegistryHandle, CancellationToken, JoinHandle<()>) {
        let shutdown = CancellationToken::new();
        let (registry, task) = ConnectionRegistry::spawn(shutdown.clone());
        (registry, shutdown, task)
    }

    fn ids(sessions: &[SessionHandle]) -> Vec<u64> {
        sessions.iter().map(|s| s.id().value()).collect()
    }

    #[tokio::test]
    async fn test_session_ids_are_unique_and_increasing() {
        // テスト項目: 採番された ID は重複せず、採番順に増加する
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();

        // when (操作):
        let allocated: Vec<u64> = (0..100)
            .map(|_| registry.next_session_id().value())
            .collect();

        // then (期待する結果):
        let unique: HashSet<u64> = allocated.iter().copied().collect();
        assert_eq!(unique.len(), allocated.len());
        assert!(allocated.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(allocated[0], 0);
    }

    #[tokio::test]
    async fn test_concurrent_id_allocation_never_repeats() {
        // テスト項目: 複数タスクから同時に採番しても ID が重複しない
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();

        // when (操作):
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                (0..50)
                    .map(|_| registry.next_session_id())
                    .collect::<Vec<_>>()
            }));
        }
        let mut all = Vec::new();
        for task in tasks {
            all.extend(task.await.unwrap());
        }

        // then (期待する結果):
        let unique: HashSet<SessionId> = all.iter().copied().collect();
        assert_eq!(unique.len(), 400);
    }

    #[tokio::test]
    async fn test_register_and_deregister() {
        // テスト項目: 登録と削除がメンバーシップに反映される
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();
        let (c1, _rx1, _l1) = handle(1, 4, None);
        let (c2, _rx2, _l2) = handle(2, 4, None);
        let (c3, _rx3, _l3) = handle(3, 4, None);

        // when (操作):
        assert_eq!(registry.register(c1).await, Ok(true));
        assert_eq!(registry.register(c2).await, Ok(true));
        assert_eq!(registry.register(c3).await, Ok(true));
        let removed = registry.deregister(SessionId::new(2)).await;

        // then (期待する結果):
        assert_eq!(removed, Ok(true));
        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_deregister_unknown_session_is_noop() {
        // テスト項目: 未登録のセッションを削除してもメンバーシップは変わらず、失敗しない
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();
        let (c1, _rx1, _l1) = handle(1, 4, None);
        registry.register(c1).await.unwrap();

        // when (操作):
        let first = registry.deregister(SessionId::new(42)).await;
        let second = registry.deregister(SessionId::new(42)).await;

        // then (期待する結果):
        assert_eq!(first, Ok(false));
        assert_eq!(second, Ok(false));
        assert_eq!(ids(&registry.snapshot().await.unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn test_duplicate_register_is_rejected() {
        // テスト項目: 同じ ID のセッションは二重に登録されない
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();
        let (c1, _rx1, _l1) = handle(7, 4, None);
        registry.register(c1.clone()).await.unwrap();

        // when (操作):
        let result = registry.register(c1).await;

        // then (期待する結果):
        assert_eq!(result, Ok(false));
        assert_eq!(registry.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_members_are_sorted_by_id() {
        // テスト項目: members() は ID 順のメタデータを返す
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();
        for id in [5, 1, 3] {
            let (session, _rx, _lifecycle) = handle(id, 1, None);
            registry.register(session).await.unwrap();
        }

        // when (操作):
        let members = registry.members().await.unwrap();

        // then (期待する結果):
        let member_ids: Vec<u64> = members.iter().map(|m| m.id.value()).collect();
        assert_eq!(member_ids, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_concurrent_registration_is_serialized() {
        // テスト項目: 並行した登録がすべて反映される
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();

        // when (操作):
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let id = registry.next_session_id().value();
                let (session, _rx, _lifecycle) = handle(id, 1, None);
                registry.register(session).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(true));
        }

        // then (期待する結果):
        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), (0..32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_remaining_sessions() {
        // テスト項目: シャットダウン時に登録済みセッションがキャンセルされる
        // given (前提条件):
        let (registry, shutdown, task) = spawn_registry();
        let (c1, _rx1, _l1) = handle(1, 4, None);
        registry.register(c1.clone()).await.unwrap();

        // when (操作):
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("registry should stop")
            .unwrap();

        // then (期待する結果):
        assert!(c1.is_cancelled());
        assert!(matches!(
            registry.snapshot().await,
            Err(RegistryError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_report_error_does_not_stop_registry() {
        // テスト項目: エラー報告後も Registry は動作し続ける
        // given (前提条件):
        let (registry, _shutdown, _task) = spawn_registry();

        // when (操作):
        registry.report_error(SessionError::Read {
            id: SessionId::new(9),
            reason: "connection reset".to_string(),
        });

        // then (期待する結果):
        assert_eq!(registry.snapshot().await.map(|s| s.len()), Ok(0));
    }

    #[tokio::test]
    async fn test_report_error_after_stop_does_not_panic() {
        // テスト項目: Registry 停止後のエラー報告でパニックしない
        // given (前提条件):
        let (registry, shutdown, task) = spawn_registry();
        shutdown.cancel();
        task.await.unwrap();

        // when (操作):
        registry.report_error(SessionError::Closed(SessionId::new(1)));

        // then (期待する結果):
        assert_eq!(registry.deregister(SessionId::new(1)).await, Err(RegistryError::Closed));
    }
}
