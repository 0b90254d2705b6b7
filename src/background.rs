//! 会话清理后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::{AuthConfig, prune_expired_sessions};
use crate::config::SESSION_PRUNE_INTERVAL_SECS;

/// 启动后台任务：定期清理过期会话。
pub fn spawn_background_tasks(auth: Arc<AuthConfig>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            prune_expired_sessions(&auth).await;
            let active = auth.sessions.lock().await.len();
            debug!(active, "sessions pruned");
        }
    });
}
