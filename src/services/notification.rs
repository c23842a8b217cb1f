use crate::{error::AppResult, models::notification};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Serialize;
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    ContentFlagged,
    ContentRemoved,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::ContentFlagged => "CONTENT_FLAGGED",
            NotificationCategory::ContentRemoved => "CONTENT_REMOVED",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub recipient: i32,
    pub category: NotificationCategory,
    pub message: String,
    pub link: String,
    pub actor: i32,
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notice: &Notice) -> AppResult<()>;
}

/// Persists notices to the `notifications` table.
#[derive(Clone)]
pub struct DbNotificationSink {
    db: DatabaseConnection,
}

impl DbNotificationSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl NotificationSink for DbNotificationSink {
    async fn notify(&self, notice: &Notice) -> AppResult<()> {
        // Don't notify yourself
        if notice.recipient == notice.actor {
            return Ok(());
        }

        let model = notification::ActiveModel {
            user_id: Set(notice.recipient),
            kind: Set(notice.category.as_str().to_string()),
            actor_id: Set(notice.actor),
            message: Set(notice.message.clone()),
            link: Set(Some(notice.link.clone())),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };
        model.insert(&self.db).await?;
        Ok(())
    }
}

/// Fire-and-forget delivery: notices are queued and handed to the sink by a
/// background task, so callers never wait on (or fail because of) delivery.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notice>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl NotificationDispatcher {
    /// Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notice>();
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let worker_pending = pending.clone();
        let worker_idle = idle.clone();
        tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                if let Err(e) = sink.notify(&notice).await {
                    tracing::warn!(
                        "Failed to deliver {} notification to user {}: {e}",
                        notice.category,
                        notice.recipient
                    );
                }
                if worker_pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    worker_idle.notify_waiters();
                }
            }
            tracing::debug!("Notification queue closed");
        });

        Self { tx, pending, idle }
    }

    pub fn dispatch(&self, notice: Notice) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.tx.send(notice) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(
                "Notification worker is gone, dropping notice for user {}",
                e.0.recipient
            );
        }
    }

    /// Wait until every notice queued so far has been handed to the sink.
    pub async fn flush(&self) {
        loop {
            let idle = self.idle.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::time::Duration;

    struct ChannelSink(mpsc::UnboundedSender<Notice>);

    #[async_trait::async_trait]
    impl NotificationSink for ChannelSink {
        async fn notify(&self, notice: &Notice) -> AppResult<()> {
            let _ = self.0.send(notice.clone());
            Ok(())
        }
    }

    struct FailOnce {
        failed: std::sync::atomic::AtomicBool,
        inner: ChannelSink,
    }

    #[async_trait::async_trait]
    impl NotificationSink for FailOnce {
        async fn notify(&self, notice: &Notice) -> AppResult<()> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(AppError::Internal(anyhow::anyhow!("smtp down")));
            }
            self.inner.notify(notice).await
        }
    }

    fn notice(recipient: i32) -> Notice {
        Notice {
            recipient,
            category: NotificationCategory::ContentFlagged,
            message: "flagged".to_string(),
            link: "/topics/1#post-1".to_string(),
            actor: 0,
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::spawn(Arc::new(ChannelSink(tx)));

        dispatcher.dispatch(notice(1));
        dispatcher.dispatch(notice(2));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(first.unwrap().unwrap().recipient, 1);
        assert_eq!(second.unwrap().unwrap().recipient, 2);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_worker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = FailOnce {
            failed: std::sync::atomic::AtomicBool::new(false),
            inner: ChannelSink(tx),
        };
        let dispatcher = NotificationDispatcher::spawn(Arc::new(sink));

        dispatcher.dispatch(notice(1));
        dispatcher.dispatch(notice(2));

        let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.recipient, 2);
    }

    #[tokio::test]
    async fn flush_waits_for_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::spawn(Arc::new(ChannelSink(tx)));

        for recipient in 1..=5 {
            dispatcher.dispatch(notice(recipient));
        }
        tokio::time::timeout(Duration::from_secs(1), dispatcher.flush())
            .await
            .unwrap();

        let mut delivered = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            delivered.push(notice.recipient);
        }
        assert_eq!(delivered, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn flush_on_empty_queue_returns() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::spawn(Arc::new(ChannelSink(tx)));
        tokio::time::timeout(Duration::from_millis(100), dispatcher.flush())
            .await
            .unwrap();
    }

    #[test]
    fn category_names() {
        assert_eq!(NotificationCategory::ContentRemoved.to_string(), "CONTENT_REMOVED");
    }
}
