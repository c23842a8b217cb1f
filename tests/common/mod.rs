#![allow(dead_code)]

use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use xjy_moderation::{
    config::moderation::ModerationConfig,
    error::AppResult,
    migration::Migrator,
    models::{post, report, topic, ContentKey, ReportReason},
    services::{
        analyzer::ContentAnalyzer,
        content::{ContentStore, DbContentStore},
        notification::{Notice, NotificationDispatcher, NotificationSink},
        report::NewReport,
    },
    ModerationService,
};

pub const AUTHOR_ID: i32 = 42;

pub struct TestApp {
    pub db: DatabaseConnection,
    pub service: ModerationService,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

impl TestApp {
    pub async fn next_notice(&mut self) -> Notice {
        tokio::time::timeout(Duration::from_secs(2), self.notices.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    pub async fn assert_no_notice(&mut self) {
        self.service.flush_notifications().await;
        assert!(self.notices.try_recv().is_err(), "unexpected notification");
    }
}

/// Forwards every notice to the test.
pub struct RecordingSink(pub mpsc::UnboundedSender<Notice>);

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notice: &Notice) -> AppResult<()> {
        let _ = self.0.send(notice.clone());
        Ok(())
    }
}

pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // A second connection would open a second, empty in-memory database.
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(ModerationConfig::default(), None).await
}

pub async fn spawn_app_with(
    config: ModerationConfig,
    content: Option<Arc<dyn ContentStore>>,
) -> TestApp {
    let db = setup_db().await;
    let content = content.unwrap_or_else(|| Arc::new(DbContentStore::new(db.clone())));

    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = NotificationDispatcher::spawn(Arc::new(RecordingSink(tx)));
    let service = ModerationService::new(
        db.clone(),
        content,
        dispatcher,
        ContentAnalyzer::with_default_rules(),
        config,
    );

    TestApp {
        db,
        service,
        notices: rx,
    }
}

pub async fn create_topic(db: &DatabaseConnection, user_id: i32) -> i32 {
    let model = topic::ActiveModel {
        user_id: Set(user_id),
        title: Set("Test topic".to_string()),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    model.insert(db).await.expect("Failed to create topic").id
}

pub async fn create_post(db: &DatabaseConnection, topic_id: i32, user_id: i32) -> i32 {
    let now = chrono::Utc::now().naive_utc();
    let model = post::ActiveModel {
        topic_id: Set(topic_id),
        user_id: Set(user_id),
        content: Set("Some reply content".to_string()),
        is_flagged: Set(false),
        flag_reason: Set(None),
        flagged_by: Set(None),
        flagged_at: Set(None),
        is_active: Set(true),
        deactivated_by: Set(None),
        deactivated_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await.expect("Failed to create post").id
}

/// A topic with one post by `AUTHOR_ID`; returns (topic_id, post_id).
pub async fn create_thread(db: &DatabaseConnection) -> (i32, i32) {
    let topic_id = create_topic(db, AUTHOR_ID).await;
    let post_id = create_post(db, topic_id, AUTHOR_ID).await;
    (topic_id, post_id)
}

pub fn new_report(key: ContentKey, reporter_id: i32) -> NewReport {
    NewReport {
        content_type: key.content_type,
        content_id: key.content_id,
        reporter_id,
        reason: ReportReason::Spam,
        description: Some("looks like spam".to_string()),
    }
}

/// Write an unresolved report straight to the table, bypassing escalation.
pub async fn seed_unresolved(db: &DatabaseConnection, key: ContentKey, reporter_id: i32) -> i32 {
    let model = report::ActiveModel {
        content_type: Set(key.content_type),
        content_id: Set(key.content_id),
        reporter_id: Set(reporter_id),
        reason: Set(ReportReason::Other),
        description: Set(None),
        resolved: Set(false),
        reported_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    model.insert(db).await.expect("Failed to seed report").id
}
