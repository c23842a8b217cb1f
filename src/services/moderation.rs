use crate::{
    config::moderation::ModerationConfig,
    error::{AppError, AppResult},
    models::{ContentKey, ReportModel},
    pagination::Page,
    services::{
        analyzer::{ContentAnalysis, ContentAnalyzer, ModerationRecommendation},
        content::{ContentStore, DbContentStore},
        escalation::{EscalationOutcome, EscalationPolicy},
        locks::ContentLocks,
        notification::{DbNotificationSink, NotificationDispatcher},
        report::{FileReportRequest, NewReport, ReportService},
    },
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct FiledReport {
    pub report: ReportModel,
    pub escalation: EscalationOutcome,
}

/// Entry point for callers: report filing with escalation, listings, and
/// content analysis.
#[derive(Clone)]
pub struct ModerationService {
    reports: ReportService,
    policy: EscalationPolicy,
    analyzer: Arc<ContentAnalyzer>,
    locks: ContentLocks,
    notifications: NotificationDispatcher,
}

impl ModerationService {
    pub fn new(
        db: DatabaseConnection,
        content: Arc<dyn ContentStore>,
        notifications: NotificationDispatcher,
        analyzer: ContentAnalyzer,
        config: ModerationConfig,
    ) -> Self {
        let reports = ReportService::new(db, content.clone());
        let policy = EscalationPolicy::new(reports.clone(), content, config);
        Self {
            reports,
            policy,
            analyzer: Arc::new(analyzer),
            locks: ContentLocks::new(),
            notifications,
        }
    }

    /// Wire the database-backed content store and notification sink.
    /// Must be called from within a tokio runtime.
    pub fn with_database(
        db: DatabaseConnection,
        analyzer: ContentAnalyzer,
        config: ModerationConfig,
    ) -> Self {
        let content = Arc::new(DbContentStore::new(db.clone()));
        let notifications =
            NotificationDispatcher::spawn(Arc::new(DbNotificationSink::new(db.clone())));
        Self::new(db, content, notifications, analyzer, config)
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    pub async fn file_report(
        &self,
        reporter_id: i32,
        request: FileReportRequest,
    ) -> AppResult<FiledReport> {
        let new = request.into_new_report(reporter_id)?;
        self.submit(new).await
    }

    /// File a report and re-evaluate its content item.
    ///
    /// Filing, counting, acting and resolving run under the content item's
    /// lock. If escalation fails the report stays filed and the error carries
    /// its id.
    pub async fn submit(&self, new: NewReport) -> AppResult<FiledReport> {
        let key = new.key();

        let (filed, notice) = {
            let _guard = self.locks.acquire(key).await;

            let report = self.reports.file_report(new).await?;
            match self.policy.evaluate(key).await {
                Ok((escalation, notice)) => (FiledReport { report, escalation }, notice),
                Err(e) => {
                    tracing::error!(
                        "Escalation of {} failed after report {}: {}",
                        key,
                        report.id,
                        e
                    );
                    return Err(AppError::escalation(report.id, e));
                }
            }
        };

        if let Some(notice) = notice {
            self.notifications.dispatch(notice);
        }
        Ok(filed)
    }

    pub async fn list_for_content(&self, key: ContentKey) -> AppResult<Vec<ReportModel>> {
        self.reports.list_for_content(key).await
    }

    pub async fn list_unresolved(&self) -> AppResult<Vec<ReportModel>> {
        self.reports.list_unresolved().await
    }

    pub async fn list_unresolved_page(
        &self,
        page: u64,
        per_page: u64,
    ) -> AppResult<Page<ReportModel>> {
        self.reports.list_unresolved_page(page, per_page).await
    }

    /// Wait for queued author notifications to reach the sink.
    pub async fn flush_notifications(&self) {
        self.notifications.flush().await;
    }

    pub fn analyze_content(&self, text: &str) -> ContentAnalysis {
        self.analyzer.analyze(text)
    }

    pub fn get_moderation_recommendation(&self, text: &str) -> ModerationRecommendation {
        self.analyzer.recommend(text)
    }
}
