use crate::{
    error::{AppError, AppResult},
    models::{report, ContentKey, ContentType, Report, ReportModel, ReportReason, ResolutionAction},
    pagination::Page,
    services::content::ContentStore,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Retries before a contended claim is reported as an error.
pub const MAX_CLAIM_ATTEMPTS: usize = 5;

/// Raw filing input as received from the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FileReportRequest {
    /// POST or TOPIC
    #[validate(length(min = 1, max = 20))]
    pub content_type: String,
    #[validate(range(min = 1))]
    pub content_id: i32,
    #[validate(length(min = 1, max = 50))]
    pub reason: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl FileReportRequest {
    pub fn into_new_report(self, reporter_id: i32) -> AppResult<NewReport> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(NewReport {
            content_type: self.content_type.parse()?,
            content_id: self.content_id,
            reporter_id,
            reason: self.reason.parse()?,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub content_type: ContentType,
    pub content_id: i32,
    pub reporter_id: i32,
    pub reason: ReportReason,
    pub description: Option<String>,
}

impl NewReport {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.content_type, self.content_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resolved_by: i32,
    pub action: ResolutionAction,
    pub notes: Option<String>,
}

impl Resolution {
    fn stamp(&self) -> report::ActiveModel {
        report::ActiveModel {
            resolved: Set(true),
            resolved_by: Set(Some(self.resolved_by)),
            resolution_action: Set(Some(self.action)),
            resolution_notes: Set(self.notes.clone()),
            resolved_at: Set(Some(chrono::Utc::now().naive_utc())),
            ..Default::default()
        }
    }
}

/// The report ledger.
///
/// Callers that combine filing with escalation must serialize per content key
/// (see `ModerationService`); the ledger itself only guarantees single-row
/// atomicity plus the unique reporter index.
#[derive(Clone)]
pub struct ReportService {
    db: DatabaseConnection,
    content: Arc<dyn ContentStore>,
}

impl ReportService {
    pub fn new(db: DatabaseConnection, content: Arc<dyn ContentStore>) -> Self {
        Self { db, content }
    }

    pub async fn file_report(&self, new: NewReport) -> AppResult<ReportModel> {
        if !self.content.exists(new.content_type, new.content_id).await? {
            return Err(AppError::NotFound);
        }

        // One report per reporter per content item, resolved or not.
        let previous = Report::find()
            .filter(report::Column::ReporterId.eq(new.reporter_id))
            .filter(report::Column::ContentType.eq(new.content_type))
            .filter(report::Column::ContentId.eq(new.content_id))
            .count(&self.db)
            .await?;
        if previous > 0 {
            return Err(AppError::DuplicateReport);
        }

        let key = new.key();
        let description = new
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let model = report::ActiveModel {
            content_type: Set(new.content_type),
            content_id: Set(new.content_id),
            reporter_id: Set(new.reporter_id),
            reason: Set(new.reason),
            description: Set(description),
            resolved: Set(false),
            reported_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        let saved = model.insert(&self.db).await.map_err(AppError::from_insert)?;
        tracing::debug!(
            "Report {} filed by user {} against {}",
            saved.id,
            saved.reporter_id,
            key
        );
        Ok(saved)
    }

    pub async fn get(&self, id: i32) -> AppResult<ReportModel> {
        Report::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_for_content(&self, key: ContentKey) -> AppResult<Vec<ReportModel>> {
        let reports = newest_first(for_content(key)).all(&self.db).await?;
        Ok(reports)
    }

    pub async fn list_unresolved(&self) -> AppResult<Vec<ReportModel>> {
        let reports = newest_first(unresolved()).all(&self.db).await?;
        Ok(reports)
    }

    pub async fn list_unresolved_page(
        &self,
        page: u64,
        per_page: u64,
    ) -> AppResult<Page<ReportModel>> {
        let paginator = newest_first(unresolved()).paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let reports = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok(Page::new(reports, total, page, per_page))
    }

    pub async fn count_unresolved(&self, key: ContentKey) -> AppResult<u64> {
        let count = for_content(key)
            .filter(report::Column::Resolved.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Resolve every currently unresolved report for `key`, returning the ids
    /// that were transitioned. Already resolved reports are left untouched.
    pub async fn resolve_all(
        &self,
        key: ContentKey,
        resolution: &Resolution,
    ) -> AppResult<Vec<i32>> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            if let Some(ids) = self.try_claim(key, None, resolution).await? {
                return Ok(ids);
            }
        }
        Err(contended(key))
    }

    /// Resolve the unresolved reports for `key` only if there are exactly
    /// `expected` of them, as one compare-and-set.
    ///
    /// Returns `None` when the unresolved set no longer matches, e.g. another
    /// process filed or resolved reports since `expected` was counted. Nothing
    /// is written in that case.
    pub async fn claim_batch(
        &self,
        key: ContentKey,
        expected: u64,
        resolution: &Resolution,
    ) -> AppResult<Option<Vec<i32>>> {
        self.try_claim(key, Some(expected), resolution).await
    }

    /// Undo a claim whose escalation could not be carried out.
    pub async fn reopen(&self, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Report::update_many()
            .set(report::ActiveModel {
                resolved: Set(false),
                resolved_by: Set(None),
                resolution_action: Set(None),
                resolution_notes: Set(None),
                resolved_at: Set(None),
                ..Default::default()
            })
            .filter(report::Column::Id.is_in(ids.to_vec()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn try_claim(
        &self,
        key: ContentKey,
        expected: Option<u64>,
        resolution: &Resolution,
    ) -> AppResult<Option<Vec<i32>>> {
        let txn = self.db.begin().await?;

        let ids: Vec<i32> = for_content(key)
            .filter(report::Column::Resolved.eq(false))
            .select_only()
            .column(report::Column::Id)
            .into_tuple::<i32>()
            .all(&txn)
            .await?;

        if expected.is_some_and(|n| n != ids.len() as u64) {
            txn.rollback().await?;
            return Ok(None);
        }
        if ids.is_empty() {
            txn.commit().await?;
            return Ok(Some(ids));
        }

        // The `resolved = false` guard makes a concurrent claimer's rows drop
        // out of this update once it commits.
        let result = Report::update_many()
            .set(resolution.stamp())
            .filter(report::Column::Id.is_in(ids.clone()))
            .filter(report::Column::Resolved.eq(false))
            .exec(&txn)
            .await?;

        if result.rows_affected != ids.len() as u64 {
            tracing::debug!(
                "Lost claim on {}: resolved {} of {} reports",
                key,
                result.rows_affected,
                ids.len()
            );
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await?;
        Ok(Some(ids))
    }

    /// Resolve a single report. The transition happens at most once.
    pub async fn resolve(&self, id: i32, resolution: &Resolution) -> AppResult<ReportModel> {
        let existing = self.get(id).await?;
        if existing.resolved {
            return Err(AppError::Validation(
                "Report is already resolved".to_string(),
            ));
        }

        let result = Report::update_many()
            .set(resolution.stamp())
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Resolved.eq(false))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Validation(
                "Report is already resolved".to_string(),
            ));
        }

        self.get(id).await
    }
}

fn contended(key: ContentKey) -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "reports for {} kept changing, gave up after {} attempts",
        key,
        MAX_CLAIM_ATTEMPTS
    ))
}

fn for_content(key: ContentKey) -> Select<Report> {
    Report::find()
        .filter(report::Column::ContentType.eq(key.content_type))
        .filter(report::Column::ContentId.eq(key.content_id))
}

fn unresolved() -> Select<Report> {
    Report::find().filter(report::Column::Resolved.eq(false))
}

fn newest_first(query: Select<Report>) -> Select<Report> {
    query
        .order_by_desc(report::Column::ReportedAt)
        .order_by_desc(report::Column::Id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_type: &str, reason: &str) -> FileReportRequest {
        FileReportRequest {
            content_type: content_type.to_string(),
            content_id: 5,
            reason: reason.to_string(),
            description: None,
        }
    }

    #[test]
    fn request_parses_enums() {
        let new = request("post", "spam").into_new_report(9).unwrap();
        assert_eq!(new.key(), ContentKey::post(5));
        assert_eq!(new.reason, ReportReason::Spam);
        assert_eq!(new.reporter_id, 9);
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let err = request("comment", "spam").into_new_report(9).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn unknown_reason_is_rejected() {
        let err = request("topic", "boring").into_new_report(9).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut req = request("", "spam");
        assert!(req.clone().into_new_report(1).is_err());
        req.content_type = "post".to_string();
        req.content_id = 0;
        assert!(req.into_new_report(1).is_err());
    }

    #[test]
    fn long_description_is_rejected() {
        let mut req = request("post", "other");
        req.description = Some("x".repeat(1001));
        assert!(matches!(
            req.into_new_report(1),
            Err(AppError::Validation(_))
        ));
    }
}
