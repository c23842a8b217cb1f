use crate::{
    config::moderation::{ModerationConfig, Thresholds},
    error::{AppError, AppResult},
    models::{ContentKey, ContentType, ResolutionAction},
    services::{
        content::ContentStore,
        notification::{Notice, NotificationCategory},
        report::{ReportService, Resolution, MAX_CLAIM_ATTEMPTS},
    },
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationAction {
    Flag,
    Remove,
}

impl EscalationAction {
    pub fn resolution_action(self) -> ResolutionAction {
        match self {
            EscalationAction::Flag => ResolutionAction::AutoFlag,
            EscalationAction::Remove => ResolutionAction::AutoDelete,
        }
    }

    fn category(self) -> NotificationCategory {
        match self {
            EscalationAction::Flag => NotificationCategory::ContentFlagged,
            EscalationAction::Remove => NotificationCategory::ContentRemoved,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            EscalationAction::Flag => "flagged",
            EscalationAction::Remove => "removed",
        }
    }
}

/// What one evaluation did to the content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationOutcome {
    NoAction { unresolved: u64 },
    Flagged { resolved_report_ids: Vec<i32> },
    Removed { resolved_report_ids: Vec<i32> },
}

impl EscalationOutcome {
    pub fn action(&self) -> Option<EscalationAction> {
        match self {
            EscalationOutcome::NoAction { .. } => None,
            EscalationOutcome::Flagged { .. } => Some(EscalationAction::Flag),
            EscalationOutcome::Removed { .. } => Some(EscalationAction::Remove),
        }
    }
}

/// Map an unresolved count onto the action it calls for. Removal wins over
/// flagging; only posts have automated actions.
pub fn decide(
    content_type: ContentType,
    unresolved: u64,
    thresholds: Thresholds,
) -> Option<EscalationAction> {
    if content_type != ContentType::Post {
        return None;
    }
    if unresolved >= thresholds.delete {
        Some(EscalationAction::Remove)
    } else if unresolved >= thresholds.flag {
        Some(EscalationAction::Flag)
    } else {
        None
    }
}

/// Re-evaluates a content item from the ledger's unresolved count.
///
/// State is never stored: every call recounts. The batch is claimed in the
/// ledger (compare-and-set on the unresolved set) before the content is
/// touched, so concurrent evaluators, in this process or another, act on a
/// given batch at most once. Callers should still hold the per-content lock
/// for `key` and dispatch the returned notice only after releasing it.
#[derive(Clone)]
pub struct EscalationPolicy {
    reports: ReportService,
    content: Arc<dyn ContentStore>,
    config: ModerationConfig,
}

impl EscalationPolicy {
    pub fn new(
        reports: ReportService,
        content: Arc<dyn ContentStore>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            reports,
            content,
            config,
        }
    }

    pub async fn evaluate(&self, key: ContentKey) -> AppResult<(EscalationOutcome, Option<Notice>)> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let unresolved = self.reports.count_unresolved(key).await?;

            let Some(action) = decide(key.content_type, unresolved, self.config.thresholds) else {
                tracing::debug!("{} has {} unresolved reports, no action", key, unresolved);
                return Ok((EscalationOutcome::NoAction { unresolved }, None));
            };

            let post_id = key.content_id;
            let author = self.content.author_of(post_id).await?;
            let link = self.content.container_path(post_id).await?;

            let resolution = Resolution {
                resolved_by: self.config.system_user_id,
                action: action.resolution_action(),
                notes: Some(format!(
                    "Content automatically {} after {} unresolved reports",
                    action.verb(),
                    unresolved
                )),
            };
            let Some(claimed) = self.reports.claim_batch(key, unresolved, &resolution).await?
            else {
                tracing::debug!("Unresolved reports for {} changed since counting, recounting", key);
                continue;
            };

            if let Err(e) = self.apply(post_id, action, unresolved).await {
                match self.reports.reopen(&claimed).await {
                    Ok(_) => tracing::warn!(
                        "{} could not be {}, reopened {} reports",
                        key,
                        action.verb(),
                        claimed.len()
                    ),
                    Err(reopen_err) => tracing::error!(
                        "{} could not be {} and its {} reports stay resolved: {}",
                        key,
                        action.verb(),
                        claimed.len(),
                        reopen_err
                    ),
                }
                return Err(e);
            }

            tracing::info!(
                "{} automatically {} ({} reports resolved)",
                key,
                action.verb(),
                claimed.len()
            );

            let notice = Notice {
                recipient: author,
                category: action.category(),
                message: format!(
                    "Your post has been {} after multiple community reports",
                    action.verb()
                ),
                link,
                actor: self.config.system_user_id,
            };

            let outcome = match action {
                EscalationAction::Flag => EscalationOutcome::Flagged {
                    resolved_report_ids: claimed,
                },
                EscalationAction::Remove => EscalationOutcome::Removed {
                    resolved_report_ids: claimed,
                },
            };
            return Ok((outcome, Some(notice)));
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "could not claim reports for {} after {} attempts",
            key,
            MAX_CLAIM_ATTEMPTS
        )))
    }

    async fn apply(&self, post_id: i32, action: EscalationAction, reports: u64) -> AppResult<()> {
        let actor = self.config.system_user_id;
        match action {
            EscalationAction::Flag => {
                let reason = format!("Automatically flagged after {} community reports", reports);
                self.content.set_flagged(post_id, &reason, actor).await
            }
            EscalationAction::Remove => self.content.set_inactive(post_id, actor).await,
        }
    }
}
