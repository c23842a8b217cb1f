use crate::error::AppError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    #[sea_orm(string_value = "POST")]
    Post,
    #[sea_orm(string_value = "TOPIC")]
    Topic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportReason {
    #[sea_orm(string_value = "SPAM")]
    Spam,
    #[sea_orm(string_value = "HARASSMENT")]
    Harassment,
    #[sea_orm(string_value = "INAPPROPRIATE")]
    Inappropriate,
    #[sea_orm(string_value = "MISINFORMATION")]
    Misinformation,
    #[sea_orm(string_value = "OFF_TOPIC")]
    OffTopic,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionAction {
    #[sea_orm(string_value = "AUTO_FLAG")]
    AutoFlag,
    #[sea_orm(string_value = "AUTO_DELETE")]
    AutoDelete,
    #[sea_orm(string_value = "DISMISSED")]
    Dismissed,
    #[sea_orm(string_value = "CONTENT_REMOVED")]
    ContentRemoved,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub content_type: ContentType,
    pub content_id: i32,
    pub reporter_id: i32,
    pub reason: ReportReason,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub resolved: bool,
    pub resolved_by: Option<i32>,
    pub resolution_action: Option<ResolutionAction>,
    #[sea_orm(column_type = "Text", nullable)]
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime>,
    pub reported_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Identity of a moderated content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContentKey {
    pub content_type: ContentType,
    pub content_id: i32,
}

impl ContentKey {
    pub fn new(content_type: ContentType, content_id: i32) -> Self {
        Self {
            content_type,
            content_id,
        }
    }

    pub fn post(content_id: i32) -> Self {
        Self::new(ContentType::Post, content_id)
    }

    pub fn topic(content_id: i32) -> Self {
        Self::new(ContentType::Topic, content_id)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.content_type, self.content_id)
    }
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Post => "POST",
            ContentType::Topic => "TOPIC",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(ContentType::Post),
            "TOPIC" => Ok(ContentType::Topic),
            _ => Err(AppError::Validation(
                "content_type must be one of: POST, TOPIC".to_string(),
            )),
        }
    }
}

impl FromStr for ReportReason {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SPAM" => Ok(ReportReason::Spam),
            "HARASSMENT" => Ok(ReportReason::Harassment),
            "INAPPROPRIATE" => Ok(ReportReason::Inappropriate),
            "MISINFORMATION" => Ok(ReportReason::Misinformation),
            "OFF_TOPIC" => Ok(ReportReason::OffTopic),
            "OTHER" => Ok(ReportReason::Other),
            _ => Err(AppError::Validation(
                "reason must be one of: SPAM, HARASSMENT, INAPPROPRIATE, MISINFORMATION, OFF_TOPIC, OTHER"
                    .to_string(),
            )),
        }
    }
}

impl FromStr for ResolutionAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "AUTO_FLAG" => Ok(ResolutionAction::AutoFlag),
            "AUTO_DELETE" => Ok(ResolutionAction::AutoDelete),
            "DISMISSED" => Ok(ResolutionAction::Dismissed),
            "CONTENT_REMOVED" => Ok(ResolutionAction::ContentRemoved),
            _ => Err(AppError::Validation(
                "action must be one of: AUTO_FLAG, AUTO_DELETE, DISMISSED, CONTENT_REMOVED"
                    .to_string(),
            )),
        }
    }
}
