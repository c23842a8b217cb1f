use crate::{
    error::{AppError, AppResult},
    models::{post, ContentType, Post, PostModel, Topic},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Visibility state of the content being moderated.
///
/// Only posts can be mutated; topics are looked up for existence only.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn exists(&self, content_type: ContentType, content_id: i32) -> AppResult<bool>;

    async fn set_flagged(&self, post_id: i32, reason: &str, by: i32) -> AppResult<()>;

    async fn set_inactive(&self, post_id: i32, by: i32) -> AppResult<()>;

    async fn author_of(&self, post_id: i32) -> AppResult<i32>;

    /// Deep link to the post inside its topic.
    async fn container_path(&self, post_id: i32) -> AppResult<String>;
}

#[derive(Clone)]
pub struct DbContentStore {
    db: DatabaseConnection,
}

impl DbContentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_post(&self, post_id: i32) -> AppResult<PostModel> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[async_trait::async_trait]
impl ContentStore for DbContentStore {
    async fn exists(&self, content_type: ContentType, content_id: i32) -> AppResult<bool> {
        let found = match content_type {
            ContentType::Post => Post::find_by_id(content_id).one(&self.db).await?.is_some(),
            ContentType::Topic => Topic::find_by_id(content_id).one(&self.db).await?.is_some(),
        };
        Ok(found)
    }

    async fn set_flagged(&self, post_id: i32, reason: &str, by: i32) -> AppResult<()> {
        let existing = self.find_post(post_id).await?;
        let now = chrono::Utc::now().naive_utc();

        let mut active: post::ActiveModel = existing.into();
        active.is_flagged = Set(true);
        active.flag_reason = Set(Some(reason.to_string()));
        active.flagged_by = Set(Some(by));
        active.flagged_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn set_inactive(&self, post_id: i32, by: i32) -> AppResult<()> {
        let existing = self.find_post(post_id).await?;
        let now = chrono::Utc::now().naive_utc();

        let mut active: post::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.deactivated_by = Set(Some(by));
        active.deactivated_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn author_of(&self, post_id: i32) -> AppResult<i32> {
        Ok(self.find_post(post_id).await?.user_id)
    }

    async fn container_path(&self, post_id: i32) -> AppResult<String> {
        let post = self.find_post(post_id).await?;
        Ok(format!("/topics/{}#post-{}", post.topic_id, post.id))
    }
}
