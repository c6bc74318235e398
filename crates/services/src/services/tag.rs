use db::models::tag::{Tag, TagWithCount};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::pagination::{Page, PageWindow};

use super::access_control::{AccessControlResolver, Identity};

#[derive(Debug, Error)]
pub enum TagServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct TagService {
    pool: SqlitePool,
    resolver: AccessControlResolver,
}

impl TagService {
    pub fn new(pool: SqlitePool, resolver: AccessControlResolver) -> Self {
        Self { pool, resolver }
    }

    /// Tags with per-viewer article counts. Tags used only on hidden articles are omitted.
    pub async fn list(
        &self,
        identity: &Identity,
        window: PageWindow,
    ) -> Result<Page<TagWithCount>, TagServiceError> {
        let scope = self.resolver.storage_scope(identity);
        let rows = Tag::find_with_visible_count(&self.pool, scope, window).await?;
        let total = Tag::count_with_visible(&self.pool, scope).await?;
        Ok(Page::new(rows, window, usize::try_from(total).unwrap_or(0)))
    }
}
