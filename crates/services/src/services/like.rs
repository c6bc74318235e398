use chrono::Utc;
use db::models::{knowledge::Knowledge, like::Like};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::pagination::{Page, PageWindow};

use super::{
    access_control::{AccessControlResolver, AccessError, Identity},
    knowledge::find_viewable,
};

#[derive(Debug, Error)]
pub enum LikeServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Result of toggling the caller's like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Clone)]
pub struct LikeService {
    pool: SqlitePool,
    resolver: AccessControlResolver,
}

impl LikeService {
    pub fn new(pool: SqlitePool, resolver: AccessControlResolver) -> Self {
        Self { pool, resolver }
    }

    pub async fn list(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Page<Like>, LikeServiceError> {
        find_viewable::<LikeServiceError>(&self.pool, &self.resolver, identity, knowledge_id)
            .await?;
        let rows = Like::find_by_knowledge_id(&self.pool, knowledge_id, window).await?;
        let total = Like::count_by_knowledge_id(&self.pool, knowledge_id).await?;
        Ok(Page::new(rows, window, usize::try_from(total).unwrap_or(0)))
    }

    /// Like the article, or take the like back if the caller already liked it.
    ///
    /// The delete runs first inside the transaction, so two toggles by the same
    /// user always land on opposite states.
    pub async fn toggle(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<LikeToggle, LikeServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        find_viewable::<LikeServiceError>(&self.pool, &self.resolver, identity, knowledge_id)
            .await?;

        let mut tx = self.pool.begin().await?;
        let liked = if Like::delete(&mut *tx, knowledge_id, user_id).await? > 0 {
            false
        } else {
            Like::create(&mut *tx, knowledge_id, user_id, Utc::now()).await?;
            true
        };
        let like_count = Knowledge::refresh_like_count(&mut *tx, knowledge_id).await?;
        tx.commit().await?;
        info!(knowledge_id, user_id, liked, like_count, "Toggled like");
        Ok(LikeToggle { liked, like_count })
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::knowledge::{CreateKnowledge, Visibility},
    };

    use super::*;
    use crate::services::{access_control::Role, config::ExposeType};

    async fn setup(visibility: Visibility) -> (LikeService, i64) {
        let db = DBService::new_in_memory().await.unwrap();
        let draft = CreateKnowledge {
            title: "likeable".to_string(),
            content: String::new(),
            visibility,
            type_id: None,
            editors: vec![],
            tags: vec![],
        };
        let k = Knowledge::create(&db.pool, &draft, 100, Utc::now()).await.unwrap();
        (
            LikeService::new(db.pool, AccessControlResolver::new(ExposeType::Open)),
            k.knowledge_id,
        )
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let (svc, kid) = setup(Visibility::Public).await;
        let alice = Identity::authenticated(1, Role::User);
        let bob = Identity::authenticated(2, Role::User);

        assert_eq!(
            svc.toggle(&alice, kid).await.unwrap(),
            LikeToggle { liked: true, like_count: 1 }
        );
        assert_eq!(svc.toggle(&bob, kid).await.unwrap().like_count, 2);
        assert_eq!(
            svc.toggle(&alice, kid).await.unwrap(),
            LikeToggle { liked: false, like_count: 1 }
        );

        let page = svc.list(&Identity::Anonymous, kid, PageWindow::new(0, 50)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user_id, 2);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_by_one_user_cancel_out() {
        let (svc, kid) = setup(Visibility::Public).await;
        let alice = Identity::authenticated(1, Role::User);

        let (first, second) = tokio::join!(svc.toggle(&alice, kid), svc.toggle(&alice, kid));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.liked, second.liked);

        let page = svc.list(&alice, kid, PageWindow::new(0, 50)).await.unwrap();
        assert_eq!(page.total, 0);
        let stored = Knowledge::find_by_id(&svc.pool, kid).await.unwrap().unwrap();
        assert_eq!(stored.like_count, 0);
    }

    #[tokio::test]
    async fn test_cannot_like_what_you_cannot_see() {
        let (svc, kid) = setup(Visibility::Private).await;
        assert!(matches!(
            svc.toggle(&Identity::authenticated(9, Role::User), kid).await.unwrap_err(),
            LikeServiceError::Access(AccessError::Forbidden)
        ));
        assert!(matches!(
            svc.toggle(&Identity::Anonymous, kid).await.unwrap_err(),
            LikeServiceError::Access(AccessError::Unauthenticated)
        ));
    }
}
