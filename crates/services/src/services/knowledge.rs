//! Article reads and writes, gated by the access resolver.

use chrono::Utc;
use db::models::{
    history::KnowledgeHistory,
    knowledge::{CreateKnowledge, Knowledge, KnowledgeFilter, UpdateKnowledge},
    knowledge_editor::KnowledgeEditor,
    tag::Tag,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use utils::pagination::{Page, PageWindow};

use super::access_control::{AccessControlResolver, AccessError, EditorSet, Identity};

#[derive(Debug, Error)]
pub enum KnowledgeServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("{0}")]
    Validation(String),
}

/// An article as shown on its own page.
#[derive(Debug, Clone, Serialize, TS)]
pub struct KnowledgeDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub knowledge: Knowledge,
    pub tags: Vec<String>,
    pub editors: Vec<i64>,
    /// Whether the caller may edit or delete this article.
    pub editable: bool,
}

/// Fetch an article with its editors, refusing unless `identity` may view it.
pub async fn find_viewable<E>(
    pool: &SqlitePool,
    resolver: &AccessControlResolver,
    identity: &Identity,
    knowledge_id: i64,
) -> Result<(Knowledge, EditorSet), E>
where
    E: From<sqlx::Error> + From<AccessError>,
{
    let Some(knowledge) = Knowledge::find_by_id(pool, knowledge_id).await? else {
        return Err(AccessError::NotFound.into());
    };
    let editors = EditorSet::from(KnowledgeEditor::find_user_ids(pool, knowledge_id).await?);
    resolver.check_view(identity, Some(&knowledge), &editors)?;
    Ok((knowledge, editors))
}

/// Fetch an article with its editors, refusing unless `identity` may edit it.
pub async fn find_editable<E>(
    pool: &SqlitePool,
    resolver: &AccessControlResolver,
    identity: &Identity,
    knowledge_id: i64,
) -> Result<(Knowledge, EditorSet), E>
where
    E: From<sqlx::Error> + From<AccessError>,
{
    let Some(knowledge) = Knowledge::find_by_id(pool, knowledge_id).await? else {
        return Err(AccessError::NotFound.into());
    };
    let editors = EditorSet::from(KnowledgeEditor::find_user_ids(pool, knowledge_id).await?);
    resolver.check_edit(identity, Some(&knowledge), &editors)?;
    Ok((knowledge, editors))
}

fn require_user(identity: &Identity) -> Result<i64, AccessError> {
    identity.user_id().ok_or(AccessError::Unauthenticated)
}

fn validate_title(title: &str) -> Result<(), KnowledgeServiceError> {
    if title.trim().is_empty() {
        return Err(KnowledgeServiceError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct KnowledgeService {
    pool: SqlitePool,
    resolver: AccessControlResolver,
}

impl KnowledgeService {
    pub fn new(pool: SqlitePool, resolver: AccessControlResolver) -> Self {
        Self { pool, resolver }
    }

    async fn viewable(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<(Knowledge, EditorSet), KnowledgeServiceError> {
        find_viewable(&self.pool, &self.resolver, identity, knowledge_id).await
    }

    async fn editable(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<(Knowledge, EditorSet), KnowledgeServiceError> {
        find_editable(&self.pool, &self.resolver, identity, knowledge_id).await
    }

    async fn detail(
        &self,
        identity: &Identity,
        knowledge: Knowledge,
        editors: &EditorSet,
    ) -> Result<KnowledgeDetail, KnowledgeServiceError> {
        let tags = Tag::find_by_knowledge_id(&self.pool, knowledge.knowledge_id)
            .await?
            .into_iter()
            .map(|tag| tag.tag_name)
            .collect();
        let editable = self.resolver.can_edit(identity, &knowledge, editors);
        Ok(KnowledgeDetail {
            knowledge,
            tags,
            editors: editors.to_sorted_vec(),
            editable,
        })
    }

    /// Single article. Counts the view; a failure to count is logged and ignored.
    pub async fn get(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<KnowledgeDetail, KnowledgeServiceError> {
        let (mut knowledge, editors) = self.viewable(identity, knowledge_id).await?;

        match Knowledge::increment_view_count(&self.pool, knowledge_id).await {
            Ok(()) => knowledge.view_count += 1,
            Err(e) => warn!(knowledge_id, error = %e, "Failed to record article view"),
        }

        self.detail(identity, knowledge, &editors).await
    }

    async fn list_filtered(
        &self,
        identity: &Identity,
        filter: KnowledgeFilter<'_>,
        window: PageWindow,
    ) -> Result<Page<Knowledge>, KnowledgeServiceError> {
        let scope = self.resolver.storage_scope(identity);
        let rows = Knowledge::find_visible(&self.pool, scope, filter, window).await?;
        let total = Knowledge::count_visible(&self.pool, scope, filter).await?;
        debug!(
            user_id = ?identity.user_id(),
            creator_id = ?filter.creator_id,
            offset = window.offset(),
            returned = rows.len(),
            total,
            "Listed knowledge"
        );
        Ok(Page::new(rows, window, usize::try_from(total).unwrap_or(0)))
    }

    /// Articles visible to `identity`, newest update first. The visibility rule runs in SQL.
    pub async fn list(
        &self,
        identity: &Identity,
        keyword: Option<&str>,
        window: PageWindow,
    ) -> Result<Page<Knowledge>, KnowledgeServiceError> {
        let filter = KnowledgeFilter {
            keyword: keyword.map(str::trim).filter(|k| !k.is_empty()),
            creator_id: None,
        };
        self.list_filtered(identity, filter, window).await
    }

    /// Articles written by `creator_id` that `identity` may see.
    pub async fn list_by_user(
        &self,
        identity: &Identity,
        creator_id: i64,
        window: PageWindow,
    ) -> Result<Page<Knowledge>, KnowledgeServiceError> {
        let filter = KnowledgeFilter {
            keyword: None,
            creator_id: Some(creator_id),
        };
        self.list_filtered(identity, filter, window).await
    }

    pub async fn create(
        &self,
        identity: &Identity,
        data: CreateKnowledge,
    ) -> Result<KnowledgeDetail, KnowledgeServiceError> {
        let user_id = require_user(identity)?;
        validate_title(&data.title)?;

        let mut tx = self.pool.begin().await?;
        let knowledge = Knowledge::create(&mut *tx, &data, user_id, Utc::now()).await?;
        KnowledgeEditor::replace(&mut tx, knowledge.knowledge_id, &data.editors).await?;
        Tag::set_for_knowledge(&mut tx, knowledge.knowledge_id, &data.tags).await?;
        tx.commit().await?;

        info!(
            knowledge_id = knowledge.knowledge_id,
            user_id,
            visibility = %knowledge.visibility,
            "Created knowledge"
        );
        let editors = EditorSet::from(
            KnowledgeEditor::find_user_ids(&self.pool, knowledge.knowledge_id).await?,
        );
        self.detail(identity, knowledge, &editors).await
    }

    /// Applies a partial update after storing the current version as history.
    ///
    /// The snapshot is the first statement of the transaction. Edit rights and the
    /// merge base are re-read after it.
    pub async fn update(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        data: UpdateKnowledge,
    ) -> Result<KnowledgeDetail, KnowledgeServiceError> {
        self.editable(identity, knowledge_id).await?;
        let user_id = require_user(identity)?;
        if let Some(title) = &data.title {
            validate_title(title)?;
        }

        let mut tx = self.pool.begin().await?;
        let Some(history_no) = KnowledgeHistory::snapshot_current(&mut tx, knowledge_id).await?
        else {
            return Err(AccessError::NotFound.into());
        };
        let current = Knowledge::find_by_id(&mut *tx, knowledge_id).await?;
        let editors =
            EditorSet::from(KnowledgeEditor::find_user_ids(&mut *tx, knowledge_id).await?);
        self.resolver
            .check_edit(identity, current.as_ref(), &editors)?;
        let Some(current) = current else {
            return Err(AccessError::NotFound.into());
        };

        let updated = Knowledge::update(
            &mut *tx,
            knowledge_id,
            data.title.as_deref().unwrap_or(&current.title),
            data.content.as_deref().unwrap_or(&current.content),
            data.visibility.unwrap_or(current.visibility),
            user_id,
            Utc::now(),
        )
        .await?
        .ok_or(AccessError::NotFound)?;
        if let Some(editors) = &data.editors {
            KnowledgeEditor::replace(&mut tx, knowledge_id, editors).await?;
        }
        if let Some(tags) = &data.tags {
            Tag::set_for_knowledge(&mut tx, knowledge_id, tags).await?;
        }
        tx.commit().await?;

        info!(knowledge_id, user_id, history_no, "Updated knowledge");
        let editors =
            EditorSet::from(KnowledgeEditor::find_user_ids(&self.pool, knowledge_id).await?);
        self.detail(identity, updated, &editors).await
    }

    pub async fn delete(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<(), KnowledgeServiceError> {
        let knowledge = Knowledge::find_by_id(&self.pool, knowledge_id).await?;
        let editors =
            EditorSet::from(KnowledgeEditor::find_user_ids(&self.pool, knowledge_id).await?);
        self.resolver
            .check_delete(identity, knowledge.as_ref(), &editors)?;
        let user_id = require_user(identity)?;

        if Knowledge::soft_delete(&self.pool, knowledge_id, user_id, Utc::now()).await? == 0 {
            return Err(AccessError::NotFound.into());
        }
        info!(knowledge_id, user_id, "Deleted knowledge");
        Ok(())
    }

    pub async fn editors(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<Vec<i64>, KnowledgeServiceError> {
        let (_, editors) = self.viewable(identity, knowledge_id).await?;
        Ok(editors.to_sorted_vec())
    }

    pub async fn replace_editors(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<i64>, KnowledgeServiceError> {
        self.editable(identity, knowledge_id).await?;

        let mut tx = self.pool.begin().await?;
        KnowledgeEditor::replace(&mut tx, knowledge_id, user_ids).await?;
        tx.commit().await?;

        let editors = KnowledgeEditor::find_user_ids(&self.pool, knowledge_id).await?;
        info!(knowledge_id, editors = ?editors, "Replaced knowledge editors");
        Ok(editors)
    }

    pub async fn histories(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Page<KnowledgeHistory>, KnowledgeServiceError> {
        self.viewable(identity, knowledge_id).await?;
        let rows = KnowledgeHistory::find_by_knowledge_id(&self.pool, knowledge_id, window).await?;
        let total = KnowledgeHistory::count_by_knowledge_id(&self.pool, knowledge_id).await?;
        Ok(Page::new(rows, window, usize::try_from(total).unwrap_or(0)))
    }

    /// One stored version, under the same view rule as the live article.
    pub async fn history(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        history_no: i64,
    ) -> Result<KnowledgeHistory, KnowledgeServiceError> {
        self.viewable(identity, knowledge_id).await?;
        KnowledgeHistory::find_one(&self.pool, knowledge_id, history_no)
            .await?
            .ok_or_else(|| AccessError::NotFound.into())
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::knowledge::Visibility};

    use super::*;
    use crate::services::{access_control::Role, config::ExposeType};

    fn user(id: i64) -> Identity {
        Identity::authenticated(id, Role::User)
    }

    fn draft(title: &str, visibility: Visibility, editors: Vec<i64>) -> CreateKnowledge {
        CreateKnowledge {
            title: title.to_string(),
            content: "body".to_string(),
            visibility,
            type_id: None,
            editors,
            tags: vec!["rust".to_string()],
        }
    }

    async fn service(expose: ExposeType) -> KnowledgeService {
        let db = DBService::new_in_memory().await.unwrap();
        KnowledgeService::new(db.pool, AccessControlResolver::new(expose))
    }

    #[tokio::test]
    async fn test_create_requires_authentication() {
        let svc = service(ExposeType::Open).await;
        let err = svc
            .create(&Identity::Anonymous, draft("t", Visibility::Public, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeServiceError::Access(AccessError::Unauthenticated)));

        let err = svc.create(&user(1), draft("  ", Visibility::Public, vec![])).await.unwrap_err();
        assert!(matches!(err, KnowledgeServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_private_article_access() {
        let svc = service(ExposeType::Open).await;
        let created = svc
            .create(&user(100), draft("secret", Visibility::Private, vec![7]))
            .await
            .unwrap();
        let id = created.knowledge.knowledge_id;
        assert!(created.editable);
        assert_eq!(created.editors, vec![7]);
        assert_eq!(created.tags, vec!["rust"]);

        let as_editor = svc.get(&user(7), id).await.unwrap();
        assert!(as_editor.editable);
        assert_eq!(as_editor.knowledge.view_count, 1);

        assert!(matches!(
            svc.get(&user(999), id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Forbidden)
        ));
        assert!(matches!(
            svc.get(&Identity::Anonymous, id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Unauthenticated)
        ));
        assert!(matches!(
            svc.get(&user(100), id + 1000).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_public_is_readable_not_writable_by_strangers() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("open", Visibility::Public, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        let seen = svc.get(&user(999), id).await.unwrap();
        assert!(!seen.editable);

        let err = svc
            .update(
                &user(999),
                id,
                UpdateKnowledge {
                    title: Some("hijack".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeServiceError::Access(AccessError::Forbidden)));
        assert!(matches!(
            svc.delete(&user(999), id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_update_records_history_and_delete_hides() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("v1", Visibility::Public, vec![7]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        let updated = svc
            .update(
                &user(7),
                id,
                UpdateKnowledge {
                    title: Some("v2".to_string()),
                    visibility: Some(Visibility::Protected),
                    tags: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.knowledge.title, "v2");
        assert_eq!(updated.knowledge.content, "body");
        assert_eq!(updated.knowledge.visibility, Visibility::Protected);
        assert_eq!(updated.knowledge.update_user, 7);
        assert_eq!(updated.knowledge.creator_id, 100);
        assert!(updated.tags.is_empty());

        let histories = svc.histories(&user(1), id, PageWindow::new(0, 20)).await.unwrap();
        assert_eq!(histories.total, 1);
        assert_eq!(histories.items[0].title, "v1");
        assert_eq!(histories.items[0].visibility, Visibility::Public);

        svc.delete(&user(100), id).await.unwrap();
        assert!(matches!(
            svc.get(&user(100), id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::NotFound)
        ));
        assert!(matches!(
            svc.delete(&user(100), id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::NotFound)
        ));
        let page = svc.list(&user(100), None, PageWindow::new(0, 50)).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_list_pages_over_visible_rows_only() {
        let svc = service(ExposeType::Open).await;
        for i in 0..5 {
            svc.create(&user(1), draft(&format!("pub {i}"), Visibility::Public, vec![]))
                .await
                .unwrap();
        }
        svc.create(&user(1), draft("hidden", Visibility::Private, vec![]))
            .await
            .unwrap();

        let first = svc.list(&Identity::Anonymous, None, PageWindow::new(0, 2)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 5);
        assert_eq!(first.next, Some(1));
        assert_eq!(first.previous, None);

        let last = svc.list(&Identity::Anonymous, None, PageWindow::new(2, 2)).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.next, None);
        assert!(!last.has_more);

        let owner = svc.list(&user(1), Some(" hidden "), PageWindow::new(0, 50)).await.unwrap();
        assert_eq!(owner.total, 1);
    }

    #[tokio::test]
    async fn test_closed_site_hides_everything_from_anonymous() {
        let svc = service(ExposeType::Close).await;
        let id = svc
            .create(&user(1), draft("pub", Visibility::Public, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        let page = svc.list(&Identity::Anonymous, None, PageWindow::new(0, 50)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(matches!(
            svc.get(&Identity::Anonymous, id).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Unauthenticated)
        ));
        assert!(svc.get(&user(2), id).await.is_ok());
    }

    fn retitle(title: &str) -> UpdateKnowledge {
        UpdateKnowledge {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_each_history_holds_the_version_it_replaced() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("v1", Visibility::Public, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        svc.update(&user(100), id, retitle("v2")).await.unwrap();
        svc.update(&user(100), id, retitle("v3")).await.unwrap();

        let page = svc.histories(&user(100), id, PageWindow::new(0, 20)).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["v2", "v1"]);
        assert_eq!(svc.history(&user(100), id, 1).await.unwrap().title, "v1");
    }

    #[tokio::test]
    async fn test_concurrent_updates_snapshot_distinct_versions() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("v1", Visibility::Public, vec![7]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        let creator = user(100);
        let editor = user(7);
        let (a, b) = tokio::join!(
            svc.update(&creator, id, retitle("from creator")),
            svc.update(&editor, id, retitle("from editor")),
        );
        a.unwrap();
        b.unwrap();

        let current = svc.get(&user(100), id).await.unwrap().knowledge.title;
        let page = svc.histories(&user(100), id, PageWindow::new(0, 20)).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|h| h.title.clone()).collect();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[1], "v1");
        assert_ne!(titles[0], "v1");
        assert_ne!(titles[0], current);
    }

    #[tokio::test]
    async fn test_update_of_deleted_article_is_not_found() {
        let db = DBService::new_in_memory().await.unwrap();
        let resolver = AccessControlResolver::new(ExposeType::Open);
        let svc = KnowledgeService::new(db.pool.clone(), resolver);
        let id = svc
            .create(&user(100), draft("v1", Visibility::Public, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;
        Knowledge::soft_delete(&db.pool, id, 100, Utc::now()).await.unwrap();

        let err = svc.update(&user(100), id, retitle("v2")).await.unwrap_err();
        assert!(matches!(err, KnowledgeServiceError::Access(AccessError::NotFound)));
        let count = KnowledgeHistory::count_by_knowledge_id(&db.pool, id).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_single_history_follows_view_rule() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("draft", Visibility::Private, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;
        svc.update(&user(100), id, retitle("final")).await.unwrap();

        assert_eq!(svc.history(&user(100), id, 1).await.unwrap().title, "draft");
        assert!(matches!(
            svc.history(&user(100), id, 2).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::NotFound)
        ));
        assert!(matches!(
            svc.history(&user(5), id, 1).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Forbidden)
        ));
        assert!(matches!(
            svc.history(&Identity::Anonymous, id, 1).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_list_by_user_only_returns_visible_articles_of_that_user() {
        let svc = service(ExposeType::Open).await;
        svc.create(&user(1), draft("one public", Visibility::Public, vec![]))
            .await
            .unwrap();
        svc.create(&user(1), draft("one private", Visibility::Private, vec![]))
            .await
            .unwrap();
        svc.create(&user(2), draft("two public", Visibility::Public, vec![]))
            .await
            .unwrap();

        let seen_by_other = svc.list_by_user(&user(2), 1, PageWindow::new(0, 50)).await.unwrap();
        let titles: Vec<_> = seen_by_other.items.iter().map(|k| k.title.as_str()).collect();
        assert_eq!(titles, vec!["one public"]);
        assert_eq!(seen_by_other.total, 1);

        let seen_by_self = svc.list_by_user(&user(1), 1, PageWindow::new(0, 50)).await.unwrap();
        assert_eq!(seen_by_self.total, 2);
        let nobody = svc.list_by_user(&user(1), 3, PageWindow::new(0, 50)).await.unwrap();
        assert!(nobody.items.is_empty());
    }

    #[tokio::test]
    async fn test_replace_editors_needs_edit_rights() {
        let svc = service(ExposeType::Open).await;
        let id = svc
            .create(&user(100), draft("team", Visibility::Protected, vec![]))
            .await
            .unwrap()
            .knowledge
            .knowledge_id;

        assert!(matches!(
            svc.replace_editors(&user(5), id, &[5]).await.unwrap_err(),
            KnowledgeServiceError::Access(AccessError::Forbidden)
        ));
        assert_eq!(svc.replace_editors(&user(100), id, &[8, 5]).await.unwrap(), vec![5, 8]);
        assert_eq!(svc.editors(&user(9), id).await.unwrap(), vec![5, 8]);
        assert!(svc.get(&user(5), id).await.unwrap().editable);
    }
}
