use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Row, Sqlite, SqlitePool, Transaction, sqlite::SqliteRow};
use ts_rs::TS;
use utils::pagination::PageWindow;

use super::knowledge::Visibility;

const HISTORY_COLUMNS: &str =
    "knowledge_id, history_no, title, content, public_flag, update_user, update_datetime";

/// Snapshot of an article as it was before an update.
#[derive(Debug, Clone, Serialize, TS)]
pub struct KnowledgeHistory {
    pub knowledge_id: i64,
    pub history_no: i64,
    pub title: String,
    pub content: String,
    pub visibility: Visibility,
    pub update_user: i64,
    pub update_datetime: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for KnowledgeHistory {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            knowledge_id: row.try_get("knowledge_id")?,
            history_no: row.try_get("history_no")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            visibility: Visibility::from_code(row.try_get("public_flag")?),
            update_user: row.try_get("update_user")?,
            update_datetime: row.try_get("update_datetime")?,
        })
    }
}

impl KnowledgeHistory {
    /// Copy the stored row into the next history entry, numbered from 1 per article.
    ///
    /// Reads and writes in one statement so the snapshot is whatever the row holds
    /// inside `tx`. Returns `None` when the article is missing or deleted.
    pub async fn snapshot_current(
        tx: &mut Transaction<'_, Sqlite>,
        knowledge_id: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO knowledge_histories
                   (knowledge_id, history_no, title, content, public_flag,
                    update_user, update_datetime)
               SELECT k.knowledge_id,
                      (SELECT COALESCE(MAX(h.history_no), 0) + 1
                       FROM knowledge_histories h
                       WHERE h.knowledge_id = k.knowledge_id),
                      k.title, k.content, k.public_flag, k.update_user, k.update_datetime
               FROM knowledges k
               WHERE k.knowledge_id = ?1 AND k.delete_flag = 0
               RETURNING history_no"#,
        )
        .bind(knowledge_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Newest snapshot first.
    pub async fn find_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, KnowledgeHistory>(&format!(
            r#"SELECT {HISTORY_COLUMNS}
               FROM knowledge_histories
               WHERE knowledge_id = ?1
               ORDER BY history_no DESC
               LIMIT ?2 OFFSET ?3"#
        ))
        .bind(knowledge_id)
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(pool)
        .await
    }

    pub async fn find_one(
        pool: &SqlitePool,
        knowledge_id: i64,
        history_no: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, KnowledgeHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM knowledge_histories \
             WHERE knowledge_id = ?1 AND history_no = ?2"
        ))
        .bind(knowledge_id)
        .bind(history_no)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM knowledge_histories WHERE knowledge_id = ?1",
        )
        .bind(knowledge_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::knowledge::{CreateKnowledge, Knowledge},
    };

    async fn article(db: &DBService, title: &str) -> Knowledge {
        let draft = CreateKnowledge {
            title: title.to_string(),
            content: String::new(),
            visibility: Visibility::Protected,
            type_id: None,
            editors: vec![],
            tags: vec![],
        };
        Knowledge::create(&db.pool, &draft, 1, Utc::now()).await.unwrap()
    }

    #[tokio::test]
    async fn test_snapshots_are_numbered_per_article() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = article(&db, "v1").await;
        let other = article(&db, "other").await;

        let mut tx = db.pool.begin().await.unwrap();
        let a = KnowledgeHistory::snapshot_current(&mut tx, first.knowledge_id).await.unwrap();
        let b = KnowledgeHistory::snapshot_current(&mut tx, first.knowledge_id).await.unwrap();
        let c = KnowledgeHistory::snapshot_current(&mut tx, other.knowledge_id).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!((a, b, c), (Some(1), Some(2), Some(1)));

        let rows = KnowledgeHistory::find_by_knowledge_id(
            &db.pool,
            first.knowledge_id,
            PageWindow::new(0, 20),
        )
        .await
        .unwrap();
        assert_eq!(rows.iter().map(|h| h.history_no).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(rows[0].visibility, Visibility::Protected);
        assert_eq!(rows[0].title, "v1");
        let count = KnowledgeHistory::count_by_knowledge_id(&db.pool, first.knowledge_id)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_snapshot_of_deleted_article_is_skipped() {
        let db = DBService::new_in_memory().await.unwrap();
        let gone = article(&db, "gone").await;
        Knowledge::soft_delete(&db.pool, gone.knowledge_id, 1, Utc::now()).await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        let missing = KnowledgeHistory::snapshot_current(&mut tx, 9999).await.unwrap();
        let deleted = KnowledgeHistory::snapshot_current(&mut tx, gone.knowledge_id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!((missing, deleted), (None, None));
        let count = KnowledgeHistory::count_by_knowledge_id(&db.pool, gone.knowledge_id)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_find_one_by_history_number() {
        let db = DBService::new_in_memory().await.unwrap();
        let k = article(&db, "first draft").await;
        let mut tx = db.pool.begin().await.unwrap();
        KnowledgeHistory::snapshot_current(&mut tx, k.knowledge_id).await.unwrap();
        tx.commit().await.unwrap();

        let found = KnowledgeHistory::find_one(&db.pool, k.knowledge_id, 1).await.unwrap();
        assert_eq!(found.map(|h| h.title), Some("first draft".to_string()));
        assert!(KnowledgeHistory::find_one(&db.pool, k.knowledge_id, 2).await.unwrap().is_none());
    }
}
