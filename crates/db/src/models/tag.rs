use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use ts_rs::TS;
use utils::pagination::PageWindow;

use super::knowledge::{VISIBLE_TO_VIEWER, ViewerScope};

#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct Tag {
    pub tag_id: i64,
    pub tag_name: String,
}

/// A tag together with how many articles carrying it the viewer may see.
#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct TagWithCount {
    pub tag_id: i64,
    pub tag_name: String,
    pub knowledge_count: i64,
}

impl Tag {
    /// Tags on at least one article visible to `scope`, most used first.
    pub async fn find_with_visible_count(
        pool: &SqlitePool,
        scope: ViewerScope,
        window: PageWindow,
    ) -> Result<Vec<TagWithCount>, sqlx::Error> {
        sqlx::query_as::<_, TagWithCount>(&format!(
            r#"SELECT t.tag_id, t.tag_name, COUNT(k.knowledge_id) AS knowledge_count
               FROM tags t
               JOIN knowledge_tags kt ON kt.tag_id = t.tag_id
               JOIN knowledges k ON k.knowledge_id = kt.knowledge_id
               WHERE t.delete_flag = 0 AND {VISIBLE_TO_VIEWER}
               GROUP BY t.tag_id, t.tag_name
               ORDER BY knowledge_count DESC, t.tag_name ASC
               LIMIT ?3 OFFSET ?4"#
        ))
        .bind(scope.user_id)
        .bind(scope.anonymous_public)
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(pool)
        .await
    }

    pub async fn count_with_visible(
        pool: &SqlitePool,
        scope: ViewerScope,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(&format!(
            r#"SELECT COUNT(DISTINCT t.tag_id)
               FROM tags t
               JOIN knowledge_tags kt ON kt.tag_id = t.tag_id
               JOIN knowledges k ON k.knowledge_id = kt.knowledge_id
               WHERE t.delete_flag = 0 AND {VISIBLE_TO_VIEWER}"#
        ))
        .bind(scope.user_id)
        .bind(scope.anonymous_public)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"SELECT t.tag_id, t.tag_name
               FROM tags t
               JOIN knowledge_tags kt ON kt.tag_id = t.tag_id
               WHERE kt.knowledge_id = ?1 AND t.delete_flag = 0
               ORDER BY t.tag_name ASC"#,
        )
        .bind(knowledge_id)
        .fetch_all(pool)
        .await
    }

    /// Replace the tags on one article, creating unknown tag names on the way.
    /// Names are trimmed; blanks and repeats are skipped.
    pub async fn set_for_knowledge(
        tx: &mut Transaction<'_, Sqlite>,
        knowledge_id: i64,
        names: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM knowledge_tags WHERE knowledge_id = ?1")
            .bind(knowledge_id)
            .execute(&mut **tx)
            .await?;

        let mut seen = std::collections::HashSet::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if !seen.insert(name) {
                continue;
            }
            sqlx::query("INSERT OR IGNORE INTO tags (tag_name) VALUES (?1)")
                .bind(name)
                .execute(&mut **tx)
                .await?;
            let tag_id: i64 = sqlx::query_scalar("SELECT tag_id FROM tags WHERE tag_name = ?1")
                .bind(name)
                .fetch_one(&mut **tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO knowledge_tags (knowledge_id, tag_id) VALUES (?1, ?2)",
            )
            .bind(knowledge_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
