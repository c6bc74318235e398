use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use utils::pagination::PageWindow;

#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct Like {
    pub no: i64,
    pub knowledge_id: i64,
    #[sqlx(rename = "insert_user")]
    pub user_id: i64,
    pub insert_datetime: DateTime<Utc>,
}

impl Like {
    /// Likes on one article, most recent first.
    pub async fn find_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Like>(
            r#"SELECT no, knowledge_id, insert_user, insert_datetime
               FROM likes
               WHERE knowledge_id = ?1
               ORDER BY insert_datetime DESC, no DESC
               LIMIT ?2 OFFSET ?3"#,
        )
        .bind(knowledge_id)
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE knowledge_id = ?1")
            .bind(knowledge_id)
            .fetch_one(pool)
            .await
    }

    /// Idempotent: a second like by the same user is ignored.
    pub async fn create<'e, E>(
        executor: E,
        knowledge_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"INSERT OR IGNORE INTO likes (knowledge_id, insert_user, insert_datetime)
               VALUES (?1, ?2, ?3)"#,
        )
        .bind(knowledge_id)
        .bind(user_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Number of rows removed; 0 when the user had not liked the article.
    pub async fn delete<'e, E>(
        executor: E,
        knowledge_id: i64,
        user_id: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM likes WHERE knowledge_id = ?1 AND insert_user = ?2")
            .bind(knowledge_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
