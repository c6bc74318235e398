use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use utils::pagination::PageWindow;

#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct Comment {
    pub comment_no: i64,
    pub knowledge_id: i64,
    pub comment: String,
    pub anonymous: bool,
    #[sqlx(rename = "insert_user")]
    pub author_id: i64,
    pub insert_datetime: DateTime<Utc>,
    pub update_datetime: DateTime<Utc>,
    #[sqlx(rename = "delete_flag")]
    #[serde(skip)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateComment {
    pub comment: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateComment {
    pub comment: String,
}

const COLUMNS: &str = "comment_no, knowledge_id, comment, anonymous, insert_user, \
     insert_datetime, update_datetime, delete_flag";

impl Comment {
    pub async fn find_by_no(
        pool: &SqlitePool,
        comment_no: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COLUMNS} FROM comments WHERE comment_no = ?1"
        ))
        .bind(comment_no)
        .fetch_optional(pool)
        .await
    }

    /// Live comments on one article, oldest first.
    pub async fn find_by_knowledge_id(
        pool: &SqlitePool,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"SELECT {COLUMNS} FROM comments
               WHERE knowledge_id = ?1 AND delete_flag = 0
               ORDER BY insert_datetime ASC, comment_no ASC
               LIMIT ?2 OFFSET ?3"#
        ))
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
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE knowledge_id = ?1 AND delete_flag = 0",
        )
        .bind(knowledge_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        knowledge_id: i64,
        data: &CreateComment,
        author_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"INSERT INTO comments
                   (knowledge_id, comment, anonymous, insert_user, insert_datetime, update_datetime)
               VALUES (?1, ?2, ?3, ?4, ?5, ?5)
               RETURNING {COLUMNS}"#
        ))
        .bind(knowledge_id)
        .bind(&data.comment)
        .bind(data.anonymous)
        .bind(author_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        comment_no: i64,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"UPDATE comments SET comment = ?2, update_datetime = ?3
               WHERE comment_no = ?1
               RETURNING {COLUMNS}"#
        ))
        .bind(comment_no)
        .bind(comment)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn soft_delete(
        pool: &SqlitePool,
        comment_no: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE comments SET delete_flag = 1, update_datetime = ?2
               WHERE comment_no = ?1 AND delete_flag = 0"#,
        )
        .bind(comment_no)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
