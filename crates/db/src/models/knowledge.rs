use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::pagination::PageWindow;

/// Access tier stored in `knowledges.public_flag`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    /// Anyone, including anonymous visitors
    #[default]
    Public,
    /// Creator and explicit editors only
    Private,
    /// Any signed-in user
    Protected,
}

impl Visibility {
    pub const fn code(self) -> i64 {
        match self {
            Visibility::Public => 1,
            Visibility::Private => 2,
            Visibility::Protected => 3,
        }
    }

    /// Decode a stored `public_flag`. The legacy `0` and any unknown code are private.
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Visibility::Public,
            3 => Visibility::Protected,
            _ => Visibility::Private,
        }
    }
}

/// The viewer as bound into [`VISIBLE_TO_VIEWER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerScope {
    pub user_id: Option<i64>,
    /// Whether anonymous viewers may see public rows at all.
    pub anonymous_public: bool,
}

/// Row-level visibility over `knowledges k`.
///
/// Binds `?1` = viewer user id (NULL when anonymous) and `?2` = anonymous_public.
/// Any other parameters in the enclosing query must start at `?3`.
pub const VISIBLE_TO_VIEWER: &str = r#"k.delete_flag = 0 AND (
        (k.public_flag = 1 AND (?1 IS NOT NULL OR ?2 = 1))
        OR (?1 IS NOT NULL AND (
            k.public_flag = 3
            OR k.insert_user = ?1
            OR EXISTS (
                SELECT 1 FROM knowledge_edit_users e
                WHERE e.knowledge_id = k.knowledge_id AND e.user_id = ?1
            )
        ))
    )"#;

pub(crate) const COLUMNS: &str = "knowledge_id, title, content, public_flag, type_id, \
     like_count, comment_count, view_count, point, insert_user, insert_datetime, \
     update_user, update_datetime, delete_flag";

pub(crate) const K_COLUMNS: &str = "k.knowledge_id, k.title, k.content, k.public_flag, k.type_id, \
     k.like_count, k.comment_count, k.view_count, k.point, k.insert_user, k.insert_datetime, \
     k.update_user, k.update_datetime, k.delete_flag";

#[derive(Debug, Clone, Serialize, TS)]
pub struct Knowledge {
    pub knowledge_id: i64,
    pub title: String,
    pub content: String,
    pub visibility: Visibility,
    pub type_id: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub point: i64,
    pub creator_id: i64, // insert_user, immutable
    pub insert_datetime: DateTime<Utc>,
    pub update_user: i64,
    pub update_datetime: DateTime<Utc>,
    #[serde(skip)]
    pub deleted: bool,
}

impl<'r> FromRow<'r, SqliteRow> for Knowledge {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            knowledge_id: row.try_get("knowledge_id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            visibility: Visibility::from_code(row.try_get("public_flag")?),
            type_id: row.try_get("type_id")?,
            like_count: row.try_get("like_count")?,
            comment_count: row.try_get("comment_count")?,
            view_count: row.try_get("view_count")?,
            point: row.try_get("point")?,
            creator_id: row.try_get("insert_user")?,
            insert_datetime: row.try_get("insert_datetime")?,
            update_user: row.try_get("update_user")?,
            update_datetime: row.try_get("update_datetime")?,
            deleted: row.try_get::<i64, _>("delete_flag")? != 0,
        })
    }
}

/// Narrowing applied on top of [`VISIBLE_TO_VIEWER`]. Binds `?3` and `?4`.
const FILTER_CLAUSE: &str = r#"(
        ?3 IS NULL
        OR k.title LIKE ?3 ESCAPE '\'
        OR k.content LIKE ?3 ESCAPE '\'
    )
    AND (?4 IS NULL OR k.insert_user = ?4)"#;

/// `%keyword%` with the LIKE wildcards in `keyword` matched literally.
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Optional narrowing of a visible-knowledge listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnowledgeFilter<'a> {
    /// Substring of the title or content.
    pub keyword: Option<&'a str>,
    /// Only articles created by this user.
    pub creator_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateKnowledge {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub type_id: Option<i64>,
    #[serde(default)]
    pub editors: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateKnowledge {
    pub title: Option<String>,
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
    pub editors: Option<Vec<i64>>,
    pub tags: Option<Vec<String>>,
}

impl Knowledge {
    /// Includes soft-deleted rows; callers decide what deletion means for them.
    pub async fn find_by_id<'e, E>(
        executor: E,
        knowledge_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Knowledge>(&format!(
            "SELECT {COLUMNS} FROM knowledges WHERE knowledge_id = ?1"
        ))
        .bind(knowledge_id)
        .fetch_optional(executor)
        .await
    }

    /// Rows visible to `scope` and matching `filter`, newest update first.
    pub async fn find_visible(
        pool: &SqlitePool,
        scope: ViewerScope,
        filter: KnowledgeFilter<'_>,
        window: PageWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Knowledge>(&format!(
            r#"SELECT {K_COLUMNS}
               FROM knowledges k
               WHERE {VISIBLE_TO_VIEWER} AND {FILTER_CLAUSE}
               ORDER BY k.update_datetime DESC, k.knowledge_id DESC
               LIMIT ?5 OFFSET ?6"#
        ))
        .bind(scope.user_id)
        .bind(scope.anonymous_public)
        .bind(filter.keyword.map(like_pattern))
        .bind(filter.creator_id)
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(pool)
        .await
    }

    pub async fn count_visible(
        pool: &SqlitePool,
        scope: ViewerScope,
        filter: KnowledgeFilter<'_>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(&format!(
            r#"SELECT COUNT(*)
               FROM knowledges k
               WHERE {VISIBLE_TO_VIEWER} AND {FILTER_CLAUSE}"#
        ))
        .bind(scope.user_id)
        .bind(scope.anonymous_public)
        .bind(filter.keyword.map(like_pattern))
        .bind(filter.creator_id)
        .fetch_one(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateKnowledge,
        creator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Knowledge>(&format!(
            r#"INSERT INTO knowledges
                   (title, content, public_flag, type_id,
                    insert_user, insert_datetime, update_user, update_datetime)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?6)
               RETURNING {COLUMNS}"#
        ))
        .bind(&data.title)
        .bind(&data.content)
        .bind(data.visibility.code())
        .bind(data.type_id.unwrap_or(1))
        .bind(creator_id)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Overwrites the editable fields of a live row. `None` when the row is
    /// missing or already deleted.
    pub async fn update<'e, E>(
        executor: E,
        knowledge_id: i64,
        title: &str,
        content: &str,
        visibility: Visibility,
        update_user: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Knowledge>(&format!(
            r#"UPDATE knowledges
               SET title = ?2, content = ?3, public_flag = ?4,
                   update_user = ?5, update_datetime = ?6
               WHERE knowledge_id = ?1 AND delete_flag = 0
               RETURNING {COLUMNS}"#
        ))
        .bind(knowledge_id)
        .bind(title)
        .bind(content)
        .bind(visibility.code())
        .bind(update_user)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Marks the row deleted. There is no way back.
    pub async fn soft_delete(
        pool: &SqlitePool,
        knowledge_id: i64,
        update_user: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE knowledges
               SET delete_flag = 1, update_user = ?2, update_datetime = ?3
               WHERE knowledge_id = ?1 AND delete_flag = 0"#,
        )
        .bind(knowledge_id)
        .bind(update_user)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn increment_view_count(
        pool: &SqlitePool,
        knowledge_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE knowledges SET view_count = view_count + 1 WHERE knowledge_id = ?1")
            .bind(knowledge_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Recompute `like_count` from the likes table and return it.
    pub async fn refresh_like_count<'e, E>(
        executor: E,
        knowledge_id: i64,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE knowledges
               SET like_count = (SELECT COUNT(*) FROM likes WHERE knowledge_id = ?1)
               WHERE knowledge_id = ?1
               RETURNING like_count"#,
        )
        .bind(knowledge_id)
        .fetch_one(executor)
        .await
    }

    /// Recompute `comment_count` from live comments and return it.
    pub async fn refresh_comment_count(
        pool: &SqlitePool,
        knowledge_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"UPDATE knowledges
               SET comment_count = (
                   SELECT COUNT(*) FROM comments WHERE knowledge_id = ?1 AND delete_flag = 0
               )
               WHERE knowledge_id = ?1
               RETURNING comment_count"#,
        )
        .bind(knowledge_id)
        .fetch_one(pool)
        .await
    }
}
