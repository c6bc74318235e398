use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

use super::knowledge::{K_COLUMNS, Knowledge};

/// A user's named folder of saved articles.
#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct Stock {
    pub stock_id: i64,
    pub stock_name: String,
    pub description: Option<String>,
    #[sqlx(rename = "insert_user")]
    pub owner_id: i64,
    pub insert_datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateStock {
    pub stock_name: String,
    pub description: Option<String>,
}

impl Stock {
    pub async fn find_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Stock>(
            r#"SELECT stock_id, stock_name, description, insert_user, insert_datetime
               FROM stocks
               WHERE insert_user = ?1 AND delete_flag = 0
               ORDER BY stock_id ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        stock_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Stock>(
            r#"SELECT stock_id, stock_name, description, insert_user, insert_datetime
               FROM stocks
               WHERE stock_id = ?1 AND delete_flag = 0"#,
        )
        .bind(stock_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateStock,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Stock>(
            r#"INSERT INTO stocks (stock_name, description, insert_user, insert_datetime)
               VALUES (?1, ?2, ?3, ?4)
               RETURNING stock_id, stock_name, description, insert_user, insert_datetime"#,
        )
        .bind(data.stock_name.trim())
        .bind(&data.description)
        .bind(owner_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Saving the same article twice into one folder is a no-op.
    pub async fn add_knowledge(
        pool: &SqlitePool,
        stock_id: i64,
        knowledge_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO stock_knowledges
                   (stock_id, knowledge_id, insert_user, insert_datetime)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(stock_id)
        .bind(knowledge_id)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Every article the user saved (optionally in one folder), newest save first,
    /// one row per article. No visibility filtering is applied here: deleted and
    /// no-longer-visible articles are included and must be filtered by the caller.
    pub async fn find_stocked_knowledges(
        pool: &SqlitePool,
        user_id: i64,
        stock_id: Option<i64>,
    ) -> Result<Vec<Knowledge>, sqlx::Error> {
        sqlx::query_as::<_, Knowledge>(&format!(
            r#"SELECT {K_COLUMNS}
               FROM knowledges k
               JOIN (
                   SELECT sk.knowledge_id, MAX(sk.insert_datetime) AS stocked_at
                   FROM stock_knowledges sk
                   JOIN stocks s ON s.stock_id = sk.stock_id
                   WHERE s.insert_user = ?1 AND s.delete_flag = 0
                     AND (?2 IS NULL OR s.stock_id = ?2)
                   GROUP BY sk.knowledge_id
               ) saved ON saved.knowledge_id = k.knowledge_id
               ORDER BY saved.stocked_at DESC, k.knowledge_id DESC"#
        ))
        .bind(user_id)
        .bind(stock_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::knowledge::{CreateKnowledge, Visibility},
    };

    #[tokio::test]
    async fn test_stocked_knowledges_include_deleted_rows_for_caller_filtering() {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        let draft = CreateKnowledge {
            title: "saved".to_string(),
            content: String::new(),
            visibility: Visibility::Public,
            type_id: None,
            editors: vec![],
            tags: vec![],
        };
        let a = Knowledge::create(&db.pool, &draft, 2, now).await.unwrap();
        let b = Knowledge::create(&db.pool, &draft, 2, now).await.unwrap();
        Knowledge::soft_delete(&db.pool, b.knowledge_id, 2, now).await.unwrap();

        let folder = Stock::create(
            &db.pool,
            &CreateStock {
                stock_name: " reading ".to_string(),
                description: None,
            },
            5,
            now,
        )
        .await
        .unwrap();
        assert_eq!(folder.stock_name, "reading");

        Stock::add_knowledge(&db.pool, folder.stock_id, a.knowledge_id, 5, now).await.unwrap();
        Stock::add_knowledge(&db.pool, folder.stock_id, a.knowledge_id, 5, now).await.unwrap();
        let later = now + chrono::Duration::seconds(1);
        Stock::add_knowledge(&db.pool, folder.stock_id, b.knowledge_id, 5, later)
            .await
            .unwrap();

        let rows = Stock::find_stocked_knowledges(&db.pool, 5, None).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|k| k.knowledge_id).collect();
        assert_eq!(ids, vec![b.knowledge_id, a.knowledge_id]);
        assert!(rows[0].deleted);

        assert!(Stock::find_stocked_knowledges(&db.pool, 6, None).await.unwrap().is_empty());
        assert_eq!(Stock::find_by_user(&db.pool, 5).await.unwrap().len(), 1);
    }
}
