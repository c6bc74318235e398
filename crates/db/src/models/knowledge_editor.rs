use std::collections::HashMap;

use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool, Transaction};

/// Explicit per-article edit grants (`knowledge_edit_users`).
pub struct KnowledgeEditor;

impl KnowledgeEditor {
    pub async fn find_user_ids<'e, E>(
        executor: E,
        knowledge_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM knowledge_edit_users WHERE knowledge_id = ?1 ORDER BY user_id",
        )
        .bind(knowledge_id)
        .fetch_all(executor)
        .await
    }

    /// Editor ids grouped by article, for every id in `knowledge_ids`.
    /// Articles without editors are absent from the map.
    pub async fn find_for_many(
        pool: &SqlitePool,
        knowledge_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<i64>>, sqlx::Error> {
        let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
        if knowledge_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT knowledge_id, user_id FROM knowledge_edit_users WHERE knowledge_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in knowledge_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, i64)> = builder.build_query_as().fetch_all(pool).await?;
        for (knowledge_id, user_id) in rows {
            grouped.entry(knowledge_id).or_default().push(user_id);
        }
        Ok(grouped)
    }

    /// Replace the whole editor list for one article. Non-positive ids are dropped.
    pub async fn replace(
        tx: &mut Transaction<'_, Sqlite>,
        knowledge_id: i64,
        user_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM knowledge_edit_users WHERE knowledge_id = ?1")
            .bind(knowledge_id)
            .execute(&mut **tx)
            .await?;

        for user_id in user_ids.iter().filter(|id| **id > 0) {
            sqlx::query(
                r#"INSERT OR IGNORE INTO knowledge_edit_users (knowledge_id, user_id)
                   VALUES (?1, ?2)"#,
            )
            .bind(knowledge_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_replace_overwrites_and_dedupes() {
        let db = DBService::new_in_memory().await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        KnowledgeEditor::replace(&mut tx, 1, &[5, 3, 5, 0, -2]).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(KnowledgeEditor::find_user_ids(&db.pool, 1).await.unwrap(), vec![3, 5]);

        let mut tx = db.pool.begin().await.unwrap();
        KnowledgeEditor::replace(&mut tx, 1, &[9]).await.unwrap();
        KnowledgeEditor::replace(&mut tx, 2, &[3]).await.unwrap();
        tx.commit().await.unwrap();

        let grouped = KnowledgeEditor::find_for_many(&db.pool, &[1, 2, 7]).await.unwrap();
        assert_eq!(grouped.get(&1), Some(&vec![9]));
        assert_eq!(grouped.get(&2), Some(&vec![3]));
        assert!(!grouped.contains_key(&7));
        assert!(KnowledgeEditor::find_for_many(&db.pool, &[]).await.unwrap().is_empty());
    }
}
