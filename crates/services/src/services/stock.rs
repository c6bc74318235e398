//! Per-user bookmark folders.
//!
//! Saved articles can later become hidden or deleted, so the saved list is
//! filtered in memory with the resolver's predicate before it is paged.

use chrono::Utc;
use db::models::{
    knowledge::Knowledge,
    knowledge_editor::KnowledgeEditor,
    stock::{CreateStock, Stock},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use utils::pagination::{Page, PageWindow};

use super::{
    access_control::{AccessControlResolver, AccessError, EditorIndex, Identity},
    knowledge::find_viewable,
};

#[derive(Debug, Error)]
pub enum StockServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("folder name must not be empty")]
    EmptyName,
}

#[derive(Clone)]
pub struct StockService {
    pool: SqlitePool,
    resolver: AccessControlResolver,
}

impl StockService {
    pub fn new(pool: SqlitePool, resolver: AccessControlResolver) -> Self {
        Self { pool, resolver }
    }

    pub async fn list_folders(&self, identity: &Identity) -> Result<Vec<Stock>, StockServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        Ok(Stock::find_by_user(&self.pool, user_id).await?)
    }

    pub async fn create_folder(
        &self,
        identity: &Identity,
        data: CreateStock,
    ) -> Result<Stock, StockServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        if data.stock_name.trim().is_empty() {
            return Err(StockServiceError::EmptyName);
        }
        let stock = Stock::create(&self.pool, &data, user_id, Utc::now()).await?;
        info!(stock_id = stock.stock_id, user_id, "Created stock folder");
        Ok(stock)
    }

    /// Someone else's folder is reported as missing.
    async fn owned_folder(&self, user_id: i64, stock_id: i64) -> Result<Stock, StockServiceError> {
        match Stock::find_by_id(&self.pool, stock_id).await? {
            Some(stock) if stock.owner_id == user_id => Ok(stock),
            _ => Err(AccessError::NotFound.into()),
        }
    }

    pub async fn add_knowledge(
        &self,
        identity: &Identity,
        stock_id: i64,
        knowledge_id: i64,
    ) -> Result<(), StockServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        self.owned_folder(user_id, stock_id).await?;
        find_viewable::<StockServiceError>(&self.pool, &self.resolver, identity, knowledge_id)
            .await?;

        Stock::add_knowledge(&self.pool, stock_id, knowledge_id, user_id, Utc::now()).await?;
        info!(stock_id, knowledge_id, user_id, "Stocked knowledge");
        Ok(())
    }

    /// Saved articles the caller can still see, newest save first.
    pub async fn list_knowledges(
        &self,
        identity: &Identity,
        stock_id: Option<i64>,
        window: PageWindow,
    ) -> Result<Page<Knowledge>, StockServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        if let Some(stock_id) = stock_id {
            self.owned_folder(user_id, stock_id).await?;
        }

        let candidates = Stock::find_stocked_knowledges(&self.pool, user_id, stock_id).await?;
        let ids: Vec<i64> = candidates.iter().map(|k| k.knowledge_id).collect();
        let editors = EditorIndex::from(KnowledgeEditor::find_for_many(&self.pool, &ids).await?);

        let visible = self.resolver.filter_predicate(identity, &editors);
        let kept: Vec<Knowledge> = candidates.into_iter().filter(|k| visible(k)).collect();
        debug!(
            user_id,
            candidates = ids.len(),
            visible = kept.len(),
            "Filtered stocked knowledge"
        );
        Ok(Page::from_slice(&kept, window))
    }
}
