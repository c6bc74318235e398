use std::sync::Arc;

use db::DBService;
use services::services::{
    access_control::AccessControlResolver, comment::CommentService, config::Config,
    knowledge::KnowledgeService, like::LikeService, stock::StockService, tag::TagService,
};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    resolver: AccessControlResolver,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        Self {
            db,
            resolver: AccessControlResolver::new(config.expose_type),
            config: Arc::new(config),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &AccessControlResolver {
        &self.resolver
    }

    pub fn knowledge(&self) -> KnowledgeService {
        KnowledgeService::new(self.db.pool.clone(), self.resolver)
    }

    pub fn comments(&self) -> CommentService {
        CommentService::new(self.db.pool.clone(), self.resolver)
    }

    pub fn likes(&self) -> LikeService {
        LikeService::new(self.db.pool.clone(), self.resolver)
    }

    pub fn tags(&self) -> TagService {
        TagService::new(self.db.pool.clone(), self.resolver)
    }

    pub fn stocks(&self) -> StockService {
        StockService::new(self.db.pool.clone(), self.resolver)
    }
}
