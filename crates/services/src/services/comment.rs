//! Comments on articles. Reading follows the parent article's visibility.

use chrono::{DateTime, Utc};
use db::models::{
    comment::{Comment, CreateComment, UpdateComment},
    knowledge::Knowledge,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::pagination::{Page, PageWindow};

use super::{
    access_control::{AccessControlResolver, AccessError, Identity},
    knowledge::find_viewable,
};

#[derive(Debug, Error)]
pub enum CommentServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("comment must not be empty")]
    EmptyComment,
}

/// A comment as shown to one viewer. Anonymous comments hide their author
/// from everyone but the author.
#[derive(Debug, Clone, Serialize, TS)]
pub struct CommentView {
    pub comment_no: i64,
    pub knowledge_id: i64,
    pub comment: String,
    pub anonymous: bool,
    pub author_id: Option<i64>,
    pub insert_datetime: DateTime<Utc>,
    pub update_datetime: DateTime<Utc>,
    pub editable: bool,
}

#[derive(Clone)]
pub struct CommentService {
    pool: SqlitePool,
    resolver: AccessControlResolver,
}

impl CommentService {
    pub fn new(pool: SqlitePool, resolver: AccessControlResolver) -> Self {
        Self { pool, resolver }
    }

    async fn viewable(
        &self,
        identity: &Identity,
        knowledge_id: i64,
    ) -> Result<Knowledge, CommentServiceError> {
        let (article, _) =
            find_viewable::<CommentServiceError>(&self.pool, &self.resolver, identity, knowledge_id)
                .await?;
        Ok(article)
    }

    fn view(&self, identity: &Identity, comment: Comment) -> CommentView {
        let own = identity.user_id() == Some(comment.author_id);
        CommentView {
            editable: self.resolver.can_edit_comment(identity, &comment),
            author_id: (!comment.anonymous || own).then_some(comment.author_id),
            comment_no: comment.comment_no,
            knowledge_id: comment.knowledge_id,
            comment: comment.comment,
            anonymous: comment.anonymous,
            insert_datetime: comment.insert_datetime,
            update_datetime: comment.update_datetime,
        }
    }

    /// Live comments, oldest first.
    pub async fn list(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        window: PageWindow,
    ) -> Result<Page<CommentView>, CommentServiceError> {
        self.viewable(identity, knowledge_id).await?;
        let rows = Comment::find_by_knowledge_id(&self.pool, knowledge_id, window).await?;
        let total = Comment::count_by_knowledge_id(&self.pool, knowledge_id).await?;
        let page = Page::new(rows, window, usize::try_from(total).unwrap_or(0));
        Ok(page.map(|c| self.view(identity, c)))
    }

    pub async fn create(
        &self,
        identity: &Identity,
        knowledge_id: i64,
        data: CreateComment,
    ) -> Result<CommentView, CommentServiceError> {
        let user_id = identity.user_id().ok_or(AccessError::Unauthenticated)?;
        self.viewable(identity, knowledge_id).await?;
        if data.comment.trim().is_empty() {
            return Err(CommentServiceError::EmptyComment);
        }

        let comment = Comment::create(&self.pool, knowledge_id, &data, user_id, Utc::now()).await?;
        let comment_count = Knowledge::refresh_comment_count(&self.pool, knowledge_id).await?;
        info!(
            knowledge_id,
            comment_no = comment.comment_no,
            user_id,
            comment_count,
            "Added comment"
        );
        Ok(self.view(identity, comment))
    }

    /// Only the comment's author may change its text.
    pub async fn update(
        &self,
        identity: &Identity,
        comment_no: i64,
        data: UpdateComment,
    ) -> Result<CommentView, CommentServiceError> {
        let comment = self.find_live(comment_no).await?;
        self.viewable(identity, comment.knowledge_id).await?;
        if !self.resolver.can_edit_comment(identity, &comment) {
            return Err(AccessError::denied(identity).into());
        }
        if data.comment.trim().is_empty() {
            return Err(CommentServiceError::EmptyComment);
        }

        let updated = Comment::update(&self.pool, comment_no, &data.comment, Utc::now()).await?;
        info!(comment_no, knowledge_id = updated.knowledge_id, "Updated comment");
        Ok(self.view(identity, updated))
    }

    /// Allowed for the comment's author and for the article's creator.
    pub async fn delete(
        &self,
        identity: &Identity,
        comment_no: i64,
    ) -> Result<(), CommentServiceError> {
        let comment = self.find_live(comment_no).await?;
        let article = self.viewable(identity, comment.knowledge_id).await?;
        if !self.resolver.can_delete_comment(identity, &comment, &article) {
            return Err(AccessError::denied(identity).into());
        }

        Comment::soft_delete(&self.pool, comment_no, Utc::now()).await?;
        let comment_count =
            Knowledge::refresh_comment_count(&self.pool, comment.knowledge_id).await?;
        info!(
            comment_no,
            knowledge_id = comment.knowledge_id,
            comment_count,
            "Deleted comment"
        );
        Ok(())
    }

    async fn find_live(&self, comment_no: i64) -> Result<Comment, CommentServiceError> {
        match Comment::find_by_no(&self.pool, comment_no).await? {
            Some(comment) if !comment.deleted => Ok(comment),
            _ => Err(AccessError::NotFound.into()),
        }
    }
}
