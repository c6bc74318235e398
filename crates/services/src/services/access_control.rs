//! Who may see and who may change a knowledge article.
//!
//! The resolver is pure and total: it never touches storage and never fails.
//! Callers fetch the article and its editor set first, then ask. The same
//! viewing rule exists in SQL form as [`db::models::knowledge::VISIBLE_TO_VIEWER`];
//! [`AccessControlResolver::storage_scope`] produces its bind values.

use std::collections::{HashMap, HashSet};

use db::models::{
    comment::Comment,
    knowledge::{Knowledge, ViewerScope, Visibility},
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

use super::config::ExposeType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// The requesting actor, as established by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { user_id: i64, role: Role },
}

impl Identity {
    /// Non-positive ids are not usable identities and collapse to `Anonymous`.
    pub fn authenticated(user_id: i64, role: Role) -> Self {
        if user_id > 0 {
            Identity::Authenticated { user_id, role }
        } else {
            Identity::Anonymous
        }
    }

    /// Build an identity from raw session values. A missing or unparsable user id
    /// yields `Anonymous`; an unknown role degrades to `User`.
    pub fn from_session(user_id: Option<&str>, role: Option<&str>) -> Self {
        let Some(user_id) = user_id.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
            return Identity::Anonymous;
        };
        let role = role
            .and_then(|raw| raw.trim().parse::<Role>().ok())
            .unwrap_or_default();
        Identity::authenticated(user_id, role)
    }

    /// The acting user, if any. An `Authenticated` value built by hand with a
    /// non-positive id has no user.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::Authenticated { user_id, .. } if *user_id > 0 => Some(*user_id),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id().is_some()
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Identity::Authenticated { role, .. } => {
                self.is_authenticated() && *role == Role::Admin
            }
            Identity::Anonymous => false,
        }
    }
}

/// Anything whose access is decided like an article's.
pub trait AccessTarget {
    fn target_id(&self) -> i64;
    fn creator_id(&self) -> i64;
    fn visibility(&self) -> Visibility;
    fn is_deleted(&self) -> bool;
}

impl AccessTarget for Knowledge {
    fn target_id(&self) -> i64 {
        self.knowledge_id
    }

    fn creator_id(&self) -> i64 {
        self.creator_id
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// User ids with co-editing rights on one article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSet(HashSet<i64>);

impl EditorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.0.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids in ascending order.
    pub fn to_sorted_vec(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.0.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<i64> for EditorSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<i64>> for EditorSet {
    fn from(ids: Vec<i64>) -> Self {
        ids.into_iter().collect()
    }
}

/// Editor sets for a batch of articles, keyed by article id.
#[derive(Debug, Clone, Default)]
pub struct EditorIndex {
    by_target: HashMap<i64, EditorSet>,
    empty: EditorSet,
}

impl EditorIndex {
    /// Articles missing from the index have no editors.
    pub fn get(&self, target_id: i64) -> &EditorSet {
        self.by_target.get(&target_id).unwrap_or(&self.empty)
    }
}

impl From<HashMap<i64, Vec<i64>>> for EditorIndex {
    fn from(grouped: HashMap<i64, Vec<i64>>) -> Self {
        Self {
            by_target: grouped
                .into_iter()
                .map(|(id, users)| (id, EditorSet::from(users)))
                .collect(),
            empty: EditorSet::new(),
        }
    }
}

/// Why a request was refused. Maps directly onto 401 / 403 / 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("access denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
}

impl AccessError {
    /// The refusal appropriate for `identity`: anonymous callers are asked to sign in.
    pub fn denied(identity: &Identity) -> Self {
        if identity.is_authenticated() {
            AccessError::Forbidden
        } else {
            AccessError::Unauthenticated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessControlResolver {
    expose: ExposeType,
}

impl AccessControlResolver {
    pub const fn new(expose: ExposeType) -> Self {
        Self { expose }
    }

    pub fn expose_type(&self) -> ExposeType {
        self.expose
    }

    pub fn can_view<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: &A,
        editors: &EditorSet,
    ) -> bool {
        if target.is_deleted() {
            return false;
        }
        match identity.user_id() {
            None => self.expose == ExposeType::Open && target.visibility() == Visibility::Public,
            Some(user_id) => match target.visibility() {
                Visibility::Public | Visibility::Protected => true,
                Visibility::Private => user_id == target.creator_id() || editors.contains(user_id),
            },
        }
    }

    /// Creator or listed editor, whatever the visibility. Deleted articles are not editable.
    pub fn can_edit<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: &A,
        editors: &EditorSet,
    ) -> bool {
        if target.is_deleted() {
            return false;
        }
        match identity.user_id() {
            Some(user_id) => user_id == target.creator_id() || editors.contains(user_id),
            None => false,
        }
    }

    pub fn can_delete<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: &A,
        editors: &EditorSet,
    ) -> bool {
        self.can_edit(identity, target, editors)
    }

    /// `can_view` for a fixed identity, for filtering candidate lists in memory.
    pub fn filter_predicate<'a, A: AccessTarget>(
        &'a self,
        identity: &'a Identity,
        editors: &'a EditorIndex,
    ) -> impl Fn(&A) -> bool {
        move |target| self.can_view(identity, target, editors.get(target.target_id()))
    }

    /// Bind values for the SQL form of `can_view`.
    pub fn storage_scope(&self, identity: &Identity) -> ViewerScope {
        ViewerScope {
            user_id: identity.user_id(),
            anonymous_public: self.expose == ExposeType::Open,
        }
    }

    pub fn can_administer(&self, identity: &Identity) -> bool {
        identity.is_admin()
    }

    pub fn can_edit_comment(&self, identity: &Identity, comment: &Comment) -> bool {
        !comment.deleted && identity.user_id() == Some(comment.author_id)
    }

    /// The comment's author, or the creator of the article it sits on.
    pub fn can_delete_comment<A: AccessTarget>(
        &self,
        identity: &Identity,
        comment: &Comment,
        article: &A,
    ) -> bool {
        if comment.deleted {
            return false;
        }
        match identity.user_id() {
            Some(user_id) => user_id == comment.author_id || user_id == article.creator_id(),
            None => false,
        }
    }

    /// Missing or deleted is `NotFound`; present but hidden is a denial.
    pub fn check_view<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: Option<&A>,
        editors: &EditorSet,
    ) -> Result<(), AccessError> {
        match target {
            Some(target) if !target.is_deleted() => {
                if self.can_view(identity, target, editors) {
                    Ok(())
                } else {
                    Err(AccessError::denied(identity))
                }
            }
            _ => Err(AccessError::NotFound),
        }
    }

    pub fn check_edit<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: Option<&A>,
        editors: &EditorSet,
    ) -> Result<(), AccessError> {
        match target {
            Some(target) if !target.is_deleted() => {
                if self.can_edit(identity, target, editors) {
                    Ok(())
                } else {
                    Err(AccessError::denied(identity))
                }
            }
            _ => Err(AccessError::NotFound),
        }
    }

    pub fn check_delete<A: AccessTarget>(
        &self,
        identity: &Identity,
        target: Option<&A>,
        editors: &EditorSet,
    ) -> Result<(), AccessError> {
        self.check_edit(identity, target, editors)
    }
}
