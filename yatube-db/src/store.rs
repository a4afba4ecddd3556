//! The typed queries the web layer runs against storage.
//!
//! Both implementations enforce the same integrity rules at the storage
//! layer. Most importantly a second [`Follow`] with an identical
//! `(user, author)` pair fails with [`DbError::UniqueViolation`].

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use yatube_common::{
    model::{
        Id, ModelValidationError,
        auth::{Authentication, TokenDigest},
        comment::Comment,
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{Post, PostContent, PostFilter, PostMarker, PostText},
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    snowflake::SnowflakeTimestampFromDateTimeError,
    util::PositiveDuration,
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Unique constraint {constraint} was violated")]
    UniqueViolation { constraint: String },
    #[error("Foreign key {constraint} points to a missing row")]
    MissingReference { constraint: String },
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimestampFromDateTimeError),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    #[must_use]
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == name)
    }
}

#[async_trait]
pub trait Store: Send + Sync + Debug {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn create_auth(
        &self,
        user_id: Id<UserMarker>,
        digest: &TokenDigest,
        expires_after: Option<PositiveDuration>,
    ) -> Result<()>;

    async fn fetch_auth(&self, digest: &TokenDigest) -> Result<Option<Authentication>>;

    /// All groups, ordered by title.
    async fn fetch_groups(&self) -> Result<Vec<Group>>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn count_posts(&self, filter: PostFilter) -> Result<usize>;

    /// A window of the posts matching `filter`, newest first.
    async fn fetch_posts(&self, filter: PostFilter, offset: usize, limit: usize)
    -> Result<Vec<Post>>;

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post>;

    /// Replaces text, group and image. `None` if the post does not exist.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    /// Deletes the post and its comments. `false` if it did not exist.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    /// Comments on a post, oldest first.
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &PostText,
    ) -> Result<Comment>;

    async fn create_follow(&self, follow: Follow) -> Result<()>;

    /// `false` if there was nothing to delete.
    async fn delete_follow(&self, follow: Follow) -> Result<bool>;

    async fn is_following(&self, follow: Follow) -> Result<bool>;
}
