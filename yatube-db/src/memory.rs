//! In-process [`Store`] for tests and database-less development runs.
//!
//! Mirrors the constraints of the SQL schema, including their names, so
//! callers see the same [`DbError`]s from either backend.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::UtcDateTime;
use yatube_common::{
    model::{
        Id, YatubeSnowflakeGenerator,
        auth::{Authentication, TokenDigest},
        comment::{Comment, CommentMarker},
        follow::{Follow, UNIQUE_FOLLOWS_CONSTRAINT},
        group::{CreateGroup, Group, GroupMarker, GroupSlug, UNIQUE_SLUG_CONSTRAINT},
        post::{Post, PostContent, PostFilter, PostMarker, PostText},
        user::{CreateUser, UNIQUE_HANDLE_CONSTRAINT, User, UserHandle, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
struct PostRow {
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    text: PostText,
    image: Option<String>,
    pub_date: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
struct CommentRow {
    id: Id<CommentMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: PostText,
    created: UtcDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    snowflake_generator: YatubeSnowflakeGenerator,
    users: BTreeMap<Id<UserMarker>, UserHandle>,
    auth: Vec<Authentication>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: Vec<CommentRow>,
    follows: BTreeSet<Follow>,
}

fn missing(constraint: &str) -> DbError {
    DbError::MissingReference {
        constraint: constraint.to_owned(),
    }
}

impl Tables {
    fn next_id<Marker>(&mut self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.generate()?.into())
    }

    fn user(&self, user_id: Id<UserMarker>) -> Option<User> {
        self.users.get(&user_id).map(|handle| User {
            id: user_id,
            handle: handle.clone(),
        })
    }

    fn full_post(&self, post_id: Id<PostMarker>, row: &PostRow) -> Result<Post> {
        let author = self
            .user(row.author)
            .ok_or_else(|| missing("posts_author_id_fkey"))?;
        let group = row
            .group
            .map(|group_id| {
                self.groups
                    .get(&group_id)
                    .cloned()
                    .ok_or_else(|| missing("posts_group_id_fkey"))
            })
            .transpose()?;

        Ok(Post {
            id: post_id,
            author,
            group,
            text: row.text.clone(),
            image: row.image.clone(),
            pub_date: row.pub_date,
        })
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(author_id) => row.author == author_id,
            PostFilter::FollowedBy(user) => self.follows.contains(&Follow {
                user,
                author: row.author,
            }),
        }
    }

    fn check_content(&self, content: &PostContent) -> Result<()> {
        match content.group {
            Some(group_id) if !self.groups.contains_key(&group_id) => {
                Err(missing("posts_group_id_fkey"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            tables: Mutex::new(Tables {
                snowflake_generator: YatubeSnowflakeGenerator::new(worker_id, process_id),
                ..Tables::default()
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables().user(user_id))
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let tables = self.tables();
        let user = tables
            .users
            .iter()
            .find(|(_, existing)| *existing == handle)
            .map(|(id, handle)| User {
                id: *id,
                handle: handle.clone(),
            });

        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables();
        if tables.users.values().any(|handle| *handle == user.handle) {
            return Err(DbError::UniqueViolation {
                constraint: UNIQUE_HANDLE_CONSTRAINT.to_owned(),
            });
        }

        let id = tables.next_id()?;
        tables.users.insert(id, user.handle.clone());

        Ok(User {
            id,
            handle: user.handle.clone(),
        })
    }

    async fn create_auth(
        &self,
        user_id: Id<UserMarker>,
        digest: &TokenDigest,
        expires_after: Option<PositiveDuration>,
    ) -> Result<()> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&user_id) {
            return Err(missing("auth_user_id_fkey"));
        }
        if tables.auth.iter().any(|auth| auth.digest == *digest) {
            return Err(DbError::UniqueViolation {
                constraint: "auth_pkey".to_owned(),
            });
        }

        tables.auth.push(Authentication {
            user: user_id,
            digest: *digest,
            created_at: UtcDateTime::now(),
            expires_after,
        });
        Ok(())
    }

    async fn fetch_auth(&self, digest: &TokenDigest) -> Result<Option<Authentication>> {
        let tables = self.tables();
        let authentication = tables
            .auth
            .iter()
            .find(|auth| auth.digest == *digest)
            .cloned();

        Ok(authentication)
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.tables().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

        Ok(groups)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.tables().groups.get(&group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let tables = self.tables();
        let group = tables
            .groups
            .values()
            .find(|group| group.slug == *slug)
            .cloned();

        Ok(group)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut tables = self.tables();
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::UniqueViolation {
                constraint: UNIQUE_SLUG_CONSTRAINT.to_owned(),
            });
        }

        let group = Group {
            id: tables.next_id()?,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(group.id, group.clone());

        Ok(group)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();
        tables
            .posts
            .get(&post_id)
            .map(|row| tables.full_post(post_id, row))
            .transpose()
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<usize> {
        let tables = self.tables();
        let count = tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .count();

        Ok(count)
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let tables = self.tables();
        let mut matching: Vec<(&Id<PostMarker>, &PostRow)> = tables
            .posts
            .iter()
            .filter(|(_, row)| tables.matches(row, filter))
            .collect();
        matching.sort_by(|(a_id, a), (b_id, b)| {
            b.pub_date.cmp(&a.pub_date).then(b_id.cmp(a_id))
        });

        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, row)| tables.full_post(*id, row))
            .collect()
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&author) {
            return Err(missing("posts_author_id_fkey"));
        }
        tables.check_content(content)?;

        let post_id = tables.next_id()?;
        let row = PostRow {
            author,
            group: content.group,
            text: content.text.clone(),
            image: content.image.clone(),
            pub_date: UtcDateTime::now(),
        };
        let post = tables.full_post(post_id, &row)?;
        tables.posts.insert(post_id, row);

        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();
        tables.check_content(content)?;

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.text = content.text.clone();
        row.group = content.group;
        row.image = content.image.clone();
        let row = row.clone();

        tables.full_post(post_id, &row).map(Some)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables();
        let deleted = tables.posts.remove(&post_id).is_some();
        tables.comments.retain(|comment| comment.post != post_id);

        Ok(deleted)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables();
        let mut rows: Vec<&CommentRow> = tables
            .comments
            .iter()
            .filter(|comment| comment.post == post_id)
            .collect();
        rows.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));

        rows.into_iter()
            .map(|row| -> Result<Comment> {
                Ok(Comment {
                    id: row.id,
                    post: row.post,
                    author: tables
                        .user(row.author)
                        .ok_or_else(|| missing("comments_author_id_fkey"))?,
                    text: row.text.clone(),
                    created: row.created,
                })
            })
            .collect()
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &PostText,
    ) -> Result<Comment> {
        let mut tables = self.tables();
        if !tables.posts.contains_key(&post_id) {
            return Err(missing("comments_post_id_fkey"));
        }
        let author = tables
            .user(author)
            .ok_or_else(|| missing("comments_author_id_fkey"))?;

        let row = CommentRow {
            id: tables.next_id()?,
            post: post_id,
            author: author.id,
            text: text.clone(),
            created: UtcDateTime::now(),
        };
        tables.comments.push(row.clone());

        Ok(Comment {
            id: row.id,
            post: row.post,
            author,
            text: row.text,
            created: row.created,
        })
    }

    async fn create_follow(&self, follow: Follow) -> Result<()> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&follow.user) {
            return Err(missing("follows_user_id_fkey"));
        }
        if !tables.users.contains_key(&follow.author) {
            return Err(missing("follows_author_id_fkey"));
        }
        if !tables.follows.insert(follow) {
            return Err(DbError::UniqueViolation {
                constraint: UNIQUE_FOLLOWS_CONSTRAINT.to_owned(),
            });
        }

        Ok(())
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.remove(&follow))
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.contains(&follow))
    }
}
