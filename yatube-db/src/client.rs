use crate::{
    record::{
        AuthenticationRecord, CommentRecord, FullPostRecord, GroupRecord, UserRecord,
        to_primitive,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, migrate::Migrator, query, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use time::UtcDateTime;
use yatube_common::{
    model::{
        Id, YatubeSnowflakeGenerator,
        auth::{Authentication, TokenDigest},
        comment::{Comment, CommentMarker},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{Post, PostContent, PostFilter, PostMarker, PostText},
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const FULL_POST_COLUMNS: &str = "
    post.post_id,
    post.text,
    post.image,
    post.pub_date,
    users.user_id,
    users.handle,
    groups.group_id,
    groups.title AS group_title,
    groups.slug AS group_slug,
    groups.description AS group_description
";

const FULL_POST_JOINS: &str = "
    JOIN users.users ON users.user_id = post.author_id
    LEFT JOIN posts.groups ON groups.group_id = post.group_id
";

const COMMENT_COLUMNS: &str = "
    comment.comment_id,
    comment.post_id,
    comment.text,
    comment.created,
    users.user_id,
    users.handle
";

/// Full post rows read from `source`, which must be aliased `post`.
fn select_full_posts(source: &str) -> String {
    format!("SELECT {FULL_POST_COLUMNS} FROM {source} {FULL_POST_JOINS}")
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder
                .push(" WHERE post.group_id = ")
                .push_bind(group_id.to_db());
        }
        PostFilter::Author(author_id) => {
            builder
                .push(" WHERE post.author_id = ")
                .push_bind(author_id.to_db());
        }
        PostFilter::FollowedBy(user_id) => {
            builder
                .push(
                    " WHERE post.author_id IN \
                    (SELECT follows.author_id FROM posts.follows WHERE follows.user_id = ",
                )
                .push_bind(user_id.to_db())
                .push(")");
        }
    }
}

/// Lifts constraint failures out of the driver error so callers can match
/// on them.
fn constraint_error(err: sqlx::Error) -> DbError {
    if let Some(db_err) = err.as_database_error() {
        let constraint = db_err.constraint().unwrap_or_default().to_owned();
        if db_err.is_unique_violation() {
            return DbError::UniqueViolation { constraint };
        }
        if db_err.is_foreign_key_violation() {
            return DbError::MissingReference { constraint };
        }
    }

    err.into()
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed [`Store`].
#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<YatubeSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(YatubeSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users.users
            WHERE
                users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id::<UserMarker>()?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_id, handle)
            VALUES ($1, $2)
            RETURNING user_id, handle
            ",
        )
        .bind(user_id.to_db())
        .bind(user.handle.get())
        .fetch_one(&self.pool)
        .await
        .map_err(constraint_error)?;

        Ok(record.try_into()?)
    }

    async fn create_auth(
        &self,
        user_id: Id<UserMarker>,
        digest: &TokenDigest,
        expires_after: Option<PositiveDuration>,
    ) -> Result<()> {
        query(
            "
            INSERT INTO users.auth (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(digest.as_bytes())
        .bind(user_id.to_db())
        .bind(to_primitive(UtcDateTime::now()))
        .bind(expires_after.map(|duration| duration.get().whole_seconds()))
        .execute(&self.pool)
        .await
        .map_err(constraint_error)?;

        Ok(())
    }

    async fn fetch_auth(&self, digest: &TokenDigest) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth.user_id,
                auth.token_hash,
                auth.created_at,
                auth.expires_after_seconds
            FROM
                users.auth
            WHERE
                auth.token_hash = $1
            ",
        )
        .bind(digest.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            ORDER BY title, group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE group_id = $1
            ",
        )
        .bind(group_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id = self.next_id::<GroupMarker>()?;

        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO posts.groups (group_id, title, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING group_id, title, slug, description
            ",
        )
        .bind(group_id.to_db())
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(constraint_error)?;

        Ok(record.try_into()?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!(
            "{} WHERE post.post_id = $1",
            select_full_posts("posts.posts AS post")
        );

        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<usize> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.posts AS post");
        push_filter(&mut builder, filter);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn fetch_posts(
        &self,
        filter: PostFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(select_full_posts("posts.posts AS post"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY post.pub_date DESC, post.post_id DESC LIMIT ")
            .push_bind(to_i64(limit))
            .push(" OFFSET ")
            .push_bind(to_i64(offset));

        let records = builder
            .build_query_as::<FullPostRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let post_id = self.next_id::<PostMarker>()?;
        let sql = format!(
            "
            WITH post AS (
                INSERT INTO posts.posts (post_id, text, pub_date, author_id, group_id, image)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            {}
            ",
            select_full_posts("post")
        );

        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.to_db())
            .bind(content.text.get())
            .bind(to_primitive(UtcDateTime::now()))
            .bind(author.to_db())
            .bind(content.group.map(Id::to_db))
            .bind(content.image.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(constraint_error)?;

        Ok(record.try_into()?)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "
            WITH post AS (
                UPDATE posts.posts
                SET text = $2, group_id = $3, image = $4
                WHERE post_id = $1
                RETURNING *
            )
            {}
            ",
            select_full_posts("post")
        );

        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.to_db())
            .bind(content.text.get())
            .bind(content.group.map(Id::to_db))
            .bind(content.image.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(constraint_error)?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_id = $1")
            .bind(post_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "
            SELECT {COMMENT_COLUMNS}
            FROM posts.comments AS comment
            JOIN users.users ON users.user_id = comment.author_id
            WHERE comment.post_id = $1
            ORDER BY comment.created, comment.comment_id
            "
        );

        let records = query_as::<_, CommentRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &PostText,
    ) -> Result<Comment> {
        let comment_id = self.next_id::<CommentMarker>()?;
        let sql = format!(
            "
            WITH comment AS (
                INSERT INTO posts.comments (comment_id, post_id, author_id, text, created)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS}
            FROM comment
            JOIN users.users ON users.user_id = comment.author_id
            "
        );

        let record = query_as::<_, CommentRecord>(&sql)
            .bind(comment_id.to_db())
            .bind(post_id.to_db())
            .bind(author.to_db())
            .bind(text.get())
            .bind(to_primitive(UtcDateTime::now()))
            .fetch_one(&self.pool)
            .await
            .map_err(constraint_error)?;

        Ok(record.try_into()?)
    }

    async fn create_follow(&self, follow: Follow) -> Result<()> {
        query("INSERT INTO posts.follows (user_id, author_id) VALUES ($1, $2)")
            .bind(follow.user.to_db())
            .bind(follow.author.to_db())
            .execute(&self.pool)
            .await
            .map_err(constraint_error)?;

        Ok(())
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        let result = query("DELETE FROM posts.follows WHERE user_id = $1 AND author_id = $2")
            .bind(follow.user.to_db())
            .bind(follow.author.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM posts.follows WHERE user_id = $1 AND author_id = $2
            )
            ",
        )
        .bind(follow.user.to_db())
        .bind(follow.author.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
