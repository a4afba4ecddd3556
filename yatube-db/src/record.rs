use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime, UtcDateTime};
use yatube_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    comment::Comment,
    group::{Group, GroupSlug},
    post::{Post, PostText},
    user::{User, UserHandle},
};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: PrimitiveDateTime,
    pub user_id: i64,
    pub handle: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created: PrimitiveDateTime,
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

/// Timestamps are stored as UTC in `TIMESTAMP` columns.
pub(crate) fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_id),
            handle: UserHandle::new(value.handle)?,
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.group_id),
            title: value.title,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_id,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_id), Some(title), Some(slug), Some(description)) => Some(Group {
                id: Id::from_db(group_id),
                title,
                slug: GroupSlug::new(slug)?,
                description,
            }),
            _ => None,
        };

        Ok(Self {
            id: Id::from_db(value.post_id),
            author: User {
                id: Id::from_db(value.user_id),
                handle: UserHandle::new(value.handle)?,
            },
            group,
            text: PostText::new(value.text)?,
            image: value.image,
            pub_date: value.pub_date.as_utc(),
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_id),
            post: Id::from_db(value.post_id),
            author: User {
                id: Id::from_db(value.user_id),
                handle: UserHandle::new(value.handle)?,
            },
            text: PostText::new(value.text)?,
            created: value.created.as_utc(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_id),
            digest: value.token_hash.as_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
