use crate::{
    model::{
        Id,
        post::{PostMarker, PostText},
        user::User,
    },
    util::serialize_rfc3339,
};
use serde::Serialize;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: User,
    /// Same non-blank rule as post text.
    pub text: PostText,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub created: UtcDateTime,
}
