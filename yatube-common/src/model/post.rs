use crate::{
    model::{
        Id,
        group::{Group, GroupMarker},
        user::{User, UserMarker},
    },
    util::serialize_rfc3339,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub group: Option<Group>,
    pub text: PostText,
    pub image: Option<String>,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub pub_date: UtcDateTime,
}

/// What an author submits when creating or editing a post.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: PostText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

/// Which posts a listing shows. Every listing is ordered newest first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostText(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Text must not be blank")]
pub struct InvalidPostTextError;

impl PostText {
    pub fn new(text: String) -> Result<Self, InvalidPostTextError> {
        if text.trim().is_empty() {
            Err(InvalidPostTextError)
        } else {
            Ok(Self(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for PostText {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostText::new(inner).map_err(serde::de::Error::custom)
    }
}
