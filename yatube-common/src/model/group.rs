use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_SLUG_MAX_LEN: usize = 50;
pub const UNIQUE_SLUG_CONSTRAINT: &str = "groups_slug_key";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

/// A community posts can be filed under.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateGroup {
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

/// URL-safe group name: ASCII letters, digits, `-` and `_`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group slug is invalid: {0}")]
pub struct InvalidGroupSlugError(String);

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let valid = !slug.is_empty()
            && slug.len() <= GROUP_SLUG_MAX_LEN
            && slug
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GroupSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupSlug::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"GroupSlug"))
    }
}
