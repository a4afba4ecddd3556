use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

/// Name of the storage constraint keeping `(user, author)` pairs unique.
pub const UNIQUE_FOLLOWS_CONSTRAINT: &str = "unique_follows";

/// `user` subscribes to the posts of `author`.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
pub struct Follow {
    pub user: Id<UserMarker>,
    pub author: Id<UserMarker>,
}

impl Follow {
    #[must_use]
    pub fn is_self_follow(self) -> bool {
        self.user == self.author
    }
}
