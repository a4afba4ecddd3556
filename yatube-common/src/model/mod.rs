pub mod auth;
pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::InvalidTokenDigestError, group::InvalidGroupSlugError,
        post::InvalidPostTextError, user::InvalidUserHandleError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    GroupSlug(#[from] InvalidGroupSlugError),
    #[error(transparent)]
    PostText(#[from] InvalidPostTextError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenDigest(#[from] InvalidTokenDigestError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct YatubeEpoch;
impl Epoch for YatubeEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2022-01-01 00:00);
}

pub type YatubeSnowflake = Snowflake<YatubeEpoch>;
pub type YatubeSnowflakeGenerator = SnowflakeGenerator<YatubeEpoch>;

/// Typed entity id. The marker keeps post ids and user ids apart.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(YatubeSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: YatubeSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> YatubeSnowflake {
        self.0
    }

    /// The id as stored in a postgres `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<YatubeSnowflake> for Id<Marker> {
    fn from(value: YatubeSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(YatubeSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn id_db_representation_round_trips_high_bit() {
        let id = Id::<PostMarker>::from(u64::MAX - 1);

        assert_eq!(id.to_db(), -2);
        assert_eq!(Id::<PostMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn id_serializes_as_plain_number() {
        let id = Id::<PostMarker>::from(42_u64);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("42").unwrap(), id);
    }
}
