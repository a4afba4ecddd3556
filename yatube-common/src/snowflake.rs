//! Time-ordered 64-bit ids.
//!
//! Layout, most significant bit first: 42 bits of milliseconds since the
//! epoch, 5 bits worker id, 5 bits process id, 12 bits per-millisecond
//! increment. See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_OFFSET: u32 = 0;
pub const INCREMENT_LENGTH: u32 = 12;

const fn part(snowflake: u64, offset: u32, length: u32) -> u64 {
    (snowflake >> offset) & ((1 << length) - 1)
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampFromDateTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range for creation: {0}")]
pub struct SnowflakePartOutOfRangeError(u64);

macro_rules! machine_part {
    ($name:ident, $length:ident) => {
        #[derive(
            Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
        )]
        #[serde(try_from = "u8")]
        pub struct $name(u8);

        impl $name {
            #[must_use]
            pub fn new(id: u8) -> Option<Self> {
                (u32::from(id) < 1 << $length).then_some(Self(id))
            }

            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = SnowflakePartOutOfRangeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(SnowflakePartOutOfRangeError(value.into()))
            }
        }
    };
}

machine_part!(WorkerId, WORKER_ID_LENGTH);
machine_part!(ProcessId, PROCESS_ID_LENGTH);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnowflakeIncrement(u16);

impl SnowflakeIncrement {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub fn new(increment: u16) -> Option<Self> {
        (u32::from(increment) < 1 << INCREMENT_LENGTH).then_some(Self(increment))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    /// The following increment, wrapping to zero after the 12-bit maximum.
    #[must_use]
    pub fn next(self) -> Self {
        Self((self.0 + 1) % (1 << INCREMENT_LENGTH))
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnowflakeTimestamp<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn new(millis: u64) -> Option<Self> {
        (millis < 1 << TIMESTAMP_LENGTH).then_some(Self(millis, PhantomData))
    }

    /// Milliseconds since the epoch.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn now() -> Result<Self, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        Self::try_from(UtcDateTime::now())
    }
}

impl<SnowflakeEpoch: Epoch> TryFrom<UtcDateTime> for SnowflakeTimestamp<SnowflakeEpoch> {
    type Error = SnowflakeTimestampFromDateTimeError;

    fn try_from(value: UtcDateTime) -> Result<Self, Self::Error> {
        let millis = (value - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        if millis < 0 {
            return Err(Self::Error::TimeBeforeEpoch);
        }
        let millis = u64::try_from(millis).map_err(|_| Self::Error::TimestampTooLarge)?;
        Self::new(millis).ok_or(Self::Error::TimestampTooLarge)
    }
}

impl<SnowflakeEpoch: Epoch> From<SnowflakeTimestamp<SnowflakeEpoch>> for UtcDateTime {
    fn from(value: SnowflakeTimestamp<SnowflakeEpoch>) -> Self {
        // 42 bits always fit into an i64.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(value.0.cast_signed())
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp: SnowflakeTimestamp<SnowflakeEpoch>,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: SnowflakeIncrement,
    ) -> Self {
        Self::new(
            timestamp.get() << TIMESTAMP_OFFSET
                | u64::from(worker_id.get()) << WORKER_ID_OFFSET
                | u64::from(process_id.get()) << PROCESS_ID_OFFSET
                | u64::from(increment.get()) << INCREMENT_OFFSET,
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp(self) -> SnowflakeTimestamp<SnowflakeEpoch> {
        SnowflakeTimestamp(
            part(self.0, TIMESTAMP_OFFSET, TIMESTAMP_LENGTH),
            PhantomData,
        )
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> WorkerId {
        WorkerId(part(self.0, WORKER_ID_OFFSET, WORKER_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> ProcessId {
        ProcessId(part(self.0, PROCESS_ID_OFFSET, PROCESS_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> SnowflakeIncrement {
        SnowflakeIncrement(part(self.0, INCREMENT_OFFSET, INCREMENT_LENGTH) as u16)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Hands out strictly increasing snowflakes for one worker/process pair.
///
/// Ids generated in the same millisecond differ by increment. A clock going
/// backwards keeps the last millisecond in use; once its increment space is
/// exhausted the generator borrows the next millisecond.
#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last: Option<(u64, SnowflakeIncrement)>,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last: None,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = SnowflakeTimestamp::<SnowflakeEpoch>::try_from(time)?.get();

        let (millis, increment) = match self.last {
            Some((last_millis, last_increment)) if millis <= last_millis => {
                let increment = last_increment.next();
                if increment == SnowflakeIncrement::ZERO {
                    (last_millis + 1, increment)
                } else {
                    (last_millis, increment)
                }
            }
            _ => (millis, SnowflakeIncrement::ZERO),
        };

        let timestamp = SnowflakeTimestamp::new(millis)
            .ok_or(SnowflakeTimestampFromDateTimeError::TimestampTooLarge)?;
        self.last = Some((millis, increment));

        Ok(Snowflake::from_parts(
            timestamp,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(
        &mut self,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}
