pub mod post;

use crate::snowflake::{Epoch, Snowflake, SnowflakeGenerator};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected},
};
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MicroblogEpoch;
impl Epoch for MicroblogEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type MicroblogSnowflake = Snowflake<MicroblogEpoch>;
pub type MicroblogSnowflakeGenerator = SnowflakeGenerator<MicroblogEpoch>;

/// Typed id over a [`MicroblogSnowflake`].
///
/// Serialized as a decimal string: 64-bit ids overflow the number precision
/// of common JSON consumers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Id<Marker>(MicroblogSnowflake, PhantomData<Marker>);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Id was not a decimal 64-bit integer: {0}")]
pub struct ParseIdError(String);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: MicroblogSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> MicroblogSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Into::into)
            .map_err(|_| ParseIdError(s.to_owned()))
    }
}

impl<Marker> Serialize for Id<Marker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| Error::invalid_value(Unexpected::Str(&raw), &"a decimal post id"))
    }
}

impl<Marker> From<MicroblogSnowflake> for Id<Marker> {
    fn from(value: MicroblogSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for MicroblogSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(MicroblogSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
