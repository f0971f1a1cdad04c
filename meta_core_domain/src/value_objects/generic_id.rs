//! Generic ULID-backed identifier, parameterized by a marker type so that
//! distinct entity IDs (`HashId`, `PluginId`, `TaskId`, ...) cannot be
//! confused with one another at compile time even though they share a
//! single implementation.

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::CoreError;

/// Per-category validation hook. Each marker type names its category and
/// may reject IDs that don't make sense for it (e.g. nil, or timestamped
/// implausibly far in the future).
pub trait IdCategory {
    fn category_name() -> &'static str;

    fn validate_id(ulid: &Ulid) -> Result<(), CoreError> {
        if ulid.0 == 0 {
            return Err(CoreError::invalid_config(format!(
                "{} id cannot be the nil ULID",
                Self::category_name()
            )));
        }
        let now = Utc::now().timestamp_millis() as u64;
        let one_day_ms = 24 * 60 * 60 * 1000;
        if ulid.timestamp_ms() > now + one_day_ms {
            return Err(CoreError::invalid_config(format!(
                "{} id timestamp is too far in the future",
                Self::category_name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GenericId<C> {
    ulid: Ulid,
    _marker: PhantomData<C>,
}

impl<C: IdCategory> GenericId<C> {
    pub fn new() -> Self {
        Self {
            ulid: Ulid::new(),
            _marker: PhantomData,
        }
    }

    pub fn from_ulid(ulid: Ulid) -> Result<Self, CoreError> {
        C::validate_id(&ulid)?;
        Ok(Self {
            ulid,
            _marker: PhantomData,
        })
    }

    pub fn from_string(s: &str) -> Result<Self, CoreError> {
        let ulid = Ulid::from_string(s).map_err(|e| CoreError::invalid_config(format!("invalid ulid: {e}")))?;
        Self::from_ulid(ulid)
    }

    pub fn from_timestamp_ms(timestamp_ms: u64) -> Result<Self, CoreError> {
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        Self::from_ulid(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms() as i64).unwrap_or_else(Utc::now)
    }

    pub fn category(&self) -> &'static str {
        C::category_name()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        C::validate_id(&self.ulid)
    }

    pub fn is_nil(&self) -> bool {
        self.ulid.0 == 0
    }
}

impl<C: IdCategory> Default for GenericId<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Display for GenericId<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ulid)
    }
}

impl<C: IdCategory> FromStr for GenericId<C> {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl<C> AsRef<Ulid> for GenericId<C> {
    fn as_ref(&self) -> &Ulid {
        &self.ulid
    }
}

impl<C> Serialize for GenericId<C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.ulid.to_string())
    }
}

impl<'de, C: IdCategory> Deserialize<'de> for GenericId<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s).map_err(D::Error::custom)
    }
}
