//! Activity classification derived from a flag's last-used time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days without a read after which a flag counts as inactive.
pub const DAYS_INACTIVE: i64 = 7;

/// How recently a flag has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    /// Not read for more than [`DAYS_INACTIVE`] days.
    Inactive,
    /// Read within the last [`DAYS_INACTIVE`] days.
    Active,
    /// Never read.
    New,
}

impl Activity {
    /// The inactivity threshold as a duration.
    #[must_use]
    pub fn threshold() -> Duration {
        Duration::days(DAYS_INACTIVE)
    }

    /// Classify a flag from its last-used time as seen at `now`.
    ///
    /// A flag read exactly [`DAYS_INACTIVE`] days ago is still active.
    #[must_use]
    pub fn classify(used: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match used {
            None => Self::New,
            Some(used) if now - used > Self::threshold() => Self::Inactive,
            Some(_) => Self::Active,
        }
    }

    /// The name used in the JSON representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::New => "NEW",
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}
