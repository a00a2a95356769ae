//! Flag kinds and their stored values.

use serde::{Deserialize, Serialize};

/// The kind of a flag.
///
/// Each kind owns one value column in storage, so adding a kind adds a
/// column without touching the rows of existing kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    /// An on/off switch.
    Binary,
}

impl FlagType {
    /// Every known kind.
    pub const ALL: &'static [FlagType] = &[FlagType::Binary];

    /// The tag persisted in the `type` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
        }
    }

    /// The storage column holding values of this kind.
    #[must_use]
    pub fn value_column(self) -> &'static str {
        match self {
            Self::Binary => "value_binary",
        }
    }

    /// Parse a persisted type tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for FlagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from or written to a flag's value column.
///
/// `None` inside a variant means the flag was created but never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Value of a [`FlagType::Binary`] flag.
    Binary(Option<bool>),
}

impl FlagValue {
    /// The kind this value belongs to.
    #[must_use]
    pub fn kind(self) -> FlagType {
        match self {
            Self::Binary(_) => FlagType::Binary,
        }
    }

    /// Whether the value has never been set.
    #[must_use]
    pub fn is_unset(self) -> bool {
        match self {
            Self::Binary(value) => value.is_none(),
        }
    }

    /// Whether this value turns its feature on. Unset is off.
    #[must_use]
    pub fn is_on(self) -> bool {
        match self {
            Self::Binary(value) => value.unwrap_or(false),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Binary(Some(value))
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(Some(value)) => write!(f, "{value}"),
            Self::Binary(None) => write!(f, "unset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_tag_and_column() {
        assert_eq!(FlagType::Binary.as_str(), "binary");
        assert_eq!(FlagType::Binary.value_column(), "value_binary");
        assert_eq!(FlagType::Binary.to_string(), "binary");
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(FlagType::from_tag("binary"), Some(FlagType::Binary));
        assert_eq!(FlagType::from_tag("percentage"), None);
    }

    #[test]
    fn test_unset_is_off() {
        let value = FlagValue::Binary(None);
        assert!(value.is_unset());
        assert!(!value.is_on());
        assert_eq!(value.kind(), FlagType::Binary);
    }

    #[test]
    fn test_from_bool() {
        assert!(FlagValue::from(true).is_on());
        assert!(!FlagValue::from(false).is_on());
        assert!(!FlagValue::from(false).is_unset());
    }

    #[test]
    fn test_value_serializes_as_plain_json() {
        assert_eq!(serde_json::to_string(&FlagValue::from(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&FlagValue::Binary(None)).unwrap(), "null");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(FlagValue::from(false).to_string(), "false");
        assert_eq!(FlagValue::Binary(None).to_string(), "unset");
    }
}
