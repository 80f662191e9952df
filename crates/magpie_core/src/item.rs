//! Item identifiers.

use magpie_error::{DatasetError, DatasetErrorKind, MagpieResult};
use serde::{Deserialize, Serialize};

/// Opaque stable identifier for a media item on the remote service.
///
/// `ItemId` is the primary key across all storage artifacts: the metadata
/// file, the media file, and the index entry all derive their names from it.
/// The string is treated as opaque except for a shape check that guarantees
/// it round-trips through every filename use: ASCII alphanumerics plus `-`
/// and `_`, between 1 and 64 bytes.
///
/// # Examples
///
/// ```
/// use magpie_core::ItemId;
///
/// let id = ItemId::new("BV1GJ411x7h7").unwrap();
/// assert_eq!(id.as_str(), "BV1GJ411x7h7");
/// assert!(ItemId::new("../escape").is_err());
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Maximum accepted identifier length in bytes.
    pub const MAX_LEN: usize = 64;

    /// Create an identifier, rejecting anything unusable as a file stem.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for empty strings, strings longer than
    /// [`MAX_LEN`](Self::MAX_LEN) bytes, or strings containing characters
    /// outside `[A-Za-z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> MagpieResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DatasetError::new(DatasetErrorKind::InvalidId("empty".to_string())).into());
        }
        if raw.len() > Self::MAX_LEN {
            return Err(DatasetError::new(DatasetErrorKind::InvalidId(format!(
                "{} bytes exceeds {} byte limit",
                raw.len(),
                Self::MAX_LEN
            )))
            .into());
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(DatasetError::new(DatasetErrorKind::InvalidId(format!(
                "'{}' contains characters outside [A-Za-z0-9_-]",
                raw
            )))
            .into());
        }
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_alphanumeric_ids() {
        for raw in ["BV1GJ411x7h7", "abc", "A", "a_b-c", "0123456789"] {
            assert!(ItemId::new(raw).is_ok(), "rejected {raw}");
        }
    }

    #[test]
    fn test_accepts_max_length() {
        let raw = "a".repeat(ItemId::MAX_LEN);
        assert!(ItemId::new(raw).is_ok());
    }

    #[test]
    fn test_rejects_bad_ids() {
        let too_long = "a".repeat(65);
        for raw in ["", "a/b", "..", "a b", "id\u{e9}", too_long.as_str()] {
            assert!(ItemId::new(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ItemId::new("BV1xx411c7mD").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BV1xx411c7mD\"");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
