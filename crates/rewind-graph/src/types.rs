//! Value types shared between the [`CommitGraph`](crate::CommitGraph) trait and
//! the undo subsystem.
//!
//! Nothing here knows about storage: commits are identified by [`CommitId`],
//! publication state by [`Phase`], and working-copy differences by
//! [`ManifestChange`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// A commit identifier (20 bytes, displayed as 40 lowercase hex characters).
///
/// Stored as raw bytes so it is `Copy` and cheap to compare and hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId([u8; 20]);

impl CommitId {
    /// The null commit (`0000...0000`): the parent of root commits and the
    /// working position of an empty repository.
    pub const NULL: Self = Self([0; 20]);

    /// Create a `CommitId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` for [`CommitId::NULL`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The first 12 hex characters, for human-facing output.
    #[must_use]
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(12);
        s
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.short())
    }
}

impl FromStr for CommitId {
    type Err = CommitIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(CommitIdParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| CommitIdParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| CommitIdParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for CommitId {
    type Error = CommitIdParseError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.to_string()
    }
}

/// Error from parsing a hex string into a [`CommitId`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitIdParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for CommitIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid commit id {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for CommitIdParseError {}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Publication state of a commit.
///
/// Public commits have been shared and are never rewritten; draft commits are
/// local and may be hidden, revealed, or obsoleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Published.
    Public,
    /// Unpublished, local.
    Draft,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

// ---------------------------------------------------------------------------
// ManifestChange
// ---------------------------------------------------------------------------

/// One differing path between two manifests.
///
/// `from` / `to` hold the file content digest on each side, `None` when the
/// path is absent on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChange {
    /// Repository-relative path.
    pub path: String,
    /// Digest on the `from` side.
    pub from: Option<String>,
    /// Digest on the `to` side.
    pub to: Option<String>,
}

impl ManifestChange {
    /// Present on the `to` side only.
    #[must_use]
    pub const fn is_addition(&self) -> bool {
        self.from.is_none() && self.to.is_some()
    }

    /// Present on the `from` side only.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.from.is_some() && self.to.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_id_parses_and_displays_lowercase_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id: CommitId = hex.parse().unwrap();
        assert_eq!(id.to_string(), hex);
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn commit_id_rejects_wrong_length_and_uppercase() {
        assert!("abc".parse::<CommitId>().is_err());
        assert!(
            "0123456789ABCDEF0123456789abcdef01234567"
                .parse::<CommitId>()
                .is_err()
        );
    }

    #[test]
    fn null_commit_is_all_zero() {
        assert!(CommitId::NULL.is_null());
        assert_eq!(CommitId::NULL.to_string(), "0".repeat(40));
    }

    #[test]
    fn commit_id_serializes_as_string() {
        let id = CommitId::from_bytes([0xab; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: CommitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn manifest_change_direction() {
        let added = ManifestChange {
            path: "a".to_owned(),
            from: None,
            to: Some("x".to_owned()),
        };
        assert!(added.is_addition());
        assert!(!added.is_removal());
    }
}
