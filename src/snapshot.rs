//! Recorded repository state: the three tracked facets and the log entry that
//! wraps them.
//!
//! Also holds the text encodings used by the record stores. Every encoding is
//! canonical (sorted, fixed formatting) so that equal values always hash to
//! the same record id.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rewind_graph::{CommitGraph, CommitId, GraphError};
use serde::Serialize;

use crate::store::RecordId;

// ---------------------------------------------------------------------------
// RepoSnapshot
// ---------------------------------------------------------------------------

/// The tracked facets of a repository at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepoSnapshot {
    /// Bookmark name → commit.
    pub bookmarks: BTreeMap<String, CommitId>,
    /// Heads of the visible draft commits.
    pub draft_heads: BTreeSet<CommitId>,
    /// Commit the working state is based on.
    pub working_parent: CommitId,
}

impl RepoSnapshot {
    /// Read the current facets from a graph.
    ///
    /// # Errors
    /// Propagates graph errors.
    pub fn capture<G: CommitGraph + ?Sized>(graph: &G) -> Result<Self, GraphError> {
        Ok(Self {
            bookmarks: graph.bookmarks()?,
            draft_heads: graph.draft_heads()?,
            working_parent: graph.working_parent()?,
        })
    }

    /// `"<name> <commit>"` lines, sorted by name.
    #[must_use]
    pub fn encode_bookmarks(&self) -> String {
        self.bookmarks
            .iter()
            .map(|(name, id)| format!("{name} {id}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One commit id per line, sorted.
    #[must_use]
    pub fn encode_draft_heads(&self) -> String {
        self.draft_heads
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn encode_working_parent(&self) -> String {
        self.working_parent.to_string()
    }
}

/// Parse [`RepoSnapshot::encode_bookmarks`] output. Names may contain spaces;
/// the commit id is always the last word.
///
/// # Errors
/// A line without a valid trailing commit id.
pub fn parse_bookmarks(text: &str) -> Result<BTreeMap<String, CommitId>, String> {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let (name, id) = line
                .rsplit_once(' ')
                .ok_or_else(|| format!("malformed bookmark line {line:?}"))?;
            let id = id.parse::<CommitId>().map_err(|e| e.to_string())?;
            Ok((name.to_owned(), id))
        })
        .collect()
}

/// Parse [`RepoSnapshot::encode_draft_heads`] output.
///
/// # Errors
/// A line that is not a commit id.
pub fn parse_draft_heads(text: &str) -> Result<BTreeSet<CommitId>, String> {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|line| line.parse::<CommitId>().map_err(|e| e.to_string()))
        .collect()
}

/// Parse a working parent record.
///
/// # Errors
/// Text that is not a commit id.
pub fn parse_working_parent(text: &str) -> Result<CommitId, String> {
    text.trim().parse::<CommitId>().map_err(|e| e.to_string())
}

/// Command tokens joined by NUL. The gap boundary entry encodes as `""`.
#[must_use]
pub fn encode_command(tokens: &[String]) -> String {
    tokens.join("\0")
}

/// Inverse of [`encode_command`]. `""` decodes to a single empty token.
#[must_use]
pub fn parse_command(text: &str) -> Vec<String> {
    text.split('\0').map(str::to_owned).collect()
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Wall-clock time of a recorded entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub secs: i64,
    pub nanos: u32,
    /// Local UTC offset in seconds. Always 0 for timestamps taken here.
    pub offset: i32,
}

impl Timestamp {
    /// The current time, UTC.
    #[must_use]
    pub fn now() -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
            nanos: since.subsec_nanos(),
            offset: 0,
        }
    }

    /// `"<secs>.<nanos, 9 digits> <offset>"`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}.{:09} {}", self.secs, self.nanos, self.offset)
    }

    /// Inverse of [`encode`](Self::encode).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (instant, offset) = text.split_once(' ')?;
        let (secs, nanos) = instant.split_once('.')?;
        let nanos: u32 = nanos.parse().ok()?;
        if nanos >= 1_000_000_000 {
            return None;
        }
        Some(Self {
            secs: secs.parse().ok()?,
            nanos,
            offset: offset.parse().ok()?,
        })
    }

    /// ISO 8601 in UTC, second precision: `2024-03-01T12:00:00Z`.
    #[must_use]
    pub fn to_iso8601(&self) -> String {
        let days = self.secs.div_euclid(86_400);
        let rem = self.secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        format!(
            "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
            rem / 3600,
            (rem % 3600) / 60,
            rem % 60
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Days since 1970-01-01 → proleptic Gregorian (year, month, day).
const fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + (month <= 2) as i64;
    (year, month, day)
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One decoded undo log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Absolute position in the log.
    pub index: usize,
    /// Chained id of the index record; stable reference to this position.
    pub id: RecordId,
    pub timestamp: Timestamp,
    /// Canonical command tokens; `[""]` for a gap boundary.
    pub command: Vec<String>,
    pub snapshot: RepoSnapshot,
}

impl LogEntry {
    /// Whether this is a synthetic gap boundary rather than a real command.
    #[must_use]
    pub fn is_gap(&self) -> bool {
        self.command_name().is_empty()
    }

    /// First command token (`""` for gap entries).
    #[must_use]
    pub fn command_name(&self) -> &str {
        self.command.first().map_or("", String::as_str)
    }

    /// Tokens joined by spaces, for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> CommitId {
        CommitId::from_bytes([byte; 20])
    }

    #[test]
    fn bookmark_names_with_spaces_survive() {
        let snap = RepoSnapshot {
            bookmarks: BTreeMap::from([
                ("feature one".to_owned(), id(1)),
                ("main".to_owned(), id(2)),
            ]),
            ..RepoSnapshot::default()
        };
        let parsed = parse_bookmarks(&snap.encode_bookmarks()).unwrap();
        assert_eq!(parsed, snap.bookmarks);
    }

    #[test]
    fn empty_encodings_parse_to_empty() {
        assert!(parse_bookmarks("").unwrap().is_empty());
        assert!(parse_draft_heads("").unwrap().is_empty());
        assert_eq!(parse_command(""), vec![String::new()]);
    }

    #[test]
    fn draft_head_encoding_is_sorted() {
        let snap = RepoSnapshot {
            draft_heads: [id(9), id(1)].into_iter().collect(),
            ..RepoSnapshot::default()
        };
        let text = snap.encode_draft_heads();
        assert!(text.starts_with(&id(1).to_string()));
        assert_eq!(parse_draft_heads(&text).unwrap(), snap.draft_heads);
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(parse_bookmarks("main").is_err());
        assert!(parse_draft_heads("xyz").is_err());
        assert!(parse_working_parent("").is_err());
        assert!(Timestamp::parse("12 0").is_none());
        assert!(Timestamp::parse("12.5000000000 0").is_none());
    }

    #[test]
    fn timestamp_formats() {
        let ts = Timestamp::parse("1709294400.000000001 0").unwrap();
        assert_eq!(ts.encode(), "1709294400.000000001 0");
        assert_eq!(ts.to_iso8601(), "2024-03-01T12:00:00Z");
        assert_eq!(
            Timestamp { secs: 0, nanos: 0, offset: 0 }.to_iso8601(),
            "1970-01-01T00:00:00Z"
        );
    }

    #[test]
    fn gap_entry_detection() {
        let entry = LogEntry {
            index: 0,
            id: "0".repeat(64).parse().unwrap(),
            timestamp: Timestamp::now(),
            command: parse_command(""),
            snapshot: RepoSnapshot::default(),
        };
        assert!(entry.is_gap());
        assert_eq!(entry.command_line(), "");
    }
}
