//! Repository configuration (`.rewind/config.toml`).
//!
//! ```toml
//! [undo]
//! enabled = true
//! lock_timeout_ms = 2000
//! history_list_len = 5
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level repository configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewindConfig {
    /// Undo subsystem settings.
    #[serde(default)]
    pub undo: UndoConfig,
}

// ---------------------------------------------------------------------------
// UndoConfig
// ---------------------------------------------------------------------------

/// Undo subsystem settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UndoConfig {
    /// Record commands into the undo log. Turning this off and on again
    /// leaves a gap in the history.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How long the recorder waits for the undo log lock before skipping.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Entries shown by `history --list`.
    #[serde(default = "default_history_list_len")]
    pub history_list_len: usize,
}

impl UndoConfig {
    /// [`lock_timeout_ms`](Self::lock_timeout_ms) as a `Duration`.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lock_timeout_ms: default_lock_timeout_ms(),
            history_list_len: default_history_list_len(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_lock_timeout_ms() -> u64 {
    2000
}

const fn default_history_list_len() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl RewindConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Load `<root>/.rewind/config.toml`.
    ///
    /// # Errors
    /// See [`load`](Self::load).
    pub fn load_for_repo(root: &Path) -> Result<Self, ConfigError> {
        Self::load(&root.join(crate::META_DIR).join("config.toml"))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_all_fields() {
        let cfg = RewindConfig::default();
        assert!(cfg.undo.enabled);
        assert_eq!(cfg.undo.lock_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.undo.history_list_len, 5);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(RewindConfig::parse("").unwrap(), RewindConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = RewindConfig::parse("[undo]\nenabled = false\n").unwrap();
        assert!(!cfg.undo.enabled);
        assert_eq!(cfg.undo.lock_timeout_ms, 2000);
    }

    #[test]
    fn unknown_field_reports_line() {
        let err = RewindConfig::parse("[undo]\nenabled = true\nbogus = 1\n").unwrap_err();
        assert!(err.message.contains("line 3"), "{err}");
        assert!(err.to_string().starts_with("config error"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let cfg = RewindConfig::load_for_repo(dir.path()).unwrap();
        assert_eq!(cfg, RewindConfig::default());
    }

    #[test]
    fn load_error_carries_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[undo]\nlock_timeout_ms = \"soon\"\n").unwrap();
        let err = RewindConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
    }
}
