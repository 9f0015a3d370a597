//! Command-line arguments of `undo`, `redo`, and `history`.
//!
//! Undo arguments are recorded in the undo log as canonical tokens
//! ([`UndoArgs::to_tokens`]) so that redo can read back the step count and
//! branch of the undo it cancels ([`UndoArgs::from_tokens`]).

use clap::{Args, Parser};

use crate::format::OutputFormat;

/// Arguments of `rewind undo`.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct UndoArgs {
    /// Count --step from the newest entry, ignoring earlier undos and redos
    #[arg(short, long)]
    pub absolute: bool,

    /// Only undo changes to the local branch containing this commit
    #[arg(short, long, value_name = "REV")]
    pub branch: Option<String>,

    /// Undo across gaps in recorded history
    #[arg(short, long)]
    pub force: bool,

    /// Show what would change without changing anything
    #[arg(short, long)]
    pub interactive: bool,

    /// Keep working files and only re-parent the working state
    #[arg(short, long)]
    pub keep: bool,

    /// Number of states to step back (negative steps forward)
    #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
    pub step: i64,

    /// Show what would change without changing anything
    #[arg(short, long)]
    pub preview: bool,
}

impl Default for UndoArgs {
    fn default() -> Self {
        Self {
            absolute: false,
            branch: None,
            force: false,
            interactive: false,
            keep: false,
            step: 1,
            preview: false,
        }
    }
}

#[derive(Parser)]
#[command(name = "undo")]
struct RecordedUndo {
    #[command(flatten)]
    args: UndoArgs,
}

impl UndoArgs {
    /// Whether only a preview was requested.
    #[must_use]
    pub const fn previews(&self) -> bool {
        self.preview || self.interactive
    }

    /// Canonical command tokens, starting with `undo`. `branch` should
    /// already be a full commit id so the recording stays meaningful after
    /// the working parent moves.
    #[must_use]
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = vec!["undo".to_owned(), format!("--step={}", self.step)];
        if self.absolute {
            tokens.push("--absolute".to_owned());
        }
        if let Some(branch) = &self.branch {
            tokens.push(format!("--branch={branch}"));
        }
        for (set, flag) in [
            (self.force, "--force"),
            (self.interactive, "--interactive"),
            (self.keep, "--keep"),
            (self.preview, "--preview"),
        ] {
            if set {
                tokens.push(flag.to_owned());
            }
        }
        tokens
    }

    /// Parse recorded tokens (the first one is the command name).
    #[must_use]
    pub fn from_tokens(tokens: &[String]) -> Option<Self> {
        RecordedUndo::try_parse_from(tokens).ok().map(|r| r.args)
    }
}

/// Arguments of `rewind redo`.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct RedoArgs {
    /// Show what would change without changing anything
    #[arg(short, long)]
    pub preview: bool,
}

impl RedoArgs {
    /// Canonical command tokens, starting with `redo`.
    #[must_use]
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = vec!["redo".to_owned()];
        if self.preview {
            tokens.push("--preview".to_owned());
        }
        tokens
    }
}

/// Arguments of `rewind history`.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryArgs {
    /// Show one state in detail, by reverse index
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub index: Option<i64>,

    /// List recent states
    #[arg(short, long)]
    pub list: bool,

    /// With --list, the reverse index to start from; otherwise the state to show
    #[arg(value_name = "N", allow_negative_numbers = true)]
    pub position: Option<i64>,

    /// Output format: text or json
    #[arg(long)]
    pub format: Option<OutputFormat>,
}
