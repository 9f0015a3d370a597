//! Human-readable rendering of undo plans and outcomes.

use std::fmt;

use crate::engine::{Outcome, UndoPlan};

fn short_or_none(id: Option<&rewind_graph::CommitId>) -> String {
    id.map_or_else(|| "(none)".to_owned(), rewind_graph::CommitId::short)
}

impl fmt::Display for UndoPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = if self.command.iter().all(String::is_empty) {
            "-- gap in log --".to_owned()
        } else {
            self.command.join(" ")
        };
        writeln!(
            f,
            "state {} (reverse index {}), after: {command}",
            self.target, self.reverse
        )?;
        if let Some(branch) = &self.branch {
            writeln!(f, "limited to a local branch of {} commits", branch.len())?;
        }
        if self.is_empty() {
            return writeln!(f, "no changes");
        }

        if !self.bookmarks.is_empty() {
            writeln!(f, "bookmarks:")?;
            for change in &self.bookmarks {
                match change.to {
                    Some(to) => writeln!(
                        f,
                        "  {}: {} -> {}",
                        change.name,
                        short_or_none(change.from.as_ref()),
                        to.short()
                    )?,
                    None => writeln!(f, "  {}: deleted", change.name)?,
                }
            }
        }

        if let Some(mv) = &self.working {
            let keep = if mv.keep { " (keeping working files)" } else { "" };
            writeln!(
                f,
                "working parent: {} -> {}{keep}",
                mv.from.short(),
                mv.to.short()
            )?;
        }

        if !self.hide.is_empty() || !self.reveal.is_empty() {
            writeln!(f, "commits:")?;
            for h in &self.hide {
                match h.successor {
                    Some(s) => writeln!(f, "  hide    {} (undone to {})", h.commit.short(), s.short())?,
                    None => writeln!(f, "  hide    {}", h.commit.short())?,
                }
            }
            for id in &self.reveal {
                writeln!(f, "  restore {}", id.short())?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.applied {
            write!(f, "restored {}", self.plan)
        } else {
            write!(f, "would restore {}", self.plan)
        }
    }
}
