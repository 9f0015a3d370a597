//! Commands that edit the repository directly: commits, bookmarks, the
//! working state. Each one is a single graph transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use rewind_graph::{CommitGraph, CommitId, MemoryGraph};

use rewind::META_DIR;
use rewind::store::StorageLayout;

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Commit the working state as a new draft child of the working parent
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Replace the working parent with a commit of the working state
    Amend {
        #[arg(short, long)]
        message: String,
    },

    /// Create, move, or delete a bookmark
    Bookmark {
        name: String,

        /// Commit to point at (default: the working parent)
        #[arg(short, long, value_name = "REV")]
        rev: Option<String>,

        /// Delete the bookmark
        #[arg(short, long, conflicts_with = "rev")]
        delete: bool,
    },

    /// Move the working state to another commit
    Update { rev: String },

    /// Make a commit and its ancestors public
    Publish { rev: String },

    /// Write a tracked file in the working state
    Write { path: String, content: String },

    /// Remove a tracked file from the working state
    Rm { path: String },

    /// Show visible commits
    Log,

    /// Show the working parent and uncommitted changes
    Status,
}

impl RepoCommands {
    /// Canonical tokens recorded in the undo log.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::Commit { message } => vec!["commit".into(), "-m".into(), message.clone()],
            Self::Amend { message } => vec!["amend".into(), "-m".into(), message.clone()],
            Self::Bookmark { name, rev, delete } => {
                let mut t = vec!["bookmark".into(), name.clone()];
                if let Some(rev) = rev {
                    t.push(format!("--rev={rev}"));
                }
                if *delete {
                    t.push("--delete".into());
                }
                t
            }
            Self::Update { rev } => vec!["update".into(), rev.clone()],
            Self::Publish { rev } => vec!["publish".into(), rev.clone()],
            Self::Write { path, content } => vec!["write".into(), path.clone(), content.clone()],
            Self::Rm { path } => vec!["rm".into(), path.clone()],
            Self::Log => vec!["log".into()],
            Self::Status => vec!["status".into()],
        }
    }

    /// Run the command and return its output.
    pub fn run(self, graph: &mut MemoryGraph) -> Result<String> {
        match self {
            Self::Commit { message } => {
                let id = graph.transact("commit", |g| MemoryGraph::commit(g, &message))?;
                Ok(format!("created {}\n", id.short()))
            }
            Self::Amend { message } => {
                let old = graph.working_parent()?;
                let new = graph.transact("amend", |g| g.amend(&message))?;
                Ok(format!("amended {} -> {}\n", old.short(), new.short()))
            }
            Self::Bookmark { name, rev, delete } => {
                if delete {
                    graph.transact("bookmark", |g| g.delete_bookmark(&name))?;
                    return Ok(format!("deleted bookmark {name}\n"));
                }
                let target = graph.resolve(rev.as_deref().unwrap_or("."))?;
                if target.is_null() {
                    bail!("can't bookmark the null commit\n  To fix: commit first, or pass --rev");
                }
                graph.transact("bookmark", |g| g.set_bookmark(&name, target))?;
                Ok(format!("bookmark {name} -> {}\n", target.short()))
            }
            Self::Update { rev } => {
                let target = graph.resolve(&rev)?;
                if graph.is_dirty()? {
                    bail!(
                        "uncommitted changes in working state\n  To fix: commit them first:\n    rewind commit -m <message>"
                    );
                }
                graph.transact("update", |g| g.update_working(&target))?;
                Ok(format!("working parent is now {}\n", target.short()))
            }
            Self::Publish { rev } => {
                let target = graph.resolve(&rev)?;
                graph.transact("publish", |g| g.publish(&target))?;
                Ok(format!("published {}\n", target.short()))
            }
            Self::Write { path, content } => {
                graph.transact("write", |g| g.write_file(&path, &content))?;
                Ok(String::new())
            }
            Self::Rm { path } => {
                graph.transact("rm", |g| g.remove_file(&path))?;
                Ok(String::new())
            }
            Self::Log => render_log(graph),
            Self::Status => render_status(graph),
        }
    }
}

/// Create the metadata directory, an empty graph, and the undo log directory.
pub fn init(root: &Path) -> Result<String> {
    let meta = root.join(META_DIR);
    let graph_path = meta.join(rewind::GRAPH_FILE);
    if graph_path.exists() {
        bail!(
            "repository already initialized at {}\n  To fix: use the existing repository, or remove {} first",
            root.display(),
            meta.display()
        );
    }
    MemoryGraph::init(&graph_path)?;
    let layout = StorageLayout::for_repo(root);
    layout
        .ensure()
        .with_context(|| format!("creating {}", layout.dir().display()))?;
    Ok(format!("initialized rewind repository in {}\n", root.display()))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_log(graph: &MemoryGraph) -> Result<String> {
    let working = graph.working_parent()?;
    let mut names: BTreeMap<CommitId, Vec<&String>> = BTreeMap::new();
    let bookmarks = graph.bookmarks()?;
    for (name, id) in &bookmarks {
        names.entry(*id).or_default().push(name);
    }

    let mut out = String::new();
    for id in newest_first(graph) {
        let Some(record) = graph.commit_record(&id) else {
            continue;
        };
        let marker = if id == working { '@' } else { 'o' };
        let labels = names.get(&id).map_or_else(String::new, |n| {
            format!(
                " [{}]",
                n.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )
        });
        out.push_str(&format!(
            "{marker} {} {}{labels} {}\n",
            id.short(),
            record.phase,
            record.message
        ));
    }
    Ok(out)
}

/// Visible commits, children before parents, ties by id.
fn newest_first(graph: &MemoryGraph) -> Vec<CommitId> {
    let visible = graph.visible_commits();
    let mut depth: BTreeMap<CommitId, usize> = BTreeMap::new();
    let mut pending: Vec<CommitId> = visible.clone();
    while let Some(id) = pending.pop() {
        if depth.contains_key(&id) {
            continue;
        }
        let parents = graph
            .commit_record(&id)
            .map(|r| r.parents.clone())
            .unwrap_or_default();
        let missing: Vec<CommitId> = parents
            .iter()
            .filter(|p| !depth.contains_key(*p))
            .copied()
            .collect();
        if missing.is_empty() {
            let d = parents.iter().filter_map(|p| depth.get(p)).max().map_or(0, |d| d + 1);
            depth.insert(id, d);
        } else {
            pending.push(id);
            pending.extend(missing);
        }
    }
    let mut ordered = visible;
    ordered.sort_by(|a, b| depth[b].cmp(&depth[a]).then(a.cmp(b)));
    ordered
}

fn render_status(graph: &MemoryGraph) -> Result<String> {
    let parent = graph.working_parent()?;
    let mut out = format!("working parent: {}\n", parent.short());
    if let Some(op) = graph.unfinished_operation() {
        out.push_str(&format!("unfinished {op} in progress\n"));
    }
    let working = graph.working();
    let mut changed: BTreeSet<(char, String)> = BTreeSet::new();
    for change in graph.manifest_diff(&parent, None)? {
        let code = if change.is_addition() || working.added.contains(&change.path) {
            'A'
        } else if change.is_removal() || working.removed.contains(&change.path) {
            'R'
        } else {
            'M'
        };
        changed.insert((code, change.path));
    }
    if changed.is_empty() {
        out.push_str("no changes\n");
    }
    for (code, path) in changed {
        out.push_str(&format!("{code} {path}\n"));
    }
    Ok(out)
}
