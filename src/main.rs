use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rewind::args::{HistoryArgs, RedoArgs, UndoArgs};
use rewind::config::RewindConfig;
use rewind::store::UndoLog;
use rewind::{CommandRunner, GRAPH_FILE, META_DIR, Recorder, UndoEngine, history, telemetry};
use rewind_graph::{CommitGraph, MemoryGraph};

mod repo_cmd;

/// Undo and redo for repository state
///
/// Every command that changes bookmarks, visible commits, or the working
/// parent is recorded in an undo log. `undo` steps back through recorded
/// states, `redo` cancels undos, and `history` shows what was recorded.
///
/// QUICK START:
///
///   rewind init
///   rewind write notes.txt "hello"
///   rewind commit -m "first"
///   rewind amend -m "first, reworded"
///   rewind undo            # back to "first"
///   rewind redo            # forward to "first, reworded"
///   rewind history --list
#[derive(Parser)]
#[command(name = "rewind")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'rewind <command> --help' for more information on a specific command.")]
struct Cli {
    /// Repository root (default: current directory)
    #[arg(short = 'R', long, global = true, env = "REWIND_REPO", value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty repository
    Init,

    #[command(flatten)]
    Repo(repo_cmd::RepoCommands),

    /// Return to an earlier recorded state
    ///
    /// Repeated undos walk further back. With --branch, only the local
    /// branch of the given commit changes.
    Undo(UndoArgs),

    /// Cancel the most recent undo
    Redo(RedoArgs),

    /// List or inspect recorded states
    History(HistoryArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let output = match cli.command {
        Commands::Init => repo_cmd::init(&root)?,
        Commands::Repo(cmd) => {
            let mut session = Session::open(&root)?;
            let tokens = cmd.tokens();
            session
                .runner
                .run(&mut session.graph, &tokens, |inv| cmd.run(inv.graph_mut()))?
        }
        Commands::Undo(args) => Session::open(&root)?.undo(args)?,
        Commands::Redo(args) => Session::open(&root)?.redo(&args)?,
        Commands::History(args) => Session::open(&root)?.history(&args)?,
    };
    print!("{output}");
    Ok(())
}

/// An opened repository with the recorder hooked into its command runner.
struct Session {
    config: RewindConfig,
    graph: MemoryGraph,
    runner: CommandRunner<MemoryGraph>,
    engine: UndoEngine,
}

impl Session {
    fn open(root: &Path) -> Result<Self> {
        let meta = root.join(META_DIR);
        if !meta.is_dir() {
            bail!(
                "no rewind repository at {}\n  To fix: create one with:\n    rewind init",
                root.display()
            );
        }
        let config = RewindConfig::load_for_repo(root)?;
        let graph = MemoryGraph::open(&meta.join(GRAPH_FILE))?;
        let mut runner = CommandRunner::new();
        runner.register(Recorder::for_repo(root, config.undo.clone()));
        Ok(Self {
            config,
            graph,
            runner,
            engine: UndoEngine::for_repo(root),
        })
    }

    fn undo(mut self, mut args: UndoArgs) -> Result<String> {
        // Record the branch as a full id; `.` or a bookmark may mean
        // something else by the time redo reads it back.
        if let Some(spec) = &args.branch
            && let Ok(id) = self.graph.resolve(spec)
        {
            args.branch = Some(id.to_string());
        }
        let engine = &self.engine;
        self.runner.run(&mut self.graph, &args.to_tokens(), |inv| {
            let outcome = engine.undo(inv.graph_mut(), &args)?;
            Ok(outcome.to_string())
        })
    }

    fn redo(mut self, args: &RedoArgs) -> Result<String> {
        let engine = &self.engine;
        self.runner.run(&mut self.graph, &args.to_tokens(), |inv| {
            let outcome = engine.redo(inv.graph_mut(), args.preview)?;
            Ok(outcome.to_string())
        })
    }

    fn history(mut self, args: &HistoryArgs) -> Result<String> {
        let (engine, list_len) = (&self.engine, self.config.undo.history_list_len);
        self.runner
            .run(&mut self.graph, &["history".to_owned()], |inv| {
                let log = UndoLog::open(engine.layout())?;
                let format = args.format.unwrap_or_default();
                if args.list {
                    format.render(&history::list(&log, args.position.unwrap_or(0), list_len)?)
                } else {
                    let reverse = args.index.or(args.position).unwrap_or(0);
                    format.render(&history::detail_with_changes(&log, inv.graph(), reverse)?)
                }
            })
    }
}
