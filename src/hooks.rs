//! Command dispatch with before/after hooks.
//!
//! A [`CommandRunner`] owns an ordered list of [`CommandHook`]s registered at
//! startup. Each top-level command runs inside an [`Invocation`], which tracks
//! the call depth explicitly: commands started from within another command go
//! through [`Invocation::run`] and do not fire hooks. Only the outermost
//! invocation does, and its `after_command` fires whether the command
//! succeeded or failed.

use std::fmt;

/// Observer of top-level commands.
pub trait CommandHook<G: ?Sized> {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Called before the outermost command runs.
    fn before_command(&self, _graph: &G, _command: &[String]) {}

    /// Called after the outermost command returns.
    fn after_command(&self, _graph: &G, _command: &[String], _succeeded: bool) {}
}

/// Runs commands with the registered hooks around them.
pub struct CommandRunner<G: ?Sized> {
    hooks: Vec<Box<dyn CommandHook<G>>>,
}

impl<G: ?Sized> Default for CommandRunner<G> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<G: ?Sized> fmt::Debug for CommandRunner<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("hooks", &self.hook_names())
            .finish()
    }
}

impl<G: ?Sized> CommandRunner<G> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Hooks fire in registration order.
    pub fn register(&mut self, hook: impl CommandHook<G> + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Names of the registered hooks, in order.
    #[must_use]
    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Run a top-level command.
    ///
    /// # Errors
    /// Whatever `op` returns; hooks never fail the command.
    pub fn run<T, E>(
        &self,
        graph: &mut G,
        command: &[String],
        op: impl FnOnce(&mut Invocation<'_, G>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut invocation = Invocation {
            runner: self,
            graph,
            depth: 0,
        };
        invocation.enter(command, op)
    }
}

/// Execution context of a running command.
pub struct Invocation<'r, G: ?Sized> {
    runner: &'r CommandRunner<G>,
    graph: &'r mut G,
    depth: usize,
}

impl<G: ?Sized> Invocation<'_, G> {
    /// The graph the command operates on.
    #[must_use]
    pub fn graph(&self) -> &G {
        &*self.graph
    }

    /// Mutable access to the graph.
    pub fn graph_mut(&mut self) -> &mut G {
        &mut *self.graph
    }

    /// Nesting depth: 1 inside the outermost command, 2 inside a command it
    /// started, and so on.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Run a command from inside the current one. Hooks do not fire.
    ///
    /// # Errors
    /// Whatever `op` returns.
    pub fn run<T, E>(
        &mut self,
        command: &[String],
        op: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.enter(command, op)
    }

    fn enter<T, E>(
        &mut self,
        command: &[String],
        op: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let runner = self.runner;
        let outermost = self.depth == 0;
        if outermost {
            for hook in &runner.hooks {
                hook.before_command(&*self.graph, command);
            }
        } else {
            tracing::debug!(depth = self.depth, command = ?command, "nested command; hooks skipped");
        }

        self.depth += 1;
        let result = op(self);
        self.depth -= 1;

        if outermost {
            for hook in &runner.hooks {
                hook.after_command(&*self.graph, command, result.is_ok());
            }
        }
        result
    }
}
