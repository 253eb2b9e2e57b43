//! Console command table and dispatcher.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    args::{Args, MAX_ARG_LEN},
    job::{JobDone, JobQueue},
    Console, Result,
};

/// Command handler.
///
/// Receives the dispatcher, giving access to the session context, and the
/// arguments following the command name.
pub type Handler<C> = fn(&Arc<Dispatcher<C>>, &mut Args<'_>) -> Result<()>;

/// Console command.
pub struct Command<C: 'static> {
    /// Name matched exactly against the first word of a line.
    pub name: &'static str,
    /// Handler.
    pub handler: Handler<C>,
    /// Help text shown after the name.
    pub help: &'static str,
    /// Run as a background job when entered on the console.
    pub is_job: bool,
}

impl<C: 'static> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).field("is_job", &self.is_job).finish()
    }
}

/// Where a command line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Entered on the console.
    Console,
    /// Re-entered from a background job.
    Job,
}

/// Outcome of dispatching a line.
#[derive(Debug)]
pub enum Dispatch {
    /// Handler ran to completion.
    Handled,
    /// Line was queued as a background job.
    Spawned(JobDone),
    /// No command matched.
    Unknown,
}

/// Routes console lines to the handlers of a command table.
pub struct Dispatcher<C: 'static> {
    commands: &'static [Command<C>],
    context: C,
    console: Console,
    jobs: JobQueue,
    done: AtomicBool,
}

impl<C: 'static> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands.len())
            .field("jobs", &self.jobs)
            .field("done", &self.done.load(Ordering::SeqCst))
            .finish()
    }
}

impl<C> Dispatcher<C>
where
    C: Send + Sync + 'static,
{
    /// Creates a dispatcher for `commands` operating on the session `context`.
    pub fn new(commands: &'static [Command<C>], context: C, console: Console, jobs: JobQueue) -> Arc<Self> {
        Arc::new(Self { commands, context, console, jobs, done: AtomicBool::new(false) })
    }

    /// Session context passed to all handlers.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Console output.
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Background job queue.
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Command table.
    pub fn commands(&self) -> &'static [Command<C>] {
        self.commands
    }

    /// Lists all commands with their help text.
    pub fn print_help(&self) {
        for cmd in self.commands {
            self.console.line(format_args!("{} {}", cmd.name, cmd.help));
        }
    }

    /// Requests the console loop to end.
    pub fn quit(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    /// Whether the console loop should end.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Processes one line.
    ///
    /// Job commands entered on the console are queued and return immediately.
    /// Handler errors are reported on the console.
    pub fn process(self: &Arc<Self>, line: &str, origin: Origin) -> Dispatch {
        let mut args = Args::new(line);
        let name = args.get_str(MAX_ARG_LEN).ok();
        let Some(cmd) = name.and_then(|name| self.commands.iter().find(|cmd| cmd.name == name)) else {
            self.console.line(format_args!("{line} : unknown command"));
            self.print_help();
            return Dispatch::Unknown;
        };

        if cmd.is_job && origin == Origin::Console {
            let this = self.clone();
            let job_line = line.to_string();
            let done = self.jobs.submit(move || {
                this.console.line(format_args!("cmdjob starting ({job_line})"));
                this.process(&job_line, Origin::Job);
                this.console.line("cmdjob terminating");
            });
            return Dispatch::Spawned(done);
        }

        log::debug!("Running command {}", cmd.name);
        if let Err(err) = (cmd.handler)(self, &mut args) {
            log::debug!("Command {} failed: {err:?}", cmd.name);
            self.console.line(&err);
        }
        Dispatch::Handled
    }
}
