//! Runs target actions.
//!
//! External commands are spawned without blocking and checked with
//! `try_wait()`; parallelism comes only from having several children alive
//! at once.  In-process callables run to completion when started and report
//! their result on the next poll, so both kinds look the same to the
//! scheduler.

use crate::context::Scheduler;
use crate::def::{Action, Invocation};
use crate::progress::Progress;
use crate::trace;
use anyhow::{bail, Context};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Termination {
    Success,
    Interrupted,
    Failure,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Not started yet.
    Default,
    Running,
    Rebuilt,
    Failure,
}

enum Execution {
    Process(Child),
    /// A callable that already ran, or a command that couldn't be spawned.
    Finished(Termination, i32),
}

fn classify(status: ExitStatus) -> (Termination, i32) {
    if status.success() {
        return (Termination::Success, 0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(libc::SIGINT) {
            return (Termination::Interrupted, 1);
        }
    }
    (Termination::Failure, status.code().filter(|&c| c != 0).unwrap_or(1))
}

pub struct Task {
    state: TaskState,
    handle: Option<Execution>,
    /// Resolved when the task starts; empty for callables.
    argv: Vec<String>,
    code: i32,
    slot: usize,
    started: Option<Instant>,
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

impl Task {
    pub fn new() -> Self {
        Task {
            state: TaskState::Default,
            handle: None,
            argv: Vec::new(),
            code: 0,
            slot: 0,
            started: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn has_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    /// Try to launch the action.  Refuses when the scheduler is at its
    /// ceiling, or when some task already failed, in which case this task
    /// fails without running.
    pub fn start(
        &mut self,
        sched: &mut Scheduler,
        action: &Action,
        inv: &Invocation,
        progress: &dyn Progress,
    ) -> bool {
        if self.state != TaskState::Default {
            return false;
        }
        if sched.failed() {
            self.state = TaskState::Failure;
            self.code = 1;
            return false;
        }
        if !sched.can_start_more() {
            return false;
        }
        self.slot = sched.mark_started();
        self.started = Some(Instant::now());
        self.state = TaskState::Running;
        tracing::debug!(
            name = inv.name,
            running = sched.running(),
            limit = sched.limit(),
            "start"
        );

        let execution = match action {
            Action::Callable(f) => {
                progress.task_started(inv.name, &[]);
                if f(inv) {
                    Execution::Finished(Termination::Success, 0)
                } else {
                    Execution::Finished(Termination::Failure, 1)
                }
            }
            _ => {
                self.argv = action.args(inv);
                progress.task_started(inv.name, &self.argv);
                self.spawn(progress)
            }
        };
        self.handle = Some(execution);
        true
    }

    fn spawn(&self, progress: &dyn Progress) -> Execution {
        let (program, args) = match self.argv.split_first() {
            Some(split) => split,
            None => return Execution::Finished(Termination::Success, 0),
        };
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(child) => Execution::Process(child),
            Err(err) => {
                progress.log(&format!("{}: {}", program, err));
                Execution::Finished(Termination::Failure, 127)
            }
        }
    }

    /// Advance the task without blocking: start it if possible, then check
    /// for completion.  Returns the exit code once finished.
    pub fn poll(
        &mut self,
        sched: &mut Scheduler,
        action: &Action,
        inv: &Invocation,
        progress: &dyn Progress,
    ) -> anyhow::Result<Option<i32>> {
        match self.state {
            TaskState::Rebuilt => return Ok(Some(0)),
            TaskState::Failure => return Ok(Some(self.code)),
            TaskState::Default => {
                if !self.start(sched, action, inv, progress) {
                    return Ok(match self.state {
                        TaskState::Failure => Some(self.code),
                        _ => None,
                    });
                }
            }
            TaskState::Running => {}
        }
        let done = match &mut self.handle {
            Some(Execution::Process(child)) => match child
                .try_wait()
                .with_context(|| format!("poll {}", inv.name))?
            {
                Some(status) => classify(status),
                None => return Ok(None),
            },
            Some(Execution::Finished(termination, code)) => (*termination, *code),
            None => bail!("task for {} is running without an execution", inv.name),
        };
        self.finish(sched, inv.name, done, progress);
        Ok(Some(self.code))
    }

    /// Block until a started task completes, returning its exit code.
    pub fn wait(
        &mut self,
        sched: &mut Scheduler,
        inv: &Invocation,
        progress: &dyn Progress,
    ) -> anyhow::Result<i32> {
        match self.state {
            TaskState::Rebuilt => return Ok(0),
            TaskState::Failure => return Ok(self.code),
            TaskState::Default => bail!("task for {} waited on before starting", inv.name),
            TaskState::Running => {}
        }
        let done = match &mut self.handle {
            Some(Execution::Process(child)) => {
                classify(child.wait().with_context(|| format!("wait {}", inv.name))?)
            }
            Some(Execution::Finished(termination, code)) => (*termination, *code),
            None => bail!("task for {} is running without an execution", inv.name),
        };
        self.finish(sched, inv.name, done, progress);
        Ok(self.code)
    }

    fn finish(
        &mut self,
        sched: &mut Scheduler,
        name: &str,
        (termination, code): (Termination, i32),
        progress: &dyn Progress,
    ) {
        sched.mark_completed(self.slot);
        if let Some(start) = self.started {
            trace::task(name, self.slot, start, Instant::now());
        }
        self.handle = None;
        self.code = code;
        progress.task_finished(name, &self.argv, termination);
        if termination == Termination::Success {
            self.state = TaskState::Rebuilt;
        } else {
            self.state = TaskState::Failure;
            sched.set_failed();
        }
        tracing::debug!(name, code, running = sched.running(), "finish");
    }
}
