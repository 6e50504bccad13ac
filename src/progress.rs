//! Build progress reporting, for the purpose of display to the user.

use crate::task::Termination;
use std::cell::RefCell;

/// Trait for build progress notifications.
pub trait Progress {
    /// Called when a task starts.  `argv` is empty for in-process actions.
    fn task_started(&self, name: &str, argv: &[String]);

    /// Called when a task completes.
    fn task_finished(&self, name: &str, argv: &[String], termination: Termination);

    /// Log a line of output, e.g. a target skipped for a missing requirement.
    fn log(&self, msg: &str);
}

/// Render an argument list so it can be pasted into a shell.
pub fn quote_args(argv: &[String]) -> String {
    let mut out = String::new();
    for arg in argv {
        if !out.is_empty() {
            out.push(' ');
        }
        let plain = !arg.is_empty()
            && arg
                .bytes()
                .all(|c| c.is_ascii_alphanumeric() || b"-_./=:,+@%".contains(&c));
        if plain {
            out.push_str(arg);
        } else {
            out.push('\'');
            out.push_str(&arg.replace('\'', "'\\''"));
            out.push('\'');
        }
    }
    out
}

/// Progress implementation for a plain console, without any overprinting.
#[derive(Default)]
pub struct ConsoleProgress {
    /// Whether to print command lines of started programs.
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        ConsoleProgress { verbose }
    }
}

impl Progress for ConsoleProgress {
    fn task_started(&self, name: &str, argv: &[String]) {
        if self.verbose && !argv.is_empty() {
            self.log(&quote_args(argv));
        } else {
            self.log(&format!("building: {}", name));
        }
    }

    fn task_finished(&self, name: &str, argv: &[String], termination: Termination) {
        match termination {
            Termination::Success => {}
            Termination::Interrupted => self.log(&format!("interrupted: {}", name)),
            Termination::Failure => {
                self.log(&format!("failed: {}", name));
                if !argv.is_empty() {
                    self.log(&quote_args(argv));
                }
            }
        }
    }

    fn log(&self, msg: &str) {
        println!("{}", msg);
    }
}

/// Progress that discards everything.
pub struct NoProgress;

impl Progress for NoProgress {
    fn task_started(&self, _name: &str, _argv: &[String]) {}
    fn task_finished(&self, _name: &str, _argv: &[String], _termination: Termination) {}
    fn log(&self, _msg: &str) {}
}

/// Progress that remembers events, for inspecting a build after the fact.
#[derive(Default)]
pub struct RecordingProgress {
    events: RefCell<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events so far, e.g. "started a", "finished a ok", "failed a", "log ...".
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Progress for RecordingProgress {
    fn task_started(&self, name: &str, _argv: &[String]) {
        self.push(format!("started {}", name));
    }

    fn task_finished(&self, name: &str, _argv: &[String], termination: Termination) {
        self.push(match termination {
            Termination::Success => format!("finished {}", name),
            _ => format!("failed {}", name),
        });
    }

    fn log(&self, msg: &str) {
        self.push(format!("log {}", msg));
    }
}
