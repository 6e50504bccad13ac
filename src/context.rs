//! The scheduling context: state shared by every target and task of one run.
//!
//! All mutation happens on the single thread driving the build, so the
//! admission counters are plain integers.  The target registry lives here
//! too; `Context::target` is the only way to construct a Target, which keeps
//! exactly one Target per name.

use crate::db::Hashes;
use crate::def::{BuildEnv, Definitions};
use crate::densemap::{self, DenseMap};
use crate::progress::Progress;
use crate::target::Target;
use anyhow::bail;
use rustc_hash::FxHashMap;

/// Tracks concurrency "slots" -- small integers assigned to running tasks,
/// used to put overlapping tasks on different tracks in a performance trace.
#[derive(Default)]
struct Slots {
    /// An entry is true when claimed, false or nonexistent otherwise.
    slots: Vec<bool>,
}

impl Slots {
    fn claim(&mut self) -> usize {
        match self.slots.iter().position(|&used| !used) {
            Some(idx) => {
                self.slots[idx] = true;
                idx
            }
            None => {
                self.slots.push(true);
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) {
        self.slots[slot] = false;
    }
}

/// Admission control and run statistics.
pub struct Scheduler {
    running: usize,
    limit: usize,
    failed: bool,
    completed: usize,
    max_running: usize,
    slots: Slots,
}

impl Scheduler {
    pub fn new(limit: usize) -> Self {
        Scheduler {
            running: 0,
            limit: limit.max(1),
            failed: false,
            completed: 0,
            max_running: 0,
            slots: Slots::default(),
        }
    }

    pub fn can_start_more(&self) -> bool {
        self.running < self.limit
    }

    /// Record a task start, returning its slot.
    pub fn mark_started(&mut self) -> usize {
        self.running += 1;
        self.max_running = self.max_running.max(self.running);
        self.slots.claim()
    }

    /// Record a task completion; must pair with one mark_started().
    pub fn mark_completed(&mut self, slot: usize) {
        self.running -= 1;
        self.completed += 1;
        self.slots.release(slot);
    }

    /// Once set, no new task is admitted for the rest of the run.
    pub fn set_failed(&mut self) {
        self.failed = true;
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TargetId(usize);

impl densemap::Index for TargetId {
    fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for TargetId {
    fn from(u: usize) -> TargetId {
        TargetId(u)
    }
}

pub struct Context<'a> {
    pub(crate) defs: &'a dyn Definitions,
    pub(crate) env: &'a BuildEnv,
    /// Hashes recorded by the previous run for this build dir and mode.
    pub(crate) last: &'a Hashes,
    pub(crate) progress: &'a dyn Progress,
    pub(crate) sched: Scheduler,
    pub(crate) targets: DenseMap<TargetId, Target<'a>>,
    ids: FxHashMap<String, TargetId>,
    /// Targets whose prime() is on the stack, for cycle detection.
    pub(crate) priming: Vec<TargetId>,
    /// Set when a `clean` target's task has started.
    pub(crate) clear_state: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        defs: &'a dyn Definitions,
        env: &'a BuildEnv,
        last: &'a Hashes,
        progress: &'a dyn Progress,
        parallelism: usize,
    ) -> Self {
        Context {
            defs,
            env,
            last,
            progress,
            sched: Scheduler::new(parallelism),
            targets: DenseMap::default(),
            ids: FxHashMap::default(),
            priming: Vec::new(),
            clear_state: false,
        }
    }

    /// The Target for `name`, created on first reference.
    pub fn target(&mut self, name: &str) -> anyhow::Result<TargetId> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let def = match self.defs.get(name) {
            Some(def) => def,
            None => bail!("unknown target {:?}", name),
        };
        let id = self
            .targets
            .push(Target::new(name.to_owned(), self.env.mode.clone(), def));
        self.ids.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<TargetId> {
        self.ids.get(name).copied()
    }

    pub fn get(&self, id: TargetId) -> &Target<'a> {
        &self.targets[id]
    }

    pub fn sched(&self) -> &Scheduler {
        &self.sched
    }

    pub fn env(&self) -> &BuildEnv {
        self.env
    }

    pub fn clears_state(&self) -> bool {
        self.clear_state
    }
}
