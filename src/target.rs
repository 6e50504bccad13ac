//! Targets: the nodes of the build graph and their state machine.
//!
//! A Target is primed once (deciding whether it needs to run and which other
//! targets it must wait for), then driven to a terminal state by poll() and
//! wait().  Targets refer to each other by TargetId; the Context owns them.

use crate::context::{Context, TargetId};
use crate::def::{Invocation, TargetDef};
use crate::hash;
use crate::task::Task;
use anyhow::{anyhow, bail};
use tracing::debug;

/// How long to sleep between reaping rounds while waiting for a free slot.
const REAP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Not primed yet.
    Default,
    /// A requirement of this target or of a dependency isn't met.
    Missing,
    /// Up to date; nothing to do.
    Skipped,
    /// Needs to run, once everything in `pending` has resolved.
    Pending,
    Rebuilt,
    Failure,
}

impl TargetState {
    fn can_become(self, next: TargetState) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (Default, Missing | Skipped | Pending) | (Pending, Rebuilt | Failure)
        )
    }
}

pub struct Target<'a> {
    name: String,
    mode: String,
    def: &'a TargetDef,
    state: TargetState,
    /// Targets that must resolve before this one's task may start.
    pending: Vec<TargetId>,
    task: Option<Task>,
}

impl<'a> Target<'a> {
    pub(crate) fn new(name: String, mode: String, def: &'a TargetDef) -> Self {
        Target {
            name,
            mode,
            def,
            state: TargetState::Default,
            pending: Vec::new(),
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn pending(&self) -> &[TargetId] {
        &self.pending
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    fn set_state(&mut self, next: TargetState) {
        debug_assert!(
            self.state.can_become(next),
            "{}: bad transition {:?} -> {:?}",
            self.name,
            self.state,
            next
        );
        self.state = next;
    }

    fn is_task_running(&self) -> bool {
        self.task.as_ref().map_or(false, Task::is_running)
    }
}

impl<'a> Context<'a> {
    /// The current content hash of a target, None for virtual targets.
    pub fn content_hash(&self, id: TargetId) -> anyhow::Result<Option<String>> {
        let t = &self.targets[id];
        let inv = Invocation {
            name: &t.name,
            mode: &t.mode,
            env: self.env,
        };
        hash::content_hash(t.def, &inv)
    }

    /// Decide whether a target must run, priming its dependencies and
    /// co-targets first.  Does nothing for an already-primed target.
    pub fn prime(&mut self, id: TargetId, mode: &str) -> anyhow::Result<()> {
        if self.targets[id].state != TargetState::Default {
            return Ok(());
        }
        if let Some(pos) = self.priming.iter().position(|&p| p == id) {
            let mut cycle: Vec<&str> = self.priming[pos..]
                .iter()
                .map(|&p| self.targets[p].name.as_str())
                .collect();
            cycle.push(&self.targets[id].name);
            bail!("dependency cycle: {}", cycle.join(" -> "));
        }

        let t = &mut self.targets[id];
        t.mode = mode.to_owned();
        let def = t.def;
        debug!(name = %t.name, "prime");

        if let Some(setup) = &def.setup {
            setup();
        }

        if !def.requirements.iter().all(|req| req()) {
            let t = &mut self.targets[id];
            self.progress
                .log(&format!("not building {}: missing requirement", t.name));
            t.set_state(TargetState::Missing);
            return Ok(());
        }

        let has_work = {
            let t = &self.targets[id];
            let inv = Invocation {
                name: &t.name,
                mode: &t.mode,
                env: self.env,
            };
            def.action.has_work(&inv)
        };
        let mut rebuild = if def.is_virtual {
            has_work
        } else {
            let hash = self.content_hash(id)?;
            let name = &self.targets[id].name;
            let last = self.last.get(name).cloned().flatten();
            if last != hash {
                debug!(name = %name, ?last, ?hash, "content hash changed");
                true
            } else {
                false
            }
        };

        self.priming.push(id);
        let pending = self.prime_children(def, mode, &mut rebuild);
        self.priming.pop();

        let t = &mut self.targets[id];
        match pending? {
            None => {
                t.pending.clear();
                t.set_state(TargetState::Missing);
            }
            Some(pending) => {
                t.pending = pending;
                if rebuild {
                    t.set_state(TargetState::Pending);
                    if has_work {
                        t.task = Some(Task::new());
                    }
                } else {
                    t.set_state(TargetState::Skipped);
                }
            }
        }
        Ok(())
    }

    /// Prime dependencies then co-targets, collecting the ones that are not
    /// up to date.  Returns None if any of them is Missing.
    fn prime_children(
        &mut self,
        def: &TargetDef,
        mode: &str,
        rebuild: &mut bool,
    ) -> anyhow::Result<Option<Vec<TargetId>>> {
        let mut pending = Vec::new();
        for name in def.deps.iter().chain(def.targets.iter()) {
            let child = self.target(name)?;
            self.prime(child, mode)?;
            match self.targets[child].state {
                TargetState::Missing => return Ok(None),
                TargetState::Skipped => {}
                _ => {
                    if !*rebuild {
                        debug!(name = %name, "out of date child forces rebuild");
                    }
                    *rebuild = true;
                    pending.push(child);
                }
            }
        }
        Ok(Some(pending))
    }

    /// Advance a target without blocking.  Returns its exit code once it has
    /// resolved, None while work is still in flight.
    pub fn poll(&mut self, id: TargetId) -> anyhow::Result<Option<i32>> {
        match self.targets[id].state {
            TargetState::Skipped | TargetState::Rebuilt => return Ok(Some(0)),
            TargetState::Failure | TargetState::Missing => return Ok(Some(1)),
            TargetState::Default => bail!("{} polled before priming", self.targets[id].name),
            TargetState::Pending => {}
        }

        // Poll every entry so that independent siblings all get a chance to
        // start, even when an earlier one is still running.
        let mut waiting = false;
        let mut failed = None;
        for i in 0..self.targets[id].pending.len() {
            let p = self.targets[id].pending[i];
            match self.poll(p)? {
                None => waiting = true,
                Some(0) => {}
                Some(code) => {
                    failed.get_or_insert(code);
                }
            }
        }
        if let Some(code) = failed {
            self.targets[id].set_state(TargetState::Failure);
            return Ok(Some(code));
        }
        if waiting {
            return Ok(None);
        }

        if self.targets[id].task.is_none() {
            self.targets[id].set_state(TargetState::Rebuilt);
            return Ok(Some(0));
        }
        let result = self.poll_task(id)?;
        self.adopt(id, result);
        Ok(result)
    }

    /// Block until a target resolves.
    pub fn wait(&mut self, id: TargetId) -> anyhow::Result<()> {
        if self.targets[id].state != TargetState::Pending {
            return Ok(());
        }
        if self.poll(id)?.is_some() {
            return Ok(());
        }
        for i in 0..self.targets[id].pending.len() {
            let p = self.targets[id].pending[i];
            self.wait(p)?;
            if self.poll(id)?.is_some() {
                return Ok(());
            }
        }
        // Every pending entry resolved cleanly, so only the task remains.
        let code = self.wait_task(id)?;
        self.adopt(id, Some(code));
        Ok(())
    }

    /// Wait for every task that is still running, e.g. siblings of a failed
    /// target, and record their outcome.
    pub fn drain(&mut self) -> anyhow::Result<()> {
        for id in self.targets.all_ids() {
            let t = &self.targets[id];
            let started = t.task.as_ref().map_or(false, Task::has_started);
            if t.state == TargetState::Pending && started {
                self.wait_task(id)?;
                self.poll(id)?;
            }
        }
        Ok(())
    }

    fn adopt(&mut self, id: TargetId, result: Option<i32>) {
        let t = &mut self.targets[id];
        if t.state != TargetState::Pending {
            return;
        }
        match result {
            Some(0) => t.set_state(TargetState::Rebuilt),
            Some(_) => t.set_state(TargetState::Failure),
            None => {}
        }
    }

    fn poll_task(&mut self, id: TargetId) -> anyhow::Result<Option<i32>> {
        let Target {
            name,
            mode,
            def,
            task,
            ..
        } = &mut self.targets[id];
        let task = match task {
            Some(task) => task,
            None => return Ok(Some(0)),
        };
        let inv = Invocation {
            name,
            mode,
            env: self.env,
        };
        let was_started = task.has_started();
        let result = task.poll(&mut self.sched, &def.action, &inv, self.progress)?;
        if def.clean && !was_started && task.has_started() {
            self.clear_state = true;
        }
        Ok(result)
    }

    /// Start a target's task, waiting for a free slot if needed, then block
    /// until it completes.
    fn wait_task(&mut self, id: TargetId) -> anyhow::Result<i32> {
        loop {
            if let Some(code) = self.poll_task(id)? {
                return Ok(code);
            }
            if self.targets[id].is_task_running() {
                break;
            }
            // Deferred for lack of a slot: free one by reaping finished tasks.
            if !self.reap()? {
                std::thread::sleep(REAP_INTERVAL);
            }
        }
        let Target {
            name, mode, task, ..
        } = &mut self.targets[id];
        let task = task
            .as_mut()
            .ok_or_else(|| anyhow!("{} has no task to wait on", name))?;
        let inv = Invocation {
            name,
            mode,
            env: self.env,
        };
        task.wait(&mut self.sched, &inv, self.progress)
    }

    /// Check every running task once.  Returns whether any finished.
    fn reap(&mut self) -> anyhow::Result<bool> {
        let mut reaped = false;
        for id in self.targets.all_ids() {
            if self.targets[id].is_task_running() && self.poll_task(id)?.is_some() {
                reaped = true;
            }
        }
        Ok(reaped)
    }
}
