//! Build runner, choosing and executing targets as dependencies complete.

use crate::context::{Context, TargetId};
use crate::db::Hashes;
use crate::def::{BuildEnv, Definitions};
use crate::progress::Progress;
use crate::target::TargetState;
use crate::trace;
use anyhow::anyhow;

/// The names to build for a request: `setup` first when the project defines
/// one, then the requested names, or `all` when none were given.
pub fn requested_names(defs: &dyn Definitions, names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if defs.contains("setup") {
        out.push("setup".to_owned());
    }
    if names.is_empty() {
        out.push("all".to_owned());
    }
    for name in names {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
    out
}

pub struct Work<'a> {
    ctx: Context<'a>,
    /// Top-level targets, in request order.
    wanted: Vec<TargetId>,
}

impl<'a> Work<'a> {
    pub fn new(
        defs: &'a dyn Definitions,
        env: &'a BuildEnv,
        last: &'a Hashes,
        progress: &'a dyn Progress,
        parallelism: usize,
    ) -> Self {
        Work {
            ctx: Context::new(defs, env, last, progress, parallelism),
            wanted: Vec::new(),
        }
    }

    /// Request a target, priming it and everything it depends on.
    pub fn want(&mut self, name: &str) -> anyhow::Result<()> {
        let id = self.ctx.target(name)?;
        let mode = self.ctx.env().mode.clone();
        self.ctx.prime(id, &mode)?;
        if !self.wanted.contains(&id) {
            self.wanted.push(id);
        }
        Ok(())
    }

    /// Drive every wanted target to completion.  Returns the combined exit
    /// code: zero only if every target is up to date or rebuilt.
    pub fn run(&mut self) -> anyhow::Result<i32> {
        let mut code = 0;
        for i in 0..self.wanted.len() {
            let id = self.wanted[i];
            trace::scope("wait", || self.ctx.wait(id))?;
            let result = self
                .ctx
                .poll(id)?
                .ok_or_else(|| anyhow!("{} unresolved after wait", self.ctx.get(id).name()))?;
            code |= result;
        }
        trace::scope("drain", || self.ctx.drain())?;
        Ok(code)
    }

    /// Write this run's outcome into the recorded hashes of the current build
    /// directory and mode.  A rebuilt target whose inputs can't be read is
    /// recorded as null, so it is retried next time.
    pub fn sync_state(&self, hashes: &mut Hashes) {
        if self.ctx.clears_state() {
            hashes.clear();
        }
        for id in self.ctx.targets.all_ids() {
            let t = self.ctx.get(id);
            match t.state() {
                TargetState::Rebuilt => {
                    // Rehash: the action has just rewritten the artifact.
                    let hash = self.ctx.content_hash(id).unwrap_or_else(|err| {
                        tracing::warn!(name = t.name(), "not recording hash: {:#}", err);
                        None
                    });
                    hashes.insert(t.name().to_owned(), hash);
                }
                TargetState::Failure => {
                    hashes.insert(t.name().to_owned(), None);
                }
                _ => {}
            }
        }
    }

    /// Number of tasks that ran.
    pub fn completed(&self) -> usize {
        self.ctx.sched().completed()
    }

    pub fn max_running(&self) -> usize {
        self.ctx.sched().max_running()
    }

    pub fn context(&self) -> &Context<'a> {
        &self.ctx
    }
}
