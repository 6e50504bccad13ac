//! Target definitions: the read-only description of the build graph that the
//! scheduler consumes.  Definitions are supplied by a `Definitions`
//! implementation (see `load` for the TOML-backed one) and never mutated by
//! the core.

use crate::eval::Env;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Settings for one run that are visible to target actions.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Default build mode, e.g. "debug".
    pub mode: String,
    /// Build output directory; also the first key of the status store.
    pub build_dir: String,
    /// Installation prefix.
    pub prefix: String,
    /// Directory holding the definitions.
    pub project: String,
}

impl Default for BuildEnv {
    fn default() -> Self {
        BuildEnv {
            mode: "debug".to_owned(),
            build_dir: "build".to_owned(),
            prefix: "/usr/local".to_owned(),
            project: ".".to_owned(),
        }
    }
}

/// The view of a target handed to its action.
pub struct Invocation<'a> {
    pub name: &'a str,
    pub mode: &'a str,
    pub env: &'a BuildEnv,
}

impl<'a> Env for Invocation<'a> {
    fn get_var(&self, var: &str) -> Option<Cow<str>> {
        let val = match var {
            "name" => self.name,
            "mode" => self.mode,
            "build" => &self.env.build_dir,
            "prefix" => &self.env.prefix,
            "project" => &self.env.project,
            _ => return None,
        };
        Some(Cow::Borrowed(val))
    }
}

pub type ArgsFn = Box<dyn Fn(&Invocation) -> Vec<String>>;
pub type CallableFn = Box<dyn Fn(&Invocation) -> bool>;
pub type Predicate = Box<dyn Fn() -> bool>;
pub type Hook = Box<dyn Fn()>;

/// What a target does when it is rebuilt.
#[derive(Default)]
pub enum Action {
    /// Nothing to execute; the target only aggregates other targets.
    #[default]
    None,
    /// An external program; the closure produces its argument list, which
    /// may depend on the mode.
    Command(ArgsFn),
    /// An in-process function; true means success.
    Callable(CallableFn),
}

impl Action {
    /// An external command with a fixed argument list.
    pub fn command<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        Self::command_with(move |_| argv.clone())
    }

    /// An external command whose argument list is computed per invocation.
    pub fn command_with(f: impl Fn(&Invocation) -> Vec<String> + 'static) -> Self {
        Action::Command(Box::new(f))
    }

    pub fn callable(f: impl Fn(&Invocation) -> bool + 'static) -> Self {
        Action::Callable(Box::new(f))
    }

    /// Whether running this action would do anything.  An external command
    /// whose argument list is empty does not.
    pub fn has_work(&self, inv: &Invocation) -> bool {
        match self {
            Action::None => false,
            Action::Command(f) => !f(inv).is_empty(),
            Action::Callable(_) => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Action::Callable(_))
    }

    /// The argument list of an external command; empty for other actions.
    pub fn args(&self, inv: &Invocation) -> Vec<String> {
        match self {
            Action::Command(f) => f(inv),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::None => write!(f, "None"),
            Action::Command(_) => write!(f, "Command(..)"),
            Action::Callable(_) => write!(f, "Callable(..)"),
        }
    }
}

/// One named node of the build graph, as declared by the project.
#[derive(Default)]
pub struct TargetDef {
    pub doc: String,
    /// Virtual targets have no on-disk artifact and no content hash.
    pub is_virtual: bool,
    pub sources: Vec<String>,
    pub deps: Vec<String>,
    /// Targets built alongside this one.
    pub targets: Vec<String>,
    pub action: Action,
    pub requirements: Vec<Predicate>,
    /// Extra string folded into the content hash.
    pub hash: Option<String>,
    /// Run once per run, before the dependencies are visited.
    pub setup: Option<Hook>,
    /// Running this target clears the recorded state of the current build
    /// directory and mode.
    pub clean: bool,
}

/// Read-only lookup of target definitions by name.
pub trait Definitions {
    fn get(&self, name: &str) -> Option<&TargetDef>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// The plain map-backed Definitions.
#[derive(Default)]
pub struct DefMap(FxHashMap<String, TargetDef>);

impl DefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, def: TargetDef) {
        self.0.insert(name.into(), def);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Definitions for DefMap {
    fn get(&self, name: &str) -> Option<&TargetDef> {
        self.0.get(name)
    }
}
