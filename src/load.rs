//! Loading of target definitions from a TOML file.

use crate::builtin;
use crate::def::{Action, BuildEnv, DefMap, Hook, Invocation, Predicate, TargetDef};
use crate::eval::{Env, EvalString};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DefFile {
    #[serde(default)]
    targets: BTreeMap<String, TargetSpec>,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TargetSpec {
    doc: String,
    #[serde(rename = "virtual")]
    is_virtual: bool,
    sources: Vec<String>,
    deps: Vec<String>,
    targets: Vec<String>,
    cmd: Option<Vec<String>>,
    /// Per-mode overrides of `cmd`.
    mode: BTreeMap<String, ModeSpec>,
    run: Option<Builtin>,
    requires: Vec<Requirement>,
    hash: Option<String>,
    setup: Option<Vec<String>>,
    clean: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModeSpec {
    cmd: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Requirement {
    File(String),
    Program(String),
    Env(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Builtin {
    Touch(Vec<String>),
    Remove(Vec<String>),
    Write { path: String, content: String },
}

fn expand(s: &str, inv: &Invocation) -> String {
    let envs: [&dyn Env; 1] = [inv];
    EvalString::new(s).evaluate(&envs)
}

fn expand_all(list: &[String], inv: &Invocation) -> Vec<String> {
    list.iter().map(|s| expand(s, inv)).collect()
}

/// Search PATH for an executable, the way a shell would.  Names with a slash
/// are checked as given.
pub fn find_program(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                meta.is_file() && meta.permissions().mode() & 0o111 != 0
            }
            #[cfg(not(unix))]
            {
                meta.is_file()
            }
        }
        Err(_) => false,
    }
}

fn requirement(req: Requirement, inv: &Invocation) -> Predicate {
    match req {
        Requirement::File(path) => {
            let path = expand(&path, inv);
            Box::new(move || Path::new(&path).exists())
        }
        Requirement::Program(name) => {
            let name = expand(&name, inv);
            Box::new(move || find_program(&name).is_some())
        }
        Requirement::Env(var) => Box::new(move || std::env::var_os(&var).is_some()),
    }
}

fn setup_hook(name: &str, argv: Vec<String>) -> Hook {
    let name = name.to_owned();
    Box::new(move || {
        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => return,
        };
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(target_name = %name, %status, "setup hook failed"),
            Err(err) => tracing::warn!(target_name = %name, %err, "setup hook failed to start"),
        }
    })
}

fn command_action(cmd: Vec<String>, modes: BTreeMap<String, ModeSpec>) -> Action {
    let modes: BTreeMap<String, Vec<String>> =
        modes.into_iter().map(|(mode, spec)| (mode, spec.cmd)).collect();
    Action::command_with(move |inv| {
        let argv = modes.get(inv.mode).unwrap_or(&cmd);
        expand_all(argv, inv)
    })
}

fn builtin_action(run: Builtin) -> Action {
    match run {
        Builtin::Touch(paths) => {
            Action::callable(move |inv| builtin::touch(&expand_all(&paths, inv)))
        }
        Builtin::Remove(paths) => {
            Action::callable(move |inv| builtin::remove(&expand_all(&paths, inv)))
        }
        Builtin::Write { path, content } => {
            Action::callable(move |inv| builtin::write(&expand(&path, inv), &content))
        }
    }
}

fn target_def(name: &str, spec: TargetSpec, env: &BuildEnv) -> anyhow::Result<TargetDef> {
    // Load-time expansion sees the default mode.
    let inv = Invocation {
        name,
        mode: &env.mode,
        env,
    };
    let action = match (spec.cmd, spec.run) {
        (Some(_), Some(_)) => bail!("{}: cmd and run are exclusive", name),
        (Some(cmd), None) => command_action(cmd, spec.mode),
        (None, Some(run)) => {
            if !spec.mode.is_empty() {
                bail!("{}: per-mode commands need a cmd", name);
            }
            builtin_action(run)
        }
        (None, None) => {
            if !spec.mode.is_empty() {
                bail!("{}: per-mode commands need a cmd", name);
            }
            Action::None
        }
    };
    Ok(TargetDef {
        doc: spec.doc,
        is_virtual: spec.is_virtual,
        sources: expand_all(&spec.sources, &inv),
        deps: spec.deps,
        targets: spec.targets,
        action,
        requirements: spec
            .requires
            .into_iter()
            .map(|req| requirement(req, &inv))
            .collect(),
        hash: spec.hash,
        setup: spec.setup.map(|argv| setup_hook(name, expand_all(&argv, &inv))),
        clean: spec.clean,
    })
}

/// Parse definitions from TOML text.
pub fn parse(text: &str, env: &BuildEnv) -> anyhow::Result<DefMap> {
    let file: DefFile = toml::from_str(text)?;
    for (name, spec) in &file.targets {
        for dep in spec.deps.iter().chain(spec.targets.iter()) {
            if !file.targets.contains_key(dep) {
                bail!("{}: unknown target {:?}", name, dep);
            }
        }
    }
    let mut defs = DefMap::new();
    for (name, spec) in file.targets {
        let def = target_def(&name, spec, env)?;
        defs.insert(name, def);
    }
    Ok(defs)
}

/// Read definitions from a file.
pub fn read(path: &Path, env: &BuildEnv) -> anyhow::Result<DefMap> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse(&text, env).with_context(|| format!("load {}", path.display()))
}
