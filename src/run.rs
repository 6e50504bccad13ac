use anyhow::anyhow;
use argh::FromArgs;
use std::path::Path;

use crate::{
    db::StatusStore,
    def::{BuildEnv, DefMap, Definitions},
    load,
    progress::ConsoleProgress,
    trace, work,
};

/// Where per-target hashes are recorded, relative to the working directory.
pub const STATUS_FILE: &str = ".hashmake_status.json";

/// a content-hashing build orchestrator
#[derive(FromArgs)]
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// target definitions file [default=targets.toml]
    #[argh(option, short = 'f', default = "String::from(\"targets.toml\")")]
    file: String,

    /// debugging tools (use -d list to list)
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// subcommands (use -t list to list)
    #[argh(option, short = 't')]
    tool: Option<String>,

    /// maximum concurrent tasks, 0 for one per CPU [default=1]
    #[argh(option, short = 'j', default = "1")]
    jobs: usize,

    /// build mode [default=debug]
    #[argh(option, short = 'm', default = "String::from(\"debug\")")]
    mode: String,

    /// build directory [default=build]
    #[argh(option, default = "String::from(\"build\")")]
    build: String,

    /// installation prefix [default=/usr/local]
    #[argh(option, default = "String::from(\"/usr/local\")")]
    prefix: String,

    /// print executed command lines
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// targets to build [default=all]
    #[argh(positional)]
    targets: Vec<String>,
}

struct BuildParams<'a> {
    parallelism: usize,
    verbose: bool,
    target_names: &'a [String],
}

fn init_logging(explain: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = if explain {
        EnvFilter::new("hashmake=debug")
    } else {
        EnvFilter::try_from_env("HASHMAKE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded; that's fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Print `all` and the targets it pulls in, with their docs.
fn list_targets(defs: &DefMap) -> anyhow::Result<()> {
    let all = defs
        .get("all")
        .ok_or_else(|| anyhow!("no target named \"all\""))?;
    println!("all: {}", all.doc);
    for name in all.deps.iter().chain(all.targets.iter()) {
        let doc = defs.get(name).map(|d| d.doc.as_str()).unwrap_or("");
        println!("  {}: {}", name, doc);
    }
    Ok(())
}

/// Build the requested targets and record the outcome.  Returns the exit code.
fn build(defs: &DefMap, env: &BuildEnv, params: &BuildParams) -> anyhow::Result<i32> {
    let status_path = Path::new(STATUS_FILE);
    let mut store = trace::scope("db::open", || StatusStore::open(status_path))?;
    let last = store
        .hashes(&env.build_dir, &env.mode)
        .cloned()
        .unwrap_or_default();

    let progress = ConsoleProgress::new(params.verbose);
    let mut work = work::Work::new(defs, env, &last, &progress, params.parallelism);
    trace::scope("want", || -> anyhow::Result<()> {
        for name in work::requested_names(defs, params.target_names) {
            work.want(&name)?;
        }
        Ok(())
    })?;
    let code = trace::scope("work.run", || work.run())?;

    work.sync_state(store.hashes_mut(&env.build_dir, &env.mode));
    store.save(status_path)?;

    match work.completed() {
        0 if code == 0 => println!("hashmake: no work to do"),
        n => println!(
            "hashmake: ran {} task{}, max {} concurrent",
            n,
            if n == 1 { "" } else { "s" },
            work.max_running()
        ),
    }
    Ok(code)
}

fn run_impl() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();

    let mut explain = false;
    if let Some(debug) = &args.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  explain  print why each target is rebuilt");
                println!("  trace    generate json performance trace");
                return Ok(1);
            }
            "explain" => explain = true,
            "trace" => trace::open("trace.json")?,
            _ => anyhow::bail!("unknown -d {:?}, use -d list to list", debug),
        }
    }
    init_logging(explain);

    if let Some(dir) = &args.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    let parallelism = match args.jobs {
        0 => usize::from(std::thread::available_parallelism()?),
        n => n,
    };

    let file = Path::new(&args.file);
    let project = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_string_lossy().into_owned(),
        _ => ".".to_owned(),
    };
    let env = BuildEnv {
        mode: args.mode,
        build_dir: args.build,
        prefix: args.prefix,
        project,
    };
    let defs = trace::scope("load::read", || load::read(file, &env))?;

    if let Some(tool) = &args.tool {
        match tool.as_str() {
            "list" => {
                println!("subcommands:");
                println!("  targets  list top-level targets with their docs");
                return Ok(1);
            }
            "targets" => {
                list_targets(&defs)?;
                return Ok(0);
            }
            _ => anyhow::bail!("unknown -t {:?}, use -t list to list", tool),
        }
    }

    let params = BuildParams {
        parallelism,
        verbose: args.verbose,
        target_names: &args.targets,
    };
    build(&defs, &env, &params)
}

pub fn run() -> anyhow::Result<i32> {
    let res = run_impl();
    if let Err(err) = trace::close() {
        tracing::warn!("writing trace: {}", err);
    }
    res
}
