use crate::e2e::*;

#[test]
fn empty_all() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", "[targets.all]\nvirtual = true\n")?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_eq!(std::str::from_utf8(&out.stdout)?, "hashmake: no work to do\n");
    Ok(())
}

#[test]
fn virtual_command_always_runs() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.hello]
virtual = true
cmd = ["echo", "hello from $name"]
"#,
    )?;
    for _ in 0..2 {
        let out = space.run_expect(&mut hashmake_command(vec!["hello"]))?;
        assert_output_contains(&out, "building: hello");
        assert_output_contains(&out, "hello from hello");
        assert_output_contains(&out, "ran 1 task, max 1 concurrent");
    }
    assert_eq!(
        space.status()?,
        serde_json::json!({"build": {"debug": {"hello": null}}})
    );
    Ok(())
}

#[test]
fn rebuild_on_source_change() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    space.write("in.txt", "one")?;

    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "building: out");
    assert_eq!(space.read("out")?, b"one");

    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "no work to do");

    space.write("in.txt", "two")?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "building: out");
    assert_eq!(space.read("out")?, b"two");
    Ok(())
}

#[test]
fn mtime_alone_is_not_a_change() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    space.write("in.txt", "same")?;
    space.run_expect(&mut hashmake_command(vec![]))?;

    let later = filetime::FileTime::from_unix_time(2_000_000_000, 0);
    filetime::set_file_mtime(space.path("in.txt"), later)?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[test]
fn modes_are_tracked_separately() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["out"]

[targets.out]
cmd = ["sh", "-c", "echo debug > out"]

[targets.out.mode.release]
cmd = ["sh", "-c", "echo release > out"]
"#,
    )?;
    space.run_expect(&mut hashmake_command(vec![]))?;
    assert_eq!(space.read("out")?, b"debug\n");

    let out = space.run_expect(&mut hashmake_command(vec!["-m", "release"]))?;
    assert_output_contains(&out, "building: out");
    assert_eq!(space.read("out")?, b"release\n");

    let status = space.status()?;
    assert!(status["build"]["debug"]["out"].is_string());
    assert!(status["build"]["release"]["out"].is_string());
    Ok(())
}

#[test]
fn verbose_prints_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    space.write("in.txt", "")?;
    let out = space.run_expect(&mut hashmake_command(vec!["-v"]))?;
    assert_output_contains(&out, "cp in.txt out");
    assert_output_not_contains(&out, "building: out");
    Ok(())
}

#[test]
fn concurrency_ceiling() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["a", "b", "c"]

[targets.a]
virtual = true
cmd = ["sleep", "0.2"]

[targets.b]
virtual = true
cmd = ["sleep", "0.2"]

[targets.c]
virtual = true
cmd = ["sleep", "0.2"]
"#,
    )?;
    let out = space.run_expect(&mut hashmake_command(vec!["-j", "2"]))?;
    assert_output_contains(&out, "ran 3 tasks, max 2 concurrent");
    Ok(())
}

#[test]
fn builtin_actions() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["stamp"]
targets = ["hola"]

[targets.stamp]
run = { touch = ["$build/stamp"] }

[targets.hola]
virtual = true
run = { write = { path = "$build/hola.txt", content = "hola" } }
"#,
    )?;
    space.run_expect(&mut hashmake_command(vec!["--build", "out"]))?;
    assert_eq!(space.read("out/hola.txt")?, b"hola");
    assert!(space.read("out/stamp").is_ok());
    assert!(space.status()?["out"]["debug"].is_object());
    Ok(())
}

#[test]
fn empty_command_does_nothing() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", "[targets.all]\nvirtual = true\ncmd = []\n")?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_eq!(std::str::from_utf8(&out.stdout)?, "hashmake: no work to do\n");
    Ok(())
}
