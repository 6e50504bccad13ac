use crate::e2e::*;

#[test]
fn failed_target_is_recorded_and_retried() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["out"]

[targets.out]
cmd = ["sh", "-c", "exit 3"]
"#,
    )?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "failed: out");
    assert_output_contains(&out, "sh -c 'exit 3'");
    let status = space.status()?;
    assert!(status["build"]["debug"]["out"].is_null());
    assert!(status["build"]["debug"]
        .as_object()
        .unwrap()
        .contains_key("out"));

    // A null hash never matches, so the target runs again.
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "building: out");
    Ok(())
}

#[test]
fn failure_stops_dependents() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["b"]

[targets.a]
virtual = true
cmd = ["false"]

[targets.b]
deps = ["a"]
cmd = ["touch", "b"]
"#,
    )?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "failed: a");
    assert_output_not_contains(&out, "building: b");
    assert!(space.read("b").is_err());
    Ok(())
}

#[test]
fn missing_requirement() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        r#"
[targets.all]
virtual = true
deps = ["app"]

[targets.app]
deps = ["lib"]
cmd = ["touch", "app"]

[targets.lib]
cmd = ["touch", "lib"]
requires = [{ program = "hashmake-no-such-compiler" }]
"#,
    )?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "not building lib: missing requirement");
    assert_output_not_contains(&out, "building: app");
    assert!(space.read("app").is_err());
    Ok(())
}

#[test]
fn unknown_program() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "targets.toml",
        "[targets.all]\nvirtual = true\ncmd = [\"hashmake-no-such-program\"]\n",
    )?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake-no-such-program: ");
    assert_output_contains(&out, "failed: all");
    Ok(())
}

#[test]
fn unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    let out = space.run(&mut hashmake_command(vec!["nope"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: unknown target \"nope\"");
    Ok(())
}
