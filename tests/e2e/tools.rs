use crate::e2e::*;

#[test]
fn list_targets() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    let out = space.run_expect(&mut hashmake_command(vec!["-t", "targets"]))?;
    assert_eq!(
        std::str::from_utf8(&out.stdout)?,
        "all: everything\n  out: a copy of in.txt\n"
    );
    assert!(space.read(".hashmake_status.json").is_err());
    Ok(())
}

#[test]
fn unknown_tool() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    let out = space.run(&mut hashmake_command(vec!["-t", "bogus"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "unknown -t \"bogus\"");
    Ok(())
}

#[test]
fn bad_definitions() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", "[targets.all]\ndeps = [\"ghost\"]\n")?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: load targets.toml");
    Ok(())
}

#[test]
fn trace_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("targets.toml", COPY_TARGETS)?;
    space.write("in.txt", "")?;
    space.run_expect(&mut hashmake_command(vec!["-d", "trace"]))?;
    let trace = String::from_utf8(space.read("trace.json")?)?;
    assert!(trace.contains("\"name\": \"out\""));
    assert!(trace.contains("\"name\": \"work.run\""));
    Ok(())
}
