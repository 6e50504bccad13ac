//! Chrome trace output.
//!
//! Scopes of the build (loading, priming, running) are written on track 0;
//! executed tasks are written on one track per concurrency slot, so the
//! trace shows how many tasks overlapped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &str) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_complete(
        &mut self,
        name: &str,
        tid: usize,
        start: Instant,
        end: Instant,
    ) -> std::io::Result<()> {
        write!(
            self.w,
            "{{\"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ts\": {}, \"ph\": \"X\", \"dur\": {}}}",
            tid,
            name,
            start.duration_since(self.start).as_micros(),
            end.duration_since(start).as_micros(),
        )
    }

    fn close(&mut self) -> std::io::Result<()> {
        let (start, end) = (self.start, Instant::now());
        self.write_complete("main", 0, start, end)?;
        writeln!(self.w, "\n]")?;
        self.w.flush()
    }
}

fn with_trace(f: impl FnOnce(&mut Trace) -> std::io::Result<()>) -> std::io::Result<()> {
    let mut guard = TRACE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match guard.as_mut() {
        None => Ok(()),
        Some(t) => f(t),
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    *TRACE.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(trace);
    Ok(())
}

fn enabled() -> bool {
    TRACE
        .lock()
        .map(|guard| guard.is_some())
        .unwrap_or(false)
}

/// Run `f`, recording how long it took.
#[inline]
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    if !enabled() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let end = Instant::now();
    // Tracing is best-effort; a write failure shouldn't fail the build.
    let _ = with_trace(|t| {
        t.write_complete(name, 0, start, end)?;
        writeln!(t.w, ",")
    });
    result
}

/// Record one executed task on the track of its concurrency slot.
pub fn task(name: &str, slot: usize, start: Instant, end: Instant) {
    let _ = with_trace(|t| {
        t.write_complete(name, slot + 1, start, end)?;
        writeln!(t.w, ",")
    });
}

pub fn close() -> std::io::Result<()> {
    let mut guard = TRACE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(mut t) = guard.take() {
        return t.close();
    }
    Ok(())
}
