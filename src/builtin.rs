//! In-process actions offered to definition files.  Each returns whether it
//! succeeded; errors are logged rather than propagated, since a failed action
//! is an ordinary build failure.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn touch_one(path: &Path) -> io::Result<()> {
    create_parent(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())
}

fn remove_one(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn each(verb: &str, paths: &[String], f: fn(&Path) -> io::Result<()>) -> bool {
    for path in paths {
        if let Err(err) = f(Path::new(path)) {
            tracing::error!("{} {}: {}", verb, path, err);
            return false;
        }
    }
    true
}

/// Create each file if needed and set its modification time to now.
pub fn touch(paths: &[String]) -> bool {
    each("touch", paths, touch_one)
}

/// Delete each path, recursively for directories.  Absent paths are fine.
pub fn remove(paths: &[String]) -> bool {
    each("remove", paths, remove_one)
}

/// Write `content` to `path`, creating parent directories.
pub fn write(path: &str, content: &str) -> bool {
    let path = Path::new(path);
    match create_parent(path).and_then(|()| fs::write(path, content)) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!("write {}: {}", path.display(), err);
            false
        }
    }
}
