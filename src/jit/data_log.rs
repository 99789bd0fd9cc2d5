//! Process-wide sink for JIT diagnostic dumps.
//!
//! Standard error unless a data file has been configured. Each call to
//! `with_data_file` holds the sink lock for its whole duration, so one
//! dump's lines are never interleaved with another's.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

enum Sink {
    Stderr,
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

static SINK: Mutex<Sink> = Mutex::new(Sink::Stderr);

fn lock() -> MutexGuard<'static, Sink> {
    // A panic mid-dump leaves the sink usable; at worst a dump is truncated.
    SINK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Send subsequent dumps to `path`, truncating it.
pub fn set_data_file(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut sink = lock();
    if let Sink::File { writer, .. } = &mut *sink {
        writer.flush()?;
    }
    *sink = Sink::File {
        path: path.to_path_buf(),
        writer: BufWriter::new(file),
    };
    tracing::debug!(path = %path.display(), "JIT data file set");
    Ok(())
}

/// Send subsequent dumps back to standard error.
pub fn reset_to_stderr() -> io::Result<()> {
    let mut sink = lock();
    if let Sink::File { writer, .. } = &mut *sink {
        writer.flush()?;
    }
    *sink = Sink::Stderr;
    Ok(())
}

/// The configured data file, if dumps are not going to standard error.
pub fn data_file() -> Option<PathBuf> {
    match &*lock() {
        Sink::Stderr => None,
        Sink::File { path, .. } => Some(path.clone()),
    }
}

/// Run `f` with exclusive access to the sink, then flush it.
pub fn with_data_file<R>(f: impl FnOnce(&mut dyn Write) -> io::Result<R>) -> io::Result<R> {
    let mut sink = lock();
    match &mut *sink {
        Sink::Stderr => {
            let mut stderr = io::stderr().lock();
            let result = f(&mut stderr)?;
            stderr.flush()?;
            Ok(result)
        }
        Sink::File { writer, .. } => {
            let result = f(writer)?;
            writer.flush()?;
            Ok(result)
        }
    }
}
