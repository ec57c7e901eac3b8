//! Pinentry program descriptors
//!
//! A descriptor names one candidate pinentry executable plus a builder for
//! any extra arguments it needs. Resolving a descriptor turns it into a
//! concrete command line, or signals that this candidate cannot be used.

use std::io;
use std::path::PathBuf;

use crate::error::PromptError;

/// Builds the extra arguments one pinentry flavor needs. May fail when the
/// environment cannot support that flavor.
pub type ArgsFn = fn() -> Result<Vec<String>, PromptError>;

/// Executable lookup collaborator ("which").
pub trait Locator: Send + Sync {
    /// All matching absolute paths for a program name, best first.
    fn locate(&self, name: &str) -> Vec<PathBuf>;
}

/// Locator backed by the PATH search of the `which` crate.
pub struct WhichLocator;

impl Locator for WhichLocator {
    fn locate(&self, name: &str) -> Vec<PathBuf> {
        match which::which_all(name) {
            Ok(paths) => paths.collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// A resolved, invocable command line. Never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// One candidate pinentry executable. Immutable after construction.
#[derive(Clone)]
pub struct PinentryProgram {
    name: String,
    extra_args: ArgsFn,
}

impl PinentryProgram {
    /// A pinentry that needs no extra arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_args: no_args,
        }
    }

    /// A pinentry with an argument builder (e.g. `--ttyname` for curses).
    pub fn with_args(name: impl Into<String>, extra_args: ArgsFn) -> Self {
        Self {
            name: name.into(),
            extra_args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve to a concrete command line.
    ///
    /// Fails with [`PromptError::NotFound`] when the executable cannot be
    /// located. An argument-builder failure is propagated unchanged, never
    /// wrapped as `NotFound`.
    pub fn resolve(&self, locator: &dyn Locator) -> Result<ResolvedCommand, PromptError> {
        let mut candidates = locator.locate(&self.name);
        if candidates.is_empty() {
            return Err(PromptError::NotFound(self.name.clone()));
        }
        let program = candidates.remove(0);
        let args = (self.extra_args)()?;
        Ok(ResolvedCommand { program, args })
    }
}

fn no_args() -> Result<Vec<String>, PromptError> {
    Ok(Vec::new())
}

/// Argument builder for terminal pinentries: `--ttyname <path>` for the
/// terminal attached to this process's stdout.
///
/// Fails with an OS-level [`PromptError::Unavailable`] (never `NotFound`)
/// when stdout is not a terminal.
#[cfg(unix)]
pub fn tty_args() -> Result<Vec<String>, PromptError> {
    tty_args_for_fd(libc::STDOUT_FILENO)
}

#[cfg(unix)]
fn tty_args_for_fd(fd: std::os::unix::io::RawFd) -> Result<Vec<String>, PromptError> {
    if unsafe { libc::isatty(fd) } == 0 {
        return Err(PromptError::Unavailable(io::Error::last_os_error()));
    }

    let mut buf = vec![0u8; 256];
    let rc = unsafe { libc::ttyname_r(fd, buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(PromptError::Unavailable(io::Error::from_raw_os_error(rc)));
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let path = String::from_utf8_lossy(&buf[..end]).into_owned();
    Ok(vec!["--ttyname".to_string(), path])
}

#[cfg(not(unix))]
pub fn tty_args() -> Result<Vec<String>, PromptError> {
    Err(PromptError::Unavailable(io::Error::new(
        io::ErrorKind::Unsupported,
        "no controlling terminal on this platform",
    )))
}
