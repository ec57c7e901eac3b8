//! Error types for pinentry discovery and the Assuan protocol
//!
//! The selector needs to tell recoverable candidate failures (`NotFound`,
//! `Unavailable`) apart from everything else, so these are typed variants
//! rather than opaque `anyhow` errors.

use std::io;

use thiserror::Error;

/// Failures produced while locating a pinentry program or talking to one.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The named pinentry executable does not exist on this system.
    /// Recoverable: the selector falls through to the next candidate.
    #[error("pinentry program `{0}` not found")]
    NotFound(String),

    /// The environment cannot support this pinentry (e.g. stdout is not a
    /// terminal for a curses pinentry). Recoverable like `NotFound`, but a
    /// distinct kind: it carries the underlying OS error.
    #[error("pinentry unavailable in this environment")]
    Unavailable(#[source] io::Error),

    /// Every candidate was skipped; no prompt can be shown.
    #[error("no usable pinentry program available")]
    NoPinentry,

    /// The peer rejected a command, most likely the user hit cancel.
    /// Carries the raw `ERR` line for diagnostics.
    #[error("pinentry rejected command: {line}")]
    Protocol { line: String },

    /// The peer broke the protocol (e.g. a reply arrived with no command
    /// outstanding). The connection is shut down when this happens.
    #[error("assuan protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// The peer's streams closed while replies were still expected.
    #[error("pinentry connection closed")]
    ConnectionClosed,

    /// The pinentry process could not be started.
    #[error("failed to spawn pinentry `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Transport-level write failure.
    #[error("pinentry transport error")]
    Io(#[from] io::Error),

    /// No username was supplied and none could be derived from the OS.
    #[error("could not determine the current username")]
    Username,
}
