//! Ordered pinentry fallback
//!
//! Candidates are tried in preference order; the first one that resolves
//! wins. Only "this candidate cannot be used here" failures are skipped,
//! anything else aborts the selection.

use super::program::{tty_args, Locator, PinentryProgram, ResolvedCommand};
use crate::error::PromptError;

/// Pick the first resolvable candidate.
///
/// `NotFound` and `Unavailable` move on to the next candidate; any other
/// failure propagates immediately. An exhausted (or empty) list fails with
/// [`PromptError::NoPinentry`].
pub fn choose(
    programs: &[PinentryProgram],
    locator: &dyn Locator,
) -> Result<ResolvedCommand, PromptError> {
    for program in programs {
        match program.resolve(locator) {
            Ok(command) => {
                tracing::debug!(
                    program = program.name(),
                    path = %command.program.display(),
                    "selected pinentry"
                );
                return Ok(command);
            }
            Err(PromptError::NotFound(name)) => {
                tracing::debug!(program = %name, "pinentry not found, trying next");
            }
            Err(PromptError::Unavailable(error)) => {
                tracing::debug!(
                    program = program.name(),
                    error = %error,
                    "pinentry unavailable here, trying next"
                );
            }
            Err(other) => return Err(other),
        }
    }
    Err(PromptError::NoPinentry)
}

/// Platform preference order: vendor GUI, generic GUI, terminal UI bound
/// to a tty, generic fallback. Data, not logic, so new backends slot in
/// without touching [`choose`].
pub fn default_programs() -> Vec<PinentryProgram> {
    vec![
        PinentryProgram::new(
            "/usr/local/MacGPG2/libexec/pinentry-mac.app/Contents/MacOS/pinentry-mac",
        ),
        PinentryProgram::new("pinentry-mac"),
        PinentryProgram::new("pinentry-gnome3"),
        PinentryProgram::new("pinentry-qt"),
        PinentryProgram::with_args("pinentry-curses", tty_args),
        PinentryProgram::new("pinentry"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    /// Locator that finds every name at /bin/<name>.
    struct FindsEverything;

    impl Locator for FindsEverything {
        fn locate(&self, name: &str) -> Vec<PathBuf> {
            vec![PathBuf::from("/bin").join(name)]
        }
    }

    /// Locator that finds nothing at all.
    struct FindsNothing;

    impl Locator for FindsNothing {
        fn locate(&self, _name: &str) -> Vec<PathBuf> {
            Vec::new()
        }
    }

    fn unavailable() -> Result<Vec<String>, PromptError> {
        Err(PromptError::Unavailable(io::Error::other("no tty")))
    }

    fn poisoned() -> Result<Vec<String>, PromptError> {
        Err(PromptError::Protocol {
            line: "ERR broken builder".to_string(),
        })
    }

    #[test]
    fn returns_first_resolvable_candidate() {
        let programs = vec![
            PinentryProgram::new("pinentry-mac"),
            PinentryProgram::new("pinentry"),
        ];

        let command = choose(&programs, &FindsEverything).unwrap();
        assert_eq!(command.program, PathBuf::from("/bin/pinentry-mac"));
    }

    #[test]
    fn skips_not_found_and_unavailable() {
        struct OnlyPinentry;
        impl Locator for OnlyPinentry {
            fn locate(&self, name: &str) -> Vec<PathBuf> {
                if name == "pinentry" {
                    vec![PathBuf::from("/bin/pinentry")]
                } else {
                    Vec::new()
                }
            }
        }

        let programs = vec![
            PinentryProgram::new("pinentry-mac"),
            PinentryProgram::with_args("pinentry-curses", unavailable),
            PinentryProgram::new("pinentry"),
        ];

        let command = choose(&programs, &OnlyPinentry).unwrap();
        assert_eq!(command.program, PathBuf::from("/bin/pinentry"));
    }

    // pinentry-curses is findable here, so its builder actually runs
    #[test]
    fn unavailable_builder_falls_through_to_next() {
        let programs = vec![
            PinentryProgram::with_args("pinentry-curses", unavailable),
            PinentryProgram::new("pinentry"),
        ];

        let command = choose(&programs, &FindsEverything).unwrap();
        assert_eq!(command.program, PathBuf::from("/bin/pinentry"));
    }

    #[test]
    fn other_error_kinds_are_not_swallowed() {
        let programs = vec![
            PinentryProgram::with_args("pinentry-curses", poisoned),
            PinentryProgram::new("pinentry"),
        ];

        match choose(&programs, &FindsEverything) {
            Err(PromptError::Protocol { .. }) => {}
            other => panic!("expected the builder failure, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_candidates_fail_with_no_pinentry() {
        let programs = vec![
            PinentryProgram::new("pinentry-mac"),
            PinentryProgram::with_args("pinentry-curses", unavailable),
        ];

        match choose(&programs, &FindsNothing) {
            Err(PromptError::NoPinentry) => {}
            other => panic!("expected NoPinentry, got {other:?}"),
        }
    }

    #[test]
    fn empty_candidate_list_fails_with_no_pinentry() {
        match choose(&[], &FindsEverything) {
            Err(PromptError::NoPinentry) => {}
            other => panic!("expected NoPinentry, got {other:?}"),
        }
    }
}
