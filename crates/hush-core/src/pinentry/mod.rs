//! Pinentry discovery and prompting
//!
//! Finding a usable pinentry program on this machine, and running one
//! prompt session against it.

mod program;
mod select;
mod session;

pub use program::{tty_args, ArgsFn, Locator, PinentryProgram, ResolvedCommand, WhichLocator};
pub use select::{choose, default_programs};
pub use session::ask_for_secret;

use crate::error::PromptError;

/// Something that can interactively ask the user for a secret.
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    async fn ask(
        &self,
        prompt: &str,
        title: &str,
        description: &str,
    ) -> Result<String, PromptError>;
}

/// [`Prompter`] backed by the platform's pinentry programs: selects the
/// first usable candidate, then runs a prompt session against it.
pub struct PinentryPrompter {
    programs: Vec<PinentryProgram>,
    locator: Box<dyn Locator>,
}

impl PinentryPrompter {
    pub fn new(programs: Vec<PinentryProgram>, locator: Box<dyn Locator>) -> Self {
        Self { programs, locator }
    }
}

impl Default for PinentryPrompter {
    fn default() -> Self {
        Self::new(default_programs(), Box::new(WhichLocator))
    }
}

#[async_trait::async_trait]
impl Prompter for PinentryPrompter {
    async fn ask(
        &self,
        prompt: &str,
        title: &str,
        description: &str,
    ) -> Result<String, PromptError> {
        let command = choose(&self.programs, self.locator.as_ref())?;
        ask_for_secret(&command, prompt, title, description).await
    }
}
