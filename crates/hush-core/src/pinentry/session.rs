//! One pinentry prompt session
//!
//! Spawns a resolved pinentry, waits for its greeting, then issues the
//! fixed handshake: SETPROMPT, SETTITLE, SETDESC, GETPIN, each awaited
//! before the next. Once a connection exists the peer is always told to
//! terminate with a best-effort BYE, on every exit path.

use super::program::ResolvedCommand;
use crate::assuan::AssuanConnection;
use crate::error::PromptError;

/// Run one prompt session and return the entered secret.
///
/// A peer error at any step (e.g. the user hit cancel) fails the session
/// with that [`PromptError::Protocol`]; BYE is still sent.
pub async fn ask_for_secret(
    command: &ResolvedCommand,
    prompt: &str,
    title: &str,
    description: &str,
) -> Result<String, PromptError> {
    let mut connection = AssuanConnection::spawn(&command.program, &command.args)?;
    run_session(&mut connection, prompt, title, description).await
}

/// The session body, separated from process spawning so it can run against
/// any connection.
async fn run_session(
    connection: &mut AssuanConnection,
    prompt: &str,
    title: &str,
    description: &str,
) -> Result<String, PromptError> {
    let result = drive(connection, prompt, title, description).await;

    // The termination command is fired on every exit path; its reply is
    // neither awaited nor required. kill_on_drop still reaps the process
    // if the peer never sees it.
    match connection.send_command("BYE", &[]).await {
        Ok(_pending) => {}
        Err(error) => tracing::debug!(%error, "could not deliver BYE"),
    }

    result
}

async fn drive(
    connection: &mut AssuanConnection,
    prompt: &str,
    title: &str,
    description: &str,
) -> Result<String, PromptError> {
    connection.wait_ready().await?;

    connection.request("SETPROMPT", &[prompt]).await?;
    connection.request("SETTITLE", &[title]).await?;
    connection.request("SETDESC", &[description]).await?;
    let response = connection.request("GETPIN", &[]).await?;

    String::from_utf8(response.data).map_err(|_| PromptError::ProtocolViolation {
        reason: "GETPIN payload is not valid UTF-8".to_string(),
    })
}
