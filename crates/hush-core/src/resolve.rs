//! Secret resolution
//!
//! The fetch-or-prompt-then-persist loop: look the secret up in the store,
//! prompt the user on a miss, persist what they entered, then hand the
//! secret to the caller's action.

use std::future::Future;

use anyhow::Result;

use crate::error::PromptError;
use crate::pinentry::Prompter;
use crate::store::SecretStore;

/// What to resolve. `system` and `username` fall back to
/// [`default_system`] / [`default_username`] when unset.
#[derive(Debug, Clone)]
pub struct SecretRequest {
    pub system: Option<String>,
    pub username: Option<String>,
    pub prompt: String,
}

impl Default for SecretRequest {
    fn default() -> Self {
        Self {
            system: None,
            username: None,
            prompt: "Password:".to_string(),
        }
    }
}

/// Default system identifier: the absolute path of the running executable.
pub fn default_system() -> std::io::Result<String> {
    Ok(std::env::current_exe()?.display().to_string())
}

/// Default username: the current OS user.
pub fn default_username() -> Result<String, PromptError> {
    if let Some(name) = username_from(|key| std::env::var(key).ok()) {
        return Ok(name);
    }
    #[cfg(unix)]
    if let Some(name) = passwd_username() {
        return Ok(name);
    }
    Err(PromptError::Username)
}

/// The environment-variable half of [`default_username`], in lookup order.
fn username_from(get: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["LOGNAME", "USER", "USERNAME"]
        .iter()
        .find_map(|key| get(key).filter(|name| !name.is_empty()))
}

#[cfg(unix)]
fn passwd_username() -> Option<String> {
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; 1024];
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe {
        libc::getpwuid_r(
            libc::getuid(),
            &mut pwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(pwd.pw_name) };
    Some(name.to_string_lossy().into_owned())
}

/// Resolve the secret for `(system, username)` and call `action` with it.
///
/// The store is consulted first; on a miss the prompter asks the user and
/// the answer is persisted before the loop re-reads it. Persistence only
/// happens after a fully successful prompt, so a cancelled or failed prompt
/// never writes a partial secret. The action's own result or failure
/// propagates unchanged to the caller.
pub async fn with_secret<T, F, Fut>(
    store: &mut dyn SecretStore,
    prompter: &dyn Prompter,
    request: SecretRequest,
    action: F,
) -> Result<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let system = match request.system {
        Some(system) => system,
        None => default_system()?,
    };
    let username = match request.username {
        Some(username) => username,
        None => default_username()?,
    };

    let secret = loop {
        if let Some(secret) = store.get(&system, &username)? {
            break secret;
        }

        tracing::info!(system = %system, username = %username, "no stored secret, prompting");
        let description = format!("Password Prompt for {username}@{system}");
        let entered = prompter
            .ask(&request.prompt, "Enter Password", &description)
            .await?;
        store.set(&system, &username, &entered)?;
        // The next pass re-reads the store; a racing external mutation can
        // repeat the prompt, which is accepted.
    };

    action(secret).await
}
