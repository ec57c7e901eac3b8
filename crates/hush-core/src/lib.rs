//! hush-core — fetch-or-prompt secret retrieval
//!
//! Looks a secret up in a persistent store and, on a miss, asks the user
//! for it through an external pinentry program speaking the Assuan
//! protocol over stdio, persisting what they enter.

pub mod assuan;
pub mod error;
pub mod paths;
pub mod pinentry;
pub mod resolve;
pub mod store;

pub use error::PromptError;
pub use pinentry::{PinentryPrompter, Prompter};
pub use resolve::{with_secret, SecretRequest};
pub use store::{FileSecretStore, SecretStore};
