//! hush — fetch a secret, prompting through pinentry on a miss
//!
//! Thin glue over hush-core: the store lives at ~/.hush/secrets.json and
//! prompting goes through the platform's pinentry programs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hush_core::{with_secret, FileSecretStore, PinentryPrompter, SecretRequest};

/// Fetch a secret for a (system, username) pair
#[derive(Parser)]
#[command(name = "hush")]
struct Cli {
    /// System the secret belongs to (defaults to this executable's path)
    #[arg(long)]
    system: Option<String>,

    /// Account the secret belongs to (defaults to the current OS user)
    #[arg(long)]
    username: Option<String>,

    /// Prompt text shown by the pinentry dialog
    #[arg(long, default_value = "Password:")]
    prompt: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make sure the secret exists (prompting if needed) without printing it
    Check,

    /// Resolve the secret and print it to stdout, for scripting
    Echo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = FileSecretStore::new();
    let prompter = PinentryPrompter::default();
    let request = SecretRequest {
        system: cli.system,
        username: cli.username,
        prompt: cli.prompt,
    };

    match cli.command {
        Commands::Check => {
            with_secret(&mut store, &prompter, request, |secret| async move {
                println!("secret available ({} bytes)", secret.len());
                Ok(())
            })
            .await
        }
        Commands::Echo => {
            with_secret(&mut store, &prompter, request, |secret| async move {
                println!("{secret}");
                Ok(())
            })
            .await
        }
    }
}
