//! `replay token` command implementations.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use replay_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Report token commands.
#[derive(Subcommand)]
pub(crate) enum TokenCommand {
    /// Encrypt a report URL into a token.
    Encrypt {
        /// Report URL.
        url: String,
        #[command(flatten)]
        secret: SecretArgs,
    },
    /// Decrypt a token back into its report URL.
    Decrypt {
        /// Token from a `?token=` query parameter.
        token: String,
        #[command(flatten)]
        secret: SecretArgs,
    },
    /// Encrypt a URL, decrypt the result, and compare.
    Test {
        /// Report URL.
        url: String,
        #[command(flatten)]
        secret: SecretArgs,
    },
}

/// Where the token secret comes from.
#[derive(Args)]
pub(crate) struct SecretArgs {
    /// Token secret (default: `token.secret` from config).
    #[arg(long, env = "REPLAY_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Path to configuration file (default: auto-discover replay.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SecretArgs {
    /// Resolve and validate the secret.
    fn resolve(self) -> Result<String, CliError> {
        let settings = CliSettings {
            secret: self.secret,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&settings))?;
        Ok(config.require_secret()?.to_owned())
    }
}

impl TokenCommand {
    /// Execute the token command.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid secret is available or the token is
    /// malformed.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        match self {
            Self::Encrypt { url, secret } => {
                let token = replay_token::encrypt(&url, &secret.resolve()?)?;
                output.result(&token);
            }
            Self::Decrypt { token, secret } => {
                let url = replay_token::decrypt(&token, &secret.resolve()?)?;
                output.result(&url);
            }
            Self::Test { url, secret } => {
                let secret = secret.resolve()?;
                let token = replay_token::encrypt(&url, &secret)?;
                let decrypted = replay_token::decrypt(&token, &secret)?;
                output.info(&format!("URL:       {url}"));
                output.info(&format!("Token:     {token}"));
                output.info(&format!("Decrypted: {decrypted}"));
                if decrypted != url {
                    return Err(CliError::Validation(
                        "Round trip mismatch: decrypted URL differs from input".to_owned(),
                    ));
                }
                output.success("Round trip OK");
            }
        }

        Ok(())
    }
}
