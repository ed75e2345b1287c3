//! CLI error types.

use replay_config::ConfigError;
use replay_engine::VersionError;
use replay_token::TokenError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Token(#[from] TokenError),

    #[error("{0}")]
    Version(#[from] VersionError),

    #[error("{0}")]
    Server(String),

    #[error("{0}")]
    Validation(String),
}
