//! CLI command implementations.

pub(crate) mod engine;
pub(crate) mod serve;
pub(crate) mod token;

pub(crate) use engine::EngineCommand;
pub(crate) use serve::ServeArgs;
pub(crate) use token::TokenCommand;
