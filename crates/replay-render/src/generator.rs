//! Report generator abstraction.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use replay_engine::EntryPoint;
use replay_fetch::ReportDocument;

use crate::node::NodeGenerator;

/// Error generating report HTML.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to talk to report generator: {0}")]
    Io(#[from] io::Error),

    #[error("report generator {entry} failed ({status}): {stderr}")]
    Generator {
        entry: String,
        status: String,
        stderr: String,
    },

    #[error("report generator produced no output")]
    EmptyOutput,
}

/// Turns a report into HTML markup.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, document: &ReportDocument) -> Result<String, RenderError>;
}

/// Builds a generator for a resolved entry point.
pub trait GeneratorFactory: Send + Sync {
    fn generator(&self, entry: &EntryPoint) -> Arc<dyn ReportGenerator>;
}

/// [`GeneratorFactory`] producing [`NodeGenerator`]s.
#[derive(Clone, Debug)]
pub struct NodeGeneratorFactory {
    node: String,
}

impl NodeGeneratorFactory {
    #[must_use]
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

impl GeneratorFactory for NodeGeneratorFactory {
    fn generator(&self, entry: &EntryPoint) -> Arc<dyn ReportGenerator> {
        Arc::new(NodeGenerator::new(self.node.clone(), entry.clone()))
    }
}
