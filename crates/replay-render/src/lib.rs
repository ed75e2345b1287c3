//! Report rendering.
//!
//! A [`ReportGenerator`] turns a report into HTML; [`render`] runs one and
//! points the resulting asset references at the server's asset route.
//!
//! # Example
//!
//! ```ignore
//! let entry = resolver.resolve_entry_point(&alias).await?;
//! let generator = NodeGeneratorFactory::new("node").generator(&entry);
//! let html = replay_render::render(&document, generator.as_ref()).await?;
//! ```

mod generator;
mod node;
mod rewrite;

pub use generator::{GeneratorFactory, NodeGeneratorFactory, RenderError, ReportGenerator};
pub use node::NodeGenerator;
pub use rewrite::{ASSET_ROUTE, rewrite_asset_refs};

use replay_fetch::ReportDocument;

/// Generate HTML for `document` and rewrite its asset references.
///
/// Assets are tagged with the document's engine version.
pub async fn render(
    document: &ReportDocument,
    generator: &dyn ReportGenerator,
) -> Result<String, RenderError> {
    let html = generator.generate(document).await?;
    Ok(rewrite_asset_refs(&html, document.version()))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl ReportGenerator for FixedGenerator {
        async fn generate(&self, _document: &ReportDocument) -> Result<String, RenderError> {
            Ok(self.0.to_owned())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ReportGenerator for FailingGenerator {
        async fn generate(&self, _document: &ReportDocument) -> Result<String, RenderError> {
            Err(RenderError::EmptyOutput)
        }
    }

    #[tokio::test]
    async fn test_render_rewrites_assets_with_document_version() {
        let document = ReportDocument::from_value(json!({"lighthouseVersion": "9.6.8"})).unwrap();
        let generator =
            FixedGenerator(r#"<link rel="stylesheet" href="report.css"><script src="js/report.js"></script>"#);

        let html = render(&document, &generator).await.unwrap();

        assert_eq!(
            html,
            r#"<link rel="stylesheet" href="/assets/report.css?v=9.6.8"><script src="/assets/report.js?v=9.6.8"></script>"#
        );
    }

    #[tokio::test]
    async fn test_render_propagates_generator_error() {
        let document = ReportDocument::from_value(json!({"lighthouseVersion": "9.6.8"})).unwrap();

        let err = render(&document, &FailingGenerator).await.unwrap_err();

        assert!(matches!(err, RenderError::EmptyOutput));
    }
}
