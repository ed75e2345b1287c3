//! Report generation in a `node` subprocess.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use replay_engine::EntryPoint;
use replay_fetch::ReportDocument;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::generator::{RenderError, ReportGenerator};

/// Loads the generator module, reads the report from stdin, writes HTML to
/// stdout. Arguments: entry point path, API style (`static` or `instance`).
const DRIVER: &str = r"
const { pathToFileURL } = require('node:url');
const [entry, api] = process.argv.slice(1);
const chunks = [];
process.stdin.on('data', (chunk) => chunks.push(chunk));
process.stdin.on('end', async () => {
  try {
    const lhr = JSON.parse(Buffer.concat(chunks).toString('utf8'));
    const mod = await import(pathToFileURL(entry).href);
    const ns = mod.default || {};
    const Generator = mod.ReportGenerator || mod.ReportGeneratorV2
      || ns.ReportGenerator || ns.ReportGeneratorV2 || ns;
    const html = api === 'instance'
      ? new Generator().generateReportHtml(lhr)
      : Generator.generateReportHtml(lhr);
    process.stdout.write(await html);
  } catch (err) {
    process.stderr.write(String((err && err.stack) || err));
    process.exitCode = 1;
  }
});
";

/// Runs a resolved generator entry point with `node`.
///
/// The layout's API style is passed to the driver script, so the oldest
/// layout's instance-method generator works the same as the static ones.
#[derive(Clone, Debug)]
pub struct NodeGenerator {
    node: String,
    entry: EntryPoint,
}

impl NodeGenerator {
    #[must_use]
    pub fn new(node: impl Into<String>, entry: EntryPoint) -> Self {
        Self {
            node: node.into(),
            entry,
        }
    }
}

#[async_trait]
impl ReportGenerator for NodeGenerator {
    async fn generate(&self, document: &ReportDocument) -> Result<String, RenderError> {
        let input = document.to_json()?;

        tracing::debug!(
            alias = %self.entry.alias,
            entry = %self.entry.path.display(),
            layout = self.entry.layout.name,
            "Running report generator"
        );

        let mut child = Command::new(&self.node)
            .arg("-e")
            .arg(DRIVER)
            .arg(&self.entry.path)
            .arg(self.entry.layout.api.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.node.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("generator stdin not captured"))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        let written = writer.await.map_err(io::Error::other)?;

        // A generator that dies early breaks the pipe; its stderr explains why
        if !output.status.success() {
            return Err(RenderError::Generator {
                entry: self.entry.path.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        written?;

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(html)
    }
}
