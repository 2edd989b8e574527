use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use docs_aggregator::{AggregationEngine, AggregationOutcome};
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RenderArgs {
    /// Render only this document (defaults to every served document)
    #[arg(short, long)]
    pub document: Option<String>,

    /// Directory receiving one `<name>.json` file per document (defaults to stdout)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl RenderArgs {
    pub async fn run(self, engine: &AggregationEngine, cancel: &CancellationToken) -> anyhow::Result<()> {
        let names = match self.document {
            Some(name) => vec![name],
            None => engine.document_names(),
        };
        let rendered = render_documents(engine, &names, cancel).await?;
        report_failures(&rendered);

        match &self.output {
            Some(dir) => write_documents(dir, &rendered, self.pretty).await?,
            None => println!("{}", to_stdout_json(&rendered, self.pretty)?),
        }
        Ok(())
    }
}

/// Aggregate each named document in order.
pub async fn render_documents(
    engine: &AggregationEngine,
    names: &[String],
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<(String, AggregationOutcome)>> {
    let mut rendered = Vec::with_capacity(names.len());
    for name in names {
        let outcome = engine
            .aggregate_with_cancel(engine.base_document(), name, cancel)
            .await
            .with_context(|| format!("failed to aggregate document '{name}'"))?;
        rendered.push((name.clone(), outcome));
    }
    Ok(rendered)
}

/// Print skipped sources to stderr.
pub fn report_failures(rendered: &[(String, AggregationOutcome)]) {
    for (name, outcome) in rendered {
        if outcome.is_complete() {
            continue;
        }
        eprintln!("{name}: {} source(s) skipped", outcome.failures.len());
        for failure in &outcome.failures {
            eprintln!("  - {failure}");
        }
    }
}

fn serialize(value: &impl serde::Serialize, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// A single document prints as itself, several print as a map keyed by name.
fn to_stdout_json(rendered: &[(String, AggregationOutcome)], pretty: bool) -> anyhow::Result<String> {
    if let [(_, outcome)] = rendered {
        return Ok(serialize(&outcome.document, pretty)?);
    }
    let mut map = serde_json::Map::new();
    for (name, outcome) in rendered {
        map.insert(name.clone(), serde_json::to_value(&outcome.document)?);
    }
    Ok(serialize(&map, pretty)?)
}

/// Write one `<name>.json` per document into `dir`, creating it if needed.
pub async fn write_documents(
    dir: &Path,
    rendered: &[(String, AggregationOutcome)],
    pretty: bool,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    for (name, outcome) in rendered {
        let path = dir.join(format!("{}.json", file_stem(name)));
        let body = serialize(&outcome.document, pretty)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(document = %name, path = %path.display(), "document written");
    }
    Ok(())
}

/// Document names come from configuration keys; keep them safe as file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
