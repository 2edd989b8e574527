use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use docs_aggregator::AggregationEngine;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::render::{render_documents, report_failures, write_documents};

#[derive(Args)]
pub struct WatchArgs {
    /// Directory receiving one `<name>.json` file per document
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Quiet period after the last file event before reloading
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl WatchArgs {
    /// Render once, then again after every successful reload until cancelled.
    pub async fn run(
        &self,
        config_path: &Path,
        engine: &AggregationEngine,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(
            Duration::from_millis(self.debounce_ms),
            move |result: DebounceEventResult| {
                // The receiver only goes away when the watch loop has returned.
                tx.send(result).ok();
            },
        )
        .context("failed to create configuration watcher")?;

        // Editors often replace the file instead of writing it in place,
        // so the parent directory is watched and events are matched by name.
        let watched_dir = watch_dir(config_path);
        notify::Watcher::watch(debouncer.watcher(), &watched_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", watched_dir.display()))?;
        tracing::info!(path = %config_path.display(), "watching configuration");

        self.render(engine, cancel).await?;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("watch stopped");
                    return Ok(());
                }
                result = rx.recv() => result,
            };
            let Some(result) = result else {
                anyhow::bail!("configuration watcher stopped unexpectedly");
            };

            match result {
                Ok(events) if events.iter().any(|event| is_config_event(&event.path, config_path)) => {
                    self.reload(config_path, engine, cancel).await;
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "configuration watch error"),
            }
        }
    }

    async fn reload(&self, config_path: &Path, engine: &AggregationEngine, cancel: &CancellationToken) {
        match engine.store().reload_from_path(config_path) {
            Ok(snapshot) => {
                tracing::info!(generation = snapshot.generation, "configuration reloaded");
                if let Err(e) = self.render(engine, cancel).await
                    && !cancel.is_cancelled()
                {
                    tracing::error!(error = %e, "render after reload failed");
                }
            }
            // The store logs and keeps the previous snapshot.
            Err(e) => eprintln!("reload failed: {e}"),
        }
    }

    async fn render(&self, engine: &AggregationEngine, cancel: &CancellationToken) -> anyhow::Result<()> {
        let rendered = render_documents(engine, &engine.document_names(), cancel).await?;
        report_failures(&rendered);
        write_documents(&self.output, &rendered, self.pretty).await
    }
}

fn watch_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Watchers may report canonicalized paths, so only the file name is compared.
fn is_config_event(event_path: &Path, config_path: &Path) -> bool {
    event_path.file_name().is_some() && event_path.file_name() == config_path.file_name()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use docs_aggregator::ConfigStore;
    use httpmock::prelude::*;
    use std::sync::Arc;

    fn config(address: &str, document_path: &str) -> String {
        format!(
            r"
clusters:
  orders:
    destinations:
      d1:
        address: {address}
        sources:
          - document_paths: [{document_path}]
"
        )
    }

    fn document(path: &str) -> serde_json::Value {
        serde_json::json!({
            "openapi": "3.0.1",
            "info": { "title": "Orders", "version": "1" },
            "paths": { path: { "get": { "responses": { "200": { "description": "ok" } } } } }
        })
    }

    async fn wait_for_path(file: &Path, path: &str) -> bool {
        for _ in 0..100 {
            if let Ok(body) = tokio::fs::read_to_string(file).await
                && let Ok(value) = serde_json::from_str::<serde_json::Value>(&body)
                && value["paths"].get(path).is_some()
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_config_event_matching() {
        let config = Path::new("conf/gateway.yaml");
        assert!(is_config_event(Path::new("/abs/conf/gateway.yaml"), config));
        assert!(!is_config_event(Path::new("/abs/conf/gateway.yaml.swp"), config));
        assert!(!is_config_event(Path::new("/"), config));
    }

    #[test]
    fn test_watch_dir_of_bare_file_name() {
        assert_eq!(watch_dir(Path::new("gateway.yaml")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("conf/gateway.yaml")), PathBuf::from("conf"));
    }

    #[tokio::test]
    async fn test_rerenders_after_config_change_and_stops_on_cancel() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1.json");
            then.status(200).json_body(document("/v1"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v2.json");
            then.status(200).json_body(document("/v2"));
        });

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("gateway.yaml");
        let output = dir.path().join("out");
        std::fs::write(&config_path, config(&server.base_url(), "/v1.json")).unwrap();

        let store = Arc::new(ConfigStore::from_path(&config_path).unwrap());
        let engine = AggregationEngine::new(store);
        let cancel = CancellationToken::new();
        let args = WatchArgs {
            output: output.clone(),
            debounce_ms: 100,
            pretty: false,
        };
        let rendered = output.join("orders.json");

        let driver = async {
            let first = wait_for_path(&rendered, "/v1").await;

            std::fs::write(&config_path, config(&server.base_url(), "/v2.json")).unwrap();
            let second = wait_for_path(&rendered, "/v2").await;

            cancel.cancel();
            (first, second)
        };

        let (result, (first, second)) = tokio::join!(args.run(&config_path, &engine, &cancel), driver);

        result.unwrap();
        assert!(first, "initial render missing");
        assert!(second, "render after reload missing");
    }
}
