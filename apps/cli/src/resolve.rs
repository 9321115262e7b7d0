use crate::config::CliConfig;
use anyhow::Context;
use clap::Args;
use ferrum_references::{
    resolve_transaction_bundle, CancellationHandle, CancellationToken, InMemorySearch,
    ReferenceResolver,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct ResolveCommand {
    /// Batch or transaction Bundle to resolve
    #[arg(short, long)]
    bundle: PathBuf,

    /// Existing resources to search (single resources, JSON arrays or Bundles)
    #[arg(short, long, num_args = 1..)]
    resources: Vec<PathBuf>,

    /// Service base URL for absolute conditional references
    #[arg(long)]
    base_url: Option<String>,

    /// Fail on search parameters the store does not support
    #[arg(long)]
    strict: bool,

    /// Write the resolved bundle here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ResolveCommand {
    pub async fn execute(self, mut config: CliConfig) -> anyhow::Result<()> {
        if let Some(base_url) = self.base_url {
            config.resolver.base_url = Some(base_url);
        }
        if self.strict {
            config.resolver.strict_search_parameters = true;
        }
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

        let store = config.search_store();
        for path in &self.resources {
            let loaded = load_resources(&store, path)?;
            tracing::info!(path = %path.display(), resources = loaded, "Loaded resources");
        }

        let mut bundle = read_json(&self.bundle)?;
        let resolver = ReferenceResolver::from_config(Arc::new(store), &config.resolver);

        let (handle, cancel) = CancellationToken::new();
        let signal_task = tokio::spawn(cancel_on_signal(handle));

        let result = resolve_transaction_bundle(&resolver, &mut bundle, &cancel).await;
        signal_task.abort();
        let resolution = result.context("Reference resolution failed")?;

        for reserved in &resolution.reserved_ids {
            tracing::info!(
                entry = reserved.entry_index,
                full_url = reserved.full_url.as_deref().unwrap_or_default(),
                reference = %reserved.reference,
                "Reserved id for POST entry"
            );
        }

        let rendered = serde_json::to_string_pretty(&bundle)?;
        match self.output {
            Some(path) => std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{rendered}"),
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load_resources(store: &InMemorySearch, path: &Path) -> anyhow::Result<usize> {
    let resources = match read_json(path)? {
        Value::Array(items) => items,
        bundle if bundle.get("resourceType").and_then(|v| v.as_str()) == Some("Bundle") => bundle
            .get("entry")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("resource").cloned())
                    .collect()
            })
            .unwrap_or_default(),
        single => vec![single],
    };

    store
        .extend(resources)
        .with_context(|| format!("Failed to load resources from {}", path.display()))
}

async fn cancel_on_signal(handle: CancellationHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("SIGINT received, cancelling reference resolution");
        handle.cancel();
    }
}
