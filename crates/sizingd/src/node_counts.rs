//! File-backed node count source.
//!
//! The file maps cluster ids to node counts, as TOML (`prod-east = 12`) or,
//! when the name ends in `.json`, as a JSON object. It is re-read on every
//! call, so edits take effect on the next cycle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use sizing_controller::NodeCountSource;
use sizing_controller::source::BoxFuture;
use sizing_core::ClusterId;

pub struct FileNodeCountSource {
    path: PathBuf,
}

impl FileNodeCountSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> anyhow::Result<BTreeMap<ClusterId, u32>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading node counts from {}", self.path.display()))?;
        parse_node_counts(&self.path, &text)
    }
}

pub fn parse_node_counts(path: &Path, text: &str) -> anyhow::Result<BTreeMap<ClusterId, u32>> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let counts = if is_json {
        serde_json::from_str(text)?
    } else {
        toml::from_str(text)?
    };
    Ok(counts)
}

impl NodeCountSource for FileNodeCountSource {
    fn list_clusters(&self) -> BoxFuture<'_, anyhow::Result<Vec<ClusterId>>> {
        Box::pin(async move { Ok(self.load().await?.into_keys().collect()) })
    }

    fn node_count<'a>(&'a self, cluster_id: &'a str) -> BoxFuture<'a, anyhow::Result<u32>> {
        Box::pin(async move {
            self.load()
                .await?
                .get(cluster_id)
                .copied()
                .with_context(|| format!("cluster {cluster_id} not in node count file"))
        })
    }
}
