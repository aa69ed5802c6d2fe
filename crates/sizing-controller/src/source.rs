//! Node count source — where the controller learns fleet membership and
//! per-cluster node counts.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use sizing_core::ClusterId;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists managed clusters and reports their current node counts.
///
/// Injected into the controller so that tests and the daemon can supply
/// their own fleet view.
pub trait NodeCountSource: Send + Sync {
    /// Identifiers of every cluster currently under management.
    fn list_clusters(&self) -> BoxFuture<'_, anyhow::Result<Vec<ClusterId>>>;

    /// Current node count of one cluster. An error skips the cluster for
    /// the rest of the cycle.
    fn node_count<'a>(&'a self, cluster_id: &'a str) -> BoxFuture<'a, anyhow::Result<u32>>;
}

/// In-memory node counts, mutable between cycles.
///
/// A cluster registered with `None` is listed but its fetch fails.
#[derive(Debug, Default)]
pub struct StaticNodeCounts {
    counts: RwLock<BTreeMap<ClusterId, Option<u32>>>,
}

impl StaticNodeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<ClusterId>,
    {
        let counts = counts
            .into_iter()
            .map(|(id, n)| (id.into(), Some(n)))
            .collect();
        Self {
            counts: RwLock::new(counts),
        }
    }

    pub async fn set(&self, cluster_id: &str, node_count: u32) {
        self.counts
            .write()
            .await
            .insert(cluster_id.to_string(), Some(node_count));
    }

    /// Keep the cluster listed but make its fetch fail.
    pub async fn fail(&self, cluster_id: &str) {
        self.counts.write().await.insert(cluster_id.to_string(), None);
    }

    pub async fn remove(&self, cluster_id: &str) {
        self.counts.write().await.remove(cluster_id);
    }

    /// Replace the whole fleet view.
    pub async fn replace(&self, counts: BTreeMap<ClusterId, Option<u32>>) {
        *self.counts.write().await = counts;
    }
}

impl NodeCountSource for StaticNodeCounts {
    fn list_clusters(&self) -> BoxFuture<'_, anyhow::Result<Vec<ClusterId>>> {
        Box::pin(async move { Ok(self.counts.read().await.keys().cloned().collect()) })
    }

    fn node_count<'a>(&'a self, cluster_id: &'a str) -> BoxFuture<'a, anyhow::Result<u32>> {
        Box::pin(async move {
            match self.counts.read().await.get(cluster_id) {
                Some(Some(n)) => Ok(*n),
                Some(None) => anyhow::bail!("node count unavailable for cluster {cluster_id}"),
                None => anyhow::bail!("unknown cluster {cluster_id}"),
            }
        })
    }
}
