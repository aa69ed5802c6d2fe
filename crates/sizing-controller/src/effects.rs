//! Effects applier — hands committed size assignments to whatever renders
//! them onto a cluster's control plane.

use tracing::info;

use sizing_core::SizeAssignment;

use crate::source::BoxFuture;

/// Applies the effects of a committed size assignment.
///
/// The controller commits a transition only after `apply` succeeds; a
/// failure leaves the cluster at its previous size and the transition is
/// retried on a later cycle.
pub trait EffectsApplier: Send + Sync {
    fn apply<'a>(&'a self, assignment: &'a SizeAssignment) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Applier that only logs each assignment.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyEffectsApplier;

impl EffectsApplier for LogOnlyEffectsApplier {
    fn apply<'a>(&'a self, assignment: &'a SizeAssignment) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let effects = &assignment.effects;
            info!(
                cluster = %assignment.cluster_id,
                size = %assignment.size,
                kas_memory_request = ?effects.kas_memory_request.as_ref().map(|q| q.as_str()),
                kas_go_mem_limit = ?effects.kas_go_mem_limit.as_ref().map(|q| q.as_str()),
                control_plane_priority_class = ?effects.control_plane_priority_class_name,
                etcd_priority_class = ?effects.etcd_priority_class_name,
                api_critical_priority_class = ?effects.api_critical_priority_class_name,
                "size assignment (log-only mode)"
            );
            Ok(())
        })
    }
}
