//! Sizing controller — the reconciliation cycle and its run loop.
//!
//! Owns the cluster registry, the fleet ledger and the status conditions.
//! All mutation happens inside `run_cycle`/`apply_configuration`, which
//! the run loop calls from a single task.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use sizing_core::condition::{find_condition, set_condition};
use sizing_core::{
    CONFIGURATION_VALID, ClusterId, ClusterSizingConfiguration, Condition, ConcurrencyPolicy,
    ConfigResult, Direction, SizeAssignment, SizingPolicy, Timestamp, epoch_millis,
};
use sizing_state::{ClusterRecord, StateStore};

use crate::debounce::{DebounceOutcome, Debouncer};
use crate::effects::EffectsApplier;
use crate::error::{ControllerError, ControllerResult};
use crate::limiter::FleetTransitionLimiter;
use crate::source::NodeCountSource;

/// A configuration load result as pushed to the controller. Load failures
/// are delivered too, so they can be reported as a condition.
pub type ConfigUpdate = Arc<ConfigResult<ClusterSizingConfiguration>>;

/// A size transition that finished its delay and was handed to the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub cluster_id: ClusterId,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub pending_since: Timestamp,
}

/// What one evaluation cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: Timestamp,
    pub generation: u64,
    /// The active configuration is invalid; nothing was evaluated.
    pub halted: bool,
    /// A configuration change arrived mid-cycle and stopped the commits.
    pub interrupted: bool,
    pub evaluated: usize,
    pub stable: usize,
    /// Clusters assigned without debounce (first sight or unknown size).
    pub reclassified: Vec<ClusterId>,
    /// Clusters whose committed size's effects changed and were re-applied.
    pub refreshed: Vec<ClusterId>,
    pub pending: Vec<ClusterId>,
    pub cancelled: Vec<ClusterId>,
    pub committed: Vec<Transition>,
    /// Ready clusters the limiter turned away this cycle.
    pub deferred: Vec<ClusterId>,
    /// Clusters whose effects could not be applied.
    pub failed: Vec<ClusterId>,
    /// Clusters whose node count could not be fetched.
    pub skipped: Vec<ClusterId>,
    /// Clusters no longer under management.
    pub removed: Vec<ClusterId>,
}

impl CycleReport {
    fn new(started_at: Timestamp, generation: u64) -> Self {
        Self {
            started_at,
            generation,
            ..Self::default()
        }
    }

    /// True if the cycle changed no cluster's committed size.
    pub fn is_quiet(&self) -> bool {
        self.committed.is_empty()
            && self.reclassified.is_empty()
            && self.refreshed.is_empty()
            && self.removed.is_empty()
    }
}

/// Assigns size classes to managed clusters.
pub struct SizingController {
    store: StateStore,
    source: Arc<dyn NodeCountSource>,
    applier: Arc<dyn EffectsApplier>,
    /// Last configuration input seen, used to detect changes. Load errors
    /// are compared by message.
    last_input: Option<Result<ClusterSizingConfiguration, String>>,
    /// Active policy; `None` while the configuration is invalid.
    policy: Option<SizingPolicy>,
    generation: u64,
    conditions: Vec<Condition>,
    registry: BTreeMap<ClusterId, ClusterRecord>,
    /// Records changed in memory but not yet written to the store.
    dirty: BTreeSet<ClusterId>,
    limiter: FleetTransitionLimiter,
}

impl SizingController {
    pub fn new(
        store: StateStore,
        source: Arc<dyn NodeCountSource>,
        applier: Arc<dyn EffectsApplier>,
    ) -> Self {
        Self {
            store,
            source,
            applier,
            last_input: None,
            policy: None,
            generation: 0,
            conditions: Vec::new(),
            registry: BTreeMap::new(),
            dirty: BTreeSet::new(),
            limiter: FleetTransitionLimiter::new(ConcurrencyPolicy::default()),
        }
    }

    /// Load the registry, ledger and conditions from the store.
    pub fn restore(&mut self) -> ControllerResult<()> {
        self.registry = self
            .store
            .list_clusters()?
            .into_iter()
            .map(|record| (record.cluster_id.clone(), record))
            .collect();
        self.dirty.clear();
        self.limiter.restore(self.store.list_transitions()?);
        self.conditions = self.store.get_conditions()?;
        self.generation = self
            .conditions
            .iter()
            .map(|c| c.observed_generation)
            .max()
            .unwrap_or(0);

        info!(
            clusters = self.registry.len(),
            ledger = self.limiter.records().count(),
            generation = self.generation,
            "controller state restored"
        );
        Ok(())
    }

    /// Accept a configuration load result. Returns true if it differs from
    /// the previous input, in which case the generation is bumped and the
    /// validity condition is recomputed and persisted.
    ///
    /// An invalid configuration halts the controller until a valid one
    /// arrives. Committed sizes and the ledger are kept.
    pub fn apply_configuration(
        &mut self,
        input: &ConfigResult<ClusterSizingConfiguration>,
        now: Timestamp,
    ) -> ControllerResult<bool> {
        let key = input.as_ref().map(Clone::clone).map_err(ToString::to_string);
        if self.last_input.as_ref() == Some(&key) {
            return Ok(false);
        }
        self.last_input = Some(key);
        self.generation += 1;
        let generation = self.generation;

        let (policy, condition) = match input {
            Ok(config) => match config.validate() {
                Ok(policy) => (
                    Some(policy),
                    Condition::configuration_valid(Ok(()), generation, now),
                ),
                Err(e) => (None, Condition::configuration_valid(Err(&e), generation, now)),
            },
            Err(e) => (None, Condition::configuration_valid(Err(e), generation, now)),
        };

        match &policy {
            Some(policy) => {
                self.limiter.reconfigure(policy.concurrency);
                info!(
                    generation,
                    sizes = ?policy.partition.names().collect::<Vec<_>>(),
                    limit = policy.concurrency.limit,
                    window = ?policy.concurrency.sliding_window,
                    "sizing configuration accepted"
                );
            }
            None => warn!(
                generation,
                reason = %condition.reason,
                message = %condition.message,
                "sizing configuration rejected, size transitions halted"
            ),
        }
        self.policy = policy;

        if set_condition(&mut self.conditions, condition) {
            self.store.put_conditions(&self.conditions)?;
        }
        Ok(true)
    }

    /// True while no valid configuration is active.
    pub fn is_halted(&self) -> bool {
        self.policy.is_none()
    }

    pub fn policy(&self) -> Option<&SizingPolicy> {
        self.policy.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The `ClusterSizingConfigurationValid` condition, once computed.
    pub fn configuration_condition(&self) -> Option<&Condition> {
        find_condition(&self.conditions, CONFIGURATION_VALID)
    }

    pub fn registry(&self) -> &BTreeMap<ClusterId, ClusterRecord> {
        &self.registry
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterRecord> {
        self.registry.get(cluster_id)
    }

    pub fn limiter(&self) -> &FleetTransitionLimiter {
        &self.limiter
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one evaluation cycle at `now`.
    pub async fn run_cycle(&mut self, now: Timestamp) -> ControllerResult<CycleReport> {
        self.run_cycle_watching(now, None).await
    }

    /// Run one evaluation cycle, checking `config_rx` for a new
    /// configuration before every commit.
    pub async fn run_cycle_watching(
        &mut self,
        now: Timestamp,
        mut config_rx: Option<&mut watch::Receiver<ConfigUpdate>>,
    ) -> ControllerResult<CycleReport> {
        let mut report = CycleReport::new(now, self.generation);
        let Some(policy) = self.policy.clone() else {
            warn!(generation = self.generation, "configuration invalid, skipping cycle");
            report.halted = true;
            return Ok(report);
        };

        let listed: BTreeSet<ClusterId> = self
            .source
            .list_clusters()
            .await
            .map_err(ControllerError::ListClusters)?
            .into_iter()
            .collect();
        self.remove_departed(&listed, &mut report)?;

        // Read every cluster's state before the limiter sees any candidate.
        let debouncer = Debouncer::new(&policy);
        let mut candidates = Vec::new();
        let mut reclassify = Vec::new();
        let mut refresh = Vec::new();
        for cluster_id in &listed {
            let node_count = match self.source.node_count(cluster_id).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(cluster = %cluster_id, error = %e, "node count fetch failed, skipping cluster");
                    report.skipped.push(cluster_id.clone());
                    continue;
                }
            };
            report.evaluated += 1;

            let record = self
                .registry
                .entry(cluster_id.clone())
                .or_insert_with(|| ClusterRecord::new(cluster_id, now));
            let (prior_state, prior_count) = (record.state.clone(), record.last_node_count);
            record.last_node_count = Some(node_count);

            let outcome = debouncer.observe(&mut record.state, node_count, now);
            if record.state != prior_state || record.last_node_count != prior_count {
                self.dirty.insert(cluster_id.clone());
            }
            if !matches!(outcome, DebounceOutcome::Reclassify { .. })
                && let Some(current) = record.state.current_size.as_deref()
                && assignment_is_stale(&policy, record.assignment.as_ref(), current)
            {
                refresh.push((cluster_id.clone(), current.to_string()));
            }

            match outcome {
                DebounceOutcome::Stable => report.stable += 1,
                DebounceOutcome::Cancelled { target } => {
                    debug!(cluster = %cluster_id, %target, node_count, "pending transition cancelled");
                    report.cancelled.push(cluster_id.clone());
                }
                DebounceOutcome::Pending { .. } => report.pending.push(cluster_id.clone()),
                DebounceOutcome::Ready {
                    target,
                    direction,
                    since,
                } => candidates.push(Transition {
                    cluster_id: cluster_id.clone(),
                    from: record.state.current_size.clone().unwrap_or_default(),
                    to: target,
                    direction,
                    pending_since: since,
                }),
                DebounceOutcome::Reclassify { from, to } => {
                    reclassify.push((cluster_id.clone(), from, to));
                }
            }
        }

        'commits: {
            for (cluster_id, from, to) in reclassify {
                if self.poll_configuration(&mut config_rx, now, &mut report)? {
                    break 'commits;
                }
                let assignment = assignment_for(&policy, &cluster_id, &to, now);
                if let Err(e) = self.applier.apply(&assignment).await {
                    warn!(cluster = %cluster_id, size = %to, error = %e, "applying size effects failed");
                    report.failed.push(cluster_id);
                    continue;
                }
                if let Some(record) = self.registry.get_mut(&cluster_id) {
                    Debouncer::commit(&mut record.state);
                    record.assignment = Some(assignment);
                    self.dirty.insert(cluster_id.clone());
                }
                info!(cluster = %cluster_id, from = ?from, to = %to, "size assigned");
                report.reclassified.push(cluster_id);
            }

            // The committed size stays; only its effects changed.
            for (cluster_id, size) in refresh {
                if self.poll_configuration(&mut config_rx, now, &mut report)? {
                    break 'commits;
                }
                let assignment = assignment_for(&policy, &cluster_id, &size, now);
                if let Err(e) = self.applier.apply(&assignment).await {
                    warn!(cluster = %cluster_id, %size, error = %e, "re-applying size effects failed");
                    report.failed.push(cluster_id);
                    continue;
                }
                if let Some(record) = self.registry.get_mut(&cluster_id) {
                    record.assignment = Some(assignment);
                    self.dirty.insert(cluster_id.clone());
                }
                info!(cluster = %cluster_id, %size, "size effects re-applied");
                report.refreshed.push(cluster_id);
            }

            // Longest-waiting first; ties broken by cluster id.
            candidates.sort_by(|a, b| {
                (a.pending_since, &a.cluster_id).cmp(&(b.pending_since, &b.cluster_id))
            });

            for candidate in candidates {
                if self.poll_configuration(&mut config_rx, now, &mut report)? {
                    break 'commits;
                }
                if !self.limiter.admit(&candidate.cluster_id, now) {
                    warn!(
                        cluster = %candidate.cluster_id,
                        from = %candidate.from,
                        to = %candidate.to,
                        next_slot_in = ?self.limiter.next_slot_in(now),
                        "size transition deferred by fleet limit"
                    );
                    report.deferred.push(candidate.cluster_id);
                    continue;
                }
                let Some(entry) = self.limiter.last_record().cloned() else {
                    continue;
                };
                if let Err(e) = self.store.append_transition(&entry) {
                    self.limiter.release(&entry);
                    return Err(e.into());
                }

                let assignment = assignment_for(&policy, &candidate.cluster_id, &candidate.to, now);
                if let Err(e) = self.applier.apply(&assignment).await {
                    warn!(
                        cluster = %candidate.cluster_id,
                        size = %candidate.to,
                        error = %e,
                        "applying size effects failed, transition slot released"
                    );
                    self.limiter.release(&entry);
                    self.store.delete_transition(&entry)?;
                    report.failed.push(candidate.cluster_id);
                    continue;
                }
                if let Some(record) = self.registry.get_mut(&candidate.cluster_id) {
                    Debouncer::commit(&mut record.state);
                    record.assignment = Some(assignment);
                    self.dirty.insert(candidate.cluster_id.clone());
                }
                info!(
                    cluster = %candidate.cluster_id,
                    from = %candidate.from,
                    to = %candidate.to,
                    direction = ?candidate.direction,
                    waited_ms = now.saturating_sub(candidate.pending_since),
                    "size transition committed"
                );
                report.committed.push(candidate);
            }
        }

        if let Some(cutoff) = self.limiter.cutoff(now) {
            self.limiter.prune(now);
            self.store.prune_transitions(cutoff)?;
        }
        self.persist_changes(now)?;

        if report.is_quiet() {
            debug!(
                evaluated = report.evaluated,
                pending = report.pending.len(),
                deferred = report.deferred.len(),
                skipped = report.skipped.len(),
                "evaluation cycle complete"
            );
        } else {
            info!(
                evaluated = report.evaluated,
                committed = report.committed.len(),
                reclassified = report.reclassified.len(),
                refreshed = report.refreshed.len(),
                pending = report.pending.len(),
                deferred = report.deferred.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                removed = report.removed.len(),
                "evaluation cycle complete"
            );
        }
        Ok(report)
    }

    /// Run the controller loop until shutdown.
    ///
    /// A cycle runs on every tick, on every `trigger` notification and
    /// after every configuration change. Overlapping triggers coalesce.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut config_rx: watch::Receiver<ConfigUpdate>,
        trigger: Arc<Notify>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "sizing controller started");

        let initial = config_rx.borrow_and_update().clone();
        if let Err(e) = self.apply_configuration(&initial, epoch_millis()) {
            error!(error = %e, "failed to record configuration status");
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut config_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = trigger.notified() => {
                    debug!("evaluation triggered");
                }
                changed = config_rx.changed(), if config_open => {
                    if changed.is_err() {
                        debug!("configuration channel closed");
                        config_open = false;
                        continue;
                    }
                    let update = config_rx.borrow_and_update().clone();
                    match self.apply_configuration(&update, epoch_millis()) {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            error!(error = %e, "failed to record configuration status");
                            continue;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("sizing controller shutting down");
                    break;
                }
            }

            if let Err(e) = self
                .run_cycle_watching(epoch_millis(), Some(&mut config_rx))
                .await
            {
                error!(error = %e, "evaluation cycle failed");
            }
        }
    }

    /// Apply a pending configuration update, if any. Returns true if the
    /// update changed the configuration, which ends the commit phase.
    fn poll_configuration(
        &mut self,
        config_rx: &mut Option<&mut watch::Receiver<ConfigUpdate>>,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> ControllerResult<bool> {
        let Some(rx) = config_rx.as_mut() else {
            return Ok(false);
        };
        if !rx.has_changed().unwrap_or(false) {
            return Ok(false);
        }
        let update = rx.borrow_and_update().clone();
        if !self.apply_configuration(&update, now)? {
            return Ok(false);
        }
        report.interrupted = true;
        report.halted = self.is_halted();
        info!(
            generation = self.generation,
            halted = report.halted,
            "configuration changed mid-cycle, remaining commits abandoned"
        );
        Ok(true)
    }

    fn remove_departed(
        &mut self,
        listed: &BTreeSet<ClusterId>,
        report: &mut CycleReport,
    ) -> ControllerResult<()> {
        let departed: Vec<ClusterId> = self
            .registry
            .keys()
            .filter(|id| !listed.contains(*id))
            .cloned()
            .collect();
        for cluster_id in departed {
            self.registry.remove(&cluster_id);
            self.dirty.remove(&cluster_id);
            self.store.delete_cluster(&cluster_id)?;
            info!(cluster = %cluster_id, "cluster no longer managed, state dropped");
            report.removed.push(cluster_id);
        }
        Ok(())
    }

    /// Write every dirty record. Records stay dirty until a write succeeds,
    /// so changes made by a cycle that failed part-way are written by the
    /// next one.
    fn persist_changes(&mut self, now: Timestamp) -> ControllerResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let mut changed = Vec::with_capacity(self.dirty.len());
        for cluster_id in &self.dirty {
            if let Some(record) = self.registry.get_mut(cluster_id) {
                record.updated_at = now;
                changed.push(record.clone());
            }
        }
        self.store.put_clusters(&changed)?;
        self.dirty.clear();
        Ok(())
    }
}

/// True if `assignment` no longer carries the active effects of `size`.
fn assignment_is_stale(
    policy: &SizingPolicy,
    assignment: Option<&SizeAssignment>,
    size: &str,
) -> bool {
    let Some(class) = policy.partition.get(size) else {
        return false;
    };
    assignment.is_none_or(|a| a.size != size || a.effects != class.effects)
}

fn assignment_for(
    policy: &SizingPolicy,
    cluster_id: &str,
    size: &str,
    now: Timestamp,
) -> SizeAssignment {
    SizeAssignment {
        cluster_id: cluster_id.to_string(),
        size: size.to_string(),
        effects: policy
            .partition
            .get(size)
            .map(|class| class.effects.clone())
            .unwrap_or_default(),
        assigned_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::LogOnlyEffectsApplier;
    use crate::source::StaticNodeCounts;

    const SECOND: Timestamp = 1_000;
    const T0: Timestamp = 1_700_000_000_000;

    const CONFIG: &str = r#"
[[sizes]]
name = "small"
criteria = { from = 0, to = 10 }

[[sizes]]
name = "medium"
criteria = { from = 11, to = 100 }

[sizes.effects]
kasMemoryRequest = "8Gi"

[[sizes]]
name = "large"
criteria = { from = 101 }
"#;

    fn config() -> ConfigResult<ClusterSizingConfiguration> {
        ClusterSizingConfiguration::from_toml_str(CONFIG)
    }

    fn controller(source: Arc<StaticNodeCounts>) -> SizingController {
        SizingController::new(
            StateStore::open_in_memory().unwrap(),
            source,
            Arc::new(LogOnlyEffectsApplier),
        )
    }

    #[tokio::test]
    async fn halted_without_configuration() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 3)]));
        let mut controller = controller(source);

        let report = controller.run_cycle(T0).await.unwrap();
        assert!(report.halted);
        assert!(controller.registry().is_empty());
    }

    #[tokio::test]
    async fn configuration_bumps_generation_once() {
        let source = Arc::new(StaticNodeCounts::new());
        let mut controller = controller(source);

        assert!(controller.apply_configuration(&config(), T0).unwrap());
        assert!(!controller.apply_configuration(&config(), T0 + SECOND).unwrap());
        assert_eq!(controller.generation(), 1);

        let condition = controller.configuration_condition().unwrap();
        assert!(condition.is_true());
        assert_eq!(condition.reason, "AsExpected");
        assert_eq!(condition.observed_generation, 1);
        assert_eq!(controller.store().get_conditions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_configuration_sets_false_condition() {
        let source = Arc::new(StaticNodeCounts::new());
        let mut controller = controller(source);
        controller.apply_configuration(&config(), T0).unwrap();

        let broken = ClusterSizingConfiguration::from_toml_str(
            r#"
[[sizes]]
name = "small"
criteria = { from = 0, to = 10 }

[[sizes]]
name = "large"
criteria = { from = 20 }
"#,
        );
        assert!(controller.apply_configuration(&broken, T0 + SECOND).unwrap());
        assert!(controller.is_halted());

        let condition = controller.configuration_condition().unwrap();
        assert!(!condition.is_true());
        assert_eq!(condition.reason, "ConfigurationInvalid");
        assert_eq!(condition.observed_generation, 2);
        assert_eq!(condition.last_transition_time, T0 + SECOND);
    }

    #[tokio::test]
    async fn unreadable_configuration_reason() {
        let source = Arc::new(StaticNodeCounts::new());
        let mut controller = controller(source);

        let unreadable = ClusterSizingConfiguration::from_toml_str("sizes = 3");
        controller.apply_configuration(&unreadable, T0).unwrap();
        assert_eq!(
            controller.configuration_condition().unwrap().reason,
            "ConfigurationUnreadable"
        );
    }

    #[tokio::test]
    async fn first_sight_assigns_with_effects() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 50)]));
        let mut controller = controller(source);
        controller.apply_configuration(&config(), T0).unwrap();

        let report = controller.run_cycle(T0).await.unwrap();
        assert_eq!(report.reclassified, vec!["a"]);
        assert!(controller.limiter().records().next().is_none());

        let record = controller.cluster("a").unwrap();
        assert_eq!(record.state.current_size.as_deref(), Some("medium"));
        let assignment = record.assignment.as_ref().unwrap();
        assert_eq!(
            assignment.effects.kas_memory_request.as_ref().unwrap().as_str(),
            "8Gi"
        );
        assert_eq!(controller.store().get_cluster("a").unwrap().as_ref(), Some(record));
    }

    #[tokio::test]
    async fn departed_clusters_are_dropped() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 3), ("b", 3)]));
        let mut controller = controller(source.clone());
        controller.apply_configuration(&config(), T0).unwrap();
        controller.run_cycle(T0).await.unwrap();

        source.remove("b").await;
        let report = controller.run_cycle(T0 + SECOND).await.unwrap();
        assert_eq!(report.removed, vec!["b"]);
        assert!(controller.cluster("b").is_none());
        assert!(controller.store().get_cluster("b").unwrap().is_none());
    }

    #[tokio::test]
    async fn unsaved_changes_are_written_by_the_next_cycle() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 50)]));
        let mut controller = controller(source);
        controller.apply_configuration(&config(), T0).unwrap();
        controller.run_cycle(T0).await.unwrap();
        assert!(controller.dirty.is_empty());

        // A change left behind by a cycle that stopped before persisting.
        let record = controller.registry.get_mut("a").unwrap();
        record.assignment.as_mut().unwrap().assigned_at = T0 + 5 * SECOND;
        controller.dirty.insert("a".to_string());

        let report = controller.run_cycle(T0 + 10 * SECOND).await.unwrap();
        assert!(report.is_quiet());
        assert!(controller.dirty.is_empty());

        let stored = controller.store().get_cluster("a").unwrap().unwrap();
        assert_eq!(stored.assignment.unwrap().assigned_at, T0 + 5 * SECOND);
        assert_eq!(stored.updated_at, T0 + 10 * SECOND);
    }

    #[tokio::test]
    async fn departed_cluster_is_not_rewritten() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 3)]));
        let mut controller = controller(source.clone());
        controller.apply_configuration(&config(), T0).unwrap();
        controller.run_cycle(T0).await.unwrap();

        controller.dirty.insert("a".to_string());
        source.remove("a").await;
        controller.run_cycle(T0 + SECOND).await.unwrap();
        assert!(controller.dirty.is_empty());
        assert!(controller.store().list_clusters().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mid_cycle_invalid_configuration_stops_commits() {
        let source = Arc::new(StaticNodeCounts::from_counts([("a", 3), ("b", 3)]));
        let mut controller = controller(source.clone());
        controller.apply_configuration(&config(), T0).unwrap();
        controller.run_cycle(T0).await.unwrap();

        source.set("a", 50).await;
        source.set("b", 50).await;
        controller.run_cycle(T0 + SECOND).await.unwrap();

        let (tx, mut rx) = watch::channel::<ConfigUpdate>(Arc::new(config()));
        tx.send(Arc::new(ClusterSizingConfiguration::from_toml_str("name = \"x\""))).unwrap();

        let report = controller
            .run_cycle_watching(T0 + 60 * SECOND, Some(&mut rx))
            .await
            .unwrap();
        assert!(report.interrupted);
        assert!(report.halted);
        assert!(report.committed.is_empty());
        assert_eq!(
            controller.cluster("a").unwrap().state.current_size.as_deref(),
            Some("small")
        );
    }
}
