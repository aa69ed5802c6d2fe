//! Fleet-level behaviour of the sizing controller: debounce timing, the
//! sliding-window limit, fairness, idempotence and failure handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sizing_controller::source::BoxFuture;
use sizing_controller::{EffectsApplier, SizingController, StaticNodeCounts};
use sizing_core::config::EffectsConfiguration;
use sizing_core::{ClusterSizingConfiguration, SizeAssignment, Timestamp};
use sizing_state::StateStore;

const SECOND: Timestamp = 1_000;
const MINUTE: Timestamp = 60 * SECOND;
const BASE: Timestamp = 1_700_000_000_000;

fn config(limit: u32) -> ClusterSizingConfiguration {
    ClusterSizingConfiguration::from_toml_str(&format!(
        r#"
[[sizes]]
name = "small"
criteria = {{ from = 0, to = 10 }}

[[sizes]]
name = "medium"
criteria = {{ from = 11, to = 100 }}

[sizes.effects]
controlPlanePriorityClassName = "cp-medium"

[[sizes]]
name = "large"
criteria = {{ from = 101 }}

[concurrency]
slidingWindow = "10m"
limit = {limit}

[transitionDelay]
increase = "30s"
decrease = "10m"
"#
    ))
    .unwrap()
}

/// Records applied assignments; can be switched to fail for every cluster
/// or for the clusters listed in `failing_clusters`.
#[derive(Default)]
struct RecordingApplier {
    failing: AtomicBool,
    failing_clusters: Mutex<Vec<String>>,
    applied: Mutex<Vec<SizeAssignment>>,
}

impl RecordingApplier {
    fn applied_sizes(&self) -> Vec<(String, String)> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|a| (a.cluster_id.clone(), a.size.clone()))
            .collect()
    }
}

impl EffectsApplier for RecordingApplier {
    fn apply<'a>(&'a self, assignment: &'a SizeAssignment) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst)
                || self.failing_clusters.lock().unwrap().contains(&assignment.cluster_id)
            {
                anyhow::bail!("control plane unreachable");
            }
            self.applied.lock().unwrap().push(assignment.clone());
            Ok(())
        })
    }
}

struct Fleet {
    source: Arc<StaticNodeCounts>,
    applier: Arc<RecordingApplier>,
    controller: SizingController,
}

/// A fleet of clusters settled at "small", initial assignment done at BASE.
async fn settled_fleet(ids: &[&str], limit: u32) -> Fleet {
    settled_fleet_in(StateStore::open_in_memory().unwrap(), ids, limit).await
}

async fn settled_fleet_in(store: StateStore, ids: &[&str], limit: u32) -> Fleet {
    let source = Arc::new(StaticNodeCounts::from_counts(ids.iter().map(|id| (*id, 3))));
    let applier = Arc::new(RecordingApplier::default());
    let mut controller = SizingController::new(store, source.clone(), applier.clone());
    controller.apply_configuration(&Ok(config(limit)), BASE).unwrap();

    let report = controller.run_cycle(BASE).await.unwrap();
    assert_eq!(report.reclassified.len(), ids.len());
    Fleet {
        source,
        applier,
        controller,
    }
}

fn current_size(controller: &SizingController, id: &str) -> Option<String> {
    controller.cluster(id)?.state.current_size.clone()
}

#[tokio::test]
async fn initial_assignment_bypasses_limiter() {
    let fleet = settled_fleet(&["a", "b", "c", "d", "e", "f", "g"], 1).await;
    assert_eq!(fleet.controller.limiter().records().count(), 0);
    assert_eq!(fleet.applier.applied_sizes().len(), 7);
}

#[tokio::test]
async fn oscillation_never_commits() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let start = BASE + MINUTE;

    for step in 0..30 {
        let count = if step % 2 == 0 { 50 } else { 3 };
        fleet.source.set("a", count).await;
        let report = fleet.controller.run_cycle(start + step * 10 * SECOND).await.unwrap();
        assert!(report.committed.is_empty());
    }
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("small"));
    assert_eq!(fleet.controller.limiter().records().count(), 0);
}

#[tokio::test]
async fn increase_commits_after_delay() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    let report = fleet.controller.run_cycle(t).await.unwrap();
    assert_eq!(report.pending, vec!["a"]);

    let report = fleet.controller.run_cycle(t + 29 * SECOND).await.unwrap();
    assert!(report.committed.is_empty());
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("small"));

    let report = fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].to, "medium");
    assert_eq!(report.committed[0].pending_since, t);
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("medium"));

    let assignment = fleet.controller.cluster("a").unwrap().assignment.clone().unwrap();
    assert_eq!(
        assignment.effects.control_plane_priority_class_name.as_deref(),
        Some("cp-medium")
    );
}

#[tokio::test]
async fn decrease_waits_for_decrease_delay() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 500).await;
    fleet.controller.run_cycle(t).await.unwrap();
    fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("large"));

    fleet.source.set("a", 3).await;
    fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    let report = fleet.controller.run_cycle(t + 10 * MINUTE).await.unwrap();
    assert!(report.committed.is_empty());
    let report = fleet.controller.run_cycle(t + 11 * MINUTE).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("small"));
}

#[tokio::test]
async fn sliding_window_is_exact() {
    let ids = ["c0", "c1", "c2", "c3", "c4", "c5"];
    let mut fleet = settled_fleet(&ids, 5).await;
    let t = BASE + 20 * MINUTE;

    // c0..c4 become Ready at t, t+1m, .., t+4m and commit on arrival.
    for (i, id) in ids[..5].iter().enumerate() {
        let ready_at = t + i as Timestamp * MINUTE;
        fleet.source.set(id, 50).await;
        fleet.controller.run_cycle(ready_at - 30 * SECOND).await.unwrap();
        if i == 4 {
            fleet.source.set("c5", 50).await;
        }
        let report = fleet.controller.run_cycle(ready_at).await.unwrap();
        assert_eq!(report.committed.len(), 1, "commit at minute {i}");
        assert_eq!(report.committed[0].cluster_id, *id);
    }
    assert_eq!(fleet.controller.limiter().in_window(t + 4 * MINUTE), 5);

    // c5 is Ready at t+4.5m but the window is full.
    let report = fleet
        .controller
        .run_cycle(t + 4 * MINUTE + 30 * SECOND)
        .await
        .unwrap();
    assert_eq!(report.deferred, vec!["c5"]);

    let report = fleet
        .controller
        .run_cycle(t + 9 * MINUTE + 54 * SECOND)
        .await
        .unwrap();
    assert_eq!(report.deferred, vec!["c5"]);

    // t+10.1m: the commit at t has left the window.
    let report = fleet
        .controller
        .run_cycle(t + 10 * MINUTE + 6 * SECOND)
        .await
        .unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].cluster_id, "c5");
    assert_eq!(current_size(&fleet.controller, "c5").as_deref(), Some("medium"));
}

#[tokio::test]
async fn longest_waiting_is_admitted_first() {
    let mut fleet = settled_fleet(&["alpha", "gamma", "zeta"], 1).await;
    let g = BASE + MINUTE;

    // gamma fills the only slot until g+10m.
    fleet.source.set("gamma", 50).await;
    fleet.controller.run_cycle(g - 30 * SECOND).await.unwrap();
    let report = fleet.controller.run_cycle(g).await.unwrap();
    assert_eq!(report.committed.len(), 1);

    let t = g + 10 * MINUTE;
    fleet.source.set("zeta", 50).await;
    fleet.controller.run_cycle(t - 5 * MINUTE).await.unwrap();
    fleet.source.set("alpha", 50).await;
    let report = fleet.controller.run_cycle(t - MINUTE).await.unwrap();
    assert_eq!(report.deferred, vec!["zeta"]);

    // Both Ready when the slot frees; the one pending since t-5m goes first.
    let report = fleet.controller.run_cycle(t + SECOND).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].cluster_id, "zeta");
    assert_eq!(report.committed[0].pending_since, t - 5 * MINUTE);
    assert_eq!(report.deferred, vec!["alpha"]);
}

#[tokio::test]
async fn ties_are_broken_by_cluster_id() {
    let mut fleet = settled_fleet(&["b", "a"], 1).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.source.set("b", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();
    let report = fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(report.committed[0].cluster_id, "a");
    assert_eq!(report.deferred, vec!["b"]);
}

#[tokio::test]
async fn stable_rerun_mutates_nothing() {
    let mut fleet = settled_fleet(&["a", "b"], 5).await;
    let t = BASE + MINUTE;

    let stored = fleet.controller.store().list_clusters().unwrap();
    let registry = fleet.controller.registry().clone();

    let report = fleet.controller.run_cycle(t).await.unwrap();
    assert_eq!(report.stable, 2);
    assert!(report.is_quiet());
    assert_eq!(fleet.controller.registry(), &registry);
    assert_eq!(fleet.controller.store().list_clusters().unwrap(), stored);
    assert!(fleet.controller.store().list_transitions().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_configuration_freezes_fleet() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();
    let registry = fleet.controller.registry().clone();

    let mut broken = config(5);
    broken.concurrency.limit = 0;
    assert!(fleet.controller.apply_configuration(&Ok(broken), t + SECOND).unwrap());

    let report = fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    assert!(report.halted);
    assert_eq!(fleet.controller.registry(), &registry);

    // Back to a valid configuration: the pending clock survived the halt.
    fleet
        .controller
        .apply_configuration(&Ok(config(5)), t + 2 * MINUTE)
        .unwrap();
    let report = fleet.controller.run_cycle(t + 2 * MINUTE).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].pending_since, t);
    assert_eq!(fleet.controller.generation(), 3);
}

#[tokio::test]
async fn fetch_failure_skips_cluster() {
    let mut fleet = settled_fleet(&["a", "b"], 5).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();
    let before = fleet.controller.cluster("a").cloned();

    fleet.source.fail("a").await;
    let report = fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(report.skipped, vec!["a"]);
    assert_eq!(report.stable, 1);
    assert_eq!(fleet.controller.cluster("a").cloned(), before);

    fleet.source.set("a", 50).await;
    let report = fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    assert_eq!(report.committed.len(), 1);
}

#[tokio::test]
async fn unknown_size_is_reclassified_without_ledger_entry() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let t = BASE + MINUTE;

    // Rename "small" so the committed size no longer exists.
    let mut renamed = config(5);
    renamed.sizes[0].name = "tiny".to_string();
    fleet.controller.apply_configuration(&Ok(renamed), t).unwrap();

    let report = fleet.controller.run_cycle(t).await.unwrap();
    assert_eq!(report.reclassified, vec!["a"]);
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("tiny"));
    assert_eq!(fleet.controller.limiter().records().count(), 0);
}

#[tokio::test]
async fn failed_effects_release_slot_and_retry() {
    let mut fleet = settled_fleet(&["a"], 5).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();

    fleet.applier.failing.store(true, Ordering::SeqCst);
    let report = fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(report.failed, vec!["a"]);
    assert!(report.committed.is_empty());
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("small"));
    assert_eq!(fleet.controller.limiter().records().count(), 0);
    assert!(fleet.controller.store().list_transitions().unwrap().is_empty());
    assert_eq!(
        fleet.controller.cluster("a").unwrap().state.pending_since,
        Some(t)
    );

    fleet.applier.failing.store(false, Ordering::SeqCst);
    let report = fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(
        fleet.applier.applied_sizes().last(),
        Some(&("a".to_string(), "medium".to_string()))
    );
}

#[tokio::test]
async fn failing_cluster_does_not_starve_the_fleet() {
    let mut fleet = settled_fleet(&["a", "b"], 1).await;
    fleet.applier.failing_clusters.lock().unwrap().push("a".to_string());
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();
    fleet.source.set("b", 50).await;
    fleet.controller.run_cycle(t + 10 * SECOND).await.unwrap();

    // "a" waited longest and goes first, fails, and hands the slot to "b".
    let report = fleet.controller.run_cycle(t + 40 * SECOND).await.unwrap();
    assert_eq!(report.failed, vec!["a"]);
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].cluster_id, "b");
    assert!(report.deferred.is_empty());
    assert_eq!(current_size(&fleet.controller, "b").as_deref(), Some("medium"));

    let ledger = fleet.controller.store().list_transitions().unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].cluster_id, "b");

    // Later retries of "a" never hold a slot.
    for step in 1..=12 {
        let now = t + 40 * SECOND + step * 11 * MINUTE;
        let report = fleet.controller.run_cycle(now).await.unwrap();
        assert_eq!(report.failed, vec!["a"]);
        assert!(report.deferred.is_empty());
        assert_eq!(fleet.controller.limiter().in_window(now), 0);
    }
    assert!(fleet.controller.store().list_transitions().unwrap().is_empty());
    assert_eq!(current_size(&fleet.controller, "a").as_deref(), Some("small"));
}

#[tokio::test]
async fn changed_effects_are_reapplied_without_a_slot() {
    let mut fleet = settled_fleet(&["a", "b"], 1).await;
    let t = BASE + MINUTE;

    fleet.source.set("a", 50).await;
    fleet.controller.run_cycle(t).await.unwrap();
    let report = fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(fleet.controller.limiter().in_window(t + 30 * SECOND), 1);

    let mut updated = config(1);
    updated.sizes[1].effects = Some(EffectsConfiguration {
        control_plane_priority_class_name: Some("cp-critical".to_string()),
        ..EffectsConfiguration::default()
    });
    fleet.controller.apply_configuration(&Ok(updated), t + MINUTE).unwrap();

    // The window is full, yet the new effects still reach "a".
    let report = fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    assert_eq!(report.refreshed, vec!["a"]);
    assert!(report.committed.is_empty());
    assert_eq!(fleet.controller.limiter().records().count(), 1);

    let applied = fleet.applier.applied.lock().unwrap().last().cloned().unwrap();
    assert_eq!(applied.cluster_id, "a");
    assert_eq!(applied.size, "medium");
    assert_eq!(
        applied.effects.control_plane_priority_class_name.as_deref(),
        Some("cp-critical")
    );

    let stored = fleet.controller.store().get_cluster("a").unwrap().unwrap();
    assert_eq!(
        stored.assignment.unwrap().effects.control_plane_priority_class_name.as_deref(),
        Some("cp-critical")
    );
    assert_eq!(stored.state.current_size.as_deref(), Some("medium"));

    let report = fleet.controller.run_cycle(t + 2 * MINUTE).await.unwrap();
    assert!(report.refreshed.is_empty());
    assert!(report.is_quiet());
}

#[tokio::test]
async fn restart_keeps_ledger_and_clocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sizing.redb");
    let t = BASE + MINUTE;

    {
        let mut fleet = settled_fleet_in(StateStore::open(&path).unwrap(), &["a", "b"], 5).await;
        fleet.source.set("a", 50).await;
        fleet.controller.run_cycle(t).await.unwrap();
        fleet.controller.run_cycle(t + 30 * SECOND).await.unwrap();
        fleet.source.set("b", 50).await;
        fleet.controller.run_cycle(t + MINUTE).await.unwrap();
    }

    let source = Arc::new(StaticNodeCounts::from_counts([("a", 50), ("b", 50)]));
    let mut controller = SizingController::new(
        StateStore::open(&path).unwrap(),
        source,
        Arc::new(RecordingApplier::default()),
    );
    controller.restore().unwrap();
    assert_eq!(controller.limiter().records().count(), 1);
    assert_eq!(controller.generation(), 1);
    assert_eq!(
        controller.cluster("b").unwrap().state.pending_since,
        Some(t + MINUTE)
    );

    controller.apply_configuration(&Ok(config(5)), t + 2 * MINUTE).unwrap();
    let report = controller.run_cycle(t + 2 * MINUTE).await.unwrap();
    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].cluster_id, "b");
    assert_eq!(report.committed[0].pending_since, t + MINUTE);
}
