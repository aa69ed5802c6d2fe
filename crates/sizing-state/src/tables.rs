//! redb table definitions for the sizing state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Cluster sizing records keyed by `{cluster_id}`.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Transition ledger keyed by `{committed_at:020}:{cluster_id}`, so that
/// lexicographic key order is commit order.
pub const LEDGER: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger");

/// Singleton status documents keyed by name (e.g. `conditions`).
pub const STATUS: TableDefinition<&str, &[u8]> = TableDefinition::new("status");
