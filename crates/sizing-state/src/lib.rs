//! sizing-state — embedded state store for the cluster sizing controller.
//!
//! Backed by [redb](https://docs.rs/redb), persists per-cluster sizing
//! records, the fleet transition ledger, and the configuration status
//! conditions so that a restarted controller keeps its debounce clocks and
//! rate-limit history.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared between the controller task and the API server.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
