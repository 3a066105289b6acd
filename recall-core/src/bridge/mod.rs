//! Store sync bridge.
//!
//! The session schedules from an in-memory [`ModelSnapshot`]. The bridge
//! bulk-loads it from the store and then folds in change notifications,
//! whether they come from this device's own writes or from replication.
//! Notifications may arrive late, twice, or out of order; the last one
//! delivered for a key wins.

mod snapshot;
mod sync;

pub use snapshot::{merge_change, ModelSnapshot, SharedSnapshot};
pub use sync::SyncBridge;
