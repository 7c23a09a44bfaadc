//! Two-tier record cache.
//!
//! Both tiers are advisory. A hit is never trusted on its own: the toolkit
//! checks the UID embedded in every row it serves and drops entries that
//! turn out to be stale. Caches therefore never report errors; a backend
//! failure is indistinguishable from a miss.
//!
//! # Tiers
//!
//! - [`UidCache`]: UID to row number. Stale entries are cheap, they only cost
//!   one extra round trip.
//! - [`RowCache`]: row number to row data. When both tiers hit no request is
//!   made at all, so implementations must forget entries quickly.
//!
//! The same cache backend may be shared by several toolkits.

mod memory;
mod null;
mod shared;

pub use memory::{MemoryRowCache, MemoryUidCache};
pub use null::NullCache;
pub use shared::{KeyValueStore, SharedCache, StoreError};

use std::collections::HashMap;

/// Cell values of one row, keyed by column.
pub type RowData = HashMap<String, String>;

/// Caches the row number of each UID.
pub trait UidCache: Send + Sync {
    /// Stores the row number of `uid`.
    fn put_uid(&self, uid: &str, row: usize);

    /// Returns the cached row number of `uid`, or `None` on a miss.
    fn get_row_num(&self, uid: &str) -> Option<usize>;

    /// Drops the entry of `uid`. Dropping more than that is allowed.
    fn invalidate_uid(&self, uid: &str);
}

/// Caches whole rows by row number.
///
/// Never used to look up UIDs.
pub trait RowCache: Send + Sync {
    /// Stores the data of `row`.
    fn put_row(&self, row: usize, data: &RowData);

    /// Returns the cached data of `row`, or `None` on a miss.
    fn get_row(&self, row: usize) -> Option<RowData>;

    /// Drops the entry of `row`. Dropping more than that is allowed.
    fn invalidate_row(&self, row: usize);
}
