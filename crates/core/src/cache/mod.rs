//! In-memory result cache with in-flight deduplication.
//!
//! This module provides the keyed store the coordinator and the prefetch
//! scheduler share. It supports:
//!
//! - One entry per [`SearchKey`](crate::SearchKey), pending or resolved
//! - Joining an in-flight fetch instead of issuing a second one
//! - Stale-time refetch and gc-time purge (no capacity-based eviction)
//! - Ticket-owned completion so superseded fetches cannot overwrite newer state

mod entry;
mod store;

pub use entry::{CacheEntry, EntryStatus, FetchTicket, Lookup, Outcome, PendingFetch};
pub use store::{CacheStats, CacheStore, GC_TIME_DEFAULT, STALE_TIME_DEFAULT, StoreOptions};
