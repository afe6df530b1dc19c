//! Core types and shared functionality for lookahead.
//!
//! This crate provides:
//! - Canonical search keys and the rate-aware pager
//! - An in-memory result cache with in-flight deduplication
//! - Idle and hover prefetch triggers over a pluggable scheduler
//! - The search coordinator consumed by front-ends
//! - Configuration and unified error types

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod key;
pub mod model;
pub mod pager;
pub mod prefetch;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use cache::{CacheStore, StoreOptions};
pub use config::{AppConfig, ConfigError};
pub use coordinator::{HoverHandlers, RequestState, SearchCoordinator};
pub use debounce::{DebouncedValue, Debouncer};
pub use error::{ErrorKind, RateLimitInfo, SearchError};
pub use key::{SearchKey, SearchParams, SearchType, SortOrder, make_key};
pub use model::{ItemUser, SearchItem, SearchResult};
pub use prefetch::{PrefetchContext, PrefetchOptions, PrefetchOutcome, PrefetchScheduler};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use service::SearchService;
