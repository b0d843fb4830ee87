//! Storage contracts and backends.
//!
//! The ledger and the deployment manager talk to storage only through the
//! [`ConfigStore`] and [`VersionStore`] traits, so backends are swappable.

mod local;
mod lock;
mod memory;
mod traits;
mod types;

pub use local::{LocalStore, STORE_DIR};
pub use lock::{ConfigGuard, ConfigLocks};
pub use memory::MemoryStore;
pub use traits::{ConfigStore, VersionStore};
pub use types::{Config, DEFAULT_BRANCH, DEFAULT_PAGE_LIMIT, Page, Version, VersionMeta};
