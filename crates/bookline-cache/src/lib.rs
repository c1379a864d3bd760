//! Bookline Cache - dual-tier failure cache for title acquisition
//!
//! Tracks per-title outcomes so no instance wastes network calls, OCR
//! passes, or AI suggestions on titles already known to be undownloadable
//! or unusable. The local tier is authoritative for this instance; the
//! remote tier is a shared, eventually-consistent S3-compatible bucket.

pub mod coordinator;
pub mod entry;
pub mod key;
pub mod local;
pub mod remote;
pub mod sigv4;
pub mod sync;

// Re-exports for convenience
pub use coordinator::{CacheCoordinator, CacheStats, Lookup};
pub use entry::{CacheEntry, Outcome};
pub use key::TitleKey;
pub use local::LocalStore;
pub use remote::{RemoteConfig, RemoteError, RemoteTier, S3RemoteStore};
pub use sync::RemoteSyncHandle;
