//! Bookline Core - Common infrastructure for the book acquisition pipeline
//!
//! This crate provides the shared HTTP layer, retry/backoff helpers,
//! shutdown signalling, work distribution, and logging/progress plumbing
//! used by the source adapters, the cache tiers, and the scheduler.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use http::{HttpConfig, HttpError, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{Retryable, backoff_duration, retry_with_backoff};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
pub use work_queue::WorkQueue;
