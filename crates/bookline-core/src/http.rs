//! HTTP access shared by source adapters and the remote cache tier.
//!
//! Uses async reqwest internally on a shared runtime, but presents a sync
//! interface so worker threads can call it directly.

use std::sync::{LazyLock, RwLock};
use std::time::Duration;

/// Connect timeout for all outbound requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunable HTTP settings, applied once at startup from config/CLI.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Whole-request timeout for a single fetch attempt
    pub request_timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

static HTTP_CONFIG: LazyLock<RwLock<HttpConfig>> =
    LazyLock::new(|| RwLock::new(HttpConfig::default()));

/// Override the global HTTP settings (call before spawning workers).
pub fn set_http_config(config: HttpConfig) {
    *HTTP_CONFIG.write().expect("http config lock poisoned") = config;
}

/// Current global HTTP settings.
pub fn http_config() -> HttpConfig {
    *HTTP_CONFIG.read().expect("http config lock poisoned")
}

/// Error from a single HTTP operation.
#[derive(Debug)]
pub enum HttpError {
    /// Response arrived with a non-success status
    Status { status: u16, message: String },
    /// No response within the request timeout
    Timeout,
    /// Connection-level failure (DNS, refused, reset, TLS)
    Transport(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Build from a reqwest error without leaking the full URL into logs.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        match e.status() {
            Some(s) => Self::Status {
                status: s.as_u16(),
                message: e.to_string(),
            },
            None => Self::Transport(e.to_string()),
        }
    }

    /// Transient failures worth retrying: rate limits, server errors,
    /// timeouts, and connection-level faults. Client errors (404 and
    /// friends) are permanent for the URL in question.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Timeout | Self::Transport(_) => true,
        }
    }

    /// The resource definitively does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Short stable label used as a cache failure reason ("http-404").
    pub fn reason_label(&self) -> String {
        match self {
            Self::Status { status, .. } => format!("http-{status}"),
            Self::Timeout => "http-timeout".to_string(),
            Self::Transport(_) => "http-transport".to_string(),
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .user_agent(concat!("bookline/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking GET returning the whole body, bounded by the request timeout.
pub fn get_bytes(url: &str) -> Result<Vec<u8>, HttpError> {
    let timeout = http_config().request_timeout;
    SHARED_RUNTIME.handle().block_on(async {
        let fut = async {
            let resp = SHARED_CLIENT
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| HttpError::from_reqwest(&e))?;
            let body = resp.bytes().await.map_err(|e| HttpError::from_reqwest(&e))?;
            Ok::<_, HttpError>(body.to_vec())
        };
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        }
    })
}

/// Blocking GET returning UTF-8 text, bounded by the request timeout.
pub fn get_text(url: &str) -> Result<String, HttpError> {
    let body = get_bytes(url)?;
    String::from_utf8(body).map_err(|e| HttpError::Transport(format!("invalid UTF-8 body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_err(status: u16) -> HttpError {
        HttpError::Status {
            status,
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_404_not_retryable() {
        assert!(!status_err(404).is_retryable());
        assert!(status_err(404).is_not_found());
    }

    #[test]
    fn http_403_not_retryable() {
        assert!(!status_err(403).is_retryable());
    }

    #[test]
    fn http_429_retryable() {
        assert!(status_err(429).is_retryable());
    }

    #[test]
    fn http_500_retryable() {
        assert!(status_err(500).is_retryable());
    }

    #[test]
    fn timeout_retryable() {
        assert!(HttpError::Timeout.is_retryable());
    }

    #[test]
    fn transport_retryable() {
        assert!(HttpError::Transport("connection refused".to_string()).is_retryable());
    }

    #[test]
    fn reason_labels() {
        assert_eq!(status_err(404).reason_label(), "http-404");
        assert_eq!(HttpError::Timeout.reason_label(), "http-timeout");
        assert_eq!(
            HttpError::Transport("x".to_string()).reason_label(),
            "http-transport"
        );
    }

    #[test]
    fn display_with_status() {
        assert_eq!(format!("{}", status_err(404)), "HTTP 404: test");
    }

    #[test]
    fn default_config_sane() {
        let cfg = HttpConfig::default();
        assert!(cfg.request_timeout >= Duration::from_secs(1));
        assert!(cfg.max_retries >= 1);
    }
}
