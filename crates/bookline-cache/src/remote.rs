//! Remote cache tier: S3-compatible object storage
//!
//! Shared across instances, eventually consistent, last writer wins per
//! key. Every operation is time-bounded and every error is survivable:
//! callers treat failures as "tier unavailable", never as run failures.

use std::time::Duration;

use bookline_core::{HttpError, SHARED_RUNTIME, http_client};
use chrono::Utc;

use crate::sigv4::{self, Credentials};

/// Per-operation timeout; a slow object store must never stall a lookup
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the shared bucket.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Endpoint URL, e.g. "https://s3.wasabisys.com"
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug)]
pub enum RemoteError {
    Http(HttpError),
    /// Endpoint URL could not be parsed into scheme + host
    Endpoint(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Endpoint(msg) => write!(f, "invalid endpoint: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Uniform contract over the shared tier. The production implementation is
/// [`S3RemoteStore`]; tests inject an in-memory tier.
pub trait RemoteTier: Send + Sync {
    /// Fetch an object. `Ok(None)` means the key does not exist.
    fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>, RemoteError>;
    /// Idempotent overwrite, last writer wins.
    fn put(&self, object_key: &str, body: &[u8]) -> Result<(), RemoteError>;
    /// Delete; missing keys are not an error.
    fn delete(&self, object_key: &str) -> Result<(), RemoteError>;
}

/// SigV4-signed, path-style client for any S3-compatible store.
pub struct S3RemoteStore {
    origin: String,
    host: String,
    region: String,
    bucket: String,
    creds: Credentials,
}

impl S3RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let trimmed = config.endpoint.trim_end_matches('/');
        let (scheme, host) = trimmed
            .strip_prefix("https://")
            .map(|h| ("https", h))
            .or_else(|| trimmed.strip_prefix("http://").map(|h| ("http", h)))
            .ok_or_else(|| RemoteError::Endpoint(config.endpoint.clone()))?;
        if host.is_empty() || host.contains('/') {
            return Err(RemoteError::Endpoint(config.endpoint.clone()));
        }
        Ok(Self {
            origin: format!("{scheme}://{host}"),
            host: host.to_string(),
            region: config.region,
            bucket: config.bucket,
            creds: Credentials {
                access_key: config.access_key,
                secret_key: config.secret_key,
            },
        })
    }

    /// Startup connectivity check (HEAD on the bucket). A failure here
    /// downgrades the run to local-only caching.
    pub fn probe(&self) -> Result<(), RemoteError> {
        let (status, _) = self.send(reqwest::Method::HEAD, "", Vec::new())?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(RemoteError::Http(HttpError::Status {
                status,
                message: format!("bucket {} not reachable", self.bucket),
            }))
        }
    }

    fn send(
        &self,
        method: reqwest::Method,
        object_key: &str,
        payload: Vec<u8>,
    ) -> Result<(u16, Vec<u8>), RemoteError> {
        let path = if object_key.is_empty() {
            format!("/{}", self.bucket)
        } else {
            format!("/{}/{}", self.bucket, object_key)
        };
        let signed = sigv4::sign(
            method.as_str(),
            &self.host,
            &path,
            &self.region,
            &self.creds,
            &payload,
            Utc::now(),
        );
        let url = format!("{}{}", self.origin, path);

        SHARED_RUNTIME.handle().block_on(async {
            let fut = async {
                let resp = http_client()
                    .request(method, &url)
                    .header("x-amz-date", &signed.amz_date)
                    .header("x-amz-content-sha256", &signed.content_sha256)
                    .header("authorization", &signed.authorization)
                    .body(payload)
                    .send()
                    .await
                    .map_err(|e| HttpError::from_reqwest(&e))?;
                let status = resp.status().as_u16();
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| HttpError::from_reqwest(&e))?;
                Ok::<_, HttpError>((status, body.to_vec()))
            };
            match tokio::time::timeout(REMOTE_TIMEOUT, fut).await {
                Ok(result) => result.map_err(RemoteError::Http),
                Err(_) => Err(RemoteError::Http(HttpError::Timeout)),
            }
        })
    }
}

impl RemoteTier for S3RemoteStore {
    fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let (status, body) = self.send(reqwest::Method::GET, object_key, Vec::new())?;
        match status {
            200 => Ok(Some(body)),
            404 => Ok(None),
            _ => Err(RemoteError::Http(HttpError::Status {
                status,
                message: String::from_utf8_lossy(&body).chars().take(200).collect(),
            })),
        }
    }

    fn put(&self, object_key: &str, body: &[u8]) -> Result<(), RemoteError> {
        let (status, resp) = self.send(reqwest::Method::PUT, object_key, body.to_vec())?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(RemoteError::Http(HttpError::Status {
                status,
                message: String::from_utf8_lossy(&resp).chars().take(200).collect(),
            }))
        }
    }

    fn delete(&self, object_key: &str) -> Result<(), RemoteError> {
        let (status, resp) = self.send(reqwest::Method::DELETE, object_key, Vec::new())?;
        // 404 = already gone, which is the state we wanted
        if (200..300).contains(&status) || status == 404 {
            Ok(())
        } else {
            Err(RemoteError::Http(HttpError::Status {
                status,
                message: String::from_utf8_lossy(&resp).chars().take(200).collect(),
            }))
        }
    }
}
