//! S3-compatible artifact uploads: path-style PUTs with SigV4 signing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::blocking::Client as HttpClient;
use tracing::debug;
use url::Url;

use crate::config::StoreConfig;
use crate::error::{Result, TrackError};
use crate::sigv4::{self, SigningParams};

/// A parsed `s3://bucket/prefix` artifact root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub prefix: String,
}

impl ArtifactLocation {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| TrackError::Config(format!("invalid artifact URI '{uri}': {e}")))?;
        if url.scheme() != "s3" {
            return Err(TrackError::Config(format!(
                "artifact URI '{uri}' must use the s3:// scheme"
            )));
        }
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TrackError::Config(format!("artifact URI '{uri}' has no bucket")))?
            .to_string();
        let prefix = url.path().trim_matches('/').to_string();
        Ok(Self { bucket, prefix })
    }

    /// Object key for a path relative to this location.
    pub fn key_for(&self, rel: &str) -> String {
        if self.prefix.is_empty() {
            rel.to_string()
        } else {
            format!("{}/{}", self.prefix, rel)
        }
    }
}

/// Blocking client for an S3-compatible object store.
#[derive(Debug)]
pub struct ArtifactStore {
    http: HttpClient,
    config: StoreConfig,
    endpoint: String,
}

impl ArtifactStore {
    pub fn new(config: StoreConfig, timeout: std::time::Duration) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let parsed = Url::parse(&endpoint)
            .map_err(|e| TrackError::Config(format!("invalid store endpoint '{endpoint}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TrackError::Config(format!(
                "store endpoint '{endpoint}' must be http or https"
            )));
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    /// Upload one object. The key is stored verbatim; the request path is
    /// percent-encoded for transport and signing.
    pub fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            TrackError::Config(format!(
                "object store credentials are not configured; set {} and {}",
                crate::config::ENV_ACCESS_KEY,
                crate::config::ENV_SECRET_KEY
            ))
        })?;

        let raw = format!(
            "{}/{}/{}",
            self.endpoint,
            sigv4::uri_encode(bucket, false),
            sigv4::uri_encode(key, true)
        );
        let url = Url::parse(&raw)
            .map_err(|e| TrackError::Config(format!("invalid object URL '{raw}': {e}")))?;

        let payload_hash = sigv4::sha256_hex(&body);
        let signing = SigningParams {
            access_key: &credentials.access_key,
            secret_key: &credentials.secret_key,
            region: &self.config.region,
        };
        let signed = sigv4::sign_request("PUT", &url, &signing, &payload_hash, Utc::now());

        debug!(bucket, key, bytes = body.len(), "uploading artifact");

        let response = self
            .http
            .put(url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("authorization", &signed.authorization)
            .body(body)
            .send()
            .map_err(|e| TrackError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(TrackError::Upload {
                key: key.to_string(),
                reason: format!("store returned {status}: {}", message.trim()),
            });
        }
        Ok(())
    }

    /// Upload a single file under `location`, keyed by `rel`.
    pub fn upload_file(&self, location: &ArtifactLocation, rel: &str, path: &Path) -> Result<()> {
        let body = fs::read(path)?;
        self.put_object(&location.bucket, &location.key_for(rel), body)
    }

    /// Recursively upload a directory tree, preserving relative paths.
    /// Returns the stored object keys.
    pub fn upload_dir(&self, location: &ArtifactLocation, dir: &Path) -> Result<Vec<String>> {
        let files = collect_files(dir)?;
        let mut keys = Vec::with_capacity(files.len());
        for (path, rel) in files {
            self.upload_file(location, &rel, &path)?;
            keys.push(location.key_for(&rel));
        }
        Ok(keys)
    }
}

/// Walk a directory tree and return `(absolute path, relative key)` pairs
/// in a stable sorted order.
pub fn collect_files(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !dir.is_dir() {
        return Err(TrackError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        )));
    }
    let mut files = Vec::new();
    walk(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            out.push((path, rel));
        }
    }
    Ok(())
}
