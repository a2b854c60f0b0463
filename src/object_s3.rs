//! Amazon S3 object store.
//!
//! Stores blobs in an S3 bucket using the S3 REST API (`PutObject`,
//! `GetObject`, `DeleteObject`) with AWS Signature V4 authentication.
//! Signing uses only pure-Rust dependencies (`hmac`, `sha2`).
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "s3"
//!
//! [storage.s3]
//! bucket = "sentiment-results"
//! prefix = "senti/"
//! region = "us-east-1"
//! # endpoint_url = "http://localhost:9000"   # MinIO
//! ```
//!
//! Object names are stored under `prefix + name`. With a custom
//! `endpoint_url` requests use path-style addressing
//! (`<endpoint>/<bucket>/<key>`); otherwise virtual-hosted style
//! (`https://<bucket>.s3.<region>.amazonaws.com/<key>`).
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials / IAM roles)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use sentiment_harness_core::store::{ObjectNotFound, ObjectStore, StoredObject};

use crate::config::S3StorageConfig;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

pub struct S3ObjectStore {
    config: S3StorageConfig,
    creds: AwsCredentials,
    client: reqwest::Client,
}

/// Where a request goes and what gets signed.
struct Target {
    url: String,
    host: String,
    canonical_uri: String,
}

impl S3ObjectStore {
    pub fn new(config: S3StorageConfig, creds: AwsCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build S3 HTTP client")?;
        Ok(Self {
            config,
            creds,
            client,
        })
    }

    pub fn from_env(config: S3StorageConfig) -> Result<Self> {
        Self::new(config, AwsCredentials::from_env()?)
    }

    fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.config.prefix, name)
    }

    fn target(&self, key: &str) -> Target {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        match self.config.endpoint_url {
            Some(ref endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .to_string();
                let canonical_uri = format!("/{}/{}", uri_encode(&self.config.bucket), encoded_key);
                Target {
                    url: format!("{}{}", endpoint, canonical_uri),
                    host,
                    canonical_uri,
                }
            }
            None => {
                let host = format!(
                    "{}.s3.{}.amazonaws.com",
                    self.config.bucket, self.config.region
                );
                let canonical_uri = format!("/{}", encoded_key);
                Target {
                    url: format!("https://{}{}", host, canonical_uri),
                    host,
                    canonical_uri,
                }
            }
        }
    }

    async fn send(&self, method: Method, key: &str, body: Vec<u8>) -> Result<reqwest::Response> {
        let target = self.target(key);
        let payload_hash = hex_sha256(&body);
        let (authorization, amz_date) = sign(
            method.as_str(),
            &target,
            &payload_hash,
            &self.config.region,
            &self.creds,
            Utc::now(),
        );

        let mut req = self
            .client
            .request(method.clone(), &target.url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);
        if let Some(ref token) = self.creds.session_token {
            req = req.header("x-amz-security-token", token);
        }
        if method == Method::PUT {
            req = req.body(body);
        }

        req.send()
            .await
            .with_context(|| format!("S3 {} s3://{}/{} failed", method, self.config.bucket, key))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<StoredObject> {
        let key = self.key_for(name);
        let size = bytes.len();
        let resp = self.send(Method::PUT, &key, bytes).await?;
        if !resp.status().is_success() {
            bail!("S3 PutObject failed (HTTP {}) for key '{}'", resp.status(), key);
        }
        debug!(bucket = %self.config.bucket, key = %key, size, "object uploaded");

        Ok(StoredObject {
            name: name.to_string(),
            url: self.target(&key).url,
        })
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let key = self.key_for(name);
        let resp = self.send(Method::GET, &key, Vec::new()).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectNotFound(name.to_string()).into());
        }
        if !status.is_success() {
            bail!("S3 GetObject failed (HTTP {}) for key '{}'", status, key);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = self.key_for(name);
        let resp = self.send(Method::DELETE, &key, Vec::new()).await?;
        let status = resp.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            bail!("S3 DeleteObject failed (HTTP {}) for key '{}'", status, key);
        }
        Ok(())
    }
}

// ============ AWS SigV4 Helpers ============

/// Build the SigV4 `Authorization` header value and the matching
/// `x-amz-date` for one request.
fn sign(
    method: &str,
    target: &Target,
    payload_hash: &str,
    region: &str,
    creds: &AwsCredentials,
    now: DateTime<Utc>,
) -> (String, String) {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = vec![
        ("host".to_string(), target.host.clone()),
        ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, target.canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3");
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    );
    (authorization, amz_date)
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a path segment per RFC 3986, leaving `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
