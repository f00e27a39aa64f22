//! AWS Signature Version 4 request signing.
//!
//! Signs JSON REST calls to the Bedrock endpoints with HMAC-SHA256 (`hmac`
//! + `sha2`).
//!
//! # Credentials
//!
//! Credentials come from the AWS default provider chain (`aws-config`),
//! resolved on every call:
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! 2. shared `~/.aws/credentials` and `~/.aws/config` (`AWS_PROFILE`, SSO)
//! 3. web identity tokens
//! 4. ECS container and EC2 instance roles
//!
//! # Canonical request
//!
//! ```text
//! METHOD \n canonical-uri \n canonical-query \n canonical-headers \n signed-headers \n sha256(payload)
//! ```
//!
//! Non-S3 services expect every path segment to be URI-encoded twice in
//! the canonical URI; [`canonical_uri`] takes the already-encoded request
//! path and encodes it once more.

use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::Region;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{HrKbError, HrKbResult};

type HmacSha256 = Hmac<Sha256>;

/// One resolved set of AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&Credentials> for AwsCredentials {
    fn from(creds: &Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(str::to_string),
        }
    }
}

impl AwsCredentials {
    /// Ask `provider` for credentials.
    ///
    /// A provider with nothing to offer is reported as [`HrKbError::Config`].
    pub async fn resolve(provider: &SharedCredentialsProvider) -> HrKbResult<Self> {
        let creds = provider.provide_credentials().await.map_err(|e| {
            HrKbError::Config(format!(
                "no AWS credentials found (environment, shared profile, or instance role): {}",
                e
            ))
        })?;
        Ok(Self::from(&creds))
    }
}

/// Build the AWS default credential chain for `region`.
///
/// `profile` selects a named profile from the shared files; without it the
/// chain honours `AWS_PROFILE` and falls back to `default`. Building the
/// chain does not touch the network.
pub async fn default_credentials(region: &str, profile: Option<&str>) -> SharedCredentialsProvider {
    let mut builder = DefaultCredentialsChain::builder().region(Region::new(region.to_string()));
    if let Some(name) = profile {
        builder = builder.profile_name(name);
    }
    SharedCredentialsProvider::new(builder.build().await)
}

/// Everything needed to sign one request.
pub struct SigningParams<'a> {
    pub method: &'a str,
    /// Host header value, without scheme.
    pub host: &'a str,
    /// Request path, already URI-encoded once.
    pub path: &'a str,
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
    pub now: DateTime<Utc>,
}

/// Compute the headers to attach to a signed request.
///
/// Returns `Authorization`, `x-amz-date`, `x-amz-content-sha256`, and
/// `x-amz-security-token` (when a session token is present). The caller
/// must also send `content-type: application/json`, which is signed.
pub fn sign(creds: &AwsCredentials, params: &SigningParams<'_>) -> Vec<(String, String)> {
    let date_stamp = params.now.format("%Y%m%d").to_string();
    let amz_date = params.now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(params.payload);

    let mut headers = vec![
        ("content-type".to_string(), "application/json".to_string()),
        ("host".to_string(), params.host.to_string()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
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
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        params.method,
        canonical_uri(params.path),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, params.region, params.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &creds.secret_access_key,
        &date_stamp,
        params.region,
        params.service,
    );
    let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    );

    let mut out = vec![
        ("authorization".to_string(), authorization),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
    ];
    if let Some(ref token) = creds.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out
}

/// Encode each segment of an already-encoded path a second time.
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// Compute the hex-encoded SHA-256 hash of data.
pub fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986.
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
pub fn uri_encode(s: &str) -> String {
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
