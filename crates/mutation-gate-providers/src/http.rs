// crates/mutation-gate-providers/src/http.rs
// ============================================================================
// Module: HTTP Provider Client
// Description: Posts provider requests over HTTPS with a client identity.
// Purpose: Implement the provider transport with strict limits.
// Dependencies: mutation-gate-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`HttpProviderClient`] sends one `ProviderRequest` per call as a JSON POST,
//! presents the client identity for mutual TLS, and trusts the provider's CA
//! bundle in addition to the built-in roots. Redirects are never followed.
//! Response validation beyond decoding (idempotency, system errors) belongs to
//! the resolver.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use mutation_gate_core::ClientCert;
use mutation_gate_core::ProviderCallError;
use mutation_gate_core::ProviderClient;
use mutation_gate_core::ProviderRequest;
use mutation_gate_core::ProviderResponse;
use mutation_gate_core::ProviderSpec;
use reqwest::Certificate;
use reqwest::Client;
use reqwest::Identity;
use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP provider client.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProviderClientConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpProviderClientConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            max_response_bytes: 1024 * 1024,
            user_agent: "mutation-gate/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Provider transport over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpProviderClient {
    /// Transport limits and policy.
    config: HttpProviderClientConfig,
}

impl HttpProviderClient {
    /// Creates a client with the given configuration.
    #[must_use]
    pub const fn new(config: HttpProviderClientConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpProviderClientConfig {
        &self.config
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn send_request(
        &self,
        provider: &ProviderSpec,
        keys: &[String],
        client_cert: &ClientCert,
    ) -> Result<ProviderResponse, ProviderCallError> {
        let url = validate_url(&provider.url, &self.config)?;
        let client = build_http_client(&self.config, provider, client_cert)?;
        let body = serde_json::to_vec(&ProviderRequest::new(keys.to_vec())).map_err(|err| {
            ProviderCallError::Transport(format!("request encoding failed: {err}"))
        })?;
        let mut response = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| request_error(&err, provider))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderCallError::HttpStatus(status.as_u16()));
        }
        let bytes = read_response_limited(&mut response, self.config.max_response_bytes).await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| ProviderCallError::InvalidResponse(err.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the provider URL and applies the scheme policy.
fn validate_url(raw: &str, config: &HttpProviderClientConfig) -> Result<Url, ProviderCallError> {
    let url = Url::parse(raw)
        .map_err(|err| ProviderCallError::Transport(format!("invalid provider url: {err}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if config.allow_http => Ok(url),
        "http" => Err(ProviderCallError::Transport("cleartext http is not allowed".to_string())),
        other => Err(ProviderCallError::Transport(format!("unsupported url scheme `{other}`"))),
    }
}

/// Builds a client carrying the identity and the provider's trust roots.
fn build_http_client(
    config: &HttpProviderClientConfig,
    provider: &ProviderSpec,
    client_cert: &ClientCert,
) -> Result<Client, ProviderCallError> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .identity(client_identity(client_cert)?);
    if provider.timeout_seconds > 0 {
        builder = builder.timeout(provider.timeout());
    }
    if let Some(bundle) = &provider.ca_bundle {
        let roots = Certificate::from_pem_bundle(bundle.as_bytes())
            .map_err(|_| ProviderCallError::Transport("invalid provider CA bundle".to_string()))?;
        for root in roots {
            builder = builder.add_root_certificate(root);
        }
    }
    builder
        .build()
        .map_err(|err| ProviderCallError::Transport(format!("http client build failed: {err}")))
}

/// Combines certificate chain and key into one PEM identity.
fn client_identity(client_cert: &ClientCert) -> Result<Identity, ProviderCallError> {
    let mut pem = client_cert.cert_pem.clone();
    if !pem.ends_with('\n') {
        pem.push('\n');
    }
    pem.push_str(&client_cert.key_pem);
    Identity::from_pem(pem.as_bytes())
        .map_err(|_| ProviderCallError::Transport("invalid client identity".to_string()))
}

/// Maps a send failure onto the call error taxonomy.
fn request_error(err: &reqwest::Error, provider: &ProviderSpec) -> ProviderCallError {
    if err.is_timeout() {
        return ProviderCallError::Timeout(provider.timeout().as_millis());
    }
    ProviderCallError::Transport(format!("provider request failed: {err}"))
}

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ProviderCallError> {
    let too_large =
        || ProviderCallError::InvalidResponse("provider response exceeds size limit".to_string());
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| {
        ProviderCallError::InvalidResponse("response size limit exceeds u64".to_string())
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(too_large());
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| ProviderCallError::Transport(format!("failed to read response: {err}")))?
    {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
