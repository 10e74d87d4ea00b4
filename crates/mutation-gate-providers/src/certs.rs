// crates/mutation-gate-providers/src/certs.rs
// ============================================================================
// Module: Client Certificate Sources
// Description: Static and file-backed client identities for provider calls.
// Purpose: Hand the resolver the TLS identity presented to providers.
// Dependencies: mutation-gate-core
// ============================================================================

//! ## Overview
//! [`StaticCertSource`] holds an identity in memory and supports rotation
//! through [`StaticCertSource::set`]. [`FileCertSource`] re-reads PEM files on
//! every call so externally rotated certificates take effect without restart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;

use mutation_gate_core::CertError;
use mutation_gate_core::ClientCert;
use mutation_gate_core::ClientCertSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a PEM file read by [`FileCertSource`].
pub const MAX_PEM_FILE_BYTES: u64 = 256 * 1024;

// ============================================================================
// SECTION: Static Source
// ============================================================================

/// In-memory client identity.
#[derive(Debug, Default)]
pub struct StaticCertSource {
    /// Current identity, if issued.
    cert: RwLock<Option<ClientCert>>,
}

impl StaticCertSource {
    /// Creates a source holding `cert`.
    #[must_use]
    pub const fn new(cert: ClientCert) -> Self {
        Self {
            cert: RwLock::new(Some(cert)),
        }
    }

    /// Creates a source with no identity yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replaces the identity.
    pub fn set(&self, cert: ClientCert) {
        if let Ok(mut current) = self.cert.write() {
            *current = Some(cert);
        }
    }

    /// Drops the identity; later calls fail until a new one is set.
    pub fn clear(&self) {
        if let Ok(mut current) = self.cert.write() {
            *current = None;
        }
    }
}

impl ClientCertSource for StaticCertSource {
    fn client_cert(&self) -> Result<ClientCert, CertError> {
        let current = self
            .cert
            .read()
            .map_err(|_| CertError::Unavailable("certificate lock poisoned".to_string()))?;
        current
            .clone()
            .ok_or_else(|| CertError::Unavailable("no client certificate issued".to_string()))
    }
}

// ============================================================================
// SECTION: File Source
// ============================================================================

/// Client identity read from PEM files on each call.
///
/// # Invariants
/// - Files larger than [`MAX_PEM_FILE_BYTES`] are rejected.
/// - The certificate file must contain a PEM certificate block and the key
///   file a PEM private key block.
#[derive(Debug, Clone)]
pub struct FileCertSource {
    /// Certificate chain path.
    cert_path: PathBuf,
    /// Private key path.
    key_path: PathBuf,
}

impl FileCertSource {
    /// Creates a source reading the given certificate and key files.
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

impl ClientCertSource for FileCertSource {
    fn client_cert(&self) -> Result<ClientCert, CertError> {
        let cert_pem = read_pem(&self.cert_path)?;
        if !cert_pem.contains("-----BEGIN CERTIFICATE-----") {
            return Err(CertError::Unavailable(format!(
                "{} holds no PEM certificate",
                self.cert_path.display()
            )));
        }
        let key_pem = read_pem(&self.key_path)?;
        if !key_pem.contains("PRIVATE KEY-----") {
            return Err(CertError::Unavailable(format!(
                "{} holds no PEM private key",
                self.key_path.display()
            )));
        }
        Ok(ClientCert {
            cert_pem,
            key_pem,
        })
    }
}

/// Reads a PEM file under the size limit.
fn read_pem(path: &Path) -> Result<String, CertError> {
    let unavailable =
        |reason: String| CertError::Unavailable(format!("{}: {reason}", path.display()));
    let file = File::open(path).map_err(|err| unavailable(err.to_string()))?;
    let mut contents = String::new();
    file.take(MAX_PEM_FILE_BYTES + 1)
        .read_to_string(&mut contents)
        .map_err(|err| unavailable(err.to_string()))?;
    if u64::try_from(contents.len()).unwrap_or(u64::MAX) > MAX_PEM_FILE_BYTES {
        return Err(unavailable("file exceeds size limit".to_string()));
    }
    Ok(contents)
}
