//! TLS material for broker and search connections.
//!
//! The broker client takes PEM text directly; the search client takes a
//! rustls `ClientConfig`. Both are built from the same files and validated
//! here so a bad path fails at startup rather than on first connect.

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::{certs, private_key};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during TLS configuration
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read certificate file: {0}")]
    CertReadError(#[from] std::io::Error),

    #[error("No certificates found in file")]
    NoCertificates,

    #[error("No private key found in file")]
    NoPrivateKey,

    #[error("Client certificate and key must be configured together")]
    IncompleteClientIdentity,

    #[error("Failed to build TLS config: {0}")]
    ConfigError(String),

    #[error("TLS to the broker needs a build with the `broker-tls` feature")]
    BrokerTlsDisabled,
}

/// TLS client configuration
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    /// Whether TLS is enabled
    pub enabled: bool,
    /// Path to the CA bundle used to verify the server (PEM format)
    pub ca_path: String,
    /// Path to the client certificate (PEM format), empty for no client auth
    pub cert_path: String,
    /// Path to the client private key (PEM format), empty for no client auth
    pub key_path: String,
}

impl TlsConfig {
    pub fn has_client_identity(&self) -> bool {
        !self.cert_path.is_empty() && !self.key_path.is_empty()
    }
}

/// Validated PEM text, ready to hand to a client that parses PEM itself.
#[derive(Clone)]
pub struct TlsMaterial {
    pub ca_pem: String,
    pub cert_pem: Option<String>,
    pub key_pem: Option<String>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_pem_bytes", &self.ca_pem.len())
            .field("has_cert", &self.cert_pem.is_some())
            .field("has_key", &self.key_pem.is_some())
            .finish()
    }
}

impl TlsMaterial {
    pub fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        if config.cert_path.is_empty() != config.key_path.is_empty() {
            return Err(TlsError::IncompleteClientIdentity);
        }

        load_certs(Path::new(&config.ca_path))?;
        let ca_pem = fs::read_to_string(&config.ca_path)?;

        let (cert_pem, key_pem) = if config.has_client_identity() {
            load_certs(Path::new(&config.cert_path))?;
            load_private_key(Path::new(&config.key_path))?;
            (
                Some(fs::read_to_string(&config.cert_path)?),
                Some(fs::read_to_string(&config.key_path)?),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            ca_pem,
            cert_pem,
            key_pem,
        })
    }
}

/// Load certificates from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let certs_result: Result<Vec<_>, _> = certs(&mut reader).collect();
    let certs = certs_result.map_err(TlsError::CertReadError)?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }

    Ok(certs)
}

/// Load private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    private_key(&mut reader)
        .map_err(TlsError::CertReadError)?
        .ok_or(TlsError::NoPrivateKey)
}

/// Build a rustls ClientConfig trusting the configured CA, with a client
/// identity when both certificate and key are set.
pub fn build_client_config(config: &TlsConfig) -> Result<Arc<ClientConfig>, TlsError> {
    if config.cert_path.is_empty() != config.key_path.is_empty() {
        return Err(TlsError::IncompleteClientIdentity);
    }

    let mut roots = RootCertStore::empty();
    for cert in load_certs(Path::new(&config.ca_path))? {
        roots
            .add(cert)
            .map_err(|e| TlsError::ConfigError(format!("{e:?}")))?;
    }

    let builder = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::ConfigError(e.to_string()))?
        .with_root_certificates(roots);

    let client_config = if config.has_client_identity() {
        let certs = load_certs(Path::new(&config.cert_path))?;
        let key = load_private_key(Path::new(&config.key_path))?;
        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| TlsError::ConfigError(e.to_string()))?
    } else {
        builder.with_no_client_auth()
    };

    Ok(Arc::new(client_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_tls_config_default() {
        let config = TlsConfig::default();
        assert!(!config.enabled);
        assert!(!config.has_client_identity());
    }

    #[test]
    fn test_tls_config_client_identity() {
        let mut config = TlsConfig {
            enabled: true,
            ca_path: "/path/to/ca.pem".to_string(),
            cert_path: String::new(),
            key_path: String::new(),
        };
        assert!(!config.has_client_identity());

        config.cert_path = "/path/to/cert.pem".to_string();
        assert!(!config.has_client_identity());

        config.key_path = "/path/to/key.pem".to_string();
        assert!(config.has_client_identity());
    }

    #[test]
    fn test_missing_cert_file() {
        let result = load_certs(Path::new("/nonexistent/cert.pem"));
        assert!(matches!(result, Err(TlsError::CertReadError(_))));
    }

    #[test]
    fn test_missing_key_file() {
        let result = load_private_key(Path::new("/nonexistent/key.pem"));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_without_certificates() {
        let file = temp_file("not a certificate\n");
        let result = load_certs(file.path());
        assert!(matches!(result, Err(TlsError::NoCertificates)));
    }

    #[test]
    fn test_file_without_private_key() {
        let file = temp_file("");
        let result = load_private_key(file.path());
        assert!(matches!(result, Err(TlsError::NoPrivateKey)));
    }

    #[test]
    fn test_half_configured_identity_rejected() {
        let config = TlsConfig {
            enabled: true,
            ca_path: "/path/to/ca.pem".to_string(),
            cert_path: "/path/to/cert.pem".to_string(),
            key_path: String::new(),
        };
        assert!(matches!(
            TlsMaterial::load(&config),
            Err(TlsError::IncompleteClientIdentity)
        ));
        assert!(matches!(
            build_client_config(&config),
            Err(TlsError::IncompleteClientIdentity)
        ));
    }

    #[test]
    fn test_material_load_reports_missing_ca() {
        let config = TlsConfig {
            enabled: true,
            ca_path: "/nonexistent/ca.pem".to_string(),
            ..Default::default()
        };
        assert!(TlsMaterial::load(&config).is_err());
    }
}
