//! TLS client configuration for `https` targets.
//!
//! Trust comes from the bundled webpki roots, plus any PEM bundle named in
//! `TransportConfig::ca_file`.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tokio_rustls::TlsConnector;

/// Failure while building the TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read CA bundle {path}: {source}")]
    CaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CA bundle {0} contains no certificates")]
    EmptyCaFile(PathBuf),

    #[error("invalid CA certificate: {0}")]
    BadCertificate(#[source] rustls::Error),

    #[error("TLS configuration rejected: {0}")]
    Config(#[source] rustls::Error),
}

/// Build a connector trusting webpki roots plus the optional extra bundle.
pub fn connector(ca_file: Option<&Path>) -> Result<TlsConnector, TlsSetupError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        let added = add_pem_bundle(&mut roots, path)?;
        tracing::debug!(path = %path.display(), certificates = added, "Loaded extra CA bundle");
    }

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(TlsSetupError::Config)?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

fn add_pem_bundle(roots: &mut RootCertStore, path: &Path) -> Result<usize, TlsSetupError> {
    let file = File::open(path).map_err(|source| TlsSetupError::CaFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut added = 0;
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let cert = cert.map_err(|source| TlsSetupError::CaFile {
            path: path.to_path_buf(),
            source,
        })?;
        roots.add(cert).map_err(TlsSetupError::BadCertificate)?;
        added += 1;
    }

    if added == 0 {
        return Err(TlsSetupError::EmptyCaFile(path.to_path_buf()));
    }
    Ok(added)
}
