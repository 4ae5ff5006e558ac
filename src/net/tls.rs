//! TLS configuration and certificate loading.

use std::fs;
use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsFiles;

/// Build the TLS listener configuration.
///
/// Uses the PEM files when given, otherwise a freshly generated self-signed
/// certificate valid for `localhost` and the in-cluster service names.
pub async fn load_tls_config(files: Option<&TlsFiles>, namespace: &str) -> io::Result<RustlsConfig> {
    install_crypto_provider();
    match files {
        Some(files) => load_pem_files(&files.cert_path, &files.key_path).await,
        None => self_signed(namespace).await,
    }
}

/// Load and sanity check a PEM certificate chain and private key.
pub async fn load_pem_files(cert_path: &Path, key_path: &Path) -> io::Result<RustlsConfig> {
    if !cert_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    let cert = fs::read(cert_path)?;
    let key = fs::read(key_path)?;

    let certs = rustls_pemfile::certs(&mut cert.as_slice()).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No certificates in {:?}", cert_path),
        ));
    }
    if rustls_pemfile::private_key(&mut key.as_slice())?.is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No private key in {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem(cert, key).await
}

/// Generate an in-memory self-signed certificate.
pub async fn self_signed(namespace: &str) -> io::Result<RustlsConfig> {
    let (cert, key) = self_signed_pem(namespace)?;
    tracing::info!(namespace, "Using generated self-signed certificate for HTTPS");
    RustlsConfig::from_pem(cert.into_bytes(), key.into_bytes()).await
}

fn self_signed_pem(namespace: &str) -> io::Result<(String, String)> {
    let names = vec![
        "localhost".to_string(),
        "harvester".to_string(),
        format!("harvester.{}.svc", namespace),
    ];
    let certified = rcgen::generate_simple_self_signed(names).map_err(io::Error::other)?;
    Ok((certified.cert.pem(), certified.key_pair.serialize_pem()))
}

/// rustls needs a process-wide provider when more than one is compiled in.
fn install_crypto_provider() {
    // Err only means another component installed one first.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
