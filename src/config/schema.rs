//! Startup option definitions.
//!
//! `RawOptions` is what the command line, environment and options file
//! produce. `StartupOptions` is the validated, immutable record every
//! subsystem reads from.

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent reconciliation workers.
pub const DEFAULT_THREADINESS: usize = 10;

/// Largest accepted reconciliation worker count.
pub const MAX_THREADINESS: usize = 1024;

/// Default plain listener port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default TLS listener port.
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// Default drain grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-field lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
    /// Compact single-line output.
    Simple,
}

/// Unvalidated option set.
///
/// Every field is optional so the options file and the command line can be
/// layered before validation applies defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawOptions {
    /// Path to a kubeconfig file.
    pub kubeconfig: Option<PathBuf>,

    /// Enable debug logs.
    pub debug: bool,

    /// Enable trace logs.
    pub trace: bool,

    /// Log output format.
    pub log_format: Option<LogFormat>,

    /// Controller worker count. Non-positive values fall back to the default.
    pub threadiness: Option<i64>,

    /// Address both management listeners bind to.
    pub bind_address: Option<IpAddr>,

    /// Plain listener port.
    pub http_port: Option<u16>,

    /// TLS listener port.
    pub https_port: Option<u16>,

    /// Namespace holding management resources.
    pub namespace: Option<String>,

    /// S3 compatible storage endpoint.
    pub image_storage_endpoint: Option<String>,

    /// Storage access key.
    pub image_storage_access_key: Option<String>,

    /// Storage secret key.
    pub image_storage_secret_key: Option<String>,

    /// Disable authentication enforcement downstream.
    pub skip_authentication: bool,

    /// Comma separated authentication mode tokens.
    pub authentication_mode: Option<String>,

    /// Diagnostics listen address. Empty disables the endpoint.
    pub profile_listen_address: Option<String>,

    /// PEM certificate for the TLS listener.
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key for the TLS listener.
    pub tls_key_file: Option<PathBuf>,

    /// Seconds allowed for subsystems to drain on shutdown.
    pub shutdown_grace_secs: Option<u64>,
}

impl RawOptions {
    /// Layer `self` over `fallback`: values set here win, flags are OR-ed.
    pub fn or(self, fallback: RawOptions) -> RawOptions {
        RawOptions {
            kubeconfig: self.kubeconfig.or(fallback.kubeconfig),
            debug: self.debug || fallback.debug,
            trace: self.trace || fallback.trace,
            log_format: self.log_format.or(fallback.log_format),
            threadiness: self.threadiness.or(fallback.threadiness),
            bind_address: self.bind_address.or(fallback.bind_address),
            http_port: self.http_port.or(fallback.http_port),
            https_port: self.https_port.or(fallback.https_port),
            namespace: self.namespace.or(fallback.namespace),
            image_storage_endpoint: self.image_storage_endpoint.or(fallback.image_storage_endpoint),
            image_storage_access_key: self
                .image_storage_access_key
                .or(fallback.image_storage_access_key),
            image_storage_secret_key: self
                .image_storage_secret_key
                .or(fallback.image_storage_secret_key),
            skip_authentication: self.skip_authentication || fallback.skip_authentication,
            authentication_mode: self.authentication_mode.or(fallback.authentication_mode),
            profile_listen_address: self.profile_listen_address.or(fallback.profile_listen_address),
            tls_cert_file: self.tls_cert_file.or(fallback.tls_cert_file),
            tls_key_file: self.tls_key_file.or(fallback.tls_key_file),
            shutdown_grace_secs: self.shutdown_grace_secs.or(fallback.shutdown_grace_secs),
        }
    }
}

/// Validated startup options.
///
/// Built once by [`crate::config::validate`] and shared behind an `Arc`.
/// Nothing hands out a mutable reference after construction.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub kubeconfig: Option<PathBuf>,
    pub debug: bool,
    pub trace: bool,
    pub log_format: LogFormat,
    pub threadiness: NonZeroUsize,
    pub listener: ListenerOptions,
    pub namespace: String,
    pub storage: StorageOptions,
    pub skip_authentication: bool,
    /// Authentication mode tokens, trimmed, empties removed.
    pub authentication_modes: Vec<String>,
    /// `None` when the diagnostics endpoint is disabled.
    pub diagnostics_address: Option<String>,
    pub shutdown_grace: Duration,
}

/// Settings for the dual protocol listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOptions {
    pub bind_address: IpAddr,
    pub http_port: u16,
    pub https_port: u16,
    /// Certificate and key files. `None` selects a self-signed certificate.
    pub tls: Option<TlsFiles>,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            tls: None,
        }
    }
}

/// PEM file pair for the TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Object storage credentials, consumed downstream only.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageOptions {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOptions")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
