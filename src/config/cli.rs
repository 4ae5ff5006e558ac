//! Command line surface.
//!
//! Flag and environment variable names match the ones operators already use
//! in deployment manifests.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::load_options_file;
use crate::config::schema::{LogFormat, RawOptions};
use crate::config::ConfigError;

/// Crate version reported by `--version` and the API.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit baked in at build time.
pub const GIT_COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => "HEAD",
};

/// Harvester management server.
#[derive(Parser, Debug, Default)]
#[command(name = "harvester", version, about, long_about = None)]
pub struct Cli {
    /// TOML file with default option values. Flags and environment win.
    #[arg(long, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Kube config for accessing the cluster
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Enable debug logs
    #[arg(long, env = "HARVESTER_DEBUG")]
    pub debug: bool,

    /// Enable trace logs
    #[arg(long, env = "HARVESTER_TRACE")]
    pub trace: bool,

    /// Log output format
    #[arg(long, value_enum, env = "HARVESTER_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Controller worker count [default: 10]
    #[arg(long, env = "THREADINESS", allow_negative_numbers = true)]
    pub threadiness: Option<i64>,

    /// Address the management listeners bind to [default: 0.0.0.0]
    #[arg(long, env = "HARVESTER_SERVER_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// HTTP listen port [default: 8080]
    #[arg(long, env = "HARVESTER_SERVER_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// HTTPS listen port [default: 8443]
    #[arg(long, env = "HARVESTER_SERVER_HTTPS_PORT")]
    pub https_port: Option<u16>,

    /// The default namespace to store management resources
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,

    /// S3 compatible storage endpoint (format: http://example.com:9000)
    #[arg(long, env = "IMAGE_STORAGE_ENDPOINT")]
    pub image_storage_endpoint: Option<String>,

    /// Image storage access key
    #[arg(long, env = "IMAGE_STORAGE_ACCESS_KEY", hide_env_values = true)]
    pub image_storage_access_key: Option<String>,

    /// Image storage secret key
    #[arg(long, env = "IMAGE_STORAGE_SECRET_KEY", hide_env_values = true)]
    pub image_storage_secret_key: Option<String>,

    /// Skip authentication enforcement
    #[arg(long, env = "SKIP_AUTHENTICATION")]
    pub skip_authentication: bool,

    /// Authentication modes, comma separated (kubernetesCredentials, localUser)
    #[arg(long, env = "HARVESTER_AUTHENTICATION_MODE")]
    pub authentication_mode: Option<String>,

    /// Address to listen on for diagnostics. Empty disables it.
    #[arg(long, env = "HARVESTER_PROFILE_LISTEN_ADDRESS")]
    pub profile_listen_address: Option<String>,

    /// PEM certificate for the HTTPS listener
    #[arg(long, env = "HARVESTER_TLS_CERT_FILE")]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key for the HTTPS listener
    #[arg(long, env = "HARVESTER_TLS_KEY_FILE")]
    pub tls_key_file: Option<PathBuf>,

    /// Seconds subsystems get to drain on shutdown [default: 30]
    #[arg(long, env = "HARVESTER_SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: Option<u64>,
}

impl Cli {
    /// Merge the command line over the options file, if one was given.
    pub fn into_raw_options(self) -> Result<RawOptions, ConfigError> {
        let file = match &self.config {
            Some(path) => load_options_file(path)?,
            None => RawOptions::default(),
        };

        let cli = RawOptions {
            kubeconfig: self.kubeconfig,
            debug: self.debug,
            trace: self.trace,
            log_format: self.log_format,
            threadiness: self.threadiness,
            bind_address: self.bind_address,
            http_port: self.http_port,
            https_port: self.https_port,
            namespace: self.namespace,
            image_storage_endpoint: self.image_storage_endpoint,
            image_storage_access_key: self.image_storage_access_key,
            image_storage_secret_key: self.image_storage_secret_key,
            skip_authentication: self.skip_authentication,
            authentication_mode: self.authentication_mode,
            profile_listen_address: self.profile_listen_address,
            tls_cert_file: self.tls_cert_file,
            tls_key_file: self.tls_key_file,
            shutdown_grace_secs: self.shutdown_grace_secs,
        };

        Ok(cli.or(file))
    }
}
