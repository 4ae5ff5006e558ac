//! Startup option validation.
//!
//! # Responsibilities
//! - Reject missing required values (namespace, storage endpoint and keys)
//! - Check value shapes (storage URL, distinct ports, TLS file pairs)
//! - Apply defaults for everything optional
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: RawOptions → Result<StartupOptions, ConfigError>
//! - Runs before any subsystem exists

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::config::schema::{
    ListenerOptions, RawOptions, StartupOptions, StorageOptions, TlsFiles, DEFAULT_HTTPS_PORT,
    DEFAULT_HTTP_PORT, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_THREADINESS, MAX_THREADINESS,
};
use crate::config::ConfigError;

/// A single problem found in the option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required option is unset or empty.
    MissingRequiredField { field: &'static str },
    /// An option is set but unusable.
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { field } => field,
            ValidationError::InvalidField { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingRequiredField { field } => {
                write!(f, "required option \"{}\" is not set", field)
            }
            ValidationError::InvalidField { field, reason } => {
                write!(f, "option \"{}\" is invalid: {}", field, reason)
            }
        }
    }
}

/// Validate raw options and apply defaults.
pub fn validate(raw: RawOptions) -> Result<StartupOptions, ConfigError> {
    let mut errors = Vec::new();

    let namespace = required(&mut errors, "namespace", raw.namespace);
    let endpoint = required(&mut errors, "image-storage-endpoint", raw.image_storage_endpoint);
    let access_key = required(&mut errors, "image-storage-access-key", raw.image_storage_access_key);
    let secret_key = required(&mut errors, "image-storage-secret-key", raw.image_storage_secret_key);

    if let Some(endpoint) = &endpoint {
        if let Err(e) = Url::parse(endpoint) {
            errors.push(ValidationError::InvalidField {
                field: "image-storage-endpoint",
                reason: format!("{} (expected a URL such as http://example.com:9000)", e),
            });
        }
    }

    if let Some(requested) = raw.threadiness.filter(|n| *n > MAX_THREADINESS as i64) {
        errors.push(ValidationError::InvalidField {
            field: "threadiness",
            reason: format!("{} exceeds the maximum of {}", requested, MAX_THREADINESS),
        });
    }

    let http_port = raw.http_port.unwrap_or(DEFAULT_HTTP_PORT);
    let https_port = raw.https_port.unwrap_or(DEFAULT_HTTPS_PORT);
    // Port 0 asks the OS for an ephemeral port, so two zeroes never collide.
    if http_port == https_port && http_port != 0 {
        errors.push(ValidationError::InvalidField {
            field: "https-port",
            reason: format!("must differ from http-port ({})", http_port),
        });
    }

    let tls = match (raw.tls_cert_file, raw.tls_key_file) {
        (Some(cert_path), Some(key_path)) => Some(TlsFiles { cert_path, key_path }),
        (None, None) => None,
        (Some(_), None) => {
            errors.push(ValidationError::InvalidField {
                field: "tls-key-file",
                reason: "must be set together with tls-cert-file".into(),
            });
            None
        }
        (None, Some(_)) => {
            errors.push(ValidationError::InvalidField {
                field: "tls-cert-file",
                reason: "must be set together with tls-key-file".into(),
            });
            None
        }
    };

    let shutdown_grace_secs = raw.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS);
    if shutdown_grace_secs == 0 {
        errors.push(ValidationError::InvalidField {
            field: "shutdown-grace-secs",
            reason: "must be at least 1".into(),
        });
    }

    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    // Every required value was pushed as an error above when missing.
    let (Some(namespace), Some(endpoint), Some(access_key), Some(secret_key)) =
        (namespace, endpoint, access_key, secret_key)
    else {
        return Err(ConfigError::Validation(Vec::new()));
    };

    Ok(StartupOptions {
        kubeconfig: raw.kubeconfig,
        debug: raw.debug,
        trace: raw.trace,
        log_format: raw.log_format.unwrap_or_default(),
        threadiness: threadiness(raw.threadiness),
        listener: ListenerOptions {
            bind_address: raw
                .bind_address
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            http_port,
            https_port,
            tls,
        },
        namespace,
        storage: StorageOptions {
            endpoint,
            access_key,
            secret_key,
        },
        skip_authentication: raw.skip_authentication,
        authentication_modes: authentication_modes(raw.authentication_mode.as_deref()),
        diagnostics_address: raw
            .profile_listen_address
            .map(|addr| addr.trim().to_string())
            .filter(|addr| !addr.is_empty()),
        shutdown_grace: Duration::from_secs(shutdown_grace_secs),
    })
}

fn required(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: Option<String>,
) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.push(ValidationError::MissingRequiredField { field });
            None
        }
    }
}

/// Worker count, falling back to the default when unset or non-positive.
pub fn threadiness(raw: Option<i64>) -> NonZeroUsize {
    raw.filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .and_then(NonZeroUsize::new)
        .or_else(|| NonZeroUsize::new(DEFAULT_THREADINESS))
        .unwrap_or(NonZeroUsize::MIN)
}

/// Split a comma separated mode list into trimmed, non-empty tokens.
pub fn authentication_modes(raw: Option<&str>) -> Vec<String> {
    raw.map(|modes| {
        modes
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RawOptions {
        RawOptions {
            namespace: Some("ns1".into()),
            image_storage_endpoint: Some("http://s3:9000".into()),
            image_storage_access_key: Some("a".into()),
            image_storage_secret_key: Some("b".into()),
            ..Default::default()
        }
    }

    fn missing_fields(err: ConfigError) -> Vec<&'static str> {
        match err {
            ConfigError::Validation(errors) => errors
                .into_iter()
                .filter(|e| matches!(e, ValidationError::MissingRequiredField { .. }))
                .map(|e| e.field())
                .collect(),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn complete_options_get_defaults() {
        let options = validate(complete()).unwrap();
        assert_eq!(options.threadiness.get(), 10);
        assert_eq!(options.listener.http_port, 8080);
        assert_eq!(options.listener.https_port, 8443);
        assert_eq!(options.namespace, "ns1");
        assert_eq!(options.shutdown_grace, Duration::from_secs(30));
        assert!(options.diagnostics_address.is_none());
        assert!(options.listener.tls.is_none());
    }

    #[test]
    fn each_required_field_is_enforced() {
        let cases: [(&str, fn(&mut RawOptions)); 4] = [
            ("namespace", |o| o.namespace = None),
            ("image-storage-endpoint", |o| o.image_storage_endpoint = Some(String::new())),
            ("image-storage-access-key", |o| o.image_storage_access_key = None),
            ("image-storage-secret-key", |o| o.image_storage_secret_key = Some("  ".into())),
        ];

        for (field, clear) in cases {
            let mut raw = complete();
            clear(&mut raw);
            let err = validate(raw).unwrap_err();
            assert_eq!(missing_fields(err), vec![field]);
        }
    }

    #[test]
    fn all_missing_fields_reported_together() {
        let err = validate(RawOptions::default()).unwrap_err();
        assert_eq!(missing_fields(err).len(), 4);
    }

    #[test]
    fn non_positive_threadiness_defaults_to_ten() {
        for raw in [None, Some(0), Some(-1), Some(i64::MIN)] {
            assert_eq!(threadiness(raw).get(), 10, "input {:?}", raw);
        }
        assert_eq!(threadiness(Some(3)).get(), 3);
    }

    #[test]
    fn threadiness_is_bounded() {
        let mut raw = complete();
        raw.threadiness = Some(MAX_THREADINESS as i64);
        assert_eq!(validate(raw).unwrap().threadiness.get(), MAX_THREADINESS);

        for excessive in [MAX_THREADINESS as i64 + 1, 100_000_000_000, i64::MAX] {
            let mut raw = complete();
            raw.threadiness = Some(excessive);
            match validate(raw).unwrap_err() {
                ConfigError::Validation(errors) => {
                    assert_eq!(errors.len(), 1);
                    assert_eq!(errors[0].field(), "threadiness");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn storage_endpoint_must_be_url() {
        let mut raw = complete();
        raw.image_storage_endpoint = Some("not a url".into());
        let err = validate(raw).unwrap_err();
        assert!(err.to_string().contains("image-storage-endpoint"));
    }

    #[test]
    fn ports_must_differ_unless_ephemeral() {
        let mut raw = complete();
        raw.http_port = Some(9000);
        raw.https_port = Some(9000);
        assert!(validate(raw).is_err());

        let mut raw = complete();
        raw.http_port = Some(0);
        raw.https_port = Some(0);
        assert!(validate(raw).is_ok());
    }

    #[test]
    fn tls_files_come_in_pairs() {
        let mut raw = complete();
        raw.tls_cert_file = Some("/tmp/tls.crt".into());
        let err = validate(raw).unwrap_err();
        assert!(err.to_string().contains("tls-key-file"));
    }

    #[test]
    fn authentication_modes_are_trimmed() {
        assert_eq!(
            authentication_modes(Some(" kubernetesCredentials, ,localUser ")),
            vec!["kubernetesCredentials".to_string(), "localUser".to_string()]
        );
        assert!(authentication_modes(None).is_empty());
    }

    #[test]
    fn blank_diagnostics_address_disables_endpoint() {
        let mut raw = complete();
        raw.profile_listen_address = Some("   ".into());
        assert!(validate(raw).unwrap().diagnostics_address.is_none());

        let mut raw = complete();
        raw.profile_listen_address = Some("127.0.0.1:6060".into());
        assert_eq!(
            validate(raw).unwrap().diagnostics_address.as_deref(),
            Some("127.0.0.1:6060")
        );
    }
}
