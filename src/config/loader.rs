//! Options file loading.

use std::fs;
use std::path::Path;

use crate::config::schema::RawOptions;
use crate::config::ConfigError;

/// Read a TOML options file into a raw option set.
///
/// Keys use the same kebab-case names as the command line flags.
pub fn load_options_file(path: &Path) -> Result<RawOptions, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_options(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse TOML text into a raw option set.
pub fn parse_options(content: &str) -> Result<RawOptions, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn parses_kebab_case_keys() {
        let raw = parse_options(
            r#"
            namespace = "harvester-system"
            image-storage-endpoint = "http://minio:9000"
            threadiness = 4
            http-port = 18080
            log-format = "json"
            debug = true
            "#,
        )
        .unwrap();

        assert_eq!(raw.namespace.as_deref(), Some("harvester-system"));
        assert_eq!(raw.image_storage_endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(raw.threadiness, Some(4));
        assert_eq!(raw.http_port, Some(18080));
        assert_eq!(raw.log_format, Some(LogFormat::Json));
        assert!(raw.debug);
        assert!(raw.https_port.is_none());
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(parse_options("http-port = \"eighty\"").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_options_file(Path::new("/nonexistent/harvester.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
