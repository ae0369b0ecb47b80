//! Service configuration.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional YAML file, and the command line (which also reads
//! `LADON_*` environment variables).
//!
//! ```yaml
//! rule_path: /etc/ladon/rules.tsv
//! flags: iu
//! port: 8080
//! debug: false
//! max_matches_per_scan: 100000
//! ```

use crate::engine::regex_engine::DEFAULT_MATCH_LIMIT;
use crate::engine::{CompileFlags, RegexEngine, DEFAULT_FLAG_SPEC};
use crate::error::{LadonError, Result};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Complete service configuration.
///
/// # Examples
///
/// ```rust
/// use ladon::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .rule_path("rules.tsv")
///     .flags("ism")
///     .port(9000)
///     .build();
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.listen_addr().port(), 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Rule file to load at startup. Required.
    pub rule_path: Option<PathBuf>,
    /// Compile-flag specification applied to every rule.
    pub flags: String,
    /// Address to listen on.
    pub bind_address: IpAddr,
    pub port: u16,
    /// Log at debug level instead of info.
    pub debug: bool,
    /// Scans producing more matches than this fail with a scan error.
    pub max_matches_per_scan: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rule_path: None,
            flags: DEFAULT_FLAG_SPEC.to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            debug: false,
            max_matches_per_scan: DEFAULT_MATCH_LIMIT,
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Read a YAML configuration file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check everything startup depends on.
    pub fn validate(&self) -> Result<()> {
        match &self.rule_path {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => return Err(LadonError::Config("empty rule file path".to_string())),
        }
        if self.max_matches_per_scan == 0 {
            return Err(LadonError::Config(
                "max_matches_per_scan must be at least 1".to_string(),
            ));
        }
        self.compile_flags()?;
        Ok(())
    }

    pub fn compile_flags(&self) -> Result<CompileFlags> {
        CompileFlags::parse(&self.flags)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// The bundled engine configured from these settings.
    pub fn engine(&self) -> RegexEngine {
        RegexEngine::new().with_match_limit(self.max_matches_per_scan)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one read from a file.
    pub fn from_config(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn rule_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rule_path = Some(path.into());
        self
    }

    pub fn flags(mut self, flags: impl Into<String>) -> Self {
        self.config.flags = flags.into();
        self
    }

    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.config.bind_address = address;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn max_matches_per_scan(mut self, limit: usize) -> Self {
        self.config.max_matches_per_scan = limit;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.flags, "iu");
        assert_eq!(config.port, 8080);
        assert!(!config.debug);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_rule_path_rejected() {
        let error = ServiceConfig::default().validate().unwrap_err();
        assert_eq!(error.to_string(), "Configuration error: empty rule file path");

        let config = ServiceConfig::builder().rule_path("").build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_flags_rejected() {
        let config = ServiceConfig::builder()
            .rule_path("rules.tsv")
            .flags("iq")
            .build();
        assert!(matches!(config.validate(), Err(LadonError::InvalidFlag('q'))));
    }

    #[test]
    fn test_zero_match_limit_rejected() {
        let config = ServiceConfig::builder()
            .rule_path("rules.tsv")
            .max_matches_per_scan(0)
            .build();
        assert!(matches!(config.validate(), Err(LadonError::Config(_))));
    }

    #[test]
    fn test_yaml_partial_file() {
        let config = ServiceConfig::from_yaml_str("rule_path: /tmp/rules.tsv\nport: 9100\n").unwrap();

        assert_eq!(config.rule_path, Some(PathBuf::from("/tmp/rules.tsv")));
        assert_eq!(config.port, 9100);
        assert_eq!(config.flags, DEFAULT_FLAG_SPEC);
    }

    #[test]
    fn test_yaml_unknown_key_rejected() {
        assert!(matches!(
            ServiceConfig::from_yaml_str("prot: 80\n"),
            Err(LadonError::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rule_path: rules.tsv").unwrap();
        writeln!(file, "flags: sm").unwrap();
        writeln!(file, "debug: true").unwrap();

        let config = ServiceConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.compile_flags().unwrap().to_string(), "sm");
    }

    #[test]
    fn test_builder_overrides_file_values() {
        let base = ServiceConfig::from_yaml_str("port: 7000\nflags: i\n").unwrap();
        let config = ServiceConfigBuilder::from_config(base).port(7001).build();

        assert_eq!(config.port, 7001);
        assert_eq!(config.flags, "i");
    }
}
