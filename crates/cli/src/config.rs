use config::{Config, ConfigError, Environment, File, FileFormat};
use health_engine::manifest::{default_manifest, Manifest, ProbeSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Defaults compiled into the binary; every other source overrides them.
const DEFAULT_CONFIG: &str = include_str!("../healthctl.yaml");

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub default_timeout_ms: u64,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

impl AppConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Configured probes, or the built-in self/filesystem pair when the
    /// list is empty.
    pub fn manifest(&self) -> Manifest {
        if self.probes.is_empty() {
            return default_manifest();
        }
        Manifest {
            probes: self.probes.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    pub levels: LoggingLevelsConfig,
    pub format: LoggingFormatConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingFormatConfig {
    pub show_time: bool,
    pub location: LoggingLocationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLocationConfig {
    pub show_file: bool,
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLevelsConfig {
    pub debug: bool,
    pub info: bool,
    pub warning: bool,
    pub error: bool,
    pub critical: bool,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

/// Layered load: built-in defaults, `healthctl.yaml`, `.healthctl.yaml`,
/// an explicit `--config` file, then `HEALTHCTL__*` environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Yaml))
        .add_source(File::with_name("healthctl.yaml").required(false))
        // Local override, not meant to be committed
        .add_source(File::with_name(".healthctl.yaml").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config: AppConfig = builder
        // Map nested env vars like HEALTHCTL__LOGGING__JSON=true
        .add_source(
            Environment::with_prefix("HEALTHCTL")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if config.default_timeout_ms == 0 {
        return Err(ConfigError::Message(
            "default_timeout_ms must be greater than zero".into(),
        ));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_engine::manifest::ProbeKind;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    struct EnvGuard(&'static str);
    impl EnvGuard {
        fn new(key: &'static str, val: &str) -> Self {
            env::set_var(key, val);
            Self(key)
        }
    }
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.0);
        }
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.default_timeout_ms, 5000);
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
        assert!(config.logging.levels.info);
        assert!(!config.logging.json);
        assert_eq!(config.probes.len(), 2);
        assert_eq!(config.probes[0].name, "self");
        assert_eq!(config.probes[0].kind, ProbeKind::SelfCheck);
        assert_eq!(config.probes[1].tags, vec!["ready"]);
    }

    #[test]
    #[serial]
    fn test_env_var_override_precedence() {
        let _guard = EnvGuard::new("HEALTHCTL__DEFAULT_TIMEOUT_MS", "250");
        let config = load_config(None).expect("should load config");
        assert_eq!(config.default_timeout_ms, 250);
    }

    #[test]
    #[serial]
    fn test_zero_default_timeout_rejected() {
        let _guard = EnvGuard::new("HEALTHCTL__DEFAULT_TIMEOUT_MS", "0");
        let err = load_config(None).unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms"));
    }

    #[test]
    #[serial]
    fn test_type_coercion_boolean() {
        {
            let _guard = EnvGuard::new("HEALTHCTL__LOGGING__JSON", "true");
            let config = load_config(None).expect("should load config");
            assert!(config.logging.json);
        }
        {
            let _guard = EnvGuard::new("HEALTHCTL__LOGGING__LEVELS__DEBUG", "true");
            let config = load_config(None).expect("should load config");
            assert!(config.logging.levels.debug);
        }
    }

    #[test]
    #[serial]
    fn test_explicit_file_replaces_probes() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
default_timeout_ms: 1500
probes:
  - name: self
    kind: self
    tags: [live]
  - name: SQL Server Connection
    kind: tcp
    address: "127.0.0.1:1433"
    tags: [db, sql, ready]
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).expect("should load config");
        assert_eq!(config.default_timeout_ms, 1500);
        assert_eq!(config.probes.len(), 2);
        assert_eq!(config.probes[1].name, "SQL Server Connection");
        assert_eq!(config.manifest().probes, config.probes);
        // Untouched sections still come from the defaults.
        assert!(config.logging.redaction.enabled);
    }

    #[test]
    #[serial]
    fn test_empty_probe_list_falls_back_to_defaults() {
        let mut config = load_config(None).unwrap();
        config.probes.clear();
        let names: Vec<String> = config.manifest().probes.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["self", "filesystem"]);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_fails() {
        let err = load_config(Some(Path::new("/definitely/not/here.yaml")));
        assert!(err.is_err());
    }
}
