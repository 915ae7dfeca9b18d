use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use modelops_db::{DatabaseConfig, RepositoryConfig};
use serde::Deserialize;
use std::path::Path;

/// Settings read from `modelops.toml` (optional) and `MODELOPS_*` variables.
///
/// Nested keys use a double underscore in the environment, e.g.
/// `MODELOPS_REPOSITORY__MAX_REGISTER_ATTEMPTS=10`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub repository: RepositoryConfig,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(File::with_name("modelops").required(false));
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }

        Self::build(
            builder.add_source(
                Environment::with_prefix("MODELOPS")
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// `override_url` (from the command line) wins over configured values.
    pub fn database(&self, override_url: Option<&str>) -> Option<DatabaseConfig> {
        let url = override_url.or(self.database_url.as_deref())?;
        let mut config = DatabaseConfig::new(url);
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }

        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Settings {
        Settings::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
            .unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = from_toml("");
        assert!(settings.database_url.is_none());
        assert_eq!(settings.repository, RepositoryConfig::default());
        assert!(settings.database(None).is_none());
    }

    #[test]
    fn test_file_values() {
        let settings = from_toml(
            r#"
            database_url = "postgres://localhost/modelops"
            max_connections = 12

            [repository]
            max_register_attempts = 8
            "#,
        );

        let db = settings.database(None).unwrap();
        assert_eq!(db.url, "postgres://localhost/modelops");
        assert_eq!(db.max_connections, 12);
        assert_eq!(settings.repository.max_register_attempts, 8);
        assert_eq!(settings.repository.register_retry_backoff_ms, 10);
    }

    #[test]
    fn test_command_line_url_wins() {
        let settings = from_toml(r#"database_url = "postgres://config/db""#);
        let db = settings.database(Some("postgres://flag/db")).unwrap();
        assert_eq!(db.url, "postgres://flag/db");
    }
}
