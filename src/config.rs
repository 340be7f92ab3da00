//! `dbi.toml` settings.
//!
//! ```toml
//! [database]
//! flavor = "postgres"
//! server = "db.internal:5432"
//! database = "rt_analytics"
//! user = "etl"
//!
//! [lookup]
//! people_view = "pr_fis_vw"
//! ```

use crate::connect::{ConnectionSpec, DEFAULT_DATABASE, DEFAULT_SERVER};
use crate::error::{DbError, DbResult};
use crate::flavor::Flavor;
use crate::lookup::LookupConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "dbi.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub lookup: LookupConfig,
}

/// Connection settings; unset fields fall back to the next source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub database: Option<String>,
    pub flavor: Option<Flavor>,
    pub verbose: Option<bool>,
}

impl Settings {
    pub fn from_toml(text: &str) -> DbResult<Self> {
        toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Load `explicit` if given (it must exist), else the first file found
    /// in [`Settings::search_paths`], else defaults.
    pub fn load(explicit: Option<&Path>) -> DbResult<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::read(&path),
            None => Ok(Self::default()),
        }
    }

    /// `./dbi.toml`, then `<config dir>/dbi/config.toml`.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("dbi").join("config.toml"));
        }
        paths
    }

    fn read(path: &Path) -> DbResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Self::from_toml(&content)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))
    }
}

impl DatabaseSettings {
    /// Fields set in `overrides` win over the ones in `self`.
    pub fn merge(self, overrides: DatabaseSettings) -> DatabaseSettings {
        DatabaseSettings {
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            server: overrides.server.or(self.server),
            database: overrides.database.or(self.database),
            flavor: overrides.flavor.or(self.flavor),
            verbose: overrides.verbose.or(self.verbose),
        }
    }

    pub fn to_spec(&self) -> ConnectionSpec {
        ConnectionSpec {
            user: self.user.clone(),
            password: self.password.clone(),
            server: self.server.clone().unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            flavor: self.flavor.unwrap_or_default(),
            verbose: self.verbose.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::from_toml(
            r#"
            [database]
            flavor = "postgres"
            server = "db.internal"
            user = "etl"

            [lookup]
            course_view = "courses_2024_vw"
            "#,
        )
        .unwrap();

        assert_eq!(settings.database.flavor, Some(Flavor::Postgres));
        assert_eq!(settings.database.server.as_deref(), Some("db.internal"));
        assert_eq!(settings.lookup.course_view, "courses_2024_vw");
        assert_eq!(settings.lookup.people_view, "pr_fis_vw");
    }

    #[test]
    fn test_bad_flavor_is_config_error() {
        let err = Settings::from_toml("[database]\nflavor = \"oracle\"\n").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_merge_into_connection() {
        let file = DatabaseSettings {
            user: Some("file_user".into()),
            server: Some("file-host".into()),
            ..Default::default()
        };
        let cli = DatabaseSettings {
            user: Some("cli_user".into()),
            password: Some("pw".into()),
            ..Default::default()
        };

        let spec = file.merge(cli).to_spec();
        assert_eq!(spec.user.as_deref(), Some("cli_user"));
        assert_eq!(spec.password.as_deref(), Some("pw"));
        assert_eq!(spec.server, "file-host");
        assert_eq!(spec.database, DEFAULT_DATABASE);
        assert_eq!(spec.flavor, Flavor::MySql);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/dbi.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dbi.toml"));
    }
}
