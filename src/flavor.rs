//! Supported database flavors.

use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The database products dbi can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Flavor {
    Postgres,
    #[default]
    MySql,
    MsSql,
    Sqlite,
}

impl Flavor {
    pub fn name(&self) -> &'static str {
        match self {
            Flavor::Postgres => "postgres",
            Flavor::MySql => "mysql",
            Flavor::MsSql => "mssql",
            Flavor::Sqlite => "sqlite",
        }
    }

    /// URL scheme understood by the driver.
    pub fn scheme(&self) -> &'static str {
        match self {
            Flavor::Postgres => "postgres",
            Flavor::MySql => "mysql",
            Flavor::MsSql => "mssql",
            Flavor::Sqlite => "sqlite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Flavor::Postgres => Some(5432),
            Flavor::MySql => Some(3306),
            Flavor::MsSql => Some(1433),
            Flavor::Sqlite => None,
        }
    }
}

impl FromStr for Flavor {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Flavor::Postgres),
            "mysql" | "mariadb" => Ok(Flavor::MySql),
            "mssql" | "sqlserver" => Ok(Flavor::MsSql),
            "sqlite" => Ok(Flavor::Sqlite),
            _ => Err(DbError::UnsupportedFlavor(s.to_string())),
        }
    }
}

impl TryFrom<String> for Flavor {
    type Error = DbError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Flavor> for String {
    fn from(f: Flavor) -> Self {
        f.name().to_string()
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flavor() {
        assert_eq!("PostgreSQL".parse::<Flavor>().unwrap(), Flavor::Postgres);
        assert_eq!("sqlserver".parse::<Flavor>().unwrap(), Flavor::MsSql);
        assert_eq!(" mysql ".parse::<Flavor>().unwrap(), Flavor::MySql);

        let err = "oracle".parse::<Flavor>().unwrap_err();
        assert_eq!(err.to_string(), "unimplemented database type oracle");
    }

    #[test]
    fn test_default_is_mysql() {
        assert_eq!(Flavor::default(), Flavor::MySql);
        assert_eq!(Flavor::MsSql.default_port(), Some(1433));
    }
}
