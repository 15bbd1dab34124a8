//! Driver lookup by name.

use std::collections::BTreeMap;
use std::path::Path;

use crate::driver::sqlite::MEMORY;
use crate::driver::{Driver, SqliteDriver};
use crate::error::{Error, Result};

pub const SQLITE: &str = "sqlite";

/// Driver-specific options, e.g. `db_file` for SQLite.
pub type DriverOptions = BTreeMap<String, String>;

/// Remembers a driver name and its options and hands out fresh drivers.
#[derive(Debug, Clone)]
pub struct Factory {
    driver: String,
    options: DriverOptions,
}

impl Factory {
    pub fn new(driver: impl Into<String>, options: DriverOptions) -> Self {
        Factory {
            driver: driver.into(),
            options,
        }
    }

    pub fn get_driver(&self) -> Result<Box<dyn Driver>> {
        get_driver(&self.driver, &self.options)
    }
}

/// Create an unconnected driver.
pub fn get_driver(driver: &str, options: &DriverOptions) -> Result<Box<dyn Driver>> {
    match driver {
        SQLITE => {
            let db_file = options.get("db_file").map(String::as_str).unwrap_or(MEMORY);
            Ok(Box::new(SqliteDriver::new(db_file)))
        }
        other => Err(Error::DriverNotSupported(other.to_string())),
    }
}

/// Whether the database described by `options` already exists.
pub fn database_exists(driver: &str, options: &DriverOptions) -> Result<bool> {
    match driver {
        SQLITE => {
            let db_file = options.get("db_file").ok_or_else(|| {
                Error::invalid_argument(
                    "`opts`: `db_file` option is required when creating Sqlite databases",
                )
            })?;
            Ok(Path::new(db_file).exists())
        }
        other => Err(Error::DriverNotSupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(db_file: &str) -> DriverOptions {
        let mut options = DriverOptions::new();
        options.insert("db_file".to_string(), db_file.to_string());
        options
    }

    #[test]
    fn test_unknown_driver_is_rejected() {
        let err = get_driver("postgres", &DriverOptions::new()).err().unwrap();
        assert_eq!(err.to_string(), "The driver `postgres` is not supported");
        assert!(database_exists("postgres", &DriverOptions::new()).is_err());
    }

    #[test]
    fn test_sqlite_driver_defaults_to_memory() {
        assert!(get_driver(SQLITE, &DriverOptions::new()).is_ok());
    }

    #[test]
    fn test_database_exists_requires_db_file() {
        let err = database_exists(SQLITE, &DriverOptions::new()).unwrap_err();
        assert!(err.to_string().contains("`db_file` option is required"));
    }

    #[test]
    fn test_database_exists_checks_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let path_str = path.to_str().unwrap();
        assert!(!database_exists(SQLITE, &options(path_str)).unwrap());

        std::fs::write(&path, b"").unwrap();
        assert!(database_exists(SQLITE, &options(path_str)).unwrap());
    }

    #[tokio::test]
    async fn test_factory_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factory.db");
        let factory = Factory::new(SQLITE, options(path.to_str().unwrap()));

        let mut driver = factory.get_driver().unwrap();
        driver.connect().await.unwrap();
        driver.close().await.unwrap();

        assert!(path.exists());
    }
}
