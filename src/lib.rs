pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod factory;
pub mod git;
pub mod logging;
pub mod model;
pub mod schema;
pub mod task;
pub mod ui;
pub mod value;
pub mod version;

pub use driver::{Criteria, Driver, FindOptions, SortOrder, SqliteDriver};
pub use error::{Error, Result};
pub use factory::{database_exists, get_driver, DriverOptions, Factory};
pub use model::{
    DatabaseInitializer, Document, Key, ModelBuilder, ModelMetadata, TableDefinition,
    TableMetadata,
};
pub use schema::{Column, ColumnType};
pub use value::Value;
