//! Table metadata, documents and the builder that assembles a model.
//!
//! A model is a set of tables declared up front with [`ModelBuilder`]. Once
//! built, [`ModelMetadata::create_db`] creates every table through a
//! [`Driver`] inside a single transaction and runs the optional
//! [`DatabaseInitializer`] before committing.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::schema::Column;
use crate::value::Value;

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// Reject anything that is not a plain SQL identifier.
///
/// Table and column names are interpolated into statements, values never are.
pub fn validate_identifier(name: &str) -> Result<()> {
    if identifier_regex().is_match(name) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "`{}` is not a valid identifier",
            name
        )))
    }
}

/// Resolved metadata of one table.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<(String, Column)>,
    pub primary_key: Vec<String>,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(column_name, _)| column_name == name)
            .map(|(_, column)| column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// Name of the single autoincrement key column, if the table has one.
    pub fn autoincrement_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [key] if self.column(key).map(|c| c.autoincrement).unwrap_or(false) => {
                Some(key.as_str())
            }
            _ => None,
        }
    }

    /// A document with every column of this table set to `Null`.
    pub fn new_document(&self) -> Document {
        let mut document = Document::new();
        for name in self.column_names() {
            document.set(name, Value::Null);
        }
        document
    }

    /// Resolve a key into `(column, value)` pairs in primary-key order.
    pub fn key_values(&self, key: &Key) -> Result<Vec<(String, Value)>> {
        match key {
            Key::Single(value) => match self.primary_key.as_slice() {
                [name] => Ok(vec![(name.clone(), value.clone())]),
                _ => Err(Error::invalid_argument(format!(
                    "table `{}` has a composite primary key ({}); a single key value was given",
                    self.name,
                    self.primary_key.join(", ")
                ))),
            },
            Key::Composite(values) => self
                .primary_key
                .iter()
                .map(|name| {
                    values
                        .get(name)
                        .map(|v| (name.clone(), v.clone()))
                        .ok_or_else(|| {
                            Error::invalid_argument(format!(
                                "key for table `{}` is missing `{}`",
                                self.name, name
                            ))
                        })
                })
                .collect(),
        }
    }

    /// Key of an existing document.
    pub fn key_of(&self, document: &Document) -> Result<Vec<(String, Value)>> {
        self.primary_key
            .iter()
            .map(|name| match document.get(name) {
                Some(value) if !value.is_null() => Ok((name.clone(), value.clone())),
                _ => Err(Error::invalid_argument(format!(
                    "document for table `{}` has no value for key column `{}`",
                    self.name, name
                ))),
            })
            .collect()
    }
}

/// A row of a table, keyed by column name and iterated sorted by name.
///
/// Declared column order lives in [`TableMetadata::columns`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    values: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Build a document for `table` from the given pairs; unspecified columns are `Null`.
    pub fn for_table<I, K, V>(table: &TableMetadata, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut document = table.new_document();
        for (name, value) in pairs {
            document.set(name, value);
        }
        document
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value of `name`, treating a missing column as `Null`.
    pub fn value(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Primary key used to look up a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Single(Value),
    Composite(BTreeMap<String, Value>),
}

impl Key {
    pub fn composite<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Key::Composite(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::Single(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Single(Value::Integer(value))
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Single(Value::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Single(Value::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Single(Value::Text(value))
    }
}

/// Hook run once, inside the table-creation transaction, after every table exists.
#[async_trait]
pub trait DatabaseInitializer: Send + Sync {
    async fn initialize(&self, driver: &mut dyn Driver) -> Result<()>;
}

/// Declaration of one table, before validation.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    columns: Vec<(String, Column)>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        TableDefinition {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    fn resolve(self) -> Result<TableMetadata> {
        validate_identifier(&self.name)?;

        let mut seen = HashSet::new();
        for (name, column) in &self.columns {
            validate_identifier(name)?;
            if !seen.insert(name.as_str()) {
                return Err(Error::schema(format!(
                    "table `{}` declares column `{}` twice",
                    self.name, name
                )));
            }
            column.validate(name)?;
        }

        let primary_key: Vec<String> = self
            .columns
            .iter()
            .filter(|(_, c)| c.primary_key)
            .map(|(name, _)| name.clone())
            .collect();

        if primary_key.is_empty() {
            return Err(Error::schema(format!(
                "table `{}` has no primary key column",
                self.name
            )));
        }

        let has_autoincrement = self.columns.iter().any(|(_, c)| c.autoincrement);
        if has_autoincrement && primary_key.len() > 1 {
            return Err(Error::schema(format!(
                "Error creating table `{}`: `autoincrement` is not supported on models using composite primary keys",
                self.name
            )));
        }

        Ok(TableMetadata {
            name: self.name,
            columns: self.columns,
            primary_key,
        })
    }
}

/// Collects table definitions and builds a [`ModelMetadata`].
#[derive(Default)]
pub struct ModelBuilder {
    tables: Vec<TableDefinition>,
    initializer: Option<Arc<dyn DatabaseInitializer>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        ModelBuilder::default()
    }

    pub fn table(mut self, definition: TableDefinition) -> Self {
        self.tables.push(definition);
        self
    }

    pub fn database_initializer(mut self, initializer: impl DatabaseInitializer + 'static) -> Self {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    pub fn build(self) -> Result<ModelMetadata> {
        let mut tables: Vec<TableMetadata> = Vec::with_capacity(self.tables.len());
        for definition in self.tables {
            let table = definition.resolve()?;
            if tables.iter().any(|t| t.name == table.name) {
                return Err(Error::schema(format!(
                    "table `{}` is declared twice",
                    table.name
                )));
            }
            tables.push(table);
        }

        Ok(ModelMetadata {
            tables,
            initializer: self.initializer,
        })
    }
}

/// Validated model: every table plus the optional initializer.
#[derive(Clone)]
pub struct ModelMetadata {
    tables: Vec<TableMetadata>,
    initializer: Option<Arc<dyn DatabaseInitializer>>,
}

impl ModelMetadata {
    pub fn collection(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tables(&self) -> &[TableMetadata] {
        &self.tables
    }

    /// Create every table and run the initializer in one transaction.
    ///
    /// Any failure rolls the transaction back and is returned unchanged.
    pub async fn create_db(&self, driver: &mut dyn Driver) -> Result<()> {
        driver.begin_transaction().await?;

        match self.create_tables(driver).await {
            Ok(()) => driver.commit().await,
            Err(err) => {
                if let Err(rollback_err) = driver.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback after failed database creation failed");
                }
                Err(err)
            }
        }
    }

    async fn create_tables(&self, driver: &mut dyn Driver) -> Result<()> {
        for table in &self.tables {
            driver.create_table(table).await?;
        }

        if let Some(initializer) = &self.initializer {
            tracing::info!("Executing database initializer");
            initializer.initialize(driver).await?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for ModelMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelMetadata")
            .field("tables", &self.tables)
            .field("initializer", &self.initializer.is_some())
            .finish()
    }
}
