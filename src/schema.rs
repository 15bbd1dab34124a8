//! Column declarations for tables managed by minidb.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Logical type of a column.
///
/// `Integer` and `Float` are the numeric types; `Bit` is a boolean flag and
/// `Date` a UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Blob,
    Bit,
    Date,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Blob => "Blob",
            ColumnType::Bit => "Bit",
            ColumnType::Date => "Date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Produces a value for a column each time a document is added.
pub type Generator = Arc<dyn Fn() -> Value + Send + Sync>;

/// A column declaration.
///
/// Columns are `NOT NULL` unless marked [`Column::nullable`].
#[derive(Clone)]
pub struct Column {
    pub column_type: ColumnType,
    pub nullable: bool,
    pub autoincrement: bool,
    pub primary_key: bool,
    pub generator: Option<Generator>,
}

impl Column {
    pub fn new(column_type: ColumnType) -> Self {
        Column {
            column_type,
            nullable: false,
            autoincrement: false,
            primary_key: false,
            generator: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Attach a generator; its output replaces whatever the document holds
    /// for this column on insert.
    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Check the column's own invariants.
    ///
    /// `autoincrement` is only valid on primary-key `Integer` columns and
    /// cannot be combined with a generator.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.autoincrement {
            return Ok(());
        }
        if self.column_type != ColumnType::Integer {
            return Err(Error::schema(format!(
                "`{}`: `autoincrement` can only be used on columns of type `Integer`",
                name
            )));
        }
        if !self.primary_key {
            return Err(Error::schema(format!(
                "`{}`: `autoincrement` requires the column to be a primary key",
                name
            )));
        }
        if self.generator.is_some() {
            return Err(Error::schema(format!(
                "`{}`: `autoincrement` cannot be combined with a generator",
                name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("column_type", &self.column_type)
            .field("nullable", &self.nullable)
            .field("autoincrement", &self.autoincrement)
            .field("primary_key", &self.primary_key)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}
