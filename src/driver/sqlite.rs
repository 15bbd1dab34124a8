use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteQueryResult, SqliteRow,
};
use sqlx::{ConnectOptions, Connection, Decode, Row, Sqlite, TypeInfo, ValueRef};

use crate::driver::criteria::{Criteria, FindOptions};
use crate::driver::sql::{self, Statement};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::model::{Document, Key, TableMetadata};
use crate::schema::ColumnType;
use crate::value::Value;

pub const MEMORY: &str = ":memory:";

/// [`Driver`] over a single SQLite connection.
pub struct SqliteDriver {
    db_file: String,
    connection: Option<SqliteConnection>,
    in_transaction: bool,
}

impl SqliteDriver {
    /// Driver for `db_file`; `":memory:"` opens a private in-memory database.
    pub fn new(db_file: impl Into<String>) -> Self {
        SqliteDriver {
            db_file: db_file.into(),
            connection: None,
            in_transaction: false,
        }
    }

    pub fn in_memory() -> Self {
        SqliteDriver::new(MEMORY)
    }

    pub fn db_file(&self) -> &str {
        &self.db_file
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = if self.db_file == MEMORY {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.db_file)
                .create_if_missing(true)
        };
        Ok(options.disable_statement_logging())
    }

    fn connection(&mut self) -> Result<&mut SqliteConnection> {
        self.connection.as_mut().ok_or(Error::InvalidConnectionState {
            expected: "open",
            actual: "closed",
        })
    }

    async fn execute(&mut self, statement: &Statement) -> Result<SqliteQueryResult> {
        let connection = self.connection()?;
        let started = Instant::now();
        let result = bind(statement).execute(&mut *connection).await;
        log_statement(&statement.sql, started, result.as_ref().err());
        Ok(result?)
    }

    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<SqliteRow>> {
        let connection = self.connection()?;
        let started = Instant::now();
        let result = bind(statement).fetch_all(&mut *connection).await;
        log_statement(&statement.sql, started, result.as_ref().err());
        Ok(result?)
    }

    async fn execute_sql(&mut self, sql: &str) -> Result<()> {
        self.execute(&Statement {
            sql: sql.to_string(),
            params: Vec::new(),
        })
        .await?;
        Ok(())
    }
}

fn log_statement(sql: &str, started: Instant, error: Option<&sqlx::Error>) {
    let duration_ms = started.elapsed().as_millis() as u64;
    match error {
        None => tracing::debug!(sql, duration_ms, "Sql statement completed"),
        Some(error) => tracing::error!(sql, duration_ms, %error, "Sql statement failed"),
    }
}

fn bind(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params
        .iter()
        .fold(sqlx::query::<Sqlite>(&statement.sql), |query, value| match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Blob(v) => query.bind(v.as_slice()),
            Value::Bit(v) => query.bind(*v),
            Value::Date(v) => query.bind(date_to_micros(v)),
        })
}

/// Microseconds since the epoch; exact for every date chrono can represent.
pub fn date_to_micros(date: &DateTime<Utc>) -> i64 {
    date.timestamp_micros()
}

pub fn micros_to_date(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

enum Stored {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

fn read_stored(row: &SqliteRow, index: usize) -> Result<Stored> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Stored::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let stored = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Stored::Integer(decode::<i64>(raw)?),
        "REAL" => Stored::Real(decode::<f64>(raw)?),
        "BLOB" => Stored::Blob(decode::<Vec<u8>>(raw)?),
        _ => Stored::Text(decode::<String>(raw)?),
    };
    Ok(stored)
}

fn decode<'r, T: Decode<'r, Sqlite>>(raw: sqlx::sqlite::SqliteValueRef<'r>) -> Result<T> {
    T::decode(raw).map_err(|e| Error::Database(sqlx::Error::Decode(e)))
}

fn to_value(name: &str, column_type: ColumnType, stored: Stored) -> Result<Value> {
    let value = match (column_type, stored) {
        (_, Stored::Null) => Value::Null,
        (ColumnType::Integer, Stored::Integer(v)) => Value::Integer(v),
        (ColumnType::Float, Stored::Real(v)) => Value::Float(v),
        (ColumnType::Float, Stored::Integer(v)) => Value::Float(v as f64),
        (ColumnType::Bit, Stored::Integer(v)) => Value::Bit(v != 0),
        (ColumnType::Date, Stored::Integer(v)) => date_value(name, v)?,
        (ColumnType::String, Stored::Text(v)) => Value::Text(v),
        (ColumnType::Blob, Stored::Blob(v)) => Value::Blob(v),
        (column_type, _) => {
            return Err(Error::invalid_argument(format!(
                "`{}`: stored value does not decode as `{}`",
                name, column_type
            )))
        }
    };
    Ok(value)
}

fn date_value(name: &str, micros: i64) -> Result<Value> {
    micros_to_date(micros).map(Value::Date).ok_or_else(|| {
        Error::invalid_argument(format!("`{}`: timestamp {} is out of range", name, micros))
    })
}

fn to_document(table: &TableMetadata, row: &SqliteRow) -> Result<Document> {
    let mut document = Document::new();
    for (index, (name, column)) in table.columns.iter().enumerate() {
        let stored = read_stored(row, index)?;
        document.set(name.as_str(), to_value(name, column.column_type, stored)?);
    }
    Ok(document)
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(Error::AlreadyConnected);
        }
        let connection = self.connect_options()?.connect().await?;
        tracing::debug!(db_file = %self.db_file, "Connected to sqlite database");
        self.connection = Some(connection);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.connection.is_none() {
            return Err(Error::InvalidConnectionState {
                expected: "open",
                actual: "closed",
            });
        }
        if self.in_transaction {
            tracing::warn!("Closing connection with an open transaction; rolling back");
            self.rollback().await?;
        }
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
        }
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::AlreadyInTransaction);
        }
        self.execute_sql("BEGIN TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::NotInTransaction);
        }
        self.execute_sql("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::NotInTransaction);
        }
        self.execute_sql("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn create_table(&mut self, table: &TableMetadata) -> Result<()> {
        let sql = sql::create_table(table)?;
        tracing::info!(table = %table.name, "Creating table");
        self.execute_sql(&sql).await
    }

    async fn count(&mut self, table: &TableMetadata, criteria: &Criteria) -> Result<u64> {
        let statement = sql::count(table, criteria)?;
        let rows = self.fetch_all(&statement).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(count as u64)
    }

    async fn find_one(&mut self, table: &TableMetadata, key: &Key) -> Result<Option<Document>> {
        let statement = sql::select_by_key(table, table.key_values(key)?)?;
        let rows = self.fetch_all(&statement).await?;
        rows.first().map(|row| to_document(table, row)).transpose()
    }

    async fn find(&mut self, table: &TableMetadata, options: &FindOptions) -> Result<Vec<Document>> {
        let statement = sql::select(table, options)?;
        let rows = self.fetch_all(&statement).await?;
        rows.iter().map(|row| to_document(table, row)).collect()
    }

    async fn add(&mut self, table: &TableMetadata, document: &mut Document) -> Result<()> {
        let row = sql::insert_row(table, document)?;
        let statement = sql::insert(table, row);
        let result = self.execute(&statement).await?;

        if let Some(key) = table.autoincrement_key() {
            document.set(key, result.last_insert_rowid());
        }
        Ok(())
    }

    async fn update(&mut self, table: &TableMetadata, document: &Document) -> Result<()> {
        let key = table.key_of(document)?;
        let row = sql::update_row(table, document)?;
        let statement = sql::update(table, row, key)?;
        let result = self.execute(&statement).await?;
        if result.rows_affected() == 0 {
            return Err(Error::UnaffectedRows);
        }
        Ok(())
    }

    async fn remove(&mut self, table: &TableMetadata, key: &Key) -> Result<()> {
        let statement = sql::delete(table, table.key_values(key)?)?;
        let result = self.execute(&statement).await?;
        if result.rows_affected() == 0 {
            return Err(Error::UnaffectedRows);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_micros_keep_precision() {
        let date = Utc
            .with_ymd_and_hms(2024, 2, 29, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(999_999))
            .unwrap();
        assert_eq!(micros_to_date(date_to_micros(&date)), Some(date));
    }

    #[test]
    fn test_far_dates_round_trip() {
        for (year, month, day) in [(1, 1, 1), (1969, 12, 31), (2300, 6, 1), (3000, 6, 1), (9999, 12, 31)] {
            let date = Utc
                .with_ymd_and_hms(year, month, day, 12, 0, 0)
                .unwrap()
                .checked_add_signed(chrono::Duration::microseconds(999_999))
                .unwrap();
            assert_eq!(micros_to_date(date_to_micros(&date)), Some(date), "{}", date);
        }
    }

    #[test]
    fn test_date_column_decodes_integer_micros() {
        let date = Utc.with_ymd_and_hms(2020, 3, 26, 15, 48, 8).unwrap();
        let value = to_value("created_on", ColumnType::Date, Stored::Integer(date_to_micros(&date)));
        assert_eq!(value.unwrap(), Value::Date(date));
        assert!(to_value("created_on", ColumnType::Date, Stored::Real(1.5)).is_err());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let mut driver = SqliteDriver::in_memory();
        let err = driver.begin_transaction().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionState { .. }));
        assert!(matches!(
            driver.close().await.unwrap_err(),
            Error::InvalidConnectionState { .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let mut driver = SqliteDriver::in_memory();
        driver.connect().await.unwrap();
        assert!(matches!(
            driver.connect().await.unwrap_err(),
            Error::AlreadyConnected
        ));
        driver.close().await.unwrap();
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn test_transaction_state() {
        let mut driver = SqliteDriver::in_memory();
        driver.connect().await.unwrap();

        assert!(matches!(
            driver.commit().await.unwrap_err(),
            Error::NotInTransaction
        ));
        driver.begin_transaction().await.unwrap();
        assert!(driver.in_transaction());
        assert!(matches!(
            driver.begin_transaction().await.unwrap_err(),
            Error::AlreadyInTransaction
        ));
        driver.rollback().await.unwrap();
        assert!(!driver.in_transaction());
        assert!(matches!(
            driver.rollback().await.unwrap_err(),
            Error::NotInTransaction
        ));
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_transaction_open() {
        let mut driver = SqliteDriver::in_memory();
        driver.connect().await.unwrap();
        driver.begin_transaction().await.unwrap();

        let connection = driver.connection.take();
        assert!(matches!(
            driver.rollback().await.unwrap_err(),
            Error::InvalidConnectionState { .. }
        ));
        assert!(driver.in_transaction());

        driver.connection = connection;
        driver.rollback().await.unwrap();
        assert!(!driver.in_transaction());
        driver.close().await.unwrap();
    }
}
