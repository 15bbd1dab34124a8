//! Storage driver abstraction
//!
//! [`Driver`] is the seam between the model layer and a concrete database.
//! The only implementation is [`SqliteDriver`]; statement text is produced
//! by the pure functions in [`sql`] so it can be tested without a database.
//!
//! ## Connection and transaction state
//!
//! A driver starts disconnected. Every data operation on a disconnected
//! driver fails with [`Error::InvalidConnectionState`](crate::Error::InvalidConnectionState).
//! Transactions are explicit and never nested: a second `begin_transaction`
//! fails with `AlreadyInTransaction`, and `commit`/`rollback` outside a
//! transaction fail with `NotInTransaction`.

pub mod criteria;
pub mod sql;
pub mod sqlite;

pub use criteria::{Condition, Criteria, FindOptions, Operator, SortOrder};
pub use sqlite::SqliteDriver;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Document, Key, TableMetadata};

#[async_trait]
pub trait Driver: Send {
    /// Open the underlying connection.
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection, rolling back an open transaction.
    async fn close(&mut self) -> Result<()>;

    async fn begin_transaction(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    async fn create_table(&mut self, table: &TableMetadata) -> Result<()>;

    /// Number of rows matching `criteria` (all rows when empty).
    async fn count(&mut self, table: &TableMetadata, criteria: &Criteria) -> Result<u64>;

    /// Look up one document by primary key.
    async fn find_one(&mut self, table: &TableMetadata, key: &Key) -> Result<Option<Document>>;

    async fn find(&mut self, table: &TableMetadata, options: &FindOptions) -> Result<Vec<Document>>;

    /// Insert a document.
    ///
    /// Generated columns and the autoincrement key are written back into
    /// `document`.
    async fn add(&mut self, table: &TableMetadata, document: &mut Document) -> Result<()>;

    /// Update the row identified by the document's primary key.
    async fn update(&mut self, table: &TableMetadata, document: &Document) -> Result<()>;

    /// Delete the row identified by `key`.
    async fn remove(&mut self, table: &TableMetadata, key: &Key) -> Result<()>;
}
