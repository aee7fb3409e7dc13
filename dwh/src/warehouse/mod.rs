pub mod local;
pub mod redshift;
pub mod source;
pub mod value;

pub use local::LocalWarehouse;
pub use redshift::RedshiftWarehouse;
pub use value::{FromValue, Row, RowReader, Value};

use crate::load::InsertStatement;
use crate::schema::{TableDef, TableDescription};
use crate::staging::CopyDirective;
use async_trait::async_trait;
use common::Result;

/// The analytical engine the pipeline writes to.
///
/// Implementations report engine failures as `Error::Engine` (or
/// `Error::Connectivity` when the engine cannot be reached); the calling
/// component decides which pipeline stage the failure belongs to.
#[async_trait]
pub trait Warehouse: Send {
    fn engine(&self) -> &'static str;

    /// `DROP TABLE IF EXISTS`.
    async fn drop_table(&mut self, table: &TableDef) -> Result<()>;

    /// `CREATE TABLE IF NOT EXISTS`.
    async fn create_table(&mut self, table: &TableDef) -> Result<()>;

    /// Columns and primary key as the engine reports them, `None` if absent.
    async fn describe_table(&mut self, table: &str) -> Result<Option<TableDescription>>;

    /// Runs one bulk copy from object storage. Returns the rows loaded.
    async fn copy_into(&mut self, directive: &CopyDirective) -> Result<u64>;

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Inserts `rows` with one statement committed as a unit.
    async fn insert_rows(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64>;
}
