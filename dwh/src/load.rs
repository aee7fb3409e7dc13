use crate::pipeline::TableCount;
use crate::schema::{SqlType, TableDef, tables};
use crate::transform::{Record, TransformedData};
use crate::warehouse::{Row, Warehouse};
use common::{Result, Stage};
use tracing::{debug, info};

/// Upper bound on bind parameters in one statement on the wire.
const MAX_PARAMETERS: usize = 32_767;

/// A positional INSERT into one destination table. Identity columns are left
/// to the engine.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: &'static str,
    columns: Vec<(&'static str, SqlType)>,
}

impl InsertStatement {
    pub fn for_table(table: &TableDef) -> Self {
        Self {
            table: table.name,
            columns: table
                .columns
                .iter()
                .filter(|column| column.identity.is_none())
                .map(|column| (column.name, column.sql_type))
                .collect(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[(&'static str, SqlType)] {
        &self.columns
    }

    /// `INSERT ... VALUES` with `$n` placeholders for `rows` rows.
    pub fn sql(&self, rows: usize) -> String {
        let names: Vec<&str> = self.columns.iter().map(|(name, _)| *name).collect();
        let width = self.columns.len();
        let values: Vec<String> = (0..rows)
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            names.join(", "),
            values.join(", ")
        )
    }

    /// Converts each value to its destination column type.
    pub fn coerce_row(&self, row: &Row) -> std::result::Result<Row, String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "{} expects {} values, got {}",
                self.table,
                self.columns.len(),
                row.len()
            ));
        }

        row.iter()
            .zip(&self.columns)
            .map(|(value, (name, sql_type))| {
                value
                    .clone()
                    .coerce(*sql_type)
                    .map_err(|e| format!("column {}: {}", name, e))
            })
            .collect()
    }

    fn max_batch(&self) -> usize {
        (MAX_PARAMETERS / self.columns.len().max(1)).max(1)
    }
}

/// Writes the transformed record sets into the star schema.
pub struct Loader {
    batch_size: usize,
}

impl Loader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Inserts songplays, users, songs, artists and time, in that order.
    /// The first failure aborts the remaining inserts.
    pub async fn insert_all(
        &self,
        warehouse: &mut dyn Warehouse,
        data: &TransformedData,
    ) -> Result<Vec<TableCount>> {
        Ok(vec![
            self.insert(warehouse, &tables::songplays(), &data.songplays).await?,
            self.insert(warehouse, &tables::users(), &data.users).await?,
            self.insert(warehouse, &tables::songs(), &data.songs).await?,
            self.insert(warehouse, &tables::artists(), &data.artists).await?,
            self.insert(warehouse, &tables::time(), &data.time).await?,
        ])
    }

    async fn insert<R: Record>(
        &self,
        warehouse: &mut dyn Warehouse,
        table: &TableDef,
        records: &[R],
    ) -> Result<TableCount> {
        let statement = InsertStatement::for_table(table);
        let rows: Vec<Row> = records.iter().map(R::to_row).collect();
        let batch_size = self.batch_size.min(statement.max_batch());

        let mut inserted = 0;
        for batch in rows.chunks(batch_size) {
            inserted += warehouse
                .insert_rows(&statement, batch)
                .await
                .map_err(|e| e.in_stage(Stage::Insertion, table.name))?;
            debug!(table = table.name, inserted, "Batch committed");
        }

        info!(table = table.name, rows = inserted, "Inserted rows");
        Ok(TableCount {
            table: table.name,
            rows: inserted,
        })
    }
}
