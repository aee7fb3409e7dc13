use super::tables::{self, DROP_ORDER};
use super::{TableDef, TableDescription};
use crate::warehouse::Warehouse;
use common::{Error, Result, Stage};
use tracing::{debug, info};

/// Owns the lifecycle of the seven managed tables.
pub struct SchemaManager {
    tables: Vec<TableDef>,
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaManager {
    pub fn new() -> Self {
        Self {
            tables: tables::all_tables(),
        }
    }

    /// Managed tables in creation order.
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    fn table(&self, name: &str) -> Result<&TableDef> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| Error::Schema(format!("{} is not a managed table", name)))
    }

    /// Drops every managed table that exists. Safe to call repeatedly.
    pub async fn drop_all(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        for name in DROP_ORDER {
            let table = self.table(name)?;
            debug!(table = name, "Dropping table");
            warehouse
                .drop_table(table)
                .await
                .map_err(|e| e.in_stage(Stage::Schema, name))?;
        }
        info!(engine = warehouse.engine(), "Dropped managed tables");
        Ok(())
    }

    /// Creates every managed table that does not exist yet.
    pub async fn create_all(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        for table in &self.tables {
            debug!(table = table.name, sql = %table.create_sql(), "Creating table");
            warehouse
                .create_table(table)
                .await
                .map_err(|e| e.in_stage(Stage::Schema, table.name))?;
        }
        info!(
            engine = warehouse.engine(),
            tables = self.tables.len(),
            "Created managed tables"
        );
        Ok(())
    }

    /// Fresh schema for a full rebuild.
    pub async fn reset(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        self.drop_all(warehouse).await?;
        self.create_all(warehouse).await
    }

    pub async fn describe(
        &self,
        warehouse: &mut dyn Warehouse,
        table: &str,
    ) -> Result<Option<TableDescription>> {
        warehouse
            .describe_table(table)
            .await
            .map_err(|e| e.in_stage(Stage::Schema, table))
    }
}
