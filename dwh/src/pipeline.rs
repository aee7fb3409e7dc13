use crate::load::Loader;
use crate::schema::SchemaManager;
use crate::staging::BulkLoader;
use crate::transform::Transformer;
use crate::warehouse::Warehouse;
use common::Result;
use common::config::Settings;
use std::fmt;
use tracing::info;

/// Rows written to one table by a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: u64,
}

impl fmt::Display for TableCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} rows", self.table, self.rows)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub staged: Vec<TableCount>,
    pub inserted: Vec<TableCount>,
}

/// Schema reset, staging copy, transformation and insert, in that order.
pub struct Pipeline {
    schema: SchemaManager,
    bulk_loader: BulkLoader,
    transformer: Transformer,
    loader: Loader,
}

impl Pipeline {
    pub fn new(settings: &Settings) -> Self {
        Self {
            schema: SchemaManager::new(),
            bulk_loader: BulkLoader::new(&settings.s3, settings.iam_role.as_ref()),
            transformer: Transformer::new(settings.pipeline.row_limit),
            loader: Loader::new(settings.pipeline.insert_batch_size),
        }
    }

    /// Drops and recreates the managed tables.
    pub async fn create_tables(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        self.schema.reset(warehouse).await
    }

    /// Loads staging and fills the star schema. The tables must already exist.
    pub async fn etl(&self, warehouse: &mut dyn Warehouse) -> Result<RunSummary> {
        let staged = self.bulk_loader.load_staging(warehouse).await?;
        let data = self.transformer.transform_all(warehouse).await?;
        let inserted = self.loader.insert_all(warehouse, &data).await?;

        let summary = RunSummary { staged, inserted };
        info!(engine = warehouse.engine(), "Pipeline finished");
        Ok(summary)
    }

    pub async fn run(&self, warehouse: &mut dyn Warehouse) -> Result<RunSummary> {
        self.create_tables(warehouse).await?;
        self.etl(warehouse).await
    }
}
