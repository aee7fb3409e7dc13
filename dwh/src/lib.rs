pub mod load;
pub mod pipeline;
pub mod schema;
pub mod staging;
pub mod transform;
pub mod warehouse;

#[cfg(test)]
mod test_utils;

pub use pipeline::{Pipeline, RunSummary, TableCount};

use common::Result;
use common::config::{Engine, Settings};
use tracing::info;
use warehouse::{LocalWarehouse, RedshiftWarehouse, Warehouse};

/// Opens the warehouse the settings select.
pub async fn connect(settings: &Settings) -> Result<Box<dyn Warehouse>> {
    match settings.warehouse.engine {
        Engine::Redshift => {
            let cluster = settings.cluster.as_ref().ok_or_else(|| {
                common::Error::InvalidInput("[cluster] settings are required for redshift".into())
            })?;
            Ok(Box::new(RedshiftWarehouse::connect(cluster).await?))
        }
        Engine::Local => {
            info!("Using the in-process warehouse");
            Ok(Box::new(LocalWarehouse::new(&settings.s3.region)))
        }
    }
}

/// Drops and recreates every managed table.
pub async fn run_create_tables(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let mut warehouse = connect(&settings).await?;
    Pipeline::new(&settings)
        .create_tables(warehouse.as_mut())
        .await
}

/// Loads staging and fills the star schema into existing tables.
pub async fn run_etl(config_path: &str) -> Result<RunSummary> {
    let settings = Settings::new(config_path)?;
    let mut warehouse = connect(&settings).await?;
    Pipeline::new(&settings).etl(warehouse.as_mut()).await
}

/// Full rebuild: schema reset followed by the load.
pub async fn run_pipeline(config_path: &str) -> Result<RunSummary> {
    let settings = Settings::new(config_path)?;
    let mut warehouse = connect(&settings).await?;
    Pipeline::new(&settings).run(warehouse.as_mut()).await
}
