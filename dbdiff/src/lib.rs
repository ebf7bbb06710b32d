//! dbdiff: compare a reference database with a replica
//!
//! dbdiff checks, object by object, how far a target database agrees with a
//! source database: from table and sequence names, through row counts,
//! column definitions and primary keys, down to the content of every row.

pub mod catalog;
pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod report;
pub mod utils;


use futures::stream::BoxStream;

// Re-export main types for easier access
pub use catalog::{CatalogProvider, DatabaseCatalog};
pub use compare::{ComparisonEngine, ComparisonEvent, ComparisonLevel, ComparisonOutcome};
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use error::{Error, Result};

/// Initialize dbdiff with the specified configuration file
pub async fn init(config_path: &str) -> Result<DbDiffClient> {
    let config = config::load_from_file(config_path)?;
    DbDiffClient::new(config).await
}

/// The main client for comparing two databases
pub struct DbDiffClient {
    config: Config,
    source_connection: DatabaseConnection,
    target_connection: DatabaseConnection,
    engine: ComparisonEngine,
}

impl DbDiffClient {
    /// Connect to both databases described by the configuration
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let source_connection = DatabaseConnection::connect(&config.source).await?;
        let target_connection = DatabaseConnection::connect(&config.target).await?;

        let source = source_connection.catalog(config.source.schema.as_deref());
        let target = target_connection.catalog(config.target.schema.as_deref());
        let engine = ComparisonEngine::new(source, target, config.compare.clone());

        Ok(Self {
            config,
            source_connection,
            target_connection,
            engine,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stream the comparison results of every object
    pub async fn compare(&self) -> Result<BoxStream<'static, ComparisonEvent>> {
        self.engine.run().await
    }

    /// Close both connection pools
    pub async fn close(&self) {
        self.source_connection.close().await;
        self.target_connection.close().await;
    }
}
