//! Store connection.
//!
//! Builds the engine facade every command works through: a [`RestExecutor`]
//! for the configured store, wrapped in a [`DatabaseManager`] bound to
//! `store.database`.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;
use yams_core::DatabaseManager;

use crate::config::Config;
use crate::rest::RestExecutor;

pub fn connect(config: &Config) -> Result<DatabaseManager> {
    let executor = RestExecutor::new(&config.store)?;
    debug!(
        url = %config.store.url,
        database = %config.store.database,
        "connecting to store"
    );
    let manager = DatabaseManager::new(Arc::new(executor), &config.store.database)?
        .with_audit(config.crawler.audit);
    Ok(manager)
}
