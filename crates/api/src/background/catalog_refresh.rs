//! Periodic reload of the field catalog.
//!
//! Mutations already reload the catalog in-process; the interval picks up
//! changes made by other processes sharing the database.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::catalog::FieldCatalog;

/// Refresh `catalog` every `interval_secs` until `cancel` fires.
pub async fn run(
    pool: PgPool,
    catalog: Arc<FieldCatalog>,
    interval_secs: u64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs, "Catalog refresh job started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Catalog refresh job stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = catalog.refresh(&pool).await {
                    tracing::error!(error = %e, "Catalog refresh failed");
                }
            }
        }
    }
}
