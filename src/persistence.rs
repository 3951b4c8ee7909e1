//! Best-effort persistence of location events.
//!
//! Cache writes are awaited in event order so that the cached hash always ends
//! up holding the latest fix. Database inserts only append, so each runs on its
//! own task. Failures are logged.

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::RedisRestCache;
use crate::database::Database;
use crate::hub::{Hub, LocationEvent};

/// Returns `None` when neither integration is configured.
pub fn spawn(hub: &Hub, database: Option<Database>, cache: Option<RedisRestCache>) -> Option<JoinHandle<()>> {
    if database.is_none() && cache.is_none() {
        return None;
    }
    info!(db = database.is_some(), redis = cache.is_some(), "persistence enabled");

    let mut subscription = hub.subscribe("persistence");
    Some(tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            match event {
                LocationEvent::Updated(fix) => {
                    if let Some(database) = database.clone() {
                        let fix = fix.clone();
                        tokio::spawn(async move {
                            if let Err(error) = database.insert_position(&fix).await {
                                error!("{:#}", error);
                            }
                        });
                    }
                    if let Some(cache) = &cache {
                        if let Err(error) = cache.store_position(&fix).await {
                            error!("failed to cache the position: {:#}", error);
                        }
                    }
                }
                LocationEvent::Removed { jeep_id } => {
                    if let Some(cache) = &cache {
                        if let Err(error) = cache.forget(&jeep_id).await {
                            warn!(%jeep_id, "failed to drop the cached position: {:#}", error);
                        }
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_to_spawn_without_integrations() {
        assert!(spawn(&Hub::default(), None, None).is_none());
    }
}
