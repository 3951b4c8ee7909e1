//! Optional removal policy: vehicles silent for too long are dropped and a
//! removal event is published for each of them.

use std::time::Duration as StdDuration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::hub::{Hub, LocationEvent};
use crate::models::now_millis;
use crate::store::LocationStore;

const MAX_PERIOD: StdDuration = StdDuration::from_secs(30);

pub fn spawn(store: LocationStore, hub: Hub, stale_after: StdDuration) -> JoinHandle<()> {
    let period = stale_after.min(MAX_PERIOD).max(StdDuration::from_millis(100));
    info!(
        stale_after = %humantime::format_duration(stale_after),
        period = %humantime::format_duration(period),
        "stale vehicle sweeper enabled",
    );
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&store, &hub, stale_after, now_millis()).await;
        }
    })
}

/// Removes fixes received before `now - stale_after`. Returns the number removed.
///
/// Staleness goes by the server clock: a device with a lagging clock is not
/// dropped right after reporting.
pub async fn sweep(store: &LocationStore, hub: &Hub, stale_after: StdDuration, now: i64) -> usize {
    let cutoff = now.saturating_sub(i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX));
    let removed = store
        .remove_received_before(cutoff, |fix| {
            debug!(jeep_id = %fix.jeep_id, last_seen = %fix.reported_at(), "removing a stale vehicle");
            hub.publish(LocationEvent::Removed {
                jeep_id: fix.jeep_id.clone(),
            });
        })
        .await;
    removed.len()
}
