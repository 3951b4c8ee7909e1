//! Drives a [`Viewer`] from a live server: Socket.IO for pushes, `/positions` while disconnected.

use std::sync::Arc;

use anyhow::Context;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Payload, TransportType};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::models::{Fix, PositionsResponse, RemovedVehicle};
use crate::opts::WatchOpts;
use crate::stops::StopSet;
use crate::viewer::{PollCommand, Viewer, ViewerEvent, POLL_INTERVAL};
use crate::web::realtime::{INITIAL_LOCATIONS, LOCATION_REMOVE, LOCATION_UPDATE};

struct Shared {
    viewer: Mutex<Viewer>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    http: reqwest::Client,
    positions_url: String,
}

/// Follows the server until interrupted.
pub async fn watch(opts: WatchOpts) -> crate::Result {
    let stops = match &opts.stops {
        Some(path) => StopSet::from_csv(path)?,
        None => StopSet::default(),
    };
    let watcher = Watcher::connect(&opts.server, stops).await?;
    tokio::signal::ctrl_c().await?;
    info!("disconnecting…");
    watcher.disconnect().await
}

/// A live connection feeding a [`Viewer`].
pub struct Watcher {
    shared: Arc<Shared>,
    socket: Client,
}

impl Watcher {
    pub async fn connect(server: &str, stops: StopSet) -> crate::Result<Self> {
        let server = server.trim_end_matches('/');
        let shared = Arc::new(Shared {
            viewer: Mutex::new(Viewer::new(Arc::new(stops))),
            poll_task: Mutex::new(None),
            http: reqwest::Client::new(),
            positions_url: format!("{server}/positions"),
        });

        info!(%server, "connecting…");
        let socket = ClientBuilder::new(server)
            .transport_type(TransportType::Websocket)
            .reconnect_on_disconnect(true)
            .on("open", on_event(&shared, |_| Some(ViewerEvent::Connected)))
            .on(
                INITIAL_LOCATIONS,
                on_event(&shared, |payload| decode(payload).map(ViewerEvent::InitialLocations)),
            )
            .on(
                LOCATION_UPDATE,
                on_event(&shared, |payload| decode(payload).map(ViewerEvent::LocationUpdate)),
            )
            .on(
                LOCATION_REMOVE,
                on_event(&shared, |payload| {
                    decode::<RemovedVehicle>(payload).map(|removed| ViewerEvent::LocationRemove {
                        jeep_id: removed.jeep_id,
                    })
                }),
            )
            .on("close", on_event(&shared, |_| Some(ViewerEvent::Disconnected)))
            // A dropped transport surfaces only as an error, and so do failed reconnects.
            .on(
                "error",
                on_event(&shared, |payload| {
                    debug!(?payload, "socket error");
                    Some(ViewerEvent::Disconnected)
                }),
            )
            .connect()
            .await
            .context("failed to connect to the server")?;
        Ok(Self { shared, socket })
    }

    /// Reads the current view.
    pub async fn inspect<T>(&self, f: impl FnOnce(&Viewer) -> T) -> T {
        f(&*self.shared.viewer.lock().await)
    }

    pub async fn disconnect(self) -> crate::Result {
        self.shared.stop_polling().await;
        self.socket.disconnect().await.context("failed to disconnect")?;
        Ok(())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Ok(mut poll_task) = self.shared.poll_task.try_lock() {
            if let Some(poll_task) = poll_task.take() {
                poll_task.abort();
            }
        }
    }
}

fn on_event<F>(
    shared: &Arc<Shared>,
    to_event: F,
) -> impl FnMut(Payload, Client) -> BoxFuture<'static, ()> + Send + Sync + 'static
where
    F: Fn(Payload) -> Option<ViewerEvent> + Send + Sync + 'static,
{
    let shared = Arc::clone(shared);
    move |payload, _socket| {
        let shared = Arc::clone(&shared);
        let event = to_event(payload);
        async move {
            if let Some(event) = event {
                shared.dispatch(event).await;
            }
        }
        .boxed()
    }
}

/// Decodes the first argument of an event.
fn decode<T: DeserializeOwned>(payload: Payload) -> Option<T> {
    match payload {
        Payload::Text(values) => {
            let value = values.into_iter().next()?;
            match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(error) => {
                    debug!(%error, "ignoring a malformed event");
                    None
                }
            }
        }
        _ => None,
    }
}

impl Shared {
    async fn dispatch(self: &Arc<Self>, event: ViewerEvent) {
        match self.apply(event).await {
            Some(PollCommand::Start) => self.start_polling().await,
            Some(PollCommand::Stop) => self.stop_polling().await,
            None => {}
        }
    }

    async fn apply(&self, event: ViewerEvent) -> Option<PollCommand> {
        let mut viewer = self.viewer.lock().await;
        let command = viewer.handle(event);
        render(&viewer);
        command
    }

    async fn start_polling(self: &Arc<Self>) {
        let mut poll_task = self.poll_task.lock().await;
        if poll_task.is_some() {
            return;
        }
        let shared = Arc::clone(self);
        *poll_task = Some(tokio::spawn(async move {
            // The first tick completes immediately.
            let mut ticker = interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                if let Some(items) = shared.poll().await {
                    shared.apply(ViewerEvent::Polled(items)).await;
                }
            }
        }));
    }

    async fn stop_polling(&self) {
        if let Some(poll_task) = self.poll_task.lock().await.take() {
            poll_task.abort();
        }
    }

    /// Failures are silent: the next tick simply tries again.
    async fn poll(&self) -> Option<Vec<Fix>> {
        let response = match self.http.get(&self.positions_url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "poll rejected");
                return None;
            }
            Err(error) => {
                debug!(%error, "poll failed");
                return None;
            }
        };
        match response.json::<PositionsResponse>().await {
            Ok(positions) => Some(positions.items),
            Err(error) => {
                debug!(%error, "malformed poll response");
                None
            }
        }
    }
}

fn render(viewer: &Viewer) {
    info!(state = ?viewer.state(), status = viewer.status(), n_vehicles = viewer.markers().len());
    for (jeep_id, marker) in viewer.markers() {
        let updated_at = marker.fix.reported_at().with_timezone(&chrono::Local).format("%H:%M:%S");
        info!(
            "  {jeep_id}: {:.6}, {:.6} near {} (updated {updated_at})",
            marker.fix.latitude, marker.fix.longitude, marker.nearest_stop,
        );
    }
}
