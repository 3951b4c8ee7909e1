//! Socket.IO broadcast channel for viewers.
//!
//! A viewer receives `initialLocations` once on connect, then `locationUpdate`
//! and `locationRemove` relayed from the hub. Viewers never emit anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use socketioxide::extract::SocketRef;
use socketioxide::layer::SocketIoLayer;
use socketioxide::SocketIo;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::hub::{Hub, LocationEvent};
use crate::models::RemovedVehicle;
use crate::store::LocationStore;
use crate::web::state::AppState;

pub const INITIAL_LOCATIONS: &str = "initialLocations";
pub const LOCATION_UPDATE: &str = "locationUpdate";
pub const LOCATION_REMOVE: &str = "locationRemove";

/// Number of currently connected viewers.
#[derive(Debug, Clone, Default)]
pub struct ViewerCount(Arc<AtomicUsize>);

impl ViewerCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn connected(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn disconnected(&self) -> usize {
        let previous = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }
}

/// Builds the Socket.IO layer and registers the default namespace.
pub fn layer(state: &AppState) -> (SocketIoLayer, SocketIo) {
    let (layer, io) = SocketIo::new_layer();
    let store = state.store.clone();
    let viewers = state.viewers.clone();
    io.ns("/", move |socket: SocketRef| {
        let store = store.clone();
        let viewers = viewers.clone();
        async move { on_connect(socket, store, viewers).await }
    });
    (layer, io)
}

async fn on_connect(socket: SocketRef, store: LocationStore, viewers: ViewerCount) {
    let n_connected = viewers.connected();
    info!(sid = %socket.id, n_connected, "viewer connected");
    socket.on_disconnect(move |socket: SocketRef| {
        let n_connected = viewers.disconnected();
        info!(sid = %socket.id, n_connected, "viewer disconnected");
    });

    let snapshot = store.snapshot().await;
    if let Err(error) = socket.emit(INITIAL_LOCATIONS, &snapshot) {
        warn!(sid = %socket.id, %error, "failed to send the initial locations");
    }
}

/// Forwards hub events to every connected viewer.
pub fn spawn_relay(io: SocketIo, hub: &Hub) -> JoinHandle<()> {
    let mut subscription = hub.subscribe("realtime");
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let result = match &event {
                LocationEvent::Updated(fix) => io.emit(LOCATION_UPDATE, fix).await,
                LocationEvent::Removed { jeep_id } => {
                    let payload = RemovedVehicle {
                        jeep_id: jeep_id.clone(),
                    };
                    io.emit(LOCATION_REMOVE, &payload).await
                }
            };
            if let Err(error) = result {
                warn!(%error, "failed to broadcast a location event");
            }
        }
    })
}
