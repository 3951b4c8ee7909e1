//! Viewer state machine: what a connected map client shows and when it polls.
//!
//! The machine is pure; [`client`] feeds it Socket.IO and poll events and
//! carries out the returned [`PollCommand`]s.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::geo::{nearest_stop, UNKNOWN_STOP};
use crate::models::Fix;
use crate::stops::StopSet;

pub mod client;

pub const POLL_INTERVAL: StdDuration = StdDuration::from_secs(5);

pub const PLACEHOLDER: &str = "Waiting for GPS data...";
pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_TRACKING: &str = "Tracking Active";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const STATUS_POLLING: &str = "Polling...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Live,
    Polling,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Connected,
    InitialLocations(HashMap<String, Fix>),
    LocationUpdate(Fix),
    LocationRemove { jeep_id: String },
    Disconnected,
    Polled(Vec<Fix>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub fix: Fix,

    /// Reported stop, or the locally computed one when the server did not know.
    pub nearest_stop: String,
}

pub struct Viewer {
    stops: Arc<StopSet>,
    state: ConnectionState,
    status: &'static str,
    markers: BTreeMap<String, Marker>,
    is_polling: bool,
}

impl Viewer {
    pub fn new(stops: Arc<StopSet>) -> Self {
        Self {
            stops,
            state: ConnectionState::Connecting,
            status: PLACEHOLDER,
            markers: BTreeMap::new(),
            is_polling: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> &'static str {
        self.status
    }

    pub fn markers(&self) -> &BTreeMap<String, Marker> {
        &self.markers
    }

    pub fn is_polling(&self) -> bool {
        self.is_polling
    }

    /// Applies the event and tells the driver whether to start or stop the poll loop.
    pub fn handle(&mut self, event: ViewerEvent) -> Option<PollCommand> {
        match event {
            ViewerEvent::Connected => {
                self.status = if self.markers.is_empty() { STATUS_CONNECTED } else { STATUS_TRACKING };
                self.go_live()
            }
            ViewerEvent::InitialLocations(locations) => {
                self.markers.clear();
                for fix in locations.into_values() {
                    self.place(fix);
                }
                self.refresh_status();
                self.go_live()
            }
            ViewerEvent::LocationUpdate(fix) => {
                self.place(fix);
                self.status = STATUS_TRACKING;
                self.go_live()
            }
            ViewerEvent::LocationRemove { jeep_id } => {
                self.markers.remove(&jeep_id);
                self.refresh_status();
                self.go_live()
            }
            ViewerEvent::Disconnected => {
                self.state = ConnectionState::Polling;
                if self.is_polling {
                    self.status = STATUS_DISCONNECTED;
                    None
                } else {
                    self.is_polling = true;
                    self.status = STATUS_POLLING;
                    Some(PollCommand::Start)
                }
            }
            ViewerEvent::Polled(fixes) => {
                // A poll that completes after the channel came back is stale.
                if self.state == ConnectionState::Polling {
                    self.markers.clear();
                    for fix in fixes {
                        self.place(fix);
                    }
                    self.refresh_status();
                }
                None
            }
        }
    }

    fn go_live(&mut self) -> Option<PollCommand> {
        self.state = ConnectionState::Live;
        if self.is_polling {
            self.is_polling = false;
            Some(PollCommand::Stop)
        } else {
            None
        }
    }

    fn refresh_status(&mut self) {
        self.status = if self.markers.is_empty() { PLACEHOLDER } else { STATUS_TRACKING };
    }

    fn place(&mut self, fix: Fix) {
        let nearest_stop = if fix.nearest_stop.is_empty() || fix.nearest_stop == UNKNOWN_STOP {
            nearest_stop(fix.latitude, fix.longitude, &self.stops).to_string()
        } else {
            fix.nearest_stop.clone()
        };
        self.markers.insert(fix.jeep_id.clone(), Marker { fix, nearest_stop });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(jeep_id: &str, nearest_stop: &str) -> Fix {
        Fix {
            jeep_id: jeep_id.to_string(),
            latitude: 14.640081,
            longitude: 121.078496,
            timestamp: 1,
            nearest_stop: nearest_stop.to_string(),
        }
    }

    fn viewer() -> Viewer {
        Viewer::new(Arc::new(StopSet::default()))
    }

    #[test]
    fn starts_connecting_with_placeholder() {
        let viewer = viewer();
        assert_eq!(viewer.state(), ConnectionState::Connecting);
        assert_eq!(viewer.status(), PLACEHOLDER);
        assert!(viewer.markers().is_empty());
    }

    #[test]
    fn snapshot_goes_live() {
        let mut viewer = viewer();
        let snapshot = HashMap::from([("J1".to_string(), fix("J1", "Arete E-Jeep Station"))]);
        assert_eq!(viewer.handle(ViewerEvent::InitialLocations(snapshot)), None);
        assert_eq!(viewer.state(), ConnectionState::Live);
        assert_eq!(viewer.status(), STATUS_TRACKING);
        assert_eq!(viewer.markers()["J1"].nearest_stop, "Arete E-Jeep Station");
    }

    #[test]
    fn empty_snapshot_keeps_placeholder() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::Connected);
        viewer.handle(ViewerEvent::InitialLocations(HashMap::new()));
        assert_eq!(viewer.state(), ConnectionState::Live);
        assert_eq!(viewer.status(), PLACEHOLDER);
    }

    #[test]
    fn unknown_stop_is_computed_locally() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::LocationUpdate(fix("J1", UNKNOWN_STOP)));
        assert_eq!(viewer.markers()["J1"].nearest_stop, "Xavier Hall E-Jeep Station");
    }

    #[test]
    fn removing_the_last_vehicle_resets_placeholder() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::LocationUpdate(fix("J1", "A")));
        viewer.handle(ViewerEvent::LocationUpdate(fix("J2", "B")));
        viewer.handle(ViewerEvent::LocationRemove { jeep_id: "J1".into() });
        assert_eq!(viewer.status(), STATUS_TRACKING);
        viewer.handle(ViewerEvent::LocationRemove { jeep_id: "J2".into() });
        assert_eq!(viewer.status(), PLACEHOLDER);
        assert!(viewer.markers().is_empty());
    }

    #[test]
    fn disconnect_starts_polling_once() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::Connected);
        assert_eq!(viewer.handle(ViewerEvent::Disconnected), Some(PollCommand::Start));
        assert_eq!(viewer.state(), ConnectionState::Polling);
        assert_eq!(viewer.status(), STATUS_POLLING);
        assert!(viewer.is_polling());
        assert_eq!(viewer.handle(ViewerEvent::Disconnected), None);
        assert_eq!(viewer.status(), STATUS_DISCONNECTED);
    }

    #[test]
    fn polled_fixes_replace_markers_while_polling() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::LocationUpdate(fix("gone", "A")));
        viewer.handle(ViewerEvent::Disconnected);
        assert_eq!(viewer.handle(ViewerEvent::Polled(vec![fix("J1", "A")])), None);
        assert_eq!(viewer.markers().keys().collect::<Vec<_>>(), ["J1"]);
        assert_eq!(viewer.markers()["J1"].fix, fix("J1", "A"));
        assert_eq!(viewer.state(), ConnectionState::Polling);
        assert_eq!(viewer.status(), STATUS_TRACKING);

        viewer.handle(ViewerEvent::Polled(Vec::new()));
        assert!(viewer.markers().is_empty());
        assert_eq!(viewer.status(), PLACEHOLDER);
    }

    #[test]
    fn next_push_event_stops_polling() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::Disconnected);
        assert_eq!(viewer.handle(ViewerEvent::LocationUpdate(fix("J1", "A"))), Some(PollCommand::Stop));
        assert_eq!(viewer.state(), ConnectionState::Live);
        assert!(!viewer.is_polling());
        assert_eq!(viewer.handle(ViewerEvent::LocationUpdate(fix("J1", "B"))), None);
    }

    #[test]
    fn late_poll_results_are_ignored_when_live() {
        let mut viewer = viewer();
        viewer.handle(ViewerEvent::Connected);
        viewer.handle(ViewerEvent::Polled(vec![fix("J1", "A")]));
        assert!(viewer.markers().is_empty());
    }
}
