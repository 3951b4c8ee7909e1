use std::sync::Arc;

use crate::cache::RedisRestCache;
use crate::hub::Hub;
use crate::stops::StopSet;
use crate::store::LocationStore;
use crate::web::realtime::ViewerCount;

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: LocationStore,
    pub hub: Hub,
    pub stops: Arc<StopSet>,
    pub viewers: ViewerCount,

    /// Preferred source for `GET /positions` when configured.
    pub cache: Option<RedisRestCache>,

    /// Only reported by the health check: writes go through the hub.
    pub database_enabled: bool,
}

impl AppState {
    pub fn new(stops: StopSet) -> Self {
        Self {
            store: LocationStore::new(),
            hub: Hub::default(),
            stops: Arc::new(stops),
            viewers: ViewerCount::default(),
            cache: None,
            database_enabled: false,
        }
    }

    pub fn with_cache(mut self, cache: Option<RedisRestCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_database(mut self, enabled: bool) -> Self {
        self.database_enabled = enabled;
        self
    }
}
