//! Application state shared across routes

use std::sync::Arc;

use rand::Rng;

use crate::config::Config;
use crate::hub::{Hub, HubConfig, HubGauges, HubHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: HubHandle,
    pub gauges: Arc<HubGauges>,
}

impl AppState {
    /// Build the state and the hub it talks to. The caller spawns the
    /// returned hub task.
    pub fn new(config: Config) -> (Self, Hub) {
        let config = Arc::new(config);

        // Seed the football room's RNG per process; team tie-breaks are
        // deterministic within one run
        let seed: u64 = rand::thread_rng().gen();
        let (hub, handle, gauges) = Hub::new(HubConfig::default(), seed);

        (
            Self {
                config,
                hub: handle,
                gauges,
            },
            hub,
        )
    }
}
