pub mod config;
pub mod relay;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::actors::Actor;
use config::SystemConfig;
use relay::SessionRelay;

/// Shared application state, handed to every actor as `Arc<SystemState>`.
pub struct SystemState {
    pub system: SystemConfig,
    pub relay: SessionRelay,
    actors: RwLock<HashMap<String, (Box<dyn Actor>, Arc<AtomicBool>)>>,
}

impl SystemState {
    pub fn new(system: SystemConfig) -> Self {
        let relay = SessionRelay::new(&system.snapshot().relay);
        Self {
            system,
            relay,
            actors: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self::new(SystemConfig::new(config_path))
    }

    // ----- Actor registry -----

    pub fn register_actor(&self, id: String, actor: Box<dyn Actor>, shutdown: Arc<AtomicBool>) {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (actor, shutdown));
    }

    pub fn actor_ids(&self) -> Vec<String> {
        self.actors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Raise the actor's shutdown flag, then call `stop()`.
    pub fn stop_actor(&self, id: &str) {
        let guard = self.actors.read().unwrap_or_else(|e| e.into_inner());
        if let Some((actor, shutdown)) = guard.get(id) {
            shutdown.store(true, Ordering::Relaxed);
            actor.stop();
        }
    }
}
