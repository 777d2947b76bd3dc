use std::sync::Arc;

use crate::config::BootConfig;
use crate::core::orchestrator::Boot;
use crate::core::shared::Shared;
use crate::events::EventBus;
use crate::sink::{Sink, TracingSink};
use crate::store::Store;

/// Builder for a [`Boot`] with custom facilities.
///
/// Defaults: [`TracingSink`], a fresh [`Store`], no [`EventBus`].
pub struct BootBuilder {
    cfg: BootConfig,
    sink: Arc<dyn Sink>,
    store: Option<Arc<Store>>,
    events: Option<Arc<EventBus>>,
}

impl BootBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BootConfig) -> Self {
        Self {
            cfg,
            sink: Arc::new(TracingSink),
            store: None,
            events: None,
        }
    }

    /// Sets the sink every orchestrator and unit line is written to.
    pub fn with_sink(mut self, sink: impl Sink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Shares an existing store with the units.
    pub fn with_store(mut self, store: Arc<Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Makes an event bus reachable through [`RunContext::events`](crate::RunContext::events).
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Boot {
        let store = self.store.unwrap_or_default();
        Boot::from_parts(self.cfg, Shared::new(self.sink, store, self.events))
    }
}
