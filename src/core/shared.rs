//! State shared by the orchestrator and every run context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::daemon::DaemonStatus;
use crate::core::report::UnitReport;
use crate::core::signal::SignalRegistry;
use crate::events::EventBus;
use crate::sink::{Sink, boot_line};
use crate::store::Store;

pub(crate) struct Shared {
    pub(crate) sink: RwLock<Arc<dyn Sink>>,
    pub(crate) signals: SignalRegistry,
    pub(crate) store: Arc<Store>,
    pub(crate) events: Option<Arc<EventBus>>,
    /// Parent of every unit scope; cancelled when `start()` fails.
    pub(crate) root: CancellationToken,
    pub(crate) reports: Mutex<Vec<UnitReport>>,
    pub(crate) daemons: Mutex<HashMap<String, DaemonStatus>>,
}

impl Shared {
    pub(crate) fn new(
        sink: Arc<dyn Sink>,
        store: Arc<Store>,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            sink: RwLock::new(sink),
            signals: SignalRegistry::new(),
            store,
            events,
            root: CancellationToken::new(),
            reports: Mutex::new(Vec::new()),
            daemons: Mutex::new(HashMap::new()),
        }
    }

    /// Writes `"[BOOT] msg"` through the sink.
    pub(crate) fn printf(&self, msg: impl fmt::Display) {
        let sink = self.sink.read().clone();
        sink.write_line(&boot_line(msg));
    }

    /// Writes raw lines (banner) through the sink.
    pub(crate) fn write_raw(&self, line: &str) {
        let sink = self.sink.read().clone();
        sink.write_line(line);
    }

    pub(crate) fn record(&self, report: UnitReport) {
        self.reports.lock().push(report);
    }

    pub(crate) fn take_reports(&self) -> Vec<UnitReport> {
        std::mem::take(&mut *self.reports.lock())
    }

    pub(crate) fn update_daemon(&self, name: &str, f: impl FnOnce(&mut DaemonStatus)) {
        let mut daemons = self.daemons.lock();
        f(daemons.entry(name.to_string()).or_default());
    }
}
