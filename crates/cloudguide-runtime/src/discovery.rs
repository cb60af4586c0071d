//! In-process service discovery.
//!
//! Units register under a service key; subscribers receive the full set of
//! instances immediately and again on every membership change.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::BackendCommand;

/// Service key the answering backends register under.
pub const ANSWERING_SERVICE: &str = "llm-service";

/// A discovered answering backend.
#[derive(Clone, Debug)]
pub struct BackendRef {
    pub id: String,
    pub tx: mpsc::Sender<BackendCommand>,
}

/// Snapshot of all instances of one service, ordered by id.
pub type Listing = Vec<BackendRef>;

#[derive(Default)]
struct ServiceEntry {
    instances: BTreeMap<String, BackendRef>,
    subscribers: Vec<mpsc::UnboundedSender<Listing>>,
}

impl ServiceEntry {
    fn snapshot(&self) -> Listing {
        self.instances.values().cloned().collect()
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}

/// Cloneable registry shared by every unit in the process.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<Mutex<HashMap<String, ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an instance and notify subscribers.
    pub fn register(&self, service: &str, instance: BackendRef) {
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_default();
        tracing::info!(service, id = %instance.id, "Service registered");
        entry.instances.insert(instance.id.clone(), instance);
        entry.notify();
    }

    /// Remove an instance. Subscribers are only notified if it was present.
    pub fn deregister(&self, service: &str, id: &str) {
        let mut services = self.services.lock();
        if let Some(entry) = services.get_mut(service) {
            if entry.instances.remove(id).is_some() {
                tracing::info!(service, id, "Service deregistered");
                entry.notify();
            }
        }
    }

    /// Listen for membership changes. The current listing is delivered first.
    pub fn subscribe(&self, service: &str) -> mpsc::UnboundedReceiver<Listing> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_default();
        if tx.send(entry.snapshot()).is_ok() {
            entry.subscribers.push(tx);
        }
        rx
    }

    pub fn instances(&self, service: &str) -> Listing {
        self.services
            .lock()
            .get(service)
            .map(ServiceEntry::snapshot)
            .unwrap_or_default()
    }
}
