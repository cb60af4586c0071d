//! The answering gateway unit.
//!
//! Tracks the current answering backend through a discovery subscription and
//! forwards requests to it. While no backend is known, requests wait in a
//! bounded backlog that is flushed in arrival order once one appears.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::backend::BackendCommand;
use crate::discovery::{BackendRef, Listing, ServiceRegistry, ANSWERING_SERVICE};
use crate::prompts::ALLOW;
use crate::{await_reply, RuntimeError, MAILBOX_CAPACITY};

pub const QUEUE_FULL: &str = "LLM unavailable (queue full)";
pub const BACKEND_UNREACHABLE: &str = "LLM unavailable (backend unreachable)";

/// A request waiting for, or on its way to, a backend.
#[derive(Debug)]
enum Pending {
    Ask {
        prompt: String,
        reply: oneshot::Sender<String>,
    },
    Classify {
        text: String,
        reply: oneshot::Sender<String>,
    },
}

impl Pending {
    fn into_command(self) -> BackendCommand {
        match self {
            Pending::Ask { prompt, reply } => BackendCommand::Ask { prompt, reply },
            Pending::Classify { text, reply } => BackendCommand::Classify { text, reply },
        }
    }

    /// Answer without a backend. Classification fails open.
    fn reject(self, reason: &str) {
        match self {
            Pending::Ask { reply, .. } => {
                let _ = reply.send(reason.to_string());
            }
            Pending::Classify { reply, .. } => {
                let _ = reply.send(ALLOW.to_string());
            }
        }
    }
}

/// Backlog and backend state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStatus {
    pub backend: Option<String>,
    pub backlog: usize,
}

enum GatewayCommand {
    Forward(Pending),
    Status(oneshot::Sender<GatewayStatus>),
}

/// Cloneable handle to the gateway unit.
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<GatewayCommand>,
}

impl GatewayHandle {
    async fn forward(&self, pending: Pending) -> Result<(), RuntimeError> {
        self.tx
            .send(GatewayCommand::Forward(pending))
            .await
            .map_err(|_| RuntimeError::MailboxClosed("gateway"))
    }

    /// Generate an answer, waiting at most `timeout` for it.
    pub async fn ask(&self, prompt: impl Into<String>, timeout: Duration) -> Result<String, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.forward(Pending::Ask {
            prompt: prompt.into(),
            reply,
        })
        .await?;
        await_reply("gateway", timeout, rx).await
    }

    /// Classify a query as `ALLOW` or `DECLINE`, waiting at most `timeout`.
    pub async fn classify(&self, text: impl Into<String>, timeout: Duration) -> Result<String, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.forward(Pending::Classify {
            text: text.into(),
            reply,
        })
        .await?;
        await_reply("gateway", timeout, rx).await
    }

    pub async fn status(&self) -> Result<GatewayStatus, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(GatewayCommand::Status(reply))
            .await
            .map_err(|_| RuntimeError::MailboxClosed("gateway"))?;
        rx.await.map_err(|_| RuntimeError::MailboxClosed("gateway"))
    }
}

/// Spawn the gateway and subscribe it to answering-backend discovery.
pub fn spawn_gateway(registry: &ServiceRegistry, backlog_capacity: usize) -> GatewayHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let discovery = registry.subscribe(ANSWERING_SERVICE);
    let gateway = Gateway {
        current: None,
        backlog: VecDeque::with_capacity(backlog_capacity),
        capacity: backlog_capacity,
    };
    tokio::spawn(gateway.run(rx, discovery));
    GatewayHandle { tx }
}

struct Gateway {
    current: Option<BackendRef>,
    backlog: VecDeque<Pending>,
    capacity: usize,
}

impl Gateway {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<GatewayCommand>,
        mut discovery: mpsc::UnboundedReceiver<Listing>,
    ) {
        let mut discovery_open = true;
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(GatewayCommand::Forward(pending)) => self.submit(pending),
                    Some(GatewayCommand::Status(reply)) => {
                        let _ = reply.send(GatewayStatus {
                            backend: self.current.as_ref().map(|b| b.id.clone()),
                            backlog: self.backlog.len(),
                        });
                    }
                    None => break,
                },
                listing = discovery.recv(), if discovery_open => match listing {
                    Some(listing) => self.on_listing(listing),
                    None => discovery_open = false,
                },
            }
        }

        for pending in self.backlog.drain(..) {
            pending.reject(BACKEND_UNREACHABLE);
        }
        tracing::debug!("Gateway stopped");
    }

    fn submit(&mut self, pending: Pending) {
        if self.current.is_some() {
            self.send_to_backend(pending);
        } else if self.backlog.len() < self.capacity {
            self.backlog.push_back(pending);
            tracing::info!(backlog = self.backlog.len(), "No backend yet, buffering");
        } else {
            tracing::warn!(capacity = self.capacity, "Backlog full, rejecting");
            pending.reject(QUEUE_FULL);
        }
    }

    fn send_to_backend(&self, pending: Pending) {
        let Some(backend) = &self.current else {
            pending.reject(BACKEND_UNREACHABLE);
            return;
        };

        if let Err(e) = backend.tx.try_send(pending.into_command()) {
            tracing::warn!(backend = %backend.id, "Backend mailbox unavailable");
            answer_unreachable(e.into_inner());
        }
    }

    fn on_listing(&mut self, listing: Listing) {
        let was_empty = self.current.is_none();
        self.current = listing.into_iter().next();

        match &self.current {
            Some(backend) => {
                tracing::info!(backend = %backend.id, "Answering backend discovered");
                if was_empty && !self.backlog.is_empty() {
                    tracing::info!(count = self.backlog.len(), "Flushing backlog");
                    spawn_flush(backend, std::mem::take(&mut self.backlog));
                }
            }
            None => tracing::info!("No answering backend available"),
        }
    }
}

/// Deliver a drained backlog in order, waiting for room in the backend
/// mailbox rather than failing when it is momentarily full.
fn spawn_flush(backend: &BackendRef, backlog: VecDeque<Pending>) {
    let tx = backend.tx.clone();
    let id = backend.id.clone();
    tokio::spawn(async move {
        for pending in backlog {
            if let Err(mpsc::error::SendError(command)) = tx.send(pending.into_command()).await {
                tracing::warn!(backend = %id, "Backend went away during flush");
                answer_unreachable(command);
            }
        }
    });
}

fn answer_unreachable(command: BackendCommand) {
    match command {
        BackendCommand::Ask { reply, .. } => {
            let _ = reply.send(BACKEND_UNREACHABLE.to_string());
        }
        BackendCommand::Classify { reply, .. } => {
            let _ = reply.send(ALLOW.to_string());
        }
        BackendCommand::Shutdown => {}
    }
}
