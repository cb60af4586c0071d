//! The pricing unit: cache lookup, provider dispatch, cache fill.
//!
//! Fetches run as spawned tasks and report back through the unit's own
//! mailbox, so the cache is only written by the unit loop.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use cloudguide_core::{PricingQuery, PricingResult};

use super::PricingProvider;
use crate::cache::PricingCache;
use crate::{RuntimeError, MAILBOX_CAPACITY};

enum PricingCommand {
    Lookup {
        query: PricingQuery,
        reply: oneshot::Sender<PricingResult>,
    },
    Fetched {
        query: PricingQuery,
        result: PricingResult,
        reply: oneshot::Sender<PricingResult>,
    },
}

/// Cloneable handle to the pricing unit.
#[derive(Clone)]
pub struct PricingHandle {
    tx: mpsc::Sender<PricingCommand>,
}

impl PricingHandle {
    /// Look up a price. Provider failures come back as a result without a
    /// quote; the error case only covers a dead unit.
    pub async fn lookup(&self, query: PricingQuery) -> Result<PricingResult, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PricingCommand::Lookup { query, reply })
            .await
            .map_err(|_| RuntimeError::MailboxClosed("pricing"))?;
        rx.await.map_err(|_| RuntimeError::MailboxClosed("pricing"))
    }
}

pub fn spawn_pricing(
    cache: Arc<PricingCache>,
    providers: Vec<Arc<dyn PricingProvider>>,
) -> PricingHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let unit = PricingUnit {
        cache,
        providers,
        mailbox: tx.downgrade(),
    };
    tokio::spawn(unit.run(rx));
    PricingHandle { tx }
}

struct PricingUnit {
    cache: Arc<PricingCache>,
    providers: Vec<Arc<dyn PricingProvider>>,
    mailbox: mpsc::WeakSender<PricingCommand>,
}

impl PricingUnit {
    async fn run(self, mut rx: mpsc::Receiver<PricingCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                PricingCommand::Lookup { query, reply } => self.lookup(query, reply).await,
                PricingCommand::Fetched {
                    query,
                    result,
                    reply,
                } => {
                    if self.cache.insert(&query, result.clone()).await {
                        tracing::debug!(key = %query.cache_key(), "Pricing cached");
                    }
                    tracing::info!(
                        provider = %query.provider,
                        found = result.has_quote(),
                        "Pricing done"
                    );
                    let _ = reply.send(result);
                }
            }
        }
        tracing::debug!("Pricing unit stopped");
    }

    async fn lookup(&self, query: PricingQuery, reply: oneshot::Sender<PricingResult>) {
        if let Some(cached) = self.cache.get(&query).await {
            tracing::info!(provider = %query.provider, fetched_at = %cached.fetched_at, "Pricing cache hit");
            let _ = reply.send(cached.result);
            return;
        }

        let provider = match self.providers.iter().find(|p| p.supports(&query.provider)) {
            Some(provider) => provider.clone(),
            None => {
                tracing::info!(provider = %query.provider, "Unsupported pricing provider");
                let _ = reply.send(PricingResult::not_found("unsupported provider"));
                return;
            }
        };

        tracing::info!(
            provider = %query.provider,
            service = %query.service_name,
            region = %query.region,
            sku = %query.sku_contains,
            "Pricing fetch"
        );

        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = provider.fetch(&query).await;
            match mailbox.upgrade() {
                Some(tx) => {
                    let fetched = PricingCommand::Fetched {
                        query,
                        result,
                        reply,
                    };
                    if let Err(mpsc::error::SendError(PricingCommand::Fetched { result, reply, .. })) =
                        tx.send(fetched).await
                    {
                        let _ = reply.send(result);
                    }
                }
                None => {
                    let _ = reply.send(result);
                }
            }
        });
    }
}
