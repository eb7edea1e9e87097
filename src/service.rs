//! Service entry point: the single scheduling loop of the process.
//!
//! [`BotService::run`] is the only place events are pulled and tasks are
//! spawned — there is no nested event loop and no retry patching anywhere
//! else. Each inbound event is handled in its own tokio task, so a slow
//! download, conversion, or delivery in one chat never stalls processing of
//! unrelated chats. Within one chat the transport's per-chat ordering plus
//! the registry's claim semantics keep the job sequence correct.
//!
//! A background sweep task expires unattended jobs; it is aborted when the
//! update source is exhausted, after all in-flight handlers have drained.

use crate::config::BotConfig;
use crate::error::Img2AnyError;
use crate::registry::SessionRegistry;
use crate::router::Router;
use crate::store::ArtifactStore;
use crate::transport::{DeliverySink, UpdateSource};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// The wired-up conversion service.
///
/// Construction assembles the component set once — config, registry, store,
/// router — all passed explicitly, no ambient globals.
pub struct BotService {
    router: Arc<Router>,
    config: BotConfig,
}

impl BotService {
    /// Assemble a service around a delivery sink.
    pub fn new(config: BotConfig, sink: Arc<dyn DeliverySink>) -> Result<Self, Img2AnyError> {
        let registry = Arc::new(SessionRegistry::new());
        let store = Arc::new(ArtifactStore::new()?);
        let router = Arc::new(Router::new(config.clone(), registry, store, sink));
        Ok(Self { router, config })
    }

    /// The router, for tests and embedders that feed events directly.
    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    /// Consume the update source until it is exhausted.
    ///
    /// Returns once the source yields `None` *and* every in-flight event
    /// handler has finished, so no job is abandoned mid-sequence.
    pub async fn run(&self, mut source: impl UpdateSource) {
        info!("conversion service started");

        let sweeper = self.spawn_sweep();
        let mut in_flight: JoinSet<()> = JoinSet::new();

        while let Some(event) = source.next_event().await {
            debug!(chat = %event.chat(), "event received");
            let router = Arc::clone(&self.router);
            in_flight.spawn(async move {
                router.dispatch(event).await;
            });

            // Opportunistically reap finished handlers to keep the set small.
            while in_flight.try_join_next().is_some() {}
        }

        debug!("update source exhausted, draining in-flight handlers");
        while in_flight.join_next().await.is_some() {}

        sweeper.abort();
        info!("conversion service stopped");
    }

    /// Periodic expiry sweep for unattended jobs.
    fn spawn_sweep(&self) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(&self.router);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so a service that starts
            // and stops quickly does not race its own intake.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                router.sweep_expired().await;
            }
        })
    }
}
