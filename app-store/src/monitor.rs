// app-store/src/monitor.rs
use actix::{Actor, AsyncContext, Context};
use std::sync::Arc;
use std::time::Duration;

use crate::store::Store;

/// Repackages the store whenever its sources change
pub struct SourceMonitor {
    store: Arc<Store>,
    interval: Duration,
}

impl SourceMonitor {
    pub fn new(store: Arc<Store>, interval: Duration) -> Self {
        Self { store, interval }
    }

    fn pass(&self) {
        let store = self.store.clone();
        actix::spawn(async move {
            match actix_web::web::block(move || store.reload_if_changed()).await {
                Ok(Ok(_)) => {},
                Ok(Err(e)) => tracing::error!("- ERROR: {}", e),
                Err(e) => tracing::error!("- ERROR: monitor pass did not run: {}", e),
            }
        });
    }
}

impl Actor for SourceMonitor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Starting source monitor [{}].", self.store.source_dir().display());
        ctx.run_interval(self.interval, |act, _ctx| act.pass());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Stopping source monitor.");
    }
}
