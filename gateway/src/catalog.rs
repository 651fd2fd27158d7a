// gateway/src/catalog.rs
use actix::{Actor, AsyncContext, Context, Handler};
use common::Sku;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::Shutdown;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog responded with status {0}")]
    Status(u16),

    #[error("a catalog fetch is already in flight")]
    InFlight,
}

/// In-memory snapshot of the remote app store catalog.
///
/// The snapshot is only ever replaced whole, so readers see either the
/// previous or the next catalog in full.
pub struct CatalogCache {
    catalog_url: String,
    http: reqwest::Client,
    timeout: Duration,
    snapshot: RwLock<Arc<Vec<Sku>>>,
    fetching: AtomicBool,
}

impl CatalogCache {
    pub fn new(store_url: &str, http: reqwest::Client) -> Self {
        Self {
            catalog_url: format!("{}/catalog", store_url.trim_end_matches('/')),
            http,
            timeout: DEFAULT_FETCH_TIMEOUT,
            snapshot: RwLock::new(Arc::new(Vec::new())),
            fetching: AtomicBool::new(false),
        }
    }

    /// Bound on a whole fetch, so a silent store cannot pin the cache in flight
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GET the remote catalog and swap it in. On failure the previous
    /// snapshot stays in place.
    pub async fn fetch(&self) -> Result<usize, CatalogError> {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CatalogError::InFlight);
        }
        let _idle = FetchGuard(&self.fetching);

        let response = self.http.get(&self.catalog_url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let skus: Vec<Sku> = response.json().await?;
        let count = skus.len();
        self.replace(skus);
        Ok(count)
    }

    pub fn replace(&self, skus: Vec<Sku>) {
        let next = Arc::new(skus);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn snapshot(&self) -> Arc<Vec<Sku>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn find(&self, xrn: &str) -> Option<Sku> {
        self.snapshot().iter().find(|sku| sku.xrn == xrn).cloned()
    }

    /// Catalog for browsing clients, with install internals removed
    pub fn list(&self) -> Vec<Sku> {
        self.snapshot().iter().map(Sku::redacted).collect()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }
}

// Returns the cache to Idle however the fetch ends
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls the catalog once on start and then on a fixed interval
pub struct CatalogPoller {
    cache: Arc<CatalogCache>,
    interval: Duration,
}

impl CatalogPoller {
    pub fn new(cache: Arc<CatalogCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    fn poll(&self) {
        let cache = self.cache.clone();
        actix::spawn(async move {
            match cache.fetch().await {
                Ok(count) => tracing::debug!("Catalog refreshed with {} skus", count),
                Err(CatalogError::InFlight) => tracing::debug!("Catalog fetch still in flight, skipping tick"),
                Err(e) => tracing::warn!("WARNING (store): {}", e),
            }
        });
    }
}

impl Actor for CatalogPoller {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Starting appstore fetcher [{}].", self.cache.catalog_url);

        self.poll();
        ctx.run_interval(self.interval, |act, _ctx| act.poll());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Stopping appstore fetcher.");
    }
}

impl Handler<Shutdown> for CatalogPoller {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        use actix::ActorContext;
        ctx.stop();
    }
}
