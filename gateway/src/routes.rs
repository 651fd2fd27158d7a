// gateway/src/routes.rs
use actix::{Actor, ActorContext, AsyncContext, Context, Handler};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::Shutdown;

/// Header carrying the original path context to the backend and back
pub const PROXY_CONTEXT_HEADER: &str = "X-Proxy-Context";

/// Context → `host:port` for backends the gateway forwards to
#[derive(Default)]
pub struct RouteTable {
    routes: Mutex<HashMap<String, String>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_routes(routes: HashMap<String, String>) -> Self {
        Self {
            routes: Mutex::new(routes),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a route unless the context is already taken
    pub fn add_route(&self, context: impl Into<String>, addr: impl Into<String>) -> bool {
        let (context, addr) = (context.into(), addr.into());
        let mut routes = self.lock();
        if routes.contains_key(&context) {
            return false;
        }
        tracing::info!("Route added: /{} -> {}", context, addr);
        routes.insert(context, addr);
        true
    }

    /// Point `context` at `addr`, returning the previous address
    pub fn set(&self, context: impl Into<String>, addr: impl Into<String>) -> Option<String> {
        self.lock().insert(context.into(), addr.into())
    }

    pub fn get(&self, context: &str) -> Option<String> {
        self.lock().get(context).cloned()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.lock().contains_key(context)
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut routes: Vec<_> = self.lock().iter().map(|(c, a)| (c.clone(), a.clone())).collect();
        routes.sort();
        routes
    }

    pub fn director(&self, context: &str) -> Option<Director> {
        self.get(context).map(|host| Director {
            context: context.to_string(),
            host,
        })
    }
}

/// Rewrites requests for one routed context
#[derive(Debug, Clone)]
pub struct Director {
    context: String,
    host: String,
}

impl Director {
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Plain-HTTP backend URL with the context stripped from the path
    pub fn target_url(&self, path: &str, query: &str) -> String {
        let mut url = format!("http://{}{}", self.host, strip_context(path, &self.context));
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Remove the leading `/<context>` segment from `path`
pub fn strip_context<'a>(path: &'a str, context: &str) -> &'a str {
    let trimmed = path.trim_start_matches('/');
    match trimmed.strip_prefix(context) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Dial `addr` once, logging a warning when it cannot be reached
pub async fn probe_route(context: &str, addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => {
            tracing::debug!("Route /{} -> {} is reachable", context, addr);
            true
        },
        Ok(Err(e)) => {
            tracing::warn!("WARNING (route /{}): {} unreachable: {}", context, addr, e);
            false
        },
        Err(_) => {
            tracing::warn!("WARNING (route /{}): {} timed out after {:?}", context, addr, timeout);
            false
        },
    }
}

/// Periodically dials every route. Failures are only logged; routes are
/// never removed.
pub struct RouteProber {
    routes: Arc<RouteTable>,
    interval: Duration,
    timeout: Duration,
}

impl RouteProber {
    pub fn new(routes: Arc<RouteTable>, interval: Duration, timeout: Duration) -> Self {
        Self {
            routes,
            interval,
            timeout,
        }
    }

    fn probe_liveness(&self) {
        for (context, addr) in self.routes.snapshot() {
            let timeout = self.timeout;
            actix::spawn(async move {
                probe_route(&context, &addr, timeout).await;
            });
        }
    }
}

impl Actor for RouteProber {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Starting route prober ({} route(s)).", self.routes.snapshot().len());
        ctx.run_interval(self.interval, |act, _ctx| act.probe_liveness());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Stopping route prober.");
    }
}

impl Handler<Shutdown> for RouteProber {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
