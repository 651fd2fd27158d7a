// gateway/src/state.rs
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialStore, SessionService};
use crate::catalog::CatalogCache;
use crate::client_registry::ClientRegistry;
use crate::commands::{CommandContext, CommandProcessor, PackageSource};
use crate::routes::RouteTable;
use crate::static_files::StaticFiles;

/// Everything the dispatcher needs, shared across workers as `web::Data`
pub struct Gateway {
    pub credentials: CredentialStore,
    pub sessions: SessionService,
    pub catalog: Arc<CatalogCache>,
    pub clients: Arc<ClientRegistry>,
    pub commands: CommandProcessor,
    pub routes: Arc<RouteTable>,
    pub files: StaticFiles,
    pub http: reqwest::Client,
    pub app_dir: PathBuf,
    pub cookie_max_age: i64,
    pub socket_idle_timeout: Option<Duration>,
}

impl Gateway {
    /// Wire up the components. Starts the command worker, so this must run
    /// inside the server's runtime.
    pub fn new(
        config: &Config,
        credentials: CredentialStore,
        http: reqwest::Client,
        packages: Arc<dyn PackageSource>,
    ) -> Self {
        let app_dir = PathBuf::from(&config.app_dir);
        let catalog = Arc::new(
            CatalogCache::new(&config.app_store_url, http.clone()).with_timeout(config.schedule.catalog_timeout()),
        );
        let clients = Arc::new(ClientRegistry::new());

        let commands = CommandProcessor::start(
            CommandContext {
                app_dir: app_dir.clone(),
                catalog: catalog.clone(),
                clients: clients.clone(),
                packages,
            },
            config.schedule.command_queue_capacity,
        );

        Self {
            credentials,
            sessions: SessionService::from_config(&config.auth),
            catalog,
            clients,
            commands,
            routes: Arc::new(RouteTable::from_routes(config.routes.clone())),
            files: StaticFiles::new(&config.host_dir, &config.app_dir),
            http,
            app_dir,
            cookie_max_age: config.auth.cookie_max_age_secs,
            socket_idle_timeout: config.schedule.socket_idle_timeout(),
        }
    }
}
