// gateway/src/main.rs
use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use std::io;
use std::path::Path;
use std::sync::Arc;

use gateway::api;
use gateway::auth::CredentialStore;
use gateway::catalog::CatalogPoller;
use gateway::commands::HttpPackageSource;
use gateway::middleware::RequestLog;
use gateway::routes::RouteProber;
use gateway::{Gateway, Shutdown};

fn require_dir(label: &str, dir: &str) -> io::Result<()> {
    if Path::new(dir).is_dir() {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} '{}' does not exist", label, dir),
    ))
}

fn seed_credentials(config: &Config) -> io::Result<CredentialStore> {
    let to_io = |e: gateway::auth::CredentialError| io::Error::new(io::ErrorKind::Other, e.to_string());

    let store = CredentialStore::new().map_err(to_io)?;
    for seed in &config.auth.seed_users {
        let user = store.add_user(&seed.email, &seed.password).map_err(to_io)?;
        tracing::info!("Seeded user {}", user.email);
    }
    Ok(store)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    require_dir("app_dir", &config.app_dir)?;
    require_dir("host_dir", &config.host_dir)?;

    let http = reqwest::Client::builder()
        .connect_timeout(config.schedule.connect_timeout())
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let packages = Arc::new(HttpPackageSource::new(http.clone()).with_timeout(config.schedule.download_timeout()));
    let gateway = web::Data::new(Gateway::new(&config, seed_credentials(&config)?, http, packages));

    for (context, addr) in gateway.routes.snapshot() {
        tracing::info!("Route: /{} -> {}", context, addr);
    }

    let poller = CatalogPoller::new(gateway.catalog.clone(), config.schedule.catalog_poll_interval()).start();
    let prober = RouteProber::new(
        gateway.routes.clone(),
        config.schedule.route_probe_interval(),
        config.schedule.probe_timeout(),
    )
    .start();

    tracing::info!("Starting gateway on {}", config.gateway_addr);

    let app_data = gateway.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .wrap(RequestLog)
            .configure(api::configure)
    })
    .bind(&config.gateway_addr)?
    .run()
    .await?;

    tracing::info!("Gateway stopped accepting requests, shutting down.");
    let _ = poller.send(Shutdown).await;
    let _ = prober.send(Shutdown).await;
    gateway.commands.stop().await;
    let closed = gateway.clients.teardown();
    tracing::info!("Closed {} client socket(s).", closed);

    Ok(())
}
