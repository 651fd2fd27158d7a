// app-store/src/main.rs
mod monitor;
mod packaging;
mod routing;
mod store;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use monitor::SourceMonitor;
use routing::routes;
use store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    let store = Arc::new(Store::new(&config.store.source_dir, &config.store.deploy_dir));

    let to_io = |e: store::StoreError| io::Error::new(io::ErrorKind::Other, e.to_string());
    store.prepare().map_err(to_io)?;
    let count = store.reload().map_err(to_io)?;
    tracing::info!("Loaded {} app(s) from {}.", count, config.store.source_dir);

    let _monitor = SourceMonitor::new(store.clone(), Duration::from_secs(config.store.rescan_secs.max(1))).start();

    tracing::info!("Starting app store on {}", config.store.addr);

    let store_data = web::Data::new(store);
    HttpServer::new(move || App::new().app_data(store_data.clone()).configure(routes))
        .bind(&config.store.addr)?
        .run()
        .await
}
