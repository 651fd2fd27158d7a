// sample-backend/src/main.rs
mod data;
mod routing;

use actix_web::{web, App, HttpServer};
use common::setup_tracing;
use std::env;
use std::io;

use routing::{routes, Banner};

#[actix_web::main]
async fn main() -> io::Result<()> {
    setup_tracing();

    // Matches the gateway's default `api` route
    let addr = env::var("BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:10001".to_string());
    let message = env::var("BACKEND_MESSAGE").unwrap_or_else(|_| "Starship Maintenance".to_string());

    tracing::info!("Sample backend");
    tracing::info!(" msg:  {}", message);
    tracing::info!(" addr: {}", addr);

    let banner = web::Data::new(Banner {
        message,
        addr: addr.clone(),
    });
    HttpServer::new(move || App::new().app_data(banner.clone()).configure(routes))
        .bind(&addr)?
        .run()
        .await
}
