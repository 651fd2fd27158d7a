// gateway/src/api/query.rs
use actix_web::{web, HttpRequest, HttpResponse};
use common::{InstalledApp, Sku};
use serde::Serialize;
use std::collections::HashSet;

use super::sessions::{authorize, set_auth};
use crate::applications;
use crate::error::GatewayError;
use crate::state::Gateway;

#[derive(Debug, Serialize)]
pub struct QueryResults {
    pub applications: Vec<InstalledApp>,
    pub app_store: Vec<Sku>,
}

/// Flag each catalog entry that is already installed
pub fn merge(applications: Vec<InstalledApp>, catalog: Vec<Sku>) -> QueryResults {
    let installed: HashSet<&str> = applications.iter().map(|app| app.xrn.as_str()).collect();
    let app_store = catalog
        .into_iter()
        .map(|mut sku| {
            sku.is_installed = installed.contains(sku.xrn.as_str());
            sku
        })
        .collect();

    QueryResults {
        applications,
        app_store,
    }
}

/// `/query`: installed applications plus the store catalog
pub async fn query(req: HttpRequest, gateway: web::Data<Gateway>) -> Result<HttpResponse, GatewayError> {
    let (token, _viewer) = authorize(&req, &gateway)?;

    let app_dir = gateway.app_dir.clone();
    let applications = web::block(move || applications::scan(&app_dir))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?
        .map_err(|e| {
            tracing::error!("ERROR: {}", e);
            GatewayError::Internal("Unable to read installed applications.".to_string())
        })?;

    let results = merge(applications, gateway.catalog.list());
    let mut response = HttpResponse::Ok().json(&results);
    set_auth(&mut response, &token, gateway.cookie_max_age);
    Ok(response)
}
