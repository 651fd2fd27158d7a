// gateway/src/api/mod.rs
pub mod command;
pub mod query;
pub mod sessions;

use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::StreamExt;

use crate::error::GatewayError;
use crate::proxy;
use crate::routes::{Director, RouteTable};
use crate::socket;
use crate::state::Gateway;

use self::sessions::{authorize, set_auth, unset_auth};

/// Largest body accepted for the gateway's own JSON endpoints
const JSON_LIMIT: usize = 64 * 1024;
/// Largest body forwarded to a backend
const PROXY_LIMIT: usize = 32 * 1024 * 1024;

/// Where a request is handled, decided by its first path segment
#[derive(Debug)]
pub enum Destination {
    Auth,
    Logout,
    Query,
    Command,
    Socket,
    Backend(Director),
    HomeApp,
    InstalledApp,
}

/// First path segment. A segment containing `.` is a top-level file of the
/// home application and maps to the empty context.
pub fn path_context(path: &str) -> &str {
    let context = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    if context.contains('.') {
        ""
    } else {
        context
    }
}

pub fn classify(context: &str, routes: &RouteTable) -> Destination {
    match context {
        "auth" => Destination::Auth,
        "logout" => Destination::Logout,
        "query" => Destination::Query,
        "command" => Destination::Command,
        "ws" => Destination::Socket,
        "static" | "" => Destination::HomeApp,
        other => match routes.director(other) {
            Some(director) => Destination::Backend(director),
            None => Destination::InstalledApp,
        },
    }
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<web::Bytes, GatewayError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(GatewayError::BadRequest("Request body too large.".to_string()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Single entry point for every request
pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    gateway: web::Data<Gateway>,
) -> Result<HttpResponse, actix_web::Error> {
    if req.method() == Method::HEAD || req.method() == Method::OPTIONS {
        return Ok(HttpResponse::Ok().finish());
    }

    let response = match classify(path_context(req.path()), &gateway.routes) {
        Destination::Auth => sessions::auth(read_body(payload, JSON_LIMIT).await?, gateway).await?,
        Destination::Logout => sessions::logout().await,
        Destination::Query => query::query(req, gateway).await?,
        Destination::Command => {
            let body = read_body(payload, JSON_LIMIT).await?;
            command::command(req, body, gateway).await?
        },
        Destination::Socket => {
            let (token, viewer) = authorize(&req, &gateway)?;
            socket::upgrade(
                &req,
                payload,
                token,
                viewer,
                gateway.clients.clone(),
                gateway.socket_idle_timeout,
            )?
        },
        Destination::Backend(director) => {
            authorize(&req, &gateway)?;
            let body = read_body(payload, PROXY_LIMIT).await?;
            proxy::forward(&req, body, &director, &gateway.http).await?
        },
        Destination::HomeApp => {
            let mut response = gateway.files.home(&req)?;
            // Soft check: the home app is served either way
            match authorize(&req, &gateway) {
                Ok((token, _)) => set_auth(&mut response, &token, gateway.cookie_max_age),
                Err(_) => unset_auth(&mut response),
            }
            response
        },
        Destination::InstalledApp => match authorize(&req, &gateway) {
            Ok((token, _)) => {
                let mut response = gateway.files.installed(&req)?;
                set_auth(&mut response, &token, gateway.cookie_max_age);
                response
            },
            Err(_) => sessions::logout().await,
        },
    };

    Ok(response)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::to(dispatch));
}
