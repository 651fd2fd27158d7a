// sample-backend/src/routing.rs
use actix_web::{web, HttpRequest, HttpResponse};

use crate::data;

const PROXY_CONTEXT_HEADER: &str = "X-Proxy-Context";

/// Banner shown on the index page
#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub addr: String,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/scan").route(web::get().to(scans)))
        .service(web::resource("/schedule").route(web::get().to(schedule)))
        .default_service(web::to(index));
}

fn proxy_context(req: &HttpRequest) -> String {
    req.headers()
        .get(PROXY_CONTEXT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn scans(req: HttpRequest) -> HttpResponse {
    tracing::info!("request: ({}) -> {}", proxy_context(&req), req.uri());
    HttpResponse::Ok().json(data::scans())
}

async fn schedule(req: HttpRequest) -> HttpResponse {
    tracing::info!("request: ({}) -> {}", proxy_context(&req), req.uri());
    HttpResponse::Ok().json(data::schedule())
}

/// Links are built from the context the gateway stamped, so they resolve
/// back through the gateway
async fn index(req: HttpRequest, banner: web::Data<Banner>) -> HttpResponse {
    let context = proxy_context(&req);
    tracing::info!("request: ({}) -> {}", context, req.uri());

    let title = format!("{} (addr: {})", banner.message, banner.addr);
    let body = format!(
        "<!doctype html>\n<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<ul>\n\
         <li><a href=\"/{context}/scan\">Matrix scans</a></li>\n\
         <li><a href=\"/{context}/schedule\">Maintenance schedules</a></li>\n\
         </ul>\n</body>\n</html>\n",
    );
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body)
}
