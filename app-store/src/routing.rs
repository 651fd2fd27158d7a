// app-store/src/routing.rs
use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;

use crate::store::Store;

/// Configure routes for the app store
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/catalog").route(web::get().to(catalog)))
        .service(web::resource("/download/{file}").route(web::get().to(download)))
        .default_service(web::to(not_found));
}

async fn catalog(req: HttpRequest, store: web::Data<Arc<Store>>) -> impl Responder {
    let host = req.connection_info().host().to_string();
    HttpResponse::Ok().json(store.catalog(&host))
}

async fn download(req: HttpRequest, path: web::Path<String>, store: web::Data<Arc<Store>>) -> HttpResponse {
    let file = path.into_inner();
    let Some(archive) = store.download(&file) else {
        tracing::info!("Download not found: {}", file);
        return not_found().await;
    };

    match NamedFile::open(&archive) {
        Ok(named) => named.into_response(&req),
        Err(e) => {
            tracing::error!("Unable to open {}: {}", archive.display(), e);
            HttpResponse::InternalServerError().finish()
        },
    }
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body("<h1>Not found.</h1>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::store;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use common::Sku;

    #[actix_web::test]
    async fn test_catalog_and_download() {
        let (_root, store) = store();
        store.prepare().unwrap();
        store.reload().unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(store)))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/catalog")
            .insert_header(("Host", "store.local:60001"))
            .to_request();
        let skus: Vec<Sku> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(skus.len(), 2);
        assert_eq!(
            skus[1].download_url.as_deref(),
            Some("http://store.local:60001/download/proc:gl:omega.zip")
        );

        let req = test::TestRequest::get().uri("/download/proc:gl:omega.zip").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        assert_eq!(&body[..2], b"PK");

        let req = test::TestRequest::get().uri("/download/nope.zip").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/elsewhere").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
