// gateway/src/static_files.rs
use actix_files::NamedFile;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use std::path::{Component, Path, PathBuf};

use crate::error::GatewayError;

pub const INDEX_FILE: &str = "index.html";

/// File serving for the home application and installed applications
#[derive(Clone)]
pub struct StaticFiles {
    host_dir: PathBuf,
    app_dir: PathBuf,
}

impl StaticFiles {
    pub fn new(host_dir: impl Into<PathBuf>, app_dir: impl Into<PathBuf>) -> Self {
        Self {
            host_dir: host_dir.into(),
            app_dir: app_dir.into(),
        }
    }

    /// Serve from the home bundle. Anything that is not a file falls back to
    /// the bundle's index so client-side routes keep working.
    pub fn home(&self, req: &HttpRequest) -> Result<HttpResponse, GatewayError> {
        let path = safe_join(&self.host_dir, req.path()).ok_or(GatewayError::NotFound)?;
        if path.is_file() {
            return open(&path, req);
        }
        open(&self.host_dir.join(INDEX_FILE), req)
    }

    /// Serve an installed application's asset. `/<context>` redirects to
    /// `/<context>/` so relative asset URLs resolve, which serves the index.
    pub fn installed(&self, req: &HttpRequest) -> Result<HttpResponse, GatewayError> {
        let path = safe_join(&self.app_dir, req.path()).ok_or(GatewayError::NotFound)?;
        if path.is_dir() {
            if !req.path().ends_with('/') {
                return Ok(HttpResponse::MovedPermanently()
                    .insert_header((header::LOCATION, format!("{}/", req.path())))
                    .finish());
            }
            return open(&path.join(INDEX_FILE), req);
        }
        open(&path, req)
    }
}

fn open(path: &Path, req: &HttpRequest) -> Result<HttpResponse, GatewayError> {
    let file = NamedFile::open(path).map_err(|e| {
        tracing::debug!("Not serving {}: {}", path.display(), e);
        GatewayError::NotFound
    })?;
    Ok(file.use_last_modified(true).prefer_utf8(true).into_response(req))
}

/// Join a request path onto `root`, refusing anything that could leave it
pub fn safe_join(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}
