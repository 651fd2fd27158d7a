// gateway/tests/support/mod.rs
#![allow(dead_code)]

use actix_web::web;
use common::Config;
use gateway::auth::CredentialStore;
use gateway::commands::HttpPackageSource;
use gateway::Gateway;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const EMAIL: &str = "test@example.com";
pub const PASSWORD: &str = "test1234";

pub struct Harness {
    pub root: tempfile::TempDir,
    pub gateway: web::Data<Gateway>,
}

impl Harness {
    pub fn app_dir(&self) -> PathBuf {
        self.root.path().join("public")
    }

    /// A freshly issued token for the seeded user
    pub fn token(&self) -> String {
        let user = self.gateway.credentials.find_user(EMAIL, PASSWORD).unwrap();
        self.gateway.sessions.issue(&user).unwrap()
    }

    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token()))
    }
}

pub fn write_app(root: &Path, context: &str, xrn: &str) {
    let dir = root.join(context);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("metadata.js"),
        format!(r#"{{"xrn":"{}","name":"{}","version":"1.0"}}"#, xrn, context),
    )
    .unwrap();
    fs::write(dir.join("icon.svg"), "<?xml version=\"1.0\"?><svg/>").unwrap();
    fs::write(dir.join("index.html"), format!("<h1>{}</h1>", context)).unwrap();
}

/// Gateway over a temporary home bundle and application root holding `alpha`.
/// Must be called inside a runtime.
pub fn harness(routes: HashMap<String, String>) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let host_dir = root.path().join("client");
    let app_dir = root.path().join("public");
    fs::create_dir_all(host_dir.join("static")).unwrap();
    fs::write(host_dir.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(host_dir.join("static").join("main.js"), "boot()").unwrap();
    fs::write(host_dir.join("favicon.ico"), "icon").unwrap();
    write_app(&app_dir, "alpha", "proc:gl:alpha");

    let mut config = Config::default();
    config.app_dir = app_dir.to_string_lossy().into_owned();
    config.host_dir = host_dir.to_string_lossy().into_owned();
    config.app_store_url = "http://127.0.0.1:9".to_string();
    config.routes = routes;
    config.auth.secret = "integration-secret".to_string();
    config.schedule.command_queue_capacity = 8;

    let credentials = CredentialStore::with_cost(4).unwrap();
    credentials.add_user(EMAIL, PASSWORD).unwrap();

    let http = reqwest::Client::new();
    let packages = Arc::new(HttpPackageSource::new(http.clone()));
    let gateway = web::Data::new(Gateway::new(&config, credentials, http, packages));

    Harness { root, gateway }
}
