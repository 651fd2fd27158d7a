// common/src/models/sku.rs
use serde::{Deserialize, Serialize};

/// Catalog entry describing an installable package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    /// Stable identity of the package
    pub xrn: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub author: String,
    /// Directory name the package installs into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub is_installed: bool,
}

impl Sku {
    /// Copy suitable for catalog browsing: install internals removed
    pub fn redacted(&self) -> Self {
        Self {
            context: None,
            download_url: None,
            ..self.clone()
        }
    }
}
