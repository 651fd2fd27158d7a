// common/src/models/app.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// File holding an application's descriptive metadata (JSON despite the name)
pub const METADATA_FILE: &str = "metadata.js";
pub const ICON_FILE: &str = "icon.svg";

/// Descriptive metadata shipped inside every application directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
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
}

/// A package materialized on local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub xrn: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub date: String,
    pub author: String,
    /// Inline SVG markup
    pub icon: String,
    /// Directory name under the application root
    pub context: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("unable to read {file}: {source}")]
    Read { file: String, source: io::Error },

    #[error("unable to parse {file}: {source}")]
    Parse { file: String, source: serde_json::Error },
}

/// Read `metadata.js` from an application directory
pub fn read_metadata(app_dir: &Path) -> Result<AppMetadata, MetadataError> {
    let path = app_dir.join(METADATA_FILE);
    let file = path.display().to_string();
    let bytes = fs::read(&path).map_err(|source| MetadataError::Read { file: file.clone(), source })?;
    serde_json::from_slice(&bytes).map_err(|source| MetadataError::Parse { file, source })
}

/// Drop any `<?...?>` processing instructions so the SVG can be inlined
pub fn trim_svg(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut rest = svg;
    while let Some(start) = rest.find("<?") {
        out.push_str(&rest[..start]);
        match rest[start..].find("?>") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

impl InstalledApp {
    pub fn from_parts(meta: AppMetadata, icon: String, context: String) -> Self {
        Self {
            xrn: meta.xrn,
            name: meta.name,
            description: meta.description,
            version: meta.version,
            date: meta.date,
            author: meta.author,
            icon,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_svg_strips_xml_declaration() {
        let svg = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg><g/></svg>\n";
        assert_eq!(trim_svg(svg), "<svg><g/></svg>");
        assert_eq!(trim_svg("  <svg/>  "), "<svg/>");
        assert_eq!(trim_svg("<svg/><?broken"), "<svg/>");
    }

    #[test]
    fn test_read_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"xrn":"proc:gl:alpha","name":"Alpha","version":"1.0"}"#,
        )
        .unwrap();
        let meta = read_metadata(dir.path()).unwrap();
        assert_eq!(meta.xrn, "proc:gl:alpha");
        assert_eq!(meta.author, "");

        fs::write(dir.path().join(METADATA_FILE), "{").unwrap();
        assert!(matches!(read_metadata(dir.path()), Err(MetadataError::Parse { .. })));
    }
}
