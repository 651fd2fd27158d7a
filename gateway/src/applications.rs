// gateway/src/applications.rs
use common::{read_metadata, trim_svg, InstalledApp, ICON_FILE};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("unable to read application directory {dir}: {source}")]
pub struct ScanError {
    dir: PathBuf,
    source: io::Error,
}

/// Rescan the application root. Every visible directory is one application
/// whose context is the directory name. Hidden directories are install
/// staging areas and are skipped, as are directories with unreadable metadata.
pub fn scan(app_dir: &Path) -> Result<Vec<InstalledApp>, ScanError> {
    let entries = fs::read_dir(app_dir).map_err(|source| ScanError {
        dir: app_dir.to_path_buf(),
        source,
    })?;

    let mut apps = Vec::new();
    for entry in entries.flatten() {
        let context = entry.file_name().to_string_lossy().into_owned();
        if context.starts_with('.') || !entry.path().is_dir() {
            continue;
        }

        match load_app(&entry.path(), context.clone()) {
            Ok(app) => apps.push(app),
            Err(reason) => tracing::warn!("Skipping application ({}): {}", context, reason),
        }
    }

    apps.sort_by(|a, b| a.context.cmp(&b.context));
    Ok(apps)
}

fn load_app(dir: &Path, context: String) -> Result<InstalledApp, String> {
    let meta = read_metadata(dir).map_err(|e| e.to_string())?;
    let icon = fs::read_to_string(dir.join(ICON_FILE))
        .map_err(|e| format!("unable to read icon: {}", e))?;
    Ok(InstalledApp::from_parts(meta, trim_svg(&icon), context))
}

/// Find the installed application carrying `xrn`
pub fn find_by_xrn(app_dir: &Path, xrn: &str) -> Result<Option<InstalledApp>, ScanError> {
    Ok(scan(app_dir)?.into_iter().find(|app| app.xrn == xrn))
}
