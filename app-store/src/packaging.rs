// app-store/src/packaging.rs
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("unable to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Every file and directory below `root`, parents before children
fn walk(root: &Path) -> Result<Vec<PathBuf>, PackageError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(io_at(&dir))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(io_at(&dir))?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                pending.push(path.clone());
            }
            found.push(path);
        }
    }
    Ok(found)
}

fn entry_name(base: &str, relative: &Path) -> String {
    let mut name = base.to_string();
    for part in relative.components() {
        name.push('/');
        name.push_str(&part.as_os_str().to_string_lossy());
    }
    name
}

/// Zip `source` into `target` with every entry rooted at the directory's
/// own name, e.g. `alpha/index.html`
pub fn zip_dir(source: &Path, target: &Path) -> Result<(), PackageError> {
    let base = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut archive = ZipWriter::new(File::create(target).map_err(io_at(target))?);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    archive.add_directory(format!("{}/", base), stored)?;
    for path in walk(source)? {
        let relative = path.strip_prefix(source).unwrap_or(&path);
        let name = entry_name(&base, relative);

        if path.is_dir() {
            archive.add_directory(format!("{}/", name), stored)?;
            continue;
        }
        archive.start_file(name, deflated)?;
        let mut file = File::open(&path).map_err(io_at(&path))?;
        io::copy(&mut file, &mut archive).map_err(io_at(&path))?;
    }

    archive.finish()?;
    Ok(())
}

/// Most recent modification time of anything below `root`, `root` included
pub fn latest_change(root: &Path) -> Result<SystemTime, PackageError> {
    let mut latest = fs::metadata(root)
        .and_then(|m| m.modified())
        .map_err(io_at(root))?;
    for path in walk(root)? {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(io_at(&path))?;
        latest = latest.max(modified);
    }
    Ok(latest)
}
