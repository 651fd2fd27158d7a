// gateway/src/commands/archive.rs
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("download responded with status {0}")]
    Status(u16),

    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive entry escapes the install directory: {0}")]
    UnsafeEntry(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where package archives come from
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Fetch `url` into the file at `target`, returning the bytes written
    async fn download(&self, url: &str, target: &Path) -> Result<u64, ArchiveError>;
}

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads packages over HTTP
pub struct HttpPackageSource {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpPackageSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Bound on a whole download. The command worker is single, so an
    /// unbounded download would stall every queued command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    async fn download(&self, url: &str, target: &Path) -> Result<u64, ArchiveError> {
        let mut response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ArchiveError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArchiveError::Status(response.status().as_u16()));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ArchiveError::Download(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// File name for a downloaded archive, taken from the last URL path segment
pub fn archive_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments()?.last().map(str::to_string))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| "package.zip".to_string())
}

/// Unpack a zip archive below `dest`. Returns the distinct top-level names
/// the archive created. Blocking.
pub fn extract(archive: &Path, dest: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    fs::create_dir_all(dest)?;

    let mut top_level = BTreeSet::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;

        if let Some(Component::Normal(top)) = relative.components().next() {
            top_level.insert(top.to_string_lossy().into_owned());
        }

        let path = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&path)?;
        io::copy(&mut entry, &mut out)?;
    }

    Ok(top_level.into_iter().collect())
}

/// Move each unpacked top-level entry into `app_dir`, replacing whatever
/// lived there under the same name. Blocking.
pub fn promote(unpacked: &Path, app_dir: &Path, names: &[String]) -> io::Result<()> {
    for name in names {
        let live = app_dir.join(name);
        match fs::symlink_metadata(&live) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&live)?,
            Ok(_) => fs::remove_file(&live)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(e),
        }
        fs::rename(unpacked.join(name), &live)?;
    }
    Ok(())
}
