// gateway/src/commands/mod.rs
pub mod archive;

use futures::FutureExt;
use serde::Serialize;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::applications::{self, ScanError};
use crate::catalog::CatalogCache;
use crate::client_registry::ClientRegistry;
use crate::error::GatewayError;

pub use archive::{ArchiveError, HttpPackageSource, PackageSource};

pub const INSTALL: &str = "install";
pub const UNINSTALL: &str = "uninstall";

/// A requested side effect on the application directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Install(String),
    Uninstall(String),
    Unknown(String),
}

impl CommandKind {
    pub fn parse(cmd: &str, xrn: &str) -> Self {
        match cmd {
            INSTALL => CommandKind::Install(xrn.to_string()),
            UNINSTALL => CommandKind::Uninstall(xrn.to_string()),
            other => CommandKind::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CommandKind::Install(_) => INSTALL,
            CommandKind::Uninstall(_) => UNINSTALL,
            CommandKind::Unknown(name) => name,
        }
    }

    pub fn xrn(&self) -> Option<&str> {
        match self {
            CommandKind::Install(xrn) | CommandKind::Uninstall(xrn) => Some(xrn),
            CommandKind::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Ok,
    Error,
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub reason: String,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            status: CommandStatus::Ok,
            reason: "Ok".to_string(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("App '{0}' not found.")]
    NotFound(String),

    #[error("Unknown command: '{0}'.")]
    UnknownCommand(String),

    #[error("App '{0}' has no download URL.")]
    MissingDownload(String),

    #[error("App '{0}' is not installed.")]
    NotInstalled(String),

    #[error("Refusing to remove application directory '{0}'.")]
    InvalidContext(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Internal(String),
}

/// Why a command could not be queued
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("command queue is full")]
    Full,

    #[error("command queue is closed")]
    Closed,
}

impl From<SubmitError> for GatewayError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Full => GatewayError::QueueFull,
            SubmitError::Closed => GatewayError::ShuttingDown,
        }
    }
}

/// Everything a command may touch
pub struct CommandContext {
    pub app_dir: PathBuf,
    pub catalog: Arc<CatalogCache>,
    pub clients: Arc<ClientRegistry>,
    pub packages: Arc<dyn PackageSource>,
}

/// Resolves once the command has run
pub type CommandTicket = oneshot::Receiver<CommandResult>;

struct Job {
    kind: CommandKind,
    requested_by: String,
    reply: oneshot::Sender<CommandResult>,
}

/// Runs install and uninstall commands one at a time, in submission order,
/// on a single worker task.
pub struct CommandProcessor {
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandProcessor {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(ctx: CommandContext, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tracing::info!("Starting command processor (queue capacity {}).", capacity.max(1));
        let worker = tokio::spawn(drain(ctx, rx));

        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue `kind` on behalf of `requested_by` without waiting for it to run.
    /// Unknown commands are answered immediately and never queued.
    pub fn invoke(&self, requested_by: &str, kind: CommandKind) -> Result<CommandTicket, SubmitError> {
        let (reply, ticket) = oneshot::channel();

        if let CommandKind::Unknown(name) = &kind {
            let result = CommandResult::error(CommandError::UnknownCommand(name.clone()).to_string());
            tracing::info!("- command.rejected: [{}] {}", requested_by, result.reason);
            let _ = reply.send(result);
            return Ok(ticket);
        }

        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = queue.as_ref().ok_or(SubmitError::Closed)?;
        sender
            .try_send(Job {
                kind,
                requested_by: requested_by.to_string(),
                reply,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::Full,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            })?;

        Ok(ticket)
    }

    /// Close the queue and wait for already queued commands to finish
    pub async fn stop(&self) {
        drop(self.queue.lock().unwrap_or_else(PoisonError::into_inner).take());

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("Command worker ended abnormally: {}", e);
            }
        }
    }
}

async fn drain(ctx: CommandContext, mut queue: mpsc::Receiver<Job>) {
    while let Some(job) = queue.recv().await {
        tracing::info!("- command.start: [{}] {} {}", job.requested_by, job.kind.name(), job.kind.xrn().unwrap_or(""));

        let result = match AssertUnwindSafe(execute(&job.kind, &ctx)).catch_unwind().await {
            Ok(Ok(())) => CommandResult::ok(),
            Ok(Err(e)) => CommandResult::error(e.to_string()),
            Err(_) => CommandResult::error(format!("Command '{}' failed unexpectedly.", job.kind.name())),
        };

        if result.is_ok() {
            tracing::info!("- command.done: [{}] {}", job.requested_by, job.kind.name());
        } else {
            tracing::warn!("- command.failed: [{}] {}: {}", job.requested_by, job.kind.name(), result.reason);
        }
        let _ = job.reply.send(result);
    }
    tracing::info!("Stopping command processor.");
}

/// Run one command against the application directory
pub async fn execute(kind: &CommandKind, ctx: &CommandContext) -> Result<(), CommandError> {
    match kind {
        CommandKind::Install(xrn) => install(xrn, ctx).await?,
        CommandKind::Uninstall(xrn) => uninstall(xrn, ctx).await?,
        CommandKind::Unknown(name) => return Err(CommandError::UnknownCommand(name.clone())),
    }
    ctx.clients.broadcast_refresh();
    Ok(())
}

async fn install(xrn: &str, ctx: &CommandContext) -> Result<(), CommandError> {
    let sku = ctx.catalog.find(xrn).ok_or_else(|| CommandError::NotFound(xrn.to_string()))?;
    let url = sku
        .download_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| CommandError::MissingDownload(xrn.to_string()))?;

    let staging = ctx.app_dir.join(format!(".install-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&staging).await?;

    let outcome = stage_and_promote(&url, &staging, ctx).await;

    if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
        tracing::warn!("Unable to remove staging directory {}: {}", staging.display(), e);
    }
    outcome
}

async fn stage_and_promote(url: &str, staging: &Path, ctx: &CommandContext) -> Result<(), CommandError> {
    let archive_path = staging.join(archive::archive_name(url));
    tracing::info!("- Installing '{}'.", url);
    let bytes = ctx.packages.download(url, &archive_path).await?;
    tracing::debug!("- Downloaded {} bytes to {}", bytes, archive_path.display());

    let unpacked = staging.join("unpacked");
    let app_dir = ctx.app_dir.clone();
    let installed = tokio::task::spawn_blocking(move || -> Result<Vec<String>, CommandError> {
        let names = archive::extract(&archive_path, &unpacked)?;
        std::fs::remove_file(&archive_path)?;
        archive::promote(&unpacked, &app_dir, &names)?;
        Ok(names)
    })
    .await
    .map_err(|e| CommandError::Internal(format!("extraction task failed: {}", e)))??;

    tracing::info!("- Installed {:?}.", installed);
    Ok(())
}

async fn uninstall(xrn: &str, ctx: &CommandContext) -> Result<(), CommandError> {
    let sku = ctx.catalog.find(xrn).ok_or_else(|| CommandError::NotFound(xrn.to_string()))?;

    let context = match sku.context.filter(|c| !c.is_empty()) {
        Some(context) => context,
        None => {
            let app_dir = ctx.app_dir.clone();
            let lookup = xrn.to_string();
            tokio::task::spawn_blocking(move || applications::find_by_xrn(&app_dir, &lookup))
                .await
                .map_err(|e| CommandError::Internal(format!("scan task failed: {}", e)))??
                .map(|app| app.context)
                .ok_or_else(|| CommandError::NotInstalled(xrn.to_string()))?
        },
    };

    if !is_plain_segment(&context) {
        return Err(CommandError::InvalidContext(context));
    }

    let dir = ctx.app_dir.join(&context);
    tracing::info!("- Uninstalling '{}' from {}.", xrn, dir.display());
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// Exactly one normal component: no separators, no "..", not hidden
fn is_plain_segment(context: &str) -> bool {
    let mut components = Path::new(context).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !context.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::archive::tests::package;
    use super::*;
    use crate::applications::tests::write_app;
    use crate::client_registry::tests::{refreshes, Received, Recorder};
    use actix::Actor;
    use async_trait::async_trait;
    use common::Sku;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves in-memory packages and records download start/end order
    struct FakePackages {
        archives: HashMap<String, Vec<u8>>,
        slow: Option<String>,
        events: Mutex<Vec<String>>,
    }

    impl FakePackages {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PackageSource for FakePackages {
        async fn download(&self, url: &str, target: &Path) -> Result<u64, ArchiveError> {
            self.events.lock().unwrap().push(format!("start {}", url));
            if self.slow.as_deref() == Some(url) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            let bytes = self
                .archives
                .get(url)
                .ok_or_else(|| ArchiveError::Download(format!("no such package {}", url)))?;
            std::fs::write(target, bytes)?;
            self.events.lock().unwrap().push(format!("end {}", url));
            Ok(bytes.len() as u64)
        }
    }

    fn sku(context: &str) -> Sku {
        let xrn = format!("proc:gl:{}", context);
        Sku {
            download_url: Some(format!("http://store/download/{}.zip", xrn)),
            context: Some(context.to_string()),
            xrn: xrn.clone(),
            name: context.to_string(),
            description: String::new(),
            version: "1.0".to_string(),
            date: String::new(),
            author: String::new(),
            is_installed: false,
        }
    }

    struct Fixture {
        root: tempfile::TempDir,
        packages: Arc<FakePackages>,
        clients: Arc<ClientRegistry>,
        ctx: Option<CommandContext>,
    }

    fn fixture(contexts: &[&str], slow: Option<&str>) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let catalog = Arc::new(CatalogCache::new("http://unused", reqwest::Client::new()));
        catalog.replace(contexts.iter().map(|c| sku(c)).collect());

        let archives = contexts
            .iter()
            .map(|c| {
                let s = sku(c);
                (s.download_url.unwrap(), package(c, &s.xrn))
            })
            .collect();
        let packages = Arc::new(FakePackages {
            archives,
            slow: slow.map(|c| sku(c).download_url.unwrap()),
            events: Mutex::new(Vec::new()),
        });
        let clients = Arc::new(ClientRegistry::new());

        let ctx = CommandContext {
            app_dir: root.path().to_path_buf(),
            catalog,
            clients: clients.clone(),
            packages: packages.clone(),
        };
        Fixture {
            root,
            packages,
            clients,
            ctx: Some(ctx),
        }
    }

    fn visible_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(CommandKind::parse("install", "x"), CommandKind::Install("x".into()));
        assert_eq!(CommandKind::parse("uninstall", "x"), CommandKind::Uninstall("x".into()));
        assert_eq!(CommandKind::parse("reboot", "x"), CommandKind::Unknown("reboot".into()));
        assert_eq!(CommandKind::Unknown("reboot".into()).name(), "reboot");
    }

    #[test]
    fn test_plain_segment() {
        assert!(is_plain_segment("alpha"));
        assert!(!is_plain_segment(""));
        assert!(!is_plain_segment(".."));
        assert!(!is_plain_segment("a/b"));
        assert!(!is_plain_segment("/etc"));
        assert!(!is_plain_segment(".install-1"));
    }

    #[actix_web::test]
    async fn test_install_then_uninstall() {
        let mut fx = fixture(&["alpha"], None);
        let ctx = fx.ctx.take().unwrap();
        let watcher = Recorder::default().start();
        fx.clients.register("token", watcher.clone().recipient());

        execute(&CommandKind::Install("proc:gl:alpha".into()), &ctx).await.unwrap();
        // Archive and staging area are gone, only the app remains
        assert_eq!(visible_entries(fx.root.path()), vec!["alpha".to_string()]);
        let app = applications::find_by_xrn(fx.root.path(), "proc:gl:alpha").unwrap().unwrap();
        assert_eq!(app.context, "alpha");

        execute(&CommandKind::Uninstall("proc:gl:alpha".into()), &ctx).await.unwrap();
        assert!(visible_entries(fx.root.path()).is_empty());

        assert_eq!(refreshes(&watcher.send(Received).await.unwrap()), 2);
    }

    #[actix_web::test]
    async fn test_unknown_xrn_changes_nothing() {
        let mut fx = fixture(&["alpha"], None);
        let ctx = fx.ctx.take().unwrap();

        let err = execute(&CommandKind::Install("proc:gl:unknown".into()), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(visible_entries(fx.root.path()).is_empty());
        assert!(fx.packages.events().is_empty());
    }

    #[actix_web::test]
    async fn test_failed_download_cleans_staging() {
        let mut fx = fixture(&["alpha"], None);
        let ctx = fx.ctx.take().unwrap();
        ctx.catalog.replace(vec![Sku {
            download_url: Some("http://store/download/missing.zip".into()),
            ..sku("alpha")
        }]);

        assert!(matches!(
            execute(&CommandKind::Install("proc:gl:alpha".into()), &ctx).await,
            Err(CommandError::Archive(ArchiveError::Download(_)))
        ));
        assert!(visible_entries(fx.root.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_uninstall_falls_back_to_installed_context() {
        let mut fx = fixture(&[], None);
        let ctx = fx.ctx.take().unwrap();
        write_app(fx.root.path(), "beta-app", "proc:gl:beta");
        ctx.catalog.replace(vec![Sku {
            context: None,
            ..sku("beta")
        }]);

        execute(&CommandKind::Uninstall("proc:gl:beta".into()), &ctx).await.unwrap();
        assert!(!fx.root.path().join("beta-app").exists());
    }

    #[actix_web::test]
    async fn test_uninstall_rejects_escaping_context() {
        let mut fx = fixture(&[], None);
        let ctx = fx.ctx.take().unwrap();
        ctx.catalog.replace(vec![Sku {
            context: Some("..".into()),
            ..sku("evil")
        }]);

        assert!(matches!(
            execute(&CommandKind::Uninstall("proc:gl:evil".into()), &ctx).await,
            Err(CommandError::InvalidContext(_))
        ));
    }

    #[actix_web::test]
    async fn test_commands_run_one_at_a_time_in_order() {
        let mut fx = fixture(&["alpha", "beta"], Some("alpha"));
        let processor = CommandProcessor::start(fx.ctx.take().unwrap(), 8);

        let first = processor.invoke("tests", CommandKind::Install("proc:gl:alpha".into())).unwrap();
        let second = processor.invoke("tests", CommandKind::Install("proc:gl:beta".into())).unwrap();
        let third = processor.invoke("tests", CommandKind::Install("proc:gl:unknown".into())).unwrap();

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        let failed = third.await.unwrap();
        assert_eq!(failed.status, CommandStatus::Error);
        assert!(failed.reason.contains("not found"));

        // The slow first download completed before the second began
        let alpha = sku("alpha").download_url.unwrap();
        let beta = sku("beta").download_url.unwrap();
        assert_eq!(
            fx.packages.events(),
            vec![
                format!("start {}", alpha),
                format!("end {}", alpha),
                format!("start {}", beta),
                format!("end {}", beta),
            ]
        );
        assert_eq!(visible_entries(fx.root.path()), vec!["alpha".to_string(), "beta".to_string()]);

        processor.stop().await;
    }

    #[actix_web::test]
    async fn test_unknown_command_is_not_queued() {
        let mut fx = fixture(&[], None);
        let processor = CommandProcessor::start(fx.ctx.take().unwrap(), 1);
        processor.stop().await;

        // Queue is closed, unknown commands still get an answer
        let result = processor.invoke("tests", CommandKind::Unknown("reboot".into())).unwrap().await.unwrap();
        assert_eq!(result.reason, "Unknown command: 'reboot'.");
        assert!(matches!(
            processor.invoke("tests", CommandKind::Install("proc:gl:alpha".into())),
            Err(SubmitError::Closed)
        ));
    }

    #[actix_web::test]
    async fn test_full_queue_rejects_without_blocking() {
        let mut fx = fixture(&["alpha"], Some("alpha"));
        let processor = CommandProcessor::start(fx.ctx.take().unwrap(), 1);

        let mut tickets = Vec::new();
        let mut rejected = 0;
        for _ in 0..4 {
            match processor.invoke("tests", CommandKind::Install("proc:gl:alpha".into())) {
                Ok(ticket) => tickets.push(ticket),
                Err(SubmitError::Full) => rejected += 1,
                Err(e) => panic!("unexpected {}", e),
            }
        }
        assert!(rejected >= 2);
        for ticket in tickets {
            assert!(ticket.await.unwrap().is_ok());
        }
        processor.stop().await;
    }
}
