//! File-based TenantSource implementation

use async_trait::async_trait;
use futures::stream;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use marketgate_core::{
    Error, Result, TenantConfig,
    source::{TenantChange, TenantChangeStream, TenantSource},
};

use crate::definition::{TenantDefinition, TenantsFile};

/// Quiet period used to coalesce the burst of events a single save produces
const DEBOUNCE: Duration = Duration::from_millis(250);

/// How often an idle watcher checks whether its stream was dropped
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Tenant source backed by a YAML or TOML file
///
/// The whole file is the tenant set: every load returns all definitions and
/// the provisioner removes markets that are no longer listed.
#[derive(Debug)]
pub struct FileTenantSource {
    /// Path to the tenants file
    path: PathBuf,
    /// Change counter (incremented on each observed modification)
    version: Arc<AtomicU32>,
}

impl FileTenantSource {
    /// Create a source for the file at `path`
    ///
    /// A leading `~` is expanded to the home directory.
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the file doesn't exist
    /// - `Error::Config` if the home directory cannot be determined
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = expand_home(path.into())?;

        if !path.exists() {
            return Err(Error::ConfigNotFound);
        }

        info!("Initialized FileTenantSource for {:?}", path);

        Ok(Self {
            path,
            version: Arc::new(AtomicU32::new(1)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file without applying defaults
    pub fn read_definitions(&self) -> Result<Vec<TenantDefinition>> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            error!("Failed to read tenants file: {}", e);
            Error::Io(e)
        })?;

        let file: TenantsFile = if is_toml(&self.path) {
            toml::from_str(&contents).map_err(|e| {
                error!("Failed to parse TOML tenants file: {}", e);
                Error::Config(format!("Invalid TOML: {}", e))
            })?
        } else {
            // Default to YAML; an empty document means no tenants
            if contents.trim().is_empty() {
                TenantsFile::default()
            } else {
                serde_yaml::from_str(&contents).map_err(|e| {
                    error!("Failed to parse YAML tenants file: {}", e);
                    Error::Config(format!("Invalid YAML: {}", e))
                })?
            }
        };

        debug!(
            "Read {} tenant definitions from {:?}",
            file.tenants.len(),
            self.path
        );
        Ok(file.tenants)
    }
}

#[async_trait]
impl TenantSource for FileTenantSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        self.read_definitions()?
            .iter()
            .map(TenantDefinition::to_config)
            .collect()
    }

    async fn watch_changes(&self) -> Result<TenantChangeStream<'_>> {
        // Watch the parent directory: editors often replace the file via
        // rename, which would orphan a watch on the file itself.
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| Error::Config(format!("{:?} is not a file path", self.path)))?;
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel(100);
        let version = self.version.clone();

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = match RecommendedWatcher::new(
                move |res: std::result::Result<Event, notify::Error>| {
                    if let Err(e) = notify_tx.send(res) {
                        error!("Failed to send file watch event: {}", e);
                    }
                },
                notify::Config::default(),
            ) {
                Ok(w) => w,
                Err(e) => {
                    error!("Failed to create file watcher: {}", e);
                    return;
                }
            };

            if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
                error!("Failed to watch tenants directory: {}", e);
                return;
            }

            info!("Watching tenants file for changes: {:?}", file_name);

            loop {
                let event_result = match notify_rx.recv_timeout(IDLE_POLL) {
                    Ok(event_result) => event_result,
                    Err(RecvTimeoutError::Timeout) if tx.is_closed() => break,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                match event_result {
                    Ok(event) => {
                        let touches_file = event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                        if !touches_file
                            || !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        {
                            continue;
                        }

                        // A truncate-then-write save emits several events; reading
                        // mid-write would briefly see an empty tenant set.
                        while notify_rx.recv_timeout(DEBOUNCE).is_ok() {}

                        let change = TenantChange {
                            timestamp: chrono::Utc::now(),
                            version: version.fetch_add(1, Ordering::SeqCst) + 1,
                        };
                        if tx.blocking_send(Ok(change)).is_err() {
                            debug!("Tenant change stream closed, stopping watcher");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("File watch error: {}", e);
                        if tx
                            .blocking_send(Err(Error::Internal(format!("File watch error: {}", e))))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }

            debug!("Stopped watching tenants file {:?}", file_name);
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(Box::pin(stream))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}

fn expand_home(path: PathBuf) -> Result<PathBuf> {
    if !path.starts_with("~") {
        return Ok(path);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(path.strip_prefix("~").unwrap_or(&path)))
}
