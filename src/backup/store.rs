/// Backup store backends
///
/// Two interchangeable backends persist last-known-good payloads. The
/// in-memory store keeps the latest payload in a field and always succeeds;
/// the file store serializes writes through one dedicated worker task (FIFO,
/// one writer at a time) and shares a read/write lock with readers so a read
/// never observes a partially written file. I/O failures are logged and
/// reported as `false`/`None`, never propagated as a crash.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::warn;

/// A persisted artifact's read/write interface
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Persist a payload; resolves once the write lands (or fails)
    async fn backup(&self, payload: String) -> bool;

    /// Load the last persisted payload, `None` when missing or unreadable
    async fn load(&self) -> Option<String>;
}

/// In-memory backend for tests and entities without durability needs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    payload: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupStore for InMemoryStore {
    async fn backup(&self, payload: String) -> bool {
        *self.payload.write().await = Some(payload);
        true
    }

    async fn load(&self) -> Option<String> {
        self.payload.read().await.clone()
    }
}

struct WriteJob {
    payload: String,
    ack: oneshot::Sender<bool>,
}

/// File-backed backend: one fixed file, one writer task, FIFO writes
pub struct FileStore {
    path: PathBuf,
    jobs: mpsc::UnboundedSender<WriteJob>,
    /// Shared with the writer task; readers hold it for read so they never
    /// see a half-written file
    lock: Arc<RwLock<()>>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        let (jobs, mut rx) = mpsc::unbounded_channel::<WriteJob>();
        let lock = Arc::new(RwLock::new(()));

        let worker_path = path.clone();
        let worker_lock = Arc::clone(&lock);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let _guard = worker_lock.write().await;
                let ok = match tokio::fs::write(&worker_path, job.payload).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(path = %worker_path.display(), error = %e, "backup write failed");
                        false
                    }
                };
                // Receiver may have given up; the write itself still counted
                let _ = job.ack.send(ok);
            }
        });

        Self { path, jobs, lock }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl BackupStore for FileStore {
    async fn backup(&self, payload: String) -> bool {
        let (ack, done) = oneshot::channel();
        if self.jobs.send(WriteJob { payload, ack }).is_err() {
            warn!(path = %self.path.display(), "backup worker gone, write dropped");
            return false;
        }
        done.await.unwrap_or(false)
    }

    async fn load(&self) -> Option<String> {
        let _guard = self.lock.read().await;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "backup read failed");
                None
            }
        }
    }
}
