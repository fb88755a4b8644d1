// Single-flight resource loading
//
// Load requests are resolved on the caller's thread (archive entry, sidecar
// patch), then handed to one worker task that calls the engine's blocking load
// primitive under the session lock. Requests complete in submission order.

use crate::engine::{EngineError, EngineFacade};
use crate::metrics::Metrics;
use camino::{Utf8Path, Utf8PathBuf};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

/// Sidecar patch extensions, in precedence order.
pub const PATCH_EXTENSIONS: [&str; 3] = ["ips", "ups", "bps"];

/// Errors that can occur while requesting a load
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("File not found: {0}")]
    PathNotFound(Utf8PathBuf),

    #[error("No archive entry was selected")]
    UserCancelled,

    #[error("Failed to load {path}: {source}")]
    LoadFailed {
        path: Utf8PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("Load worker has stopped")]
    LoaderStopped,
}

/// A user request to load a resource
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: Utf8PathBuf,

    /// Entry inside an archive, if already known (e.g. from the recent list)
    pub archive_index: Option<u32>,

    /// Patch chosen by the user; when unset a sidecar patch is looked up
    pub patch_path: Option<Utf8PathBuf>,

    pub auto_apply_patch: bool,
}

impl LoadRequest {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive_index: None,
            patch_path: None,
            auto_apply_patch: false,
        }
    }

    pub fn with_archive_index(mut self, archive_index: Option<u32>) -> Self {
        self.archive_index = archive_index;
        self
    }

    /// Apply this patch instead of probing for a sidecar.
    pub fn with_patch(mut self, patch_path: impl Into<Utf8PathBuf>) -> Self {
        self.patch_path = Some(patch_path.into());
        self.auto_apply_patch = true;
        self
    }

    pub fn with_auto_apply_patch(mut self, auto_apply_patch: bool) -> Self {
        self.auto_apply_patch = auto_apply_patch;
        self
    }
}

/// Entry chosen inside a (possibly) multi-entry archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSelection {
    /// `None` for plain files, `Some` when the load extracts from an archive
    pub archive_index: Option<u32>,
    pub display_name: String,
}

/// Resolves which entry of an archive to load.
///
/// Implementations may show a selection dialog; returning `None` cancels the load.
pub trait ArchiveSelector: Send + Sync {
    fn select(&self, path: &Utf8Path, preselected: Option<u32>) -> Option<ArchiveSelection>;
}

/// Selector for plain, single-entry files.
///
/// Keeps any preselected index and names the entry after the file stem.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFileSelector;

impl ArchiveSelector for PlainFileSelector {
    fn select(&self, path: &Utf8Path, preselected: Option<u32>) -> Option<ArchiveSelection> {
        Some(ArchiveSelection {
            archive_index: preselected,
            display_name: path.file_stem().unwrap_or(path.as_str()).to_string(),
        })
    }
}

/// First sidecar patch next to `path`, probing [`PATCH_EXTENSIONS`] in order.
pub fn find_sidecar_patch(path: &Utf8Path) -> Option<Utf8PathBuf> {
    PATCH_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Patch to hand to the engine for this request, if any.
///
/// The explicit patch wins over sidecar probing. Auto-apply is forced off when
/// no candidate exists or the candidate is missing on disk.
pub fn resolve_patch(req: &LoadRequest) -> Option<Utf8PathBuf> {
    let candidate = match &req.patch_path {
        Some(explicit) => Some(explicit.clone()),
        None => find_sidecar_patch(&req.path),
    };

    match candidate {
        Some(patch) if req.auto_apply_patch && patch.is_file() => Some(patch),
        Some(patch) => {
            if req.auto_apply_patch {
                tracing::warn!("Patch {} does not exist, loading unpatched", patch);
            }
            None
        }
        None => None,
    }
}

/// Process-wide load bookkeeping: in-flight extraction counter and engine lock.
#[derive(Debug, Default)]
pub struct LoadSession {
    in_flight: AtomicUsize,
    engine_lock: Mutex<()>,
}

impl LoadSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of archive-extracting loads that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    /// Count one extraction-bearing load until the returned guard drops.
    pub fn begin_extraction(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            session: self.clone(),
        }
    }

    /// Serialize an engine load call. A poisoned lock is recovered.
    pub fn lock_engine(&self) -> MutexGuard<'_, ()> {
        self.engine_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decrements the in-flight counter exactly once, when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    session: Arc<LoadSession>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.session.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Result of a finished load, handed to the continuation.
///
/// Holds the in-flight guard of extraction-bearing loads: the counter drops
/// back when the outcome is consumed or dropped, whichever comes first.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: Utf8PathBuf,
    pub display_name: String,
    pub archive_index: Option<u32>,
    pub patch: Option<Utf8PathBuf>,
    pub result: Result<(), LoadError>,
    guard: Option<InFlightGuard>,
}

impl LoadOutcome {
    /// Release the in-flight slot now.
    pub fn complete(&mut self) {
        self.guard.take();
    }
}

type Continuation = Box<dyn FnOnce(LoadOutcome) + Send>;

struct PreparedLoad {
    path: Utf8PathBuf,
    display_name: String,
    archive_index: Option<u32>,
    patch: Option<Utf8PathBuf>,
    guard: Option<InFlightGuard>,
    on_complete: Continuation,
}

/// Serializes resource loads on the engine.
///
/// [`load`](Self::load) never blocks: it validates and resolves the request,
/// then queues it. A single worker task drains the queue, so engine load calls
/// never overlap and continuations run in submission order.
pub struct SingleFlightLoader {
    session: Arc<LoadSession>,
    selector: Arc<dyn ArchiveSelector>,
    metrics: Arc<Metrics>,
    queue_tx: mpsc::UnboundedSender<PreparedLoad>,
}

impl SingleFlightLoader {
    /// Create the loader and spawn its worker on `runtime`.
    pub fn new(
        engine: Arc<dyn EngineFacade>,
        selector: Arc<dyn ArchiveSelector>,
        metrics: Arc<Metrics>,
        runtime: &tokio::runtime::Handle,
    ) -> Self {
        let session = Arc::new(LoadSession::new());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        runtime.spawn(Self::worker(
            engine,
            session.clone(),
            metrics.clone(),
            queue_rx,
        ));

        Self {
            session,
            selector,
            metrics,
            queue_tx,
        }
    }

    pub fn session(&self) -> &Arc<LoadSession> {
        &self.session
    }

    /// Queue a load.
    ///
    /// # Errors
    /// - [`LoadError::PathNotFound`] if the file does not exist (nothing is queued)
    /// - [`LoadError::UserCancelled`] if no archive entry was chosen
    /// - [`LoadError::LoaderStopped`] if the worker is gone
    ///
    /// Engine-side failures are reported through `on_complete` as
    /// [`LoadError::LoadFailed`].
    pub fn load<F>(&self, req: LoadRequest, on_complete: F) -> Result<(), LoadError>
    where
        F: FnOnce(LoadOutcome) + Send + 'static,
    {
        if !req.path.is_file() {
            tracing::warn!("Load requested for missing file: {}", req.path);
            return Err(LoadError::PathNotFound(req.path));
        }

        let selection = self
            .selector
            .select(&req.path, req.archive_index)
            .ok_or(LoadError::UserCancelled)?;

        let patch = resolve_patch(&req);

        // Extraction is only known to be involved once an entry was chosen.
        let guard = selection
            .archive_index
            .map(|_| self.session.begin_extraction());

        tracing::info!(
            "Queueing load: {} (entry: {:?}, patch: {:?})",
            req.path,
            selection.archive_index,
            patch
        );
        self.metrics.record_load_started();

        // On failure the rejected message (and its guard) is dropped here.
        self.queue_tx
            .send(PreparedLoad {
                path: req.path,
                display_name: selection.display_name,
                archive_index: selection.archive_index,
                patch,
                guard,
                on_complete: Box::new(on_complete),
            })
            .map_err(|_| LoadError::LoaderStopped)
    }

    async fn worker(
        engine: Arc<dyn EngineFacade>,
        session: Arc<LoadSession>,
        metrics: Arc<Metrics>,
        mut queue_rx: mpsc::UnboundedReceiver<PreparedLoad>,
    ) {
        tracing::debug!("Load worker started");

        while let Some(prepared) = queue_rx.recv().await {
            let PreparedLoad {
                path,
                display_name,
                archive_index,
                patch,
                guard,
                on_complete,
            } = prepared;

            let engine = engine.clone();
            let session_for_task = session.clone();
            let task_path = path.clone();
            let task_patch = patch.clone();

            let joined = tokio::task::spawn_blocking(move || {
                let _lock = session_for_task.lock_engine();
                engine.load(&task_path, archive_index, task_patch.as_deref())
            })
            .await;

            let result = match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(LoadError::LoadFailed {
                    path: path.clone(),
                    source,
                }),
                Err(join_error) => Err(LoadError::LoadFailed {
                    path: path.clone(),
                    source: EngineError::Io(format!("load task aborted: {}", join_error)),
                }),
            };

            match &result {
                Ok(()) => {
                    metrics.record_load_completed();
                    tracing::info!("Loaded {}", path);
                }
                Err(e) => {
                    metrics.record_load_failed();
                    tracing::error!("{}", e);
                }
            }

            let outcome = LoadOutcome {
                path,
                display_name,
                archive_index,
                patch,
                result,
                guard,
            };

            if catch_unwind(AssertUnwindSafe(|| on_complete(outcome))).is_err() {
                tracing::error!("Load continuation panicked");
            }
        }

        tracing::debug!("Load worker stopped");
    }
}
