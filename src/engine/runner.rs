// Engine run loop ownership
//
// The engine's run loop blocks for as long as a resource is loaded, so it gets
// a dedicated named thread. The runner guarantees one run loop at a time and
// reports when it returns.

use super::{EngineError, EngineFacade};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const RUN_THREAD_NAME: &str = "engine-run";
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Starts the engine run loop on its own thread, at most once at a time.
pub struct EngineRunner {
    engine: Arc<dyn EngineFacade>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EngineRunner {
    pub fn new(engine: Arc<dyn EngineFacade>) -> Self {
        Self {
            engine,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the run loop unless it is already running.
    ///
    /// `on_exit` is called on the run thread with the loop's result after the
    /// runner has flipped back to not-running.
    ///
    /// # Returns
    /// `Ok(true)` if a new run thread was started, `Ok(false)` if one was already active
    pub fn start<F>(&mut self, on_exit: F) -> Result<bool, EngineError>
    where
        F: FnOnce(Result<(), EngineError>) + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Engine run loop already active, start ignored");
            return Ok(false);
        }

        // The previous thread has already cleared `running`; reap it.
        if let Some(previous) = self.handle.take() {
            if previous.join().is_err() {
                tracing::warn!("Previous engine run thread panicked");
            }
        }

        let engine = self.engine.clone();
        let running = self.running.clone();

        let spawned = std::thread::Builder::new()
            .name(RUN_THREAD_NAME.to_string())
            .spawn(move || {
                tracing::info!("Engine run loop started");
                let result = engine.run();
                running.store(false, Ordering::Release);

                match &result {
                    Ok(()) => tracing::info!("Engine run loop returned"),
                    Err(e) => tracing::error!("Engine run loop failed: {}", e),
                }
                on_exit(result);
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(EngineError::Io(format!("Failed to spawn run thread: {}", e)))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for the run thread to finish.
    ///
    /// # Returns
    /// `true` if no run thread remains, `false` if it is still running after the timeout
    pub fn join(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("Engine run thread still active after {:?}", timeout);
                self.handle = Some(handle);
                return false;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.join().is_err() {
            tracing::warn!("Engine run thread panicked");
        }
        true
    }
}
