// NotificationDispatcher - Routes engine notifications to the right thread
//
// Called by the engine on its own thread. Pure engine queries/commands run
// inline; anything that touches shell state is posted to the control queue.
// Every event except frame notifications is followed by a menu refresh request.

use crate::engine::{EngineError, EngineFacade, NotificationSink};
use crate::metrics::Metrics;
use crate::models::NotificationEvent;
use crate::ui::bridge::{ControlHandle, ControlOwner};
use anyhow::{Context, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Control-thread reactions to engine notifications.
///
/// Implemented by the shell controller; each method runs on the control thread.
pub trait ShellEvents: ControlOwner {
    fn on_resource_loaded(&mut self) -> Result<()>;
    fn on_resource_reset(&mut self) -> Result<()>;
    fn on_peer_disconnected(&mut self) -> Result<()>;
    fn on_resource_stopped(&mut self) -> Result<()>;
    fn on_presentation_size_changed(&mut self) -> Result<()>;
    fn on_firmware_missing(&mut self) -> Result<()>;
    fn on_exit_requested(&mut self) -> Result<()>;
    fn on_cheats_toggled(&mut self) -> Result<()>;
    fn on_audio_toggled(&mut self) -> Result<()>;
}

/// Frame counter shown by the minimal player.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter(Arc<AtomicU64>);

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Bridges engine notifications onto the control thread
///
/// # Routing
///
/// | Event | Inline (engine thread) | Control thread |
/// |-------|------------------------|----------------|
/// | ResourceLoaded | net play teardown in minimal player mode | [`ShellEvents::on_resource_loaded`] |
/// | FrameProduced | frame counter in minimal player mode | none, no refresh |
/// | ResourceReset | net play teardown in minimal player mode | [`ShellEvents::on_resource_reset`] |
/// | Unknown | none | none |
///
/// All other events go straight to their control-thread handler.
pub struct NotificationDispatcher<T: ShellEvents> {
    engine: Arc<dyn EngineFacade>,
    control: ControlHandle<T>,
    metrics: Arc<Metrics>,
    frames: FrameCounter,
}

impl<T: ShellEvents> NotificationDispatcher<T> {
    pub fn new(
        engine: Arc<dyn EngineFacade>,
        control: ControlHandle<T>,
        metrics: Arc<Metrics>,
        frames: FrameCounter,
    ) -> Self {
        Self {
            engine,
            control,
            metrics,
            frames,
        }
    }

    /// Handle one notification. Never panics and never returns an error:
    /// failures are logged so the next event is still delivered.
    pub fn dispatch(&self, event: NotificationEvent) {
        self.metrics.record_notification();

        if event.is_high_frequency() {
            tracing::trace!("Dispatching {}", event);
        } else {
            tracing::debug!("Dispatching {}", event);
        }

        match catch_unwind(AssertUnwindSafe(|| self.route(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_handler_failure();
                tracing::error!("Handler for {} failed: {:#}", event, e);
            }
            Err(_) => {
                self.metrics.record_handler_failure();
                tracing::error!("Handler for {} panicked", event);
            }
        }

        if !event.is_high_frequency() {
            if let Err(e) = self.control.request_refresh() {
                tracing::warn!("Menu refresh not scheduled: {}", e);
            }
        }
    }

    fn route(&self, event: NotificationEvent) -> Result<()> {
        match event {
            NotificationEvent::ResourceLoaded => {
                self.teardown_net_play(event);
                self.post(event, T::on_resource_loaded)
            }
            NotificationEvent::FrameProduced => {
                if self.engine.is_special_mode()? {
                    self.frames.increment();
                }
                Ok(())
            }
            NotificationEvent::ResourceReset => {
                self.teardown_net_play(event);
                self.post(event, T::on_resource_reset)
            }
            NotificationEvent::PeerDisconnected => self.post(event, T::on_peer_disconnected),
            NotificationEvent::ResourceStopped => self.post(event, T::on_resource_stopped),
            NotificationEvent::PresentationSizeChanged => {
                self.post(event, T::on_presentation_size_changed)
            }
            NotificationEvent::FirmwareMissing => self.post(event, T::on_firmware_missing),
            NotificationEvent::ExitRequested => self.post(event, T::on_exit_requested),
            NotificationEvent::CheatsToggled => self.post(event, T::on_cheats_toggled),
            NotificationEvent::AudioToggled => self.post(event, T::on_audio_toggled),
            NotificationEvent::Unknown(code) => {
                tracing::debug!("Ignoring unknown notification code {}", code);
                Ok(())
            }
        }
    }

    fn post(&self, event: NotificationEvent, handler: fn(&mut T) -> Result<()>) -> Result<()> {
        self.control
            .post(move |owner: &mut T| {
                handler(owner).with_context(|| format!("{} handler failed", event))
            })
            .with_context(|| format!("Could not schedule {} handler", event))
    }

    /// Best-effort teardown; a failed query here must not keep the
    /// control-thread handler from being posted.
    fn teardown_net_play(&self, event: NotificationEvent) {
        if let Err(e) = self.teardown_net_play_for_minimal_player() {
            self.metrics.record_handler_failure();
            tracing::warn!("Net play teardown for {} failed: {}", event, e);
        }
    }

    /// Net play is not available with minimal-player content; drop it right
    /// away on the engine thread.
    fn teardown_net_play_for_minimal_player(&self) -> Result<(), EngineError> {
        if !self.engine.is_special_mode()? {
            return Ok(());
        }

        if self.engine.is_connected()? {
            tracing::info!("Disconnecting net play client for minimal player content");
            self.engine.disconnect()?;
        }
        if self.engine.is_server_running()? {
            tracing::info!("Stopping net play server for minimal player content");
            self.engine.stop_server()?;
        }
        Ok(())
    }
}

impl<T: ShellEvents> NotificationSink for NotificationDispatcher<T> {
    fn notify(&self, event: NotificationEvent) {
        self.dispatch(event);
    }
}
