//! Interface to the emulation engine.
//!
//! The engine is an external collaborator that runs on its own thread. The shell
//! only talks to it through [`EngineFacade`]:
//! - a push subscription for [`NotificationEvent`]s (delivered on the engine thread)
//! - synchronous state queries, each of which may fail transiently
//! - imperative commands (load, pause, save state, set scale, ...)
//!
//! [`EngineRunner`] owns the thread that drives the engine's run loop.

pub mod runner;

pub use runner::EngineRunner;

use crate::models::{NotificationEvent, Region, ScreenSize, VideoFilter};
use camino::Utf8Path;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

/// Errors reported by the engine for queries and commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A state query could not be answered right now
    #[error("Engine query failed: {0}")]
    QueryFailed(String),

    /// A command was rejected by the engine
    #[error("Engine rejected command: {0}")]
    CommandRejected(String),

    /// I/O-class failure while loading content
    #[error("Engine I/O failure: {0}")]
    Io(String),

    /// The engine has been released
    #[error("Engine is not available")]
    Unavailable,
}

/// Handle returned by [`EngineFacade::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiver of engine notifications.
///
/// Called on the engine's emission thread, in emission order.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Opaque emulation engine.
///
/// All methods may be called from any thread. `run` blocks for the lifetime of
/// the loaded resource and must only be called from the runner thread.
#[cfg_attr(test, mockall::automock)]
pub trait EngineFacade: Send + Sync {
    fn subscribe(&self, sink: Arc<dyn NotificationSink>) -> Result<SubscriptionId, EngineError>;
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), EngineError>;

    // Queries
    fn is_paused(&self) -> Result<bool, EngineError>;
    fn is_connected(&self) -> Result<bool, EngineError>;
    fn is_server_running(&self) -> Result<bool, EngineError>;
    /// Loaded content is of the lightweight kind shown in the minimal player
    fn is_special_mode(&self) -> Result<bool, EngineError>;
    fn is_vs_system(&self) -> Result<bool, EngineError>;
    fn is_debugger_running(&self) -> Result<bool, EngineError>;
    fn is_movie_playing(&self) -> Result<bool, EngineError>;
    fn is_movie_recording(&self) -> Result<bool, EngineError>;
    fn is_wave_recording(&self) -> Result<bool, EngineError>;
    fn is_avi_recording(&self) -> Result<bool, EngineError>;
    fn has_pointer_device(&self) -> Result<bool, EngineError>;
    fn disk_side_count(&self) -> Result<u32, EngineError>;
    fn is_disk_auto_insert_enabled(&self) -> Result<bool, EngineError>;
    /// Bit mask of controller ports free in the current net play session
    fn net_play_available_controllers(&self) -> Result<u8, EngineError>;
    /// Port owned by this client, 0xFF for spectators
    fn net_play_controller_port(&self) -> Result<u8, EngineError>;
    fn net_play_controller_label(&self, port: u8) -> Result<String, EngineError>;
    fn emulation_speed(&self) -> Result<u32, EngineError>;
    fn resource_name(&self) -> Result<Option<String>, EngineError>;
    fn minimal_player_title(&self) -> Result<Option<String>, EngineError>;
    fn screen_size(&self, ignore_scale: bool) -> Result<ScreenSize, EngineError>;
    fn save_state_timestamp(&self, slot: u8) -> Result<Option<SystemTime>, EngineError>;

    // Commands
    fn load<'a>(
        &self,
        path: &Utf8Path,
        archive_index: Option<u32>,
        patch: Option<&'a Utf8Path>,
    ) -> Result<(), EngineError>;
    fn run(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
    fn pause(&self) -> Result<(), EngineError>;
    fn resume(&self) -> Result<(), EngineError>;
    fn reset(&self) -> Result<(), EngineError>;
    fn power_cycle(&self) -> Result<(), EngineError>;
    fn save_state(&self, slot: u8) -> Result<(), EngineError>;
    fn load_state(&self, slot: u8) -> Result<(), EngineError>;
    fn set_scale(&self, scale: f64) -> Result<(), EngineError>;
    fn set_filter(&self, filter: VideoFilter) -> Result<(), EngineError>;
    fn set_region(&self, region: Region) -> Result<(), EngineError>;
    fn set_emulation_speed(&self, speed: u32) -> Result<(), EngineError>;
    fn set_audio_enabled(&self, enabled: bool) -> Result<(), EngineError>;
    fn set_cheats_enabled(&self, enabled: bool) -> Result<(), EngineError>;
    fn clear_cheats(&self) -> Result<(), EngineError>;
    fn apply_game_config(&self) -> Result<(), EngineError>;
    fn disconnect(&self) -> Result<(), EngineError>;
    fn stop_server(&self) -> Result<(), EngineError>;
    fn insert_disk(&self, side: u32) -> Result<(), EngineError>;
    fn eject_disk(&self) -> Result<(), EngineError>;
    fn switch_disk_side(&self) -> Result<(), EngineError>;
    fn insert_coin(&self, port: u8) -> Result<(), EngineError>;
    fn play_movie(&self, path: &Utf8Path) -> Result<(), EngineError>;
    fn display_message(&self, title: &str, message: &str) -> Result<(), EngineError>;
    fn set_in_background(&self, in_background: bool) -> Result<(), EngineError>;
    fn reset_key_state(&self) -> Result<(), EngineError>;
    fn release(&self) -> Result<(), EngineError>;
}
