//! Data models for the shell.
//!
//! - [`ShellConfig`]: persisted settings (preferences, video, region, recent items)
//! - [`NotificationEvent`]: the engine's asynchronous notifications
//! - [`PresentationState`]: window mode, fullscreen and scale policy state
//!
//! Configuration structs derive `Serialize`/`Deserialize` for YAML persistence.
//! [`PresentationState`] is never shared across threads; only the control thread
//! holds it, through [`PresentationStateMachine`](crate::state::PresentationStateMachine).

pub mod config;
pub mod notification;
pub mod presentation;

pub use config::{
    AudioSettings, EMULATION_SPEED_PRESETS, EmulationSettings, MAX_RECENT_FILES, Preferences,
    RecentFiles, RecentItem, Region, ShellConfig, VideoFilter, VideoSettings, WindowLocation,
};
pub use notification::NotificationEvent;
pub use presentation::{
    Bounds, MINIMAL_PLAYER_SIZE, PresentationMode, PresentationState, REGULAR_MINIMUM_SIZE,
    RunState, SavedWindowState, ScreenSize, Size, WindowPlacement, WindowShowState,
};
