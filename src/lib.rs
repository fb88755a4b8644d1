// EmuShell - Desktop shell coordination layer for an emulation engine
//
// This is the library crate containing the shell's control logic: notification
// routing, single-flight loading, window presentation policy and menu projection.
// The engine, the window and the dialogs are external collaborators behind traits.

pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, StartupSwitches};
pub use engine::{EngineError, EngineFacade, EngineRunner, NotificationSink};
pub use models::{NotificationEvent, PresentationState, ShellConfig};
pub use services::{LoadError, LoadRequest, SingleFlightLoader};
pub use state::{PresentationChange, PresentationStateMachine};
pub use ui::{MenuProjector, MenuSnapshot, NotificationDispatcher, ShellController};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Name shown in the window title
pub const APP_DISPLAY_NAME: &str = "EmuShell";
