use serde::{Deserialize, Serialize};

/// Fixed window size used while the minimal player is shown.
pub const MINIMAL_PLAYER_SIZE: Size = Size::new(380, 320);

/// Minimum window size outside the minimal player.
pub const REGULAR_MINIMUM_SIZE: Size = Size::new(335, 320);

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Component-wise saturating difference.
    pub fn saturating_sub(self, other: Size) -> Size {
        Size::new(
            self.width.saturating_sub(other.width),
            self.height.saturating_sub(other.height),
        )
    }
}

/// Output size reported by the engine, with the scale it was computed at.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

/// Window position and size on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Show state of the top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowShowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Everything needed to put a window back where it was.
///
/// `bounds` are the restore bounds, i.e. the normal-state rectangle even
/// when the window is currently maximized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowPlacement {
    pub show_state: WindowShowState,
    pub bounds: Bounds,
    pub borderless: bool,
}

/// Window state captured when entering fullscreen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedWindowState {
    pub placement: WindowPlacement,

    /// Whether the window had a user-chosen size before fullscreen
    pub custom_size: bool,
}

/// Load/run lifecycle of the engine as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// No resource loaded
    #[default]
    Idle,
    Running,
    Paused,
}

/// Combined mode exposed to readers of [`PresentationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    Idle,
    Running,
    Paused,
    MinimalPlayer,
}

/// Window presentation state, owned by the control thread.
///
/// `fullscreen` and `custom_size` are independent: all four combinations
/// occur (a user can resize the window and then go fullscreen, or enter
/// fullscreen from a menu-selected scale).
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationState {
    pub run_state: RunState,
    pub minimal_player: bool,
    pub fullscreen: bool,
    pub custom_size: bool,

    /// Last scale chosen from the menu or derived from the engine's
    /// native size. Never overwritten by fullscreen or user resizes.
    pub regular_scale: f64,

    /// Scale currently applied to the engine.
    pub current_scale: f64,

    pub menu_visible: bool,

    /// Captured when entering fullscreen, consumed when leaving it.
    pub saved_window_state: Option<SavedWindowState>,
}

impl PresentationState {
    pub fn new(scale: f64) -> Self {
        Self {
            run_state: RunState::Idle,
            minimal_player: false,
            fullscreen: false,
            custom_size: false,
            regular_scale: scale,
            current_scale: scale,
            menu_visible: true,
            saved_window_state: None,
        }
    }

    /// Minimal player wins over run state unless nothing is loaded.
    pub fn mode(&self) -> PresentationMode {
        match self.run_state {
            RunState::Idle => PresentationMode::Idle,
            _ if self.minimal_player => PresentationMode::MinimalPlayer,
            RunState::Running => PresentationMode::Running,
            RunState::Paused => PresentationMode::Paused,
        }
    }

    /// True while the engine's run loop is active (running or paused).
    pub fn is_active(&self) -> bool {
        self.run_state != RunState::Idle
    }
}

impl Default for PresentationState {
    fn default() -> Self {
        Self::new(2.0)
    }
}
