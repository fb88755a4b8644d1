// Presentation state module
//
// This module provides the PresentationStateMachine which owns the window
// presentation state (run state, fullscreen, minimal player, scale policy) and
// emits change events whenever it is mutated.

pub mod layout;
pub mod window;

pub use layout::{best_fit_scale, viewer_client_size};
pub use window::{DetachGuard, ResizeSwitch, WindowHost};

use crate::engine::{EngineError, EngineFacade};
use crate::models::{
    MINIMAL_PLAYER_SIZE, PresentationMode, PresentationState, REGULAR_MINIMUM_SIZE, RunState,
    SavedWindowState, Size, VideoFilter, WindowShowState,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Pointer rows at the top of the render area that reveal a hidden menu bar.
const MENU_REVEAL_ZONE: i32 = 30;

/// Change events emitted when presentation state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum PresentationChange {
    /// Idle/running/paused/minimal player changed
    ModeChanged { mode: PresentationMode },

    FullscreenChanged { fullscreen: bool },

    /// Applied scale or the custom-size flag changed
    ScaleChanged { scale: f64, custom_size: bool },

    /// Remembered regular scale changed
    RegularScaleChanged { scale: f64 },

    MenuVisibilityChanged { visible: bool },
}

/// Window presentation state machine
///
/// Lives on the control thread. It:
/// - Tracks [`PresentationState`] and broadcasts [`PresentationChange`] events
/// - Applies the scale policy (menu-selected scale vs. user resize vs. fullscreen)
/// - Drives the window through [`WindowHost`], detaching the user-resize
///   handler around every programmatic size change
///
/// # Scale policy
///
/// - A menu-selected scale clears `custom_size`, becomes the regular scale and
///   sizes the window to fit the content.
/// - A user resize sets `custom_size` and derives the scale from the render
///   area (minimum of the horizontal and vertical ratios).
/// - Fullscreen derives a scale the same way but never touches the regular
///   scale, which is restored when leaving fullscreen.
pub struct PresentationStateMachine {
    state: PresentationState,
    window: Box<dyn WindowHost>,
    engine: Arc<dyn EngineFacade>,
    resize_switch: ResizeSwitch,
    auto_hide_menu: bool,
    change_tx: broadcast::Sender<PresentationChange>,
}

impl PresentationStateMachine {
    /// # Arguments
    /// * `window` - The top-level window
    /// * `engine` - Engine used for screen size queries and scale commands
    /// * `scale` - Initial regular scale, usually from the settings
    pub fn new(window: Box<dyn WindowHost>, engine: Arc<dyn EngineFacade>, scale: f64) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: PresentationState::new(scale),
            window,
            engine,
            resize_switch: ResizeSwitch::new(),
            auto_hide_menu: false,
            change_tx,
        }
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn window(&self) -> &dyn WindowHost {
        self.window.as_ref()
    }

    /// Switch shared with the window adapter so it can drop self-inflicted resize events.
    pub fn resize_switch(&self) -> ResizeSwitch {
        self.resize_switch.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresentationChange> {
        self.change_tx.subscribe()
    }

    pub fn set_auto_hide_menu(&mut self, auto_hide_menu: bool) {
        self.auto_hide_menu = auto_hide_menu;
    }

    /// Menu bar is hidden until the pointer reaches the top of the window
    pub fn hides_menu(&self) -> bool {
        self.state.fullscreen || self.auto_hide_menu
    }

    /// Mutate the state and broadcast what changed.
    fn update<F>(&mut self, update_fn: F) -> Vec<PresentationChange>
    where
        F: FnOnce(&mut PresentationState),
    {
        let old_state = self.state.clone();
        update_fn(&mut self.state);

        let changes = Self::detect_changes(&old_state, &self.state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.change_tx.send(change.clone());
        }
        changes
    }

    fn detect_changes(old: &PresentationState, new: &PresentationState) -> Vec<PresentationChange> {
        let mut changes = Vec::new();

        if old.mode() != new.mode() {
            changes.push(PresentationChange::ModeChanged { mode: new.mode() });
        }

        if old.fullscreen != new.fullscreen {
            changes.push(PresentationChange::FullscreenChanged {
                fullscreen: new.fullscreen,
            });
        }

        if old.current_scale != new.current_scale || old.custom_size != new.custom_size {
            changes.push(PresentationChange::ScaleChanged {
                scale: new.current_scale,
                custom_size: new.custom_size,
            });
        }

        if old.regular_scale != new.regular_scale {
            changes.push(PresentationChange::RegularScaleChanged {
                scale: new.regular_scale,
            });
        }

        if old.menu_visible != new.menu_visible {
            changes.push(PresentationChange::MenuVisibilityChanged {
                visible: new.menu_visible,
            });
        }

        changes
    }

    fn set_menu_visible(&mut self, visible: bool) {
        self.window.set_menu_visible(visible);
        self.update(|state| state.menu_visible = visible);
    }

    // ===== Run state =====

    pub fn set_run_state(&mut self, run_state: RunState) {
        self.update(|state| state.run_state = run_state);
    }

    /// Pause or resume the engine. No-op while idle.
    ///
    /// # Returns
    /// The run state after the toggle
    pub fn toggle_pause(&mut self) -> Result<RunState, EngineError> {
        let next = match self.state.run_state {
            RunState::Idle => return Ok(RunState::Idle),
            RunState::Running => {
                self.engine.pause()?;
                RunState::Paused
            }
            RunState::Paused => {
                self.engine.resume()?;
                RunState::Running
            }
        };

        tracing::debug!("Run state toggled to {:?}", next);
        self.set_run_state(next);
        Ok(next)
    }

    /// The loaded resource was stopped: back to idle, leaving the minimal player.
    pub fn on_resource_stopped(&mut self) -> Result<(), EngineError> {
        self.set_run_state(RunState::Idle);
        self.leave_minimal_player()
    }

    // ===== Size and scale =====

    /// Fit the window and render area to the engine's current output size.
    ///
    /// The window itself is only resized while no custom size is in effect and
    /// the window is not maximized (which includes fullscreen).
    pub fn update_viewer_size(&mut self) -> Result<(), EngineError> {
        let size = self.engine.screen_size(false)?;
        let content = Size::new(size.width, size.height);

        if !self.state.custom_size && self.window.placement().show_state != WindowShowState::Maximized {
            let frame = self.window.outer_size().saturating_sub(self.window.client_size());
            let menu_height = if self.hides_menu() {
                0
            } else {
                self.window.menu_bar_height()
            };
            let client = viewer_client_size(self.window.minimum_size(), frame, content, menu_height);

            self.update(|state| {
                state.regular_scale = size.scale;
                state.current_scale = size.scale;
            });

            let _detached = self.resize_switch.detach();
            self.window.set_client_size(client);
        }

        self.window.set_render_size(content);

        if self.hides_menu() {
            self.set_menu_visible(false);
        }
        Ok(())
    }

    /// Apply a menu-selected scale; it becomes the regular scale.
    pub fn set_scale(&mut self, scale: f64) -> Result<(), EngineError> {
        tracing::debug!("Scale set to {}x", scale);
        self.update(|state| {
            state.custom_size = false;
            state.regular_scale = scale;
            state.current_scale = scale;
        });

        if self.hides_menu() {
            self.set_menu_visible(false);
        }

        self.engine.set_scale(scale)?;
        self.update_viewer_size()
    }

    /// Change the video filter. Outside fullscreen this drops any custom size,
    /// so the next size refresh fits the window to the filtered output.
    pub fn set_video_filter(&mut self, filter: VideoFilter) -> Result<(), EngineError> {
        if !self.state.fullscreen {
            self.update(|state| state.custom_size = false);
        }
        self.engine.set_filter(filter)
    }

    /// Handler for user-driven window resizes.
    ///
    /// Ignored while detached or minimized.
    pub fn on_user_resize(&mut self) -> Result<(), EngineError> {
        if !self.resize_switch.is_attached() {
            tracing::trace!("Resize ignored while handler is detached");
            return Ok(());
        }
        if self.window.placement().show_state == WindowShowState::Minimized {
            return Ok(());
        }
        self.set_scale_from_window_size()
    }

    /// Derive the scale from the render area and mark the size as custom.
    pub fn set_scale_from_window_size(&mut self) -> Result<(), EngineError> {
        self.update(|state| state.custom_size = true);

        let native = self.engine.screen_size(true)?;
        let area = self.window.render_area();
        let Some(scale) = best_fit_scale(area, Size::new(native.width, native.height)) else {
            tracing::debug!("Engine reports an empty native size, scale unchanged");
            return Ok(());
        };

        self.engine.set_scale(scale)?;
        self.update(|state| state.current_scale = scale);
        Ok(())
    }

    // ===== Fullscreen =====

    pub fn toggle_fullscreen(&mut self) -> Result<(), EngineError> {
        let enabled = !self.state.fullscreen;
        self.set_fullscreen(enabled)
    }

    /// Enter or leave fullscreen.
    ///
    /// Entering snapshots the window placement and the custom-size flag;
    /// leaving restores both and reapplies the regular scale.
    pub fn set_fullscreen(&mut self, enabled: bool) -> Result<(), EngineError> {
        if enabled == self.state.fullscreen {
            return Ok(());
        }

        let _detached = self.resize_switch.detach();
        if enabled {
            self.enter_fullscreen()
        } else {
            self.leave_fullscreen()
        }
    }

    fn enter_fullscreen(&mut self) -> Result<(), EngineError> {
        tracing::info!("Entering fullscreen");
        let saved = SavedWindowState {
            placement: self.window.placement(),
            custom_size: self.state.custom_size,
        };

        self.set_menu_visible(false);
        self.window.set_show_state(WindowShowState::Normal);
        self.window.set_borderless(true);
        self.window.set_show_state(WindowShowState::Maximized);

        self.update(|state| {
            state.fullscreen = true;
            state.saved_window_state = Some(saved);
        });

        self.set_scale_from_window_size()
    }

    fn leave_fullscreen(&mut self) -> Result<(), EngineError> {
        tracing::info!("Leaving fullscreen");
        let saved = self.state.saved_window_state;

        match &saved {
            Some(saved) => self.window.restore_placement(&saved.placement),
            None => {
                self.window.set_borderless(false);
                self.window.set_show_state(WindowShowState::Normal);
            }
        }

        self.update(|state| {
            state.fullscreen = false;
            state.saved_window_state = None;
        });
        let show_menu = !self.hides_menu();
        self.set_menu_visible(show_menu);

        match saved {
            // The restored bounds already carry the user's size.
            Some(saved) if saved.custom_size => self.set_scale_from_window_size(),
            _ => {
                let regular = self.state.regular_scale;
                self.set_scale(regular)
            }
        }
    }

    // ===== Minimal player =====

    /// Show the minimal player. The window is resized only on first entry.
    pub fn enter_minimal_player(&mut self) {
        if !self.state.minimal_player {
            tracing::info!("Entering minimal player mode");
            let _detached = self.resize_switch.detach();
            self.window.set_outer_size(MINIMAL_PLAYER_SIZE);
            self.window.set_minimum_size(MINIMAL_PLAYER_SIZE);
        }
        self.update(|state| state.minimal_player = true);
    }

    /// Back to the regular window: regular minimum size and regular scale.
    pub fn leave_minimal_player(&mut self) -> Result<(), EngineError> {
        if !self.state.minimal_player {
            return Ok(());
        }

        tracing::info!("Leaving minimal player mode");
        {
            let _detached = self.resize_switch.detach();
            self.window.set_minimum_size(REGULAR_MINIMUM_SIZE);
        }
        self.update(|state| state.minimal_player = false);

        let regular = self.state.regular_scale;
        self.set_scale(regular)
    }

    // ===== Menu bar =====

    /// Reveal a hidden menu bar while the pointer is near the top edge.
    pub fn on_pointer_moved(&mut self, y: i32, menu_has_focus: bool) {
        if self.hides_menu() && !menu_has_focus {
            self.set_menu_visible(y < MENU_REVEAL_ZONE);
        }
    }

    /// Clicking the render area hides a revealed menu bar again.
    pub fn on_render_clicked(&mut self) {
        if self.hides_menu() {
            self.set_menu_visible(false);
        }
    }
}
