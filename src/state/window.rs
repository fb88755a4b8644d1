use crate::models::{Size, WindowPlacement, WindowShowState};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The shell's top-level window, as seen by the presentation state machine.
///
/// Implemented by the presentation layer. All calls happen on the control thread.
pub trait WindowHost: Send {
    fn placement(&self) -> WindowPlacement;

    /// Put the window back exactly as captured by [`placement`](Self::placement).
    fn restore_placement(&mut self, placement: &WindowPlacement);

    fn set_show_state(&mut self, state: WindowShowState);
    fn set_borderless(&mut self, borderless: bool);

    fn outer_size(&self) -> Size;
    fn set_outer_size(&mut self, size: Size);
    fn client_size(&self) -> Size;
    fn set_client_size(&mut self, size: Size);

    /// Minimum outer size
    fn minimum_size(&self) -> Size;
    fn set_minimum_size(&mut self, size: Size);

    /// Area available to the renderer: client area minus the menu bar when shown
    fn render_area(&self) -> Size;
    fn set_render_size(&mut self, size: Size);

    fn menu_bar_height(&self) -> u32;
    fn set_menu_visible(&mut self, visible: bool);
}

/// Shared on/off switch for the user-resize handler.
///
/// Programmatic size changes detach the handler for their duration so that a
/// resize they cause is not taken for a user resize. The window adapter holds
/// a clone and drops resize events while [`is_attached`](Self::is_attached) is false.
#[derive(Debug, Clone, Default)]
pub struct ResizeSwitch {
    detached: Arc<AtomicUsize>,
}

impl ResizeSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.detached.load(Ordering::Acquire) == 0
    }

    /// Detach until the returned guard drops. Nested detaches stack.
    pub fn detach(&self) -> DetachGuard {
        self.detached.fetch_add(1, Ordering::AcqRel);
        DetachGuard {
            detached: self.detached.clone(),
        }
    }
}

/// Reattaches the resize handler when dropped.
#[derive(Debug)]
pub struct DetachGuard {
    detached: Arc<AtomicUsize>,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.detached.fetch_sub(1, Ordering::AcqRel);
    }
}
