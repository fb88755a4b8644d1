use std::fmt;

/// Asynchronous notification emitted by the engine from its own thread.
///
/// Each value is consumed exactly once by the
/// [`NotificationDispatcher`](crate::ui::NotificationDispatcher). Kinds the shell
/// does not know about arrive as [`NotificationEvent::Unknown`] and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    /// A resource finished loading and is ready to run
    ResourceLoaded,

    /// The engine produced a frame (high frequency)
    FrameProduced,

    /// The running resource was reset
    ResourceReset,

    /// Net play session to a remote host was lost
    PeerDisconnected,

    /// The running resource was stopped and the engine is idle
    ResourceStopped,

    /// Output resolution or scale changed on the engine side
    PresentationSizeChanged,

    /// The resource needs a firmware image that is not installed
    FirmwareMissing,

    /// The engine asked the shell to close
    ExitRequested,

    /// Hotkey: toggle all cheats
    CheatsToggled,

    /// Hotkey: toggle audio output
    AudioToggled,

    /// A notification code this shell does not understand
    Unknown(u32),
}

impl NotificationEvent {
    /// Map a raw engine notification code to an event.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::ResourceLoaded,
            2 => Self::FrameProduced,
            3 => Self::ResourceReset,
            4 => Self::PeerDisconnected,
            5 => Self::ResourceStopped,
            6 => Self::PresentationSizeChanged,
            7 => Self::FirmwareMissing,
            8 => Self::ExitRequested,
            9 => Self::CheatsToggled,
            10 => Self::AudioToggled,
            other => Self::Unknown(other),
        }
    }

    /// Frame notifications arrive at frame rate and skip the menu refresh.
    pub fn is_high_frequency(&self) -> bool {
        matches!(self, Self::FrameProduced)
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}
