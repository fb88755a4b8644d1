// UI module - Control-thread side of the shell
//
// This module contains:
// - ControlQueue: Marshals work from engine/loader threads onto the control thread
// - NotificationDispatcher: Routes engine notifications inline or onto the queue
// - MenuProjector: Derives every menu attribute from engine and shell state
// - Prompter: Blocking user dialogs (native via rfd)
// - ShellController: Owns the control-thread state and wires everything up

pub mod bridge;
pub mod controller;
pub mod dialogs;
pub mod dispatcher;
pub mod projector;

pub use bridge::{BridgeError, ControlHandle, ControlOwner, ControlQueue, ControlTask};
pub use controller::{LoadedResource, ShellController, ShellServices};
pub use dialogs::{
    FileFilter, GameConfigEditor, NativePrompter, NoGameConfigEditor, Prompt, PromptLevel, Prompter,
};
pub use dispatcher::{FrameCounter, NotificationDispatcher, ShellEvents};
pub use projector::{
    EngineReadout, MenuAttr, MenuId, MenuProjector, MenuSnapshot, ShellView, SubMenuCache,
};
