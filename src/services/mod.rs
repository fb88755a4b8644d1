//! Services module - framework-agnostic logic behind the shell's commands.
//!
//! # Components
//!
//! - [`SingleFlightLoader`]: serializes resource loads on the engine. Handles:
//!   - Archive entry selection through an [`ArchiveSelector`]
//!   - Sidecar patch probing (`.ips`, `.ups`, `.bps`, in that order)
//!   - The in-flight extraction counter that drives the loading indicator
//!   - FIFO completion of queued loads
//!
//! - [`FirmwareInstaller`]: MD5 validation and installation of the disk system firmware
//!
//! - [`detect_file_kind`]: tells patches, movies and loadable resources apart
//!
//! None of these touch window or menu state; results flow back to the control
//! thread through continuations.

pub mod files;
pub mod firmware;
pub mod loader;

pub use files::{FileKind, detect_file_kind, is_patch_file};
pub use firmware::{FIRMWARE_FILE_NAME, FirmwareError, FirmwareInstaller, KNOWN_FIRMWARE_MD5};
pub use loader::{
    ArchiveSelection, ArchiveSelector, InFlightGuard, LoadError, LoadOutcome, LoadRequest,
    LoadSession, PATCH_EXTENSIONS, PlainFileSelector, SingleFlightLoader, find_sidecar_patch,
    resolve_patch,
};
