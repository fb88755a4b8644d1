// User prompts
//
// Blocking questions and acknowledgements shown by the control thread, behind
// a trait so the controller can be driven headless in tests. The native
// implementation uses `rfd` message and file dialogs.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// A named file-type filter for the file picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

pub const RESOURCE_FILTER: FileFilter = FileFilter {
    name: "Game files",
    extensions: &["nes", "fds", "unf", "unif", "nsf", "nsfe", "zip", "7z"],
};

pub const FIRMWARE_FILTER: FileFilter = FileFilter {
    name: "Firmware",
    extensions: &["bin", "rom"],
};

pub const ALL_FILES_FILTER: FileFilter = FileFilter {
    name: "All files",
    extensions: &["*"],
};

/// Severity of a prompt, mapped to the dialog icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLevel {
    Info,
    Warning,
    Error,
}

/// Every question or report the shell puts in front of the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// A patch was opened while idle: choose the resource to apply it to?
    SelectResourceForPatch,

    /// A patch was opened while running: reload the current resource with it?
    PatchAndReset,

    /// The engine needs firmware that is not installed: select it now?
    FirmwareNotFound,

    /// The selected firmware does not match any known dump
    InvalidFirmware { digest: String },

    FileNotFound { path: Utf8PathBuf },

    LoadFailed { path: Utf8PathBuf, reason: String },

    UnexpectedError { reason: String },
}

impl Prompt {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::SelectResourceForPatch | Prompt::PatchAndReset => "Apply patch",
            Prompt::FirmwareNotFound | Prompt::InvalidFirmware { .. } => "Firmware",
            Prompt::FileNotFound { .. } => "File not found",
            Prompt::LoadFailed { .. } => "Load failed",
            Prompt::UnexpectedError { .. } => "Error",
        }
    }

    pub fn level(&self) -> PromptLevel {
        match self {
            Prompt::SelectResourceForPatch | Prompt::PatchAndReset => PromptLevel::Info,
            Prompt::FirmwareNotFound | Prompt::FileNotFound { .. } => PromptLevel::Warning,
            Prompt::InvalidFirmware { .. }
            | Prompt::LoadFailed { .. }
            | Prompt::UnexpectedError { .. } => PromptLevel::Error,
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::SelectResourceForPatch => write!(
                f,
                "No game is loaded. Select the game this patch should be applied to?"
            ),
            Prompt::PatchAndReset => write!(
                f,
                "Apply this patch to the current game? The game will be reloaded."
            ),
            Prompt::FirmwareNotFound => write!(
                f,
                "The firmware required by this game was not found. Select the firmware file now?"
            ),
            Prompt::InvalidFirmware { digest } => write!(
                f,
                "The selected file is not a known firmware dump (MD5 {}). Nothing was installed.",
                digest
            ),
            Prompt::FileNotFound { path } => write!(f, "File not found: {}", path),
            Prompt::LoadFailed { path, reason } => {
                write!(f, "Could not load {}: {}", path, reason)
            }
            Prompt::UnexpectedError { reason } => write!(f, "An unexpected error occurred: {}", reason),
        }
    }
}

/// Blocking user interaction used by the control thread
pub trait Prompter {
    /// Ask a yes/no question. Returns `true` on yes.
    fn confirm(&self, prompt: &Prompt) -> bool;

    /// Show a message and wait for it to be dismissed.
    fn acknowledge(&self, prompt: &Prompt);

    /// Let the user choose a file.
    ///
    /// # Returns
    /// The selected path, or None if cancelled
    fn pick_file(&self, title: &str, filters: &[FileFilter]) -> Option<Utf8PathBuf>;
}

/// Blocking configuration dialog for arcade-system games
pub trait GameConfigEditor {
    /// Show the dialog for the loaded game.
    ///
    /// # Returns
    /// `true` if the user changed and accepted the configuration
    fn edit(&self, resource: &Utf8Path) -> anyhow::Result<bool>;
}

/// Native dialogs through `rfd`
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePrompter;

impl NativePrompter {
    fn message(prompt: &Prompt) -> rfd::MessageDialog {
        let level = match prompt.level() {
            PromptLevel::Info => rfd::MessageLevel::Info,
            PromptLevel::Warning => rfd::MessageLevel::Warning,
            PromptLevel::Error => rfd::MessageLevel::Error,
        };

        rfd::MessageDialog::new()
            .set_title(prompt.title())
            .set_description(prompt.to_string())
            .set_level(level)
    }
}

impl Prompter for NativePrompter {
    fn confirm(&self, prompt: &Prompt) -> bool {
        let result = Self::message(prompt)
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        matches!(result, rfd::MessageDialogResult::Yes)
    }

    fn acknowledge(&self, prompt: &Prompt) {
        Self::message(prompt)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    fn pick_file(&self, title: &str, filters: &[FileFilter]) -> Option<Utf8PathBuf> {
        let mut dialog = rfd::FileDialog::new().set_title(title);

        for filter in filters {
            dialog = dialog.add_filter(filter.name, filter.extensions);
        }

        dialog.pick_file().and_then(|path| {
            Utf8PathBuf::try_from(path)
                .map_err(|e| {
                    tracing::error!("Failed to convert path to UTF-8: {}", e);
                    e
                })
                .ok()
        })
    }
}

/// Editor used when no dialog is wired up: reports no change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGameConfigEditor;

impl GameConfigEditor for NoGameConfigEditor {
    fn edit(&self, resource: &Utf8Path) -> anyhow::Result<bool> {
        tracing::debug!("No game configuration editor for {}", resource);
        Ok(false)
    }
}
