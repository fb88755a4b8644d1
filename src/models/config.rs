use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of entries kept in the recent-items list.
pub const MAX_RECENT_FILES: usize = 10;

/// Emulation speed presets offered in the speed menu (percent, 0 = unlimited).
pub const EMULATION_SPEED_PRESETS: [u32; 6] = [100, 300, 200, 50, 25, 0];

/// Shell settings persisted in `settings.yaml`
///
/// Every section falls back to its defaults when missing so that older or
/// hand-edited files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShellConfig {
    pub preferences: Preferences,
    pub video: VideoSettings,
    pub emulation: EmulationSettings,
    pub audio: AudioSettings,
    pub region: Region,
    pub disable_all_cheats: bool,
    pub window_location: Option<WindowLocation>,
    pub recent_files: RecentFiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Apply a sidecar patch found next to the resource on load
    pub auto_load_patches: bool,

    /// Open the game configuration dialog when an arcade-system resource loads
    pub show_game_config_on_load: bool,

    pub auto_hide_menu: bool,
    pub display_title_bar_info: bool,
    pub debug_mode: bool,

    /// Period of the menu projection timer
    pub menu_refresh_interval_ms: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_load_patches: true,
            show_game_config_on_load: false,
            auto_hide_menu: false,
            display_title_bar_info: false,
            debug_mode: false,
            menu_refresh_interval_ms: default_menu_refresh_interval(),
        }
    }
}

fn default_menu_refresh_interval() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub scale: f64,
    pub filter: VideoFilter,
    pub show_fps: bool,
    pub bilinear_interpolation: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            scale: 2.0,
            filter: VideoFilter::None,
            show_fps: false,
            bilinear_interpolation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationSettings {
    /// Percent of normal speed, 0 means unlimited
    pub speed: u32,
}

impl Default for EmulationSettings {
    fn default() -> Self {
        Self { speed: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Last top-left corner of the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLocation {
    pub x: i32,
    pub y: i32,
}

/// Console region forced on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    Auto,
    Ntsc,
    Pal,
    Dendy,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Auto, Region::Ntsc, Region::Pal, Region::Dendy];
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Auto => "Auto",
            Region::Ntsc => "NTSC",
            Region::Pal => "PAL",
            Region::Dendy => "Dendy",
        };
        f.write_str(name)
    }
}

/// Video filter applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoFilter {
    #[default]
    None,
    Ntsc,
    BisqwitNtsc,
    BisqwitNtscHalfRes,
    BisqwitNtscQuarterRes,
    XBrz2x,
    XBrz3x,
    XBrz4x,
    XBrz5x,
    XBrz6x,
    Hq2x,
    Hq3x,
    Hq4x,
    Scale2x,
    Scale3x,
    Scale4x,
    Sai2x,
    Super2xSai,
    SuperEagle,
    Prescale2x,
    Prescale3x,
    Prescale4x,
    Prescale6x,
    Prescale8x,
    Prescale10x,
}

impl VideoFilter {
    pub const ALL: [VideoFilter; 25] = [
        VideoFilter::None,
        VideoFilter::Ntsc,
        VideoFilter::BisqwitNtsc,
        VideoFilter::BisqwitNtscHalfRes,
        VideoFilter::BisqwitNtscQuarterRes,
        VideoFilter::XBrz2x,
        VideoFilter::XBrz3x,
        VideoFilter::XBrz4x,
        VideoFilter::XBrz5x,
        VideoFilter::XBrz6x,
        VideoFilter::Hq2x,
        VideoFilter::Hq3x,
        VideoFilter::Hq4x,
        VideoFilter::Scale2x,
        VideoFilter::Scale3x,
        VideoFilter::Scale4x,
        VideoFilter::Sai2x,
        VideoFilter::Super2xSai,
        VideoFilter::SuperEagle,
        VideoFilter::Prescale2x,
        VideoFilter::Prescale3x,
        VideoFilter::Prescale4x,
        VideoFilter::Prescale6x,
        VideoFilter::Prescale8x,
        VideoFilter::Prescale10x,
    ];
}

impl fmt::Display for VideoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One entry of the recent-items menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentItem {
    pub path: Utf8PathBuf,
    pub display_name: String,
    #[serde(default)]
    pub archive_index: Option<u32>,
}

/// Most-recent-first list of loaded resources, capped at [`MAX_RECENT_FILES`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentFiles {
    items: Vec<RecentItem>,
}

impl RecentFiles {
    /// Move (or insert) an entry to the front.
    ///
    /// Entries are identified by path and archive index, so two members of
    /// the same archive are listed separately.
    pub fn add(&mut self, path: &Utf8Path, display_name: &str, archive_index: Option<u32>) {
        self.items
            .retain(|item| !(item.path == path && item.archive_index == archive_index));
        self.items.insert(
            0,
            RecentItem {
                path: path.to_path_buf(),
                display_name: display_name.to_string(),
                archive_index,
            },
        );
        self.items.truncate(MAX_RECENT_FILES);
    }

    pub fn get(&self, index: usize) -> Option<&RecentItem> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&RecentItem> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
