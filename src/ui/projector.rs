// MenuProjector - Derives every menu attribute from engine and shell state
//
// A polling reconciler: on each tick it reads all engine state it needs up
// front, then builds a complete snapshot. A failed read abandons the tick and
// the previous snapshot stays published until the next tick succeeds.

use crate::engine::{EngineError, EngineFacade};
use crate::metrics::Metrics;
use crate::models::{
    EMULATION_SPEED_PRESETS, PresentationMode, PresentationState, Region,
    ShellConfig, VideoFilter,
};
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;

/// Regular save slots; loading offers one extra (the auto-save slot).
pub const SAVE_SLOT_COUNT: u8 = 7;

/// Slot reserved for automatic saves, load-only.
pub const AUTO_SAVE_SLOT: u8 = SAVE_SLOT_COUNT + 1;

/// Fixed scales offered in the scale menu.
pub const MENU_SCALES: [u8; 6] = [1, 2, 3, 4, 5, 6];

/// Net play controller port owned by spectators.
pub const SPECTATOR_PORT: u8 = 0xFF;

const NET_PLAY_PORTS: u8 = 4;
const VS_COIN_SLOTS: u8 = 2;

/// Identifier of one projected UI attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuId {
    // Window surface
    WindowTitle,
    InfoPanel,
    RecentPanel,
    LoadingIndicator,
    MinimalPlayerPanel,

    // File
    Open,
    RecentFiles,
    RecentItem(usize),
    SaveState,
    SaveSlot(u8),
    LoadState,
    LoadSlot(u8),

    // Game
    Pause,
    Reset,
    PowerCycle,
    PowerOff,
    SelectDisk,
    DiskSide(u32),
    EjectDisk,
    SwitchDiskSide,
    InsertCoin(u8),
    GameConfig,

    // Options
    EmulationSpeed,
    Speed(u32),
    IncreaseSpeed,
    DecreaseSpeed,
    MaximumSpeed,
    Scale(u8),
    ScaleCustom,
    Fullscreen,
    Filter(VideoFilter),
    RegionMenu,
    Region(Region),
    Input,
    Cheats,
    ShowFps,
    BilinearInterpolation,
    Audio,

    // Tools
    NetPlay,
    StartServer,
    Connect,
    NetPlaySelectController,
    NetPlayPlayer(u8),
    NetPlaySpectator,
    Movies,
    PlayMovie,
    StopMovie,
    RecordMovie,
    RecordFromStart,
    RecordFromNow,
    WaveRecord,
    WaveStop,
    VideoRecorder,
    AviRecord,
    AviStop,
    Debugger,
    TakeScreenshot,
}

/// Projected state of one UI element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuAttr {
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    pub text: Option<String>,
}

impl Default for MenuAttr {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            checked: false,
            text: None,
        }
    }
}

impl MenuAttr {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn checked(checked: bool) -> Self {
        Self {
            checked,
            ..Self::default()
        }
    }

    pub fn visible(visible: bool) -> Self {
        Self {
            visible,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Complete, immutable set of UI attributes from one projection tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuSnapshot {
    attrs: IndexMap<MenuId, MenuAttr>,
}

impl MenuSnapshot {
    pub fn get(&self, id: MenuId) -> Option<&MenuAttr> {
        self.attrs.get(&id)
    }

    pub fn is_enabled(&self, id: MenuId) -> bool {
        self.get(id).is_some_and(|attr| attr.enabled)
    }

    pub fn is_checked(&self, id: MenuId) -> bool {
        self.get(id).is_some_and(|attr| attr.checked)
    }

    pub fn is_visible(&self, id: MenuId) -> bool {
        self.get(id).is_some_and(|attr| attr.visible)
    }

    pub fn text(&self, id: MenuId) -> Option<&str> {
        self.get(id).and_then(|attr| attr.text.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MenuId, &MenuAttr)> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    fn set(&mut self, id: MenuId, attr: MenuAttr) {
        self.attrs.insert(id, attr);
    }
}

/// Sub-menu contents that only change when a resource loads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMenuCache {
    pub disk_side_count: u32,
    pub vs_system: bool,

    /// Timestamps for slots `1..=AUTO_SAVE_SLOT`, index 0 is slot 1
    pub slot_timestamps: Vec<Option<SystemTime>>,
}

impl SubMenuCache {
    pub fn capture(engine: &dyn EngineFacade) -> Result<Self, EngineError> {
        let slot_timestamps = (1..=AUTO_SAVE_SLOT)
            .map(|slot| engine.save_state_timestamp(slot))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            disk_side_count: engine.disk_side_count()?,
            vs_system: engine.is_vs_system()?,
            slot_timestamps,
        })
    }

    fn slot_label(&self, slot: u8) -> String {
        let timestamp = self
            .slot_timestamps
            .get(usize::from(slot).saturating_sub(1))
            .copied()
            .flatten();

        match timestamp {
            Some(time) => {
                let local: DateTime<Local> = time.into();
                format!("{}. {}", slot, local.format("%Y-%m-%d %H:%M"))
            }
            None => format!("{}. Empty", slot),
        }
    }
}

/// Engine state read once per tick, before any attribute is written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReadout {
    pub paused: bool,
    pub connected: bool,
    pub server_running: bool,
    pub special_mode: bool,
    pub debugger_running: bool,
    pub movie_playing: bool,
    pub movie_recording: bool,
    pub wave_recording: bool,
    pub avi_recording: bool,
    pub disk_auto_insert: bool,
    pub available_controllers: u8,
    pub controller_port: u8,

    /// Controller type per net play port, only read during a net play session
    pub controller_labels: Vec<String>,

    pub emulation_speed: u32,
    pub resource_name: Option<String>,
    pub minimal_player_title: Option<String>,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl EngineReadout {
    /// Query everything the projection needs. The first failure aborts the read.
    pub fn capture(engine: &dyn EngineFacade) -> Result<Self, EngineError> {
        let connected = engine.is_connected()?;
        let server_running = engine.is_server_running()?;

        let (available_controllers, controller_port, controller_labels) =
            if connected || server_running {
                let labels = (0..NET_PLAY_PORTS)
                    .map(|port| engine.net_play_controller_label(port))
                    .collect::<Result<Vec<_>, _>>()?;
                (
                    engine.net_play_available_controllers()?,
                    engine.net_play_controller_port()?,
                    labels,
                )
            } else {
                (0, SPECTATOR_PORT, Vec::new())
            };

        let screen = engine.screen_size(false)?;

        Ok(Self {
            paused: engine.is_paused()?,
            connected,
            server_running,
            special_mode: engine.is_special_mode()?,
            debugger_running: engine.is_debugger_running()?,
            movie_playing: engine.is_movie_playing()?,
            movie_recording: engine.is_movie_recording()?,
            wave_recording: engine.is_wave_recording()?,
            avi_recording: engine.is_avi_recording()?,
            disk_auto_insert: engine.is_disk_auto_insert_enabled()?,
            available_controllers,
            controller_port,
            controller_labels,
            emulation_speed: engine.emulation_speed()?,
            resource_name: engine.resource_name()?,
            minimal_player_title: engine.minimal_player_title()?,
            screen_width: screen.width,
            screen_height: screen.height,
        })
    }
}

/// Shell-side inputs of a projection tick
#[derive(Debug, Clone, Copy)]
pub struct ShellView<'a> {
    pub presentation: &'a PresentationState,
    pub config: &'a ShellConfig,
    pub submenus: &'a SubMenuCache,
    pub loads_in_flight: usize,
    pub frame_count: u64,
}

/// Format a scale the way the title bar shows it: up to two decimals, no trailing zeros.
fn format_scale(scale: f64) -> String {
    let formatted = format!("{:.2}", scale);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Window title: `"<app> - <title>"`, plus output info when enabled.
pub fn window_title(engine: &EngineReadout, shell: &ShellView<'_>) -> String {
    let mut title = crate::APP_DISPLAY_NAME.to_string();

    let name = if shell.presentation.minimal_player {
        engine.minimal_player_title.as_deref()
    } else {
        engine.resource_name.as_deref()
    };
    if let Some(name) = name.filter(|name| !name.trim().is_empty()) {
        title.push_str(" - ");
        title.push_str(name);
    }

    if shell.config.preferences.display_title_bar_info {
        title.push_str(&format!(
            " - {}x{} ({}x, {})",
            engine.screen_width,
            engine.screen_height,
            format_scale(shell.presentation.current_scale),
            shell.config.video.filter
        ));
    }
    title
}

/// Build the full snapshot from one consistent readout.
pub fn project(engine: &EngineReadout, shell: &ShellView<'_>) -> MenuSnapshot {
    let mut snapshot = MenuSnapshot::default();
    let presentation = shell.presentation;
    let active = presentation.is_active();
    let minimal = presentation.mode() == PresentationMode::MinimalPlayer;
    let client = engine.connected;
    let net_play = engine.server_running || client;
    let movie_busy = engine.movie_playing || engine.movie_recording;

    // Window surface
    snapshot.set(
        MenuId::WindowTitle,
        MenuAttr::default().with_text(window_title(engine, shell)),
    );
    snapshot.set(MenuId::InfoPanel, MenuAttr::visible(!active));
    snapshot.set(MenuId::RecentPanel, MenuAttr::visible(!active));
    snapshot.set(
        MenuId::LoadingIndicator,
        MenuAttr::visible(shell.loads_in_flight > 0),
    );
    let mut player = MenuAttr::visible(minimal && shell.loads_in_flight == 0);
    if minimal {
        player = player.with_text(format!(
            "{} ({} frames)",
            engine.minimal_player_title.as_deref().unwrap_or_default(),
            shell.frame_count
        ));
    }
    snapshot.set(MenuId::MinimalPlayerPanel, player);

    // File
    snapshot.set(MenuId::Open, MenuAttr::default());
    snapshot.set(
        MenuId::RecentFiles,
        MenuAttr::enabled(!shell.config.recent_files.is_empty()),
    );
    for (index, item) in shell.config.recent_files.iter().enumerate() {
        snapshot.set(
            MenuId::RecentItem(index),
            MenuAttr::default().with_text(item.display_name.clone()),
        );
    }

    let save_enabled = active && !client && !engine.special_mode;
    let load_enabled = save_enabled && !movie_busy;
    snapshot.set(MenuId::SaveState, MenuAttr::enabled(save_enabled));
    snapshot.set(MenuId::LoadState, MenuAttr::enabled(load_enabled));
    for slot in 1..=AUTO_SAVE_SLOT {
        let label = shell.submenus.slot_label(slot);
        if slot <= SAVE_SLOT_COUNT {
            snapshot.set(
                MenuId::SaveSlot(slot),
                MenuAttr::enabled(save_enabled).with_text(label.clone()),
            );
        }
        snapshot.set(
            MenuId::LoadSlot(slot),
            MenuAttr::enabled(load_enabled).with_text(label),
        );
    }

    // Game
    let game_control = active && !client;
    snapshot.set(
        MenuId::Pause,
        MenuAttr::enabled(game_control && !engine.debugger_running)
            .with_text(if engine.paused { "Resume" } else { "Pause" }),
    );
    snapshot.set(MenuId::Reset, MenuAttr::enabled(game_control));
    snapshot.set(
        MenuId::PowerCycle,
        MenuAttr::enabled(game_control && !engine.special_mode),
    );
    snapshot.set(MenuId::PowerOff, MenuAttr::enabled(active));

    let sides = shell.submenus.disk_side_count;
    let has_disk = sides > 0;
    let manual_disk = !engine.disk_auto_insert;
    snapshot.set(
        MenuId::SelectDisk,
        MenuAttr::visible(has_disk).with_enabled(manual_disk),
    );
    for side in 0..sides {
        snapshot.set(
            MenuId::DiskSide(side),
            MenuAttr::enabled(manual_disk).with_text(format!(
                "Disk {} Side {}",
                side / 2 + 1,
                if side % 2 == 0 { "A" } else { "B" }
            )),
        );
    }
    snapshot.set(
        MenuId::EjectDisk,
        MenuAttr::visible(has_disk).with_enabled(manual_disk),
    );
    snapshot.set(
        MenuId::SwitchDiskSide,
        MenuAttr::visible(sides > 1).with_enabled(manual_disk),
    );

    let vs = shell.submenus.vs_system;
    for coin_slot in 0..VS_COIN_SLOTS {
        snapshot.set(MenuId::InsertCoin(coin_slot), MenuAttr::visible(vs));
    }
    snapshot.set(MenuId::GameConfig, MenuAttr::visible(vs));

    // Options
    snapshot.set(MenuId::EmulationSpeed, MenuAttr::enabled(!client));
    for speed in EMULATION_SPEED_PRESETS.into_iter().filter(|speed| *speed != 0) {
        snapshot.set(
            MenuId::Speed(speed),
            MenuAttr::checked(engine.emulation_speed == speed).with_enabled(!client),
        );
    }
    snapshot.set(MenuId::IncreaseSpeed, MenuAttr::enabled(!client));
    snapshot.set(MenuId::DecreaseSpeed, MenuAttr::enabled(!client));
    snapshot.set(
        MenuId::MaximumSpeed,
        MenuAttr::checked(engine.emulation_speed == 0).with_enabled(!client),
    );

    let custom = presentation.custom_size;
    let mut fixed_checked = false;
    for scale in MENU_SCALES {
        let checked = !custom && presentation.current_scale == f64::from(scale);
        fixed_checked |= checked;
        snapshot.set(MenuId::Scale(scale), MenuAttr::checked(checked));
    }
    snapshot.set(
        MenuId::ScaleCustom,
        MenuAttr::checked(custom || !fixed_checked),
    );
    snapshot.set(
        MenuId::Fullscreen,
        MenuAttr::checked(presentation.fullscreen),
    );
    for filter in VideoFilter::ALL {
        snapshot.set(
            MenuId::Filter(filter),
            MenuAttr::checked(shell.config.video.filter == filter),
        );
    }

    snapshot.set(MenuId::RegionMenu, MenuAttr::enabled(!client));
    for region in Region::ALL {
        snapshot.set(
            MenuId::Region(region),
            MenuAttr::checked(shell.config.region == region).with_enabled(!client),
        );
    }
    snapshot.set(MenuId::Input, MenuAttr::enabled(!client));
    snapshot.set(MenuId::Cheats, MenuAttr::enabled(!client));
    snapshot.set(
        MenuId::ShowFps,
        MenuAttr::checked(shell.config.video.show_fps),
    );
    snapshot.set(
        MenuId::BilinearInterpolation,
        MenuAttr::checked(shell.config.video.bilinear_interpolation),
    );
    snapshot.set(
        MenuId::Audio,
        MenuAttr::checked(shell.config.audio.enabled),
    );

    // Tools: net play
    snapshot.set(MenuId::NetPlay, MenuAttr::enabled(!engine.special_mode));
    snapshot.set(
        MenuId::StartServer,
        MenuAttr::enabled(!client).with_text(if engine.server_running {
            "Stop Server"
        } else {
            "Start Server"
        }),
    );
    snapshot.set(
        MenuId::Connect,
        MenuAttr::enabled(!engine.server_running).with_text(if client {
            "Disconnect"
        } else {
            "Connect to Server"
        }),
    );
    snapshot.set(MenuId::NetPlaySelectController, MenuAttr::enabled(net_play));
    for port in 0..NET_PLAY_PORTS {
        let label = engine
            .controller_labels
            .get(usize::from(port))
            .map(String::as_str)
            .unwrap_or("None");
        snapshot.set(
            MenuId::NetPlayPlayer(port),
            MenuAttr {
                visible: true,
                enabled: net_play && engine.available_controllers & (1 << port) != 0,
                checked: net_play && engine.controller_port == port,
                text: Some(format!("Player {} ({})", port + 1, label)),
            },
        );
    }
    snapshot.set(
        MenuId::NetPlaySpectator,
        MenuAttr {
            visible: true,
            enabled: net_play,
            checked: net_play && engine.controller_port == SPECTATOR_PORT,
            text: None,
        },
    );

    // Tools: recording
    let minimal_content = active && engine.special_mode;
    snapshot.set(MenuId::Movies, MenuAttr::enabled(!minimal_content));
    snapshot.set(
        MenuId::PlayMovie,
        MenuAttr::enabled(!net_play && !movie_busy && !minimal_content),
    );
    snapshot.set(
        MenuId::StopMovie,
        MenuAttr::enabled(active && !net_play && movie_busy && !minimal_content),
    );
    snapshot.set(
        MenuId::RecordMovie,
        MenuAttr::enabled(active && !movie_busy && !minimal_content),
    );
    snapshot.set(
        MenuId::RecordFromStart,
        MenuAttr::enabled(active && !client && !movie_busy && !minimal_content),
    );
    snapshot.set(
        MenuId::RecordFromNow,
        MenuAttr::enabled(active && !movie_busy && !minimal_content),
    );
    snapshot.set(
        MenuId::WaveRecord,
        MenuAttr::enabled(active && !engine.wave_recording),
    );
    snapshot.set(
        MenuId::WaveStop,
        MenuAttr::enabled(active && engine.wave_recording),
    );
    snapshot.set(MenuId::VideoRecorder, MenuAttr::enabled(!minimal));
    snapshot.set(
        MenuId::AviRecord,
        MenuAttr::enabled(active && !engine.avi_recording),
    );
    snapshot.set(
        MenuId::AviStop,
        MenuAttr::enabled(active && engine.avi_recording),
    );

    snapshot.set(MenuId::Debugger, MenuAttr::enabled(active && !net_play));
    snapshot.set(
        MenuId::TakeScreenshot,
        MenuAttr::enabled(active && !engine.special_mode),
    );

    snapshot
}

/// Publishes menu snapshots to the presentation layer
///
/// Owned by the control thread. Readers subscribe through a `watch` channel
/// and always see either the previous or the new snapshot, never a mix.
pub struct MenuProjector {
    engine: Arc<dyn EngineFacade>,
    metrics: Arc<Metrics>,
    snapshot_tx: watch::Sender<Arc<MenuSnapshot>>,
}

impl MenuProjector {
    pub fn new(engine: Arc<dyn EngineFacade>, metrics: Arc<Metrics>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(MenuSnapshot::default()));
        Self {
            engine,
            metrics,
            snapshot_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MenuSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Last published snapshot
    pub fn current(&self) -> Arc<MenuSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Recompute and publish the snapshot.
    ///
    /// # Returns
    /// `false` if an engine query failed; the previous snapshot stays in place
    pub fn refresh(&self, shell: &ShellView<'_>) -> bool {
        let engine = match EngineReadout::capture(self.engine.as_ref()) {
            Ok(readout) => readout,
            Err(e) => {
                self.metrics.record_projection_abort();
                tracing::debug!("Menu projection skipped: {}", e);
                return false;
            }
        };

        let snapshot = Arc::new(project(&engine, shell));
        self.snapshot_tx.send_replace(snapshot);
        self.metrics.record_projection_tick();
        true
    }
}
