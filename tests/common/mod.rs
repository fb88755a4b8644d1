//! Shared fakes for the integration tests
//!
//! - [`FakeEngine`]: in-memory engine that records loads and commands and can
//!   emit notifications to its subscribers
//! - [`FakeWindow`]: window with a fixed frame whose state stays observable
//!   after it is boxed into the shell
//! - [`ScriptedPrompter`] / [`FixedSelector`]: canned dialog answers

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use emushell::config::{ConfigManager, StartupSwitches};
use emushell::engine::{EngineError, EngineFacade, NotificationSink, SubscriptionId};
use emushell::models::{
    Bounds, NotificationEvent, Region, ScreenSize, Size, VideoFilter, WindowPlacement,
    WindowShowState,
};
use emushell::metrics::Metrics;
use emushell::services::{ArchiveSelection, ArchiveSelector, FirmwareInstaller};
use emushell::state::WindowHost;
use emushell::ui::{
    ControlQueue, FileFilter, NoGameConfigEditor, Prompt, Prompter, ShellController, ShellServices,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

/// A recorded call to [`EngineFacade::load`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCall {
    pub path: Utf8PathBuf,
    pub archive_index: Option<u32>,
    pub patch: Option<Utf8PathBuf>,
}

/// Engine state the tests can flip between steps
#[derive(Debug, Clone)]
pub struct EngineFlags {
    pub paused: bool,
    pub connected: bool,
    pub server_running: bool,
    pub special_mode: bool,
    pub vs_system: bool,
    pub pointer_device: bool,
    pub movie_playing: bool,
    pub disk_sides: u32,
    /// Output size at scale 1
    pub native: Size,
    pub speed: u32,
    pub scale: f64,
    pub fail_queries: bool,
    /// Fail only the disk side query
    pub fail_disk_query: bool,
    pub fail_loads: bool,
}

impl Default for EngineFlags {
    fn default() -> Self {
        Self {
            paused: false,
            connected: false,
            server_running: false,
            special_mode: false,
            vs_system: false,
            pointer_device: false,
            movie_playing: false,
            disk_sides: 0,
            native: Size::new(256, 240),
            speed: 100,
            scale: 2.0,
            fail_queries: false,
            fail_disk_query: false,
            fail_loads: false,
        }
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub flags: Mutex<EngineFlags>,
    loads: Mutex<Vec<LoadCall>>,
    commands: Mutex<Vec<String>>,
    sinks: Mutex<Vec<(u64, Arc<dyn NotificationSink>)>>,
    next_subscription: AtomicUsize,

    load_delay: Mutex<Duration>,
    active_loads: AtomicUsize,
    max_concurrent_loads: AtomicUsize,

    stop_requested: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_flags(&self, update: impl FnOnce(&mut EngineFlags)) {
        update(&mut self.flags.lock().unwrap());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    pub fn loads(&self) -> Vec<LoadCall> {
        self.loads.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn max_concurrent_loads(&self) -> usize {
        self.max_concurrent_loads.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    /// Deliver `event` to every subscriber on the calling thread.
    pub fn emit(&self, event: NotificationEvent) {
        let sinks: Vec<_> = self
            .sinks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            sink.notify(event);
        }
    }

    fn record(&self, command: impl Into<String>) -> Result<(), EngineError> {
        self.commands.lock().unwrap().push(command.into());
        Ok(())
    }

    fn query<T>(&self, read: impl FnOnce(&EngineFlags) -> T) -> Result<T, EngineError> {
        let flags = self.flags.lock().unwrap();
        if flags.fail_queries {
            return Err(EngineError::QueryFailed("engine busy".to_string()));
        }
        Ok(read(&flags))
    }
}

impl EngineFacade for FakeEngine {
    fn subscribe(&self, sink: Arc<dyn NotificationSink>) -> Result<SubscriptionId, EngineError> {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst) as u64;
        self.sinks.lock().unwrap().push((id, sink));
        Ok(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), EngineError> {
        self.sinks.lock().unwrap().retain(|(sink_id, _)| *sink_id != id.0);
        Ok(())
    }

    fn is_paused(&self) -> Result<bool, EngineError> {
        self.query(|f| f.paused)
    }
    fn is_connected(&self) -> Result<bool, EngineError> {
        self.query(|f| f.connected)
    }
    fn is_server_running(&self) -> Result<bool, EngineError> {
        self.query(|f| f.server_running)
    }
    fn is_special_mode(&self) -> Result<bool, EngineError> {
        self.query(|f| f.special_mode)
    }
    fn is_vs_system(&self) -> Result<bool, EngineError> {
        self.query(|f| f.vs_system)
    }
    fn is_debugger_running(&self) -> Result<bool, EngineError> {
        self.query(|_| false)
    }
    fn is_movie_playing(&self) -> Result<bool, EngineError> {
        self.query(|f| f.movie_playing)
    }
    fn is_movie_recording(&self) -> Result<bool, EngineError> {
        self.query(|_| false)
    }
    fn is_wave_recording(&self) -> Result<bool, EngineError> {
        self.query(|_| false)
    }
    fn is_avi_recording(&self) -> Result<bool, EngineError> {
        self.query(|_| false)
    }
    fn has_pointer_device(&self) -> Result<bool, EngineError> {
        self.query(|f| f.pointer_device)
    }
    fn disk_side_count(&self) -> Result<u32, EngineError> {
        if self.flags.lock().unwrap().fail_disk_query {
            return Err(EngineError::QueryFailed("disk drive busy".to_string()));
        }
        self.query(|f| f.disk_sides)
    }
    fn is_disk_auto_insert_enabled(&self) -> Result<bool, EngineError> {
        self.query(|_| false)
    }
    fn net_play_available_controllers(&self) -> Result<u8, EngineError> {
        self.query(|_| 0b1111)
    }
    fn net_play_controller_port(&self) -> Result<u8, EngineError> {
        self.query(|_| 0)
    }
    fn net_play_controller_label(&self, _port: u8) -> Result<String, EngineError> {
        self.query(|_| "Standard Controller".to_string())
    }
    fn emulation_speed(&self) -> Result<u32, EngineError> {
        self.query(|f| f.speed)
    }
    fn resource_name(&self) -> Result<Option<String>, EngineError> {
        self.query(|_| None)
    }
    fn minimal_player_title(&self) -> Result<Option<String>, EngineError> {
        self.query(|f| f.special_mode.then(|| "Soundtrack".to_string()))
    }
    fn screen_size(&self, ignore_scale: bool) -> Result<ScreenSize, EngineError> {
        self.query(|f| {
            let scale = if ignore_scale { 1.0 } else { f.scale };
            ScreenSize {
                width: (f64::from(f.native.width) * scale) as u32,
                height: (f64::from(f.native.height) * scale) as u32,
                scale,
            }
        })
    }
    fn save_state_timestamp(&self, _slot: u8) -> Result<Option<SystemTime>, EngineError> {
        self.query(|_| None)
    }

    fn load(
        &self,
        path: &Utf8Path,
        archive_index: Option<u32>,
        patch: Option<&Utf8Path>,
    ) -> Result<(), EngineError> {
        let active = self.active_loads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_loads.fetch_max(active, Ordering::SeqCst);

        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.loads.lock().unwrap().push(LoadCall {
            path: path.to_path_buf(),
            archive_index,
            patch: patch.map(Utf8Path::to_path_buf),
        });
        self.active_loads.fetch_sub(1, Ordering::SeqCst);

        if self.flags.lock().unwrap().fail_loads {
            return Err(EngineError::Io("unreadable archive".to_string()));
        }
        Ok(())
    }

    fn run(&self) -> Result<(), EngineError> {
        while !self.stop_requested.swap(false, Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(2));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.record("stop")
    }
    fn pause(&self) -> Result<(), EngineError> {
        self.flags.lock().unwrap().paused = true;
        self.record("pause")
    }
    fn resume(&self) -> Result<(), EngineError> {
        self.flags.lock().unwrap().paused = false;
        self.record("resume")
    }
    fn reset(&self) -> Result<(), EngineError> {
        self.record("reset")
    }
    fn power_cycle(&self) -> Result<(), EngineError> {
        self.record("power_cycle")
    }
    fn save_state(&self, slot: u8) -> Result<(), EngineError> {
        self.record(format!("save_state {slot}"))
    }
    fn load_state(&self, slot: u8) -> Result<(), EngineError> {
        self.record(format!("load_state {slot}"))
    }
    fn set_scale(&self, scale: f64) -> Result<(), EngineError> {
        self.flags.lock().unwrap().scale = scale;
        Ok(())
    }
    fn set_filter(&self, filter: VideoFilter) -> Result<(), EngineError> {
        self.record(format!("set_filter {filter}"))
    }
    fn set_region(&self, region: Region) -> Result<(), EngineError> {
        self.record(format!("set_region {region}"))
    }
    fn set_emulation_speed(&self, speed: u32) -> Result<(), EngineError> {
        self.flags.lock().unwrap().speed = speed;
        self.record(format!("set_emulation_speed {speed}"))
    }
    fn set_audio_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.record(format!("set_audio_enabled {enabled}"))
    }
    fn set_cheats_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.record(format!("set_cheats_enabled {enabled}"))
    }
    fn clear_cheats(&self) -> Result<(), EngineError> {
        self.record("clear_cheats")
    }
    fn apply_game_config(&self) -> Result<(), EngineError> {
        self.record("apply_game_config")
    }
    fn disconnect(&self) -> Result<(), EngineError> {
        self.flags.lock().unwrap().connected = false;
        self.record("disconnect")
    }
    fn stop_server(&self) -> Result<(), EngineError> {
        self.flags.lock().unwrap().server_running = false;
        self.record("stop_server")
    }
    fn insert_disk(&self, side: u32) -> Result<(), EngineError> {
        self.record(format!("insert_disk {side}"))
    }
    fn eject_disk(&self) -> Result<(), EngineError> {
        self.record("eject_disk")
    }
    fn switch_disk_side(&self) -> Result<(), EngineError> {
        self.record("switch_disk_side")
    }
    fn insert_coin(&self, port: u8) -> Result<(), EngineError> {
        self.record(format!("insert_coin {port}"))
    }
    fn play_movie(&self, path: &Utf8Path) -> Result<(), EngineError> {
        self.record(format!("play_movie {path}"))
    }
    fn display_message(&self, title: &str, message: &str) -> Result<(), EngineError> {
        self.record(format!("display_message {title} {message}"))
    }
    fn set_in_background(&self, _in_background: bool) -> Result<(), EngineError> {
        Ok(())
    }
    fn reset_key_state(&self) -> Result<(), EngineError> {
        self.record("reset_key_state")
    }
    fn release(&self) -> Result<(), EngineError> {
        self.record("release")
    }
}

/// Outer size minus client size of [`FakeWindow`]
pub const FRAME: Size = Size::new(16, 39);
pub const MENU_HEIGHT: u32 = 24;

#[derive(Debug, Clone)]
pub struct WindowState {
    pub placement: WindowPlacement,
    pub minimum: Size,
    pub render: Size,
    pub menu_visible: bool,
}

/// Window whose state is shared with the test through [`FakeWindow::state`].
#[derive(Clone)]
pub struct FakeWindow {
    state: Arc<Mutex<WindowState>>,
}

impl FakeWindow {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState {
                placement: WindowPlacement {
                    show_state: WindowShowState::Normal,
                    bounds: Bounds {
                        x: 120,
                        y: 90,
                        width: 600,
                        height: 500,
                    },
                    borderless: false,
                },
                minimum: Size::new(335, 320),
                render: Size::default(),
                menu_visible: true,
            })),
        }
    }

    pub fn state(&self) -> WindowState {
        self.state.lock().unwrap().clone()
    }

    /// Simulate the user dragging the window edge.
    pub fn drag_client_size(&self, client: Size) {
        let mut state = self.state.lock().unwrap();
        state.placement.bounds.width = client.width + FRAME.width;
        state.placement.bounds.height = client.height + FRAME.height;
    }
}

impl WindowHost for FakeWindow {
    fn placement(&self) -> WindowPlacement {
        self.state.lock().unwrap().placement
    }
    fn restore_placement(&mut self, placement: &WindowPlacement) {
        self.state.lock().unwrap().placement = *placement;
    }
    fn set_show_state(&mut self, show_state: WindowShowState) {
        self.state.lock().unwrap().placement.show_state = show_state;
    }
    fn set_borderless(&mut self, borderless: bool) {
        self.state.lock().unwrap().placement.borderless = borderless;
    }
    fn outer_size(&self) -> Size {
        let bounds = self.state.lock().unwrap().placement.bounds;
        Size::new(bounds.width, bounds.height)
    }
    fn set_outer_size(&mut self, size: Size) {
        let mut state = self.state.lock().unwrap();
        state.placement.bounds.width = size.width;
        state.placement.bounds.height = size.height;
    }
    fn client_size(&self) -> Size {
        self.outer_size().saturating_sub(FRAME)
    }
    fn set_client_size(&mut self, size: Size) {
        self.set_outer_size(Size::new(size.width + FRAME.width, size.height + FRAME.height));
    }
    fn minimum_size(&self) -> Size {
        self.state.lock().unwrap().minimum
    }
    fn set_minimum_size(&mut self, size: Size) {
        self.state.lock().unwrap().minimum = size;
    }
    fn render_area(&self) -> Size {
        let client = self.client_size();
        let menu = if self.state.lock().unwrap().menu_visible {
            MENU_HEIGHT
        } else {
            0
        };
        Size::new(client.width, client.height.saturating_sub(menu))
    }
    fn set_render_size(&mut self, size: Size) {
        self.state.lock().unwrap().render = size;
    }
    fn menu_bar_height(&self) -> u32 {
        MENU_HEIGHT
    }
    fn set_menu_visible(&mut self, visible: bool) {
        self.state.lock().unwrap().menu_visible = visible;
    }
}

/// Prompter answering from a script and recording everything it was shown.
#[derive(Clone, Default)]
pub struct ScriptedPrompter {
    confirms: Arc<Mutex<VecDeque<bool>>>,
    picks: Arc<Mutex<VecDeque<Option<Utf8PathBuf>>>>,
    shown: Arc<Mutex<Vec<Prompt>>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_confirm(&self, answer: bool) {
        self.confirms.lock().unwrap().push_back(answer);
    }

    pub fn answer_pick(&self, path: Option<Utf8PathBuf>) {
        self.picks.lock().unwrap().push_back(path);
    }

    pub fn shown(&self) -> Vec<Prompt> {
        self.shown.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &Prompt) -> bool {
        self.shown.lock().unwrap().push(prompt.clone());
        self.confirms.lock().unwrap().pop_front().unwrap_or(false)
    }

    fn acknowledge(&self, prompt: &Prompt) {
        self.shown.lock().unwrap().push(prompt.clone());
    }

    fn pick_file(&self, _title: &str, _filters: &[FileFilter]) -> Option<Utf8PathBuf> {
        self.picks.lock().unwrap().pop_front().flatten()
    }
}

/// Archive selector that always picks the same entry (or cancels).
pub struct FixedSelector {
    pub choice: Option<u32>,
    pub display_name: String,
    pub calls: AtomicUsize,
}

impl FixedSelector {
    pub fn new(choice: Option<u32>, display_name: &str) -> Arc<Self> {
        Arc::new(Self {
            choice,
            display_name: display_name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl ArchiveSelector for FixedSelector {
    fn select(&self, _path: &Utf8Path, _preselected: Option<u32>) -> Option<ArchiveSelection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.choice.map(|index| ArchiveSelection {
            archive_index: Some(index),
            display_name: self.display_name.clone(),
        })
    }
}

/// Temporary directory as a UTF-8 path.
pub fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

/// Create `name` inside `dir` with `contents`.
pub fn write_file(dir: &Utf8Path, name: &str, contents: &[u8]) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A shell wired to fakes, driven from the test thread as the control thread.
///
/// Field order matters: the runtime drops last.
pub struct Harness {
    pub shell: ShellController,
    pub queue: ControlQueue<ShellController>,
    pub engine: Arc<FakeEngine>,
    pub window: FakeWindow,
    pub prompter: ScriptedPrompter,
    pub metrics: Arc<Metrics>,
    pub dir: Utf8PathBuf,
    _temp: TempDir,
    pub runtime: tokio::runtime::Runtime,
}

impl Harness {
    pub fn new(selector: Arc<dyn ArchiveSelector>) -> Self {
        Self::with_switches(selector, &StartupSwitches::default())
    }

    pub fn with_switches(selector: Arc<dyn ArchiveSelector>, switches: &StartupSwitches) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let (temp, dir) = temp_dir();
        let engine = FakeEngine::new();
        let window = FakeWindow::new();
        let prompter = ScriptedPrompter::new();
        let metrics = Arc::new(Metrics::new());

        let services = ShellServices {
            engine: engine.clone(),
            window: Box::new(window.clone()),
            selector,
            prompter: Box::new(prompter.clone()),
            game_config: Box::new(NoGameConfigEditor),
            config_manager: ConfigManager::new(dir.join("config")).unwrap(),
            firmware: FirmwareInstaller::new(&dir),
            runtime: runtime.handle().clone(),
        };
        let (shell, queue) = ShellController::new(services, switches, metrics.clone()).unwrap();

        Self {
            shell,
            queue,
            engine,
            window,
            prompter,
            metrics,
            dir,
            _temp: temp,
            runtime,
        }
    }

    /// Run queued control tasks until `condition` holds.
    pub fn pump_until(&mut self, mut condition: impl FnMut(&ShellController) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            self.shell.process_pending(&mut self.queue);
            if condition(&self.shell) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Emit `event` from a separate thread, as the engine would.
    pub fn emit_from_engine_thread(&self, event: NotificationEvent) {
        let engine = self.engine.clone();
        std::thread::spawn(move || engine.emit(event)).join().unwrap();
    }

    /// Run every task currently queued.
    pub fn pump(&mut self) -> usize {
        self.shell.process_pending(&mut self.queue)
    }
}
