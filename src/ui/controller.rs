// Shell Controller - Owns all control-thread state and wires the components
//
// This module contains the ShellController which coordinates between:
// - EngineFacade (notifications in, commands out)
// - PresentationStateMachine (window mode and scale policy)
// - SingleFlightLoader (serialized resource loads)
// - MenuProjector (derived menu attributes)
// - ControlQueue (work marshaled from the engine and load threads)
//
// It handles:
// - Reacting to engine notifications on the control thread
// - User commands from menus, the render area and the window
// - File opening (resources, patches, movies) and the recent list
// - Firmware installation prompts
// - The shutdown sequence

use crate::config::{ConfigManager, StartupSwitches};
use crate::engine::{EngineFacade, EngineRunner, SubscriptionId};
use crate::metrics::Metrics;
use crate::models::{Region, RunState, ShellConfig, VideoFilter, WindowLocation};
use crate::services::{
    ArchiveSelector, FileKind, FirmwareError, FirmwareInstaller, LoadError, LoadOutcome,
    LoadRequest, SingleFlightLoader, detect_file_kind,
};
use crate::state::{PresentationStateMachine, WindowHost};
use crate::ui::bridge::{ControlHandle, ControlOwner, ControlQueue};
use crate::ui::dialogs::{
    ALL_FILES_FILTER, FIRMWARE_FILTER, GameConfigEditor, Prompt, Prompter, RESOURCE_FILTER,
};
use crate::ui::dispatcher::{FrameCounter, NotificationDispatcher, ShellEvents};
use crate::ui::projector::{AUTO_SAVE_SLOT, MenuProjector, SAVE_SLOT_COUNT, ShellView, SubMenuCache};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for the engine run thread.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Speed restored when leaving maximum speed, and forced by the minimal player.
const NORMAL_SPEED: u32 = 100;

/// External collaborators handed to [`ShellController::new`]
pub struct ShellServices {
    pub engine: Arc<dyn EngineFacade>,
    pub window: Box<dyn WindowHost>,
    pub selector: Arc<dyn ArchiveSelector>,
    pub prompter: Box<dyn Prompter>,
    pub game_config: Box<dyn GameConfigEditor>,
    pub config_manager: ConfigManager,
    pub firmware: FirmwareInstaller,
    pub runtime: tokio::runtime::Handle,
}

/// The resource last handed to the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    pub path: Utf8PathBuf,
    pub archive_index: Option<u32>,
}

/// Control-thread owner of the shell
///
/// Every method runs on the control thread. Work arriving from the engine
/// thread or the load worker goes through the [`ControlQueue`] returned by
/// [`new`](Self::new) and is executed by [`run`](Self::run) or
/// [`process_pending`](Self::process_pending).
///
/// # Example
/// ```ignore
/// let (mut shell, mut queue) = ShellController::new(services, &switches, metrics)?;
/// shell.start(&switches)?;
/// shell.run(&mut queue)?;
/// ```
pub struct ShellController {
    engine: Arc<dyn EngineFacade>,
    presentation: PresentationStateMachine,
    loader: SingleFlightLoader,
    projector: MenuProjector,
    runner: EngineRunner,
    control: ControlHandle<ShellController>,

    config_manager: ConfigManager,
    config: ShellConfig,

    prompter: Box<dyn Prompter>,
    game_config: Box<dyn GameConfigEditor>,
    firmware: FirmwareInstaller,

    submenus: SubMenuCache,
    frames: FrameCounter,
    metrics: Arc<Metrics>,

    current: Option<LoadedResource>,
    subscription: Option<SubscriptionId>,
    runtime: tokio::runtime::Handle,
    focused: bool,
    exit_requested: bool,
    shut_down: bool,
}

impl ShellController {
    /// Create the controller on the control thread.
    ///
    /// Loads the settings (with the startup overrides), applies them to the
    /// engine and subscribes the notification dispatcher.
    ///
    /// # Arguments
    /// * `services` - Engine, window, dialogs and other collaborators
    /// * `switches` - Parsed startup switches
    /// * `metrics` - Shared counters
    ///
    /// # Returns
    /// The controller and the queue it must be driven with
    pub fn new(
        services: ShellServices,
        switches: &StartupSwitches,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, ControlQueue<Self>)> {
        let ShellServices {
            engine,
            window,
            selector,
            prompter,
            game_config,
            mut config_manager,
            firmware,
            runtime,
        } = services;

        config_manager.set_do_not_save(switches.do_not_save_settings);
        let config = config_manager
            .load(&switches.overrides)
            .context("Failed to load shell settings")?;

        let queue = ControlQueue::new();
        let control = queue.handle();
        let frames = FrameCounter::new();

        let mut presentation =
            PresentationStateMachine::new(window, engine.clone(), config.video.scale);
        presentation.set_auto_hide_menu(config.preferences.auto_hide_menu);

        let loader = SingleFlightLoader::new(engine.clone(), selector, metrics.clone(), &runtime);
        let projector = MenuProjector::new(engine.clone(), metrics.clone());
        let runner = EngineRunner::new(engine.clone());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            engine.clone(),
            control.clone(),
            metrics.clone(),
            frames.clone(),
        ));
        let subscription = engine
            .subscribe(dispatcher)
            .context("Failed to subscribe to engine notifications")?;

        let mut shell = Self {
            engine,
            presentation,
            loader,
            projector,
            runner,
            control,
            config_manager,
            config,
            prompter,
            game_config,
            firmware,
            submenus: SubMenuCache::default(),
            frames,
            metrics,
            current: None,
            subscription: Some(subscription),
            runtime,
            focused: true,
            exit_requested: false,
            shut_down: false,
        };

        shell.apply_config()?;
        tracing::info!("Shell controller initialized");

        Ok((shell, queue))
    }

    /// Act on the startup switches: fullscreen and the resource to open.
    pub fn start(&mut self, switches: &StartupSwitches) -> Result<()> {
        if switches.fullscreen {
            self.presentation.set_fullscreen(true)?;
        }
        if let Some(resource) = &switches.resource {
            self.open_file(resource)?;
        }
        self.refresh_menus();
        Ok(())
    }

    /// Run the control loop until exit is requested, then shut down.
    ///
    /// Blocks the calling thread, which must be the thread that created the
    /// controller. Menus are re-projected on every timer tick.
    pub fn run(&mut self, queue: &mut ControlQueue<Self>) -> Result<()> {
        tracing::info!("Starting control loop");
        let metrics = self.metrics.clone();
        let interval =
            Duration::from_millis(self.config.preferences.menu_refresh_interval_ms.max(1));
        let runtime = self.runtime.clone();

        runtime.block_on(async {
            let mut ticker = tokio::time::interval(interval);
            while !self.exit_requested {
                tokio::select! {
                    task = queue.next() => match task {
                        Some(task) => {
                            ControlQueue::execute(task, self, &metrics);
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        self.refresh_menus();
                    }
                }
            }
        });

        self.shutdown();
        Ok(())
    }

    /// Execute every task already queued, without waiting.
    ///
    /// # Returns
    /// The number of tasks executed
    pub fn process_pending(&mut self, queue: &mut ControlQueue<Self>) -> usize {
        let metrics = self.metrics.clone();
        let mut executed = 0;
        while !self.exit_requested {
            let Some(task) = queue.try_next() else {
                break;
            };
            ControlQueue::execute(task, self, &metrics);
            executed += 1;
        }
        executed
    }

    /// Re-project the menus from current engine and shell state.
    ///
    /// # Returns
    /// `false` if the tick was abandoned because an engine query failed
    pub fn refresh_menus(&mut self) -> bool {
        if let Err(e) = self.engine.set_in_background(!self.focused) {
            tracing::trace!("Background flag not updated: {}", e);
        }

        let view = ShellView {
            presentation: self.presentation.state(),
            config: &self.config,
            submenus: &self.submenus,
            loads_in_flight: self.loader.session().in_flight(),
            frame_count: self.frames.get(),
        };
        self.projector.refresh(&view)
    }

    // ===== Accessors =====

    pub fn presentation(&self) -> &PresentationStateMachine {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut PresentationStateMachine {
        &mut self.presentation
    }

    pub fn projector(&self) -> &MenuProjector {
        &self.projector
    }

    pub fn loader(&self) -> &SingleFlightLoader {
        &self.loader
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn current_resource(&self) -> Option<&LoadedResource> {
        self.current.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    pub fn is_exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn is_run_loop_active(&self) -> bool {
        self.runner.is_running()
    }

    // ===== Files =====

    /// Open a file chosen by the user, dropped on the window or passed at startup.
    ///
    /// Patches are applied to a resource, movies are played, anything else is
    /// loaded as a resource.
    pub fn open_file(&mut self, path: &Utf8Path) -> Result<()> {
        if !path.is_file() {
            self.prompter.acknowledge(&Prompt::FileNotFound {
                path: path.to_path_buf(),
            });
            return Ok(());
        }

        let kind = detect_file_kind(path).with_context(|| format!("Failed to read {}", path))?;
        tracing::debug!("Opening {} as {:?}", path, kind);

        match kind {
            FileKind::Patch => self.open_patch(path),
            FileKind::Movie => {
                self.engine.play_movie(path)?;
                Ok(())
            }
            FileKind::Resource => self.load(
                LoadRequest::new(path)
                    .with_auto_apply_patch(self.config.preferences.auto_load_patches),
            ),
        }
    }

    /// Let the user pick a resource and open it.
    pub fn open_with_picker(&mut self) -> Result<()> {
        let Some(path) = self
            .prompter
            .pick_file("Open", &[RESOURCE_FILTER, ALL_FILES_FILTER])
        else {
            return Ok(());
        };
        self.open_file(&path)
    }

    fn open_patch(&mut self, patch: &Utf8Path) -> Result<()> {
        if !self.presentation.state().is_active() {
            if !self.prompter.confirm(&Prompt::SelectResourceForPatch) {
                return Ok(());
            }
            let Some(resource) = self.prompter.pick_file("Select game", &[RESOURCE_FILTER]) else {
                return Ok(());
            };
            return self.load(LoadRequest::new(resource).with_patch(patch));
        }

        if !self.prompter.confirm(&Prompt::PatchAndReset) {
            return Ok(());
        }
        let Some(current) = self.current.clone() else {
            tracing::warn!("Patch requested while running but no current resource is known");
            return Ok(());
        };
        self.load(
            LoadRequest::new(current.path)
                .with_archive_index(current.archive_index)
                .with_patch(patch),
        )
    }

    /// Reload an entry of the recent list.
    pub fn load_recent(&mut self, index: usize) -> Result<()> {
        let Some(item) = self.config.recent_files.get(index).cloned() else {
            tracing::debug!("No recent item at index {}", index);
            return Ok(());
        };

        self.load(
            LoadRequest::new(item.path)
                .with_archive_index(item.archive_index)
                .with_auto_apply_patch(self.config.preferences.auto_load_patches),
        )
    }

    /// Hand a request to the loader; the outcome comes back on the control queue.
    pub fn load(&mut self, req: LoadRequest) -> Result<()> {
        let requested = LoadedResource {
            path: req.path.clone(),
            archive_index: req.archive_index,
        };
        let control = self.control.clone();

        let queued = self.loader.load(req, move |outcome| {
            // If the queue is gone the outcome is dropped, which still
            // releases its in-flight slot.
            if let Err(e) = control.post(move |shell: &mut ShellController| {
                shell.finish_load(outcome);
                Ok(())
            }) {
                tracing::warn!("Load finished after the control loop stopped: {}", e);
            }
        });

        match queued {
            Ok(()) => {
                self.current = Some(requested);
                self.refresh_menus();
                Ok(())
            }
            Err(LoadError::UserCancelled) => {
                tracing::debug!("Load of {} cancelled by the user", requested.path);
                Ok(())
            }
            Err(LoadError::PathNotFound(path)) => {
                self.prompter.acknowledge(&Prompt::FileNotFound { path });
                Ok(())
            }
            Err(e) => Err(e).context("Failed to queue load"),
        }
    }

    fn finish_load(&mut self, mut outcome: LoadOutcome) {
        outcome.complete();

        self.config
            .recent_files
            .add(&outcome.path, &outcome.display_name, outcome.archive_index);

        if let Some(current) = self.current.as_mut().filter(|c| c.path == outcome.path) {
            current.archive_index = outcome.archive_index;
        }

        if let Err(e) = &outcome.result {
            tracing::error!("{}", e);
            self.prompter.acknowledge(&Prompt::LoadFailed {
                path: outcome.path.clone(),
                reason: e.to_string(),
            });
        }

        self.refresh_menus();
    }

    // ===== Game commands =====

    pub fn toggle_pause(&mut self) -> Result<RunState> {
        Ok(self.presentation.toggle_pause()?)
    }

    pub fn reset(&mut self) -> Result<()> {
        Ok(self.engine.reset()?)
    }

    pub fn power_cycle(&mut self) -> Result<()> {
        Ok(self.engine.power_cycle()?)
    }

    /// Stop the loaded resource. The engine confirms with ResourceStopped.
    pub fn power_off(&mut self) -> Result<()> {
        Ok(self.engine.stop()?)
    }

    fn can_save_state(&self) -> Result<bool> {
        Ok(self.presentation.state().is_active()
            && !self.engine.is_connected()?
            && !self.engine.is_special_mode()?)
    }

    /// Save to slot `1..=7`.
    ///
    /// # Returns
    /// `false` if saving is not possible right now
    pub fn save_state(&mut self, slot: u8) -> Result<bool> {
        if !(1..=SAVE_SLOT_COUNT).contains(&slot) || !self.can_save_state()? {
            tracing::debug!("Save to slot {} refused", slot);
            return Ok(false);
        }

        self.engine.save_state(slot)?;
        self.refresh_submenus();
        Ok(true)
    }

    /// Load from slot `1..=8`; slot 8 holds the automatic save.
    ///
    /// # Returns
    /// `false` if loading is not possible right now
    pub fn load_state(&mut self, slot: u8) -> Result<bool> {
        let movie_active = self.engine.is_movie_playing()? || self.engine.is_movie_recording()?;
        if !(1..=AUTO_SAVE_SLOT).contains(&slot) || movie_active || !self.can_save_state()? {
            tracing::debug!("Load from slot {} refused", slot);
            return Ok(false);
        }

        self.engine.load_state(slot)?;
        Ok(true)
    }

    /// Re-read disk and slot sub-menus, keeping the old ones on failure.
    fn refresh_submenus(&mut self) {
        match SubMenuCache::capture(self.engine.as_ref()) {
            Ok(submenus) => self.submenus = submenus,
            Err(e) => tracing::warn!("Sub-menus not refreshed: {}", e),
        }
    }

    pub fn insert_disk(&mut self, side: u32) -> Result<()> {
        Ok(self.engine.insert_disk(side)?)
    }

    pub fn eject_disk(&mut self) -> Result<()> {
        Ok(self.engine.eject_disk()?)
    }

    pub fn switch_disk_side(&mut self) -> Result<()> {
        Ok(self.engine.switch_disk_side()?)
    }

    pub fn insert_coin(&mut self, coin_slot: u8) -> Result<()> {
        Ok(self.engine.insert_coin(coin_slot)?)
    }

    // ===== Options =====

    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        Ok(self.presentation.set_scale(scale)?)
    }

    /// Scale the output to the current window size.
    pub fn set_custom_scale(&mut self) -> Result<()> {
        Ok(self.presentation.set_scale_from_window_size()?)
    }

    pub fn set_video_filter(&mut self, filter: VideoFilter) -> Result<()> {
        self.config.video.filter = filter;
        Ok(self.presentation.set_video_filter(filter)?)
    }

    pub fn toggle_fullscreen(&mut self) -> Result<()> {
        Ok(self.presentation.toggle_fullscreen()?)
    }

    pub fn set_region(&mut self, region: Region) -> Result<()> {
        self.config.region = region;
        Ok(self.engine.set_region(region)?)
    }

    /// Set the emulation speed in percent (0 means unlimited).
    pub fn set_emulation_speed(&mut self, speed: u32) -> Result<()> {
        self.config.emulation.speed = speed;
        Ok(self.engine.set_emulation_speed(speed)?)
    }

    /// Switch between unlimited and normal speed.
    pub fn toggle_maximum_speed(&mut self) -> Result<()> {
        let speed = if self.config.emulation.speed == 0 {
            NORMAL_SPEED
        } else {
            0
        };
        self.set_emulation_speed(speed)
    }

    // ===== Window and render area =====

    pub fn on_window_resized(&mut self) -> Result<()> {
        Ok(self.presentation.on_user_resize()?)
    }

    /// Double-clicking the render area toggles fullscreen, except when a
    /// pointer device uses the mouse.
    pub fn on_render_double_clicked(&mut self) -> Result<()> {
        if self.engine.has_pointer_device()? {
            return Ok(());
        }
        self.toggle_fullscreen()
    }

    pub fn on_render_clicked(&mut self) {
        self.presentation.on_render_clicked();
    }

    pub fn on_pointer_moved(&mut self, y: i32, menu_has_focus: bool) {
        self.presentation.on_pointer_moved(y, menu_has_focus);
    }

    /// Window gained or lost focus. Held keys are released either way.
    pub fn on_focus_changed(&mut self, focused: bool) -> Result<()> {
        self.focused = focused;
        Ok(self.engine.reset_key_state()?)
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    // ===== Internals =====

    /// Push the persisted settings to the engine.
    fn apply_config(&mut self) -> Result<()> {
        self.engine.set_region(self.config.region)?;
        self.engine
            .set_emulation_speed(self.config.emulation.speed)?;
        self.engine.set_audio_enabled(self.config.audio.enabled)?;
        self.engine
            .set_cheats_enabled(!self.config.disable_all_cheats)?;
        Ok(())
    }

    /// Start the run loop if it is not already running.
    fn start_run_loop(&mut self) -> Result<()> {
        let control = self.control.clone();
        let started = self.runner.start(move |result| {
            if let Err(e) = result {
                let reason = e.to_string();
                let posted = control.post(move |shell: &mut ShellController| {
                    shell
                        .prompter
                        .acknowledge(&Prompt::UnexpectedError { reason });
                    Ok(())
                });
                if posted.is_err() {
                    tracing::warn!("Run loop error could not be reported");
                }
            }
        })?;

        if started {
            tracing::debug!("Engine run loop started");
        }
        Ok(())
    }

    fn save_config(&self) {
        if let Err(e) = self.config_manager.save(&self.config) {
            tracing::warn!("Failed to save settings: {:#}", e);
        }
    }

    /// Orderly shutdown. Every step is attempted even if an earlier one fails.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        tracing::info!("Shutting down shell");

        if let Some(id) = self.subscription.take() {
            if let Err(e) = self.engine.unsubscribe(id) {
                tracing::warn!("Failed to unsubscribe from notifications: {}", e);
            }
        }

        match self.engine.emulation_speed() {
            Ok(speed) => self.config.emulation.speed = speed,
            Err(e) => tracing::warn!("Emulation speed not persisted: {}", e),
        }
        self.config.video.scale = self.presentation.state().regular_scale;
        let bounds = self.presentation.window().placement().bounds;
        self.config.window_location = Some(WindowLocation {
            x: bounds.x,
            y: bounds.y,
        });

        if let Err(e) = self.engine.stop() {
            tracing::warn!("Failed to stop engine: {}", e);
        }
        if !self.runner.join(SHUTDOWN_JOIN_TIMEOUT) {
            tracing::warn!("Engine run loop did not stop in time");
        }
        if let Err(e) = self.engine.release() {
            tracing::warn!("Failed to release engine: {}", e);
        }

        self.save_config();
        self.metrics.log_summary();
    }
}

impl ControlOwner for ShellController {
    fn refresh(&mut self) -> Result<()> {
        self.refresh_menus();
        Ok(())
    }
}

impl ShellEvents for ShellController {
    fn on_resource_loaded(&mut self) -> Result<()> {
        self.engine.set_region(self.config.region)?;

        if self.engine.is_special_mode()? {
            self.presentation.enter_minimal_player();
            self.engine.set_emulation_speed(NORMAL_SPEED)?;
        } else {
            self.presentation.leave_minimal_player()?;
        }
        self.frames.reset();

        // Labels from the previous resource must not survive a failed capture
        self.submenus = SubMenuCache::default();
        self.refresh_submenus();
        self.engine
            .set_cheats_enabled(!self.config.disable_all_cheats)?;
        self.engine.apply_game_config()?;

        if self.submenus.vs_system && self.config.preferences.show_game_config_on_load {
            if let Some(current) = &self.current {
                if self.game_config.edit(&current.path)? {
                    self.engine.apply_game_config()?;
                }
            }
        }

        let run_state = if self.engine.is_paused()? {
            RunState::Paused
        } else {
            RunState::Running
        };
        self.presentation.set_run_state(run_state);

        self.start_run_loop()?;
        self.presentation.update_viewer_size()?;
        Ok(())
    }

    fn on_resource_reset(&mut self) -> Result<()> {
        self.frames.reset();
        if self.engine.is_special_mode()? {
            self.presentation.enter_minimal_player();
        }
        Ok(())
    }

    fn on_peer_disconnected(&mut self) -> Result<()> {
        tracing::info!("Net play peer disconnected, reapplying settings");
        self.apply_config()
    }

    fn on_resource_stopped(&mut self) -> Result<()> {
        self.current = None;
        self.submenus = SubMenuCache::default();
        self.engine.clear_cheats()?;
        self.presentation.on_resource_stopped()?;
        Ok(())
    }

    fn on_presentation_size_changed(&mut self) -> Result<()> {
        Ok(self.presentation.update_viewer_size()?)
    }

    fn on_firmware_missing(&mut self) -> Result<()> {
        if !self.prompter.confirm(&Prompt::FirmwareNotFound) {
            return Ok(());
        }
        let Some(source) = self
            .prompter
            .pick_file("Select firmware", &[FIRMWARE_FILTER, ALL_FILES_FILTER])
        else {
            return Ok(());
        };

        match self.firmware.install(&source) {
            Ok(target) => {
                tracing::info!("Firmware installed to {}", target);
                if let Some(current) = self.current.clone() {
                    self.load(
                        LoadRequest::new(current.path)
                            .with_archive_index(current.archive_index)
                            .with_auto_apply_patch(self.config.preferences.auto_load_patches),
                    )?;
                }
            }
            Err(FirmwareError::InvalidFirmware { digest, .. }) => {
                tracing::warn!("Rejected firmware {} (md5 {})", source, digest);
                self.prompter.acknowledge(&Prompt::InvalidFirmware { digest });
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.prompter.acknowledge(&Prompt::UnexpectedError {
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn on_exit_requested(&mut self) -> Result<()> {
        tracing::info!("Engine requested exit");
        self.request_exit();
        Ok(())
    }

    fn on_cheats_toggled(&mut self) -> Result<()> {
        self.config.disable_all_cheats = !self.config.disable_all_cheats;
        if self.config.disable_all_cheats {
            self.engine.display_message("Cheats", "CheatsDisabled")?;
        }
        self.engine
            .set_cheats_enabled(!self.config.disable_all_cheats)?;
        self.save_config();
        Ok(())
    }

    fn on_audio_toggled(&mut self) -> Result<()> {
        self.config.audio.enabled = !self.config.audio.enabled;
        self.engine.set_audio_enabled(self.config.audio.enabled)?;
        self.save_config();
        Ok(())
    }
}
