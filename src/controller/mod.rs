//! Main window controller.
//!
//! [`MainController`] owns the workbench set, the recent files list and the
//! pipeline handles, and mediates between the settings store, the device
//! facade and the user. It has no Slint dependency: the window shell turns
//! widget callbacks into [`Command`]s and renders [`WindowView`] snapshots.
//!
//! All methods run on the UI thread. Device threads only reach the controller
//! by enqueuing [`Command::DeviceUnplugged`] through a [`CommandSender`].

pub mod commands;
pub mod dialogs;

pub use commands::{
    COMMAND_QUEUE_CAPACITY, Command, CommandReceiver, CommandSender, Flow, HelpLink, ViewToggle,
    command_channel,
};
pub use dialogs::{Dialogs, FileKind};

use crate::config::{MODEL_EXTENSION, ProfileError, ProfileManager, normalize_extension};
use crate::models::{
    Category, LastFiles, MachineSettings, Preferences, WorkbenchKind, WorkbenchSet,
};
use crate::services::{
    CalibrationProfile, Cancellable, DeviceError, DeviceFacade, DeviceKind, DriverProfile,
    MeshCodec, PipelineHandles, RoiProfile, ScanControl, ScanProfile,
};
use crate::state::SettingsStore;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for a running scan to acknowledge the stop
pub const SCAN_STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Dialog panels rendered by the window shell rather than natively
#[derive(Debug, Clone, PartialEq)]
pub enum PendingDialog {
    Preferences {
        serial_ports: Vec<String>,
        video_devices: Vec<String>,
    },
    MachineSettings,
    Welcome,
}

/// Collaborators handed to the controller at construction
pub struct ControllerParts {
    pub store: SettingsStore,
    pub profiles: ProfileManager,
    pub device: Box<dyn DeviceFacade>,
    pub dialogs: Box<dyn Dialogs>,
    pub codec: Box<dyn MeshCodec>,
    pub scan: Arc<dyn ScanControl>,
    pub laser_triangulation: Arc<dyn Cancellable>,
    pub platform_extrinsics: Arc<dyn Cancellable>,
    /// Used to wait for the scan stop acknowledgement during shutdown
    pub runtime: tokio::runtime::Handle,
}

/// Everything the window shell needs to render one frame of state
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub workbench_names: Vec<&'static str>,
    pub active_index: usize,
    pub model_actions_enabled: bool,
    pub connected: bool,
    pub status: bool,
    pub content_enabled: bool,
    pub panel_visible: bool,
    pub video_visible: bool,
    pub scene_visible: bool,
    pub model_points: Option<usize>,
    pub last_files: Vec<String>,
    pub view_flags: Vec<(ViewToggle, bool)>,
    pub dialog: Option<PendingDialog>,
    pub layout_revision: u64,
}

pub struct MainController {
    store: SettingsStore,
    profiles: ProfileManager,
    device: Box<dyn DeviceFacade>,
    dialogs: Box<dyn Dialogs>,
    codec: Box<dyn MeshCodec>,
    scan: Arc<dyn ScanControl>,
    laser_triangulation: Arc<dyn Cancellable>,
    platform_extrinsics: Arc<dyn Cancellable>,
    runtime: tokio::runtime::Handle,
    commands: CommandSender,

    workbenches: WorkbenchSet,
    last_files: LastFiles,
    pipeline: PipelineHandles,
    connected: bool,
    dialog: Option<PendingDialog>,
    shut_down: bool,
}

impl MainController {
    /// Build the controller and bring every collaborator in sync with the
    /// settings: restore the workbench, pick devices, push all profiles and
    /// register the unplug callbacks.
    pub fn new(parts: ControllerParts, commands: CommandSender) -> Self {
        let (stored_workbench, last_files) = parts.store.read(|s| {
            (
                s.preferences.workbench.clone(),
                LastFiles::from_persisted(&s.preferences.last_files),
            )
        });
        let initial = WorkbenchKind::from_stored(&stored_workbench);

        let mut controller = Self {
            store: parts.store,
            profiles: parts.profiles,
            device: parts.device,
            dialogs: parts.dialogs,
            codec: parts.codec,
            scan: parts.scan,
            laser_triangulation: parts.laser_triangulation,
            platform_extrinsics: parts.platform_extrinsics,
            runtime: parts.runtime,
            commands,
            workbenches: WorkbenchSet::new(initial),
            last_files,
            pipeline: PipelineHandles::default(),
            connected: false,
            dialog: None,
            shut_down: false,
        };

        let prefs = controller.store.read(|s| s.preferences.clone());
        controller.workbenches.apply_view_preferences(&prefs);
        controller.select(initial);

        controller.initialize_driver();
        if let Err(e) = controller.update_profile() {
            controller.report_config_error(&e);
        }
        controller.register_unplug_callbacks();

        tracing::info!("Main controller initialized on {} workbench", initial);
        controller
    }

    /// Handle one command. Returns [`Flow::Exit`] when the window should close.
    pub fn dispatch(&mut self, command: Command) -> Flow {
        tracing::debug!("Dispatching {:?}", command);

        match command {
            Command::LoadModel => self.load_model(),
            Command::SaveModel => self.save_model(),
            Command::ClearModel => self.clear_model(),
            Command::OpenRecent(path) => self.open_recent(&path),
            Command::OpenProfile(category) => self.on_open_profile(category),
            Command::SaveProfile(category) => self.on_save_profile(category),
            Command::ResetProfile(category) => self.on_reset_profile(category),
            Command::Exit => return Flow::Exit,

            Command::ShowPreferences => self.show_preferences(),
            Command::ApplyPreferences(prefs) => self.apply_preferences(*prefs),
            Command::ShowMachineSettings => self.show_machine_settings(),
            Command::ApplyMachineSettings(machine) => self.apply_machine_settings(machine),
            Command::CloseDialog => self.dialog = None,

            Command::ToggleView(toggle, checked) => self.toggle_view(toggle, checked),

            Command::SelectWorkbench(name) => {
                self.select_workbench(&name);
            }
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
            Command::DeviceUnplugged(kind) => self.on_device_unplugged(kind),

            Command::Welcome => self.dialog = Some(PendingDialog::Welcome),
            Command::OpenLink(link) => self.dialogs.open_url(link.url()),
            Command::About => self.dialogs.show_info("About Horus", &about_text()),
        }

        Flow::Continue
    }

    /// Dispatch a batch in order, stopping at the first command that exits.
    ///
    /// Commands queued after an exit are dropped.
    pub fn dispatch_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Flow {
        for command in commands {
            if self.dispatch(command) == Flow::Exit {
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    // ===== Workbench selection =====

    /// Switch to the workbench with the given key or display name.
    ///
    /// Unknown names are logged and ignored; returns whether a switch happened.
    pub fn select_workbench(&mut self, name: &str) -> bool {
        match WorkbenchKind::from_name(name) {
            Some(kind) => {
                self.select(kind);
                true
            }
            None => {
                tracing::warn!("Ignoring selection of unknown workbench {:?}", name);
                false
            }
        }
    }

    fn select(&mut self, kind: WorkbenchKind) {
        self.workbenches.select(kind);
        self.store
            .update(|s| s.preferences.workbench = kind.key().to_string());
        tracing::info!(
            "Active workbench: {} (model actions {})",
            kind,
            if self.model_actions_enabled() { "enabled" } else { "disabled" }
        );
    }

    /// Load/Save/Clear Model are only offered on the scanning workbench
    pub fn model_actions_enabled(&self) -> bool {
        self.workbenches.active() == WorkbenchKind::Scanning
    }

    // ===== Connection =====

    fn connect(&mut self) {
        if self.connected {
            return;
        }
        match self.device.connect() {
            Ok(()) => self.on_connect(),
            Err(e) => {
                tracing::error!("Connection failed: {}", e);
                self.dialogs.show_error("Connection error", &e.to_string());
            }
        }
    }

    fn disconnect(&mut self) {
        if !self.connected {
            tracing::debug!("Disconnect requested while already disconnected");
            return;
        }
        self.disconnect_device();
        self.on_disconnect();
    }

    /// Enable every workbench, then notify the active one
    pub fn on_connect(&mut self) {
        for bench in self.workbenches.iter_mut() {
            bench.enable_content();
        }
        self.workbenches.active_bench_mut().on_connect();
        self.connected = true;
    }

    /// Mirror of [`on_connect`](Self::on_connect); a no-op when already disconnected
    pub fn on_disconnect(&mut self) {
        if !self.connected {
            return;
        }
        for bench in self.workbenches.iter_mut() {
            bench.disable_content();
        }
        self.workbenches.active_bench_mut().on_disconnect();
        self.connected = false;
    }

    /// Forced disconnect after a device vanished
    pub fn on_device_unplugged(&mut self, kind: DeviceKind) {
        tracing::error!("The {} was unplugged", kind);

        self.halt_workbenches();
        self.disconnect_device();
        self.on_disconnect();

        self.dialogs
            .show_error(kind.unplugged_title(), kind.unplugged_message());
    }

    /// Stop the scan, cancel both calibrations and clear every workbench
    /// status. The device stays untouched.
    pub fn halt_workbenches(&mut self) {
        self.scan.stop();
        self.laser_triangulation.cancel();
        self.platform_extrinsics.cancel();
        for bench in self.workbenches.iter_mut() {
            bench.set_status(false);
        }
    }

    fn disconnect_device(&mut self) {
        match self.device.disconnect() {
            Ok(()) => {}
            Err(DeviceError::NotConnected) => tracing::debug!("Device was not connected"),
            Err(e) => tracing::error!("Failed to disconnect device: {}", e),
        }
    }

    fn register_unplug_callbacks(&mut self) {
        for kind in [DeviceKind::Board, DeviceKind::Camera] {
            let commands = self.commands.clone();
            self.device.set_unplug_callback(
                kind,
                Some(Box::new(move || {
                    commands.send(Command::DeviceUnplugged(kind))
                })),
            );
        }
    }

    // ===== Profile synchronization =====

    /// Replace unavailable serial port / camera selections with the first
    /// device found, then push the driver profile.
    pub fn initialize_driver(&mut self) {
        let ports = self.device.list_serial_ports();
        let cameras = self.device.list_video_devices();

        self.store.update(|s| {
            let prefs = &mut s.preferences;
            if let Some(first) = ports.first() {
                if !ports.contains(&prefs.serial_name) {
                    tracing::info!("Serial port {} not found, using {}", prefs.serial_name, first);
                    prefs.serial_name = first.clone();
                }
            }
            if let Some(first) = cameras.first() {
                if !cameras.contains(&prefs.camera_id) {
                    tracing::info!("Camera {} not found, using {}", prefs.camera_id, first);
                    prefs.camera_id = first.clone();
                }
            }
        });

        if let Err(e) = self.update_driver_profile() {
            self.report_config_error(&e);
        }
    }

    pub fn update_driver_profile(&mut self) -> Result<(), ProfileError> {
        let profile = self
            .store
            .read(|s| DriverProfile::from_preferences(&s.preferences))?;
        self.device.apply_profile(&profile);
        Ok(())
    }

    /// Push scan, segmentation, ROI, pattern and calibration values.
    ///
    /// Both profiles are built before anything is written.
    pub fn update_profile(&mut self) -> Result<(), ProfileError> {
        let (scan, calibration) = self.store.read(|s| {
            Ok::<_, ProfileError>((
                ScanProfile::from_settings(s)?,
                CalibrationProfile::from_settings(s)?,
            ))
        })?;

        scan.apply(&mut self.pipeline);
        self.apply_calibration(&calibration);
        tracing::debug!("Profile pushed to pipeline handles");
        Ok(())
    }

    pub fn update_calibration_profile(&mut self) -> Result<(), ProfileError> {
        let calibration = self.store.read(CalibrationProfile::from_settings)?;
        self.apply_calibration(&calibration);
        Ok(())
    }

    fn apply_calibration(&mut self, calibration: &CalibrationProfile) {
        self.device.set_frame_rate(calibration.framerate);
        calibration.apply(&mut self.pipeline);
    }

    /// Re-push after `categories` changed and refresh the visible controls
    fn resync(&mut self, categories: &[Category]) {
        if categories.contains(&Category::Preferences) {
            if let Err(e) = self.update_driver_profile() {
                self.report_config_error(&e);
            }
        }
        if let Err(e) = self.update_profile() {
            self.report_config_error(&e);
        }
        self.workbenches.active_bench_mut().update_controls();
    }

    fn report_config_error(&self, error: &ProfileError) {
        tracing::error!("Configuration error: {}", error);
        self.dialogs
            .show_error("Configuration error", &error.to_string());
    }

    // ===== Profile files =====

    pub fn on_open_profile(&mut self, category: Category) {
        let Some(path) = self.dialogs.pick_open_file(
            "Select profile file to load",
            FileKind::Profile,
            self.profiles.profile_dir(),
        ) else {
            return;
        };

        match self
            .store
            .load_categories(&self.profiles, &path, &[category])
        {
            Ok(_) => self.resync(&[category]),
            Err(e) => {
                tracing::error!("Failed to open {} profile: {}", category.label(), e);
                self.dialogs.show_error("Failed to open profile", &e.to_string());
            }
        }
    }

    pub fn on_save_profile(&mut self, category: Category) {
        let Some(path) = self.dialogs.pick_save_file(
            "Select profile file to save",
            FileKind::Profile,
            self.profiles.profile_dir(),
        ) else {
            return;
        };

        if let Err(e) = self
            .store
            .save_categories(&self.profiles, &path, &[category])
        {
            tracing::error!("Failed to save {} profile: {}", category.label(), e);
            self.dialogs.show_error("Failed to save profile", &e.to_string());
        }
    }

    pub fn on_reset_profile(&mut self, category: Category) {
        let confirmed = self.dialogs.confirm(
            "Profile reset",
            "This will reset all profile settings to defaults.\n\
             Unless you have saved your current profile, all settings will be lost!\n\
             Do you really want to reset?",
        );
        if !confirmed {
            return;
        }

        self.store.reset_categories(&[category]);
        self.resync(&[category]);
    }

    // ===== Models =====

    fn model_dir(&self) -> Utf8PathBuf {
        let last = self.store.read(|s| s.preferences.last_file.clone());
        match Utf8Path::new(&last).parent() {
            Some(dir) if !dir.as_str().is_empty() => dir.to_path_buf(),
            _ => self.profiles.profile_dir().to_path_buf(),
        }
    }

    fn load_model(&mut self) {
        if !self.model_actions_enabled() {
            tracing::warn!("Load Model ignored outside the scanning workbench");
            return;
        }
        let start = self.model_dir();
        if let Some(path) = self
            .dialogs
            .pick_open_file("Open 3D model", FileKind::Model, &start)
        {
            self.open_model(&path);
        }
    }

    fn open_recent(&mut self, path: &str) {
        self.dialog = None;
        self.select(WorkbenchKind::Scanning);
        self.open_model(Utf8Path::new(path));
    }

    fn open_model(&mut self, path: &Utf8Path) {
        match self.codec.load(path) {
            Ok(cloud) => {
                self.workbenches.scanning_mut().set_model(cloud);
                self.append_last_file(path.as_str());
            }
            Err(e) => {
                tracing::error!("Failed to load model: {}", e);
                self.dialogs.show_error("Failed to load model", &e.to_string());
            }
        }
    }

    fn save_model(&mut self) {
        if !self.model_actions_enabled() {
            tracing::warn!("Save Model ignored outside the scanning workbench");
            return;
        }
        let Some(model) = self.workbenches.scanning().model().cloned() else {
            return;
        };

        let start = self.model_dir();
        let Some(path) = self
            .dialogs
            .pick_save_file("Save 3D model", FileKind::Model, &start)
        else {
            return;
        };

        let path = normalize_extension(&path, MODEL_EXTENSION);
        match self.codec.save(&path, &model) {
            Ok(()) => self.append_last_file(path.as_str()),
            Err(e) => {
                tracing::error!("Failed to save model: {}", e);
                self.dialogs.show_error("Failed to save model", &e.to_string());
            }
        }
    }

    fn clear_model(&mut self) {
        if !self.model_actions_enabled() || self.workbenches.scanning().model().is_none() {
            return;
        }
        let confirmed = self.dialogs.confirm(
            "Clear Point Cloud",
            "Your current model will be erased.\nDo you really want to do it?",
        );
        if confirmed {
            self.workbenches.scanning_mut().clear_model();
        }
    }

    /// Record `path` as the most recent file and persist the list
    pub fn append_last_file(&mut self, path: &str) {
        self.last_files.push(path);
        let files = self.last_files.as_slice().to_vec();
        self.store.update(|s| {
            s.preferences.last_file = path.to_string();
            s.preferences.last_files = files;
        });
    }

    // ===== Edit menu =====

    /// The board holds the serial port exclusively on Windows, so the
    /// dialogs that enumerate or reconfigure devices close it first.
    fn release_device_for_dialog(&mut self) {
        if cfg!(target_os = "windows") {
            self.disconnect_device();
            self.on_disconnect();
        }
    }

    fn show_preferences(&mut self) {
        self.release_device_for_dialog();
        self.dialog = Some(PendingDialog::Preferences {
            serial_ports: self.device.list_serial_ports(),
            video_devices: self.device.list_video_devices(),
        });
    }

    fn apply_preferences(&mut self, form: Preferences) {
        self.dialog = None;
        if let Err(e) = form.validate() {
            self.report_config_error(&e);
            return;
        }

        self.store.update(|s| {
            let prefs = &mut s.preferences;
            prefs.serial_name = form.serial_name;
            prefs.baud_rate = form.baud_rate;
            prefs.camera_id = form.camera_id;
            prefs.invert_motor = form.invert_motor;
            prefs.language = form.language;
            prefs.check_for_updates = form.check_for_updates;
        });
        self.initialize_driver();
    }

    fn show_machine_settings(&mut self) {
        self.release_device_for_dialog();
        self.dialog = Some(PendingDialog::MachineSettings);
    }

    fn apply_machine_settings(&mut self, machine: MachineSettings) {
        self.dialog = None;
        if let Err(e) = machine.validate() {
            self.report_config_error(&e);
            return;
        }

        self.store.update(|s| s.machine_settings = machine);
        if let Err(e) = self
            .store
            .save_default(&self.profiles, &[Category::MachineSettings])
        {
            tracing::error!("Failed to persist machine settings: {}", e);
            self.dialogs
                .show_error("Failed to save machine settings", &e.to_string());
        }

        match self.store.read(RoiProfile::from_settings) {
            Ok(roi) => roi.apply(&mut self.pipeline),
            Err(e) => self.report_config_error(&e),
        }
    }

    // ===== View menu =====

    fn toggle_view(&mut self, toggle: ViewToggle, checked: bool) {
        self.store.update(|s| toggle.set(&mut s.preferences, checked));

        match toggle {
            ViewToggle::Panel(kind) => self.workbenches.get_mut(kind).set_panel_visible(checked),
            ViewToggle::Video(WorkbenchKind::Scanning) | ViewToggle::Scene => {
                let (video, scene) = self
                    .store
                    .read(|s| (s.preferences.view_scanning_video, s.preferences.view_scanning_scene));
                self.workbenches.scanning_mut().set_split(video, scene);
            }
            ViewToggle::Video(kind) => self.workbenches.get_mut(kind).set_video_visible(checked),
        }
        self.workbenches.request_layout();
    }

    // ===== Shutdown =====

    /// Best-effort teardown when the window closes. Never fails; problems are
    /// logged. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        tracing::info!("Shutting down main window");

        self.device.set_unplug_callback(DeviceKind::Board, None);
        self.device.set_unplug_callback(DeviceKind::Camera, None);
        self.disconnect_device();

        if self.scan.is_scanning() {
            let mut scanning = self.scan.watch_scanning();
            self.scan.stop();

            let acknowledged = self.runtime.block_on(async {
                tokio::time::timeout(SCAN_STOP_TIMEOUT, scanning.wait_for(|running| !*running))
                    .await
                    .map(|result| result.map(|_| ()))
            });
            match acknowledged {
                Ok(Ok(())) => tracing::info!("Scan stopped"),
                Ok(Err(_)) => tracing::debug!("Scan state dropped before acknowledging stop"),
                Err(_) => tracing::warn!(
                    "Scan did not acknowledge stop within {:?}",
                    SCAN_STOP_TIMEOUT
                ),
            }
        }
    }

    /// Persist the preferences category (workbench, recent files, view flags)
    pub fn save_preferences(&self) -> Result<(), ProfileError> {
        self.store
            .save_default(&self.profiles, &[Category::Preferences])
    }

    // ===== Accessors =====

    pub fn view(&self) -> WindowView {
        let active = self.workbenches.active_bench();
        let prefs = self.store.read(|s| s.preferences.clone());

        WindowView {
            workbench_names: WorkbenchKind::ALL.iter().map(|k| k.display_name()).collect(),
            active_index: WorkbenchKind::ALL
                .iter()
                .position(|k| *k == active.kind())
                .unwrap_or_default(),
            model_actions_enabled: self.model_actions_enabled(),
            connected: self.connected,
            status: active.status(),
            content_enabled: active.is_content_enabled(),
            panel_visible: active.is_panel_visible(),
            video_visible: active.is_video_visible(),
            scene_visible: active.scene().is_some_and(|s| s.split.shows_scene()),
            model_points: self.workbenches.scanning().model().map(|m| m.len()),
            last_files: self.last_files.as_slice().to_vec(),
            view_flags: ViewToggle::ALL
                .into_iter()
                .map(|toggle| (toggle, toggle.get(&prefs)))
                .collect(),
            dialog: self.dialog.clone(),
            layout_revision: self.workbenches.layout_revision(),
        }
    }

    pub fn workbenches(&self) -> &WorkbenchSet {
        &self.workbenches
    }

    pub fn last_files(&self) -> &LastFiles {
        &self.last_files
    }

    pub fn pipeline(&self) -> &PipelineHandles {
        &self.pipeline
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pending_dialog(&self) -> Option<&PendingDialog> {
        self.dialog.as_ref()
    }
}

fn about_text() -> String {
    format!(
        "Horus is an Open Source 3D Scanner manager\n\
         Version: {}\n\
         GitHub: https://github.com/bq/horus\n\n\
         Horus is free software; you can redistribute it and/or modify it under the \
         terms of the GNU General Public License as published by the Free Software \
         Foundation; either version 2 of the License, or (at your option) any later version.",
        crate::VERSION
    )
}
