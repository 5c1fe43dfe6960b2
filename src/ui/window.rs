// GUI Controller - Binds the Slint MainWindow to the main window controller
//
// Widget callbacks are translated into Commands and enqueued; the
// CommandBridge dispatches them on the next tick and re-renders the window
// from the controller's WindowView snapshot.

use crate::controller::{
    Command, CommandReceiver, CommandSender, HelpLink, MainController, PendingDialog, ViewToggle,
    WindowView,
};
use crate::models::{Category, MachineSettings, MachineShape, Preferences, WorkbenchKind};
use crate::state::SettingsStore;
use crate::ui::bridge::CommandBridge;
use anyhow::{Context, Result};
use slint::{ComponentHandle, ModelRc, SharedString, VecModel};
use std::cell::RefCell;
use std::rc::Rc;

// Include the generated Slint code
slint::include_modules!();

/// Owns the window, the shared controller and the command bridge.
///
/// # Example
/// ```ignore
/// let (commands, receiver) = command_channel();
/// let controller = MainController::new(parts, commands.clone());
/// let gui = GuiController::new(controller, commands, receiver)?;
/// let controller = gui.controller();
/// let result = gui.run();
/// controller.borrow_mut().shutdown();
/// ```
pub struct GuiController {
    ui: MainWindow,
    controller: Rc<RefCell<MainController>>,
    _bridge: CommandBridge,
}

impl GuiController {
    pub fn new(
        controller: MainController,
        commands: CommandSender,
        receiver: CommandReceiver,
    ) -> Result<Self> {
        let ui = MainWindow::new().context("Failed to create Slint UI")?;
        let store = controller.store().clone();

        render(&ui, &controller.view(), &store);
        Self::setup_callbacks(&ui, &commands, &store);

        let controller = Rc::new(RefCell::new(controller));
        let bridge = CommandBridge::start(&ui, Rc::clone(&controller), receiver, move |ui, view| {
            render(ui, view, &store)
        });

        tracing::info!("GUI controller initialized");
        Ok(Self {
            ui,
            controller,
            _bridge: bridge,
        })
    }

    /// Shared handle to the controller, kept by the caller for shutdown
    pub fn controller(&self) -> Rc<RefCell<MainController>> {
        Rc::clone(&self.controller)
    }

    /// Run the event loop until the window closes
    pub fn run(self) -> Result<(), slint::PlatformError> {
        tracing::info!("Starting GUI event loop");
        self.ui.run()
    }

    fn setup_callbacks(ui: &MainWindow, commands: &CommandSender, store: &SettingsStore) {
        let tx = commands.clone();
        ui.on_menu_command(move |id| match command_from_menu(&id) {
            Some(command) => tx.send(command),
            None => tracing::warn!("Unknown menu command {:?}", id.as_str()),
        });

        let tx = commands.clone();
        ui.on_view_toggled(move |id, checked| match ViewToggle::from_id(&id) {
            Some(toggle) => tx.send(Command::ToggleView(toggle, checked)),
            None => tracing::warn!("Unknown view toggle {:?}", id.as_str()),
        });

        let tx = commands.clone();
        ui.on_workbench_selected(move |name| tx.send(Command::SelectWorkbench(name.to_string())));

        let tx = commands.clone();
        ui.on_open_recent(move |path| tx.send(Command::OpenRecent(path.to_string())));

        let tx = commands.clone();
        let prefs_store = store.clone();
        let ui_weak = ui.as_weak();
        ui.on_apply_preferences(move || {
            let Some(ui) = ui_weak.upgrade() else {
                return;
            };
            let base = prefs_store.read(|s| s.preferences.clone());
            let form = preferences_from_form(
                &base,
                &ui.get_pref_serial_name(),
                &ui.get_pref_baud_rate(),
                &ui.get_pref_camera_id(),
                ui.get_pref_invert_motor(),
            );
            tx.send(Command::ApplyPreferences(Box::new(form)));
        });

        let tx = commands.clone();
        let ui_weak = ui.as_weak();
        ui.on_apply_machine_settings(move || {
            let Some(ui) = ui_weak.upgrade() else {
                return;
            };
            let form = machine_from_form(
                ui.get_machine_rectangular(),
                &ui.get_machine_diameter(),
                &ui.get_machine_width(),
                &ui.get_machine_height(),
                &ui.get_machine_depth(),
            );
            tx.send(Command::ApplyMachineSettings(form));
        });

        ui.window().on_close_requested(|| {
            tracing::info!("Close requested - allowing window to close");
            slint::CloseRequestResponse::HideWindow
        });

        tracing::debug!("UI callbacks configured");
    }
}

/// Copy a [`WindowView`] into the window's properties
fn render(ui: &MainWindow, view: &WindowView, store: &SettingsStore) {
    ui.set_workbench_names(string_model(view.workbench_names.iter().copied()));
    ui.set_active_workbench(view.active_index as i32);
    ui.set_active_workbench_name(
        view.workbench_names
            .get(view.active_index)
            .copied()
            .unwrap_or_default()
            .into(),
    );
    ui.set_model_actions_enabled(view.model_actions_enabled);
    ui.set_connected(view.connected);
    ui.set_status(view.status);
    ui.set_content_enabled(view.content_enabled);
    ui.set_panel_visible(view.panel_visible);
    ui.set_video_visible(view.video_visible);
    ui.set_scene_visible(view.scene_visible);
    ui.set_model_summary(model_summary(view.model_points).into());
    ui.set_last_files(string_model(view.last_files.iter().map(String::as_str)));

    for (toggle, checked) in &view.view_flags {
        match toggle {
            ViewToggle::Panel(WorkbenchKind::Control) => ui.set_view_control_panel(*checked),
            ViewToggle::Video(WorkbenchKind::Control) => ui.set_view_control_video(*checked),
            ViewToggle::Panel(WorkbenchKind::Adjustment) => ui.set_view_adjustment_panel(*checked),
            ViewToggle::Video(WorkbenchKind::Adjustment) => ui.set_view_adjustment_video(*checked),
            ViewToggle::Panel(WorkbenchKind::Calibration) => {
                ui.set_view_calibration_panel(*checked)
            }
            ViewToggle::Video(WorkbenchKind::Calibration) => {
                ui.set_view_calibration_video(*checked)
            }
            ViewToggle::Panel(WorkbenchKind::Scanning) => ui.set_view_scanning_panel(*checked),
            ViewToggle::Video(WorkbenchKind::Scanning) => ui.set_view_scanning_video(*checked),
            ViewToggle::Scene => ui.set_view_scanning_scene(*checked),
        }
    }

    let dialog = dialog_id(view.dialog.as_ref());
    // Fill the form only when a panel opens so pending edits survive re-renders
    if ui.get_dialog().as_str() != dialog {
        match &view.dialog {
            Some(PendingDialog::Preferences {
                serial_ports,
                video_devices,
            }) => {
                let prefs = store.read(|s| s.preferences.clone());
                ui.set_serial_ports(string_model(serial_ports.iter().map(String::as_str)));
                ui.set_video_devices(string_model(video_devices.iter().map(String::as_str)));
                ui.set_pref_serial_name(prefs.serial_name.into());
                ui.set_pref_baud_rate(prefs.baud_rate.to_string().into());
                ui.set_pref_camera_id(prefs.camera_id.into());
                ui.set_pref_invert_motor(prefs.invert_motor);
            }
            Some(PendingDialog::MachineSettings) => {
                let machine = store.read(|s| s.machine_settings.clone());
                ui.set_machine_rectangular(machine.machine_shape == MachineShape::Rectangular);
                ui.set_machine_diameter(machine.machine_diameter.to_string().into());
                ui.set_machine_width(machine.machine_width.to_string().into());
                ui.set_machine_height(machine.machine_height.to_string().into());
                ui.set_machine_depth(machine.machine_depth.to_string().into());
            }
            Some(PendingDialog::Welcome) | None => {}
        }
        ui.set_dialog(dialog.into());
    }
}

fn string_model<'a>(items: impl Iterator<Item = &'a str>) -> ModelRc<SharedString> {
    let items: Vec<SharedString> = items.map(SharedString::from).collect();
    ModelRc::new(VecModel::from(items))
}

fn dialog_id(dialog: Option<&PendingDialog>) -> &'static str {
    match dialog {
        Some(PendingDialog::Preferences { .. }) => "preferences",
        Some(PendingDialog::MachineSettings) => "machine",
        Some(PendingDialog::Welcome) => "welcome",
        None => "",
    }
}

fn model_summary(points: Option<usize>) -> String {
    match points {
        Some(count) => format!("{} points", count),
        None => "No model loaded".to_string(),
    }
}

/// Map a menu or toolbar action id to its command
pub fn command_from_menu(id: &str) -> Option<Command> {
    let command = match id {
        "load-model" => Command::LoadModel,
        "save-model" => Command::SaveModel,
        "clear-model" => Command::ClearModel,
        "open-scan-profile" => Command::OpenProfile(Category::ScanSettings),
        "save-scan-profile" => Command::SaveProfile(Category::ScanSettings),
        "reset-scan-profile" => Command::ResetProfile(Category::ScanSettings),
        "open-calibration-profile" => Command::OpenProfile(Category::CalibrationSettings),
        "save-calibration-profile" => Command::SaveProfile(Category::CalibrationSettings),
        "reset-calibration-profile" => Command::ResetProfile(Category::CalibrationSettings),
        "exit" => Command::Exit,
        "preferences" => Command::ShowPreferences,
        "machine-settings" => Command::ShowMachineSettings,
        "close-dialog" => Command::CloseDialog,
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "welcome" => Command::Welcome,
        "wiki" => Command::OpenLink(HelpLink::Wiki),
        "sources" => Command::OpenLink(HelpLink::Sources),
        "issues" => Command::OpenLink(HelpLink::Issues),
        "forum" => Command::OpenLink(HelpLink::Forum),
        "about" => Command::About,
        _ => return None,
    };
    Some(command)
}

/// Overlay the preferences form on `base`.
///
/// An unparsable baud rate becomes 0 so validation rejects it with a message.
pub fn preferences_from_form(
    base: &Preferences,
    serial_name: &str,
    baud_rate: &str,
    camera_id: &str,
    invert_motor: bool,
) -> Preferences {
    Preferences {
        serial_name: serial_name.trim().to_string(),
        baud_rate: baud_rate.trim().parse().unwrap_or(0),
        camera_id: camera_id.trim().to_string(),
        invert_motor,
        ..base.clone()
    }
}

/// Build machine settings from the form; unparsable sizes become NaN and
/// fail validation.
pub fn machine_from_form(
    rectangular: bool,
    diameter: &str,
    width: &str,
    height: &str,
    depth: &str,
) -> MachineSettings {
    let parse = |value: &str| value.trim().parse::<f64>().unwrap_or(f64::NAN);
    MachineSettings {
        machine_shape: if rectangular {
            MachineShape::Rectangular
        } else {
            MachineShape::Circular
        },
        machine_diameter: parse(diameter),
        machine_width: parse(width),
        machine_height: parse(height),
        machine_depth: parse(depth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_ids_map_to_commands() {
        assert_eq!(command_from_menu("exit"), Some(Command::Exit));
        assert_eq!(
            command_from_menu("reset-calibration-profile"),
            Some(Command::ResetProfile(Category::CalibrationSettings))
        );
        assert_eq!(command_from_menu("forum"), Some(Command::OpenLink(HelpLink::Forum)));
        assert_eq!(command_from_menu("wizard"), None);
    }

    #[test]
    fn test_preferences_form_keeps_other_fields() {
        let base = Preferences {
            language: "Español".to_string(),
            workbench: "scanning".to_string(),
            ..Preferences::default()
        };

        let form = preferences_from_form(&base, " /dev/ttyACM0 ", "9600", "/dev/video2", true);

        assert_eq!(form.serial_name, "/dev/ttyACM0");
        assert_eq!(form.baud_rate, 9600);
        assert_eq!(form.camera_id, "/dev/video2");
        assert!(form.invert_motor);
        assert_eq!(form.language, "Español");
        assert_eq!(form.workbench, "scanning");
    }

    #[test]
    fn test_bad_form_values_fail_validation() {
        let prefs = preferences_from_form(&Preferences::default(), "COM3", "fast", "0", false);
        assert!(prefs.validate().is_err());

        let machine = machine_from_form(false, "abc", "200", "200", "200");
        assert!(machine.machine_diameter.is_nan());
        assert!(machine.validate().is_err());
    }

    #[test]
    fn test_machine_form_shape() {
        let machine = machine_from_form(true, "200", "150", "180", "120");
        assert_eq!(machine.machine_shape, MachineShape::Rectangular);
        assert_eq!(machine.max_roi_diameter(), 120.0);
        assert!(machine.validate().is_ok());
    }

    #[test]
    fn test_dialog_ids() {
        assert_eq!(dialog_id(None), "");
        assert_eq!(dialog_id(Some(&PendingDialog::MachineSettings)), "machine");
        assert_eq!(model_summary(Some(3)), "3 points");
    }
}
