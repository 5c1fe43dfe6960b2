use crate::models::{Category, MachineSettings, Preferences, WorkbenchKind};
use crate::services::DeviceKind;
use tokio::sync::mpsc;

/// Capacity of the command queue between device threads and the UI thread
pub const COMMAND_QUEUE_CAPACITY: usize = 100;

/// Every user action and device notification the main window handles
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // File menu
    LoadModel,
    SaveModel,
    ClearModel,
    /// Load a model from the recent files list
    OpenRecent(String),
    OpenProfile(Category),
    SaveProfile(Category),
    ResetProfile(Category),
    Exit,

    // Edit menu
    ShowPreferences,
    ApplyPreferences(Box<Preferences>),
    ShowMachineSettings,
    ApplyMachineSettings(MachineSettings),
    CloseDialog,

    // View menu
    ToggleView(ViewToggle, bool),

    // Toolbar
    SelectWorkbench(String),
    Connect,
    Disconnect,

    /// Raised by the device watcher thread
    DeviceUnplugged(DeviceKind),

    // Help menu
    Welcome,
    OpenLink(HelpLink),
    About,
}

/// Checkable items of the View menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewToggle {
    Panel(WorkbenchKind),
    /// Video view of a workbench; for scanning this rearranges the splitter
    Video(WorkbenchKind),
    /// Scanning only
    Scene,
}

impl ViewToggle {
    pub const ALL: [ViewToggle; 9] = [
        ViewToggle::Panel(WorkbenchKind::Control),
        ViewToggle::Video(WorkbenchKind::Control),
        ViewToggle::Panel(WorkbenchKind::Adjustment),
        ViewToggle::Video(WorkbenchKind::Adjustment),
        ViewToggle::Panel(WorkbenchKind::Calibration),
        ViewToggle::Video(WorkbenchKind::Calibration),
        ViewToggle::Panel(WorkbenchKind::Scanning),
        ViewToggle::Video(WorkbenchKind::Scanning),
        ViewToggle::Scene,
    ];

    /// Stable identifier used by the menu, e.g. `control-panel`
    pub fn id(&self) -> String {
        match self {
            ViewToggle::Panel(kind) => format!("{}-panel", kind.key()),
            ViewToggle::Video(kind) => format!("{}-video", kind.key()),
            ViewToggle::Scene => "scanning-scene".to_string(),
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|toggle| toggle.id() == id)
    }

    /// Current value of the matching `view_*` preference
    pub fn get(&self, prefs: &Preferences) -> bool {
        match self {
            ViewToggle::Panel(WorkbenchKind::Control) => prefs.view_control_panel,
            ViewToggle::Video(WorkbenchKind::Control) => prefs.view_control_video,
            ViewToggle::Panel(WorkbenchKind::Adjustment) => prefs.view_adjustment_panel,
            ViewToggle::Video(WorkbenchKind::Adjustment) => prefs.view_adjustment_video,
            ViewToggle::Panel(WorkbenchKind::Calibration) => prefs.view_calibration_panel,
            ViewToggle::Video(WorkbenchKind::Calibration) => prefs.view_calibration_video,
            ViewToggle::Panel(WorkbenchKind::Scanning) => prefs.view_scanning_panel,
            ViewToggle::Video(WorkbenchKind::Scanning) => prefs.view_scanning_video,
            ViewToggle::Scene => prefs.view_scanning_scene,
        }
    }

    pub fn set(&self, prefs: &mut Preferences, checked: bool) {
        let flag = match self {
            ViewToggle::Panel(WorkbenchKind::Control) => &mut prefs.view_control_panel,
            ViewToggle::Video(WorkbenchKind::Control) => &mut prefs.view_control_video,
            ViewToggle::Panel(WorkbenchKind::Adjustment) => &mut prefs.view_adjustment_panel,
            ViewToggle::Video(WorkbenchKind::Adjustment) => &mut prefs.view_adjustment_video,
            ViewToggle::Panel(WorkbenchKind::Calibration) => &mut prefs.view_calibration_panel,
            ViewToggle::Video(WorkbenchKind::Calibration) => &mut prefs.view_calibration_video,
            ViewToggle::Panel(WorkbenchKind::Scanning) => &mut prefs.view_scanning_panel,
            ViewToggle::Video(WorkbenchKind::Scanning) => &mut prefs.view_scanning_video,
            ViewToggle::Scene => &mut prefs.view_scanning_scene,
        };
        *flag = checked;
    }
}

/// External pages reachable from the Help menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpLink {
    Wiki,
    Sources,
    Issues,
    Forum,
}

impl HelpLink {
    pub fn url(&self) -> &'static str {
        match self {
            HelpLink::Wiki => "https://github.com/bq/horus/wiki",
            HelpLink::Sources => "https://github.com/bq/horus",
            HelpLink::Issues => "https://github.com/bq/horus/issues",
            HelpLink::Forum => "https://groups.google.com/forum/?hl=es#!forum/ciclop-3d-scanner",
        }
    }
}

/// What the window should do after a command was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Sending half of the command queue; cheap to clone into device callbacks
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Enqueue without blocking; drops the command if the queue is full
    pub fn send(&self, command: Command) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                tracing::warn!("Command queue full - dropping {:?}", command);
            }
            Err(mpsc::error::TrySendError::Closed(command)) => {
                tracing::warn!("Command queue closed - dropping {:?}", command);
            }
        }
    }
}

/// Receiving half, drained on the UI thread
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Take every queued command without waiting
    pub fn drain(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            commands.push(command);
        }
        commands
    }
}

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    (CommandSender { tx }, CommandReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_toggle_ids_round_trip() {
        for toggle in ViewToggle::ALL {
            assert_eq!(ViewToggle::from_id(&toggle.id()), Some(toggle));
        }
        assert_eq!(ViewToggle::from_id("scanning-panel"), Some(ViewToggle::Panel(WorkbenchKind::Scanning)));
        assert_eq!(ViewToggle::from_id("wizard-panel"), None);
    }

    #[test]
    fn test_view_toggle_writes_matching_preference() {
        let mut prefs = Preferences::default();
        for toggle in ViewToggle::ALL {
            toggle.set(&mut prefs, false);
            assert!(!toggle.get(&prefs));
        }
        assert!(!prefs.view_adjustment_video);
        assert!(!prefs.view_scanning_scene);
    }

    #[test]
    fn test_queue_drops_when_full() {
        let (tx, mut rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY + 5 {
            tx.send(Command::Connect);
        }
        assert_eq!(rx.drain().len(), COMMAND_QUEUE_CAPACITY);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_send_from_other_thread() {
        let (tx, mut rx) = command_channel();
        std::thread::spawn(move || tx.send(Command::DeviceUnplugged(DeviceKind::Camera)))
            .join()
            .unwrap();

        assert_eq!(rx.drain(), vec![Command::DeviceUnplugged(DeviceKind::Camera)]);
    }
}
