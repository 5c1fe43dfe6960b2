//! Data models for the Horus main window.
//!
//! - [`Settings`]: the typed settings store contents, one struct per [`Category`]
//! - [`WorkbenchSet`]: the four mutually exclusive workbenches and which one is active
//! - [`LastFiles`]: recently used model files, bounded by [`MAX_LAST_FILES`]
//!
//! # Architecture Note
//!
//! Settings are plain serializable values. Shared access goes through
//! [`SettingsStore`](crate::state::SettingsStore), which wraps them in
//! `Arc<RwLock<>>` and emits change events.

pub mod last_files;
pub mod settings;
pub mod workbench;

pub use last_files::{LastFiles, MAX_LAST_FILES};
pub use settings::{
    CalibrationSettings, CameraControls, Category, LaserSelection, MachineSettings, MachineShape,
    Preferences, RedChannel, ScanSettings, Settings,
};
pub use workbench::{Scene, SplitLayout, Workbench, WorkbenchKind, WorkbenchSet};
