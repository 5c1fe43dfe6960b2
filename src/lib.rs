// Horus - Desktop controller for the Ciclop open source 3D laser scanner
//
// This is the library crate containing the main window controller, the
// settings store and the device/pipeline services. The binary crate
// (main.rs) provides the GUI entry point.

pub mod config;
pub mod controller;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{ProfileError, ProfileManager};
pub use controller::{Command, ControllerParts, MainController, WindowView};
pub use models::{Category, Settings, WorkbenchKind};
pub use state::{SettingsChange, SettingsStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
