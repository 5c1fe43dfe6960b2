//! Horus - desktop controller for the Ciclop 3D laser scanner
//!
//! Main entry point for the GUI application.
//!
//! # Overview
//!
//! This binary wires the library together:
//! - Logging infrastructure (rotating file in `~/.horus/logs`, optional console)
//! - Tokio runtime (scan-stop acknowledgement during shutdown)
//! - Settings store loaded from `~/.horus/settings.json`
//! - Serial driver, scan state and calibration routines
//! - [`MainController`] and the Slint [`GuiController`] shell
//!
//! # Threading
//!
//! - **Main thread**: Slint event loop; every controller method runs here
//! - **Device watcher**: polls for unplugged hardware and enqueues commands
//! - **Tokio workers**: timers used while waiting for a scan to stop
//!
//! # Execution Flow
//!
//! 1. Resolve the profile directory and initialize logging
//! 2. Create the tokio runtime
//! 3. Load the default settings file into the [`SettingsStore`]
//! 4. Build the controller (restores workbench, pushes profiles)
//! 5. Run the Slint event loop until the window closes
//! 6. Shut the controller down and persist the preferences

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use horus::controller::{ControllerParts, MainController, command_channel};
use horus::logging::{LogOptions, setup_logging};
use horus::services::{CalibrationRoutine, PlyCodec, ScanState, SerialDriver};
use horus::ui::{GuiController, NativeDialogs};
use horus::{APP_NAME, ProfileManager, SettingsStore, VERSION};
use std::sync::Arc;
use std::time::Duration;

/// Directory holding `settings.json` and the logs
fn profile_dir() -> Result<Utf8PathBuf> {
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    let home = Utf8PathBuf::try_from(home).context("Home directory is not valid UTF-8")?;
    Ok(home.join(".horus"))
}

fn main() -> Result<()> {
    let profile_dir = profile_dir()?;
    let options = LogOptions::from_args(std::env::args().skip(1));
    let _log_guard = setup_logging(&profile_dir.join("logs"), options)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("horus-worker")
        .build()?;

    let profiles = ProfileManager::new(&profile_dir)?;
    let store = SettingsStore::with_settings(profiles.load_default());

    let (commands, receiver) = command_channel();
    let parts = ControllerParts {
        store,
        profiles,
        device: Box::new(SerialDriver::new()),
        dialogs: Box::new(NativeDialogs),
        codec: Box::new(PlyCodec),
        scan: Arc::new(ScanState::new()),
        laser_triangulation: Arc::new(CalibrationRoutine::new("laser triangulation")),
        platform_extrinsics: Arc::new(CalibrationRoutine::new("platform extrinsics")),
        runtime: runtime.handle().clone(),
    };
    let controller = MainController::new(parts, commands.clone());

    let gui = GuiController::new(controller, commands, receiver)?;
    let controller = gui.controller();
    tracing::info!("GUI controller initialized, launching window");

    // Blocks until the window is closed
    let result = gui.run();

    tracing::info!("GUI closed, shutting down");
    {
        let mut controller = controller.borrow_mut();
        controller.shutdown();
        if let Err(e) = controller.save_preferences() {
            tracing::error!("Failed to save preferences: {}", e);
        }
    }
    drop(controller);

    runtime.shutdown_timeout(Duration::from_secs(2));
    tracing::info!("Application shutdown complete");

    result.map_err(|e| {
        tracing::error!("GUI error: {}", e);
        anyhow::anyhow!("GUI error: {}", e)
    })
}
