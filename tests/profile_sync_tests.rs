//! Integration tests for pushing profile files into the pipeline handles

use camino::Utf8PathBuf;
use horus::ProfileManager;
use horus::models::Category;
use horus::services::{
    CalibrationProfile, DriverProfile, PipelineHandles, RoiProfile, ScanProfile,
};
use tempfile::TempDir;

const PROFILE: &str = r##"{
    "scan_settings": {
        "use_laser": "Left",
        "point_cloud_color": "#00ff80",
        "roi_diameter": 300.0,
        "roi_height": 90.0
    },
    "machine_settings": {
        "machine_shape": "Rectangular",
        "machine_width": 180.0,
        "machine_depth": 160.0,
        "machine_height": 100.0
    },
    "preferences": {
        "serial_name": "COM4",
        "camera_id": "Camera 1"
    }
}"##;

fn load_profile() -> (TempDir, horus::models::Settings) {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    std::fs::write(root.join("settings.json"), PROFILE).unwrap();
    let settings = ProfileManager::new(&root).unwrap().load_default();
    (dir, settings)
}

#[test]
fn test_profile_file_configures_every_handle() {
    let (_dir, settings) = load_profile();
    let mut handles = PipelineHandles::default();

    ScanProfile::from_settings(&settings)
        .unwrap()
        .apply(&mut handles);
    CalibrationProfile::from_settings(&settings)
        .unwrap()
        .apply(&mut handles);

    assert!(handles.is_fully_configured());
    assert_eq!(handles.ciclop_scan.use_left_laser, Some(true));
    assert_eq!(handles.ciclop_scan.use_right_laser, Some(false));
    assert_eq!(handles.ciclop_scan.color, Some([0x00, 0xff, 0x80]));
}

#[test]
fn test_roi_limited_by_rectangular_platform() {
    let (_dir, settings) = load_profile();

    let roi = RoiProfile::from_settings(&settings).unwrap();

    assert_eq!(roi.diameter, 160.0);
    assert_eq!(roi.height, 90.0);
}

#[test]
fn test_driver_profile_from_file_preferences() {
    let (_dir, settings) = load_profile();

    let driver = DriverProfile::from_preferences(&settings.preferences).unwrap();

    assert_eq!(driver.serial_name, "COM4");
    assert_eq!(driver.camera_index, 1);
    assert_eq!(driver.baud_rate, 115_200);
}

#[test]
fn test_only_requested_categories_are_loaded() {
    let (dir, _) = load_profile();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let profiles = ProfileManager::new(&root).unwrap();

    let loaded = profiles
        .load_categories(&root.join("settings.json"), &[Category::MachineSettings])
        .unwrap();

    assert_eq!(loaded.machine_settings.machine_depth, 160.0);
    assert_eq!(loaded.preferences, horus::models::Preferences::default());
}
