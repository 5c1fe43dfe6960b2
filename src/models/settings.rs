use crate::config::ProfileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static RESOLUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*[xX]\s*(\d+)\s*$").expect("Invalid resolution regex"));

static HEX_COLOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").expect("Invalid color regex"));

/// Named partition of the settings store.
///
/// Profile files are JSON objects keyed by [`Category::key`], and every
/// open/save/reset action operates on exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ScanSettings,
    CalibrationSettings,
    MachineSettings,
    Preferences,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ScanSettings,
        Category::CalibrationSettings,
        Category::MachineSettings,
        Category::Preferences,
    ];

    /// Key used for this category in profile files
    pub fn key(&self) -> &'static str {
        match self {
            Category::ScanSettings => "scan_settings",
            Category::CalibrationSettings => "calibration_settings",
            Category::MachineSettings => "machine_settings",
            Category::Preferences => "preferences",
        }
    }

    /// Human readable label for menus and dialogs
    pub fn label(&self) -> &'static str {
        match self {
            Category::ScanSettings => "scan",
            Category::CalibrationSettings => "calibration",
            Category::MachineSettings => "machine",
            Category::Preferences => "preferences",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| ProfileError::UnknownCategory(s.to_string()))
    }
}

/// Which lasers take part in a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaserSelection {
    Left,
    Right,
    #[default]
    Both,
}

impl LaserSelection {
    pub fn uses_left(&self) -> bool {
        matches!(self, LaserSelection::Left | LaserSelection::Both)
    }

    pub fn uses_right(&self) -> bool {
        matches!(self, LaserSelection::Right | LaserSelection::Both)
    }
}

/// Color channel used to segment the laser line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedChannel {
    #[default]
    #[serde(rename = "R (RGB)")]
    Rgb,
    #[serde(rename = "Cr (YCrCb)")]
    YCrCb,
    #[serde(rename = "U (YUV)")]
    Yuv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineShape {
    #[default]
    Circular,
    Rectangular,
}

/// Camera controls for one capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraControls {
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub exposure: i32,
}

/// `scan_settings` category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub capture_texture: bool,
    pub use_laser: LaserSelection,
    pub motor_step_scanning: f64,
    pub motor_speed_scanning: f64,
    pub motor_acceleration_scanning: f64,
    pub point_cloud_color: String,

    pub brightness_laser_scanning: i32,
    pub contrast_laser_scanning: i32,
    pub saturation_laser_scanning: i32,
    pub exposure_laser_scanning: i32,

    pub brightness_texture_scanning: i32,
    pub contrast_texture_scanning: i32,
    pub saturation_texture_scanning: i32,
    pub exposure_texture_scanning: i32,

    pub red_channel_scanning: RedChannel,
    pub open_enable_scanning: bool,
    pub open_value_scanning: i32,
    pub threshold_enable_scanning: bool,
    pub threshold_value_scanning: i32,

    pub roi_view: bool,
    pub roi_diameter: f64,
    pub roi_height: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            capture_texture: true,
            use_laser: LaserSelection::Both,
            motor_step_scanning: 0.45,
            motor_speed_scanning: 200.0,
            motor_acceleration_scanning: 200.0,
            point_cloud_color: "AAAAAA".to_string(),

            brightness_laser_scanning: 100,
            contrast_laser_scanning: 20,
            saturation_laser_scanning: 20,
            exposure_laser_scanning: 6,

            brightness_texture_scanning: 100,
            contrast_texture_scanning: 32,
            saturation_texture_scanning: 32,
            exposure_texture_scanning: 10,

            red_channel_scanning: RedChannel::Rgb,
            open_enable_scanning: false,
            open_value_scanning: 2,
            threshold_enable_scanning: true,
            threshold_value_scanning: 50,

            roi_view: false,
            roi_diameter: 200.0,
            roi_height: 200.0,
        }
    }
}

impl ScanSettings {
    /// Parse `point_cloud_color` (`RRGGBB`, optional leading `#`)
    pub fn point_cloud_rgb(&self) -> Result<[u8; 3], ProfileError> {
        let caps = HEX_COLOR_PATTERN
            .captures(self.point_cloud_color.trim())
            .ok_or_else(|| {
                ProfileError::invalid(
                    "point_cloud_color",
                    format!("expected RRGGBB hex color, got {:?}", self.point_cloud_color),
                )
            })?;

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            // The pattern guarantees two hex digits per group
            *channel = u8::from_str_radix(&caps[i + 1], 16)
                .map_err(|e| ProfileError::invalid("point_cloud_color", e.to_string()))?;
        }
        Ok(rgb)
    }

    pub fn laser_controls(&self) -> CameraControls {
        CameraControls {
            brightness: self.brightness_laser_scanning,
            contrast: self.contrast_laser_scanning,
            saturation: self.saturation_laser_scanning,
            exposure: self.exposure_laser_scanning,
        }
    }

    pub fn texture_controls(&self) -> CameraControls {
        CameraControls {
            brightness: self.brightness_texture_scanning,
            contrast: self.contrast_texture_scanning,
            saturation: self.saturation_texture_scanning,
            exposure: self.exposure_texture_scanning,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        self.point_cloud_rgb()?;
        require_positive("motor_step_scanning", self.motor_step_scanning)?;
        require_positive("motor_speed_scanning", self.motor_speed_scanning)?;
        require_positive("motor_acceleration_scanning", self.motor_acceleration_scanning)?;
        require_positive("roi_diameter", self.roi_diameter)?;
        require_positive("roi_height", self.roi_height)?;
        Ok(())
    }
}

/// `calibration_settings` category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub brightness_pattern_calibration: i32,
    pub contrast_pattern_calibration: i32,
    pub saturation_pattern_calibration: i32,
    pub exposure_pattern_calibration: i32,

    pub pattern_rows: u32,
    pub pattern_columns: u32,
    pub pattern_square_width: f64,
    pub pattern_origin_distance: f64,

    pub resolution: String,
    pub framerate: u32,
    pub use_distortion: bool,

    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_vector: [f64; 5],

    pub distance_left: f64,
    pub normal_left: [f64; 3],
    pub distance_right: f64,
    pub normal_right: [f64; 3],

    pub rotation_matrix: [[f64; 3]; 3],
    pub translation_vector: [f64; 3],
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            brightness_pattern_calibration: 100,
            contrast_pattern_calibration: 32,
            saturation_pattern_calibration: 32,
            exposure_pattern_calibration: 16,

            pattern_rows: 6,
            pattern_columns: 11,
            pattern_square_width: 13.0,
            pattern_origin_distance: 0.0,

            resolution: "1280x960".to_string(),
            framerate: 30,
            use_distortion: false,

            camera_matrix: [[1430.0, 0.0, 480.0], [0.0, 1430.0, 620.0], [0.0, 0.0, 1.0]],
            distortion_vector: [0.0; 5],

            distance_left: 0.0,
            normal_left: [0.0, 0.0, 0.0],
            distance_right: 0.0,
            normal_right: [0.0, 0.0, 0.0],

            rotation_matrix: [[0.0, 1.0, 0.0], [0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]],
            translation_vector: [5.0, 80.0, 320.0],
        }
    }
}

impl CalibrationSettings {
    /// Parse `resolution` into `(height, width)` of the delivered frame.
    ///
    /// The camera is mounted rotated, so the first number is the frame height.
    pub fn frame_size(&self) -> Result<(u32, u32), ProfileError> {
        let caps = RESOLUTION_PATTERN.captures(&self.resolution).ok_or_else(|| {
            ProfileError::invalid(
                "resolution",
                format!("expected HEIGHTxWIDTH, got {:?}", self.resolution),
            )
        })?;

        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|e| ProfileError::invalid("resolution", e.to_string()))
        };
        let (height, width) = (parse(&caps[1])?, parse(&caps[2])?);

        if height == 0 || width == 0 {
            return Err(ProfileError::invalid("resolution", "frame size must be non-zero"));
        }
        Ok((height, width))
    }

    pub fn pattern_controls(&self) -> CameraControls {
        CameraControls {
            brightness: self.brightness_pattern_calibration,
            contrast: self.contrast_pattern_calibration,
            saturation: self.saturation_pattern_calibration,
            exposure: self.exposure_pattern_calibration,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        self.frame_size()?;
        if self.framerate == 0 {
            return Err(ProfileError::invalid("framerate", "must be greater than zero"));
        }
        if self.pattern_rows < 2 {
            return Err(ProfileError::invalid("pattern_rows", "a pattern needs at least 2 rows"));
        }
        if self.pattern_columns < 2 {
            return Err(ProfileError::invalid(
                "pattern_columns",
                "a pattern needs at least 2 columns",
            ));
        }
        require_positive("pattern_square_width", self.pattern_square_width)?;
        Ok(())
    }
}

/// `machine_settings` category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    pub machine_shape: MachineShape,
    pub machine_diameter: f64,
    pub machine_width: f64,
    pub machine_height: f64,
    pub machine_depth: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            machine_shape: MachineShape::Circular,
            machine_diameter: 200.0,
            machine_width: 200.0,
            machine_height: 200.0,
            machine_depth: 200.0,
        }
    }
}

impl MachineSettings {
    /// Largest ROI diameter the platform can hold
    pub fn max_roi_diameter(&self) -> f64 {
        match self.machine_shape {
            MachineShape::Circular => self.machine_diameter,
            MachineShape::Rectangular => self.machine_width.min(self.machine_depth),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        require_positive("machine_diameter", self.machine_diameter)?;
        require_positive("machine_width", self.machine_width)?;
        require_positive("machine_height", self.machine_height)?;
        require_positive("machine_depth", self.machine_depth)?;
        Ok(())
    }
}

/// `preferences` category: connection, window and view state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub serial_name: String,
    pub baud_rate: u32,
    pub camera_id: String,
    pub invert_motor: bool,
    pub language: String,
    pub check_for_updates: bool,

    /// Key of the active workbench. Kept as a string so a stale or edited
    /// value survives loading and is resolved by the workbench selector.
    pub workbench: String,
    pub last_file: String,
    pub last_files: Vec<String>,

    pub view_control_panel: bool,
    pub view_control_video: bool,
    pub view_adjustment_panel: bool,
    pub view_adjustment_video: bool,
    pub view_calibration_panel: bool,
    pub view_calibration_video: bool,
    pub view_scanning_panel: bool,
    pub view_scanning_video: bool,
    pub view_scanning_scene: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            serial_name: default_serial_name().to_string(),
            baud_rate: 115_200,
            camera_id: default_camera_id().to_string(),
            invert_motor: false,
            language: "English".to_string(),
            check_for_updates: true,

            workbench: "control".to_string(),
            last_file: String::new(),
            last_files: Vec::new(),

            view_control_panel: true,
            view_control_video: true,
            view_adjustment_panel: true,
            view_adjustment_video: true,
            view_calibration_panel: true,
            view_calibration_video: true,
            view_scanning_panel: true,
            view_scanning_video: false,
            view_scanning_scene: true,
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.baud_rate == 0 {
            return Err(ProfileError::invalid("baud_rate", "must be greater than zero"));
        }
        Ok(())
    }
}

fn default_serial_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "COM1"
    } else if cfg!(target_os = "macos") {
        "/dev/tty.usbmodem1421"
    } else {
        "/dev/ttyUSB0"
    }
}

fn default_camera_id() -> &'static str {
    if cfg!(target_os = "linux") { "/dev/video0" } else { "0" }
}

fn require_positive(key: &'static str, value: f64) -> Result<(), ProfileError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ProfileError::invalid(key, format!("must be a positive number, got {}", value)))
    }
}

/// The complete typed settings store contents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scan_settings: ScanSettings,
    pub calibration_settings: CalibrationSettings,
    pub machine_settings: MachineSettings,
    pub preferences: Preferences,
}

impl Settings {
    /// Restore the given categories to their defaults, leaving the rest untouched
    pub fn reset(&mut self, categories: &[Category]) {
        for category in categories {
            match category {
                Category::ScanSettings => self.scan_settings = ScanSettings::default(),
                Category::CalibrationSettings => {
                    self.calibration_settings = CalibrationSettings::default()
                }
                Category::MachineSettings => self.machine_settings = MachineSettings::default(),
                Category::Preferences => self.preferences = Preferences::default(),
            }
        }
    }

    /// Copy the given categories from `other`
    pub fn merge_from(&mut self, other: &Settings, categories: &[Category]) {
        for category in categories {
            match category {
                Category::ScanSettings => self.scan_settings = other.scan_settings.clone(),
                Category::CalibrationSettings => {
                    self.calibration_settings = other.calibration_settings.clone()
                }
                Category::MachineSettings => {
                    self.machine_settings = other.machine_settings.clone()
                }
                Category::Preferences => self.preferences = other.preferences.clone(),
            }
        }
    }

    pub fn validate_category(&self, category: Category) -> Result<(), ProfileError> {
        match category {
            Category::ScanSettings => self.scan_settings.validate(),
            Category::CalibrationSettings => self.calibration_settings.validate(),
            Category::MachineSettings => self.machine_settings.validate(),
            Category::Preferences => self.preferences.validate(),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        Category::ALL
            .into_iter()
            .try_for_each(|category| self.validate_category(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.preferences.workbench, "control");
        assert_eq!(settings.calibration_settings.frame_size().unwrap(), (1280, 960));
    }

    #[test]
    fn test_point_cloud_color_parsing() {
        let mut scan = ScanSettings::default();
        scan.point_cloud_color = "#FF8000".to_string();
        assert_eq!(scan.point_cloud_rgb().unwrap(), [255, 128, 0]);

        scan.point_cloud_color = "purple".to_string();
        let err = scan.point_cloud_rgb().unwrap_err();
        assert!(matches!(err, ProfileError::InvalidSetting { key: "point_cloud_color", .. }));
    }

    #[test]
    fn test_invalid_resolution_is_rejected() {
        let mut calibration = CalibrationSettings::default();
        calibration.resolution = "1280 by 960".to_string();
        assert!(calibration.validate().is_err());

        calibration.resolution = "0x960".to_string();
        assert!(calibration.frame_size().is_err());

        calibration.resolution = " 640X480 ".to_string();
        assert_eq!(calibration.frame_size().unwrap(), (640, 480));
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let json = r#"{ "scan_settings": { "capture_texture": false, "not_a_key": 3 } }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert!(!settings.scan_settings.capture_texture);
        assert_eq!(settings.scan_settings.motor_step_scanning, 0.45);
        assert_eq!(settings.calibration_settings, CalibrationSettings::default());
    }

    #[test]
    fn test_reset_only_touches_requested_category() {
        let mut settings = Settings::default();
        settings.scan_settings.capture_texture = false;
        settings.machine_settings.machine_height = 150.0;

        settings.reset(&[Category::ScanSettings]);

        assert!(settings.scan_settings.capture_texture);
        assert_eq!(settings.machine_settings.machine_height, 150.0);
    }

    #[test]
    fn test_laser_selection_flags() {
        assert!(LaserSelection::Both.uses_left() && LaserSelection::Both.uses_right());
        assert!(LaserSelection::Left.uses_left() && !LaserSelection::Left.uses_right());
        assert!(!LaserSelection::Right.uses_left() && LaserSelection::Right.uses_right());
    }

    #[test]
    fn test_red_channel_serialized_names() {
        let json = serde_json::to_string(&RedChannel::YCrCb).unwrap();
        assert_eq!(json, "\"Cr (YCrCb)\"");
    }

    #[test]
    fn test_category_round_trip_through_key() {
        for category in Category::ALL {
            assert_eq!(category.key().parse::<Category>().unwrap(), category);
        }
        assert!("workbench_settings".parse::<Category>().is_err());
    }
}
