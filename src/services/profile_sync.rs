//! One-way push of settings into the device and pipeline handles.
//!
//! Each profile is first built from [`Settings`] and fully validated; only a
//! successfully built profile is applied. A configuration error therefore
//! never leaves a handle half written.

use crate::config::ProfileError;
use crate::models::{CameraControls, MachineSettings, Preferences, RedChannel, Settings};
use crate::services::pipeline::{LaserPlane, PipelineHandles};
use regex::Regex;
use std::sync::LazyLock;

static CAMERA_INDEX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("Invalid camera index regex"));

/// Connection parameters handed to the device facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverProfile {
    pub camera_index: u32,
    pub serial_name: String,
    pub baud_rate: u32,
    pub invert_motor: bool,
}

impl DriverProfile {
    pub fn from_preferences(prefs: &Preferences) -> Result<Self, ProfileError> {
        prefs.validate()?;

        if prefs.serial_name.trim().is_empty() {
            return Err(ProfileError::invalid("serial_name", "no serial port selected"));
        }

        Ok(Self {
            camera_index: camera_index(&prefs.camera_id)?,
            serial_name: prefs.serial_name.clone(),
            baud_rate: prefs.baud_rate,
            invert_motor: prefs.invert_motor,
        })
    }
}

/// Camera index from a device id such as `/dev/video2` or `1`
pub fn camera_index(camera_id: &str) -> Result<u32, ProfileError> {
    let caps = CAMERA_INDEX_PATTERN.captures(camera_id).ok_or_else(|| {
        ProfileError::invalid(
            "camera_id",
            format!("{:?} does not end with a camera index", camera_id),
        )
    })?;
    caps[1]
        .parse()
        .map_err(|e| ProfileError::invalid("camera_id", format!("{:?}: {}", camera_id, e)))
}

/// Values for every scanning handle
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProfile {
    pub capture_texture: bool,
    pub use_left_laser: bool,
    pub use_right_laser: bool,
    pub motor_step: f64,
    pub motor_speed: f64,
    pub motor_acceleration: f64,
    pub color: [u8; 3],

    pub pattern_mode: CameraControls,
    pub laser_mode: CameraControls,
    pub texture_mode: CameraControls,
    pub use_distortion: bool,

    pub red_channel: RedChannel,
    pub open_enable: bool,
    pub open_value: i32,
    pub threshold_enable: bool,
    pub threshold_value: i32,

    pub roi_view: bool,
    pub roi: RoiProfile,

    pub pattern_rows: u32,
    pub pattern_columns: u32,
    pub pattern_square_width: f64,
    pub pattern_origin_distance: f64,
}

impl ScanProfile {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProfileError> {
        let scan = &settings.scan_settings;
        let calibration = &settings.calibration_settings;
        scan.validate()?;
        calibration.validate()?;

        Ok(Self {
            capture_texture: scan.capture_texture,
            use_left_laser: scan.use_laser.uses_left(),
            use_right_laser: scan.use_laser.uses_right(),
            motor_step: scan.motor_step_scanning,
            motor_speed: scan.motor_speed_scanning,
            motor_acceleration: scan.motor_acceleration_scanning,
            color: scan.point_cloud_rgb()?,

            pattern_mode: calibration.pattern_controls(),
            laser_mode: scan.laser_controls(),
            texture_mode: scan.texture_controls(),
            use_distortion: calibration.use_distortion,

            red_channel: scan.red_channel_scanning,
            open_enable: scan.open_enable_scanning,
            open_value: scan.open_value_scanning,
            threshold_enable: scan.threshold_enable_scanning,
            threshold_value: scan.threshold_value_scanning,

            roi_view: scan.roi_view,
            roi: RoiProfile::from_settings(settings)?,

            pattern_rows: calibration.pattern_rows,
            pattern_columns: calibration.pattern_columns,
            pattern_square_width: calibration.pattern_square_width,
            pattern_origin_distance: calibration.pattern_origin_distance,
        })
    }

    pub fn apply(&self, handles: &mut PipelineHandles) {
        let scan = &mut handles.ciclop_scan;
        scan.capture_texture = Some(self.capture_texture);
        scan.use_left_laser = Some(self.use_left_laser);
        scan.use_right_laser = Some(self.use_right_laser);
        scan.motor_step = Some(self.motor_step);
        scan.motor_speed = Some(self.motor_speed);
        scan.motor_acceleration = Some(self.motor_acceleration);
        scan.color = Some(self.color);

        let capture = &mut handles.image_capture;
        capture.pattern_mode = Some(self.pattern_mode);
        capture.laser_mode = Some(self.laser_mode);
        capture.texture_mode = Some(self.texture_mode);
        capture.use_distortion = Some(self.use_distortion);

        let segmentation = &mut handles.laser_segmentation;
        segmentation.red_channel = Some(self.red_channel);
        segmentation.open_enable = Some(self.open_enable);
        segmentation.open_value = Some(self.open_value);
        segmentation.threshold_enable = Some(self.threshold_enable);
        segmentation.threshold_value = Some(self.threshold_value);

        handles.current_video.roi_view = Some(self.roi_view);
        self.roi.apply(handles);

        let pattern = &mut handles.pattern;
        pattern.rows = Some(self.pattern_rows);
        pattern.columns = Some(self.pattern_columns);
        pattern.square_width = Some(self.pattern_square_width);
        pattern.origin_distance = Some(self.pattern_origin_distance);
    }
}

/// Point-cloud region of interest, limited to what fits on the platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiProfile {
    pub diameter: f64,
    pub height: f64,
}

impl RoiProfile {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProfileError> {
        settings.machine_settings.validate()?;
        Ok(Self::clamped(
            settings.scan_settings.roi_diameter,
            settings.scan_settings.roi_height,
            &settings.machine_settings,
        ))
    }

    fn clamped(diameter: f64, height: f64, machine: &MachineSettings) -> Self {
        Self {
            diameter: diameter.min(machine.max_roi_diameter()),
            height: height.min(machine.machine_height),
        }
    }

    pub fn apply(&self, handles: &mut PipelineHandles) {
        handles.point_cloud_roi.diameter = Some(self.diameter);
        handles.point_cloud_roi.height = Some(self.height);
    }
}

/// Calibration results plus the capture format
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProfile {
    pub framerate: u32,
    pub width: u32,
    pub height: u32,
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_vector: [f64; 5],
    pub laser_planes: [LaserPlane; 2],
    pub platform_rotation: [[f64; 3]; 3],
    pub platform_translation: [f64; 3],
}

impl CalibrationProfile {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProfileError> {
        let calibration = &settings.calibration_settings;
        calibration.validate()?;
        let (height, width) = calibration.frame_size()?;

        Ok(Self {
            framerate: calibration.framerate,
            width,
            height,
            camera_matrix: calibration.camera_matrix,
            distortion_vector: calibration.distortion_vector,
            laser_planes: [
                LaserPlane {
                    distance: calibration.distance_left,
                    normal: calibration.normal_left,
                },
                LaserPlane {
                    distance: calibration.distance_right,
                    normal: calibration.normal_right,
                },
            ],
            platform_rotation: calibration.rotation_matrix,
            platform_translation: calibration.translation_vector,
        })
    }

    /// Write into the calibration handle. The frame rate goes to the device
    /// and is applied by the caller.
    pub fn apply(&self, handles: &mut PipelineHandles) {
        let data = &mut handles.calibration_data;
        data.width = Some(self.width);
        data.height = Some(self.height);
        data.camera_matrix = Some(self.camera_matrix);
        data.distortion_vector = Some(self.distortion_vector);
        data.laser_planes = self.laser_planes.map(Some);
        data.platform_rotation = Some(self.platform_rotation);
        data.platform_translation = Some(self.platform_translation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LaserSelection, MachineShape};

    #[test]
    fn test_camera_index_from_trailing_digits() {
        assert_eq!(camera_index("/dev/video0").unwrap(), 0);
        assert_eq!(camera_index("/dev/video12").unwrap(), 12);
        assert_eq!(camera_index("3").unwrap(), 3);
        assert!(camera_index("/dev/camera").is_err());
    }

    #[test]
    fn test_driver_profile_from_preferences() {
        let mut prefs = Preferences::default();
        prefs.serial_name = "/dev/ttyACM0".to_string();
        prefs.camera_id = "/dev/video1".to_string();
        prefs.invert_motor = true;

        let driver = DriverProfile::from_preferences(&prefs).unwrap();
        assert_eq!(driver.camera_index, 1);
        assert_eq!(driver.serial_name, "/dev/ttyACM0");
        assert_eq!(driver.baud_rate, 115_200);
        assert!(driver.invert_motor);
    }

    #[test]
    fn test_scan_profile_applies_every_field() {
        let mut settings = Settings::default();
        settings.scan_settings.use_laser = LaserSelection::Right;
        settings.scan_settings.point_cloud_color = "102030".to_string();

        let mut handles = PipelineHandles::default();
        ScanProfile::from_settings(&settings).unwrap().apply(&mut handles);
        CalibrationProfile::from_settings(&settings).unwrap().apply(&mut handles);

        assert!(handles.is_fully_configured());
        assert_eq!(handles.ciclop_scan.use_left_laser, Some(false));
        assert_eq!(handles.ciclop_scan.use_right_laser, Some(true));
        assert_eq!(handles.ciclop_scan.color, Some([0x10, 0x20, 0x30]));
        // Rotated camera: 1280x960 capture delivers a 960 wide frame
        assert_eq!(handles.calibration_data.width, Some(960));
        assert_eq!(handles.calibration_data.height, Some(1280));
    }

    #[test]
    fn test_invalid_color_builds_nothing() {
        let mut settings = Settings::default();
        settings.scan_settings.point_cloud_color = "zzzzzz".to_string();

        let err = ScanProfile::from_settings(&settings).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidSetting { key: "point_cloud_color", .. }));
    }

    #[test]
    fn test_roi_clamped_to_machine() {
        let mut settings = Settings::default();
        settings.scan_settings.roi_diameter = 250.0;
        settings.scan_settings.roi_height = 120.0;
        settings.machine_settings.machine_shape = MachineShape::Rectangular;
        settings.machine_settings.machine_width = 180.0;
        settings.machine_settings.machine_depth = 160.0;
        settings.machine_settings.machine_height = 100.0;

        let roi = RoiProfile::from_settings(&settings).unwrap();
        assert_eq!(roi, RoiProfile { diameter: 160.0, height: 100.0 });
    }
}
