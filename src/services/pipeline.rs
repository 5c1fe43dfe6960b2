//! Processing pipeline handles.
//!
//! These are the long-lived configuration objects read by the scanning and
//! calibration workers. The main window only ever writes into them (see
//! [`profile_sync`](crate::services::profile_sync)); every field starts unset
//! so a handle that was never configured is detectable.

use crate::models::{CameraControls, RedChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CiclopScanConfig {
    pub capture_texture: Option<bool>,
    pub use_left_laser: Option<bool>,
    pub use_right_laser: Option<bool>,
    pub motor_step: Option<f64>,
    pub motor_speed: Option<f64>,
    pub motor_acceleration: Option<f64>,
    pub color: Option<[u8; 3]>,
}

impl CiclopScanConfig {
    pub fn is_configured(&self) -> bool {
        self.capture_texture.is_some()
            && self.use_left_laser.is_some()
            && self.use_right_laser.is_some()
            && self.motor_step.is_some()
            && self.motor_speed.is_some()
            && self.motor_acceleration.is_some()
            && self.color.is_some()
    }
}

/// Camera controls for the pattern, laser and texture capture modes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageCapture {
    pub pattern_mode: Option<CameraControls>,
    pub laser_mode: Option<CameraControls>,
    pub texture_mode: Option<CameraControls>,
    pub use_distortion: Option<bool>,
}

impl ImageCapture {
    pub fn is_configured(&self) -> bool {
        self.pattern_mode.is_some()
            && self.laser_mode.is_some()
            && self.texture_mode.is_some()
            && self.use_distortion.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaserSegmentation {
    pub red_channel: Option<RedChannel>,
    pub open_enable: Option<bool>,
    pub open_value: Option<i32>,
    pub threshold_enable: Option<bool>,
    pub threshold_value: Option<i32>,
}

impl LaserSegmentation {
    pub fn is_configured(&self) -> bool {
        self.red_channel.is_some()
            && self.open_enable.is_some()
            && self.open_value.is_some()
            && self.threshold_enable.is_some()
            && self.threshold_value.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentVideo {
    pub roi_view: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloudRoi {
    pub diameter: Option<f64>,
    pub height: Option<f64>,
}

impl PointCloudRoi {
    pub fn is_configured(&self) -> bool {
        self.diameter.is_some() && self.height.is_some()
    }
}

/// Calibration chessboard geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub square_width: Option<f64>,
    pub origin_distance: Option<f64>,
}

impl Pattern {
    pub fn is_configured(&self) -> bool {
        self.rows.is_some()
            && self.columns.is_some()
            && self.square_width.is_some()
            && self.origin_distance.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserPlane {
    pub distance: f64,
    pub normal: [f64; 3],
}

/// Intrinsic and extrinsic calibration results used by triangulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationData {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera_matrix: Option<[[f64; 3]; 3]>,
    pub distortion_vector: Option<[f64; 5]>,
    /// Left plane first, then right
    pub laser_planes: [Option<LaserPlane>; 2],
    pub platform_rotation: Option<[[f64; 3]; 3]>,
    pub platform_translation: Option<[f64; 3]>,
}

impl CalibrationData {
    pub fn is_configured(&self) -> bool {
        self.width.is_some()
            && self.height.is_some()
            && self.camera_matrix.is_some()
            && self.distortion_vector.is_some()
            && self.laser_planes.iter().all(Option::is_some)
            && self.platform_rotation.is_some()
            && self.platform_translation.is_some()
    }
}

/// Every configuration handle the main window pushes settings into
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineHandles {
    pub ciclop_scan: CiclopScanConfig,
    pub image_capture: ImageCapture,
    pub laser_segmentation: LaserSegmentation,
    pub current_video: CurrentVideo,
    pub point_cloud_roi: PointCloudRoi,
    pub pattern: Pattern,
    pub calibration_data: CalibrationData,
}

impl PipelineHandles {
    pub fn is_fully_configured(&self) -> bool {
        self.ciclop_scan.is_configured()
            && self.image_capture.is_configured()
            && self.laser_segmentation.is_configured()
            && self.current_video.roi_view.is_some()
            && self.point_cloud_roi.is_configured()
            && self.pattern.is_configured()
            && self.calibration_data.is_configured()
    }
}

/// Control surface of the running scan
pub trait ScanControl {
    fn is_scanning(&self) -> bool;

    /// Request the scan to stop; returns immediately
    fn stop(&self);

    /// Receiver that flips to `false` once the scan has actually stopped
    fn watch_scanning(&self) -> watch::Receiver<bool>;
}

/// A long-running calibration routine that can be aborted
pub trait Cancellable {
    /// Abort the routine. Never fails; a no-op when nothing is running.
    fn cancel(&self);
}

/// Scan state shared between the window and the scan worker.
///
/// The worker calls [`ScanState::begin`], polls
/// [`ScanState::stop_requested`] between captures and calls
/// [`ScanState::finish`] when it exits, which acknowledges the stop.
#[derive(Debug)]
pub struct ScanState {
    scanning_tx: watch::Sender<bool>,
    stop_requested: AtomicBool,
}

impl ScanState {
    pub fn new() -> Self {
        let (scanning_tx, _) = watch::channel(false);
        Self {
            scanning_tx,
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn begin(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.scanning_tx.send_replace(true);
        tracing::info!("Scan started");
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        self.scanning_tx.send_replace(false);
        tracing::info!("Scan finished");
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanControl for ScanState {
    fn is_scanning(&self) -> bool {
        *self.scanning_tx.borrow()
    }

    fn stop(&self) {
        if self.is_scanning() {
            tracing::info!("Scan stop requested");
        }
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn watch_scanning(&self) -> watch::Receiver<bool> {
        self.scanning_tx.subscribe()
    }
}

/// Cancellation flag for one calibration routine
#[derive(Debug)]
pub struct CalibrationRoutine {
    name: &'static str,
    cancelled: AtomicBool,
}

impl CalibrationRoutine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag before starting a new run
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl Cancellable for CalibrationRoutine {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("{} cancelled", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_new_handles_are_unset() {
        let handles = PipelineHandles::default();
        assert!(!handles.is_fully_configured());
        assert!(handles.ciclop_scan.color.is_none());
        assert!(handles.calibration_data.laser_planes.iter().all(Option::is_none));
    }

    #[test]
    fn test_scan_state_lifecycle() {
        let scan = ScanState::new();
        assert!(!scan.is_scanning());

        scan.begin();
        assert!(scan.is_scanning());
        assert!(!scan.stop_requested());

        scan.stop();
        assert!(scan.stop_requested());
        // Stopping only requests; the worker acknowledges
        assert!(scan.is_scanning());

        scan.finish();
        assert!(!scan.is_scanning());
    }

    #[tokio::test]
    async fn test_stop_acknowledged_through_watch() {
        let scan = Arc::new(ScanState::new());
        scan.begin();
        let mut rx = scan.watch_scanning();

        let worker = Arc::clone(&scan);
        tokio::spawn(async move {
            while !worker.stop_requested() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            worker.finish();
        });

        scan.stop();
        let acknowledged =
            tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|scanning| !*scanning)).await;
        assert!(acknowledged.is_ok());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let routine = CalibrationRoutine::new("laser triangulation");
        routine.cancel();
        routine.cancel();
        assert!(routine.is_cancelled());

        routine.reset();
        assert!(!routine.is_cancelled());
    }
}
