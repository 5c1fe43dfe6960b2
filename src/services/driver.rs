//! Scanner device access: the controller board on a serial port and the
//! USB camera.
//!
//! The main window only needs to open and close the connection, enumerate
//! candidate devices and learn when a device disappears. Frame capture and
//! motor commands live with the scan workers.

use crate::services::profile_sync::DriverProfile;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Interval between device presence checks while connected
const PRESENCE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Serial read timeout for the board
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Callback fired (on the watcher thread) when a device disappears
pub type UnplugCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Board,
    Camera,
}

impl DeviceKind {
    pub fn unplugged_title(&self) -> &'static str {
        match self {
            DeviceKind::Board => "Board unplugged",
            DeviceKind::Camera => "Camera unplugged",
        }
    }

    pub fn unplugged_message(&self) -> &'static str {
        match self {
            DeviceKind::Board => "Board has been unplugged. Please, plug it in and press connect",
            DeviceKind::Camera => "Camera has been unplugged. Please, plug it in and press connect",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Board => f.write_str("board"),
            DeviceKind::Camera => f.write_str("camera"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No driver profile has been applied")]
    NotConfigured,

    #[error("Device is not connected")]
    NotConnected,

    #[error("Failed to open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Camera {0} not found")]
    CameraNotFound(u32),
}

/// Operations the main window performs on the scanner hardware
pub trait DeviceFacade {
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// Close the connection. Returns [`DeviceError::NotConnected`] when
    /// there was nothing to close.
    fn disconnect(&mut self) -> Result<(), DeviceError>;

    fn is_connected(&self) -> bool;

    fn list_serial_ports(&self) -> Vec<String>;

    fn list_video_devices(&self) -> Vec<String>;

    /// Register (or with `None`, clear) the unplug callback for one device
    fn set_unplug_callback(&mut self, kind: DeviceKind, callback: Option<UnplugCallback>);

    fn apply_profile(&mut self, profile: &DriverProfile);

    fn set_frame_rate(&mut self, fps: u32);
}

type CallbackMap = Arc<Mutex<HashMap<DeviceKind, UnplugCallback>>>;

struct PresenceWatcher {
    stop: Arc<AtomicBool>,
}

impl PresenceWatcher {
    /// Poll until one of the devices vanishes, fire its callback once and exit
    fn spawn(serial_name: String, camera_index: u32, callbacks: CallbackMap) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        std::thread::spawn(move || {
            tracing::debug!("Device watcher started for {}", serial_name);

            while !stop_flag.load(Ordering::SeqCst) {
                std::thread::sleep(PRESENCE_POLL_INTERVAL);
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let missing = if !serial_port_present(&serial_name) {
                    Some(DeviceKind::Board)
                } else if !camera_present(camera_index) {
                    Some(DeviceKind::Camera)
                } else {
                    None
                };

                if let Some(kind) = missing {
                    tracing::warn!("{} is no longer present", kind);
                    let callbacks = callbacks.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(callback) = callbacks.get(&kind) {
                        callback();
                    }
                    break;
                }
            }

            tracing::debug!("Device watcher stopped");
        });

        Self { stop }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for PresenceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Device facade backed by the `serialport` crate and the OS video devices
pub struct SerialDriver {
    profile: Option<DriverProfile>,
    frame_rate: Option<u32>,
    port: Option<Box<dyn serialport::SerialPort>>,
    callbacks: CallbackMap,
    watcher: Option<PresenceWatcher>,
}

impl SerialDriver {
    pub fn new() -> Self {
        Self {
            profile: None,
            frame_rate: None,
            port: None,
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            watcher: None,
        }
    }

    pub fn profile(&self) -> Option<&DriverProfile> {
        self.profile.as_ref()
    }

    pub fn frame_rate(&self) -> Option<u32> {
        self.frame_rate
    }
}

impl Default for SerialDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFacade for SerialDriver {
    fn connect(&mut self) -> Result<(), DeviceError> {
        if self.port.is_some() {
            return Ok(());
        }
        let profile = self.profile.clone().ok_or(DeviceError::NotConfigured)?;

        if !camera_present(profile.camera_index) {
            return Err(DeviceError::CameraNotFound(profile.camera_index));
        }

        let port = serialport::new(&profile.serial_name, profile.baud_rate)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|source| DeviceError::SerialOpen {
                port: profile.serial_name.clone(),
                source,
            })?;

        self.port = Some(port);
        self.watcher = Some(PresenceWatcher::spawn(
            profile.serial_name.clone(),
            profile.camera_index,
            Arc::clone(&self.callbacks),
        ));

        tracing::info!(
            "Connected to {} at {} baud, camera {}",
            profile.serial_name,
            profile.baud_rate,
            profile.camera_index
        );
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        match self.port.take() {
            Some(_) => {
                tracing::info!("Disconnected");
                Ok(())
            }
            None => Err(DeviceError::NotConnected),
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn list_serial_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                tracing::error!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }

    fn list_video_devices(&self) -> Vec<String> {
        video_devices()
    }

    fn set_unplug_callback(&mut self, kind: DeviceKind, callback: Option<UnplugCallback>) {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        match callback {
            Some(callback) => {
                callbacks.insert(kind, callback);
            }
            None => {
                callbacks.remove(&kind);
            }
        }
    }

    fn apply_profile(&mut self, profile: &DriverProfile) {
        if self.port.is_some() && self.profile.as_ref() != Some(profile) {
            tracing::info!("Driver profile changed; takes effect on next connect");
        }
        self.profile = Some(profile.clone());
    }

    fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = Some(fps);
    }
}

fn serial_port_present(name: &str) -> bool {
    match serialport::available_ports() {
        Ok(ports) => ports.iter().any(|p| p.port_name == name),
        // Treat enumeration failure as still present rather than a spurious unplug
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
fn video_devices() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut devices: Vec<(u32, String)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let index = name.strip_prefix("video")?.parse::<u32>().ok()?;
            Some((index, format!("/dev/{}", name)))
        })
        .collect();
    devices.sort();
    devices.into_iter().map(|(_, path)| path).collect()
}

#[cfg(not(target_os = "linux"))]
fn video_devices() -> Vec<String> {
    // No portable enumeration; the stored camera id is kept as is
    Vec::new()
}

#[cfg(target_os = "linux")]
fn camera_present(index: u32) -> bool {
    std::path::Path::new(&format!("/dev/video{}", index)).exists()
}

#[cfg(not(target_os = "linux"))]
fn camera_present(_index: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn profile() -> DriverProfile {
        DriverProfile {
            camera_index: 0,
            serial_name: "/dev/does-not-exist".to_string(),
            baud_rate: 115_200,
            invert_motor: false,
        }
    }

    #[test]
    fn test_connect_requires_profile() {
        let mut driver = SerialDriver::new();
        assert!(matches!(driver.connect(), Err(DeviceError::NotConfigured)));
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_disconnect_when_not_connected() {
        let mut driver = SerialDriver::new();
        assert!(matches!(driver.disconnect(), Err(DeviceError::NotConnected)));
    }

    #[test]
    fn test_connect_to_missing_device_fails() {
        let mut driver = SerialDriver::new();
        driver.apply_profile(&profile());

        assert!(driver.connect().is_err());
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_apply_profile_and_frame_rate_are_stored() {
        let mut driver = SerialDriver::new();
        driver.apply_profile(&profile());
        driver.set_frame_rate(15);

        assert_eq!(driver.profile(), Some(&profile()));
        assert_eq!(driver.frame_rate(), Some(15));
    }

    #[test]
    fn test_unplug_callbacks_can_be_cleared() {
        let mut driver = SerialDriver::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        driver.set_unplug_callback(
            DeviceKind::Board,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        {
            let callbacks = driver.callbacks.lock().unwrap();
            callbacks[&DeviceKind::Board]();
        }
        driver.set_unplug_callback(DeviceKind::Board, None);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(driver.callbacks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropping_driver_stops_watcher() {
        let callbacks: CallbackMap = Arc::default();
        let mut driver = SerialDriver::new();
        driver.watcher = Some(PresenceWatcher::spawn("horus-test-port".to_string(), 0, callbacks));
        let stop = driver.watcher.as_ref().map(|w| Arc::clone(&w.stop)).unwrap();

        assert!(!stop.load(Ordering::SeqCst));
        drop(driver);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unplug_messages() {
        assert_eq!(DeviceKind::Camera.unplugged_title(), "Camera unplugged");
        assert!(DeviceKind::Board.unplugged_message().contains("press connect"));
    }
}
