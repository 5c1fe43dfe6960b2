//! Services module - everything the main window talks to besides the settings.
//!
//! The services are **toolkit-agnostic**: nothing here depends on Slint, so
//! the controller can be driven by tests with mock implementations.
//!
//! # Components
//!
//! - [`driver`]: the [`DeviceFacade`] trait and the [`SerialDriver`] backed by
//!   `serialport`, including unplug detection on a watcher thread.
//! - [`pipeline`]: configuration handles read by the scan and calibration
//!   workers ([`PipelineHandles`]), plus the [`ScanControl`] and
//!   [`Cancellable`] seams.
//! - [`profile_sync`]: validated [`DriverProfile`], [`ScanProfile`] and
//!   [`CalibrationProfile`] values built from the settings and pushed into
//!   the device and handles.
//! - [`mesh`]: the [`PointCloud`] model and its ASCII PLY codec.

pub mod driver;
pub mod mesh;
pub mod pipeline;
pub mod profile_sync;

pub use driver::{DeviceError, DeviceFacade, DeviceKind, SerialDriver, UnplugCallback};
pub use mesh::{MeshCodec, MeshError, PlyCodec, PointCloud};
pub use pipeline::{
    CalibrationRoutine, Cancellable, PipelineHandles, ScanControl, ScanState,
};
pub use profile_sync::{CalibrationProfile, DriverProfile, RoiProfile, ScanProfile};
