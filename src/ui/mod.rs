// UI module - Slint window shell
//
// This module contains:
// - CommandBridge: Timer that drains the command queue on the Slint thread
// - NativeDialogs: rfd-backed file pickers and message boxes
// - GuiController: Creates the MainWindow and wires its callbacks to commands

pub mod bridge;
pub mod dialogs;
pub mod window;

pub use bridge::CommandBridge;
pub use dialogs::NativeDialogs;
pub use window::{GuiController, MainWindow};
