// Native dialogs backed by rfd and the system URL opener

use crate::controller::{Dialogs, FileKind};
use camino::{Utf8Path, Utf8PathBuf};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::path::PathBuf;

/// [`Dialogs`] implementation that blocks on the platform's own dialogs
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDialogs;

impl NativeDialogs {
    fn file_dialog(title: &str, kind: FileKind, start_dir: &Utf8Path) -> FileDialog {
        let mut dialog = FileDialog::new()
            .set_title(title)
            .add_filter(kind.filter_name(), &[kind.extension()]);
        if start_dir.is_dir() {
            dialog = dialog.set_directory(start_dir);
        }
        dialog
    }

    fn message(level: MessageLevel, title: &str, message: &str) {
        MessageDialog::new()
            .set_level(level)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

/// Convert a picked path, dropping (and logging) non-UTF-8 selections
fn to_utf8(path: PathBuf) -> Option<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| {
            tracing::error!("Failed to convert path to UTF-8: {}", e);
            e
        })
        .ok()
}

impl Dialogs for NativeDialogs {
    fn pick_open_file(
        &self,
        title: &str,
        kind: FileKind,
        start_dir: &Utf8Path,
    ) -> Option<Utf8PathBuf> {
        Self::file_dialog(title, kind, start_dir)
            .pick_file()
            .and_then(to_utf8)
    }

    fn pick_save_file(
        &self,
        title: &str,
        kind: FileKind,
        start_dir: &Utf8Path,
    ) -> Option<Utf8PathBuf> {
        Self::file_dialog(title, kind, start_dir)
            .save_file()
            .and_then(to_utf8)
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        let answer = MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::YesNo)
            .show();
        answer == MessageDialogResult::Yes
    }

    fn show_error(&self, title: &str, message: &str) {
        Self::message(MessageLevel::Error, title, message);
    }

    fn show_info(&self, title: &str, message: &str) {
        Self::message(MessageLevel::Info, title, message);
    }

    fn open_url(&self, url: &str) {
        tracing::info!("Opening {}", url);
        if let Err(e) = open::that(url) {
            tracing::error!("Failed to open {}: {}", url, e);
        }
    }
}
