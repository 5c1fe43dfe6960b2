use camino::{Utf8Path, Utf8PathBuf};

/// Which kind of file a picker is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.json` profile files
    Profile,
    /// `.ply` point clouds
    Model,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Profile => crate::config::PROFILE_EXTENSION,
            FileKind::Model => crate::config::MODEL_EXTENSION,
        }
    }

    pub fn filter_name(&self) -> &'static str {
        match self {
            FileKind::Profile => "JSON files",
            FileKind::Model => "Mesh files",
        }
    }
}

/// Modal interactions with the user.
///
/// All methods block until the user answers. The window shell provides the
/// native implementation; tests substitute a mock.
pub trait Dialogs {
    fn pick_open_file(&self, title: &str, kind: FileKind, start_dir: &Utf8Path)
    -> Option<Utf8PathBuf>;

    fn pick_save_file(&self, title: &str, kind: FileKind, start_dir: &Utf8Path)
    -> Option<Utf8PathBuf>;

    /// Yes/No question; `true` on Yes
    fn confirm(&self, title: &str, message: &str) -> bool;

    fn show_error(&self, title: &str, message: &str);

    fn show_info(&self, title: &str, message: &str);

    /// Open `url` in the system browser
    fn open_url(&self, url: &str);
}
