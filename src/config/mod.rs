use crate::models::{Category, Settings};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use thiserror::Error;

/// Canonical extension for profile files
pub const PROFILE_EXTENSION: &str = "json";

/// Canonical extension for saved models
pub const MODEL_EXTENSION: &str = "ply";

/// Name of the settings file inside the profile directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Errors raised while reading, writing or validating profiles
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to create profile directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read profile {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write profile {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode profile {path}: {source}")]
    Encode {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {category}: {source}")]
    Serialize {
        category: Category,
        #[source]
        source: serde_json::Error,
    },

    #[error("Profile {path} has no {category} section")]
    MissingCategory { path: Utf8PathBuf, category: Category },

    #[error("Unknown settings category: {0}")]
    UnknownCategory(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

impl ProfileError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ProfileError::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }
}

/// Append `.{extension}` unless the path already ends with it (case-insensitive).
///
/// Applied to every user-supplied save path so the written file always carries
/// the canonical extension, whatever the platform's file dialog did.
pub fn normalize_extension(path: &Utf8Path, extension: &str) -> Utf8PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(extension) => path.to_path_buf(),
        _ => Utf8PathBuf::from(format!("{}.{}", path, extension)),
    }
}

/// Profile manager for loading and saving category-partitioned JSON profiles.
///
/// Manages the default settings file (`settings.json` in the profile
/// directory) and arbitrary user-chosen profile files. Every operation takes
/// the list of categories it applies to; sections for other categories are
/// neither read nor written.
#[derive(Debug, Clone)]
pub struct ProfileManager {
    profile_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ProfileManager {
    /// Create a new ProfileManager rooted at `profile_dir`, creating it if needed.
    pub fn new<P: AsRef<Utf8Path>>(profile_dir: P) -> Result<Self, ProfileError> {
        let profile_dir = profile_dir.as_ref().to_path_buf();

        if !profile_dir.exists() {
            fs::create_dir_all(&profile_dir).map_err(|source| ProfileError::CreateDir {
                path: profile_dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            settings_path: profile_dir.join(SETTINGS_FILE_NAME),
            profile_dir,
        })
    }

    /// Load the default settings file.
    ///
    /// A missing or unreadable file yields defaults. A category that fails to
    /// parse or validate falls back to its defaults with a warning.
    pub fn load_default(&self) -> Settings {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Settings::default();
        }

        let sections = match read_sections(&self.settings_path) {
            Ok(sections) => sections,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                return Settings::default();
            }
        };
        let mut settings = Settings::default();

        for category in Category::ALL {
            let Some(section) = sections.get(category.key()) else {
                continue;
            };
            match parse_category(&self.settings_path, category, section) {
                Ok(loaded) => settings.merge_from(&loaded, &[category]),
                Err(e) => tracing::warn!("Ignoring {} in settings file: {}", category, e),
            }
        }

        tracing::info!("Loaded settings from {}", self.settings_path);
        settings
    }

    /// Read the given categories from a profile file.
    ///
    /// Returns a [`Settings`] where only the requested categories carry the
    /// file's values; the caller merges them into the live store. Nothing is
    /// returned unless every requested category parses and validates.
    pub fn load_categories(
        &self,
        path: &Utf8Path,
        categories: &[Category],
    ) -> Result<Settings, ProfileError> {
        let sections = read_sections(path)?;
        let mut loaded = Settings::default();

        for &category in categories {
            let section =
                sections
                    .get(category.key())
                    .ok_or_else(|| ProfileError::MissingCategory {
                        path: path.to_path_buf(),
                        category,
                    })?;
            let parsed = parse_category(path, category, section)?;
            loaded.merge_from(&parsed, &[category]);
        }

        tracing::info!("Loaded {:?} from {}", categories, path);
        Ok(loaded)
    }

    /// Write the given categories of `settings` to `path`.
    ///
    /// The path is normalized to the `.json` extension first; the path actually
    /// written is returned.
    pub fn save_categories(
        &self,
        path: &Utf8Path,
        categories: &[Category],
        settings: &Settings,
    ) -> Result<Utf8PathBuf, ProfileError> {
        let path = normalize_extension(path, PROFILE_EXTENSION);

        let mut sections = IndexMap::new();
        for &category in categories {
            sections.insert(category.key().to_string(), category_value(settings, category)?);
        }
        write_sections(&path, &sections)?;

        tracing::info!("Saved {:?} to {}", categories, path);
        Ok(path)
    }

    /// Update the given categories inside the default settings file,
    /// preserving the other sections already stored there.
    pub fn save_default(
        &self,
        categories: &[Category],
        settings: &Settings,
    ) -> Result<(), ProfileError> {
        let mut sections = if self.settings_path.exists() {
            match read_sections(&self.settings_path) {
                Ok(sections) => sections,
                Err(ProfileError::Parse { source, .. }) => {
                    tracing::warn!(
                        "Replacing unparsable {}: {}",
                        self.settings_path,
                        source
                    );
                    IndexMap::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            IndexMap::new()
        };

        for &category in categories {
            sections.insert(category.key().to_string(), category_value(settings, category)?);
        }
        write_sections(&self.settings_path, &sections)?;

        tracing::info!("Saved {:?} to {}", categories, self.settings_path);
        Ok(())
    }

    /// Directory offered as the starting point of profile dialogs
    pub fn profile_dir(&self) -> &Utf8Path {
        &self.profile_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

fn read_sections(path: &Utf8Path) -> Result<IndexMap<String, Value>, ProfileError> {
    let contents = fs::read_to_string(path).map_err(|source| ProfileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| ProfileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_sections(path: &Utf8Path, sections: &IndexMap<String, Value>) -> Result<(), ProfileError> {
    let json = serde_json::to_string_pretty(sections).map_err(|source| ProfileError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json).map_err(|source| ProfileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_category(
    path: &Utf8Path,
    category: Category,
    section: &Value,
) -> Result<Settings, ProfileError> {
    let parse_err = |source| ProfileError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut settings = Settings::default();
    match category {
        Category::ScanSettings => {
            settings.scan_settings = serde_json::from_value(section.clone()).map_err(parse_err)?
        }
        Category::CalibrationSettings => {
            settings.calibration_settings =
                serde_json::from_value(section.clone()).map_err(parse_err)?
        }
        Category::MachineSettings => {
            settings.machine_settings = serde_json::from_value(section.clone()).map_err(parse_err)?
        }
        Category::Preferences => {
            settings.preferences = serde_json::from_value(section.clone()).map_err(parse_err)?
        }
    }

    settings.validate_category(category)?;
    Ok(settings)
}

fn category_value(settings: &Settings, category: Category) -> Result<Value, ProfileError> {
    let value = match category {
        Category::ScanSettings => serde_json::to_value(&settings.scan_settings),
        Category::CalibrationSettings => serde_json::to_value(&settings.calibration_settings),
        Category::MachineSettings => serde_json::to_value(&settings.machine_settings),
        Category::Preferences => serde_json::to_value(&settings.preferences),
    };
    value.map_err(|source| ProfileError::Serialize { category, source })
}
