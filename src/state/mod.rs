// Settings store module
//
// This module provides the SettingsStore which wraps the typed Settings with
// thread-safe access using Arc<RwLock<T>> and emits change events for the GUI.

use crate::config::{ProfileError, ProfileManager};
use crate::models::{Category, Settings};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when settings are modified
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsChange {
    /// One category's values changed
    CategoryChanged { category: Category },

    /// The active workbench key changed
    WorkbenchChanged { workbench: String },

    /// The recently used files list changed
    LastFilesChanged { last_files: Vec<String> },

    /// Categories were restored to their defaults
    CategoriesReset { categories: Vec<Category> },

    /// Categories were replaced from a profile file
    ProfileLoaded {
        path: Utf8PathBuf,
        categories: Vec<Category>,
    },
}

/// Thread-safe settings store with event emission
///
/// This is the single source of truth for profile values. It:
/// - Provides thread-safe access to [`Settings`] via `Arc<RwLock<T>>`
/// - Detects which categories changed and emits [`SettingsChange`] events
/// - Loads, saves and resets individual categories through [`ProfileManager`]
///
/// The main window only touches it from the UI thread, but scan workers may
/// hold a clone and read it concurrently.
pub struct SettingsStore {
    /// The settings protected by RwLock for thread-safe access
    settings: Arc<RwLock<Settings>>,

    /// Broadcast channel for emitting change events
    change_tx: broadcast::Sender<SettingsChange>,
}

impl SettingsStore {
    /// Create a store holding the default profile
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Create a store holding `settings`
    ///
    /// # Returns
    /// A new SettingsStore with a broadcast channel buffer of 100 events
    pub fn with_settings(settings: Settings) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            change_tx,
        }
    }

    /// Get a copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.read(Clone::clone)
    }

    /// Execute a function with read access to the settings
    ///
    /// # Example
    /// ```ignore
    /// let baud = store.read(|s| s.preferences.baud_rate);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Settings) -> R,
    {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        f(&settings)
    }

    /// Update the settings and emit change events
    ///
    /// 1. Captures the old settings
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// The SettingsChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SettingsChange>
    where
        F: FnOnce(&mut Settings),
    {
        let changes = {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let old = settings.clone();
            update_fn(&mut settings);
            Self::detect_changes(&old, &settings)
        };

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.change_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.change_tx.subscribe()
    }

    fn detect_changes(old: &Settings, new: &Settings) -> Vec<SettingsChange> {
        let mut changes = Vec::new();

        if old.scan_settings != new.scan_settings {
            changes.push(SettingsChange::CategoryChanged {
                category: Category::ScanSettings,
            });
        }
        if old.calibration_settings != new.calibration_settings {
            changes.push(SettingsChange::CategoryChanged {
                category: Category::CalibrationSettings,
            });
        }
        if old.machine_settings != new.machine_settings {
            changes.push(SettingsChange::CategoryChanged {
                category: Category::MachineSettings,
            });
        }

        if old.preferences.workbench != new.preferences.workbench {
            changes.push(SettingsChange::WorkbenchChanged {
                workbench: new.preferences.workbench.clone(),
            });
        }
        if old.preferences.last_files != new.preferences.last_files {
            changes.push(SettingsChange::LastFilesChanged {
                last_files: new.preferences.last_files.clone(),
            });
        }
        if old.preferences != new.preferences {
            changes.push(SettingsChange::CategoryChanged {
                category: Category::Preferences,
            });
        }

        changes
    }

    // Category-level operations

    /// Replace `categories` with the values stored in the profile at `path`.
    ///
    /// On any read, parse or validation error the store is left unchanged.
    pub fn load_categories(
        &self,
        profiles: &ProfileManager,
        path: &Utf8Path,
        categories: &[Category],
    ) -> Result<Vec<SettingsChange>, ProfileError> {
        let loaded = profiles.load_categories(path, categories)?;

        let mut changes = self.update(|settings| settings.merge_from(&loaded, categories));

        let event = SettingsChange::ProfileLoaded {
            path: path.to_path_buf(),
            categories: categories.to_vec(),
        };
        let _ = self.change_tx.send(event.clone());
        changes.push(event);

        Ok(changes)
    }

    /// Write `categories` to `path`; the in-memory settings are not modified.
    pub fn save_categories(
        &self,
        profiles: &ProfileManager,
        path: &Utf8Path,
        categories: &[Category],
    ) -> Result<Utf8PathBuf, ProfileError> {
        self.read(|settings| profiles.save_categories(path, categories, settings))
    }

    /// Persist `categories` into the default settings file
    pub fn save_default(
        &self,
        profiles: &ProfileManager,
        categories: &[Category],
    ) -> Result<(), ProfileError> {
        self.read(|settings| profiles.save_default(categories, settings))
    }

    /// Restore `categories` to their defaults
    pub fn reset_categories(&self, categories: &[Category]) -> Vec<SettingsChange> {
        let mut changes = self.update(|settings| settings.reset(categories));

        let event = SettingsChange::CategoriesReset {
            categories: categories.to_vec(),
        };
        let _ = self.change_tx.send(event.clone());
        changes.push(event);

        changes
    }

    /// Get an Arc reference to the settings for use in worker threads
    pub fn settings_arc(&self) -> Arc<RwLock<Settings>> {
        Arc::clone(&self.settings)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

// Make SettingsStore cloneable for sharing across threads
impl Clone for SettingsStore {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            change_tx: self.change_tx.clone(),
        }
    }
}
