//! Wizard state persistence.
//!
//! A [`StateStore`] is a small named-entry store with a byte quota, the
//! equivalent of browser local storage. [`WizardRepository`] is the only code
//! that touches it: one key, one versioned snapshot schema.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{DesignVariation, TailorForm, TryOnResult, UploadedImage};
use crate::preview::PreviewRegistry;
use crate::wizard::{WizardState, WizardStep};

/// Storage key of the wizard snapshot.
pub const WIZARD_KEY: &str = "dressStudio_wizard";

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Default quota, matching the common 5 MB browser allowance.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt state file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Named string entries with a byte quota.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;
}

fn usage_with<'a>(
    entries: impl Iterator<Item = (&'a String, &'a String)>,
    key: &str,
    value: &str,
) -> usize {
    let others: usize = entries
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
    others + key.len() + value.len()
}

/// In-memory store, used by tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let needed = usage_with(self.entries.iter(), key, value);
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Store backed by a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    quota: usize,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let aside = path.with_extension("corrupt");
                    warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Unreadable state file, starting fresh"
                    );
                    if let Err(e) = std::fs::rename(&path, &aside) {
                        warn!(error = %e, "Could not move unreadable state file aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "State file opened");
        Ok(Self { path, entries, quota })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let needed = usage_with(self.entries.iter(), key, value);
        if needed > self.quota {
            return Err(StoreError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ImageSlot {
    FrontDrawing,
    BackDrawing,
    Person,
    Clothing,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredImage {
    slot: ImageSlot,
    file_name: String,
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WizardSnapshot {
    version: u32,
    step: WizardStep,
    description: String,
    color: String,
    #[serde(default)]
    tailor_form: TailorForm,
    #[serde(default)]
    variations: Vec<DesignVariation>,
    selected_front: Option<String>,
    selected_back: Option<String>,
    try_on_result: Option<TryOnResult>,
    #[serde(default)]
    images: Vec<StoredImage>,
}

impl WizardSnapshot {
    fn capture(state: &WizardState, with_images: bool) -> Self {
        let mut images = Vec::new();
        if with_images {
            let slots = [
                (ImageSlot::FrontDrawing, state.front_drawing()),
                (ImageSlot::BackDrawing, state.back_drawing()),
                (ImageSlot::Person, state.person_image()),
                (ImageSlot::Clothing, state.clothing_image()),
            ];
            for (slot, image) in slots {
                if let Some(image) = image {
                    images.push(StoredImage {
                        slot,
                        file_name: image.file_name.clone(),
                        mime_type: image.mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                    });
                }
            }
        }

        Self {
            version: SCHEMA_VERSION,
            step: state.step,
            description: state.description.clone(),
            color: state.color.clone(),
            tailor_form: state.tailor_form.clone(),
            variations: state.variations.clone(),
            selected_front: state.selected_front.clone(),
            selected_back: state.selected_back.clone(),
            try_on_result: state.try_on_result.clone(),
            images,
        }
    }

    fn restore(self, registry: &PreviewRegistry) -> WizardState {
        let mut state = WizardState {
            description: self.description,
            color: self.color,
            tailor_form: self.tailor_form,
            variations: self.variations,
            selected_front: self.selected_front,
            selected_back: self.selected_back,
            try_on_result: self.try_on_result,
            step: self.step,
            ..WizardState::default()
        };

        for stored in self.images {
            let bytes = match base64::engine::general_purpose::STANDARD.decode(&stored.data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(slot = ?stored.slot, error = %e, "Dropping undecodable stored image");
                    continue;
                }
            };
            let image = match UploadedImage::new(registry, stored.file_name, stored.mime_type, bytes)
            {
                Ok(image) => image,
                Err(e) => {
                    warn!(slot = ?stored.slot, error = %e, "Dropping invalid stored image");
                    continue;
                }
            };
            match stored.slot {
                ImageSlot::FrontDrawing => state.front_drawing = Some(image),
                ImageSlot::BackDrawing => state.back_drawing = Some(image),
                ImageSlot::Person => state.person_image = Some(image),
                ImageSlot::Clothing => state.clothing_image = Some(image),
            }
        }

        // Stale selections would otherwise unlock steps they no longer justify.
        let front = state.selected_front.take();
        let back = state.selected_back.take();
        if let Some(id) = front {
            let _ = state.select_front(&id);
        }
        if let Some(id) = back {
            let _ = state.select_back(&id);
        }
        state.clamp_step();
        state
    }
}

/// How much of the wizard state a save managed to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Full,
    /// The quota was exceeded; image payloads were left out.
    WithoutImages,
}

/// Typed load/save/clear over a [`StateStore`].
pub struct WizardRepository<S: StateStore> {
    store: S,
    registry: PreviewRegistry,
}

impl<S: StateStore> WizardRepository<S> {
    pub fn new(store: S, registry: PreviewRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    /// Load the persisted state, or a fresh one if nothing usable is stored.
    pub fn load(&self) -> WizardState {
        let raw = match self.store.get(WIZARD_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return WizardState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored wizard state");
                return WizardState::default();
            }
        };

        let snapshot: WizardSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to parse stored wizard state");
                return WizardState::default();
            }
        };
        if snapshot.version != SCHEMA_VERSION {
            warn!(
                found = snapshot.version,
                expected = SCHEMA_VERSION,
                "Discarding wizard state with unknown schema version"
            );
            return WizardState::default();
        }

        snapshot.restore(&self.registry)
    }

    /// Persist `state`, degrading to a snapshot without image payloads when
    /// the full one does not fit.
    pub fn save(&mut self, state: &WizardState) -> Result<SaveOutcome, StoreError> {
        let full = serde_json::to_string(&WizardSnapshot::capture(state, true))?;
        match self.store.set(WIZARD_KEY, &full) {
            Ok(()) => Ok(SaveOutcome::Full),
            Err(StoreError::QuotaExceeded { needed, quota }) => {
                warn!(needed, quota, "Wizard state too large, saving without images");
                let slim = serde_json::to_string(&WizardSnapshot::capture(state, false))?;
                self.store.set(WIZARD_KEY, &slim)?;
                Ok(SaveOutcome::WithoutImages)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the persisted state.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        if self.store.remove(WIZARD_KEY)? {
            info!("Wizard state cleared");
        }
        Ok(())
    }
}
