//! User profile persistence
//!
//! The engine reads the profile once at startup and writes it back
//! whenever registration, consent or a local edit changes it. Writes are
//! best effort: a failed save is logged and retried on the next change.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use bodyscale_types::UserProfile;

use crate::error::Result;

/// Persistent home of the single user profile
#[cfg_attr(test, mockall::automock)]
pub trait ProfileStore: Send {
    /// Stored profile, `None` before onboarding
    fn load_profile(&self) -> Result<Option<UserProfile>>;

    fn save_profile(&self, profile: &UserProfile) -> Result<()>;
}

/// In-process store, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profile: Arc<Mutex<Option<UserProfile>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `profile`
    pub fn with_profile(profile: UserProfile) -> Self {
        Self {
            profile: Arc::new(Mutex::new(Some(profile))),
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> Option<UserProfile> {
        self.profile.lock().clone()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load_profile(&self) -> Result<Option<UserProfile>> {
        Ok(self.snapshot())
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        *self.profile.lock() = Some(profile.clone());
        Ok(())
    }
}

/// Profile kept as pretty-printed JSON in a single file
#[derive(Debug, Clone)]
pub struct JsonFileProfileStore {
    path: PathBuf,
}

impl JsonFileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for JsonFileProfileStore {
    fn load_profile(&self) -> Result<Option<UserProfile>> {
        if !self.path.exists() {
            debug!("No profile at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let profile = serde_json::from_str(&contents)?;
        Ok(Some(profile))
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, json)?;
        debug!("Saved profile to {}", self.path.display());
        Ok(())
    }
}
