//! Revocable preview handles for uploaded images.
//!
//! A [`PreviewHandle`] stands in for a browser object URL: it is issued by a
//! [`PreviewRegistry`] and revoked when dropped, so each handle is released
//! exactly once no matter how the owning image leaves the wizard.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

/// Issues and tracks live preview handles.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<String>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new handle for an image with the given MIME type.
    pub fn create(&self, mime_type: &str) -> PreviewHandle {
        let url = format!("blob:studio/{}", Uuid::new_v4());
        if let Ok(mut live) = self.live.lock() {
            live.insert(url.clone());
        }
        debug!(url = %url, mime_type, "Preview handle created");
        PreviewHandle {
            url,
            registry: self.clone(),
        }
    }

    /// Number of handles that have not been revoked yet.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(url))
            .unwrap_or(false)
    }

    fn revoke(&self, url: &str) {
        match self.live.lock() {
            Ok(mut live) => {
                if !live.remove(url) {
                    warn!(url, "Preview handle revoked twice");
                }
            }
            Err(_) => warn!(url, "Preview registry poisoned; handle not tracked"),
        }
    }
}

/// Display handle for an uploaded image; revoked on drop.
pub struct PreviewHandle {
    url: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        debug!(url = %self.url, "Preview handle revoked");
        self.registry.revoke(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_revoked_on_drop() {
        let registry = PreviewRegistry::new();
        let a = registry.create("image/png");
        let b = registry.create("image/jpeg");
        assert_ne!(a.url(), b.url());
        assert_eq!(registry.live_count(), 2);

        let url = a.url().to_string();
        drop(a);
        assert!(!registry.is_live(&url));
        assert_eq!(registry.live_count(), 1);

        drop(b);
        assert_eq!(registry.live_count(), 0);
    }
}
