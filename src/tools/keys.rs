//! In-memory API key storage.
//!
//! Resolution order for a tool call: key passed with the call, then the key
//! stored via `setup_vectara_api_key`, then the configured key.

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct ApiKeyStore {
    stored: RwLock<Option<String>>,
    configured: Option<String>,
}

impl ApiKeyStore {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            stored: RwLock::new(None),
            configured: configured.filter(|k| !k.is_empty()),
        }
    }

    pub fn set(&self, key: impl Into<String>) {
        *self.stored.write() = Some(key.into());
    }

    /// Forget the stored key. Returns whether one was present.
    pub fn clear(&self) -> bool {
        self.stored.write().take().is_some()
    }

    pub fn stored(&self) -> Option<String> {
        self.stored.read().clone()
    }

    pub fn resolve(&self, explicit: Option<&str>) -> Option<String> {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }
        self.stored().or_else(|| self.configured.clone())
    }
}

/// Show the first and last four characters only.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}
