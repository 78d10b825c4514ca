//! File-based schedule store — lightweight persistence.
//! Templates saved as one JSON file — human-readable, git-friendly.
//! Only touched on registry changes, never on a timer tick.

use localboost_core::error::{LocalBoostError, Result};
use localboost_core::types::ScheduleTemplate;
use std::path::{Path, PathBuf};

/// File-based schedule template store.
pub struct TemplateStore {
    path: PathBuf,
}

impl TemplateStore {
    /// Create a store at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.to_path_buf(),
        }
    }

    /// Default store directory (~/.localboost/schedules).
    pub fn default_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".localboost").join("schedules")
    }

    /// Save all templates to disk.
    pub fn save(&self, templates: &[ScheduleTemplate]) -> Result<()> {
        let file = self.path.join("schedules.json");
        let json = serde_json::to_string_pretty(templates)
            .map_err(|e| LocalBoostError::Storage(format!("serialize schedules: {e}")))?;
        std::fs::write(&file, &json)
            .map_err(|e| LocalBoostError::Storage(format!("write {}: {e}", file.display())))?;
        tracing::debug!("💾 Saved {} schedules to {}", templates.len(), file.display());
        Ok(())
    }

    /// Load templates from disk. A missing or unreadable file is an empty
    /// registry, not an error.
    pub fn load(&self) -> Vec<ScheduleTemplate> {
        let file = self.path.join("schedules.json");
        if !file.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&file) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse schedules.json: {e}");
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read schedules.json: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localboost_core::types::{Frequency, Platform, PostCategory};
    use uuid::Uuid;

    fn temp_store() -> TemplateStore {
        let dir = std::env::temp_dir().join(format!("lb-schedules-{}", Uuid::new_v4()));
        TemplateStore::new(&dir)
    }

    fn sample(name: &str) -> ScheduleTemplate {
        ScheduleTemplate::new(
            name,
            "weekly special",
            Frequency::Daily,
            "09:00",
            vec![Platform::Facebook, Platform::Instagram],
            PostCategory::Promotional,
        )
    }

    #[test]
    fn save_then_load_roundtrips() {
        let store = temp_store();
        let templates = vec![sample("a"), sample("b")];
        store.save(&templates).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, templates[0].id);
        assert_eq!(loaded[1].name, "b");
        assert_eq!(loaded[0].platforms.len(), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = temp_store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let store = temp_store();
        std::fs::write(store.path.join("schedules.json"), "not json {").unwrap();
        assert!(store.load().is_empty());
    }
}
