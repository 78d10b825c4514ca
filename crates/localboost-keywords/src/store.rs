//! File-based keyword cluster store.
//! Clusters saved as a single JSON file — only written on refresh,
//! never on reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use localboost_core::types::{KeywordCluster, ServingArea};

/// Serving areas plus the keyword cluster discovered for each one.
pub struct KeywordStore {
    dir: PathBuf,
    areas: Vec<ServingArea>,
    clusters: Mutex<HashMap<String, KeywordCluster>>,
}

impl KeywordStore {
    /// Open a store in `dir`, seeding the serving areas from config and
    /// loading any previously saved clusters.
    pub fn open(dir: &Path, areas: Vec<ServingArea>) -> Self {
        std::fs::create_dir_all(dir).ok();
        let store = Self {
            dir: dir.to_path_buf(),
            areas,
            clusters: Mutex::new(HashMap::new()),
        };
        let loaded = store.load();
        if !loaded.is_empty() {
            tracing::info!("🔑 Keyword clusters loaded: {} area(s)", loaded.len());
            *store.clusters.lock().unwrap() = loaded;
        }
        store
    }

    /// Default store directory (~/.localboost/keywords).
    pub fn default_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".localboost").join("keywords")
    }

    /// The business's serving areas, in configured order.
    pub fn areas(&self) -> &[ServingArea] {
        &self.areas
    }

    /// The cluster for one area, if discovery has produced one.
    pub fn cluster_for(&self, area: &str) -> Option<KeywordCluster> {
        self.clusters.lock().unwrap().get(area).cloned()
    }

    /// All clusters, keyed by area name.
    pub fn all_clusters(&self) -> HashMap<String, KeywordCluster> {
        self.clusters.lock().unwrap().clone()
    }

    /// Replace the cluster for `cluster.area` wholesale and persist.
    /// The previous cluster for that area is discarded, not merged.
    pub fn refresh(&self, cluster: KeywordCluster) {
        let area = cluster.area.clone();
        {
            let mut clusters = self.clusters.lock().unwrap();
            clusters.insert(area.clone(), cluster);
        }
        self.save();
        tracing::info!("🔑 Keyword cluster refreshed for area '{}'", area);
    }

    fn save(&self) {
        let file = self.dir.join("clusters.json");
        let clusters = self.clusters.lock().unwrap();
        let values: Vec<&KeywordCluster> = clusters.values().collect();
        match serde_json::to_string_pretty(&values) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&file, &json) {
                    tracing::warn!("⚠️ Failed to write clusters.json: {e}");
                } else {
                    tracing::debug!("💾 Saved {} cluster(s) to {}", values.len(), file.display());
                }
            }
            Err(e) => tracing::warn!("⚠️ Failed to serialize clusters: {e}"),
        }
    }

    fn load(&self) -> HashMap<String, KeywordCluster> {
        let file = self.dir.join("clusters.json");
        if !file.exists() {
            return HashMap::new();
        }
        match std::fs::read_to_string(&file) {
            Ok(json) => match serde_json::from_str::<Vec<KeywordCluster>>(&json) {
                Ok(list) => list.into_iter().map(|c| (c.area.clone(), c)).collect(),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to parse clusters.json: {e}");
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!("⚠️ Failed to read clusters.json: {e}");
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(name: &str) -> ServingArea {
        ServingArea {
            name: name.to_string(),
            zip_codes: vec!["78701".into()],
            radius_km: Some(15.0),
        }
    }

    fn cluster(area: &str, primary: &str) -> KeywordCluster {
        KeywordCluster {
            area: area.to_string(),
            primary_keyword: primary.to_string(),
            related_keywords: vec!["emergency plumber".into(), "drain cleaning".into()],
            content_themes: vec!["seasonal maintenance".into()],
            seasonality: None,
        }
    }

    #[test]
    fn refresh_overwrites_wholesale() {
        let dir = std::env::temp_dir().join("localboost_kw_overwrite");
        std::fs::remove_dir_all(&dir).ok();
        let store = KeywordStore::open(&dir, vec![area("downtown")]);

        store.refresh(cluster("downtown", "plumber downtown austin"));
        store.refresh(KeywordCluster {
            related_keywords: vec!["water heater repair".into()],
            ..cluster("downtown", "plumber near me")
        });

        let got = store.cluster_for("downtown").unwrap();
        assert_eq!(got.primary_keyword, "plumber near me");
        // The old related keywords are gone, not merged in.
        assert_eq!(got.related_keywords, vec!["water heater repair".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn clusters_survive_reopen() {
        let dir = std::env::temp_dir().join("localboost_kw_reopen");
        std::fs::remove_dir_all(&dir).ok();
        {
            let store = KeywordStore::open(&dir, vec![area("north")]);
            store.refresh(cluster("north", "hvac repair north side"));
        }
        let reopened = KeywordStore::open(&dir, vec![area("north")]);
        let got = reopened.cluster_for("north").unwrap();
        assert_eq!(got.primary_keyword, "hvac repair north side");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_area_has_no_cluster() {
        let dir = std::env::temp_dir().join("localboost_kw_missing");
        std::fs::remove_dir_all(&dir).ok();
        let store = KeywordStore::open(&dir, vec![area("east")]);
        assert!(store.cluster_for("west").is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
