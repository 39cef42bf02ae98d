//! Saved connection sites, persisted as a JSON array.
//!
//! A site is any JSON object the UI chooses to store plus a generated `id`.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type Site = Map<String, Value>;

/// Site list with disk persistence. Every mutation rewrites the file.
pub struct SiteStore {
    sites: Mutex<Vec<Site>>,
    file_path: PathBuf,
}

impl SiteStore {
    /// Create a store, loading any existing sites from disk.
    pub fn new(file_path: PathBuf) -> Self {
        let sites = Self::load_from_disk(&file_path);
        Self {
            sites: Mutex::new(sites),
            file_path,
        }
    }

    pub async fn list(&self) -> Vec<Site> {
        self.sites.lock().await.clone()
    }

    /// Store a new site under a fresh id (any `id` in the input is replaced).
    pub async fn create(&self, mut site: Site) -> Site {
        site.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        let mut sites = self.sites.lock().await;
        sites.push(site.clone());
        self.save_to_disk(&sites);
        site
    }

    /// Shallow-merge `patch` into the site with `id`. The id itself cannot
    /// change. Returns `None` when no such site exists.
    pub async fn update(&self, id: &str, patch: Site) -> Option<Site> {
        let mut sites = self.sites.lock().await;
        let site = sites.iter_mut().find(|s| site_id(s) == Some(id))?;
        for (key, value) in patch {
            if key != "id" {
                site.insert(key, value);
            }
        }
        let updated = site.clone();
        self.save_to_disk(&sites);
        Some(updated)
    }

    /// Delete a site. Returns `true` if found and deleted.
    pub async fn delete(&self, id: &str) -> bool {
        let mut sites = self.sites.lock().await;
        let before = sites.len();
        sites.retain(|s| site_id(s) != Some(id));
        let removed = sites.len() != before;
        if removed {
            self.save_to_disk(&sites);
        }
        removed
    }

    fn load_from_disk(path: &PathBuf) -> Vec<Site> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<Site>>(&contents) {
                Ok(sites) => {
                    debug!("Loaded {} sites from {}", sites.len(), path.display());
                    sites
                }
                Err(e) => {
                    warn!("Failed to parse sites from {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                debug!("No sites file at {}", path.display());
                Vec::new()
            }
        }
    }

    fn save_to_disk(&self, sites: &[Site]) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                );
                return;
            }
        }
        match serde_json::to_string_pretty(sites) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    warn!("Failed to write sites to {}: {}", self.file_path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize sites: {}", e),
        }
    }
}

fn site_id(site: &Site) -> Option<&str> {
    site.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn site(value: Value) -> Site {
        match value {
            Value::Object(map) => map,
            _ => panic!("test site must be an object"),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/sites.json");
        let store = SiteStore::new(path.clone());

        let created = store
            .create(site(json!({"name": "prod", "host": "10.0.0.1", "id": "ignored"})))
            .await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_ne!(id, "ignored");

        let reloaded = SiteStore::new(path);
        let sites = reloaded.list().await;
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0]["name"], "prod");
        assert_eq!(sites[0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn update_merges_shallowly_and_keeps_id() {
        let tmp = TempDir::new().unwrap();
        let store = SiteStore::new(tmp.path().join("sites.json"));
        let created = store
            .create(site(json!({"name": "a", "port": 21, "protocol": "ftp"})))
            .await;
        let id = created["id"].as_str().unwrap();

        let updated = store
            .update(id, site(json!({"port": 2121, "id": "hijack"})))
            .await
            .unwrap();
        assert_eq!(updated["port"], 2121);
        assert_eq!(updated["name"], "a");
        assert_eq!(updated["id"], id);

        assert!(store.update("missing", Site::new()).await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_site() {
        let tmp = TempDir::new().unwrap();
        let store = SiteStore::new(tmp.path().join("sites.json"));
        let created = store.create(site(json!({"name": "x"}))).await;
        let id = created["id"].as_str().unwrap();

        assert!(store.delete(id).await);
        assert!(!store.delete(id).await);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sites.json");
        std::fs::write(&path, "[{broken").unwrap();
        let store = SiteStore::new(path);
        assert!(store.list().await.is_empty());
    }
}
