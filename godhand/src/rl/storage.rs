//! Key-value persistence for learned models.
//!
//! The agent serializes its table and training statistics to a JSON string
//! and hands it to a `ModelStore` under a fixed key.  Backends report I/O
//! failures as errors; deciding what to do about them is the caller's job.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::agent::ActionValues;

/// Layout version written with every saved model.
pub const SCHEMA_VERSION: u32 = 1;

/// Minimal string key-value store.
pub trait ModelStore {
    /// Stored value for `key`, `None` when absent.
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Remove `key`.  Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

// ── MemoryStore ────────────────────────────────────────────

/// In-process store.  Clones share the same map, so a test can keep a
/// handle while the agent owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl ModelStore for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

// ── FileStore ──────────────────────────────────────────────

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous model intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ModelStore for FileStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

// ── Persisted layout ───────────────────────────────────────

/// Statistics the unversioned layout keeps under `stats`.  Top-level keys
/// win when both are present.
const NESTED_STATS: [&str; 3] = ["episodes", "totalReward", "rewardHistory"];

fn default_epsilon() -> f64 {
    0.3
}

/// Serialized form of a trained agent.
///
/// Every field has a default so partial documents still load.  `version`
/// is absent in unversioned documents, which may also nest `episodes`,
/// `totalReward` and `rewardHistory` under a `stats` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Rows keyed by the textual state key.
    #[serde(default)]
    pub q_table: BTreeMap<String, ActionValues>,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default)]
    pub episodes: u64,
    #[serde(default)]
    pub total_reward: f64,
    #[serde(default)]
    pub reward_history: Vec<f64>,
}

impl Default for PersistedModel {
    fn default() -> Self {
        Self {
            version: Some(SCHEMA_VERSION),
            q_table: BTreeMap::new(),
            epsilon: default_epsilon(),
            episodes: 0,
            total_reward: 0.0,
            reward_history: Vec::new(),
        }
    }
}

impl PersistedModel {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("serializing model")
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let mut doc: serde_json::Value = serde_json::from_str(s).context("parsing model")?;
        if let Some(obj) = doc.as_object_mut() {
            if let Some(serde_json::Value::Object(stats)) = obj.remove("stats") {
                for key in NESTED_STATS {
                    if let Some(value) = stats.get(key) {
                        obj.entry(key).or_insert_with(|| value.clone());
                    }
                }
            }
        }
        serde_json::from_value(doc).context("parsing model")
    }

    /// Whether the document was written by a compatible layout.
    pub fn is_compatible(&self) -> bool {
        self.version.map_or(true, |v| v == SCHEMA_VERSION)
    }

    /// Mean of the reward history, zero when empty.
    pub fn average_reward(&self) -> f64 {
        if self.reward_history.is_empty() {
            return 0.0;
        }
        self.reward_history.iter().sum::<f64>() / self.reward_history.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let mut handle = store.clone();
        handle.save("k", "v").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("v"));
        handle.remove("k").unwrap();
        assert!(!store.contains("k"));
    }

    #[test]
    fn test_file_store_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("models"));
        assert_eq!(store.load("rl_agent_model").unwrap(), None);

        store.save("rl_agent_model", "{\"epsilon\":0.2}").unwrap();
        assert!(store.path_for("rl_agent_model").exists());
        assert_eq!(
            store.load("rl_agent_model").unwrap().as_deref(),
            Some("{\"epsilon\":0.2}")
        );

        store.remove("rl_agent_model").unwrap();
        assert_eq!(store.load("rl_agent_model").unwrap(), None);
        // Second remove is a no-op.
        store.remove("rl_agent_model").unwrap();
    }

    #[test]
    fn test_file_store_save_fails_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let mut store = FileStore::new(&blocker);
        assert!(store.save("k", "v").is_err());
    }

    #[test]
    fn test_persisted_model_uses_camel_case_layout() {
        let mut model = PersistedModel::default();
        model.q_table.insert("0_0_0_0_0_0".into(), ActionValues::default());
        model.episodes = 3;
        model.total_reward = 12.5;
        model.reward_history = vec![1.0, 2.0];
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["episodes"], 3);
        assert_eq!(json["totalReward"], 12.5);
        assert_eq!(json["rewardHistory"][1], 2.0);
        assert_eq!(json["qTable"]["0_0_0_0_0_0"]["charge"], 0.0);
    }

    #[test]
    fn test_flat_document_without_version_loads() {
        let flat = r#"{"qTable":{"2_1_0_0_0_0":{"direct":1.5,"left":0,"right":0,"retreat":0,"charge":0}},
                         "epsilon":0.1,"episodes":40,"totalReward":-3.0,"rewardHistory":[-1.0]}"#;
        let model = PersistedModel::from_json(flat).unwrap();
        assert_eq!(model.version, None);
        assert!(model.is_compatible());
        assert_eq!(model.episodes, 40);
        assert_eq!(model.q_table["2_1_0_0_0_0"].direct, 1.5);
    }

    #[test]
    fn test_nested_stats_document_loads() {
        let nested = r#"{"qTable":{"1_3_1_0_1_0":{"direct":-2.0,"left":0.5,"right":0,"retreat":0,"charge":0}},
                         "epsilon":0.12,
                         "stats":{"episodes":70,"totalReward":215.5,"rewardHistory":[80.0,-50.0,100.0]}}"#;
        let model = PersistedModel::from_json(nested).unwrap();
        assert!(model.is_compatible());
        assert_eq!(model.episodes, 70);
        assert_eq!(model.total_reward, 215.5);
        assert_eq!(model.reward_history, vec![80.0, -50.0, 100.0]);
        assert!((model.average_reward() - 130.0 / 3.0).abs() < 1e-9);
        assert_eq!(model.q_table["1_3_1_0_1_0"].left, 0.5);

        // Written back flat, without the nested object.
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["episodes"], 70);
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_top_level_stats_win_over_nested() {
        let both = r#"{"episodes":5,"stats":{"episodes":70,"totalReward":9.0}}"#;
        let model = PersistedModel::from_json(both).unwrap();
        assert_eq!(model.episodes, 5);
        assert_eq!(model.total_reward, 9.0);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let model = PersistedModel::from_json("{}").unwrap();
        assert_eq!(model.epsilon, 0.3);
        assert!(model.q_table.is_empty());
        assert_eq!(model.average_reward(), 0.0);
    }

    #[test]
    fn test_future_version_is_incompatible() {
        let model = PersistedModel::from_json(r#"{"version":2}"#).unwrap();
        assert!(!model.is_compatible());
    }
}
