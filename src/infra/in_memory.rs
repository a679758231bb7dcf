use crate::app::ports::{
    AttributeOption, AttributeOptionStore, LinkStore, MarginSource, OwnerId, UrlOwnerIndex,
};
use crate::error::Result;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Attribute options kept in memory, keyed by attribute code
#[derive(Default, Clone)]
pub struct InMemoryOptionStore {
    options: Arc<Mutex<HashMap<String, Vec<AttributeOption>>>>,
}

impl InMemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(code: &str, labels: &[&str]) -> Self {
        let store = Self::new();
        lock(&store.options).insert(
            code.to_string(),
            labels
                .iter()
                .map(|l| AttributeOption { value: None, label: l.to_string() })
                .collect(),
        );
        store
    }

    pub fn labels(&self, code: &str) -> Vec<String> {
        lock(&self.options)
            .get(code)
            .map(|opts| opts.iter().map(|o| o.label.clone()).collect())
            .unwrap_or_default()
    }
}

impl AttributeOptionStore for InMemoryOptionStore {
    fn list_options(&self, code: &str) -> Result<Vec<AttributeOption>> {
        Ok(lock(&self.options).get(code).cloned().unwrap_or_default())
    }

    fn add_option(&self, code: &str, label: &str) -> Result<()> {
        let mut options = lock(&self.options);
        let entry = options.entry(code.to_string()).or_default();
        let value = entry.len() + 1;
        entry.push(AttributeOption {
            value: Some(value.to_string()),
            label: label.to_string(),
        });
        debug!("Created option '{}' for attribute {}", label, code);
        Ok(())
    }
}

/// URL rewrites of the existing catalog
#[derive(Default)]
pub struct InMemoryUrlIndex {
    rewrites: HashMap<String, Vec<OwnerId>>,
    owners: HashMap<OwnerId, String>,
    lookups: AtomicUsize,
}

impl InMemoryUrlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `request_path` as owned by the entity `owner` with identifier `identifier`.
    pub fn with_rewrite(mut self, request_path: &str, owner: OwnerId, identifier: &str) -> Self {
        self.rewrites
            .entry(request_path.to_string())
            .or_default()
            .push(owner);
        self.owners.insert(owner, identifier.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl UrlOwnerIndex for InMemoryUrlIndex {
    fn find_owners(&self, request_path: &str) -> Result<Vec<OwnerId>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.rewrites.get(request_path).cloned().unwrap_or_default())
    }

    fn owner_identifiers(&self) -> Result<HashMap<OwnerId, String>> {
        Ok(self.owners.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryLinkStore {
    links: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn linked(&self, profile: &str) -> Vec<String> {
        lock(&self.links)
            .get(profile)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn record(&self, profile: &str, identifiers: &[String]) -> Result<()> {
        lock(&self.links)
            .entry(profile.to_string())
            .or_default()
            .extend(identifiers.iter().cloned());
        Ok(())
    }

    fn missing(&self, profile: &str, present: &[String]) -> Result<Vec<String>> {
        let present: BTreeSet<&String> = present.iter().collect();
        Ok(lock(&self.links)
            .get(profile)
            .map(|ids| ids.iter().filter(|id| !present.contains(id)).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub struct StaticMargins {
    margins: Vec<(String, f64)>,
}

impl StaticMargins {
    pub fn new(margins: Vec<(String, f64)>) -> Self {
        Self { margins }
    }
}

impl MarginSource for StaticMargins {
    fn margins(&self) -> Result<Vec<(String, f64)>> {
        Ok(self.margins.clone())
    }
}

/// JSON description of the existing catalog used to seed the in-memory collaborators
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub url_rewrites: Vec<UrlRewriteEntry>,
    pub attribute_options: HashMap<String, Vec<String>>,
    pub links: HashMap<String, Vec<String>>,
    pub category_margins: Vec<(String, f64)>,
}

#[derive(Debug, Deserialize)]
pub struct UrlRewriteEntry {
    pub request_path: String,
    pub owner: OwnerId,
    pub identifier: String,
}

/// Collaborators built from a snapshot
pub struct SeededCatalog {
    pub options: InMemoryOptionStore,
    pub url_index: InMemoryUrlIndex,
    pub links: InMemoryLinkStore,
    pub margins: StaticMargins,
}

impl CatalogSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn seed(self) -> Result<SeededCatalog> {
        let options = InMemoryOptionStore::new();
        for (code, labels) in &self.attribute_options {
            for label in labels {
                options.add_option(code, label)?;
            }
        }

        let url_index = self.url_rewrites.iter().fold(InMemoryUrlIndex::new(), |index, r| {
            index.with_rewrite(&r.request_path, r.owner, &r.identifier)
        });

        let links = InMemoryLinkStore::new();
        for (profile, identifiers) in &self.links {
            links.record(profile, identifiers)?;
        }

        Ok(SeededCatalog {
            options,
            url_index,
            links,
            margins: StaticMargins::new(self.category_margins),
        })
    }
}
