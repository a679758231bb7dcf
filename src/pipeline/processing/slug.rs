use crate::app::ports::{OwnerId, UrlOwnerIndex};
use crate::constants;
use crate::error::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

/// URL-safe form of `raw`: runs of non-alphanumeric characters become a single `-`, case is kept.
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Candidate slugs in probing order: `key`, `identifier-key`, then `identifier-key-1..N`.
pub fn slug_candidates(url_key: &str, identifier: &str) -> Vec<String> {
    let key = url_key.to_lowercase();
    let prefixed = format!("{identifier}-{key}");

    let mut raw = vec![key.clone(), prefixed.clone()];
    raw.extend((1..=constants::SLUG_NUMBERED_FALLBACKS).map(|n| format!("{prefixed}-{n}")));

    let mut seen = HashSet::new();
    raw.iter()
        .map(|candidate| normalize_slug(candidate))
        .filter(|candidate| !candidate.is_empty() && seen.insert(candidate.clone()))
        .collect()
}

/// Assigns collision-free slugs against the catalog's URL index and earlier claims in the same run.
pub struct UniqueSlugAllocator<'a> {
    index: &'a dyn UrlOwnerIndex,
    suffix: String,
    owners: HashMap<OwnerId, String>,
    claimed: HashSet<String>,
}

impl<'a> UniqueSlugAllocator<'a> {
    /// Loads the owner map once; it is dropped together with the allocator.
    pub fn new(index: &'a dyn UrlOwnerIndex, suffix: &str) -> Result<Self> {
        Ok(Self {
            index,
            suffix: suffix.to_string(),
            owners: index.owner_identifiers()?,
            claimed: HashSet::new(),
        })
    }

    pub fn claimed(&self) -> usize {
        self.claimed.len()
    }

    /// First candidate that is free or already owned by `identifier`, or `None` when all are taken.
    pub fn resolve(&mut self, url_key: &str, identifier: &str) -> Result<Option<String>> {
        let candidates = slug_candidates(url_key, identifier);

        for candidate in &candidates {
            if self.claimed.contains(candidate) {
                continue;
            }

            let request_path = format!("{candidate}{}", self.suffix);
            let owners = self.index.find_owners(&request_path)?;
            let owned_by_item = owners
                .iter()
                .any(|owner| self.owners.get(owner).map(String::as_str) == Some(identifier));

            if owners.is_empty() || owned_by_item {
                debug!("Assigned url key {} to {}", candidate, identifier);
                self.claimed.insert(candidate.clone());
                return Ok(Some(candidate.clone()));
            }
        }

        error!(
            "No unique url key found for {} (tried: {})",
            identifier,
            candidates.join(", ")
        );
        Ok(None)
    }
}
