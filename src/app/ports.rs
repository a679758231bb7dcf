use crate::error::{FetchError, Result};
use crate::types::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Identifier of an existing catalog entity owning a URL path
pub type OwnerId = u64;

// Import-side ports
pub trait ImportEngine: Send + Sync {
    fn import(&self, rows: Vec<Row>) -> Result<ErrorReport>;
}

/// Structured outcome returned by the import engine
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub rows_received: usize,
    pub errors: Vec<RowError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RowError {
    pub row: Option<usize>,
    pub message: String,
}

impl ErrorReport {
    pub fn clean(rows_received: usize) -> Self {
        Self { rows_received, errors: Vec::new() }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "{} rows accepted without errors", self.rows_received);
        }
        for error in &self.errors {
            match error.row {
                Some(row) => writeln!(f, "Line {}: {}", row, error.message)?,
                None => writeln!(f, "Line [?]: {}", error.message)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeOption {
    pub value: Option<String>,
    pub label: String,
}

pub trait AttributeOptionStore: Send + Sync {
    fn list_options(&self, code: &str) -> Result<Vec<AttributeOption>>;
    fn add_option(&self, code: &str, label: &str) -> Result<()>;
}

pub trait UrlOwnerIndex: Send + Sync {
    /// Owners of an exact request path (slug plus suffix).
    fn find_owners(&self, request_path: &str) -> Result<Vec<OwnerId>>;

    /// Owner id to item identifier, loaded once per allocation run.
    fn owner_identifiers(&self) -> Result<HashMap<OwnerId, String>>;
}

/// Profile to identifier links remembered between runs
pub trait LinkStore: Send + Sync {
    fn record(&self, profile: &str, identifiers: &[String]) -> Result<()>;

    /// Identifiers linked to `profile` earlier that are absent from `present`.
    fn missing(&self, profile: &str, present: &[String]) -> Result<Vec<String>>;
}

pub trait MarginSource: Send + Sync {
    /// Category path to margin percentage, ordered from least to most specific.
    fn margins(&self) -> Result<Vec<(String, f64)>>;
}

// HTTP-side ports
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Fetches `url` and writes the body to `target`.
    async fn download(&self, url: &str, target: &Path) -> std::result::Result<(), FetchError>;
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetches the whole body of a remote feed.
    async fn fetch_feed(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}
