use super::{Stage, StageReport};
use crate::app::ports::FeedFetcher;
use crate::error::{ImportError, Result};
use crate::pipeline::processing::asset_fetcher::is_remote;
use crate::pipeline::PipelineContext;
use crate::types::{Item, Value};
use async_trait::async_trait;
use indexmap::IndexSet;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    #[default]
    Json,
    Csv,
}

/// How loaded rows meet items already in the collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Create missing items, fill in missing fields of existing ones
    #[default]
    Create,
    /// Only fill in fields of items that already exist
    Add,
}

/// Where a feed is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

impl SourceLocation {
    /// `http://` and `https://` locations are fetched remotely, anything else is a file path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if is_remote(location) {
            SourceLocation::Http(location.to_string())
        } else {
            SourceLocation::File(PathBuf::from(location))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Http(url) => f.write_str(url),
        }
    }
}

/// Loads feed rows from a JSON array or CSV document into the item collection
pub struct SourceStage {
    location: SourceLocation,
    format: SourceFormat,
    mode: SourceMode,
    identifier_field: String,
    identifier_separator: Option<String>,
    feeds: Option<Arc<dyn FeedFetcher>>,
}

impl SourceStage {
    pub fn new(location: SourceLocation, format: SourceFormat, mode: SourceMode, identifier_field: &str) -> Self {
        Self {
            location,
            format,
            mode,
            identifier_field: identifier_field.to_string(),
            identifier_separator: None,
            feeds: None,
        }
    }

    /// Rows whose identifier field holds several separated ids are added under each of them.
    pub fn with_identifier_separator(mut self, separator: Option<String>) -> Self {
        self.identifier_separator = separator.filter(|s| !s.is_empty());
        self
    }

    pub fn with_feed_fetcher(mut self, feeds: Arc<dyn FeedFetcher>) -> Self {
        self.feeds = Some(feeds);
        self
    }

    async fn read(&self) -> Result<Vec<u8>> {
        match &self.location {
            SourceLocation::File(path) => Ok(tokio::fs::read(path).await?),
            SourceLocation::Http(url) => {
                let feeds = self
                    .feeds
                    .as_ref()
                    .ok_or_else(|| ImportError::Config(format!("no HTTP client for {url}")))?;
                Ok(feeds.fetch_feed(url).await?)
            }
        }
    }

    async fn load_rows(&self) -> Result<Vec<Item>> {
        let content = self.read().await?;
        match self.format {
            SourceFormat::Json => json_rows(&content),
            SourceFormat::Csv => csv_rows(&content),
        }
    }

    fn identifiers(&self, row: &Item) -> Vec<String> {
        let Some(raw) = row.non_empty_text(&self.identifier_field) else {
            return Vec::new();
        };
        match &self.identifier_separator {
            Some(separator) => raw
                .split(separator.as_str())
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect(),
            None => vec![raw.to_string()],
        }
    }
}

/// Rows of a JSON array; rows with nested objects are skipped.
pub fn json_rows(content: &[u8]) -> Result<Vec<Item>> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(content)?;
    let mut items = Vec::with_capacity(rows.len());

    'rows: for (index, row) in rows.into_iter().enumerate() {
        let mut item = Item::new();
        for (field, value) in row {
            match json_value(value) {
                Some(value) => item.set(field, value),
                None => {
                    error!("Row {}: field {} holds a nested object, skipping row", index + 1, field);
                    continue 'rows;
                }
            }
        }
        items.push(item);
    }
    Ok(items)
}

fn json_value(value: serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;

    match value {
        Json::Null => Some(Value::Null),
        Json::String(s) => Some(Value::Text(s)),
        Json::Number(n) => Some(Value::Text(n.to_string())),
        Json::Bool(b) => Some(Value::text(if b { "1" } else { "0" })),
        Json::Array(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                Json::String(s) => Some(s),
                Json::Number(n) => Some(n.to_string()),
                Json::Bool(b) => Some(if b { "1" } else { "0" }.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<String>>>()
            .map(Value::List),
        Json::Object(_) => None,
    }
}

/// Rows of a CSV file with a header line.
pub fn csv_rows(content: &[u8]) -> Result<Vec<Item>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);
    let headers = reader.headers()?.clone();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        items.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(field, value)| (field.to_string(), value.to_string()))
                .collect(),
        );
    }
    Ok(items)
}

#[async_trait]
impl Stage for SourceStage {
    #[instrument(skip(self, ctx), fields(location = %self.location))]
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        info!("📥 Loading {:?} source {}", self.format, self.location);

        let rows = self
            .load_rows()
            .await
            .map_err(|e| ImportError::Config(format!("cannot read source {}: {}", self.location, e)))?;

        let total = rows.len();
        let mut created = 0;
        let mut skipped = 0;

        for row in rows {
            let identifiers = self.identifiers(&row);
            if identifiers.is_empty() {
                warn!("Row without {} skipped", self.identifier_field);
                skipped += 1;
                continue;
            }
            let shared = identifiers.len() > 1;

            for identifier in identifiers {
                let mut row = row.clone();
                if shared {
                    row.set(self.identifier_field.clone(), identifier.as_str());
                }

                if let Some(existing) = ctx.items.get_mut(&identifier) {
                    existing.merge_missing(row);
                    continue;
                }

                match self.mode {
                    SourceMode::Create => {
                        ctx.items.insert(identifier, row);
                        created += 1;
                    }
                    SourceMode::Add => {
                        info!("No existing item {}, row not added", identifier);
                        skipped += 1;
                    }
                }
            }
        }

        let message = format!("{} rows read, {} items created, {} rows skipped", total, created, skipped);
        Ok(StageReport::success(self.stage_name(), total, message)
            .with_created(created)
            .with_failed(skipped))
    }

    fn stage_name(&self) -> &'static str {
        "source"
    }
}
