use super::processing::{FieldGrouping, VariantGrouper};
use super::steps::{
    AssetFetchStage, AttributeOptionsStage, CategoryMarginStage, DisableMode, DisablerStage, MapperStage,
    SourceFormat, SourceLocation, SourceMode, SourceStage, Stage, UrlKeyStage, VariantGroupingStage,
};
use super::Pipeline;
use crate::app::ports::{
    AssetDownloader, AttributeOptionStore, FeedFetcher, LinkStore, MarginSource, UrlOwnerIndex,
};
use crate::constants;
use crate::error::{ImportError, Result};
use crate::infra::{SeededCatalog, StaticMargins};
use crate::types::FieldValue;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a complete pipeline execution
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub stages: Vec<StageConfig>,
}

/// Configuration for individual pipeline stages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Source {
        /// Local file path or `http(s)://` URL
        path: String,
        #[serde(default)]
        format: SourceFormat,
        #[serde(default)]
        mode: SourceMode,
        #[serde(default = "default_identifier")]
        identifier: String,
        /// Splits the identifier field into several item identifiers when set
        #[serde(default)]
        identifier_separator: Option<String>,
    },
    Mapper {
        mapping: IndexMap<String, FieldValue>,
        #[serde(default)]
        required: Vec<String>,
        #[serde(default)]
        keep_unmapped: bool,
    },
    CategoryMargin {
        /// Inline `[category path, margin]` pairs replacing the catalog's margins
        #[serde(default)]
        margins: Option<Vec<(String, f64)>>,
    },
    AssetFetch {
        media_dir: PathBuf,
        #[serde(default = "default_asset_fields")]
        fields: Vec<String>,
        #[serde(default = "default_list_asset_fields")]
        list_fields: Vec<String>,
        #[serde(default = "default_concurrency")]
        concurrency: usize,
    },
    AttributeOptions {
        attributes: Vec<String>,
    },
    VariantGrouping {
        parent_field: String,
        #[serde(default)]
        parent_separator: Option<String>,
        variation_attributes: Vec<String>,
        #[serde(default)]
        split_on: Option<String>,
        #[serde(default)]
        parent_template: IndexMap<String, FieldValue>,
        #[serde(default)]
        child_overrides: IndexMap<String, FieldValue>,
        #[serde(default = "default_true")]
        filter_degenerate: bool,
    },
    UrlKey {
        #[serde(default = "default_url_suffix")]
        suffix: String,
    },
    Disabler {
        #[serde(default)]
        mode: DisableMode,
        #[serde(default)]
        force: bool,
    },
}

fn default_identifier() -> String {
    constants::SKU.to_string()
}

fn default_asset_fields() -> Vec<String> {
    constants::DEFAULT_ASSET_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_list_asset_fields() -> Vec<String> {
    constants::DEFAULT_LIST_ASSET_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_concurrency() -> usize {
    constants::DEFAULT_CONCURRENCY
}

fn default_url_suffix() -> String {
    ".html".to_string()
}

fn default_true() -> bool {
    true
}

/// External services the stages talk to
#[derive(Clone)]
pub struct Collaborators {
    pub downloader: Arc<dyn AssetDownloader>,
    pub feeds: Arc<dyn FeedFetcher>,
    pub options: Arc<dyn AttributeOptionStore>,
    pub url_index: Arc<dyn UrlOwnerIndex>,
    pub links: Arc<dyn LinkStore>,
    pub margins: Arc<dyn MarginSource>,
}

impl Collaborators {
    pub fn from_catalog(
        catalog: SeededCatalog,
        downloader: Arc<dyn AssetDownloader>,
        feeds: Arc<dyn FeedFetcher>,
    ) -> Self {
        Self {
            downloader,
            feeds,
            options: Arc::new(catalog.options),
            url_index: Arc::new(catalog.url_index),
            links: Arc::new(catalog.links),
            margins: Arc::new(catalog.margins),
        }
    }
}

impl StageConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            StageConfig::Source { .. } => "source",
            StageConfig::Mapper { .. } => "mapper",
            StageConfig::CategoryMargin { .. } => "category_margin",
            StageConfig::AssetFetch { .. } => "asset_fetch",
            StageConfig::AttributeOptions { .. } => "attribute_options",
            StageConfig::VariantGrouping { .. } => "variant_grouping",
            StageConfig::UrlKey { .. } => "url_key",
            StageConfig::Disabler { .. } => "disabler",
        }
    }

    /// Checks the settings that would make the stage fail as a whole.
    pub fn validate(&self) -> Result<()> {
        let problem = match self {
            StageConfig::Source { path, .. } if path.trim().is_empty() => Some("path must not be empty"),
            StageConfig::Source { identifier, .. } if identifier.is_empty() => Some("identifier must not be empty"),
            StageConfig::Mapper { mapping, .. } if mapping.is_empty() => Some("mapping must not be empty"),
            StageConfig::AssetFetch { concurrency: 0, .. } => Some("concurrency must be at least 1"),
            StageConfig::AssetFetch { fields, list_fields, .. } if fields.is_empty() && list_fields.is_empty() => {
                Some("no asset fields configured")
            }
            StageConfig::AttributeOptions { attributes } if attributes.is_empty() => Some("no attributes configured"),
            StageConfig::VariantGrouping { parent_field, .. } if parent_field.is_empty() => {
                Some("parent_field must not be empty")
            }
            StageConfig::VariantGrouping { variation_attributes, .. } if variation_attributes.is_empty() => {
                Some("no variation attributes configured")
            }
            _ => None,
        };

        match problem {
            Some(problem) => Err(ImportError::stage(
                self.type_name(),
                ImportError::Config(problem.to_string()),
            )),
            None => Ok(()),
        }
    }

    /// Create the stage implementation for this configuration
    pub fn build(&self, collaborators: &Collaborators) -> Result<Box<dyn Stage>> {
        self.validate()?;

        let stage: Box<dyn Stage> = match self {
            StageConfig::Source {
                path,
                format,
                mode,
                identifier,
                identifier_separator,
            } => Box::new(
                SourceStage::new(SourceLocation::parse(path), *format, *mode, identifier)
                    .with_identifier_separator(identifier_separator.clone())
                    .with_feed_fetcher(Arc::clone(&collaborators.feeds)),
            ),
            StageConfig::Mapper { mapping, required, keep_unmapped } => Box::new(
                MapperStage::new(mapping.clone())
                    .with_required(required.clone())
                    .keep_unmapped(*keep_unmapped),
            ),
            StageConfig::CategoryMargin { margins } => {
                let source: Arc<dyn MarginSource> = match margins {
                    Some(margins) => Arc::new(StaticMargins::new(margins.clone())),
                    None => Arc::clone(&collaborators.margins),
                };
                Box::new(CategoryMarginStage::new(source))
            }
            StageConfig::AssetFetch { media_dir, fields, list_fields, concurrency } => Box::new(AssetFetchStage::new(
                Arc::clone(&collaborators.downloader),
                media_dir.clone(),
                fields.clone(),
                list_fields.clone(),
                *concurrency,
            )),
            StageConfig::AttributeOptions { attributes } => Box::new(AttributeOptionsStage::new(
                Arc::clone(&collaborators.options),
                attributes.clone(),
            )),
            StageConfig::VariantGrouping {
                parent_field,
                parent_separator,
                variation_attributes,
                split_on,
                parent_template,
                child_overrides,
                filter_degenerate,
            } => {
                let strategy = FieldGrouping {
                    parent_field: parent_field.clone(),
                    parent_separator: parent_separator.clone(),
                    variation_attributes: variation_attributes.clone(),
                    split_on: split_on.clone(),
                };
                let grouper = VariantGrouper::new(Box::new(strategy))
                    .with_parent_template(parent_template.clone())
                    .with_child_overrides(child_overrides.clone())
                    .with_filter_degenerate(*filter_degenerate);
                Box::new(VariantGroupingStage::new(grouper))
            }
            StageConfig::UrlKey { suffix } => {
                Box::new(UrlKeyStage::new(Arc::clone(&collaborators.url_index), suffix))
            }
            StageConfig::Disabler { mode, force } => {
                Box::new(DisablerStage::new(Arc::clone(&collaborators.links), *mode, *force))
            }
        };

        Ok(stage)
    }
}

impl PipelineConfig {
    pub fn new(name: &str, stages: Vec<StageConfig>) -> Self {
        Self {
            name: name.to_string(),
            stages,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(ImportError::Config(format!("pipeline '{}' has no stages", self.name)));
        }
        self.stages.iter().try_for_each(StageConfig::validate)
    }

    pub fn build(&self, collaborators: &Collaborators) -> Result<Pipeline> {
        self.validate()?;
        let stages = self
            .stages
            .iter()
            .map(|config| config.build(collaborators))
            .collect::<Result<Vec<_>>>()?;
        Ok(Pipeline::new(&self.name, stages))
    }
}
