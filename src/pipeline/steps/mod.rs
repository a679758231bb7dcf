use crate::error::Result;
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Common trait for all pipeline stages
#[async_trait]
pub trait Stage: Send + Sync {
    /// Run this stage over the shared item collection
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport>;

    /// Get the name of this stage
    fn stage_name(&self) -> &'static str;
}

/// Result of running one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub stage: String,
    pub processed_count: usize,
    pub created_count: usize,
    pub removed_count: usize,
    pub failed_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StageReport {
    pub fn success(stage: &str, processed: usize, message: String) -> Self {
        Self {
            stage: stage.to_string(),
            processed_count: processed,
            message,
            ..Default::default()
        }
    }

    pub fn skipped(stage: &str, message: String) -> Self {
        Self::success(stage, 0, message)
    }

    pub fn with_created(mut self, created: usize) -> Self {
        self.created_count = created;
        self
    }

    pub fn with_removed(mut self, removed: usize) -> Self {
        self.removed_count = removed;
        self
    }

    pub fn with_failed(mut self, failed: usize) -> Self {
        self.failed_count = failed;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

pub mod asset_fetch;
pub mod attribute_options;
pub mod category_margin;
pub mod disabler;
pub mod mapper;
pub mod source;
pub mod url_key;
pub mod variant_grouping;

pub use asset_fetch::AssetFetchStage;
pub use attribute_options::AttributeOptionsStage;
pub use category_margin::CategoryMarginStage;
pub use disabler::{DisableMode, DisablerStage};
pub use mapper::MapperStage;
pub use source::{SourceFormat, SourceLocation, SourceMode, SourceStage};
pub use url_key::UrlKeyStage;
pub use variant_grouping::VariantGroupingStage;
