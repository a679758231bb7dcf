pub mod orchestrator;
pub mod pipeline_config;
pub mod processing;
pub mod steps;

pub use orchestrator::{Pipeline, PipelineOutcome};
pub use pipeline_config::{PipelineConfig, StageConfig};
pub use steps::{Stage, StageReport};

use crate::error::Result;
use crate::types::{Item, ItemCollection};
use tracing::info;

/// State owned by the orchestrator and lent to one stage at a time
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub profile: String,
    pub items: ItemCollection,
}

impl PipelineContext {
    pub fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            items: ItemCollection::new(),
        }
    }

    pub fn with_items(profile: &str, items: ItemCollection) -> Self {
        Self {
            profile: profile.to_string(),
            items,
        }
    }
}

/// Runs `f` over every item; an item whose handler fails is logged and removed.
///
/// Returns the identifiers that were removed.
pub fn process_each_item<F>(stage: &str, items: &mut ItemCollection, mut f: F) -> Vec<String>
where
    F: FnMut(&str, &mut Item) -> Result<()>,
{
    let mut removed = Vec::new();
    items.retain(|identifier, item| match f(identifier, item) {
        Ok(()) => true,
        Err(e) => {
            info!("{}: {} (removing product {})", stage, e, identifier);
            removed.push(identifier.clone());
            false
        }
    });
    removed
}
