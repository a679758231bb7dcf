use super::{Stage, StageReport};
use crate::app::ports::UrlOwnerIndex;
use crate::constants;
use crate::error::Result;
use crate::pipeline::processing::UniqueSlugAllocator;
use crate::pipeline::{process_each_item, PipelineContext};
use crate::types::Value;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Assigns every item a unique `url_key`
pub struct UrlKeyStage {
    index: Arc<dyn UrlOwnerIndex>,
    suffix: String,
}

impl UrlKeyStage {
    pub fn new(index: Arc<dyn UrlOwnerIndex>, suffix: &str) -> Self {
        Self {
            index,
            suffix: suffix.to_string(),
        }
    }
}

#[async_trait]
impl Stage for UrlKeyStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        info!("🔗 Checking url keys");
        let mut allocator = UniqueSlugAllocator::new(self.index.as_ref(), &self.suffix)?;
        let mut unresolved = 0;
        let mut processed = 0;

        let removed = process_each_item(self.stage_name(), &mut ctx.items, |identifier, item| {
            let Some(value) = item.get(constants::URL_KEY) else {
                return Ok(());
            };
            processed += 1;

            let url_key = value.to_flat_string();
            if url_key.is_empty() {
                debug!("Empty url key for {}, deriving one from the identifier", identifier);
            }

            match allocator.resolve(&url_key, identifier)? {
                Some(slug) => item.set(constants::URL_KEY, slug),
                None => {
                    unresolved += 1;
                    item.set(constants::URL_KEY, Value::Null);
                }
            }
            Ok(())
        });

        let message = format!(
            "{} url keys assigned, {} without a unique key, {} products removed",
            allocator.claimed(),
            unresolved,
            removed.len()
        );
        Ok(StageReport::success(self.stage_name(), processed, message)
            .with_failed(unresolved)
            .with_removed(removed.len()))
    }

    fn stage_name(&self) -> &'static str {
        "url_key"
    }
}
