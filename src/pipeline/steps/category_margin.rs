use super::{Stage, StageReport};
use crate::app::ports::MarginSource;
use crate::codec::LineCodec;
use crate::error::Result;
use crate::pipeline::processing::{apply_category_margin, MarginTable};
use crate::pipeline::{process_each_item, PipelineContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Derives prices from costs using per-category margins
pub struct CategoryMarginStage {
    margins: Arc<dyn MarginSource>,
    codec: LineCodec,
}

impl CategoryMarginStage {
    pub fn new(margins: Arc<dyn MarginSource>) -> Self {
        Self {
            margins,
            codec: LineCodec::new(),
        }
    }
}

#[async_trait]
impl Stage for CategoryMarginStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        info!("💰 Calculating product margins");
        let table = MarginTable::new(self.margins.margins()?);
        if table.is_empty() {
            info!("No category margins configured, prices will equal costs");
        }

        let total = ctx.items.len();
        let removed = process_each_item(self.stage_name(), &mut ctx.items, |identifier, item| {
            apply_category_margin(identifier, item, &table, &self.codec)
        });

        let message = format!("{} items priced, {} removed", total - removed.len(), removed.len());
        Ok(StageReport::success(self.stage_name(), total, message).with_removed(removed.len()))
    }

    fn stage_name(&self) -> &'static str {
        "category_margin"
    }
}
