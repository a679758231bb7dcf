use super::{Stage, StageReport};
use crate::app::ports::LinkStore;
use crate::constants;
use crate::error::Result;
use crate::pipeline::PipelineContext;
use crate::types::Item;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// What happens to products a feed no longer contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableMode {
    /// Append `product_online = 0`
    #[default]
    Offline,
    /// Append `qty = 0`
    OutOfStock,
}

/// Appends disable rows for identifiers imported by earlier runs of the same profile
pub struct DisablerStage {
    links: Arc<dyn LinkStore>,
    mode: DisableMode,
    force: bool,
}

impl DisablerStage {
    pub fn new(links: Arc<dyn LinkStore>, mode: DisableMode, force: bool) -> Self {
        Self { links, mode, force }
    }

    fn disable_row(&self, identifier: &str) -> Item {
        let field = match self.mode {
            DisableMode::Offline => constants::PRODUCT_ONLINE,
            DisableMode::OutOfStock => constants::QTY,
        };
        Item::from_pairs([(constants::SKU, identifier), (field, "0")])
    }
}

#[async_trait]
impl Stage for DisablerStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        if ctx.items.len() <= constants::DISABLER_MIN_ITEMS && !self.force {
            let message = format!(
                "Skipping because {} or fewer products are imported, use force to disable anyway",
                constants::DISABLER_MIN_ITEMS
            );
            info!("{}", message);
            return Ok(StageReport::skipped(self.stage_name(), message));
        }

        let identifiers: Vec<String> = ctx.items.keys().cloned().collect();
        self.links.record(&ctx.profile, &identifiers)?;
        let missing = self.links.missing(&ctx.profile, &identifiers)?;

        let mut appended = 0;
        for identifier in missing {
            if ctx.items.contains_key(&identifier) {
                continue;
            }
            let row = self.disable_row(&identifier);
            ctx.items.insert(identifier, row);
            appended += 1;
        }

        let message = format!("Disabling {} products ({:?})", appended, self.mode);
        info!("🚫 {}", message);
        Ok(StageReport::success(self.stage_name(), identifiers.len(), message).with_created(appended))
    }

    fn stage_name(&self) -> &'static str {
        "disabler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryLinkStore;

    fn context(count: usize) -> PipelineContext {
        let mut ctx = PipelineContext::new("feed");
        for n in 0..count {
            let sku = format!("SKU{n}");
            ctx.items.insert(sku.clone(), Item::from_pairs([("sku", sku)]));
        }
        ctx
    }

    #[tokio::test]
    async fn test_small_runs_are_skipped_unless_forced() {
        let links = Arc::new(InMemoryLinkStore::new());
        links.record("feed", &["OLD".to_string()]).unwrap();

        let mut ctx = context(3);
        DisablerStage::new(links.clone(), DisableMode::Offline, false)
            .process(&mut ctx)
            .await
            .unwrap();
        assert!(!ctx.items.contains_key("OLD"));

        DisablerStage::new(links.clone(), DisableMode::Offline, true)
            .process(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.items["OLD"].text("product_online"), Some("0"));
        assert_eq!(links.linked("feed").len(), 4);
    }

    #[tokio::test]
    async fn test_out_of_stock_mode_sets_qty() {
        let links = Arc::new(InMemoryLinkStore::new());
        links.record("feed", &["OLD".to_string(), "SKU1".to_string()]).unwrap();

        let mut ctx = context(150);
        let report = DisablerStage::new(links, DisableMode::OutOfStock, false)
            .process(&mut ctx)
            .await
            .unwrap();

        assert_eq!(report.created_count, 1);
        assert_eq!(ctx.items["OLD"].text("qty"), Some("0"));
        assert!(!ctx.items["OLD"].contains("product_online"));
        assert_eq!(ctx.items["SKU1"].text("qty"), None);
    }
}
