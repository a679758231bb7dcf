use super::{Stage, StageReport};
use crate::app::ports::AssetDownloader;
use crate::error::Result;
use crate::pipeline::processing::AssetFetcher;
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Replaces remote asset URLs on items with downloaded local files
pub struct AssetFetchStage {
    fetcher: AssetFetcher,
    fields: Vec<String>,
    list_fields: Vec<String>,
    concurrency: usize,
}

impl AssetFetchStage {
    pub fn new(
        downloader: Arc<dyn AssetDownloader>,
        media_dir: impl Into<PathBuf>,
        fields: Vec<String>,
        list_fields: Vec<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher: AssetFetcher::new(downloader, media_dir),
            fields,
            list_fields,
            concurrency,
        }
    }
}

#[async_trait]
impl Stage for AssetFetchStage {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<StageReport> {
        let report = self
            .fetcher
            .fetch(&mut ctx.items, &self.fields, &self.list_fields, self.concurrency)
            .await?;

        let message = format!(
            "{} downloaded, {} already present, {} failed",
            report.downloaded, report.reused_local, report.failed
        );
        Ok(StageReport::success(self.stage_name(), report.references, message)
            .with_failed(report.failed)
            .with_metadata("deduplicated", report.deduplicated)
            .with_metadata("media_dir", self.fetcher.media_dir().display()))
    }

    fn stage_name(&self) -> &'static str {
        "asset_fetch"
    }
}
