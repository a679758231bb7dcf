use anyhow::Result;
use async_trait::async_trait;
use feed_importer::app::ports::AssetDownloader;
use feed_importer::error::FetchError;
use feed_importer::pipeline::processing::AssetFetcher;
use feed_importer::types::{Item, ItemCollection, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Downloader that writes a small body, or a partial body followed by an error for failing URLs.
#[derive(Default)]
struct FakeDownloader {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDownloader {
    fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetDownloader for FakeDownloader {
    async fn download(&self, url: &str, target: &Path) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::fs::write(target, b"partial").await?;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url) {
            return Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_shared_filename_is_fetched_once() -> Result<()> {
    let media = tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let fetcher = AssetFetcher::new(downloader.clone(), media.path());

    let mut items = ItemCollection::new();
    items.insert(
        "A".to_string(),
        Item::from_pairs([("sku", "A"), ("image", "https://cdn.example.com/img/shoe.jpg")]),
    );
    items.insert(
        "B".to_string(),
        Item::from_pairs([("sku", "B"), ("image", "https://mirror.example.com/shoe.jpg")]),
    );

    let report = fetcher.fetch(&mut items, &fields(&["image"]), &[], 4).await?;

    assert_eq!(downloader.calls().len(), 1);
    assert_eq!(report.references, 2);
    assert_eq!(report.deduplicated, 1);
    assert_eq!(items["A"].text("image"), Some("shoe.jpg"));
    assert_eq!(items["B"].text("image"), Some("shoe.jpg"));
    Ok(())
}

#[tokio::test]
async fn test_existing_file_skips_network() -> Result<()> {
    let media = tempdir()?;
    std::fs::write(media.path().join("boot.jpg"), b"cached")?;
    let downloader = Arc::new(FakeDownloader::default());
    let fetcher = AssetFetcher::new(downloader.clone(), media.path());

    let mut items = ItemCollection::new();
    items.insert(
        "A".to_string(),
        Item::from_pairs([("image", "https://cdn.example.com/boot.jpg"), ("thumbnail", "local.jpg")]),
    );

    let report = fetcher
        .fetch(&mut items, &fields(&["image", "thumbnail"]), &[], 2)
        .await?;

    assert!(downloader.calls().is_empty());
    assert_eq!(report.reused_local, 1);
    assert_eq!(items["A"].text("image"), Some("boot.jpg"));
    assert_eq!(items["A"].text("thumbnail"), Some("local.jpg"));
    Ok(())
}

#[tokio::test]
async fn test_failure_nulls_every_field_with_that_url() -> Result<()> {
    let media = tempdir()?;
    let broken = "https://cdn.example.com/broken.jpg";
    let downloader = Arc::new(FakeDownloader::failing(&[broken]));
    let fetcher = AssetFetcher::new(downloader.clone(), media.path());

    let mut items = ItemCollection::new();
    items.insert(
        "A".to_string(),
        Item::from_pairs([
            ("image", broken),
            ("small_image", broken),
            ("description_image", broken),
            ("thumbnail", "https://cdn.example.com/ok.jpg"),
            (
                "additional_images",
                "https://cdn.example.com/ok.jpg,https://cdn.example.com/broken.jpg, https://cdn.example.com/extra.jpg",
            ),
        ]),
    );

    let report = fetcher
        .fetch(
            &mut items,
            &fields(&["image", "small_image", "thumbnail"]),
            &fields(&["additional_images"]),
            3,
        )
        .await?;

    let item = &items["A"];
    assert_eq!(report.failed, 1);
    assert_eq!(item.get("image"), Some(&Value::Null));
    assert_eq!(item.get("small_image"), Some(&Value::Null));
    assert_eq!(item.get("description_image"), Some(&Value::Null));
    assert_eq!(item.text("thumbnail"), Some("ok.jpg"));
    assert_eq!(item.text("additional_images"), Some("ok.jpg,extra.jpg"));
    assert!(!media.path().join("broken.jpg").exists());
    assert!(media.path().join("ok.jpg").exists());
    assert_eq!(downloader.calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_concurrency_is_bounded() -> Result<()> {
    let media = tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let fetcher = AssetFetcher::new(downloader.clone(), media.path());

    let mut items = ItemCollection::new();
    for n in 0..12 {
        items.insert(
            format!("SKU{n}"),
            Item::from_pairs([("image", format!("https://cdn.example.com/{n}.jpg"))]),
        );
    }

    let report = fetcher.fetch(&mut items, &fields(&["image"]), &[], 3).await?;

    assert_eq!(report.downloaded, 12);
    assert!(downloader.max_in_flight.load(Ordering::SeqCst) <= 3);
    Ok(())
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() -> Result<()> {
    let media = tempdir()?;
    let fetcher = AssetFetcher::new(Arc::new(FakeDownloader::default()), media.path());
    let mut items = ItemCollection::new();

    assert!(fetcher.fetch(&mut items, &fields(&["image"]), &[], 0).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_url_without_filename_is_dropped() -> Result<()> {
    let media = tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let fetcher = AssetFetcher::new(downloader.clone(), media.path());

    let mut items = ItemCollection::new();
    items.insert(
        "A".to_string(),
        Item::from_pairs([("image", "https://cdn.example.com/"), ("thumbnail", "https://cdn.example.com/a.jpg")]),
    );

    let report = fetcher
        .fetch(&mut items, &fields(&["image", "thumbnail"]), &[], 2)
        .await?;

    assert_eq!(report.failed, 1);
    assert_eq!(items["A"].get("image"), Some(&Value::Null));
    assert_eq!(items["A"].text("thumbnail"), Some("a.jpg"));
    assert_eq!(downloader.calls(), vec!["https://cdn.example.com/a.jpg".to_string()]);
    Ok(())
}
