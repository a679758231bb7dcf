use anyhow::Result;
use async_trait::async_trait;
use feed_importer::app::ports::{AssetDownloader, FeedFetcher, LinkStore};
use feed_importer::app::ImportUseCase;
use feed_importer::config::ProfileConfig;
use feed_importer::error::{FetchError, ImportError};
use feed_importer::infra::{CatalogSnapshot, InMemoryLinkStore, InMemoryOptionStore, JsonFileImportEngine};
use feed_importer::pipeline::pipeline_config::Collaborators;
use feed_importer::types::Row;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const FEED_URL: &str = "https://feeds.example.com/supplier.json";

/// Serves the supplier feed and writes a small body for every asset
struct FakeHttp;

#[async_trait]
impl AssetDownloader for FakeHttp {
    async fn download(&self, _url: &str, target: &Path) -> Result<(), FetchError> {
        tokio::fs::write(target, b"image").await?;
        Ok(())
    }
}

#[async_trait]
impl FeedFetcher for FakeHttp {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url != FEED_URL {
            return Err(FetchError::Status { status: 404, url: url.to_string() });
        }
        Ok(FEED.as_bytes().to_vec())
    }
}

const FEED: &str = r#"[
    {"ArtNr": "TS-RED-S", "Model": "TS", "Title": "T-shirt", "Colour": "Red", "Size": "S",
     "Cost": "10", "Group": "Apparel/Shirts", "Photo": "https://cdn.example.com/ts red.jpg"},
    {"ArtNr": "TS-BLUE-S", "Model": "TS", "Title": "T-shirt", "Colour": "Blue", "Size": "S",
     "Cost": "10", "Group": "Apparel/Shirts", "Photo": "https://cdn.example.com/ts-blue.jpg"},
    {"ArtNr": "MUG-1", "Model": "MUG", "Title": "Mug", "Colour": "White", "Size": "",
     "Cost": "4", "Group": "Kitchen", "Photo": "https://cdn.example.com/mug.jpg"}
]"#;

fn profile(dir: &Path) -> String {
    format!(
        r#"
        profile = "supplier"
        output_dir = "{output}"

        [[stages]]
        type = "source"
        path = "{feed}"
        identifier = "ArtNr"

        [[stages]]
        type = "mapper"
        required = ["sku"]

        [stages.mapping]
        sku = {{ copy = "ArtNr" }}
        name = {{ template = "{{Title}} {{Colour}}" }}
        color = {{ copy = "Colour" }}
        size = {{ copy = "Size" }}
        base = {{ copy = "Model" }}
        cost = {{ copy = "Cost" }}
        categories = {{ copy = "Group" }}
        image = {{ copy = "Photo" }}
        url_key = {{ copy = "Title" }}
        special_price = "__EMPTY__"

        [[stages]]
        type = "category_margin"
        margins = [["Apparel", 50.0], ["Apparel/Shirts", 100.0]]

        [[stages]]
        type = "asset_fetch"
        media_dir = "{media}"
        concurrency = 2

        [[stages]]
        type = "attribute_options"
        attributes = ["color"]

        [[stages]]
        type = "variant_grouping"
        parent_field = "base"
        variation_attributes = ["color", "size"]

        [stages.parent_template]
        name = {{ template = "{{base}} collection" }}

        [stages.child_overrides]
        visibility = "1"

        [[stages]]
        type = "url_key"

        [[stages]]
        type = "disabler"
        force = true
        "#,
        output = dir.join("out").display(),
        feed = FEED_URL,
        media = dir.join("media").display(),
    )
}

#[tokio::test]
async fn test_full_profile_run() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("profile.toml");
    std::fs::write(&config_path, profile(dir.path()))?;

    let snapshot: CatalogSnapshot = serde_json::from_str(
        r#"{
            "url_rewrites": [{"request_path": "t-shirt.html", "owner": 9, "identifier": "OLD-SHIRT"}],
            "attribute_options": {"color": ["Red"]},
            "links": {"supplier": ["DISCONTINUED"]}
        }"#,
    )?;
    let seeded = snapshot.seed()?;
    let options: InMemoryOptionStore = seeded.options.clone();
    let links: InMemoryLinkStore = seeded.links.clone();
    let collaborators = Collaborators::from_catalog(seeded, Arc::new(FakeHttp), Arc::new(FakeHttp));

    let config = ProfileConfig::load(&config_path)?;
    let pipeline = config.pipeline_config().build(&collaborators)?;
    let engine = JsonFileImportEngine::new(&config.output_dir, &config.profile);
    let use_case = ImportUseCase::new(pipeline, Box::new(engine));

    let run = use_case.run().await?;

    assert_eq!(run.reports.len(), 8);
    assert!(run.error_report.is_clean());
    // 3 products, 1 configurable, 1 disable row
    assert_eq!(run.rows, 5);

    let output = std::fs::read_dir(dir.path().join("out"))?
        .next()
        .expect("output file")?
        .path();
    let rows: Vec<Row> = serde_json::from_str(&std::fs::read_to_string(output)?)?;
    let row = |sku: &str| rows.iter().find(|r| r["sku"] == sku).cloned().expect(sku);

    let red = row("TS-RED-S");
    assert_eq!(red["price"], "20");
    assert_eq!(red["image"], "tsred.jpg");
    assert_eq!(red["visibility"], "1");
    assert_eq!(red["special_price"], "");
    assert_eq!(red["url_key"], "TS-RED-S-t-shirt");

    let parent = row("TS");
    assert_eq!(parent["product_type"], "configurable");
    assert_eq!(
        parent["configurable_variations"],
        "sku=TS-RED-S,color=Red,size=S|sku=TS-BLUE-S,color=Blue,size=S"
    );
    assert_eq!(parent["name"], "TS collection");
    assert_eq!(parent["url_key"], "TS-t-shirt");
    assert!(!parent.contains_key("color"));
    assert!(!parent.contains_key("visibility"));

    let mug = row("MUG-1");
    assert_eq!(mug["price"], "4");
    assert_eq!(mug["url_key"], "mug");

    assert_eq!(row("DISCONTINUED")["product_online"], "0");
    assert!(dir.path().join("media").join("mug.jpg").exists());
    assert_eq!(options.labels("color"), vec!["Red", "Blue", "White"]);
    assert!(links.missing("supplier", &["DISCONTINUED".to_string()])?.len() >= 3);
    Ok(())
}

#[tokio::test]
async fn test_invalid_stage_aborts_before_running() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("profile.toml");
    std::fs::write(
        &config_path,
        r#"
        profile = "broken"

        [[stages]]
        type = "attribute_options"
        attributes = []
        "#,
    )?;

    let config = ProfileConfig::load(&config_path)?;
    let collaborators =
        Collaborators::from_catalog(CatalogSnapshot::default().seed()?, Arc::new(FakeHttp), Arc::new(FakeHttp));
    let err = config.pipeline_config().build(&collaborators).err().expect("invalid profile");

    assert!(matches!(err, ImportError::Stage { ref stage, .. } if stage == "attribute_options"));
    Ok(())
}
